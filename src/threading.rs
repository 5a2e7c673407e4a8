//! Worker pool for mining repositories in parallel.
//!
//! Parallelism is across repositories only: each task runs to completion on
//! one worker thread, pulling its input from a bounded queue so a long
//! repository list is never materialized as pending jobs all at once.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError};
use threadpool::ThreadPool;

// How often an idle worker checks for shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Capacity of the job queue between the feeder and the workers
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = num_cpus::get();
        Self {
            workers,
            queue_capacity: workers * 2,
        }
    }
}

/// Fixed-size pool of workers fed through a bounded queue
pub struct WorkerPool {
    config: PoolConfig,
    pool: ThreadPool,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Create a pool; zero workers or capacity are raised to one
    pub fn new(config: PoolConfig) -> Self {
        let config = PoolConfig {
            workers: config.workers.max(1),
            queue_capacity: config.queue_capacity.max(1),
        };

        Self {
            pool: ThreadPool::with_name("miner-worker".to_string(), config.workers),
            shutdown: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    pub fn workers(&self) -> usize {
        self.config.workers
    }

    /// Run `task` on every item.
    ///
    /// Items are fed lazily from a separate thread; the feeder blocks while the
    /// queue is full. Results arrive in completion order and the returned
    /// channel closes once every item has been processed.
    ///
    /// # Arguments
    ///
    /// * `items` - Work items, consumed on the feeder thread
    /// * `task` - Function run on a worker for each item
    ///
    /// # Returns
    ///
    /// * `Receiver<R>` - Task results
    pub fn process<I, T, R, F>(&self, items: I, task: F) -> Receiver<R>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let (job_sender, job_receiver) = bounded::<T>(self.config.queue_capacity);
        let (result_sender, result_receiver) = unbounded();

        let items = items.into_iter();
        let shutdown = self.shutdown.clone();
        thread::spawn(move || {
            for item in items {
                if shutdown.load(Ordering::Relaxed) || job_sender.send(item).is_err() {
                    break;
                }
            }
        });

        let task = Arc::new(task);
        for _ in 0..self.config.workers {
            let job_receiver = job_receiver.clone();
            let result_sender = result_sender.clone();
            let shutdown = self.shutdown.clone();
            let task = task.clone();

            self.pool.execute(move || loop {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }

                match job_receiver.recv_timeout(POLL_INTERVAL) {
                    Ok(item) => {
                        if result_sender.send((*task)(item)).is_err() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            });
        }

        result_receiver
    }

    /// Stop handing out queued work; tasks already running finish.
    ///
    /// The pool cannot be restarted afterwards.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Thread-safe progress tracker over a known number of tasks
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one finished task, returning the number finished so far
    pub fn record(&self, success: bool) -> usize {
        if !success {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed() as f64) / (self.total as f64)
        }
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed())
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn eta(&self) -> Option<Duration> {
        let progress = self.progress();
        if progress > 0.0 && progress < 1.0 {
            let elapsed = self.elapsed().as_secs_f64();
            let remaining = elapsed / progress - elapsed;
            Some(Duration::from_secs_f64(remaining.max(0.0)))
        } else {
            None
        }
    }

    /// One-line status for logging
    pub fn summary(&self) -> String {
        let eta = match self.eta() {
            Some(eta) => format!(", eta {}s", eta.as_secs()),
            None => String::new(),
        };
        format!(
            "{}/{} repositories done ({} failed){}",
            self.completed(),
            self.total,
            self.failed(),
            eta
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config() {
        let config = PoolConfig::default();
        assert!(config.workers > 0);
        assert!(config.queue_capacity >= config.workers);

        let pool = WorkerPool::new(PoolConfig {
            workers: 0,
            queue_capacity: 0,
        });
        assert_eq!(pool.workers(), 1);
    }

    #[test]
    fn test_process_all_items() {
        let pool = WorkerPool::new(PoolConfig {
            workers: 4,
            queue_capacity: 2,
        });

        let mut results: Vec<u64> = pool.process(1..=50u64, |n| n * n).iter().collect();
        results.sort_unstable();

        let expected: Vec<u64> = (1..=50u64).map(|n| n * n).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_empty_input_closes_results() {
        let pool = WorkerPool::new(PoolConfig {
            workers: 2,
            queue_capacity: 1,
        });

        let results = pool.process(Vec::<u32>::new(), |n| n);
        assert!(results.recv_timeout(Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_workers_run_concurrently() {
        let pool = WorkerPool::new(PoolConfig {
            workers: 3,
            queue_capacity: 3,
        });
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (active_task, peak_task) = (active.clone(), peak.clone());
        let results = pool.process(0..6, move |_| {
            let now = active_task.fetch_add(1, Ordering::SeqCst) + 1;
            peak_task.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            active_task.fetch_sub(1, Ordering::SeqCst);
        });

        assert_eq!(results.iter().count(), 6);
        assert!(peak.load(Ordering::SeqCst) > 1);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_shutdown_stops_queued_work() {
        let pool = WorkerPool::new(PoolConfig {
            workers: 1,
            queue_capacity: 1,
        });
        let started = Arc::new(AtomicUsize::new(0));

        let counter = started.clone();
        let results = pool.process(0..20, move |n| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            n
        });

        assert!(results.recv_timeout(Duration::from_secs(5)).is_ok());
        pool.shutdown();

        // The task in flight finishes, then the channel closes
        let rest = results.iter().count();
        assert!(rest <= 2);
        assert!(started.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_progress_tracker() {
        let tracker = ProgressTracker::new(4);
        assert_eq!(tracker.progress(), 0.0);
        assert_eq!(tracker.eta(), None);

        assert_eq!(tracker.record(true), 1);
        assert_eq!(tracker.record(false), 2);

        assert_eq!(tracker.completed(), 2);
        assert_eq!(tracker.failed(), 1);
        assert_eq!(tracker.remaining(), 2);
        assert!((tracker.progress() - 0.5).abs() < f64::EPSILON);
        assert!(tracker.eta().is_some());
        assert!(tracker.summary().starts_with("2/4 repositories done (1 failed)"));
    }
}
