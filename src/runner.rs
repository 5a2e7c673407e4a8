//! Batch runner.
//!
//! Splits a repository list into batches and mines the repositories of each
//! batch in parallel, one repository per worker. Each finished repository is
//! appended to the output as one batch of records. A repository that fails is
//! logged and counted; it never stops the run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::classifier::Classifier;
use crate::config::MinerConfig;
use crate::output::{append_batch, top_repositories};
use crate::record::ChangeRecord;
use crate::repository::{AcquiredRepository, RepositoryHandle};
use crate::threading::{ProgressTracker, WorkerPool};
use crate::walker::{walk, WalkOptions};
use crate::{Error, Result};

/// What mining one repository produced
#[derive(Debug)]
pub struct RepositoryOutcome {
    pub identifier: String,
    /// Records gathered before the walk finished or failed
    pub records: Vec<ChangeRecord>,
    /// The error that ended processing early, if any
    pub error: Option<Error>,
}

impl RepositoryOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Totals of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub skipped_batches: usize,
    pub repositories: usize,
    pub failed_repositories: usize,
    pub records: usize,
}

/// Split `items` into consecutive batches of at most `batch_size` items
pub fn split_into_batches<T: Clone>(items: &[T], batch_size: usize) -> Vec<Vec<T>> {
    items
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Drain a walk, keeping the records produced before a fatal error
fn collect_records(
    handle: &dyn RepositoryHandle,
    classifier: &dyn Classifier,
    options: &WalkOptions,
) -> (Vec<ChangeRecord>, Option<Error>) {
    let records = match walk(handle, classifier, options) {
        Ok(records) => records,
        Err(err) => return (Vec::new(), Some(err)),
    };

    let mut collected = Vec::new();
    for record in records {
        match record {
            Ok(record) => collected.push(record),
            Err(err) => return (collected, Some(err)),
        }
    }
    (collected, None)
}

/// Mine one repository.
///
/// Reuses a clone found in `clone_dir`, otherwise clones into a temporary
/// directory there. The repository is released on every path out, and a
/// temporary clone is deleted.
///
/// # Arguments
///
/// * `identifier` - `owner/name`, URL or local path
/// * `clone_dir` - Directory holding existing and temporary clones
/// * `classifier` - Language classification capability
/// * `options` - Walk settings
///
/// # Returns
///
/// * `RepositoryOutcome` - Records and the error that stopped the repository, if any
pub fn mine_repository(
    identifier: &str,
    clone_dir: &Path,
    classifier: &dyn Classifier,
    options: &WalkOptions,
) -> RepositoryOutcome {
    let acquired = match AcquiredRepository::obtain(identifier, clone_dir, options.detect_renames) {
        Ok(acquired) => acquired,
        Err(err) => {
            log::error!("Cannot acquire {}: {}", identifier, err);
            return RepositoryOutcome {
                identifier: identifier.to_string(),
                records: Vec::new(),
                error: Some(err),
            };
        }
    };

    let (records, mut error) = collect_records(acquired.handle(), classifier, options);
    if let Some(err) = &error {
        log::error!("Mining {} stopped early: {}", identifier, err);
    }

    if let Err(err) = acquired.release() {
        log::warn!("Cannot release {}: {}", identifier, err);
        error = error.or(Some(err));
    }

    log::info!("Finished {} with {} records", identifier, records.len());
    RepositoryOutcome {
        identifier: identifier.to_string(),
        records,
        error,
    }
}

/// Drives mining over a repository list
pub struct BatchRunner {
    config: MinerConfig,
    classifier: Arc<dyn Classifier>,
}

impl BatchRunner {
    pub fn new(config: MinerConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self { config, classifier }
    }

    /// Runner with the classifier described by the configuration
    pub fn from_config(config: MinerConfig) -> Self {
        let classifier = config.classifier.build();
        Self::new(config, classifier)
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Apply the top-repositories restriction, if configured
    pub fn select_repositories(&self, repositories: Vec<String>) -> Vec<String> {
        match self.config.top_repositories {
            Some(n) => top_repositories(&repositories, n),
            None => repositories,
        }
    }

    /// Mine every repository and append the records to `writer`.
    ///
    /// Batches before `start_batch` are skipped. Only a failure to write the
    /// output ends the run early; repositories still queued are then never
    /// started.
    pub fn run<W: Write + ?Sized>(
        &self,
        repositories: Vec<String>,
        clone_dir: &Path,
        writer: &mut W,
    ) -> Result<RunSummary> {
        let repositories = self.select_repositories(repositories);
        let batches = split_into_batches(&repositories, self.config.batch_size);
        let pool = WorkerPool::new(self.config.pool_config());

        let mut summary = RunSummary {
            batches: batches.len(),
            ..RunSummary::default()
        };

        for (index, batch) in batches.into_iter().enumerate() {
            if index < self.config.start_batch {
                log::info!("Skipping batch {}", index);
                summary.skipped_batches += 1;
                continue;
            }
            log::info!("Processing batch {} ({} repositories)", index, batch.len());

            let tracker = ProgressTracker::new(batch.len());
            let classifier = self.classifier.clone();
            let options = self.config.walk;
            let clone_dir: PathBuf = clone_dir.to_path_buf();

            let outcomes = pool.process(batch, move |identifier: String| {
                mine_repository(&identifier, &clone_dir, classifier.as_ref(), &options)
            });

            for outcome in outcomes.iter() {
                if let Err(err) = append_batch(writer, &outcome.records) {
                    log::error!("Cannot write records of {}: {}", outcome.identifier, err);
                    pool.shutdown();
                    return Err(err);
                }

                summary.repositories += 1;
                summary.records += outcome.records.len();
                if !outcome.is_success() {
                    summary.failed_repositories += 1;
                }

                tracker.record(outcome.is_success());
                log::info!("{}: {}", outcome.identifier, tracker.summary());
            }
        }

        Ok(summary)
    }
}
