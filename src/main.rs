//! Command-line interface for the commit miner.
//!
//! Mines repository histories into newline-delimited JSON change records.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commit_miner::blob::{BlobContent, BlobView};
use commit_miner::config::ClassifierKind;
use commit_miner::output::{append_batch, read_repository_list, top_repositories};
use commit_miner::walker::limit_from_signed;
use commit_miner::{walk, BatchRunner, ChangeRecord, Classifier, GitRepository, MinerConfig};

#[derive(Parser)]
#[clap(name = "commit-miner")]
#[clap(version = "0.1.0")]
#[clap(about = "Mine git histories into per-author, per-language change records", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Classifier to use: builtin or enry
    #[clap(long, global = true)]
    classifier: Option<String>,

    /// Path of the enry executable
    #[clap(long, global = true)]
    enry_path: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine every repository of a list file
    Mine {
        /// File with one repository per line (owner/name, URL or path)
        #[clap(long, value_parser)]
        repos: PathBuf,

        /// Directory for existing and temporary clones
        #[clap(long, value_parser)]
        clone_dir: PathBuf,

        /// File the records are appended to
        #[clap(short, long, value_parser)]
        output: PathBuf,

        /// Repositories per batch
        #[clap(long)]
        batch_size: Option<usize>,

        /// First batch to process
        #[clap(long)]
        start_batch: Option<usize>,

        /// Maximum records per repository, negative for unbounded
        #[clap(long, allow_hyphen_values = true)]
        limit: Option<i64>,

        /// Maximum commits visited per repository, negative for unbounded
        #[clap(long, allow_hyphen_values = true)]
        max_commits: Option<i64>,

        /// Number of repositories mined in parallel
        #[clap(short = 't', long)]
        workers: Option<usize>,

        /// Only mine the N most frequent repositories of the list
        #[clap(long)]
        top: Option<usize>,
    },

    /// Walk one local repository
    Walk {
        /// Path to the repository
        #[clap(value_parser)]
        path: PathBuf,

        /// Append records to this file instead of printing them
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,

        /// Maximum records, negative for unbounded
        #[clap(long, allow_hyphen_values = true)]
        limit: Option<i64>,

        /// Maximum commits visited, negative for unbounded
        #[clap(long, allow_hyphen_values = true)]
        max_commits: Option<i64>,
    },

    /// Classify the language of one file
    Classify {
        /// Path to the file
        #[clap(value_parser)]
        path: PathBuf,
    },

    /// Print the most frequent repositories of a list file
    Top {
        /// File with one repository per line
        #[clap(long, value_parser)]
        repos: PathBuf,

        /// Number of repositories to print
        #[clap(short = 'n', long, default_value = "150")]
        count: usize,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Load the configuration file and apply the global flags
fn load_config(cli: &Cli) -> MinerConfig {
    let mut config = match &cli.config {
        Some(path) => match MinerConfig::from_yaml_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error loading configuration: {}", err);
                process::exit(1);
            }
        },
        None => MinerConfig::default(),
    };

    if let Some(kind) = &cli.classifier {
        config.classifier.kind = match kind.to_lowercase().as_str() {
            "builtin" => ClassifierKind::Builtin,
            "enry" => ClassifierKind::Enry,
            other => {
                eprintln!("Error: unknown classifier '{}', expected builtin or enry", other);
                process::exit(1);
            }
        };
    }
    if let Some(enry_path) = &cli.enry_path {
        config.classifier.enry_path = enry_path.clone();
    }

    config
}

fn open_output(path: &Path) -> fs::File {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Error opening output {}: {}", path.display(), err);
            process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut config = load_config(&cli);

    match cli.command {
        Commands::Mine {
            repos,
            clone_dir,
            output,
            batch_size,
            start_batch,
            limit,
            max_commits,
            workers,
            top,
        } => {
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if let Some(start_batch) = start_batch {
                config.start_batch = start_batch;
            }
            if let Some(limit) = limit {
                config.walk.limit = limit_from_signed(limit);
            }
            if let Some(max_commits) = max_commits {
                config.walk.max_commits = limit_from_signed(max_commits);
            }
            if let Some(workers) = workers {
                config.workers = workers;
                config.queue_capacity = workers * 2;
            }
            if top.is_some() {
                config.top_repositories = top;
            }
            if let Err(err) = config.validate() {
                eprintln!("Error: {}", err);
                process::exit(1);
            }

            let repositories = match read_repository_list(&repos) {
                Ok(repositories) => repositories,
                Err(err) => {
                    eprintln!("Error reading repository list {}: {}", repos.display(), err);
                    process::exit(1);
                }
            };
            if let Err(err) = fs::create_dir_all(&clone_dir) {
                eprintln!("Error creating clone directory {}: {}", clone_dir.display(), err);
                process::exit(1);
            }
            let mut file = open_output(&output);

            let runner = BatchRunner::from_config(config);
            match runner.run(repositories, &clone_dir, &mut file) {
                Ok(summary) => {
                    log::info!(
                        "Mined {} repositories ({} failed, {} batches skipped), {} records",
                        summary.repositories,
                        summary.failed_repositories,
                        summary.skipped_batches,
                        summary.records
                    );
                }
                Err(err) => {
                    eprintln!("Error writing output {}: {}", output.display(), err);
                    process::exit(1);
                }
            }
        }

        Commands::Walk {
            path,
            output,
            limit,
            max_commits,
        } => {
            if let Some(limit) = limit {
                config.walk.limit = limit_from_signed(limit);
            }
            if let Some(max_commits) = max_commits {
                config.walk.max_commits = limit_from_signed(max_commits);
            }

            let repo = match GitRepository::open(&path) {
                Ok(repo) => repo.with_rename_detection(config.walk.detect_renames),
                Err(err) => {
                    eprintln!("Error: {}", err);
                    process::exit(1);
                }
            };
            let classifier = config.classifier.build();

            let records: Vec<ChangeRecord> = match walk(&repo, classifier.as_ref(), &config.walk) {
                Ok(records) => records
                    .filter_map(|record| match record {
                        Ok(record) => Some(record),
                        Err(err) => {
                            log::error!("Walk of {} stopped early: {}", path.display(), err);
                            None
                        }
                    })
                    .collect(),
                Err(err) => {
                    eprintln!("Error walking {}: {}", path.display(), err);
                    process::exit(1);
                }
            };
            repo.close();

            let written = match &output {
                Some(output) => append_batch(&mut open_output(output), &records),
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    append_batch(&mut handle, &records)
                }
            };
            if let Err(err) = written {
                eprintln!("Error writing records: {}", err);
                process::exit(1);
            }
        }

        Commands::Classify { path } => {
            let blob = match BlobContent::from_file(&path) {
                Ok(blob) => blob,
                Err(err) => {
                    eprintln!("Error reading {}: {}", path.display(), err);
                    process::exit(1);
                }
            };
            let classifier = config.classifier.build();

            match classifier.classify(blob.name(), blob.data()) {
                Ok(classification) => {
                    println!("File: {}", path.display());
                    println!("Type: {}", classification.content_kind);
                    println!(
                        "Vendored: {}",
                        if classification.vendored { "Yes" } else { "No" }
                    );
                    match classification.language() {
                        Some(language) => println!("Language: {}", language),
                        None => println!("Language: None"),
                    }
                }
                Err(err) => {
                    eprintln!("Error classifying {}: {}", path.display(), err);
                    process::exit(1);
                }
            }
        }

        Commands::Top { repos, count } => {
            let repositories = match read_repository_list(&repos) {
                Ok(repositories) => repositories,
                Err(err) => {
                    eprintln!("Error reading repository list {}: {}", repos.display(), err);
                    process::exit(1);
                }
            };

            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for repository in top_repositories(&repositories, count) {
                if writeln!(handle, "{}", repository).is_err() {
                    process::exit(1);
                }
            }
        }
    }
}
