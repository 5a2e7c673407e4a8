//! Miner configuration.
//!
//! Every setting has a default; a YAML file can override any subset of them and
//! command-line flags override the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::{BuiltinClassifier, Classifier, EnryClassifier, DEFAULT_CLASSIFIER_TIMEOUT};
use crate::threading::PoolConfig;
use crate::walker::WalkOptions;
use crate::{Error, Result};

/// Which language classifier to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// In-process extension, filename and shebang table
    #[default]
    Builtin,
    /// The external `enry` tool
    Enry,
}

/// Language classifier settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub kind: ClassifierKind,
    /// Path of the enry executable
    pub enry_path: PathBuf,
    /// Directory for scratch files, the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
    /// Limit for a single enry run
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::default(),
            enry_path: PathBuf::from("enry"),
            temp_dir: None,
            timeout_secs: DEFAULT_CLASSIFIER_TIMEOUT.as_secs(),
        }
    }
}

impl ClassifierConfig {
    /// Build the classifier service shared by all workers
    pub fn build(&self) -> Arc<dyn Classifier> {
        match self.kind {
            ClassifierKind::Builtin => Arc::new(BuiltinClassifier),
            ClassifierKind::Enry => {
                let mut enry = EnryClassifier::new(&self.enry_path)
                    .with_timeout(Duration::from_secs(self.timeout_secs));
                if let Some(temp_dir) = &self.temp_dir {
                    enry = enry.with_temp_dir(temp_dir);
                }
                Arc::new(enry)
            }
        }
    }
}

/// Settings of a mining run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Number of repositories mined in parallel
    pub workers: usize,
    /// Depth of the queue feeding the workers
    pub queue_capacity: usize,
    /// Repositories per batch
    pub batch_size: usize,
    /// Index of the first batch to process; earlier batches are skipped
    pub start_batch: usize,
    /// Restrict the run to the most frequent entries of the repository list
    pub top_repositories: Option<usize>,
    /// Per-repository walk settings
    pub walk: WalkOptions,
    /// Language classifier settings
    pub classifier: ClassifierConfig,
}

impl Default for MinerConfig {
    fn default() -> Self {
        let pool = PoolConfig::default();
        Self {
            workers: pool.workers,
            queue_capacity: pool.queue_capacity,
            batch_size: 10,
            start_batch: 0,
            top_repositories: None,
            walk: WalkOptions::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl MinerConfig {
    /// Parse and validate a YAML configuration
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: MinerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Reject settings the runner cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.classifier.timeout_secs == 0 {
            return Err(Error::Config("classifier timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }
}
