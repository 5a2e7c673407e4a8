//! Commit history mining library.
//!
//! Walks the full history of git repositories, diffs every changed blob against
//! its previous version, classifies the file's programming language and emits
//! one [`ChangeRecord`] per qualifying change, attributed to the commit author.

pub mod blob;
pub mod change;
pub mod classifier;
pub mod config;
pub mod diff;
pub mod language;
pub mod output;
pub mod record;
pub mod registry;
pub mod repository;
pub mod runner;
pub mod threading;
pub mod vendor;
pub mod walker;

#[cfg(test)]
mod testing;

// Public re-exports
pub use change::{classify_change, CommitChange, ContentProvider};
pub use classifier::{classify, BuiltinClassifier, Classification, Classifier, EnryClassifier};
pub use config::MinerConfig;
pub use diff::diff_line_counts;
pub use record::{Author, ChangeFragment, ChangeRecord};
pub use registry::LanguageRegistry;
pub use repository::{CommitEntry, GitRepository, RepositoryHandle};
pub use runner::BatchRunner;
pub use walker::{walk, ChangeRecords, WalkOptions};

/// Error type for mining operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Fancy regex error: {0}")]
    FancyRegex(#[from] fancy_regex::Error),

    #[error("Cannot decode blob as text: {0}")]
    Decode(String),

    #[error("Language classification failed for {path}: {reason}")]
    Classification { path: String, reason: String },

    #[error("Blob not found: {0}")]
    BlobMissing(String),

    #[error("Unreadable commit {id}: {reason}")]
    CommitRead { id: String, reason: String },

    #[error("Cannot acquire repository {identifier}: {reason}")]
    RepositoryAcquisition { identifier: String, reason: String },

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error ends the processing of the whole repository.
    ///
    /// Everything below the repository level (a blob, a change, a commit) is
    /// contained inside the walk; only acquisition and storage failures escape.
    pub fn is_fatal_to_repository(&self) -> bool {
        matches!(
            self,
            Error::RepositoryAcquisition { .. } | Error::Resource(_) | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        let acquisition = Error::RepositoryAcquisition {
            identifier: "owner/repo".to_string(),
            reason: "network down".to_string(),
        };
        assert!(acquisition.is_fatal_to_repository());
        assert!(Error::Resource("disk full".to_string()).is_fatal_to_repository());

        assert!(!Error::Decode("bad bytes".to_string()).is_fatal_to_repository());
        assert!(!Error::BlobMissing("abc".to_string()).is_fatal_to_repository());
        let commit = Error::CommitRead {
            id: "abc".to_string(),
            reason: "corrupt tree".to_string(),
        };
        assert!(!commit.is_fatal_to_repository());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::Classification {
            path: "src/main.rs".to_string(),
            reason: "exit status 2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Language classification failed for src/main.rs: exit status 2"
        );
    }
}
