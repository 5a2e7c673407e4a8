//! Test doubles shared by the unit tests.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::change::{CommitChange, ContentProvider};
use crate::classifier::{BuiltinClassifier, Classification, Classifier};
use crate::repository::{CommitEntry, RepositoryHandle};
use crate::{Error, Result};

enum Behavior {
    Fixed(Classification),
    Failing,
    Builtin,
}

/// Classifier that counts its invocations
pub struct CountingClassifier {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl CountingClassifier {
    /// Always answer `classification`
    pub fn new(classification: Classification) -> Self {
        Self {
            behavior: Behavior::Fixed(classification),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with a non-fatal classification error
    pub fn failing() -> Self {
        Self {
            behavior: Behavior::Failing,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delegate to the built-in classifier
    pub fn builtin() -> Self {
        Self {
            behavior: Behavior::Builtin,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for CountingClassifier {
    fn classify(&self, file_path: &str, content: &[u8]) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Fixed(classification) => Ok(classification.clone()),
            Behavior::Failing => Err(Error::Classification {
                path: file_path.to_string(),
                reason: "classifier unavailable".to_string(),
            }),
            Behavior::Builtin => BuiltinClassifier.classify(file_path, content),
        }
    }
}

/// In-memory repository with scripted history
pub struct MemoryRepository {
    blobs: HashMap<String, Vec<u8>>,
    commits: Vec<Result<CommitEntry>>,
    origin: Option<String>,
    location: PathBuf,
    pulled: Cell<usize>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            blobs: HashMap::new(),
            commits: Vec::new(),
            origin: None,
            location: PathBuf::from("/clones/owner_repo"),
            pulled: Cell::new(0),
        }
    }

    pub fn with_blob(mut self, id: &str, data: impl Into<Vec<u8>>) -> Self {
        self.blobs.insert(id.to_string(), data.into());
        self
    }

    /// Append a commit; history is yielded in insertion order
    pub fn with_commit(mut self, id: &str, author: &str, changes: Vec<CommitChange>) -> Self {
        self.commits.push(Ok(CommitEntry {
            id: id.to_string(),
            author: author.to_string(),
            changes,
        }));
        self
    }

    /// Append a commit whose metadata cannot be read
    pub fn with_corrupt_commit(mut self, id: &str) -> Self {
        self.commits.push(Err(Error::CommitRead {
            id: id.to_string(),
            reason: "corrupt tree".to_string(),
        }));
        self
    }

    pub fn with_origin(mut self, url: &str) -> Self {
        self.origin = Some(url.to_string());
        self
    }

    /// Number of history entries handed out so far
    pub fn pulled(&self) -> usize {
        self.pulled.get()
    }
}

impl ContentProvider for MemoryRepository {
    fn get_blob(&self, blob_ref: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(blob_ref)
            .cloned()
            .ok_or_else(|| Error::BlobMissing(blob_ref.to_string()))
    }
}

impl RepositoryHandle for MemoryRepository {
    fn history(&self) -> Result<Box<dyn Iterator<Item = Result<CommitEntry>> + '_>> {
        Ok(Box::new(self.commits.iter().map(move |entry| {
            self.pulled.set(self.pulled.get() + 1);
            match entry {
                Ok(commit) => Ok(commit.clone()),
                Err(Error::CommitRead { id, reason }) => Err(Error::CommitRead {
                    id: id.clone(),
                    reason: reason.clone(),
                }),
                Err(other) => Err(Error::Resource(other.to_string())),
            }
        })))
    }

    fn origin_url(&self) -> Option<String> {
        self.origin.clone()
    }

    fn location(&self) -> &Path {
        &self.location
    }
}
