//! History walker.
//!
//! Walks every commit of one repository and lazily yields a [`ChangeRecord`]
//! for each qualifying file change. The walk is strictly sequential and owns a
//! fresh [`LanguageRegistry`]; nothing is shared with other walks.

use std::vec;

use serde::{Deserialize, Serialize};

use crate::change::{classify_change, ChangeOptions, CommitChange};
use crate::classifier::Classifier;
use crate::record::{Author, ChangeRecord};
use crate::registry::LanguageRegistry;
use crate::repository::{CommitEntry, RepositoryHandle};
use crate::Result;

/// Stopping conditions and policies for one walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WalkOptions {
    /// Stop after this many emitted records, unbounded when `None`
    pub limit: Option<usize>,
    /// Stop after visiting this many commits, unbounded when `None`
    pub max_commits: Option<usize>,
    /// Per-change decoding and size policies
    #[serde(flatten)]
    pub change: ChangeOptions,
    /// Pair deleted and added files into renames when opening repositories
    pub detect_renames: bool,
}

/// Convert a signed command-line limit, where any negative value means unbounded
pub fn limit_from_signed(limit: i64) -> Option<usize> {
    usize::try_from(limit).ok()
}

/// The commit whose changes are being classified
struct PendingCommit {
    id: String,
    author: Author,
    changes: vec::IntoIter<CommitChange>,
}

/// Lazy sequence of change records produced by [`walk`].
///
/// Per-change and per-commit failures are logged and skipped. An error fatal
/// to the repository is yielded once, after which the sequence ends.
pub struct ChangeRecords<'a> {
    handle: &'a dyn RepositoryHandle,
    classifier: &'a dyn Classifier,
    options: WalkOptions,
    repository_url: String,
    registry: LanguageRegistry,
    history: Box<dyn Iterator<Item = Result<CommitEntry>> + 'a>,
    current: Option<PendingCommit>,
    emitted: usize,
    visited: usize,
    finished: bool,
}

impl<'a> ChangeRecords<'a> {
    /// URL attributed to every record of this walk
    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    /// Number of commits pulled from the history so far
    pub fn commits_visited(&self) -> usize {
        self.visited
    }

    /// Languages determined so far
    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    fn limit_reached(&self) -> bool {
        matches!(self.options.limit, Some(limit) if self.emitted >= limit)
    }

    fn commit_cap_reached(&self) -> bool {
        matches!(self.options.max_commits, Some(max) if self.visited >= max)
    }

    /// Classify one change of the pending commit
    fn process_change(&mut self, change: &CommitChange) -> Option<Result<ChangeRecord>> {
        let result = classify_change(
            change,
            self.handle,
            &mut self.registry,
            self.classifier,
            &self.options.change,
        );

        let pending = self.current.as_ref()?;
        match result {
            Ok(Some(fragment)) => {
                self.emitted += 1;
                Some(Ok(ChangeRecord::new(
                    &self.repository_url,
                    &pending.author,
                    &pending.id,
                    fragment,
                )))
            }
            Ok(None) => None,
            Err(err) if err.is_fatal_to_repository() => {
                self.finished = true;
                Some(Err(err))
            }
            Err(err) => {
                log::warn!(
                    "Skipping {} in commit {} of {}: {}",
                    change.path,
                    pending.id,
                    self.repository_url,
                    err
                );
                None
            }
        }
    }
}

impl Iterator for ChangeRecords<'_> {
    type Item = Result<ChangeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished || self.limit_reached() {
                return None;
            }

            let next_change = self.current.as_mut().and_then(|pending| pending.changes.next());
            if let Some(change) = next_change {
                match self.process_change(&change) {
                    Some(item) => return Some(item),
                    None => continue,
                }
            }
            self.current = None;

            if self.commit_cap_reached() {
                log::debug!(
                    "Commit cap of {} reached for {}",
                    self.visited,
                    self.repository_url
                );
                self.finished = true;
                return None;
            }

            match self.history.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Ok(entry)) => {
                    self.visited += 1;
                    self.current = Some(PendingCommit {
                        author: Author::parse(&entry.author),
                        id: entry.id,
                        changes: entry.changes.into_iter(),
                    });
                }
                Some(Err(err)) if err.is_fatal_to_repository() => {
                    self.finished = true;
                    return Some(Err(err));
                }
                Some(Err(err)) => {
                    self.visited += 1;
                    log::warn!("Skipping commit of {}: {}", self.repository_url, err);
                }
            }
        }
    }
}

/// URL of the repository, falling back to the last component of its location
fn resolve_repository_url(handle: &dyn RepositoryHandle) -> String {
    if let Some(url) = handle.origin_url() {
        return url;
    }

    let location = handle.location();
    match location.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => location.display().to_string(),
    }
}

/// Walk the history of an open repository.
///
/// Each call starts a fresh traversal with a fresh language registry. The handle
/// is only borrowed; releasing it stays with the caller.
///
/// # Arguments
///
/// * `handle` - The open repository
/// * `classifier` - Language classification capability
/// * `options` - Limits and change policies
///
/// # Returns
///
/// * `Result<ChangeRecords>` - Lazy record sequence, or the error that prevented
///   the history from being enumerated at all
pub fn walk<'a>(
    handle: &'a dyn RepositoryHandle,
    classifier: &'a dyn Classifier,
    options: &WalkOptions,
) -> Result<ChangeRecords<'a>> {
    let repository_url = resolve_repository_url(handle);
    log::info!("Walking {}", repository_url);

    Ok(ChangeRecords {
        handle,
        classifier,
        options: *options,
        repository_url,
        registry: LanguageRegistry::new(),
        history: handle.history()?,
        current: None,
        emitted: 0,
        visited: 0,
        finished: false,
    })
}
