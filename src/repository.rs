//! Repository access.
//!
//! This module provides the [`RepositoryHandle`] abstraction consumed by the
//! history walker, its git2-backed implementation, and the acquisition helpers
//! that find an existing clone or make a temporary one.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::path::{Path, PathBuf};

use git2::{Commit, Delta, DiffFindOptions, DiffOptions, FileMode, Oid, Tree};
use regex::Regex;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::change::{CommitChange, ContentProvider};
use crate::{Error, Result};

lazy_static::lazy_static! {
    // `owner/name` shorthand for a GitHub repository
    static ref SHORTHAND_REGEX: Regex = Regex::new(r"^[\w.-]+/[\w.-]+$").unwrap();
}

/// One commit as seen by the walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    /// Hex commit id
    pub id: String,
    /// Raw author string, `Name <email>`
    pub author: String,
    /// File-level changes relative to the parent(s)
    pub changes: Vec<CommitChange>,
}

/// An open repository the walker can read from.
///
/// The walker never opens or closes handles; whoever acquired one releases it.
pub trait RepositoryHandle: ContentProvider {
    /// Enumerate the commit history, children before their parents.
    ///
    /// Unreadable commits are yielded as errors so the caller can skip them;
    /// the enumeration goes on with the rest of the graph.
    fn history(&self) -> Result<Box<dyn Iterator<Item = Result<CommitEntry>> + '_>>;

    /// The configured `origin` remote URL, if any
    fn origin_url(&self) -> Option<String>;

    /// Where the repository lives on disk
    fn location(&self) -> &Path;
}

/// A repository opened with libgit2
pub struct GitRepository {
    /// The Git repository
    repo: git2::Repository,

    /// Path the repository was opened from
    path: PathBuf,

    /// Pair deleted and added files into renames
    detect_renames: bool,
}

impl GitRepository {
    /// Open a repository at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Working directory or bare repository path
    ///
    /// # Returns
    ///
    /// * `Result<GitRepository>` - The handle, or a repository acquisition error
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = git2::Repository::open(path).map_err(|e| Error::RepositoryAcquisition {
            identifier: path.display().to_string(),
            reason: e.message().to_string(),
        })?;

        Ok(Self {
            repo,
            path: path.to_path_buf(),
            detect_renames: false,
        })
    }

    pub fn with_rename_detection(mut self, detect_renames: bool) -> Self {
        self.detect_renames = detect_renames;
        self
    }

    /// Release the handle
    pub fn close(self) {
        log::debug!("Closing repository {}", self.path.display());
    }

    /// Read one commit and its changes
    fn commit_entry(&self, commit: &Commit) -> Result<CommitEntry> {
        let changes = self
            .commit_changes(commit)
            .map_err(|e| commit_read_error(commit.id(), e))?;
        let author = commit.author().to_string();

        Ok(CommitEntry {
            id: commit.id().to_string(),
            author,
            changes,
        })
    }

    /// Changes of `commit` relative to its parents.
    ///
    /// A root commit is compared with the empty tree. A merge commit only
    /// reports paths that differ from every parent, and reports each of them
    /// once, as its change against the first parent. Changes already brought
    /// in by a merged branch are counted on that branch's own commits.
    ///
    /// A parent that cannot be read makes the whole commit unreadable.
    fn commit_changes(&self, commit: &Commit) -> std::result::Result<Vec<CommitChange>, git2::Error> {
        let tree = commit.tree()?;
        let parents = commit
            .parent_ids()
            .map(|oid| self.repo.find_commit(oid))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let first_parent_tree = match parents.first() {
            Some(parent) => Some(parent.tree()?),
            None => None,
        };
        let mut changes = self.tree_changes(first_parent_tree.as_ref(), &tree)?;

        for parent in parents.iter().skip(1) {
            let parent_tree = parent.tree()?;
            let changed: HashSet<String> = self
                .tree_changes(Some(&parent_tree), &tree)?
                .into_iter()
                .map(|change| change.path)
                .collect();
            changes.retain(|change| changed.contains(&change.path));
        }

        Ok(changes)
    }

    /// Flattened blob changes between two trees, gitlinks and symlinks excluded
    fn tree_changes(
        &self,
        old_tree: Option<&Tree>,
        new_tree: &Tree,
    ) -> std::result::Result<Vec<CommitChange>, git2::Error> {
        let mut options = DiffOptions::new();
        options.ignore_filemode(true).ignore_submodules(true);

        let mut diff = self
            .repo
            .diff_tree_to_tree(old_tree, Some(new_tree), Some(&mut options))?;

        if self.detect_renames {
            let mut find = DiffFindOptions::new();
            find.renames(true);
            diff.find_similar(Some(&mut find))?;
        }

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            if matches!(delta.status(), Delta::Unmodified | Delta::Ignored | Delta::Untracked) {
                continue;
            }

            let old_file = delta.old_file();
            let new_file = delta.new_file();

            let old_blob = blob_side(old_file.id(), old_file.mode());
            let new_blob = blob_side(new_file.id(), new_file.mode());
            if old_blob.is_none() && new_blob.is_none() {
                continue;
            }

            let path = match new_file.path().or_else(|| old_file.path()) {
                Some(path) => path.to_string_lossy().replace('\\', "/"),
                None => continue,
            };

            changes.push(CommitChange {
                old_blob,
                new_blob,
                path,
            });
        }

        Ok(changes)
    }
}

fn commit_read_error(oid: Oid, e: git2::Error) -> Error {
    Error::CommitRead {
        id: oid.to_string(),
        reason: e.message().to_string(),
    }
}

/// Lazy walk over the commits reachable from HEAD, newest first.
///
/// Commits are popped by committer time. A parent is never ranked above the
/// child it was found through, so clock skew cannot put it first. An
/// unreadable commit is yielded as an error and its ancestry is not followed;
/// everything still reachable through other commits is walked.
struct HistoryWalk<'r> {
    repo: &'r GitRepository,
    queue: BinaryHeap<(i64, Reverse<usize>, Oid)>,
    seen: HashSet<Oid>,
    pushed: usize,
}

impl<'r> HistoryWalk<'r> {
    fn new(repo: &'r GitRepository, head: Oid) -> Self {
        let mut walk = Self {
            repo,
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
            pushed: 0,
        };
        walk.seen.insert(head);
        walk.push(head, i64::MAX);
        walk
    }

    /// Queue `oid`, ranked no higher than `bound`
    fn push(&mut self, oid: Oid, bound: i64) {
        let time = match self.repo.repo.find_commit(oid) {
            Ok(commit) => commit.time().seconds().min(bound),
            Err(_) => bound,
        };
        self.queue.push((time, Reverse(self.pushed), oid));
        self.pushed += 1;
    }
}

impl<'r> Iterator for HistoryWalk<'r> {
    type Item = Result<CommitEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let (time, _, oid) = self.queue.pop()?;
        let repo = self.repo;

        let commit = match repo.repo.find_commit(oid) {
            Ok(commit) => commit,
            Err(e) => return Some(Err(commit_read_error(oid, e))),
        };

        for parent in commit.parent_ids() {
            if self.seen.insert(parent) {
                self.push(parent, time);
            }
        }

        Some(repo.commit_entry(&commit))
    }
}

/// Blob id of one side of a delta, `None` for absent, gitlink or symlink sides
fn blob_side(id: Oid, mode: FileMode) -> Option<String> {
    if id.is_zero() || matches!(mode, FileMode::Link | FileMode::Commit | FileMode::Unreadable) {
        return None;
    }
    Some(id.to_string())
}

impl ContentProvider for GitRepository {
    fn get_blob(&self, blob_ref: &str) -> Result<Vec<u8>> {
        let missing = |_| Error::BlobMissing(blob_ref.to_string());
        let oid = Oid::from_str(blob_ref).map_err(missing)?;
        let blob = self.repo.find_blob(oid).map_err(missing)?;
        Ok(blob.content().to_vec())
    }
}

impl RepositoryHandle for GitRepository {
    fn history(&self) -> Result<Box<dyn Iterator<Item = Result<CommitEntry>> + '_>> {
        if self.repo.is_empty()? {
            return Ok(Box::new(std::iter::empty()));
        }

        match self.repo.head()?.target() {
            Some(head) => Ok(Box::new(HistoryWalk::new(self, head))),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    fn origin_url(&self) -> Option<String> {
        let remote = self.repo.find_remote("origin").ok()?;
        remote.url().map(str::to_string)
    }

    fn location(&self) -> &Path {
        self.repo.workdir().unwrap_or(self.path.as_path())
    }
}

/// Expand a repository identifier to something `git clone` understands.
///
/// `owner/name` becomes a GitHub URL; URLs and existing local paths pass through.
pub fn repository_url(identifier: &str) -> String {
    let identifier = identifier.trim();
    if identifier.contains("://") || identifier.starts_with("git@") || Path::new(identifier).exists() {
        return identifier.to_string();
    }
    if SHORTHAND_REGEX.is_match(identifier) {
        return format!("https://github.com/{}", identifier);
    }
    identifier.to_string()
}

/// Directory name prefix for clones of `identifier`, `owner_name`
pub fn clone_prefix(identifier: &str) -> String {
    let trimmed = identifier.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let segments: Vec<&str> = trimmed
        .split(|c| c == '/' || c == ':')
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        [] => "repository".to_string(),
        [name] => name.to_string(),
        [.., owner, name] => format!("{}_{}", owner, name),
    }
}

/// Clone `identifier` into `path` and open it
pub fn acquire<P: AsRef<Path>>(identifier: &str, path: P) -> Result<GitRepository> {
    let url = repository_url(identifier);
    log::info!("Cloning {} into {}", url, path.as_ref().display());

    git2::build::RepoBuilder::new()
        .clone(&url, path.as_ref())
        .map_err(|e| Error::RepositoryAcquisition {
            identifier: identifier.to_string(),
            reason: e.message().to_string(),
        })?;

    GitRepository::open(path)
}

/// Find an existing clone of `identifier` directly under `directory`.
///
/// Candidates are directories whose name starts with the clone prefix, tried in
/// name order; the first one that opens as a repository wins.
pub fn locate_existing<P: AsRef<Path>>(directory: P, identifier: &str) -> Option<GitRepository> {
    let prefix = clone_prefix(identifier);

    WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .find_map(|entry| GitRepository::open(entry.path()).ok())
}

/// A clone living in a temporary directory, deleted on release or drop
pub struct TemporaryClone {
    // Declared first so the handle closes before the directory is removed
    repo: GitRepository,
    dir: TempDir,
}

impl TemporaryClone {
    /// Clone `identifier` into a fresh `owner_name_*` directory under `parent`
    pub fn create<P: AsRef<Path>>(identifier: &str, parent: P) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}_", clone_prefix(identifier)))
            .tempdir_in(parent.as_ref())
            .map_err(|e| Error::Resource(format!("cannot create clone directory: {}", e)))?;

        let repo = acquire(identifier, dir.path())?;
        Ok(Self { repo, dir })
    }

    pub fn repository(&self) -> &GitRepository {
        &self.repo
    }

    /// Close the handle and delete the clone
    pub fn close(self) -> Result<()> {
        let Self { repo, dir } = self;
        repo.close();
        dir.close()
            .map_err(|e| Error::Resource(format!("cannot remove temporary clone: {}", e)))
    }
}

/// A repository obtained for one mining task
pub enum AcquiredRepository {
    /// A clone found in the clone directory, left in place afterwards
    Existing(GitRepository),
    /// A clone made for this task, deleted afterwards
    Temporary(TemporaryClone),
}

impl AcquiredRepository {
    /// Reuse an existing clone of `identifier` under `clone_dir`, or make a
    /// temporary one there
    pub fn obtain<P: AsRef<Path>>(identifier: &str, clone_dir: P, detect_renames: bool) -> Result<Self> {
        let clone_dir = clone_dir.as_ref();

        if let Some(repo) = locate_existing(clone_dir, identifier) {
            log::info!("Using existing clone {}", repo.location().display());
            return Ok(Self::Existing(repo.with_rename_detection(detect_renames)));
        }

        let mut clone = TemporaryClone::create(identifier, clone_dir)?;
        clone.repo.detect_renames = detect_renames;
        Ok(Self::Temporary(clone))
    }

    pub fn handle(&self) -> &dyn RepositoryHandle {
        match self {
            Self::Existing(repo) => repo,
            Self::Temporary(clone) => clone.repository(),
        }
    }

    /// Release the handle, deleting a temporary clone
    pub fn release(self) -> Result<()> {
        match self {
            Self::Existing(repo) => {
                repo.close();
                Ok(())
            }
            Self::Temporary(clone) => clone.close(),
        }
    }
}
