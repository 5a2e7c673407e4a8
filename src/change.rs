//! Per-file change classification.
//!
//! Turns one tree change of a commit into a [`ChangeFragment`]: line counts from
//! the diff engine plus the language from the classifier, or `None` when the
//! change does not qualify (deletion, no content change, too small, no language).

use serde::{Deserialize, Serialize};

use crate::blob::Decoding;
use crate::classifier::{classify, Classifier};
use crate::diff::{diff_line_counts, line_count};
use crate::record::ChangeFragment;
use crate::registry::LanguageRegistry;
use crate::Result;

/// A single file-level delta between a commit and its parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitChange {
    /// Blob before the change, `None` when the file was created
    pub old_blob: Option<String>,
    /// Blob after the change, `None` when the file was deleted
    pub new_blob: Option<String>,
    /// Repository-relative path, new side preferred
    pub path: String,
}

impl CommitChange {
    pub fn added(path: impl Into<String>, new_blob: impl Into<String>) -> Self {
        Self {
            old_blob: None,
            new_blob: Some(new_blob.into()),
            path: path.into(),
        }
    }

    pub fn modified(
        path: impl Into<String>,
        old_blob: impl Into<String>,
        new_blob: impl Into<String>,
    ) -> Self {
        Self {
            old_blob: Some(old_blob.into()),
            new_blob: Some(new_blob.into()),
            path: path.into(),
        }
    }

    pub fn deleted(path: impl Into<String>, old_blob: impl Into<String>) -> Self {
        Self {
            old_blob: Some(old_blob.into()),
            new_blob: None,
            path: path.into(),
        }
    }
}

/// Retrieves blob content by reference
pub trait ContentProvider {
    /// Raw bytes of the blob, or [`crate::Error::BlobMissing`]
    fn get_blob(&self, blob_ref: &str) -> Result<Vec<u8>>;
}

/// Policies applied while classifying a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ChangeOptions {
    /// How blob bytes become text for line counting
    pub decoding: Decoding,
    /// Drop changes adding fewer lines than this
    pub min_added_lines: Option<usize>,
}

/// Classify one change of a commit.
///
/// # Arguments
///
/// * `change` - The tree change to classify
/// * `content` - Blob source for both sides of the change
/// * `registry` - The walk's language registry, updated on first sight of a path
/// * `classifier` - Language classification capability
/// * `options` - Decoding and size policies
///
/// # Returns
///
/// * `Result<Option<ChangeFragment>>` - The fragment, `None` to skip the change,
///   or the error that made the change unreadable
pub fn classify_change<C: ContentProvider + ?Sized>(
    change: &CommitChange,
    content: &C,
    registry: &mut LanguageRegistry,
    classifier: &dyn Classifier,
    options: &ChangeOptions,
) -> Result<Option<ChangeFragment>> {
    let new_blob = match &change.new_blob {
        Some(new_blob) => new_blob,
        None => {
            log::debug!("Skipping deleted file {}", change.path);
            return Ok(None);
        }
    };

    if change.old_blob.as_ref() == Some(new_blob) {
        log::debug!("Skipping {}: content unchanged", change.path);
        return Ok(None);
    }

    let new_data = content.get_blob(new_blob)?;
    let new_text = options.decoding.decode(&new_data)?;

    let (added_lines, deleted_lines) = match &change.old_blob {
        None => (line_count(&new_text), 0),
        Some(old_blob) => {
            let old_data = content.get_blob(old_blob)?;
            let old_text = options.decoding.decode(&old_data)?;
            diff_line_counts(&old_text, &new_text)
        }
    };

    if let Some(min_added_lines) = options.min_added_lines {
        if added_lines < min_added_lines {
            log::debug!(
                "Skipping {}: {} added lines is below {}",
                change.path,
                added_lines,
                min_added_lines
            );
            return Ok(None);
        }
    }

    let programming_language = match classify(&change.path, &new_data, registry, classifier)? {
        Some(language) => language,
        None => {
            log::debug!("Skipping {}: no language", change.path);
            return Ok(None);
        }
    };

    Ok(Some(ChangeFragment {
        file_path: change.path.clone(),
        blob_id: new_blob.clone(),
        added_lines,
        deleted_lines,
        programming_language,
    }))
}
