//! Emitted records and author identity parsing.

use serde::{Deserialize, Serialize};

/// Commit author split out of a raw `Name <email>` string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    /// Parse a raw author string such as `Jane Doe <jane@example.com>`.
    ///
    /// The name is everything before the first `<`, trimmed. The email runs from
    /// the first `<` to the end of the string, minus a terminal `>`.
    ///
    /// A string without `<` never fails. It is kept as a bare name with an
    /// empty email instead of being blanked, so bot identities such as
    /// `buildbot` stay attributable.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        match raw.find('<') {
            Some(idx) => {
                let rest = &raw[idx + 1..];
                let email = rest.strip_suffix('>').unwrap_or(rest);
                Self {
                    name: raw[..idx].trim().to_string(),
                    email: email.trim().to_string(),
                }
            }
            None => Self {
                name: raw.to_string(),
                email: String::new(),
            },
        }
    }
}

/// The per-file part of a record, produced by the change classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFragment {
    pub file_path: String,
    pub blob_id: String,
    pub added_lines: usize,
    pub deleted_lines: usize,
    pub programming_language: String,
}

/// One qualifying file change, attributed to its commit and author.
///
/// Records are only built once every field is known; a change without a
/// detected language never becomes a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub repository_url: String,
    pub author_name: String,
    pub author_email: String,
    pub commit_id: String,
    pub file_path: String,
    pub blob_id: String,
    pub added_lines: usize,
    pub deleted_lines: usize,
    pub programming_language: String,
}

impl ChangeRecord {
    /// Attach commit metadata to a classified change
    pub fn new(repository_url: &str, author: &Author, commit_id: &str, fragment: ChangeFragment) -> Self {
        Self {
            repository_url: repository_url.to_string(),
            author_name: author.name.clone(),
            author_email: author.email.clone(),
            commit_id: commit_id.to_string(),
            file_path: fragment.file_path,
            blob_id: fragment.blob_id,
            added_lines: fragment.added_lines,
            deleted_lines: fragment.deleted_lines,
            programming_language: fragment.programming_language,
        }
    }

    /// Whether a downstream stage supporting `languages` should parse this file
    pub fn is_in_languages<S: AsRef<str>>(&self, languages: &[S]) -> bool {
        languages
            .iter()
            .any(|language| language.as_ref().eq_ignore_ascii_case(&self.programming_language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_author() {
        let author = Author::parse("Jane Doe <jane@example.com>");
        assert_eq!(author.name, "Jane Doe");
        assert_eq!(author.email, "jane@example.com");
    }

    #[test]
    fn test_parse_author_edge_cases() {
        let padded = Author::parse("  Jane   <jane@example.com>  ");
        assert_eq!(padded.name, "Jane");
        assert_eq!(padded.email, "jane@example.com");

        let unterminated = Author::parse("Jane <jane@example.com");
        assert_eq!(unterminated.email, "jane@example.com");

        let no_name = Author::parse("<bot@example.com>");
        assert_eq!(no_name.name, "");
        assert_eq!(no_name.email, "bot@example.com");

        let bare = Author::parse("root");
        assert_eq!(bare, Author { name: "root".to_string(), email: String::new() });

        assert_eq!(Author::parse(""), Author::default());
    }

    #[test]
    fn test_record_serialization_field_names() -> crate::Result<()> {
        let fragment = ChangeFragment {
            file_path: "src/app.py".to_string(),
            blob_id: "b1".to_string(),
            added_lines: 4,
            deleted_lines: 1,
            programming_language: "python".to_string(),
        };
        let author = Author::parse("Jane Doe <jane@example.com>");
        let record = ChangeRecord::new("https://github.com/o/r", &author, "c1", fragment);

        let value = serde_json::to_value(&record)?;
        assert_eq!(
            value,
            serde_json::json!({
                "repository_url": "https://github.com/o/r",
                "author_name": "Jane Doe",
                "author_email": "jane@example.com",
                "commit_id": "c1",
                "file_path": "src/app.py",
                "blob_id": "b1",
                "added_lines": 4,
                "deleted_lines": 1,
                "programming_language": "python",
            })
        );

        assert!(record.is_in_languages(&["java", "Python"]));
        assert!(!record.is_in_languages(&["java"]));
        Ok(())
    }
}
