//! Per-repository memo of file languages.

use std::collections::HashMap;

/// Remembers the language determined for each path during one repository walk.
///
/// The first determination for a path wins, including "no language": later
/// revisions of the same path reuse it even if their content changed. This
/// trades accuracy for far fewer classifier invocations on long histories.
#[derive(Debug, Default, Clone)]
pub struct LanguageRegistry {
    languages: HashMap<String, Option<String>>,
}

impl LanguageRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a determination exists for `file_path`
    pub fn is_defined(&self, file_path: &str) -> bool {
        self.languages.contains_key(file_path)
    }

    /// Cached determination for a path.
    ///
    /// Returns `None` when the path was never classified, `Some(None)` when it
    /// was classified as having no language.
    pub fn get(&self, file_path: &str) -> Option<Option<&str>> {
        self.languages.get(file_path).map(|language| language.as_deref())
    }

    /// Record a determination unless one already exists for the path
    pub fn insert(&mut self, file_path: &str, language: Option<String>) {
        if !self.is_defined(file_path) {
            self.languages.insert(file_path.to_string(), language);
        }
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_determination_wins() {
        let mut registry = LanguageRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.get("src/app.py"), None);

        registry.insert("src/app.py", Some("python".to_string()));
        registry.insert("src/app.py", Some("cython".to_string()));

        assert_eq!(registry.get("src/app.py"), Some(Some("python")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_absent_language_is_cached() {
        let mut registry = LanguageRegistry::new();
        registry.insert("assets/logo.png", None);

        assert!(registry.is_defined("assets/logo.png"));
        assert_eq!(registry.get("assets/logo.png"), Some(None));

        registry.insert("assets/logo.png", Some("text".to_string()));
        assert_eq!(registry.get("assets/logo.png"), Some(None));
    }
}
