//! Blob content handling.
//!
//! This module provides the view over one version of a file's bytes that the
//! classifiers and the change classifier work with: binary sniffing, file name
//! helpers and the decoding policy that turns bytes into diffable text.

use std::borrow::Cow;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// Same window git uses when it decides whether a blob is binary
const BINARY_SNIFF_BYTES: usize = 8000;

/// How blob bytes are turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decoding {
    /// Single-byte ISO-8859-1; every byte sequence decodes
    #[default]
    Latin1,
    /// Strict UTF-8; invalid sequences are a decode error
    Utf8,
}

impl Decoding {
    /// Decode raw blob bytes into text.
    ///
    /// # Arguments
    ///
    /// * `data` - The raw blob content
    ///
    /// # Returns
    ///
    /// * `Result<Cow<str>>` - The decoded text, borrowed when no conversion was needed
    pub fn decode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, str>> {
        match self {
            Decoding::Latin1 => Ok(encoding_rs::mem::decode_latin1(data)),
            Decoding::Utf8 => std::str::from_utf8(data)
                .map(Cow::Borrowed)
                .map_err(|e| Error::Decode(e.to_string())),
        }
    }
}

/// Trait for objects that expose a named blob
pub trait BlobView {
    /// Get the repository-relative path of the blob
    fn name(&self) -> &str;

    /// Get the raw content
    fn data(&self) -> &[u8];

    /// Get the final path component
    fn file_name(&self) -> &str {
        self.name().rsplit('/').next().unwrap_or_default()
    }

    /// Get the file extension, without the leading dot
    fn extension(&self) -> Option<&str> {
        let file_name = self.file_name();
        match file_name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&file_name[idx + 1..]),
        }
    }

    /// Check if the content looks binary (a NUL byte near the start)
    fn is_binary(&self) -> bool {
        let data = self.data();
        let window = &data[..data.len().min(BINARY_SNIFF_BYTES)];
        window.contains(&0)
    }

    /// Check if the file is likely binary from its extension alone
    fn likely_binary(&self) -> bool {
        match self.extension() {
            Some(ext) => {
                let ext = ext.to_lowercase();
                [
                    "png", "jpg", "jpeg", "gif", "ico", "pdf", "zip", "gz", "tar", "tgz", "jar",
                    "exe", "dll", "so", "o", "a", "class", "pyc", "woff", "woff2", "ttf",
                ]
                .contains(&ext.as_str())
            }
            None => false,
        }
    }

    /// Check if the file is a text file
    fn is_text(&self) -> bool {
        !self.is_binary() && !self.likely_binary()
    }
}

/// An in-memory blob: a path plus the bytes of one version of the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobContent {
    path: String,
    data: Vec<u8>,
}

impl BlobContent {
    /// Create a blob from its path and content
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Read a blob from a file on disk, keeping the given path as its name
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Ok(Self::new(path.to_string_lossy().replace('\\', "/"), data))
    }
}

impl BlobView for BlobContent {
    fn name(&self) -> &str {
        &self.path
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_file_blob() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, b"This is a test")?;

        let blob = BlobContent::from_file(&file_path)?;

        assert_eq!(blob.file_name(), "test.txt");
        assert_eq!(blob.extension(), Some("txt"));
        assert_eq!(blob.data(), b"This is a test");
        assert!(!blob.is_binary());
        assert!(blob.is_text());

        Ok(())
    }

    #[test]
    fn test_extension_edge_cases() {
        assert_eq!(BlobContent::new("src/lib.rs", vec![]).extension(), Some("rs"));
        assert_eq!(BlobContent::new("a/b/archive.tar.gz", vec![]).extension(), Some("gz"));
        assert_eq!(BlobContent::new("Makefile", vec![]).extension(), None);
        assert_eq!(BlobContent::new("conf/.gitignore", vec![]).extension(), None);
        assert_eq!(BlobContent::new("conf/.gitignore", vec![]).file_name(), ".gitignore");
    }

    #[test]
    fn test_binary_detection() {
        let blob = BlobContent::new("binary.bin", vec![0, 1, 2, 3, 0, 5]);
        assert!(blob.is_binary());
        assert!(!blob.is_text());

        let image = BlobContent::new("logo.PNG", b"not really".to_vec());
        assert!(!image.is_binary());
        assert!(image.likely_binary());
    }

    #[test]
    fn test_latin1_never_fails() -> Result<()> {
        let bytes = [0x63, 0x61, 0x66, 0xE9, 0xFF, 0x80];
        let text = Decoding::Latin1.decode(&bytes)?;
        assert_eq!(text.chars().count(), bytes.len());
        assert!(text.starts_with("caf\u{e9}"));
        Ok(())
    }

    #[test]
    fn test_utf8_rejects_invalid() {
        let result = Decoding::Utf8.decode(&[0x66, 0xFF, 0xFE]);
        assert!(matches!(result, Err(Error::Decode(_))));
        assert_eq!(Decoding::Utf8.decode(b"ok").unwrap(), "ok");
    }
}
