//! Language classification of changed files.
//!
//! The walk delegates detection to a [`Classifier`]: either the external
//! `enry` tool, driven through a scratch file and its JSON output, or the
//! in-process [`BuiltinClassifier`]. [`classify`] wraps both with the
//! per-repository [`LanguageRegistry`] so each path is classified once.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::blob::BlobView;
use crate::registry::LanguageRegistry;
use crate::{language, vendor, Error, Result};

/// Default limit for a single external classifier run
pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(30);

lazy_static::lazy_static! {
    static ref SHEBANG_REGEX: Regex = Regex::new(r"^#!\s*(\S+)(?:[ \t]+(\S+))?").unwrap();
}

/// Result of classifying one file
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Classification {
    /// Content kind as reported by the classifier ("Text", "Binary", ...)
    #[serde(rename = "type", alias = "content_kind", default)]
    pub content_kind: String,

    /// Whether the path is third-party or generated code
    #[serde(default)]
    pub vendored: bool,

    /// Detected language name, empty when unknown
    #[serde(default)]
    pub language: String,
}

impl Classification {
    pub fn new(content_kind: &str, vendored: bool, language: &str) -> Self {
        Self {
            content_kind: content_kind.to_string(),
            vendored,
            language: language.to_string(),
        }
    }

    /// The lower-cased language, if this file counts for authorship analysis.
    ///
    /// Non-text content, vendored paths and unknown languages yield `None`.
    pub fn language(&self) -> Option<String> {
        if !self.content_kind.eq_ignore_ascii_case("text")
            || self.vendored
            || self.language.is_empty()
        {
            return None;
        }
        Some(self.language.to_lowercase())
    }
}

/// A language detection capability.
///
/// Implementations are shared read-only between repository workers.
pub trait Classifier: Send + Sync {
    /// Classify one file from its repository-relative path and raw content
    fn classify(&self, file_path: &str, content: &[u8]) -> Result<Classification>;
}

/// Classify a file through the registry.
///
/// A cached determination is returned without invoking the classifier. A fresh
/// determination is recorded in the registry, including "no language".
/// Classifier failures are logged and count as "no language" for this call;
/// only errors fatal to the whole repository are returned.
///
/// # Arguments
///
/// * `file_path` - Repository-relative path of the file
/// * `content` - Raw content of the file version being classified
/// * `registry` - The walk's language registry
/// * `classifier` - The classification capability
///
/// # Returns
///
/// * `Result<Option<String>>` - The lower-cased language, or `None` to skip the file
pub fn classify(
    file_path: &str,
    content: &[u8],
    registry: &mut LanguageRegistry,
    classifier: &dyn Classifier,
) -> Result<Option<String>> {
    if let Some(cached) = registry.get(file_path) {
        return Ok(cached.map(str::to_string));
    }

    match classifier.classify(file_path, content) {
        Ok(classification) => {
            let language = classification.language();
            registry.insert(file_path, language.clone());
            Ok(language)
        }
        Err(err) if err.is_fatal_to_repository() => Err(err),
        Err(err) => {
            log::warn!("Classification of {} failed: {}", file_path, err);
            Ok(None)
        }
    }
}

/// Classifier backed by the external `enry` command line tool
#[derive(Debug, Clone)]
pub struct EnryClassifier {
    /// Path of the enry executable
    program: PathBuf,
    /// Directory for scratch files, the system temp dir when unset
    temp_dir: Option<PathBuf>,
    /// Limit for one enry run
    timeout: Duration,
}

impl EnryClassifier {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            temp_dir: None,
            timeout: DEFAULT_CLASSIFIER_TIMEOUT,
        }
    }

    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, temp_dir: P) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Write `content` to a uniquely named scratch file that keeps the
    /// original extension, so the tool can use it for detection.
    ///
    /// The file is deleted when the returned handle is dropped.
    fn scratch_file(&self, file_path: &str, content: &[u8]) -> Result<tempfile::NamedTempFile> {
        let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
        let (stem, suffix) = match file_name.rfind('.') {
            Some(idx) if idx > 0 => (&file_name[..idx], &file_name[idx..]),
            _ => (file_name, ""),
        };
        let prefix = format!("{}_", stem.split('.').next().unwrap_or(stem));

        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(suffix);

        let created = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut scratch = created
            .map_err(|e| Error::Resource(format!("cannot create scratch file: {}", e)))?;

        scratch
            .write_all(content)
            .and_then(|_| scratch.flush())
            .map_err(|e| Error::Resource(format!("cannot write scratch file: {}", e)))?;

        Ok(scratch)
    }

    /// Run the tool on `scratch` and return its standard output
    fn run(&self, file_path: &str, scratch: &Path) -> Result<String> {
        let failure = |reason: String| Error::Classification {
            path: file_path.to_string(),
            reason,
        };

        let mut child = Command::new(&self.program)
            .arg("-json")
            .arg(scratch)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| failure(format!("cannot start {}: {}", self.program.display(), e)))?;

        let mut stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(failure("no stdout handle".to_string()));
            }
        };

        // Read on a helper thread so a hung process can be killed on timeout
        let (sender, receiver) = bounded(1);
        thread::spawn(move || {
            let mut output = String::new();
            let result = stdout.read_to_string(&mut output).map(|_| output);
            let _ = sender.send(result);
        });

        match receiver.recv_timeout(self.timeout) {
            Ok(Ok(output)) => {
                let status = child
                    .wait()
                    .map_err(|e| failure(format!("cannot wait for process: {}", e)))?;
                if !status.success() {
                    return Err(failure(format!("exited with {}", status)));
                }
                Ok(output)
            }
            Ok(Err(e)) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(failure(format!("cannot read output: {}", e)))
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(failure(format!("timed out after {:?}", self.timeout)))
            }
        }
    }
}

impl Classifier for EnryClassifier {
    fn classify(&self, file_path: &str, content: &[u8]) -> Result<Classification> {
        let scratch = self.scratch_file(file_path, content)?;
        let output = self.run(file_path, scratch.path());
        // Removes the scratch file whatever the outcome
        drop(scratch);

        let output = output?;
        serde_json::from_str(output.trim()).map_err(|e| Error::Classification {
            path: file_path.to_string(),
            reason: format!("malformed output: {}", e),
        })
    }
}

/// A borrowed blob, so classification does not copy file contents
struct BorrowedBlob<'a> {
    path: &'a str,
    data: &'a [u8],
}

impl BlobView for BorrowedBlob<'_> {
    fn name(&self) -> &str {
        self.path
    }

    fn data(&self) -> &[u8] {
        self.data
    }
}

/// In-process classifier: binary sniffing, vendored paths and a static
/// filename/extension/shebang table
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinClassifier;

impl BuiltinClassifier {
    /// Map the interpreter of a shebang line to a language
    fn interpreter_language(data: &[u8]) -> Option<&'static str> {
        let first_line = data.split(|&b| b == b'\n').next()?;
        let first_line = std::str::from_utf8(first_line).ok()?;
        let captures = SHEBANG_REGEX.captures(first_line)?;
        let program = captures.get(1)?.as_str().rsplit('/').next()?;
        let interpreter = if program == "env" {
            captures.get(2)?.as_str()
        } else {
            program
        };

        let language = match interpreter.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.') {
            "python" => "Python",
            "sh" | "bash" | "zsh" | "dash" | "ksh" => "Shell",
            "node" | "nodejs" => "JavaScript",
            "ruby" => "Ruby",
            "perl" => "Perl",
            "php" => "PHP",
            "lua" => "Lua",
            _ => return None,
        };
        Some(language)
    }
}

impl Classifier for BuiltinClassifier {
    fn classify(&self, file_path: &str, content: &[u8]) -> Result<Classification> {
        let blob = BorrowedBlob {
            path: file_path,
            data: content,
        };

        if !blob.is_text() {
            return Ok(Classification::new("Binary", false, ""));
        }

        let language = language::find_by_filename(blob.file_name())
            .or_else(|| blob.extension().and_then(language::find_by_extension))
            .or_else(|| Self::interpreter_language(blob.data()))
            .unwrap_or_default();

        Ok(Classification::new(
            "Text",
            vendor::is_vendored(file_path),
            language,
        ))
    }
}
