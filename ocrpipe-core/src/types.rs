use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ===== INPUT =====

/// One document submitted to a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub path: PathBuf,
}

impl DocumentRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identity reported back in the `file` field of the result record.
    /// This is the path exactly as submitted.
    pub fn display_name(&self) -> String {
        self.path.display().to_string()
    }
}

impl From<PathBuf> for DocumentRequest {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for DocumentRequest {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<&str> for DocumentRequest {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

// ===== PER-PAGE INTERMEDIATES =====

/// Raster image for one page, written by the rasterizer into a
/// per-document temporary directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page index
    pub index: usize,
    pub path: PathBuf,
}

/// Recognized text for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// 1-based page index
    pub page: usize,
    pub text: String,
}

// ===== OUTPUT =====

/// Terminal outcome of one document's pipeline run.
///
/// Serializes flat, as either `{"file": ..., "text": ...}` or
/// `{"file": ..., "error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub file: String,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentOutcome {
    Text(String),
    Error(String),
}

impl DocumentResult {
    pub fn success(file: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            outcome: DocumentOutcome::Text(text.into()),
        }
    }

    pub fn failure(file: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            outcome: DocumentOutcome::Error(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DocumentOutcome::Text(_))
    }

    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            DocumentOutcome::Text(text) => Some(text),
            DocumentOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            DocumentOutcome::Text(_) => None,
            DocumentOutcome::Error(error) => Some(error),
        }
    }
}
