//! Error taxonomy for the OCR pipeline
//!
//! Errors fall into two classes:
//! - **Fatal**: detected before any document is scheduled (missing input,
//!   missing tool, bad config). They abort the whole batch.
//! - **Per-document**: raised inside one document's pipeline run. The
//!   orchestrator turns them into that document's `error` record.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OcrError>;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("required executable not found: {name}")]
    MissingExecutable { name: String },

    #[error("file not found: {}", .path.display())]
    InputNotFound { path: PathBuf },

    #[error("{tool} exited with {}{}", describe_code(.code), describe_stderr(.stderr))]
    ExternalTool {
        tool: String,
        /// `None` when the process was terminated by a signal
        code: Option<i32>,
        stderr: String,
    },

    #[error("no images produced by rasterizer for {}", .path.display())]
    NoOutputProduced { path: PathBuf },

    #[error("{tool} did not finish within {}s and was killed", .after.as_secs_f64())]
    Timeout { tool: String, after: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration in {path}: {message}")]
    Config { path: String, message: String },

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl OcrError {
    /// Fatal errors abort the batch before any document is processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OcrError::MissingExecutable { .. }
                | OcrError::InputNotFound { .. }
                | OcrError::Config { .. }
                | OcrError::WorkerPool(_)
        )
    }

    pub(crate) fn tool_failure(tool: &str, code: Option<i32>, stderr: &[u8]) -> Self {
        OcrError::ExternalTool {
            tool: tool.to_string(),
            code,
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
