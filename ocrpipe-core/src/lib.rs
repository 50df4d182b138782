// ocrpipe Core Library
//
// Extracts text from page-image documents (scanned PDFs) by driving an
// external rasterizer and recognizer, for many documents concurrently.
// Main interface is `BatchOrchestrator::run`.

pub mod capability;
pub mod config;
pub mod error;
pub mod extraction;
pub mod orchestrator;
pub mod process;
pub mod types;

// Re-export main types and functions for easy use
pub use types::*;
pub use capability::{Capability, CapabilityState, Strategy};
pub use config::{CapabilityPolicy, OcrConfig};
pub use error::{OcrError, Result};
pub use extraction::{ExtractionOptions, PageExtractor};
pub use orchestrator::BatchOrchestrator;
pub use process::{CommandRunner, Invocation, SystemRunner, ToolOutput};
