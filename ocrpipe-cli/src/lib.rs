// All core functionality is in ocrpipe-core
// This CLI acts as a thin wrapper around the core library

// CLI-specific modules
pub mod output;
pub mod tool_locator;

// Re-export core types for convenience
pub use ocrpipe_core::*;

// Re-export CLI utilities
pub use tool_locator::{ToolKind, ToolLocator};
