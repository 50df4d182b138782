//! Tool Locator - find the rasterizer and recognizer executables
//!
//! Resolution order for each tool:
//! 1. Explicit command-line flag
//! 2. `OCRPIPE_RASTERIZER` / `OCRPIPE_RECOGNIZER`
//! 3. The bare tool name, if it is on `PATH`
//! 4. Well-known install directories (Homebrew, /usr/local, /usr)
//!
//! When nothing matches, the bare name is kept so the batch pre-check reports
//! it as missing.

use ocrpipe_core::process::locate_executable;
use std::path::PathBuf;

/// Directories package managers commonly install into, which may be missing
/// from `PATH` for GUI-launched or cron environments
const WELL_KNOWN_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Rasterizer,
    Recognizer,
}

impl ToolKind {
    pub fn env_var(self) -> &'static str {
        match self {
            ToolKind::Rasterizer => "OCRPIPE_RASTERIZER",
            ToolKind::Recognizer => "OCRPIPE_RECOGNIZER",
        }
    }
}

pub struct ToolLocator {
    search_dirs: Vec<PathBuf>,
    env: Box<dyn Fn(&str) -> Option<String>>,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolLocator {
    pub fn new() -> Self {
        Self {
            search_dirs: WELL_KNOWN_DIRS.iter().map(PathBuf::from).collect(),
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Locator with custom fallback directories and environment lookup
    pub fn with_sources(
        search_dirs: Vec<PathBuf>,
        env: impl Fn(&str) -> Option<String> + 'static,
    ) -> Self {
        Self {
            search_dirs,
            env: Box::new(env),
        }
    }

    /// Command to run for `kind`
    ///
    /// `configured` is the name from the config file (or the default), used
    /// for the PATH and directory search.
    pub fn resolve(&self, kind: ToolKind, explicit: Option<&str>, configured: &str) -> String {
        if let Some(path) = explicit {
            tracing::debug!("Using {:?} from command line: {}", kind, path);
            return path.to_string();
        }

        if let Some(path) = (self.env)(kind.env_var()).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("Using {:?} from {}: {}", kind, kind.env_var(), path);
            return path;
        }

        if locate_executable(configured).is_some() {
            return configured.to_string();
        }

        for dir in &self.search_dirs {
            let candidate = dir.join(configured);
            if let Some(found) = candidate.to_str().and_then(locate_executable) {
                tracing::info!("{} not on PATH, using {}", configured, found.display());
                return found.display().to_string();
            }
        }

        configured.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_explicit_flag_wins() {
        let locator = ToolLocator::with_sources(Vec::new(), |_| Some("/env/pdftoppm".to_string()));
        assert_eq!(
            locator.resolve(ToolKind::Rasterizer, Some("/flag/pdftoppm"), "pdftoppm"),
            "/flag/pdftoppm"
        );
    }

    #[test]
    fn test_env_var_beats_search() {
        let locator = ToolLocator::with_sources(Vec::new(), |key| {
            (key == "OCRPIPE_RECOGNIZER").then(|| "/env/tesseract".to_string())
        });
        assert_eq!(
            locator.resolve(ToolKind::Recognizer, None, "tesseract"),
            "/env/tesseract"
        );
        // Unrelated variable does not leak into the other tool
        assert_eq!(
            locator.resolve(ToolKind::Rasterizer, None, "ocrpipe-test-absent"),
            "ocrpipe-test-absent"
        );
    }

    #[test]
    fn test_blank_env_var_is_ignored() {
        let locator = ToolLocator::with_sources(Vec::new(), |_| Some("  ".to_string()));
        assert_eq!(
            locator.resolve(ToolKind::Rasterizer, None, "ocrpipe-test-absent"),
            "ocrpipe-test-absent"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_falls_back_to_well_known_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("ocrpipe-test-rasterizer");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let locator = ToolLocator::with_sources(vec![PathBuf::from("/nonexistent"), dir.path().to_path_buf()], no_env);
        assert_eq!(
            locator.resolve(ToolKind::Rasterizer, None, "ocrpipe-test-rasterizer"),
            tool.display().to_string()
        );
    }

    #[test]
    fn test_unresolved_keeps_bare_name() {
        let locator = ToolLocator::with_sources(vec![PathBuf::from("/nonexistent")], no_env);
        assert_eq!(
            locator.resolve(ToolKind::Recognizer, None, "ocrpipe-test-absent"),
            "ocrpipe-test-absent"
        );
    }
}
