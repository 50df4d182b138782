use crate::error::{OcrError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory / file name used for config discovery
const APP_DIR: &str = "ocrpipe";
const CONFIG_FILE: &str = "config.yaml";
const LOCAL_CONFIG_FILE: &str = "ocrpipe.yaml";

// Default value functions for serde
fn default_dpi() -> u32 {
    300
}

fn default_lang() -> String {
    "eng".to_string()
}

fn default_rasterizer() -> String {
    "pdftoppm".to_string()
}

fn default_recognizer() -> String {
    "tesseract".to_string()
}

fn default_image_prefix() -> String {
    "page".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

/// How the rasterizer integration strategy is chosen for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityPolicy {
    /// Probe the rasterizer once for stdout streaming support
    Probe,
    /// Skip the probe and always render to temporary files
    #[default]
    FileBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Rasterization resolution, also passed to the recognizer as a DPI hint
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Recognizer language code (e.g. "eng", "eng+deu")
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Worker pool size; `None` uses available hardware parallelism
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub capability: CapabilityPolicy,
    /// Rasterizer executable (name on PATH or explicit path)
    #[serde(default = "default_rasterizer")]
    pub rasterizer: String,
    /// Recognizer executable (name on PATH or explicit path)
    #[serde(default = "default_recognizer")]
    pub recognizer: String,
    /// File-name prefix for page images in the file-based strategy
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Kill any single tool invocation that runs longer than this
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
    /// Log per-stage timings for every document
    #[serde(default)]
    pub profile: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            lang: default_lang(),
            workers: None,
            capability: CapabilityPolicy::default(),
            rasterizer: default_rasterizer(),
            recognizer: default_recognizer(),
            image_prefix: default_image_prefix(),
            probe_timeout_ms: default_probe_timeout_ms(),
            tool_timeout_secs: None,
            profile: false,
        }
    }
}

impl OcrConfig {
    /// Load config from a YAML (or JSON) file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| OcrError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Candidate config locations, first existing file wins
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            candidates.push(PathBuf::from(xdg).join(APP_DIR).join(CONFIG_FILE));
        }
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(APP_DIR).join(CONFIG_FILE));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(format!(".{APP_DIR}")).join(CONFIG_FILE));
        }
        candidates.push(PathBuf::from(LOCAL_CONFIG_FILE));
        candidates.dedup();
        candidates
    }

    /// Search the standard locations; unreadable candidates are skipped
    pub fn discover() -> Option<(PathBuf, Self)> {
        Self::discover_in(&Self::candidate_paths())
    }

    pub fn discover_in(candidates: &[PathBuf]) -> Option<(PathBuf, Self)> {
        for candidate in candidates {
            if !candidate.is_file() {
                continue;
            }
            match Self::load_from_file(candidate) {
                Ok(config) => return Some((candidate.clone(), config)),
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "Skipping unreadable config");
                }
            }
        }
        None
    }

    /// Load an explicit config file, or fall back to discovery, then defaults
    ///
    /// An explicit path that cannot be loaded is an error; only discovered
    /// candidates are skipped when broken.
    pub fn load_with_fallback(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => {
                let config = Self::load_from_file(p)?;
                tracing::info!("Loaded config from: {}", p);
                Ok(config)
            }
            None => Ok(Self::discover()
                .map(|(path, config)| {
                    tracing::debug!(path = %path.display(), "Loaded discovered config");
                    config
                })
                .unwrap_or_default()),
        }
    }

    /// Apply `OCRPIPE_*` environment overrides on top of file values
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("OCRPIPE_DPI") {
            match raw.trim().parse::<u32>() {
                Ok(dpi) => self.dpi = dpi,
                Err(_) => tracing::warn!("Ignoring invalid OCRPIPE_DPI value: {}", raw),
            }
        }
        if let Some(lang) = lookup("OCRPIPE_LANG").filter(|v| !v.trim().is_empty()) {
            self.lang = lang.trim().to_string();
        }
        if let Some(raw) = lookup("OCRPIPE_WORKERS") {
            match raw.trim().parse::<usize>() {
                Ok(workers) if workers > 0 => self.workers = Some(workers),
                _ => tracing::warn!("Ignoring invalid OCRPIPE_WORKERS value: {}", raw),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| OcrError::Config {
            path: "<effective config>".to_string(),
            message: message.to_string(),
        };
        if self.dpi == 0 {
            return Err(invalid("dpi must be greater than zero"));
        }
        if self.lang.trim().is_empty() {
            return Err(invalid("lang must not be empty"));
        }
        if self.workers == Some(0) {
            return Err(invalid("workers must be at least 1"));
        }
        if self.image_prefix.is_empty() || self.image_prefix.contains(['/', '\\']) {
            return Err(invalid("image_prefix must be a plain file name"));
        }
        Ok(())
    }

    /// Effective worker pool size
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}
