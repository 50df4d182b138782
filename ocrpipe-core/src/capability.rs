//! Capability Prober
//!
//! Decides once per run whether the rasterizer can stream raster bytes on
//! stdout, which enables the pipe-to-recognizer fast path. Rasterizer
//! versions disagree on honoring the stdout sentinel (some silently write a
//! `-.ppm` file instead), so the default policy pins the file-based strategy
//! and never probes.

use crate::config::CapabilityPolicy;
use crate::process::{CommandRunner, Invocation};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Smallest PDF the rasterizer will accept: one blank 1x1 inch page
const PROBE_PDF: &[u8] = b"%PDF-1.1
1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj
2 0 obj<</Type/Pages/Kids[3 0 R]/Count 1>>endobj
3 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 72 72]>>endobj
trailer<</Root 1 0 R>>
%%EOF
";

/// Probe resolution; the probe only cares whether any bytes come back
const PROBE_DPI: &str = "10";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    StreamingSupported,
    FileBasedOnly,
}

/// Integration strategy consumed by the extraction pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Streaming,
    FileBased,
}

impl From<Capability> for Strategy {
    fn from(capability: Capability) -> Self {
        match capability {
            Capability::StreamingSupported => Strategy::Streaming,
            Capability::FileBasedOnly => Strategy::FileBased,
        }
    }
}

/// Run the streaming probe against `rasterizer`
///
/// Never fails: a missing binary, timeout, or I/O problem all mean
/// [`Capability::FileBasedOnly`].
pub fn probe_streaming(runner: &dyn CommandRunner, rasterizer: &str, timeout: Duration) -> Capability {
    let dir = match tempfile::Builder::new().prefix("ocrpipe_probe_").tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!("Could not create probe directory, assuming no streaming: {}", e);
            return Capability::FileBasedOnly;
        }
    };
    let probe_path = dir.path().join("probe.pdf");
    if let Err(e) = std::fs::write(&probe_path, PROBE_PDF) {
        tracing::warn!("Could not write probe document, assuming no streaming: {}", e);
        return Capability::FileBasedOnly;
    }

    let invocation = Invocation::new(rasterizer)
        .args(["-r", PROBE_DPI])
        .arg(&probe_path)
        .arg("-")
        .timeout(Some(timeout));

    match runner.run(&invocation) {
        Ok(output) if !output.stdout.is_empty() => Capability::StreamingSupported,
        Ok(_) => {
            tracing::debug!("{} wrote nothing to stdout during probe", rasterizer);
            Capability::FileBasedOnly
        }
        Err(e) => {
            tracing::debug!("Streaming probe failed: {}", e);
            Capability::FileBasedOnly
        }
    }
}

/// Capability shared by every document pipeline in a run
///
/// Resolved once before any document is scheduled. The only mutation after
/// that is a one-way downgrade to file-based, taken when the streaming path
/// comes back empty.
#[derive(Debug)]
pub struct CapabilityState {
    resolved: Capability,
    downgraded: AtomicBool,
}

impl CapabilityState {
    pub fn fixed(capability: Capability) -> Self {
        Self {
            resolved: capability,
            downgraded: AtomicBool::new(false),
        }
    }

    pub fn resolve(
        policy: CapabilityPolicy,
        runner: &dyn CommandRunner,
        rasterizer: &str,
        probe_timeout: Duration,
    ) -> Self {
        let capability = match policy {
            CapabilityPolicy::FileBased => Capability::FileBasedOnly,
            CapabilityPolicy::Probe => probe_streaming(runner, rasterizer, probe_timeout),
        };
        tracing::debug!(
            "{} streaming support detected: {}",
            rasterizer,
            if capability == Capability::StreamingSupported { "yes" } else { "no" }
        );
        Self::fixed(capability)
    }

    pub fn capability(&self) -> Capability {
        if self.downgraded.load(Ordering::Acquire) {
            Capability::FileBasedOnly
        } else {
            self.resolved
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.capability().into()
    }

    /// Switch the rest of the run to file-based. Returns `true` for the
    /// call that actually performed the switch.
    pub fn downgrade(&self) -> bool {
        self.resolved == Capability::StreamingSupported
            && !self.downgraded.swap(true, Ordering::AcqRel)
    }
}
