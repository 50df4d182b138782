use anyhow::{Context, Result};
use ocrpipe_core::DocumentResult;
use std::io::Write;
use std::path::Path;

/// Serialize the batch results as one JSON array
pub fn render(results: &[DocumentResult], pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(results)
    } else {
        serde_json::to_string(results)
    }
    .context("Failed to serialize results")?;
    Ok(json)
}

/// Write the rendered results to `path`, or stdout when no path is given
pub fn write_results(results: &[DocumentResult], pretty: bool, path: Option<&Path>) -> Result<()> {
    let json = render(results, pretty)?;
    match path {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write results to {}", path.display()))?;
            tracing::info!("Results saved to: {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}").context("Failed to write results to stdout")?;
            stdout.flush()?;
        }
    }
    Ok(())
}
