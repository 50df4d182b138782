use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// Import from ocrpipe-core
use ocrpipe_core::{BatchOrchestrator, CapabilityPolicy, OcrConfig};

// Import CLI utilities
use ocrpipe::output;
use ocrpipe::{ToolKind, ToolLocator};

#[derive(Parser)]
#[command(name = "ocrpipe")]
#[command(about = "OCR scanned PDFs to JSON using pdftoppm and tesseract")]
struct Args {
    /// PDF files to process; results keep this order
    #[arg(value_name = "PDF", required_unless_present = "show_config")]
    inputs: Vec<PathBuf>,

    /// Rasterization resolution (also passed to the recognizer)
    #[arg(long)]
    dpi: Option<u32>,

    /// Recognizer language, e.g. "eng" or "eng+deu"
    #[arg(short, long)]
    lang: Option<String>,

    /// Maximum number of documents processed at once (default: CPU count)
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Path to custom config file (YAML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Probe whether the rasterizer can stream to stdout instead of always
    /// rendering through temporary files
    #[arg(long)]
    probe_streaming: bool,

    /// Rasterizer executable (default: pdftoppm)
    #[arg(long)]
    rasterizer: Option<String>,

    /// Recognizer executable (default: tesseract)
    #[arg(long)]
    recognizer: Option<String>,

    /// Kill any single tool invocation running longer than this many seconds
    #[arg(long, value_name = "SECS")]
    tool_timeout: Option<u64>,

    /// Log per-stage timings for every document
    #[arg(long)]
    profile: bool,

    /// Debug logging and pretty-printed output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Write the JSON output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    show_config: bool,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the JSON results
fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<()> {
    let config = effective_config(&args)?;

    if args.show_config {
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize config")?;
        print!("{yaml}");
        return Ok(());
    }

    let orchestrator = BatchOrchestrator::new(config);
    let results = orchestrator.run_paths(&args.inputs)?;

    output::write_results(&results, args.pretty || args.verbose, args.output.as_deref())
}

/// Defaults, then config file, then `OCRPIPE_*` environment, then flags
fn effective_config(args: &Args) -> Result<OcrConfig> {
    let mut config = OcrConfig::load_with_fallback(args.config.as_deref()).with_context(|| {
        format!("Failed to load config from {}", args.config.as_deref().unwrap_or("<discovered>"))
    })?;
    config.apply_env();

    if let Some(dpi) = args.dpi {
        config.dpi = dpi;
    }
    if let Some(lang) = &args.lang {
        config.lang = lang.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if args.probe_streaming {
        config.capability = CapabilityPolicy::Probe;
    }
    if let Some(secs) = args.tool_timeout {
        config.tool_timeout_secs = Some(secs);
    }
    if args.profile {
        config.profile = true;
    }

    let locator = ToolLocator::new();
    config.rasterizer = locator.resolve(ToolKind::Rasterizer, args.rasterizer.as_deref(), &config.rasterizer);
    config.recognizer = locator.resolve(ToolKind::Recognizer, args.recognizer.as_deref(), &config.recognizer);

    config.validate()?;
    Ok(config)
}
