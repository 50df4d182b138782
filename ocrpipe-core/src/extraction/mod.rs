//! Page Extraction & Recognition Pipeline
//!
//! Converts one document into page images and recognized text, using the
//! strategy resolved by the capability prober.
//!
//! ```text
//! PDF
//!  ├─ Streaming:  rasterizer ──stdout──▶ recognizer(stdin) ──▶ page 1
//!  └─ FileBased:  rasterizer ──▶ tmpdir/page-N.ppm ──▶ recognizer(file) per page
//!                                                       ──▶ pages 1..N
//! ```
//!
//! Pages are processed sequentially in page order. Any page failing aborts
//! the whole document.

pub mod pages;
pub mod profiler;
pub mod tools;

use crate::capability::{CapabilityState, Strategy};
use crate::config::OcrConfig;
use crate::error::{OcrError, Result};
use crate::process::CommandRunner;
use crate::types::RecognitionResult;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use pages::{discover_page_images, format_pages};
pub use profiler::StageProfiler;

/// Per-run knobs for the extraction pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOptions {
    pub rasterizer: String,
    pub recognizer: String,
    pub dpi: u32,
    pub lang: String,
    pub image_prefix: String,
    pub tool_timeout: Option<Duration>,
    pub profile: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self::from(&OcrConfig::default())
    }
}

impl From<&OcrConfig> for ExtractionOptions {
    fn from(config: &OcrConfig) -> Self {
        Self {
            rasterizer: config.rasterizer.clone(),
            recognizer: config.recognizer.clone(),
            dpi: config.dpi,
            lang: config.lang.clone(),
            image_prefix: config.image_prefix.clone(),
            tool_timeout: config.tool_timeout(),
            profile: config.profile,
        }
    }
}

/// Runs the rasterize → recognize pipeline for single documents
pub struct PageExtractor {
    runner: Arc<dyn CommandRunner>,
    options: ExtractionOptions,
}

impl PageExtractor {
    pub fn new(runner: Arc<dyn CommandRunner>, options: ExtractionOptions) -> Self {
        Self { runner, options }
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    /// Full recognized text of `pdf`, page-tagged
    pub fn extract(&self, pdf: &Path, capability: &CapabilityState) -> Result<String> {
        let pages = self.extract_pages(pdf, capability)?;
        Ok(format_pages(&pages))
    }

    /// Recognized text per page, in ascending page order
    pub fn extract_pages(&self, pdf: &Path, capability: &CapabilityState) -> Result<Vec<RecognitionResult>> {
        let mut profiler = StageProfiler::new(self.options.profile, pdf.display().to_string());

        let pages = match capability.strategy() {
            Strategy::Streaming => match self.extract_streaming(pdf, &mut profiler)? {
                Some(pages) => pages,
                None => {
                    if capability.downgrade() {
                        tracing::warn!(
                            "{} produced no stdout; using temp-file rendering for the rest of the run",
                            self.options.rasterizer
                        );
                    }
                    self.extract_file_based(pdf, &mut profiler)?
                }
            },
            Strategy::FileBased => self.extract_file_based(pdf, &mut profiler)?,
        };

        profiler.log_summary();
        Ok(pages)
    }

    /// Fast path: pipe raster bytes straight into the recognizer
    ///
    /// Returns `Ok(None)` when the rasterizer wrote nothing to stdout, so the
    /// caller can fall back to rendering into files.
    fn extract_streaming(&self, pdf: &Path, profiler: &mut StageProfiler) -> Result<Option<Vec<RecognitionResult>>> {
        let raster = profiler.time_step("Rasterize (stream)", || {
            self.runner
                .run(&tools::rasterize_to_stdout(&self.options, pdf))
        })?;

        if raster.stdout.is_empty() {
            tracing::debug!("{} produced no stdout for {}", self.options.rasterizer, pdf.display());
            return Ok(None);
        }

        let text = profiler.time_step("Recognize (stream)", || self.recognize_bytes(raster.stdout))?;
        Ok(Some(vec![RecognitionResult { page: 1, text }]))
    }

    /// Robust path: render one image per page into a scoped temp directory
    fn extract_file_based(&self, pdf: &Path, profiler: &mut StageProfiler) -> Result<Vec<RecognitionResult>> {
        // Removed when dropped, on success and on every error return below
        let workdir = tempfile::Builder::new()
            .prefix("ocrpipe_")
            .tempdir()?;
        let output_prefix = workdir.path().join(&self.options.image_prefix);

        let raster = profiler.time_step("Rasterize", || {
            self.runner
                .run(&tools::rasterize_to_files(&self.options, pdf, &output_prefix))
        })?;

        let images = discover_page_images(workdir.path(), &self.options.image_prefix)?;
        tracing::debug!("{} rendered {} page image(s)", pdf.display(), images.len());

        if images.is_empty() {
            if raster.stdout.is_empty() {
                tracing::error!("{} produced no images for {}", self.options.rasterizer, pdf.display());
                return Err(OcrError::NoOutputProduced {
                    path: pdf.to_path_buf(),
                });
            }
            // Rasterizer streamed anyway; treat it as a single page
            let text = profiler.time_step("Recognize (stdout)", || self.recognize_bytes(raster.stdout))?;
            return Ok(vec![RecognitionResult { page: 1, text }]);
        }

        let mut pages = Vec::with_capacity(images.len());
        for image in images {
            let step = format!("Recognize page {}", image.index);
            let output = profiler
                .time_step(&step, || {
                    self.runner
                        .run(&tools::recognize_file(&self.options, &image.path))
                })
                .inspect_err(|e| {
                    tracing::error!(
                        "{} failed on page {} of {}: {}",
                        self.options.recognizer,
                        image.index,
                        pdf.display(),
                        e
                    );
                })?;
            pages.push(RecognitionResult {
                page: image.index,
                text: output.stdout_text(),
            });
        }

        Ok(pages)
    }

    fn recognize_bytes(&self, image: Vec<u8>) -> Result<String> {
        let output = self
            .runner
            .run(&tools::recognize_stdin(&self.options, image))?;
        Ok(output.stdout_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::process::{Invocation, ToolOutput};
    use std::sync::Mutex;

    /// Scripted runner: the rasterizer writes `pages` images (or streams
    /// `stream` bytes); the recognizer echoes the image file's contents.
    struct ScriptedRunner {
        pages: usize,
        stream: Vec<u8>,
        fail_page: Option<usize>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(pages: usize) -> Self {
            Self {
                pages,
                stream: Vec::new(),
                fail_page: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(invocation.command_line());
            match invocation.program.as_str() {
                "pdftoppm" => {
                    let target = invocation.arg_str(3).unwrap();
                    if target != "-" {
                        for n in 1..=self.pages {
                            std::fs::write(format!("{target}-{n}.ppm"), format!("text of page {n}")).unwrap();
                        }
                    }
                    Ok(ToolOutput {
                        stdout: self.stream.clone(),
                        ..ToolOutput::default()
                    })
                }
                "tesseract" => {
                    let source = invocation.arg_str(0).unwrap();
                    let content = if source == "-l" {
                        invocation.stdin.clone().unwrap()
                    } else {
                        std::fs::read(&source).unwrap()
                    };
                    if let Some(page) = self.fail_page {
                        if source.ends_with(&format!("-{page}.ppm")) {
                            return Err(OcrError::tool_failure("tesseract", Some(1), b"Error during processing."));
                        }
                    }
                    Ok(ToolOutput {
                        stdout: content,
                        ..ToolOutput::default()
                    })
                }
                other => panic!("unexpected program {other}"),
            }
        }
    }

    fn extractor(runner: Arc<ScriptedRunner>) -> PageExtractor {
        PageExtractor::new(runner, ExtractionOptions::default())
    }

    #[test]
    fn test_file_based_tags_every_page() {
        let runner = Arc::new(ScriptedRunner::new(3));
        let state = CapabilityState::fixed(Capability::FileBasedOnly);
        let text = extractor(runner.clone())
            .extract(Path::new("doc.pdf"), &state)
            .unwrap();

        assert_eq!(
            text,
            "<page number 1>\ntext of page 1\n</page number 1>\n\
             <page number 2>\ntext of page 2\n</page number 2>\n\
             <page number 3>\ntext of page 3\n</page number 3>"
        );
        assert_eq!(runner.calls().len(), 4);
    }

    #[test]
    fn test_file_based_stdout_only_becomes_page_one() {
        let mut runner = ScriptedRunner::new(0);
        runner.stream = b"streamed".to_vec();
        let state = CapabilityState::fixed(Capability::FileBasedOnly);
        let text = extractor(Arc::new(runner))
            .extract(Path::new("doc.pdf"), &state)
            .unwrap();
        assert_eq!(text, "<page number 1>\nstreamed\n</page number 1>");
    }

    #[test]
    fn test_no_images_and_no_stdout_is_an_error() {
        let state = CapabilityState::fixed(Capability::FileBasedOnly);
        let err = extractor(Arc::new(ScriptedRunner::new(0)))
            .extract(Path::new("doc.pdf"), &state)
            .unwrap_err();
        assert!(matches!(err, OcrError::NoOutputProduced { .. }));
    }

    #[test]
    fn test_page_failure_aborts_document() {
        let mut runner = ScriptedRunner::new(3);
        runner.fail_page = Some(2);
        let runner = Arc::new(runner);
        let state = CapabilityState::fixed(Capability::FileBasedOnly);
        let err = extractor(runner.clone())
            .extract(Path::new("doc.pdf"), &state)
            .unwrap_err();

        assert!(matches!(err, OcrError::ExternalTool { code: Some(1), .. }));
        // rasterize + page 1 + page 2; page 3 never runs
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn test_streaming_pipes_single_page() {
        let mut runner = ScriptedRunner::new(0);
        runner.stream = b"one page".to_vec();
        let runner = Arc::new(runner);
        let state = CapabilityState::fixed(Capability::StreamingSupported);
        let text = extractor(runner.clone())
            .extract(Path::new("doc.pdf"), &state)
            .unwrap();

        assert_eq!(text, "<page number 1>\none page\n</page number 1>");
        assert_eq!(
            runner.calls(),
            [
                "pdftoppm -r 300 doc.pdf -",
                "tesseract -l eng --dpi 300 - stdout"
            ]
        );
    }

    #[test]
    fn test_empty_stream_falls_back_and_downgrades() {
        let runner = Arc::new(ScriptedRunner::new(2));
        let state = CapabilityState::fixed(Capability::StreamingSupported);
        let text = extractor(runner.clone())
            .extract(Path::new("doc.pdf"), &state)
            .unwrap();

        assert!(text.contains("<page number 2>\ntext of page 2\n</page number 2>"));
        assert_eq!(state.strategy(), Strategy::FileBased);
        // stream attempt, file rasterize, two pages
        assert_eq!(runner.calls().len(), 4);
    }

    #[test]
    fn test_temp_directory_is_removed_after_success() {
        let runner = Arc::new(ScriptedRunner::new(2));
        let state = CapabilityState::fixed(Capability::FileBasedOnly);
        extractor(runner.clone())
            .extract(Path::new("doc.pdf"), &state)
            .unwrap();

        let rasterize = &runner.calls()[0];
        let prefix = rasterize.rsplit(' ').next().unwrap();
        let workdir = Path::new(prefix).parent().unwrap();
        assert!(workdir.starts_with(std::env::temp_dir()));
        assert!(!workdir.exists());
    }

    #[test]
    fn test_temp_directory_is_removed_after_failure() {
        let mut runner = ScriptedRunner::new(1);
        runner.fail_page = Some(1);
        let runner = Arc::new(runner);
        let state = CapabilityState::fixed(Capability::FileBasedOnly);
        extractor(runner.clone())
            .extract(Path::new("doc.pdf"), &state)
            .unwrap_err();

        let rasterize = &runner.calls()[0];
        let prefix = rasterize.rsplit(' ').next().unwrap();
        let workdir = Path::new(prefix).parent().unwrap();
        assert!(!workdir.exists());
    }
}
