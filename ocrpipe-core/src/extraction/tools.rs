//! Argument vectors for the rasterizer (pdftoppm-compatible) and the
//! recognizer (tesseract-compatible).

use super::ExtractionOptions;
use crate::process::Invocation;
use std::path::Path;

/// Output-prefix sentinel asking the rasterizer to write to stdout
const STDOUT_SENTINEL: &str = "-";

/// `<rasterizer> -r <dpi> <pdf> -`
pub fn rasterize_to_stdout(options: &ExtractionOptions, pdf: &Path) -> Invocation {
    Invocation::new(&options.rasterizer)
        .arg("-r")
        .arg(options.dpi.to_string())
        .arg(pdf)
        .arg(STDOUT_SENTINEL)
        .timeout(options.tool_timeout)
}

/// `<rasterizer> -r <dpi> <pdf> <dir>/<prefix>`, producing `<prefix>-N.ppm` per page
pub fn rasterize_to_files(options: &ExtractionOptions, pdf: &Path, output_prefix: &Path) -> Invocation {
    Invocation::new(&options.rasterizer)
        .arg("-r")
        .arg(options.dpi.to_string())
        .arg(pdf)
        .arg(output_prefix)
        .timeout(options.tool_timeout)
}

/// `<recognizer> -l <lang> --dpi <dpi> - stdout`, image bytes on stdin
pub fn recognize_stdin(options: &ExtractionOptions, image: Vec<u8>) -> Invocation {
    Invocation::new(&options.recognizer)
        .args(["-l", options.lang.as_str(), "--dpi"])
        .arg(options.dpi.to_string())
        .args(["-", "stdout"])
        .stdin(image)
        .timeout(options.tool_timeout)
}

/// `<recognizer> <image> stdout -l <lang> --dpi <dpi>`
pub fn recognize_file(options: &ExtractionOptions, image: &Path) -> Invocation {
    Invocation::new(&options.recognizer)
        .arg(image)
        .args(["stdout", "-l", options.lang.as_str(), "--dpi"])
        .arg(options.dpi.to_string())
        .timeout(options.tool_timeout)
}
