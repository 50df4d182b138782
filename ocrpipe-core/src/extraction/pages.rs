//! Page image discovery and page-marker formatting

use crate::error::Result;
use crate::types::{PageImage, RecognitionResult};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

// <prefix>-<n>.<ext>: ppm by default, pgm/pbm for gray/mono, png/jpg/tif with format flags
static PAGE_IMAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-(\d+)\.(?:ppm|pgm|pbm|png|jpg|tif)$").unwrap());

/// Find the page images written under `dir` with `prefix`, in page order
///
/// The rasterizer names files `<prefix>-<n>.<ext>`, zero-padding `<n>` to
/// the width of the page count. Sorting on the parsed number keeps the
/// order right regardless of padding. Returned indices are contiguous and
/// 1-based.
pub fn discover_page_images(dir: &Path, prefix: &str) -> Result<Vec<PageImage>> {
    let mut numbered = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(caps) = PAGE_IMAGE_REGEX.captures(name) else {
            continue;
        };
        if &caps[1] == prefix {
            // Digits beyond u64 range are not a page number we can order
            if let Ok(sequence) = caps[2].parse::<u64>() {
                numbered.push((sequence, entry.path()));
            }
        }
    }
    numbered.sort();

    Ok(numbered
        .into_iter()
        .enumerate()
        .map(|(i, (_, path))| PageImage { index: i + 1, path })
        .collect())
}

pub fn page_open_marker(page: usize) -> String {
    format!("<page number {page}>")
}

pub fn page_close_marker(page: usize) -> String {
    format!("</page number {page}>")
}

/// Wrap each page's text in its marker pair and join in ascending page order
pub fn format_pages(pages: &[RecognitionResult]) -> String {
    let mut ordered: Vec<&RecognitionResult> = pages.iter().collect();
    ordered.sort_by_key(|p| p.page);
    ordered
        .iter()
        .map(|p| {
            format!(
                "{}\n{}\n{}",
                page_open_marker(p.page),
                p.text,
                page_close_marker(p.page)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"P6").unwrap();
    }

    #[test]
    fn test_discovery_orders_numerically_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.ppm", "page-2.ppm", "page-1.ppm", "other-3.ppm", "page-x.ppm", "page-4.txt"] {
            touch(dir.path(), name);
        }

        let pages = discover_page_images(dir.path(), "page").unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["page-1.ppm", "page-2.ppm", "page-10.ppm"]);
        assert_eq!(pages.iter().map(|p| p.index).collect::<Vec<_>>(), [1, 2, 3]);
    }

    #[test]
    fn test_discovery_handles_zero_padding() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-003.pgm", "page-001.pgm", "page-002.pgm"] {
            touch(dir.path(), name);
        }
        let pages = discover_page_images(dir.path(), "page").unwrap();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].path.ends_with("page-001.pgm"));
        assert!(pages[2].path.ends_with("page-003.pgm"));
    }

    #[test]
    fn test_empty_directory_yields_no_pages() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_page_images(dir.path(), "page").unwrap().is_empty());
    }

    #[test]
    fn test_format_pages() {
        let pages = vec![
            RecognitionResult { page: 2, text: "A2".into() },
            RecognitionResult { page: 1, text: "A1".into() },
        ];
        assert_eq!(
            format_pages(&pages),
            "<page number 1>\nA1\n</page number 1>\n<page number 2>\nA2\n</page number 2>"
        );
        assert_eq!(format_pages(&[]), "");
    }
}
