//! Output path resolution and file-name sanitisation.

use std::path::{Path, PathBuf};

/// Extensions (lower-case, without the dot) accepted as Markdown input.
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Name used when sanitisation leaves nothing behind.
pub const FALLBACK_NAME: &str = "output";

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace characters that are illegal in file names with `_`, trim
/// surrounding spaces and dots, and fall back to [`FALLBACK_NAME`] when the
/// result would be empty.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == ' ' || c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whether `path` carries a Markdown extension (case-insensitive).
pub fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            MARKDOWN_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Derive the PDF path for `input`.
///
/// With `output_dir` the PDF lands in that directory; otherwise it is written
/// next to the input. Either way the file name is the sanitised input stem
/// with a `.pdf` extension. Nothing is created on disk.
pub fn resolve_output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = format!("{}.pdf", sanitize_filename(&stem));

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => match input.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        },
    }
}

/// Path of the optional styled-HTML dump written alongside a PDF.
pub fn debug_html_path(pdf_path: &Path) -> PathBuf {
    pdf_path.with_extension("html")
}
