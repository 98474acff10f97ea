//! PDF engine boundary.
//!
//! The converter only knows the [`PdfRenderer`] trait. [`ForgeRenderer`] is
//! the built-in engine over [`crate::pipeline::generate_pdf`]; tests and
//! embedders can swap in their own.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::pipeline::{generate_pdf, PipelineConfig};

/// Magic bytes every PDF file starts with.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("layout failed: {0}")]
    Layout(String),
    #[error("PDF engine produced no output")]
    EmptyOutput,
    #[error("PDF engine output is not a PDF document")]
    InvalidOutput,
    #[error("cannot write PDF: {0}")]
    Io(#[from] io::Error),
}

/// Everything a renderer needs besides the HTML itself.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub page: PipelineConfig,
    /// Directory relative image paths resolve against.
    pub base_dir: Option<PathBuf>,
}

impl RenderContext {
    pub fn new(page: PipelineConfig) -> Self {
        Self {
            page,
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}

pub trait PdfRenderer: Send + Sync {
    /// Render a complete, styled HTML document to PDF bytes.
    fn render_bytes(&self, html: &str, ctx: &RenderContext) -> Result<Vec<u8>, PdfError>;

    /// Render and write the result to `output`.
    ///
    /// The file only appears once the whole document has been written; on
    /// failure `output` is left untouched.
    fn render(&self, html: &str, ctx: &RenderContext, output: &Path) -> Result<(), PdfError> {
        let bytes = self.render_bytes(html, ctx)?;
        if bytes.is_empty() {
            return Err(PdfError::EmptyOutput);
        }
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(PdfError::InvalidOutput);
        }
        write_pdf_atomically(&bytes, output)
    }
}

/// Write `bytes` to a temp file next to `path`, then rename it into place.
pub fn write_pdf_atomically(bytes: &[u8], path: &Path) -> Result<(), PdfError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    // Dropping the temp file on any early return removes it.
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| PdfError::Io(e.error))?;
    Ok(())
}

/// The built-in HTML → PDF engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForgeRenderer;

impl PdfRenderer for ForgeRenderer {
    fn render_bytes(&self, html: &str, ctx: &RenderContext) -> Result<Vec<u8>, PdfError> {
        let (bytes, layout) = generate_pdf(html, &ctx.page, ctx.base_dir.as_deref())?;
        log::debug!("rendered {} page(s), {} bytes", layout.pages.len(), bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static [u8]);

    impl PdfRenderer for Fixed {
        fn render_bytes(&self, _html: &str, _ctx: &RenderContext) -> Result<Vec<u8>, PdfError> {
            Ok(self.0.to_vec())
        }
    }

    #[test]
    fn forge_renderer_writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("doc.pdf");
        ForgeRenderer
            .render("<p>hello</p>", &RenderContext::default(), &out)
            .unwrap();
        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(PDF_MAGIC));
    }

    #[test]
    fn invalid_output_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("doc.pdf");
        let err = Fixed(b"<html>").render("", &RenderContext::default(), &out).unwrap_err();
        assert!(matches!(err, PdfError::InvalidOutput));
        let err = Fixed(b"").render("", &RenderContext::default(), &out).unwrap_err();
        assert!(matches!(err, PdfError::EmptyOutput));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("doc.pdf");
        std::fs::write(&out, b"old").unwrap();
        write_pdf_atomically(b"%PDF-1.7 new", &out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF-1.7 new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nope").join("doc.pdf");
        assert!(matches!(
            write_pdf_atomically(b"%PDF-", &out),
            Err(PdfError::Io(_))
        ));
        assert!(!out.exists());
    }
}
