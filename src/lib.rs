//! # mdforge – GitHub-flavored Markdown → PDF
//!
//! A conversion runs through these stages:
//!
//! 1. **Validate** – check the input path and options ([`paths`], [`options`])
//! 2. **Read** – decode the file ([`options::TextEncoding`])
//! 3. **Render** – GFM → HTML document with pulldown-cmark ([`markdown`])
//! 4. **Style** – inject one `<style>` block ([`stylesheet`], [`styler`])
//! 5. **Generate** – HTML → PDF with the built-in engine ([`pdf`])
//!
//! The engine itself is a small HTML/CSS pipeline:
//! parse ([`dom`], [`css`]) → cascade ([`style`]) → flexbox layout with
//! Taffy ([`layout`], [`text`], [`images`]) → pages ([`pagination`],
//! [`layout_config`]) → printpdf ([`render`]). [`pipeline`] ties it together.
//!
//! [`Converter`] drives single and batch conversions.

pub mod batch;
pub mod converter;
pub mod css;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod images;
pub mod layout;
pub mod layout_config;
pub mod markdown;
pub mod options;
pub mod pagination;
pub mod paths;
pub mod pdf;
pub mod pipeline;
pub mod render;
pub mod style;
pub mod styler;
pub mod stylesheet;
pub mod text;

// Re-exports for convenience
pub use batch::BatchResult;
pub use converter::{Converter, RenderedDocument, DEFAULT_PATTERN};
pub use error::{ConvertError, Stage, StageError};
pub use markdown::{GfmRenderer, MarkdownRenderer};
pub use options::{ConversionOptions, ConversionRequest};
pub use paths::{resolve_output_path, sanitize_filename};
pub use pdf::{ForgeRenderer, PdfError, PdfRenderer, RenderContext};
pub use pipeline::{generate_pdf, PageOrientation, PageSize, PipelineConfig};
pub use styler::apply_style;
pub use stylesheet::{build_stylesheet, ConverterConfig, CssFileError, StyleSet};
