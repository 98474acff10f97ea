//! Pipeline – ties together parsing, styling, layout, pagination, and
//! rendering into a single function call.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::css::Stylesheet;
use crate::dom::{document_stylesheets, document_title, parse_html};
use crate::images::ImageStore;
use crate::layout::compute_layout;
use crate::layout_config::LayoutConfig;
use crate::pagination::paginate;
use crate::pdf::PdfError;
use crate::render::render_pdf;
use crate::style::build_styled_tree;

/// Default page margins in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;

/// Title used when neither the caller nor the document provides one.
pub const FALLBACK_TITLE: &str = "mdforge output";

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

impl FromStr for PageOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Self::Portrait),
            "landscape" => Ok(Self::Landscape),
            other => Err(format!("unknown orientation '{other}' (expected portrait or landscape)")),
        }
    }
}

/// Named paper sizes, in portrait orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// 210mm × 297mm.
    #[default]
    A4,
    /// 8.5in × 11in.
    Letter,
    /// 8.5in × 14in.
    Legal,
}

impl PageSize {
    /// `(width, height)` in points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(Self::A4),
            "letter" => Ok(Self::Letter),
            "legal" => Ok(Self::Legal),
            other => Err(format!("unknown page size '{other}' (expected a4, letter or legal)")),
        }
    }
}

/// Configuration for the PDF generation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Document title embedded in the PDF metadata. When unset the
    /// document's `<title>` is used.
    pub title: Option<String>,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Page margin in points (default: 40).
    pub page_margin: f32,
    /// Page orientation; swaps effective width/height when `Landscape`.
    pub orientation: PageOrientation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let (page_width, page_height) = PageSize::A4.dimensions();
        Self {
            title: None,
            page_width,
            page_height,
            page_margin: PAGE_MARGIN_PT,
            orientation: PageOrientation::Portrait,
        }
    }
}

impl PipelineConfig {
    pub fn with_page_size(mut self, size: PageSize) -> Self {
        (self.page_width, self.page_height) = size.dimensions();
        self
    }

    /// Effective page width after applying orientation.
    pub fn effective_width(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_width,
            PageOrientation::Landscape => self.page_height,
        }
    }

    /// Effective page height after applying orientation.
    pub fn effective_height(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_height,
            PageOrientation::Landscape => self.page_width,
        }
    }

    /// Height available for content on each page.
    pub fn content_height(&self) -> f32 {
        self.effective_height() - 2.0 * self.page_margin
    }

    /// Check that the margins leave room for content.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_margin.is_nan() || self.page_margin < 0.0 {
            return Err(format!("page margin must be non-negative, got {}", self.page_margin));
        }
        let min_side = self.effective_width().min(self.effective_height());
        if min_side <= 2.0 * self.page_margin {
            return Err(format!(
                "page margin {}pt leaves no room on a {}x{}pt page",
                self.page_margin,
                self.effective_width(),
                self.effective_height()
            ));
        }
        Ok(())
    }
}

/// Full pipeline: HTML string → PDF bytes.
///
/// Relative image paths resolve against `base_dir`. Returns the PDF bytes
/// together with the page layout they were rendered from.
pub fn generate_pdf(
    html: &str,
    config: &PipelineConfig,
    base_dir: Option<&Path>,
) -> Result<(Vec<u8>, LayoutConfig), PdfError> {
    let (layout_config, images) = layout_document(html, config, base_dir)?;
    let pdf_bytes = render_pdf(&layout_config, &images)?;
    Ok((pdf_bytes, layout_config))
}

/// Generate only the layout config (no PDF rendering) – useful for testing.
pub fn compute_layout_config(html: &str, config: &PipelineConfig) -> Result<LayoutConfig, PdfError> {
    layout_document(html, config, None).map(|(layout, _)| layout)
}

fn layout_document(
    html: &str,
    config: &PipelineConfig,
    base_dir: Option<&Path>,
) -> Result<(LayoutConfig, ImageStore), PdfError> {
    config.validate().map_err(PdfError::Layout)?;

    // 1. Parse HTML and collect its embedded stylesheets
    let dom = parse_html(html);
    let mut sheet = Stylesheet::default();
    for css in document_stylesheets(&dom) {
        sheet.append(&css);
    }
    log::debug!("parsed document: {} css rule(s)", sheet.rules().len());

    // 2. Build styled tree; <head> content drops out here
    let styled = build_styled_tree(&dom, &sheet);

    // 3. Compute layout
    let eff_w = config.effective_width();
    let eff_h = config.effective_height();
    let mut images = ImageStore::new(base_dir);
    let boxes = compute_layout(
        &styled,
        eff_w,
        config.page_margin,
        config.content_height(),
        &mut images,
    )?;

    // 4. Paginate
    let mut layout_config = paginate(&boxes, eff_w, eff_h, config.page_margin);
    layout_config.title = config
        .title
        .clone()
        .or_else(|| document_title(&dom))
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());
    if log::log_enabled!(log::Level::Trace) {
        log::trace!("page layout:\n{}", layout_config.to_json());
    }

    Ok((layout_config, images))
}
