//! Layout config – the intermediate representation between layout computation
//! and PDF rendering. This is the "frozen" structure that encodes exactly what
//! goes on each page.
//!
//! Boxes on a page are flat and listed in paint order, so a container's
//! background always precedes the content drawn on top of it.

use serde::{Deserialize, Serialize};

use crate::fonts::FontFace;

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Ordered list of pages.
    pub pages: Vec<PageLayout>,
}

/// One page of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    pub background_color: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Borders::is_empty")]
    pub borders: Borders,

    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<MarkerContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Borders {
    pub top: Option<BorderStyle>,
    pub right: Option<BorderStyle>,
    pub bottom: Option<BorderStyle>,
    pub left: Option<BorderStyle>,
}

impl Borders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.right.is_none() && self.bottom.is_none() && self.left.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped lines of text.
    pub lines: Vec<TextLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    /// X offset within the layout box (for alignment)
    pub x_offset: f32,
    /// Y offset from the top of the layout box
    pub y_offset: f32,
    pub height: f32,
    /// Baseline position relative to the top of the line.
    pub baseline: f32,
    pub fragments: Vec<TextFragment>,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }
}

/// A run of text in a single face, positioned relative to its line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub x: f32,
    pub width: f32,
    pub font: FontFace,
    pub font_size: f32,
    pub color: [f32; 4],
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strike: bool,
    #[serde(default)]
    pub background: Option<[f32; 4]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub src: String,
    /// Offset of the image from the box origin (padding plus border).
    #[serde(default)]
    pub x_offset: f32,
    #[serde(default)]
    pub y_offset: f32,
    pub width: f32,
    pub height: f32,
}

/// List bullet or number, right-aligned against `x_end`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerContent {
    pub text: String,
    pub x_end: f32,
    /// Page-absolute baseline.
    pub baseline_y: f32,
    pub width: f32,
    pub font: FontFace,
    pub font_size: f32,
    pub color: [f32; 4],
}

impl LayoutConfig {
    /// Create an A4 layout config.
    pub fn a4() -> Self {
        Self {
            title: Self::default_title(),
            // A4: 210mm × 297mm = 595.28 × 841.89 points
            page_width_pt: 595.28,
            page_height_pt: 841.89,
            pages: Vec::new(),
        }
    }

    fn default_title() -> String {
        "mdforge output".to_string()
    }

    /// Every line of text on a page, top to bottom.
    pub fn page_text(&self, page: usize) -> Vec<String> {
        let Some(page) = self.pages.get(page) else {
            return Vec::new();
        };
        page.boxes
            .iter()
            .filter_map(|b| b.text.as_ref())
            .flat_map(|t| t.lines.iter().map(TextLine::text))
            .collect()
    }

    /// Pretty JSON dump of the page layout, for tracing.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            ..Self::default()
        }
    }
}
