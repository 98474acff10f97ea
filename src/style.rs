//! Style resolver – cascades per-tag defaults, the document's `<style>`
//! sheets and inline `style` attributes into a flat [`ComputedStyle`]
//! consumed by the layout engine.
//!
//! All lengths are resolved to PDF points here (1 CSS px = 0.75 pt), so the
//! layout and renderer never see CSS units.

use scraper::{ElementRef, Node};

use crate::css::{parse_declarations, Declaration, Stylesheet};
use crate::dom::{tag_of, Document, Tag};

/// Points per CSS pixel.
pub const PT_PER_PX: f32 = 0.75;

/// Font size of the root element (16 px).
pub const ROOT_FONT_SIZE: f32 = 12.0;

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,
    pub max_width: Dimension,

    // Spacing (pt)
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub padding_top: f32,
    pub padding_right: f32,
    pub padding_bottom: f32,
    pub padding_left: f32,

    // Border
    pub border_top: BorderSide,
    pub border_right: BorderSide,
    pub border_bottom: BorderSide,
    pub border_left: BorderSide,

    // Typography (inherited)
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_family: FontFamily,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub text_decoration: TextDecoration,
    pub white_space: WhiteSpace,
    pub list_style: ListStyle,

    // Background
    pub background_color: Color,

    // Page break
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            width: Dimension::Auto,
            height: Dimension::Auto,
            max_width: Dimension::Auto,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            padding_top: 0.0,
            padding_right: 0.0,
            padding_bottom: 0.0,
            padding_left: 0.0,
            border_top: BorderSide::NONE,
            border_right: BorderSide::NONE,
            border_bottom: BorderSide::NONE,
            border_left: BorderSide::NONE,
            font_size: ROOT_FONT_SIZE,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            font_family: FontFamily::SansSerif,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.2,
            text_decoration: TextDecoration::None,
            white_space: WhiteSpace::Normal,
            list_style: ListStyle::Disc,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    /// Horizontal padding plus border.
    pub fn horizontal_chrome(&self) -> f32 {
        self.padding_left + self.padding_right + self.border_left.width + self.border_right.width
    }

    pub fn vertical_chrome(&self) -> f32 {
        self.padding_top + self.padding_bottom + self.border_top.width + self.border_bottom.width
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn is_italic(&self) -> bool {
        self.font_style == FontStyle::Italic
    }

    pub fn is_pre(&self) -> bool {
        self.white_space == WhiteSpace::Pre
    }

    pub fn has_border(&self) -> bool {
        [
            &self.border_top,
            &self.border_right,
            &self.border_bottom,
            &self.border_left,
        ]
        .iter()
        .any(|b| b.is_visible())
    }

    /// A fresh style carrying only the inherited properties of `self`.
    fn inherited(&self) -> Self {
        Self {
            font_size: self.font_size,
            font_weight: self.font_weight,
            font_style: self.font_style,
            font_family: self.font_family,
            color: self.color,
            text_align: self.text_align,
            line_height: self.line_height,
            text_decoration: self.text_decoration,
            white_space: self.white_space,
            list_style: self.list_style,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    InlineBlock,
    ListItem,
    Table,
    TableRowGroup,
    TableRow,
    TableCell,
    None,
}

impl Display {
    pub fn is_inline(self) -> bool {
        matches!(self, Display::Inline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

/// The builtin PDF font families text can be set in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    SansSerif,
    Serif,
    Monospace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
    LineThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    Normal,
    Pre,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Disc,
    Decimal,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Pt(f32),
    Percent(f32),
}

impl Dimension {
    /// Resolve against the containing block width.
    pub fn resolve(self, containing: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Pt(v) => Some(v),
            Dimension::Percent(p) => Some(containing * p / 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderSide {
    pub width: f32,
    pub color: Color,
}

impl BorderSide {
    pub const NONE: Self = Self {
        width: 0.0,
        color: Color::BLACK,
    };

    pub fn is_visible(&self) -> bool {
        self.width > 0.01 && !self.color.is_transparent()
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    /// The opaque colour this one produces over a white page.
    pub fn over_white(self) -> Self {
        let a = self.a.clamp(0.0, 1.0);
        Self {
            r: self.r * a + (1.0 - a),
            g: self.g * a + (1.0 - a),
            b: self.b * a + (1.0 - a),
            a: 1.0,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        let (r, g, b, a) = match hex.len() {
            3 | 4 => {
                let d: Vec<String> = hex.chars().map(|c| c.to_string().repeat(2)).collect();
                let a = if hex.len() == 4 { channel(&d[3])? } else { 255 };
                (channel(&d[0])?, channel(&d[1])?, channel(&d[2])?, a)
            }
            6 | 8 => {
                let a = if hex.len() == 8 {
                    channel(&hex[6..8])?
                } else {
                    255
                };
                (
                    channel(&hex[0..2])?,
                    channel(&hex[2..4])?,
                    channel(&hex[4..6])?,
                    a,
                )
            }
            _ => return None,
        };
        let mut c = Self::rgb(r, g, b);
        c.a = a as f32 / 255.0;
        Some(c)
    }

    /// Parse any supported CSS colour value. `current` resolves
    /// `currentColor`.
    pub fn parse(value: &str, current: Color) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if v.starts_with('#') {
            return Self::from_hex(&v);
        }
        if let Some(args) = v
            .strip_prefix("rgba(")
            .or_else(|| v.strip_prefix("rgb("))
            .and_then(|s| s.strip_suffix(')'))
        {
            let parts: Vec<&str> = args
                .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect();
            if parts.len() < 3 {
                return None;
            }
            let channel = |s: &str| -> Option<f32> {
                match s.strip_suffix('%') {
                    Some(p) => p.parse::<f32>().ok().map(|p| p / 100.0),
                    None => s.parse::<f32>().ok().map(|v| v / 255.0),
                }
            };
            let alpha = match parts.get(3) {
                Some(a) => match a.strip_suffix('%') {
                    Some(p) => p.parse::<f32>().ok()? / 100.0,
                    None => a.parse::<f32>().ok()?,
                },
                None => 1.0,
            };
            return Some(Self {
                r: channel(parts[0])?.clamp(0.0, 1.0),
                g: channel(parts[1])?.clamp(0.0, 1.0),
                b: channel(parts[2])?.clamp(0.0, 1.0),
                a: alpha.clamp(0.0, 1.0),
            });
        }
        named_color(&v, current)
    }
}

fn named_color(name: &str, current: Color) -> Option<Color> {
    let c = match name {
        "transparent" => Color::TRANSPARENT,
        "currentcolor" => current,
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "red" => Color::rgb(255, 0, 0),
        "green" => Color::rgb(0, 128, 0),
        "blue" => Color::rgb(0, 0, 255),
        "navy" => Color::rgb(0, 0, 128),
        "teal" => Color::rgb(0, 128, 128),
        "purple" => Color::rgb(128, 0, 128),
        "maroon" => Color::rgb(128, 0, 0),
        "olive" => Color::rgb(128, 128, 0),
        "orange" => Color::rgb(255, 165, 0),
        "yellow" => Color::rgb(255, 255, 0),
        "lime" => Color::rgb(0, 255, 0),
        "aqua" | "cyan" => Color::rgb(0, 255, 255),
        "fuchsia" | "magenta" => Color::rgb(255, 0, 255),
        "silver" => Color::rgb(192, 192, 192),
        "gray" | "grey" => Color::rgb(128, 128, 128),
        "darkgray" | "darkgrey" => Color::rgb(169, 169, 169),
        "lightgray" | "lightgrey" => Color::rgb(211, 211, 211),
        "gainsboro" => Color::rgb(220, 220, 220),
        "whitesmoke" => Color::rgb(245, 245, 245),
        "dimgray" | "dimgrey" => Color::rgb(105, 105, 105),
        "brown" => Color::rgb(165, 42, 42),
        "crimson" => Color::rgb(220, 20, 60),
        "darkred" => Color::rgb(139, 0, 0),
        "darkgreen" => Color::rgb(0, 100, 0),
        "darkblue" => Color::rgb(0, 0, 139),
        "steelblue" => Color::rgb(70, 130, 180),
        "royalblue" => Color::rgb(65, 105, 225),
        "slategray" | "slategrey" => Color::rgb(112, 128, 144),
        "gold" => Color::rgb(255, 215, 0),
        "pink" => Color::rgb(255, 192, 203),
        "indigo" => Color::rgb(75, 0, 130),
        "violet" => Color::rgb(238, 130, 238),
        "tomato" => Color::rgb(255, 99, 71),
        "coral" => Color::rgb(255, 127, 80),
        "salmon" => Color::rgb(250, 128, 114),
        "khaki" => Color::rgb(240, 230, 140),
        "beige" => Color::rgb(245, 245, 220),
        "ivory" => Color::rgb(255, 255, 240),
        _ => return None,
    };
    Some(c)
}

// ---------------------------------------------------------------------------
// Styled tree
// ---------------------------------------------------------------------------

/// A DOM node paired with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (for images src, etc.)
        attrs: std::collections::HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }
}

/// Style the document against `sheet`, starting at `<html>`.
///
/// Elements with `display: none` (including everything in `<head>`) are
/// dropped from the result.
pub fn build_styled_tree(doc: &Document, sheet: &Stylesheet) -> Vec<StyledNode> {
    let root = ComputedStyle::default();
    style_element(doc.root(), sheet, &root).into_iter().collect()
}

fn style_element(
    element: ElementRef<'_>,
    sheet: &Stylesheet,
    parent: &ComputedStyle,
) -> Option<StyledNode> {
    let style = resolve_style(&element, parent, sheet);
    if style.display == Display::None {
        return None;
    }
    let children = element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(StyledNode::Text {
                text: text.text.to_string(),
                style: style.clone(),
            }),
            Node::Element(_) => {
                ElementRef::wrap(child).and_then(|e| style_element(e, sheet, &style))
            }
            _ => None,
        })
        .collect();
    Some(StyledNode::Element {
        tag: tag_of(&element),
        attrs: element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        style,
        children,
    })
}

/// Resolve the style of `element`.
///
/// Order: inherited properties, per-tag defaults, normal stylesheet
/// declarations, normal inline declarations, then the `!important` ones in
/// the same order.
pub fn resolve_style(
    element: &ElementRef<'_>,
    parent: &ComputedStyle,
    sheet: &Stylesheet,
) -> ComputedStyle {
    let mut style = parent.inherited();
    apply_tag_defaults(&mut style, &tag_of(element), parent);

    let matched = sheet.matching_declarations(element);
    let inline = element
        .value()
        .attr("style")
        .map(parse_declarations)
        .unwrap_or_default();

    let mut ordered: Vec<&Declaration> = Vec::with_capacity(matched.len() + inline.len());
    ordered.extend(matched.iter().copied().filter(|d| !d.important));
    ordered.extend(inline.iter().filter(|d| !d.important));
    ordered.extend(matched.iter().copied().filter(|d| d.important));
    ordered.extend(inline.iter().filter(|d| d.important));

    // font-size first so `em` lengths in this element use the final size.
    for decl in ordered.iter().filter(|d| d.property == "font-size") {
        if let Some(size) = parse_length(&decl.value, parent.font_size, parent.font_size) {
            style.font_size = size.max(1.0);
        }
    }
    for decl in ordered.iter().filter(|d| d.property != "font-size") {
        apply_css_property(&mut style, &decl.property, &decl.value, parent);
    }
    style
}

/// Default styles based on tag semantics.
fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag, parent: &ComputedStyle) {
    let em = |factor: f32| parent.font_size * factor;
    match tag {
        Tag::Html | Tag::Body | Tag::Div | Tag::Unknown(_) => {}
        Tag::Head | Tag::Title | Tag::Style | Tag::Script | Tag::Meta | Tag::Link => {
            s.display = Display::None;
        }
        Tag::Heading(level) => {
            let factor = match level {
                1 => 2.0,
                2 => 1.5,
                3 => 1.17,
                4 => 1.0,
                5 => 0.83,
                _ => 0.67,
            };
            s.font_size = em(factor);
            s.font_weight = FontWeight::Bold;
            s.margin_top = s.font_size * 0.67;
            s.margin_bottom = s.font_size * 0.67;
        }
        Tag::P => {
            s.margin_top = em(1.0);
            s.margin_bottom = em(1.0);
        }
        Tag::Ul | Tag::Ol => {
            s.margin_top = em(1.0);
            s.margin_bottom = em(1.0);
            s.padding_left = 30.0;
            s.list_style = if *tag == Tag::Ol {
                ListStyle::Decimal
            } else {
                ListStyle::Disc
            };
        }
        Tag::Li => s.display = Display::ListItem,
        Tag::Table => s.display = Display::Table,
        Tag::Thead | Tag::Tbody | Tag::Tfoot => s.display = Display::TableRowGroup,
        Tag::Tr => {
            s.display = Display::TableRow;
            s.page_break_inside_avoid = true;
        }
        Tag::Td | Tag::Th => {
            s.display = Display::TableCell;
            s.padding_top = 1.0;
            s.padding_right = 1.0;
            s.padding_bottom = 1.0;
            s.padding_left = 1.0;
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
                s.text_align = TextAlign::Center;
            }
        }
        Tag::Pre => {
            s.font_family = FontFamily::Monospace;
            s.white_space = WhiteSpace::Pre;
            s.margin_top = em(1.0);
            s.margin_bottom = em(1.0);
        }
        Tag::Code => {
            s.display = Display::Inline;
            s.font_family = FontFamily::Monospace;
        }
        Tag::Blockquote => {
            s.margin_top = em(1.0);
            s.margin_bottom = em(1.0);
            s.margin_left = 30.0;
            s.margin_right = 30.0;
        }
        Tag::Hr => {
            s.margin_top = em(0.5);
            s.margin_bottom = em(0.5);
            let side = BorderSide {
                width: 0.75,
                color: Color::rgb(128, 128, 128),
            };
            s.border_top = side;
            s.border_bottom = side;
        }
        Tag::Br | Tag::Span | Tag::Input => s.display = Display::Inline,
        Tag::Img => s.display = Display::InlineBlock,
        Tag::A => {
            s.display = Display::Inline;
            s.color = Color::rgb(0, 0, 238);
            s.text_decoration = TextDecoration::Underline;
        }
        Tag::Em => {
            s.display = Display::Inline;
            s.font_style = FontStyle::Italic;
        }
        Tag::Strong => {
            s.display = Display::Inline;
            s.font_weight = FontWeight::Bold;
        }
        Tag::Del => {
            s.display = Display::Inline;
            s.text_decoration = TextDecoration::LineThrough;
        }
        Tag::Sup | Tag::Sub => {
            s.display = Display::Inline;
            s.font_size = em(0.83);
        }
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str, parent: &ComputedStyle) {
    let font_size = s.font_size;
    let len = |v: &str| parse_length(v, font_size, parent.font_size);
    let lower = val.trim().to_ascii_lowercase();
    let val = lower.as_str();

    match prop {
        "display" => {
            s.display = match val {
                "none" => Display::None,
                "inline" => Display::Inline,
                "inline-block" | "inline-flex" => Display::InlineBlock,
                "list-item" => Display::ListItem,
                "table" => Display::Table,
                "table-row-group" | "table-header-group" | "table-footer-group" => {
                    Display::TableRowGroup
                }
                "table-row" => Display::TableRow,
                "table-cell" => Display::TableCell,
                "block" | "flex" | "grid" | "flow-root" => Display::Block,
                _ => s.display,
            }
        }
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "bolder" => FontWeight::Bold,
                "normal" | "lighter" => FontWeight::Normal,
                n => match n.parse::<u32>() {
                    Ok(w) if w >= 600 => FontWeight::Bold,
                    Ok(_) => FontWeight::Normal,
                    Err(_) => s.font_weight,
                },
            }
        }
        "font-style" => {
            s.font_style = match val {
                "italic" | "oblique" => FontStyle::Italic,
                "normal" => FontStyle::Normal,
                _ => s.font_style,
            }
        }
        "font-family" => s.font_family = parse_font_family(val),
        "color" => {
            if let Some(c) = Color::parse(val, parent.color) {
                s.color = c.over_white();
            }
        }
        "background-color" | "background" => {
            let color = if prop == "background" {
                val.split_whitespace()
                    .find_map(|token| Color::parse(token, s.color))
                    .or_else(|| (val == "none").then_some(Color::TRANSPARENT))
            } else {
                Color::parse(val, s.color)
            };
            if let Some(c) = color {
                s.background_color = if c.is_transparent() {
                    Color::TRANSPARENT
                } else {
                    c.over_white()
                };
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                "left" | "start" | "justify" => TextAlign::Left,
                _ => s.text_align,
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.text_decoration = if val.contains("underline") {
                TextDecoration::Underline
            } else if val.contains("line-through") {
                TextDecoration::LineThrough
            } else if val.contains("none") {
                TextDecoration::None
            } else {
                s.text_decoration
            }
        }
        "white-space" => {
            s.white_space = match val {
                "pre" | "pre-wrap" | "pre-line" | "break-spaces" => WhiteSpace::Pre,
                "normal" | "nowrap" => WhiteSpace::Normal,
                _ => s.white_space,
            }
        }
        "line-height" => {
            if val == "normal" {
                s.line_height = 1.2;
            } else if let Ok(factor) = val.parse::<f32>() {
                s.line_height = factor;
            } else if let Some(pt) = len(val) {
                if font_size > 0.0 {
                    s.line_height = pt / font_size;
                }
            }
        }
        "list-style" | "list-style-type" => {
            if val.contains("none") {
                s.list_style = ListStyle::None;
            } else if val.contains("decimal") {
                s.list_style = ListStyle::Decimal;
            } else if ["disc", "circle", "square"].iter().any(|k| val.contains(k)) {
                s.list_style = ListStyle::Disc;
            }
        }
        "width" => s.width = parse_dimension(val, font_size, parent.font_size),
        "height" => s.height = parse_dimension(val, font_size, parent.font_size),
        "max-width" => {
            s.max_width = if val == "none" {
                Dimension::Auto
            } else {
                parse_dimension(val, font_size, parent.font_size)
            }
        }
        "margin" => apply_box_shorthand(
            val,
            len,
            [
                &mut s.margin_top,
                &mut s.margin_right,
                &mut s.margin_bottom,
                &mut s.margin_left,
            ],
        ),
        "margin-top" => set_len(&mut s.margin_top, len(val)),
        "margin-right" => set_len(&mut s.margin_right, len(val)),
        "margin-bottom" => set_len(&mut s.margin_bottom, len(val)),
        "margin-left" => set_len(&mut s.margin_left, len(val)),
        "padding" => apply_box_shorthand(
            val,
            len,
            [
                &mut s.padding_top,
                &mut s.padding_right,
                &mut s.padding_bottom,
                &mut s.padding_left,
            ],
        ),
        "padding-top" => set_len(&mut s.padding_top, len(val)),
        "padding-right" => set_len(&mut s.padding_right, len(val)),
        "padding-bottom" => set_len(&mut s.padding_bottom, len(val)),
        "padding-left" => set_len(&mut s.padding_left, len(val)),
        "border" => {
            let side = parse_border(val, font_size, parent.font_size, s.color);
            s.border_top = side;
            s.border_right = side;
            s.border_bottom = side;
            s.border_left = side;
        }
        "border-top" => s.border_top = parse_border(val, font_size, parent.font_size, s.color),
        "border-right" => s.border_right = parse_border(val, font_size, parent.font_size, s.color),
        "border-bottom" => {
            s.border_bottom = parse_border(val, font_size, parent.font_size, s.color)
        }
        "border-left" => s.border_left = parse_border(val, font_size, parent.font_size, s.color),
        "border-width" => {
            let mut widths = [
                s.border_top.width,
                s.border_right.width,
                s.border_bottom.width,
                s.border_left.width,
            ];
            let [t, r, b, l] = &mut widths;
            apply_box_shorthand(val, len, [t, r, b, l]);
            s.border_top.width = widths[0];
            s.border_right.width = widths[1];
            s.border_bottom.width = widths[2];
            s.border_left.width = widths[3];
        }
        "border-color" => {
            if let Some(c) = Color::parse(val, s.color) {
                let c = c.over_white();
                s.border_top.color = c;
                s.border_right.color = c;
                s.border_bottom.color = c;
                s.border_left.color = c;
            }
        }
        "page-break-before" | "break-before" => {
            s.page_break_before = matches!(val, "always" | "page" | "left" | "right")
        }
        "page-break-after" | "break-after" => {
            s.page_break_after = matches!(val, "always" | "page" | "left" | "right")
        }
        "page-break-inside" | "break-inside" => s.page_break_inside_avoid = val.starts_with("avoid"),
        _ => {}
    }
}

fn set_len(target: &mut f32, value: Option<f32>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn parse_font_family(val: &str) -> FontFamily {
    // First family we can map wins; unknown names fall through to the next.
    for family in val.split(',') {
        let name = family.trim().trim_matches(|c| c == '\'' || c == '"');
        if ["mono", "courier", "consolas", "menlo", "monaco"]
            .iter()
            .any(|k| name.contains(k))
        {
            return FontFamily::Monospace;
        }
        if name == "serif" || name.contains("times") || name.contains("georgia") {
            return FontFamily::Serif;
        }
        if name == "sans-serif"
            || ["helvetica", "arial", "segoe", "system-ui", "-apple-system"]
                .iter()
                .any(|k| name.contains(k))
        {
            return FontFamily::SansSerif;
        }
    }
    FontFamily::SansSerif
}

/// Parse a CSS length into points. `em` is relative to `font_size`; `%` is
/// relative to `percent_base`. `auto` resolves to zero.
pub fn parse_length(value: &str, font_size: f32, percent_base: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    if v == "0" || v == "auto" {
        return Some(0.0);
    }
    let (number, factor) = if let Some(n) = v.strip_suffix("px") {
        (n, PT_PER_PX)
    } else if let Some(n) = v.strip_suffix("pt") {
        (n, 1.0)
    } else if let Some(n) = v.strip_suffix("rem") {
        (n, ROOT_FONT_SIZE)
    } else if let Some(n) = v.strip_suffix("em") {
        (n, font_size)
    } else if let Some(n) = v.strip_suffix('%') {
        (n, percent_base / 100.0)
    } else if let Some(n) = v.strip_suffix("mm") {
        (n, 72.0 / 25.4)
    } else if let Some(n) = v.strip_suffix("cm") {
        (n, 72.0 / 2.54)
    } else if let Some(n) = v.strip_suffix("in") {
        (n, 72.0)
    } else {
        // Unitless lengths are treated as pixels.
        (v.as_str(), PT_PER_PX)
    };
    number.trim().parse::<f32>().ok().map(|n| n * factor)
}

fn parse_dimension(val: &str, font_size: f32, parent_font_size: f32) -> Dimension {
    let v = val.trim();
    if v == "auto" {
        Dimension::Auto
    } else if let Some(p) = v.strip_suffix('%') {
        p.trim()
            .parse::<f32>()
            .map(Dimension::Percent)
            .unwrap_or(Dimension::Auto)
    } else {
        parse_length(v, font_size, parent_font_size)
            .map(Dimension::Pt)
            .unwrap_or(Dimension::Auto)
    }
}

/// `1px solid #ccc`, `0`, `none`, `thin dashed red` ...
fn parse_border(val: &str, font_size: f32, parent_font_size: f32, current: Color) -> BorderSide {
    let mut side = BorderSide {
        width: 0.75,
        color: current,
    };
    let mut has_style = false;
    for token in val.split_whitespace() {
        match token {
            "none" | "hidden" => return BorderSide::NONE,
            "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge" | "inset" | "outset" => {
                has_style = true
            }
            "thin" => side.width = 0.75,
            "medium" => side.width = 2.25,
            "thick" => side.width = 3.75,
            t => {
                if let Some(c) = Color::parse(t, current) {
                    side.color = c.over_white();
                } else if let Some(w) = parse_length(t, font_size, parent_font_size) {
                    side.width = w;
                }
            }
        }
    }
    if !has_style && val.split_whitespace().count() == 1 && side.width == 0.0 {
        return BorderSide::NONE;
    }
    side
}

/// Apply a 1–4 value box shorthand (top, right, bottom, left).
fn apply_box_shorthand(
    val: &str,
    len: impl Fn(&str) -> Option<f32>,
    [top, right, bottom, left]: [&mut f32; 4],
) {
    let parts: Vec<f32> = val.split_whitespace().filter_map(&len).collect();
    let (t, r, b, l) = match parts.as_slice() {
        [a] => (*a, *a, *a, *a),
        [v, h] => (*v, *h, *v, *h),
        [t, h, b] => (*t, *h, *b, *h),
        [t, r, b, l, ..] => (*t, *r, *b, *l),
        [] => return,
    };
    *top = t;
    *right = r;
    *bottom = b;
    *left = l;
}

/// Styled children of `<body>` for an HTML snippet.
#[cfg(test)]
pub(crate) fn styled_body(html: &str, css: &str) -> Vec<StyledNode> {
    let doc = crate::dom::parse_html(html);
    build_styled_tree(&doc, &Stylesheet::parse(css))
        .into_iter()
        .flat_map(|root| match root {
            StyledNode::Element { children, .. } => children,
            StyledNode::Text { .. } => Vec::new(),
        })
        .find_map(|node| match node {
            StyledNode::Element {
                tag: Tag::Body,
                children,
                ..
            } => Some(children),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn styled(html: &str, css: &str) -> Vec<StyledNode> {
        styled_body(html, css)
    }

    fn first_style(nodes: &[StyledNode]) -> &ComputedStyle {
        match &nodes[0] {
            StyledNode::Element { style, .. } => style,
            StyledNode::Text { .. } => panic!("expected element"),
        }
    }

    fn child(node: &StyledNode, i: usize) -> &StyledNode {
        match node {
            StyledNode::Element { children, .. } => &children[i],
            StyledNode::Text { .. } => panic!("text has no children"),
        }
    }

    #[test]
    fn px_lengths_become_points() {
        assert_eq!(parse_length("16px", 12.0, 0.0), Some(12.0));
        assert_eq!(parse_length("2em", 10.0, 0.0), Some(20.0));
        assert_eq!(parse_length("1rem", 30.0, 0.0), Some(ROOT_FONT_SIZE));
        assert_eq!(parse_length("50%", 0.0, 200.0), Some(100.0));
        assert_eq!(parse_length("auto", 12.0, 0.0), Some(0.0));
        assert_eq!(parse_length("wide", 12.0, 0.0), None);
    }

    #[test]
    fn colors_parse() {
        assert_eq!(Color::from_hex("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("red", Color::BLACK), Some(Color::rgb(255, 0, 0)));
        let c = Color::parse("rgba(0, 0, 0, 0.5)", Color::BLACK).unwrap();
        assert!((c.a - 0.5).abs() < 1e-6);
        let blended = c.over_white();
        assert!((blended.r - 0.5).abs() < 1e-6);
        assert!(Color::parse("nonsense", Color::BLACK).is_none());
    }

    #[test]
    fn sheet_overrides_tag_defaults_and_inline_wins() {
        let nodes = styled(
            r#"<p style="color: #00ff00">x</p>"#,
            "p { color: red; margin: 4px 8px; }",
        );
        let s = first_style(&nodes);
        assert_eq!(s.color, Color::rgb(0, 255, 0));
        assert_eq!(s.margin_top, 3.0);
        assert_eq!(s.margin_right, 6.0);
        assert_eq!(s.margin_left, 6.0);
    }

    #[test]
    fn important_beats_inline() {
        let nodes = styled(r#"<p style="color: blue">x</p>"#, "p { color: red !important; }");
        assert_eq!(first_style(&nodes).color, Color::rgb(255, 0, 0));
    }

    #[test]
    fn text_properties_inherit() {
        let nodes = styled(
            "<blockquote><p>quoted</p></blockquote>",
            "blockquote { color: #6a737d; font-size: 20px; }",
        );
        let p = child(&nodes[0], 0);
        assert_eq!(p.style().color, Color::from_hex("#6a737d").unwrap());
        assert_eq!(p.style().font_size, 15.0);
        // Box properties do not.
        assert_eq!(p.style().margin_left, 0.0);
    }

    #[test]
    fn em_font_size_is_relative_to_parent() {
        let nodes = styled("<div><h1>t</h1></div>", "div { font-size: 10pt } h1 { font-size: 2em; padding: 1em }");
        let h1 = child(&nodes[0], 0).style();
        assert_eq!(h1.font_size, 20.0);
        assert_eq!(h1.padding_top, 20.0);
    }

    #[test]
    fn head_content_is_dropped() {
        let doc = parse_html(
            "<html><head><title>x</title><style>p{}</style></head><body><p>y</p></body></html>",
        );
        let nodes = build_styled_tree(&doc, &Stylesheet::default());
        let html = &nodes[0];
        match html {
            StyledNode::Element { children, .. } => {
                assert_eq!(children.len(), 1);
                assert!(matches!(&children[0], StyledNode::Element { tag: Tag::Body, .. }));
            }
            StyledNode::Text { .. } => panic!("expected html element"),
        }
    }

    #[test]
    fn border_shorthands() {
        let nodes = styled(
            "<h2>x</h2><table></table>",
            "h2 { border-bottom: 1px solid #eaecef } table { border: 0 }",
        );
        let h2 = first_style(&nodes);
        assert_eq!(h2.border_bottom.width, 0.75);
        assert!(!h2.border_top.is_visible());
        match &nodes[1] {
            StyledNode::Element { style, .. } => assert!(!style.has_border()),
            StyledNode::Text { .. } => panic!("expected table"),
        }
    }

    #[test]
    fn monospace_family_detection() {
        assert_eq!(
            parse_font_family("sfmono-regular, consolas, monospace"),
            FontFamily::Monospace
        );
        assert_eq!(
            parse_font_family("-apple-system, 'segoe ui', helvetica"),
            FontFamily::SansSerif
        );
        assert_eq!(parse_font_family("georgia, serif"), FontFamily::Serif);
    }

    #[test]
    fn zebra_rows_get_background() {
        let nodes = styled(
            "<table><tbody><tr><td>1</td></tr><tr><td>2</td></tr></tbody></table>",
            "table tr:nth-child(2n) { background-color: #f6f8fa; }",
        );
        let tbody = child(&nodes[0], 0);
        assert!(child(tbody, 0).style().background_color.is_transparent());
        assert_eq!(
            child(tbody, 1).style().background_color,
            Color::from_hex("#f6f8fa").unwrap()
        );
    }

    #[test]
    fn structural_and_attribute_selectors_apply() {
        let nodes = styled(
            r#"<ul><li>a</li><li>b</li><li><input type="checkbox"> c</li></ul>"#,
            "li:first-child { color: red } li + li { color: blue } li:last-child > input[type=checkbox] { margin-right: 8px }",
        );
        let ul = &nodes[0];
        assert_eq!(child(ul, 0).style().color, Color::rgb(255, 0, 0));
        assert_eq!(child(ul, 1).style().color, Color::rgb(0, 0, 255));
        assert_eq!(child(child(ul, 2), 0).style().margin_right, 6.0);
    }

    #[test]
    fn page_break_properties() {
        let nodes = styled(
            r#"<div style="page-break-before: always; break-after: page"></div>"#,
            "",
        );
        let s = first_style(&nodes);
        assert!(s.page_break_before);
        assert!(s.page_break_after);
    }
}
