//! Layout engine – uses Taffy to compute block layout from a styled DOM
//! tree, then converts the result into a tree of positioned boxes.
//!
//! Every element becomes a flex-column container, which gives normal block
//! stacking. Runs of inline content become anonymous leaves whose lines are
//! wrapped up front to the width the leaf will receive, so Taffy only ever
//! sees fixed-size leaves. Table rows are flex rows whose cells share the
//! row width equally.

use std::collections::HashMap;

use taffy::{
    AvailableSpace, LengthPercentage, LengthPercentageAuto, NodeId, Rect, Size, Style, TaffyTree,
};

use crate::dom::Tag;
use crate::fonts::{measure_text_width, ASCENT};
use crate::images::ImageStore;
use crate::pdf::PdfError;
use crate::style::{ComputedStyle, Dimension, Display, FontStyle, ListStyle, StyledNode, TextAlign, PT_PER_PX};
use crate::text::{wrap_inline, InlineItem, RunStyle, WrappedLine};

// ---------------------------------------------------------------------------
// Intermediate layout tree (pre-pagination)
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub marker: Option<ListMarker>,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    /// Wrapped inline content; the box has no padding or border.
    Text {
        lines: Vec<WrappedLine>,
        align: TextAlign,
    },
    Image {
        src: String,
    },
}

/// Bullet or number drawn in the gutter left of a list item.
#[derive(Debug, Clone)]
pub struct ListMarker {
    pub text: String,
    pub style: RunStyle,
    pub width: f32,
    /// Baseline offset from the top of the list item box.
    pub baseline: f32,
}

impl PositionedBox {
    pub fn is_text(&self) -> bool {
        matches!(self.content, BoxContent::Text { .. })
    }

    /// Baseline of the first line of text at or below this box, in document
    /// coordinates.
    fn first_baseline(&self) -> Option<f32> {
        if let BoxContent::Text { lines, .. } = &self.content {
            return lines.first().map(|l| self.y + l.baseline);
        }
        self.children.iter().find_map(PositionedBox::first_baseline)
    }
}

type LayoutResult<T> = Result<T, PdfError>;

fn layout_err(e: taffy::TaffyError) -> PdfError {
    PdfError::Layout(e.to_string())
}

/// Inline content collected from a subtree before wrapping.
enum Inline {
    Item(InlineItem),
    Image {
        src: String,
        alt: String,
        style: ComputedStyle,
    },
}

struct NodeInfo {
    style: ComputedStyle,
    content: BoxContent,
    marker: Option<(String, RunStyle)>,
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    images: &'a mut ImageStore,
    nodes: HashMap<NodeId, NodeInfo>,
    /// Height of the page content area; images are scaled to fit it.
    content_height: f32,
}

impl<'a> LayoutBuilder<'a> {
    fn new(images: &'a mut ImageStore, content_height: f32) -> Self {
        Self {
            taffy: TaffyTree::new(),
            images,
            nodes: HashMap::new(),
            content_height,
        }
    }

    fn build_children(
        &mut self,
        children: &[StyledNode],
        parent: &ComputedStyle,
        parent_tag: Option<&Tag>,
        attrs: Option<&HashMap<String, String>>,
        inner_width: f32,
    ) -> LayoutResult<Vec<NodeId>> {
        let mut ids = Vec::new();
        let mut pending: Vec<InlineItem> = Vec::new();

        // Table cells share the row width equally.
        let child_width = if parent.display == Display::TableRow {
            let cells = children.iter().filter(|c| !is_inline(c)).count().max(1);
            inner_width / cells as f32
        } else {
            inner_width
        };

        let is_list = matches!(parent_tag, Some(Tag::Ul) | Some(Tag::Ol));
        let mut counter: i64 = attrs
            .and_then(|a| a.get("start"))
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);

        for child in children {
            if is_inline(child) {
                let mut pieces = Vec::new();
                collect_inline(child, None, &mut pieces);
                for piece in pieces {
                    match piece {
                        Inline::Item(item) => pending.push(item),
                        Inline::Image { src, alt, style } => {
                            match self.build_image(&src, &style, inner_width)? {
                                Some(id) => {
                                    self.flush_inline(&mut pending, parent, inner_width, &mut ids)?;
                                    ids.push(id);
                                }
                                None if !alt.trim().is_empty() => {
                                    let mut alt_style = style.clone();
                                    alt_style.font_style = FontStyle::Italic;
                                    pending.push(InlineItem::Text {
                                        text: alt,
                                        style: RunStyle::from_style(&alt_style, None),
                                    });
                                }
                                None => {}
                            }
                        }
                    }
                }
                continue;
            }

            self.flush_inline(&mut pending, parent, inner_width, &mut ids)?;

            let marker = match child {
                StyledNode::Element {
                    style, children, ..
                } if is_list && style.display == Display::ListItem => {
                    let n = counter;
                    counter = counter.saturating_add(1);
                    list_marker(style, children, n)
                }
                _ => None,
            };
            if let Some(id) = self.build_element(child, child_width, marker)? {
                ids.push(id);
            }
        }
        self.flush_inline(&mut pending, parent, inner_width, &mut ids)?;
        Ok(ids)
    }

    /// Wrap any pending inline items into a text leaf.
    fn flush_inline(
        &mut self,
        pending: &mut Vec<InlineItem>,
        block: &ComputedStyle,
        width: f32,
        ids: &mut Vec<NodeId>,
    ) -> LayoutResult<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let items = std::mem::take(pending);
        let has_content = items.iter().any(|item| match item {
            InlineItem::Break => true,
            InlineItem::Text { text, .. } => !text.trim().is_empty(),
        });
        if !has_content {
            return Ok(());
        }

        let lines = wrap_inline(
            &items,
            width,
            block.line_height,
            block.font_size,
            block.is_pre(),
        );
        if lines.is_empty() {
            return Ok(());
        }
        let height: f32 = lines.iter().map(|l| l.height).sum();

        let node = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width: taffy::Dimension::Length(width.max(0.0)),
                    height: taffy::Dimension::Length(height),
                },
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(layout_err)?;
        self.nodes.insert(
            node,
            NodeInfo {
                style: ComputedStyle::default(),
                content: BoxContent::Text {
                    lines,
                    align: block.text_align,
                },
                marker: None,
            },
        );
        ids.push(node);
        Ok(())
    }

    fn build_element(
        &mut self,
        styled: &StyledNode,
        avail_width: f32,
        marker: Option<(String, RunStyle)>,
    ) -> LayoutResult<Option<NodeId>> {
        let StyledNode::Element {
            tag,
            style,
            children,
            attrs,
        } = styled
        else {
            return Ok(None);
        };

        if *tag == Tag::Img {
            let src = attrs.get("src").map(String::as_str).unwrap_or_default();
            return self.build_image(src, style, avail_width);
        }

        // Border-box width this element will get.
        let outer = (avail_width - style.margin_left - style.margin_right).max(0.0);
        let chrome = style.horizontal_chrome();
        let explicit = style.width.resolve(avail_width).map(|w| w + chrome);
        let max = style.max_width.resolve(avail_width).map(|w| w + chrome);
        let mut border_box = explicit.unwrap_or(outer);
        if let Some(max) = max {
            border_box = border_box.min(max);
        }
        let inner_width = (border_box - chrome).max(1.0);

        let child_ids =
            self.build_children(children, style, Some(tag), Some(attrs), inner_width)?;

        let mut taffy_style = computed_to_taffy(style);
        if explicit.is_some() || max.is_some_and(|m| m < outer) {
            taffy_style.size.width = taffy::Dimension::Length(border_box);
        }

        let node = self
            .taffy
            .new_with_children(taffy_style, &child_ids)
            .map_err(layout_err)?;
        self.nodes.insert(
            node,
            NodeInfo {
                style: style.clone(),
                content: BoxContent::None,
                marker,
            },
        );
        Ok(Some(node))
    }

    /// A fixed-size leaf for a loadable image, or `None` when the source
    /// cannot be used.
    fn build_image(
        &mut self,
        src: &str,
        style: &ComputedStyle,
        avail_width: f32,
    ) -> LayoutResult<Option<NodeId>> {
        let Some(image) = self.images.load(src) else {
            return Ok(None);
        };
        let intrinsic_w = image.width_px as f32 * PT_PER_PX;
        let intrinsic_h = image.height_px as f32 * PT_PER_PX;
        let aspect = intrinsic_w / intrinsic_h;

        let known_h = match style.height {
            Dimension::Pt(h) => Some(h),
            _ => None,
        };
        let (mut w, mut h) = match (style.width.resolve(avail_width), known_h) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w / aspect),
            (None, Some(h)) => (h * aspect, h),
            (None, None) => (intrinsic_w, intrinsic_h),
        };

        let outer = avail_width - style.margin_left - style.margin_right - style.horizontal_chrome();
        let mut max_w = outer.max(1.0);
        if let Some(m) = style.max_width.resolve(avail_width) {
            max_w = max_w.min(m);
        }
        if w > max_w {
            h *= max_w / w;
            w = max_w;
        }
        let max_h = (self.content_height - style.vertical_chrome()).max(1.0);
        if h > max_h {
            w *= max_h / h;
            h = max_h;
        }

        let mut taffy_style = computed_to_taffy(style);
        taffy_style.size = Size {
            width: taffy::Dimension::Length(w + style.horizontal_chrome()),
            height: taffy::Dimension::Length(h + style.vertical_chrome()),
        };
        taffy_style.flex_shrink = 0.0;
        // Images keep their own width inside a stretching column.
        taffy_style.align_self = Some(taffy::AlignSelf::FlexStart);

        let node = self.taffy.new_leaf(taffy_style).map_err(layout_err)?;
        self.nodes.insert(
            node,
            NodeInfo {
                style: style.clone(),
                content: BoxContent::Image {
                    src: src.to_string(),
                },
                marker: None,
            },
        );
        Ok(Some(node))
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> LayoutResult<PositionedBox> {
        let layout = self.taffy.layout(node).map_err(layout_err)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(layout_err)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<LayoutResult<Vec<_>>>()?;

        let (style, content, marker) = match self.nodes.get(&node) {
            Some(info) => (info.style.clone(), info.content.clone(), info.marker.clone()),
            None => (ComputedStyle::default(), BoxContent::None, None),
        };

        let mut pbox = PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style,
            content,
            marker: None,
            children,
        };
        if let Some((text, run)) = marker {
            let baseline = pbox
                .first_baseline()
                .map(|b| b - y)
                .unwrap_or(pbox.style.border_top.width + pbox.style.padding_top + run.size * ASCENT);
            pbox.marker = Some(ListMarker {
                width: measure_text_width(&text, run.face, run.size),
                text,
                style: run,
                baseline,
            });
        }
        Ok(pbox)
    }
}

fn is_inline(node: &StyledNode) -> bool {
    match node {
        StyledNode::Text { .. } => true,
        StyledNode::Element { tag, style, .. } => {
            style.display.is_inline() || (*tag == Tag::Img && style.display == Display::InlineBlock)
        }
    }
}

/// Flatten an inline subtree into items. Block-level elements nested inside
/// inline ones are set off by line breaks.
fn collect_inline(node: &StyledNode, background: Option<crate::style::Color>, out: &mut Vec<Inline>) {
    match node {
        StyledNode::Text { text, style } => out.push(Inline::Item(InlineItem::Text {
            text: text.clone(),
            style: RunStyle::from_style(style, background),
        })),
        StyledNode::Element {
            tag,
            style,
            children,
            attrs,
        } => match tag {
            Tag::Br => out.push(Inline::Item(InlineItem::Break)),
            Tag::Img => out.push(Inline::Image {
                src: attrs.get("src").cloned().unwrap_or_default(),
                alt: attrs.get("alt").cloned().unwrap_or_default(),
                style: style.clone(),
            }),
            Tag::Input => {
                if let Some(text) = checkbox_text(attrs) {
                    out.push(Inline::Item(InlineItem::Text {
                        text: text.to_string(),
                        style: RunStyle::from_style(style, background),
                    }));
                }
            }
            _ => {
                let background = if style.background_color.is_transparent() {
                    background
                } else {
                    Some(style.background_color)
                };
                let block = !style.display.is_inline();
                if block {
                    out.push(Inline::Item(InlineItem::Break));
                }
                for child in children {
                    collect_inline(child, background, out);
                }
                if block {
                    out.push(Inline::Item(InlineItem::Break));
                }
            }
        },
    }
}

/// `[x] ` / `[ ] ` for checkbox inputs.
fn checkbox_text(attrs: &HashMap<String, String>) -> Option<&'static str> {
    let is_checkbox = attrs
        .get("type")
        .is_some_and(|t| t.eq_ignore_ascii_case("checkbox"));
    if !is_checkbox {
        return None;
    }
    Some(if attrs.contains_key("checked") {
        "[x] "
    } else {
        "[ ] "
    })
}

/// Whether the first content of a list item is a task-list checkbox.
fn starts_with_checkbox(children: &[StyledNode]) -> bool {
    for child in children {
        match child {
            StyledNode::Text { text, .. } if text.trim().is_empty() => continue,
            StyledNode::Text { .. } => return false,
            StyledNode::Element {
                tag: Tag::Input,
                attrs,
                ..
            } => return checkbox_text(attrs).is_some(),
            StyledNode::Element { children, .. } => return starts_with_checkbox(children),
        }
    }
    false
}

fn list_marker(li_style: &ComputedStyle, children: &[StyledNode], n: i64) -> Option<(String, RunStyle)> {
    if starts_with_checkbox(children) {
        return None;
    }
    let text = match li_style.list_style {
        ListStyle::None => return None,
        ListStyle::Disc => "\u{2022}".to_string(),
        ListStyle::Decimal => format!("{n}."),
    };
    Some((text, RunStyle::from_style(li_style, None)))
}

fn computed_to_taffy(s: &ComputedStyle) -> Style {
    let mut ts = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        align_items: Some(taffy::AlignItems::Stretch),
        flex_shrink: 0.0,
        ..Default::default()
    };

    match s.display {
        Display::TableRow => {
            ts.flex_direction = taffy::FlexDirection::Row;
        }
        Display::TableCell => {
            ts.flex_grow = 1.0;
            ts.flex_shrink = 1.0;
            ts.flex_basis = taffy::Dimension::Length(0.0); // equal columns
        }
        _ => {}
    }
    ts.min_size.width = taffy::Dimension::Length(0.0);

    if let Dimension::Pt(h) = s.height {
        ts.size.height = taffy::Dimension::Length(h + s.vertical_chrome());
    }

    ts.margin = Rect {
        top: LengthPercentageAuto::Length(s.margin_top),
        right: LengthPercentageAuto::Length(s.margin_right),
        bottom: LengthPercentageAuto::Length(s.margin_bottom),
        left: LengthPercentageAuto::Length(s.margin_left),
    };
    ts.padding = Rect {
        top: LengthPercentage::Length(s.padding_top),
        right: LengthPercentage::Length(s.padding_right),
        bottom: LengthPercentage::Length(s.padding_bottom),
        left: LengthPercentage::Length(s.padding_left),
    };
    ts.border = Rect {
        top: LengthPercentage::Length(s.border_top.width),
        right: LengthPercentage::Length(s.border_right.width),
        bottom: LengthPercentage::Length(s.border_bottom.width),
        left: LengthPercentage::Length(s.border_left.width),
    };
    ts
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute layout for a styled tree, returning the top-level positioned
/// boxes in document coordinates (x already offset by the page margin).
pub fn compute_layout(
    styled_nodes: &[StyledNode],
    page_width: f32,
    page_margin: f32,
    content_height: f32,
    images: &mut ImageStore,
) -> LayoutResult<Vec<PositionedBox>> {
    let content_width = (page_width - 2.0 * page_margin).max(1.0);
    let mut builder = LayoutBuilder::new(images, content_height);

    let root_style = ComputedStyle::default();
    let child_ids = builder.build_children(styled_nodes, &root_style, None, None, content_width)?;

    let root = builder
        .taffy
        .new_with_children(
            Style {
                display: taffy::Display::Flex,
                flex_direction: taffy::FlexDirection::Column,
                size: Size {
                    width: taffy::Dimension::Length(content_width),
                    height: taffy::Dimension::Auto,
                },
                ..Default::default()
            },
            &child_ids,
        )
        .map_err(layout_err)?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(layout_err)?;

    let root_box = builder.extract(root, page_margin, 0.0)?;
    log::debug!(
        "layout: {} top-level boxes, document height {:.1}pt",
        root_box.children.len(),
        root_box.height
    );
    Ok(root_box.children)
}
