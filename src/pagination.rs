//! Pagination – splits the positioned document into pages.
//!
//! Handles:
//! - Page-break-before / page-break-after hints
//! - Atomic boxes (images, single lines, `break-inside: avoid` rows) moving
//!   to the next page whole
//! - Containers that overflow: their children are placed one by one and the
//!   container's background and borders are drawn once per page segment
//! - Text blocks split between lines

use crate::layout::{BoxContent, ListMarker, PositionedBox};
use crate::layout_config::*;
use crate::style::{BorderSide, ComputedStyle, TextAlign};
use crate::text::WrappedLine;

/// Tolerance for rounding when testing whether a box fits.
const FIT_EPSILON: f32 = 0.5;

/// Horizontal gap between a list marker and its item.
const MARKER_GAP: f32 = 6.0;

/// Convert positioned boxes into a paginated LayoutConfig.
pub fn paginate(
    boxes: &[PositionedBox],
    page_width: f32,
    page_height: f32,
    page_margin: f32,
) -> LayoutConfig {
    let content_height = (page_height - 2.0 * page_margin).max(1.0);
    let mut paginator = Paginator::new(page_margin, content_height);
    paginator.walk(boxes);

    let mut config = LayoutConfig::a4();
    config.page_width_pt = page_width;
    config.page_height_pt = page_height;
    config.pages = paginator.finish();
    log::debug!("pagination: {} page(s)", config.pages.len());
    config
}

/// A decorated container that has been descended into and is still open.
struct Shell<'a> {
    pbox: &'a PositionedBox,
    /// Document y where the segment on the current page starts.
    seg_start: f32,
    /// Position in the page's box list where the segment is inserted, so it
    /// paints below the children placed after it.
    index: usize,
    /// Whether an earlier page already holds a segment of this box.
    continued: bool,
}

struct Paginator<'a> {
    margin: f32,
    content_height: f32,
    pages: Vec<PageLayout>,
    current: Vec<LayoutBox>,
    /// Document y at which the current page begins.
    page_top: f32,
    shells: Vec<Shell<'a>>,
    break_pending: bool,
}

impl<'a> Paginator<'a> {
    fn new(margin: f32, content_height: f32) -> Self {
        Self {
            margin,
            content_height,
            pages: Vec::new(),
            current: Vec::new(),
            page_top: 0.0,
            shells: Vec::new(),
            break_pending: false,
        }
    }

    fn page_bottom(&self) -> f32 {
        self.page_top + self.content_height
    }

    fn to_page_y(&self, doc_y: f32) -> f32 {
        self.margin + doc_y - self.page_top
    }

    fn walk(&mut self, boxes: &'a [PositionedBox]) {
        for pbox in boxes {
            if (pbox.style.page_break_before || self.break_pending) && !self.current.is_empty() {
                self.new_page(pbox.y);
            }
            self.break_pending = false;
            self.place(pbox);
            if pbox.style.page_break_after {
                self.break_pending = true;
            }
        }
    }

    fn place(&mut self, pbox: &'a PositionedBox) {
        if pbox.y + pbox.height <= self.page_bottom() + FIT_EPSILON {
            self.emit_tree(pbox);
            return;
        }
        match &pbox.content {
            BoxContent::Text { lines, align } if lines.len() > 1 => {
                self.split_text(pbox, lines, *align)
            }
            _ if self.is_atomic(pbox) => {
                if !self.current.is_empty() {
                    self.new_page(pbox.y);
                }
                self.emit_tree(pbox);
            }
            _ => self.descend(pbox),
        }
    }

    fn is_atomic(&self, pbox: &PositionedBox) -> bool {
        match pbox.content {
            BoxContent::Text { .. } | BoxContent::Image { .. } => true,
            BoxContent::None => {
                pbox.children.is_empty()
                    || (pbox.style.page_break_inside_avoid && pbox.height <= self.content_height)
            }
        }
    }

    /// Place the children of an overflowing container individually.
    fn descend(&mut self, pbox: &'a PositionedBox) {
        if let Some(marker) = &pbox.marker {
            // Keep the marker on the same page as the item's first line.
            if pbox.y + marker.baseline > self.page_bottom() && !self.current.is_empty() {
                self.new_page(pbox.y);
            }
        }

        let decorated = has_decoration(&pbox.style);
        if decorated {
            self.shells.push(Shell {
                pbox,
                seg_start: pbox.y,
                index: self.current.len(),
                continued: false,
            });
        }
        if let Some(marker) = &pbox.marker {
            let mut lb = LayoutBox::new(pbox.x, self.to_page_y(pbox.y), 0.0, 0.0);
            lb.marker = Some(self.marker(pbox, marker));
            self.current.push(lb);
        }

        self.walk(&pbox.children);

        if decorated {
            if let Some(shell) = self.shells.pop() {
                if let Some(segment) = self.segment(&shell, pbox.y + pbox.height, true) {
                    self.current.insert(shell.index, segment);
                }
            }
        }
    }

    fn split_text(&mut self, pbox: &PositionedBox, lines: &[WrappedLine], align: TextAlign) {
        let mut chunk: Vec<TextLine> = Vec::new();
        let mut chunk_top = pbox.y;
        let mut offset = 0.0;

        for line in lines {
            let line_top = pbox.y + offset;
            let overflows = line_top + line.height > self.page_bottom() + FIT_EPSILON;
            if overflows && (!chunk.is_empty() || !self.current.is_empty()) {
                self.push_text(pbox, chunk_top, std::mem::take(&mut chunk));
                self.new_page(line_top);
                chunk_top = line_top;
            }
            chunk.push(text_line(line, line_top - chunk_top, pbox.width, align));
            offset += line.height;
        }
        self.push_text(pbox, chunk_top, chunk);
    }

    fn push_text(&mut self, pbox: &PositionedBox, top: f32, lines: Vec<TextLine>) {
        if lines.is_empty() {
            return;
        }
        let height = lines.iter().map(|l| l.height).sum();
        let mut lb = LayoutBox::new(pbox.x, self.to_page_y(top), pbox.width, height);
        lb.text = Some(TextContent { lines });
        self.current.push(lb);
    }

    /// Emit a box and all of its descendants on the current page.
    fn emit_tree(&mut self, pbox: &PositionedBox) {
        let lb = self.layout_box(pbox);
        self.current.push(lb);
        for child in &pbox.children {
            self.emit_tree(child);
        }
    }

    fn layout_box(&self, pbox: &PositionedBox) -> LayoutBox {
        let mut lb = LayoutBox::new(pbox.x, self.to_page_y(pbox.y), pbox.width, pbox.height);
        decorate(&mut lb, &pbox.style);

        match &pbox.content {
            BoxContent::Text { lines, align } => {
                let mut y = 0.0;
                let lines = lines
                    .iter()
                    .map(|line| {
                        let tl = text_line(line, y, pbox.width, *align);
                        y += line.height;
                        tl
                    })
                    .collect();
                lb.text = Some(TextContent { lines });
            }
            BoxContent::Image { src } => {
                let s = &pbox.style;
                lb.image = Some(ImageContent {
                    src: src.clone(),
                    x_offset: s.border_left.width + s.padding_left,
                    y_offset: s.border_top.width + s.padding_top,
                    width: (pbox.width - s.horizontal_chrome()).max(0.0),
                    height: (pbox.height - s.vertical_chrome()).max(0.0),
                });
            }
            BoxContent::None => {}
        }
        lb.marker = pbox.marker.as_ref().map(|m| self.marker(pbox, m));
        lb
    }

    fn marker(&self, pbox: &PositionedBox, marker: &ListMarker) -> MarkerContent {
        MarkerContent {
            text: marker.text.clone(),
            x_end: pbox.x - MARKER_GAP,
            baseline_y: self.to_page_y(pbox.y + marker.baseline),
            width: marker.width,
            font: marker.style.face,
            font_size: marker.style.size,
            color: marker.style.color.to_array(),
        }
    }

    /// The background/border segment of an open container between its
    /// current segment start and `end`.
    fn segment(&self, shell: &Shell<'_>, end: f32, closes: bool) -> Option<LayoutBox> {
        let top = shell.seg_start.max(shell.pbox.y);
        let height = end - top;
        if height <= 0.0 {
            return None;
        }
        let mut lb = LayoutBox::new(shell.pbox.x, self.to_page_y(top), shell.pbox.width, height);
        decorate(&mut lb, &shell.pbox.style);
        if shell.continued {
            lb.borders.top = None;
        }
        if !closes {
            lb.borders.bottom = None;
        }
        Some(lb)
    }

    fn new_page(&mut self, top: f32) {
        let bottom = self.page_bottom();
        let len = self.current.len();

        // Innermost first: inner shells never sit before outer ones, so
        // inserting them first keeps the outer indices valid.
        let mut had_content = vec![false; self.shells.len()];
        for i in (0..self.shells.len()).rev() {
            let shell = &self.shells[i];
            if shell.index == len {
                continue;
            }
            had_content[i] = true;
            let index = shell.index;
            if let Some(segment) = self.segment(shell, bottom, false) {
                self.current.insert(index, segment);
            }
        }

        let boxes = std::mem::take(&mut self.current);
        self.pages.push(PageLayout {
            page_index: self.pages.len(),
            boxes,
        });
        self.page_top = top;

        for (shell, had_content) in self.shells.iter_mut().zip(had_content) {
            shell.seg_start = top;
            shell.index = 0;
            shell.continued |= had_content;
        }
    }

    fn finish(mut self) -> Vec<PageLayout> {
        if !self.current.is_empty() || self.pages.is_empty() {
            let boxes = std::mem::take(&mut self.current);
            self.pages.push(PageLayout {
                page_index: self.pages.len(),
                boxes,
            });
        }
        self.pages
    }
}

fn has_decoration(style: &ComputedStyle) -> bool {
    !style.background_color.is_transparent() || style.has_border()
}

fn decorate(lb: &mut LayoutBox, style: &ComputedStyle) {
    if !style.background_color.is_transparent() {
        lb.background_color = Some(style.background_color.to_array());
    }
    lb.borders = Borders {
        top: border(&style.border_top),
        right: border(&style.border_right),
        bottom: border(&style.border_bottom),
        left: border(&style.border_left),
    };
}

fn border(side: &BorderSide) -> Option<BorderStyle> {
    side.is_visible().then(|| BorderStyle {
        width: side.width,
        color: side.color.to_array(),
    })
}

fn text_line(line: &WrappedLine, y_offset: f32, box_width: f32, align: TextAlign) -> TextLine {
    let slack = (box_width - line.width).max(0.0);
    let x_offset = match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => slack / 2.0,
        TextAlign::Right => slack,
    };
    TextLine {
        x_offset,
        y_offset,
        height: line.height,
        baseline: line.baseline,
        fragments: line
            .fragments
            .iter()
            .map(|f| TextFragment {
                text: f.text.clone(),
                x: f.x,
                width: f.width,
                font: f.style.face,
                font_size: f.style.size,
                color: f.style.color.to_array(),
                underline: f.style.underline,
                strike: f.style.strike,
                background: f.style.background.map(|c| c.to_array()),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageStore;
    use crate::layout::compute_layout;
    use crate::style::styled_body;

    const MARGIN: f32 = 40.0;

    fn paginate_html(html: &str, css: &str) -> LayoutConfig {
        let styled = styled_body(html, css);
        let mut images = ImageStore::new(None);
        let boxes = compute_layout(&styled, 595.0, MARGIN, 842.0 - 2.0 * MARGIN, &mut images).unwrap();
        paginate(&boxes, 595.0, 842.0, MARGIN)
    }

    fn all_text(config: &LayoutConfig) -> Vec<String> {
        (0..config.pages.len())
            .flat_map(|i| config.page_text(i))
            .collect()
    }

    fn assert_text_within_pages(config: &LayoutConfig) {
        for page in &config.pages {
            for b in page.boxes.iter().filter(|b| b.text.is_some()) {
                assert!(b.y >= MARGIN - 0.01, "box starts above margin: {}", b.y);
                assert!(
                    b.y + b.height <= 842.0 - MARGIN + FIT_EPSILON + 0.01,
                    "box overflows page: {} + {}",
                    b.y,
                    b.height
                );
            }
        }
    }

    #[test]
    fn single_page() {
        let config = paginate_html("<p>Short text</p>", "");
        assert_eq!(config.pages.len(), 1);
        assert_eq!(config.page_text(0), vec!["Short text"]);
    }

    #[test]
    fn empty_document_still_has_a_page() {
        let config = paginate_html("", "");
        assert_eq!(config.pages.len(), 1);
        assert!(config.pages[0].boxes.is_empty());
    }

    #[test]
    fn multiple_pages() {
        // Generate enough content to fill multiple pages
        let mut html = String::new();
        for i in 0..60 {
            html.push_str(&format!("<p>Paragraph {} with some text</p>", i));
        }
        let config = paginate_html(&html, "");
        assert!(
            config.pages.len() > 1,
            "Expected multiple pages, got {}",
            config.pages.len()
        );
        assert_text_within_pages(&config);
        assert_eq!(all_text(&config).len(), 60);
    }

    #[test]
    fn page_break_hints() {
        let config = paginate_html(
            r#"<p>one</p><p style="page-break-before: always">two</p><p style="break-after: page">three</p><p>four</p>"#,
            "",
        );
        assert_eq!(config.pages.len(), 3);
        assert_eq!(config.page_text(0), vec!["one"]);
        assert_eq!(config.page_text(1), vec!["two", "three"]);
        assert_eq!(config.page_text(2), vec!["four"]);
    }

    #[test]
    fn code_block_splits_between_lines() {
        let code: String = (0..120).map(|i| format!("line {i}\n")).collect();
        let html = format!("<pre><code>{code}</code></pre>");
        let config = paginate_html(&html, "pre { background-color: #f6f8fa; border: 1px solid #ddd }");
        assert!(config.pages.len() >= 2);
        assert_text_within_pages(&config);

        let text = all_text(&config);
        assert_eq!(text.len(), 120);
        assert_eq!(text[119], "line 119");

        // The block's background is redrawn on every page, below its text.
        for page in &config.pages {
            assert!(page.boxes[0].background_color.is_some());
        }
        let second = &config.pages[1].boxes[0];
        assert!(second.borders.top.is_none());
        assert!(second.borders.left.is_some());
        assert!(config.pages[0].boxes[0].borders.bottom.is_none());
    }

    #[test]
    fn table_rows_stay_whole() {
        let rows: String = (0..80)
            .map(|i| format!("<tr><td>r{i}</td><td>cell</td></tr>"))
            .collect();
        let config = paginate_html(&format!("<table>{rows}</table>"), "");
        assert!(config.pages.len() >= 2);
        assert_text_within_pages(&config);
        let text = all_text(&config);
        assert_eq!(text.len(), 160);
        assert_eq!(text[0], "r0");
    }

    #[test]
    fn centered_lines_are_offset() {
        let config = paginate_html(r#"<p style="text-align: center">hi</p>"#, "");
        let text = config.pages[0]
            .boxes
            .iter()
            .find_map(|b| b.text.as_ref())
            .unwrap();
        assert!(text.lines[0].x_offset > 200.0);
    }

    #[test]
    fn list_markers_are_placed_left_of_items() {
        let config = paginate_html("<ul><li>one</li></ul>", "");
        let (li, marker) = config.pages[0]
            .boxes
            .iter()
            .find_map(|b| b.marker.as_ref().map(|m| (b, m)))
            .unwrap();
        assert_eq!(marker.text, "\u{2022}");
        assert!(marker.x_end < li.x);
        assert!(marker.baseline_y > li.y);
    }
}
