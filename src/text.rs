//! Inline text runs and line wrapping.
//!
//! The layout engine flattens each run of inline content (text, `<em>`,
//! `<code>`, `<a>`, `<br>` ...) into [`InlineItem`]s and wraps them here into
//! [`WrappedLine`]s of positioned [`Fragment`]s. Outside `pre`, whitespace
//! collapses to single spaces and lines break between words; a word wider
//! than the line is split between characters. In `pre` mode every character
//! is kept, newlines force breaks and overlong lines wrap at the edge.

use crate::fonts::{measure_text_width, FontFace, ASCENT};
use crate::style::{Color, ComputedStyle, TextDecoration};

/// Visual attributes of a run of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStyle {
    pub face: FontFace,
    pub size: f32,
    pub color: Color,
    pub underline: bool,
    pub strike: bool,
    /// Highlight drawn behind the text (inline code).
    pub background: Option<Color>,
}

impl RunStyle {
    pub fn from_style(style: &ComputedStyle, background: Option<Color>) -> Self {
        Self {
            face: FontFace::from_style(style),
            size: style.font_size,
            color: style.color,
            underline: style.text_decoration == TextDecoration::Underline,
            strike: style.text_decoration == TextDecoration::LineThrough,
            background,
        }
    }

    fn measure(&self, text: &str) -> f32 {
        measure_text_width(text, self.face, self.size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InlineItem {
    Text { text: String, style: RunStyle },
    /// Forced line break (`<br>`).
    Break,
}

/// A styled piece of one line. `x` is relative to the line start.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub style: RunStyle,
    pub x: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrappedLine {
    pub fragments: Vec<Fragment>,
    pub width: f32,
    pub height: f32,
    /// Distance from the top of the line to the text baseline.
    pub baseline: f32,
}

impl WrappedLine {
    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }
}

/// Wrap `items` to `max_width` points.
///
/// `line_height` is the block's line-height factor and `base_size` its font
/// size, which sets the minimum height of every line (including empty ones).
pub fn wrap_inline(
    items: &[InlineItem],
    max_width: f32,
    line_height: f32,
    base_size: f32,
    pre: bool,
) -> Vec<WrappedLine> {
    let metrics = LineMetrics {
        factor: line_height,
        base_size,
    };
    let max_width = max_width.max(1.0);
    if pre {
        wrap_preformatted(items, max_width, metrics)
    } else {
        wrap_normal(items, max_width, metrics)
    }
}

#[derive(Clone, Copy)]
struct LineMetrics {
    factor: f32,
    base_size: f32,
}

#[derive(Default)]
struct LineBuilder {
    fragments: Vec<Fragment>,
    width: f32,
}

impl LineBuilder {
    fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn push(&mut self, text: &str, style: RunStyle) {
        let width = style.measure(text);
        match self.fragments.last_mut() {
            Some(last) if last.style == style => {
                last.text.push_str(text);
                last.width += width;
            }
            _ => self.fragments.push(Fragment {
                text: text.to_string(),
                style,
                x: self.width,
                width,
            }),
        }
        self.width += width;
    }

    fn finish(&mut self, metrics: LineMetrics) -> WrappedLine {
        let fragments = std::mem::take(&mut self.fragments);
        let width = std::mem::take(&mut self.width);
        let size = fragments
            .iter()
            .map(|f| f.style.size)
            .fold(metrics.base_size, f32::max);
        let height = size * metrics.factor;
        WrappedLine {
            fragments,
            width,
            height,
            baseline: (height - size) / 2.0 + size * ASCENT,
        }
    }
}

enum Token {
    /// An unbreakable word, possibly spanning several runs.
    Word(Vec<(String, RunStyle)>),
    Space(RunStyle),
    Break,
}

fn tokenize(items: &[InlineItem]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word: Vec<(String, RunStyle)> = Vec::new();

    for item in items {
        match item {
            InlineItem::Break => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
                tokens.push(Token::Break);
            }
            InlineItem::Text { text, style } => {
                for c in text.chars() {
                    if c.is_whitespace() && c != '\u{00A0}' {
                        if !word.is_empty() {
                            tokens.push(Token::Word(std::mem::take(&mut word)));
                        }
                        if !matches!(tokens.last(), Some(Token::Space(_))) {
                            tokens.push(Token::Space(*style));
                        }
                        continue;
                    }
                    match word.last_mut() {
                        Some((piece, s)) if s == style => piece.push(c),
                        _ => word.push((c.to_string(), *style)),
                    }
                }
            }
        }
    }
    if !word.is_empty() {
        tokens.push(Token::Word(word));
    }
    tokens
}

fn wrap_normal(items: &[InlineItem], max_width: f32, metrics: LineMetrics) -> Vec<WrappedLine> {
    let mut lines = Vec::new();
    let mut line = LineBuilder::default();
    let mut pending_space: Option<RunStyle> = None;

    for token in tokenize(items) {
        match token {
            Token::Space(style) => {
                if !line.is_empty() {
                    pending_space = Some(style);
                }
            }
            Token::Break => {
                lines.push(line.finish(metrics));
                pending_space = None;
            }
            Token::Word(pieces) => {
                let word_width: f32 = pieces.iter().map(|(t, s)| s.measure(t)).sum();
                let space_width = pending_space.map(|s| s.measure(" ")).unwrap_or(0.0);

                if !line.is_empty() && line.width + space_width + word_width > max_width {
                    lines.push(line.finish(metrics));
                    pending_space = None;
                }
                if let Some(style) = pending_space.take() {
                    line.push(" ", style);
                }
                if line.is_empty() && word_width > max_width {
                    push_chars(&pieces, &mut line, &mut lines, max_width, metrics);
                } else {
                    for (text, style) in &pieces {
                        line.push(text, *style);
                    }
                }
            }
        }
    }
    if !line.is_empty() {
        lines.push(line.finish(metrics));
    }
    lines
}

fn wrap_preformatted(
    items: &[InlineItem],
    max_width: f32,
    metrics: LineMetrics,
) -> Vec<WrappedLine> {
    let mut lines = Vec::new();
    let mut line = LineBuilder::default();

    for item in items {
        match item {
            InlineItem::Break => lines.push(line.finish(metrics)),
            InlineItem::Text { text, style } => {
                for (i, segment) in text.split('\n').enumerate() {
                    if i > 0 {
                        lines.push(line.finish(metrics));
                    }
                    let segment = segment.replace('\t', "    ").replace('\r', "");
                    if segment.is_empty() {
                        continue;
                    }
                    let piece = [(segment, *style)];
                    push_chars(&piece, &mut line, &mut lines, max_width, metrics);
                }
            }
        }
    }
    if !line.is_empty() {
        lines.push(line.finish(metrics));
    }
    lines
}

/// Append pieces character by character, breaking lines at `max_width`.
fn push_chars(
    pieces: &[(String, RunStyle)],
    line: &mut LineBuilder,
    lines: &mut Vec<WrappedLine>,
    max_width: f32,
    metrics: LineMetrics,
) {
    for (text, style) in pieces {
        let mut chunk = String::new();
        let mut chunk_width = 0.0;
        for c in text.chars() {
            let mut buf = [0u8; 4];
            let w = style.measure(c.encode_utf8(&mut buf));
            if line.width + chunk_width + w > max_width && (!line.is_empty() || !chunk.is_empty()) {
                if !chunk.is_empty() {
                    line.push(&chunk, *style);
                    chunk.clear();
                    chunk_width = 0.0;
                }
                lines.push(line.finish(metrics));
            }
            chunk.push(c);
            chunk_width += w;
        }
        if !chunk.is_empty() {
            line.push(&chunk, *style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::FontFamily;
    use pretty_assertions::assert_eq;

    fn plain() -> RunStyle {
        RunStyle::from_style(&ComputedStyle::default(), None)
    }

    fn bold() -> RunStyle {
        let mut s = plain();
        s.face.bold = true;
        s
    }

    fn text(t: &str, style: RunStyle) -> InlineItem {
        InlineItem::Text {
            text: t.to_string(),
            style,
        }
    }

    fn texts(lines: &[WrappedLine]) -> Vec<String> {
        lines.iter().map(WrappedLine::text).collect()
    }

    #[test]
    fn collapses_whitespace() {
        let lines = wrap_inline(&[text("  a \n\n  b  ", plain())], 500.0, 1.2, 12.0, false);
        assert_eq!(texts(&lines), vec!["a b"]);
    }

    #[test]
    fn wraps_between_words() {
        let lines = wrap_inline(
            &[text("Hello world foo bar", plain())],
            60.0,
            1.2,
            12.0,
            false,
        );
        assert!(lines.len() >= 2, "{:?}", texts(&lines));
        assert!(lines.iter().all(|l| l.width <= 60.0));
        assert_eq!(texts(&lines).join(" "), "Hello world foo bar");
    }

    #[test]
    fn styles_split_into_fragments_without_breaking_words() {
        let lines = wrap_inline(
            &[text("say ", plain()), text("hel", bold()), text("lo", plain())],
            500.0,
            1.2,
            12.0,
            false,
        );
        assert_eq!(lines.len(), 1);
        let frags = &lines[0].fragments;
        assert_eq!(frags.len(), 3);
        assert_eq!(frags[1].text, "hel");
        assert!((frags[1].x - frags[0].width).abs() < 1e-4);
    }

    #[test]
    fn long_words_split_by_character() {
        let lines = wrap_inline(&[text(&"x".repeat(100), plain())], 50.0, 1.2, 12.0, false);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.width <= 50.0 + 1e-3));
        assert_eq!(texts(&lines).concat(), "x".repeat(100));
    }

    #[test]
    fn forced_breaks() {
        let lines = wrap_inline(
            &[text("a", plain()), InlineItem::Break, text("b", plain())],
            500.0,
            1.2,
            12.0,
            false,
        );
        assert_eq!(texts(&lines), vec!["a", "b"]);
    }

    #[test]
    fn preformatted_keeps_spacing_and_blank_lines() {
        let mut mono = plain();
        mono.face.family = FontFamily::Monospace;
        let lines = wrap_inline(
            &[text("fn main() {\n\n    x\t1\n}\n", mono)],
            500.0,
            1.2,
            12.0,
            true,
        );
        assert_eq!(texts(&lines), vec!["fn main() {", "", "    x    1", "}"]);
    }

    #[test]
    fn line_height_follows_largest_run() {
        let mut big = plain();
        big.size = 24.0;
        let lines = wrap_inline(&[text("a ", plain()), text("B", big)], 500.0, 1.5, 12.0, false);
        assert_eq!(lines[0].height, 36.0);
        assert!(lines[0].baseline > 12.0);
    }
}
