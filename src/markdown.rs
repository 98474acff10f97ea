//! Markdown renderer – Markdown text → complete HTML document.
//!
//! Parsing is delegated to `pulldown-cmark`; this module only configures the
//! GFM extensions, filters dangerous raw HTML tags and wraps the body in a
//! document skeleton with a `<head>` the styler can inject into.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use thiserror::Error;

/// Title used when a document has no heading.
pub const DEFAULT_TITLE: &str = "Document";

/// Tags the GFM "tagfilter" extension neutralises in raw HTML.
const FILTERED_TAGS: &[&str] = &[
    "title",
    "textarea",
    "style",
    "xmp",
    "iframe",
    "noembed",
    "noframes",
    "script",
    "plaintext",
];

#[derive(Debug, Error)]
#[error("markdown rendering failed: {0}")]
pub struct MarkdownError(pub String);

/// Anything that turns Markdown into a full HTML document.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, MarkdownError>;
}

/// GitHub-flavored renderer backed by pulldown-cmark.
#[derive(Debug, Clone)]
pub struct GfmRenderer {
    gfm: bool,
}

impl Default for GfmRenderer {
    fn default() -> Self {
        Self { gfm: true }
    }
}

impl GfmRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the GFM extensions (tables, task lists,
    /// strikethrough, footnotes). Enabled by default.
    #[must_use]
    pub fn with_gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    pub fn parser_options(&self) -> Options {
        if self.gfm {
            Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_FOOTNOTES
                | Options::ENABLE_GFM
        } else {
            Options::empty()
        }
    }

    /// Render just the `<body>` content.
    pub fn render_body(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.parser_options()).map(|event| match event {
            Event::Html(raw) => Event::Html(filter_raw_html(raw)),
            Event::InlineHtml(raw) => Event::InlineHtml(filter_raw_html(raw)),
            other => other,
        });
        let mut body = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut body, parser);
        body
    }
}

impl MarkdownRenderer for GfmRenderer {
    fn render(&self, markdown: &str) -> Result<String, MarkdownError> {
        let title = first_heading_text(markdown, self.parser_options())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let body = self.render_body(markdown);

        Ok(format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
            escape_html(title.trim()),
            body
        ))
    }
}

/// Plain text of the first heading, if any.
fn first_heading_text(markdown: &str, options: Options) -> Option<String> {
    let mut in_heading = false;
    let mut text = String::new();
    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) => return Some(text),
            Event::Text(t) | Event::Code(t) if in_heading => text.push_str(&t),
            _ => {}
        }
    }
    None
}

/// Escape the `<` of any open/close tag in [`FILTERED_TAGS`].
fn filter_raw_html(raw: CowStr<'_>) -> CowStr<'_> {
    if !raw.contains('<') {
        return raw;
    }
    let mut out = String::with_capacity(raw.len() + 8);
    let mut rest: &str = &raw;
    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if starts_filtered_tag(after) {
            out.push_str("&lt;");
        } else {
            out.push('<');
        }
        rest = after;
    }
    out.push_str(rest);
    CowStr::from(out)
}

fn starts_filtered_tag(after_lt: &str) -> bool {
    let name_part = after_lt.strip_prefix('/').unwrap_or(after_lt);
    FILTERED_TAGS.iter().any(|tag| {
        let Some(candidate) = name_part.get(..tag.len()) else {
            return false;
        };
        if !candidate.eq_ignore_ascii_case(tag) {
            return false;
        }
        match name_part[tag.len()..].chars().next() {
            None => true,
            Some(c) => c.is_ascii_whitespace() || c == '>' || c == '/',
        }
    })
}

/// Minimal HTML text escaping.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str) -> String {
        GfmRenderer::default().render(md).unwrap()
    }

    #[test]
    fn wraps_body_in_document() {
        let html = render("# Hello\n\nWorld");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<p>World</p>"));
        assert!(html.contains("</head>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn title_comes_from_first_heading() {
        let html = render("intro\n\n## Setup & `run`\n\n# Later");
        assert!(html.contains("<title>Setup &amp; run</title>"), "{html}");
    }

    #[test]
    fn title_falls_back_without_heading() {
        assert!(render("just text").contains("<title>Document</title>"));
    }

    #[test]
    fn gfm_constructs_render() {
        let md = "\
| a | b |
|---|---|
| 1 | 2 |

- [x] done
- [ ] todo

~~gone~~

```rust
fn main() {}
```

> quoted
";
        let html = render(md);
        assert!(html.contains("<table>"));
        assert!(html.contains("<th>a</th>"));
        assert!(html.contains("type=\"checkbox\""));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("class=\"language-rust\""));
        assert!(html.contains("<blockquote>"));
    }

    #[test]
    fn gfm_can_be_disabled() {
        let html = GfmRenderer::new()
            .with_gfm(false)
            .render("| a |\n|---|\n| 1 |")
            .unwrap();
        assert!(!html.contains("<table>"));
    }

    #[test]
    fn raw_style_tags_are_filtered() {
        let html = render("<style>body{}</style>\n\ntext <script>x</script>");
        assert_eq!(html.matches("<style").count(), 0, "{html}");
        assert!(html.contains("&lt;style>"));
        assert!(html.contains("&lt;script>"));
        assert!(html.contains("&lt;/script>"));
    }

    #[test]
    fn other_raw_html_survives() {
        let html = render("<div class=\"note\">hi</div>\n\na <kbd>Ctrl</kbd>");
        assert!(html.contains("<div class=\"note\">"));
        assert!(html.contains("<kbd>Ctrl</kbd>"));
    }

    #[test]
    fn filter_matches_whole_tag_names_only() {
        assert!(starts_filtered_tag("style>"));
        assert!(starts_filtered_tag("/TITLE>"));
        assert!(!starts_filtered_tag("styles>"));
        assert!(!starts_filtered_tag("div>"));
    }
}
