//! HTML documents – parsed with html5ever through `scraper`.
//!
//! [`parse_html`] always yields a full document: html5ever supplies the
//! missing `html`/`head`/`body` and `tbody` elements, closes what the
//! source leaves open, and decodes character references. Comments, doctype
//! and processing instructions never reach the styled tree.

use scraper::{ElementRef, Html};

// ---------------------------------------------------------------------------
// Element kinds
// ---------------------------------------------------------------------------

/// The tag name of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Title,
    Style,
    Script,
    Meta,
    Link,
    Div,
    P,
    /// `h1` – `h6`
    Heading(u8),
    Ul,
    Ol,
    Li,
    Table,
    Thead,
    Tbody,
    Tfoot,
    Tr,
    Td,
    Th,
    Pre,
    Code,
    Blockquote,
    Hr,
    Br,
    Img,
    Input,
    Span,
    A,
    Em,
    Strong,
    Del,
    Sup,
    Sub,
    /// Anything else; kept so its children still render.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "title" => Tag::Title,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "meta" => Tag::Meta,
            "link" => Tag::Link,
            "div" | "section" | "article" | "header" | "footer" | "nav" | "main" | "figure"
            | "details" | "summary" | "dl" | "dd" | "dt" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tfoot" => Tag::Tfoot,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "pre" => Tag::Pre,
            "code" | "kbd" | "samp" | "tt" => Tag::Code,
            "blockquote" => Tag::Blockquote,
            "hr" => Tag::Hr,
            "br" => Tag::Br,
            "img" => Tag::Img,
            "input" => Tag::Input,
            "span" | "small" | "mark" | "abbr" | "label" | "cite" | "q" => Tag::Span,
            "a" => Tag::A,
            "em" | "i" => Tag::Em,
            "strong" | "b" => Tag::Strong,
            "del" | "s" | "strike" => Tag::Del,
            "sup" => Tag::Sup,
            "sub" => Tag::Sub,
            _ => Tag::Unknown(lower),
        }
    }
}

/// A parsed HTML document.
pub struct Document {
    html: Html,
}

impl Document {
    /// The `<html>` element.
    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    /// Every element of the document, in tree order.
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.root().descendants().filter_map(ElementRef::wrap)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("html", &self.root().html())
            .finish()
    }
}

/// Parse an HTML string; malformed markup is recovered, never rejected.
pub fn parse_html(html: &str) -> Document {
    Document {
        html: Html::parse_document(html),
    }
}

/// The element kind of a scraper element.
pub fn tag_of(element: &ElementRef<'_>) -> Tag {
    Tag::from_name(element.value().name())
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Trimmed text of the first `<title>`, if non-empty.
pub fn document_title(doc: &Document) -> Option<String> {
    doc.elements()
        .find(|e| tag_of(e) == Tag::Title)
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Text of every `<style>` element, in document order.
pub fn document_stylesheets(doc: &Document) -> Vec<String> {
    doc.elements()
        .filter(|e| tag_of(e) == Tag::Style)
        .map(|e| e.text().collect())
        .collect()
}
