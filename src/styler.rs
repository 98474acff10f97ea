//! HTML styler – injects the combined stylesheet into the document head.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StyleError {
    #[error("rendered HTML has no </head> to insert the stylesheet before")]
    MissingHead,
}

/// Insert `<style>` holding `css` immediately before the first `</head>`.
///
/// Any `</style` sequence inside `css` is neutralised so the block cannot be
/// closed early by user CSS.
pub fn apply_style(html: &str, css: &str) -> Result<String, StyleError> {
    let head_end = find_ascii_case_insensitive(html, "</head>").ok_or(StyleError::MissingHead)?;
    let css = neutralise_style_close(css);

    let mut out = String::with_capacity(html.len() + css.len() + 32);
    out.push_str(&html[..head_end]);
    out.push_str("<style>\n");
    out.push_str(&css);
    out.push_str("\n</style>\n");
    out.push_str(&html[head_end..]);
    Ok(out)
}

fn neutralise_style_close(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(pos) = find_ascii_case_insensitive(rest, "</style") {
        out.push_str(&rest[..pos]);
        out.push_str("<\\/style");
        rest = &rest[pos + "</style".len()..];
    }
    out.push_str(rest);
    out
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}
