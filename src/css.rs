//! CSS parsing and the cascade for the document's `<style>` sheets.
//!
//! Rule bodies and declarations are parsed here; selectors are compiled and
//! matched with `scraper` (the `selectors` engine), so combinators,
//! attribute selectors and the structural pseudo-classes all work. A
//! selector `scraper` rejects is dropped; the rest of its list still
//! applies. `@`-rules are skipped.

use scraper::{ElementRef, Selector};

/// A parsed stylesheet: one [`Rule`] per selector, in source order.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub selector: Selector,
    pub specificity: Specificity,
    pub declarations: Vec<Declaration>,
    order: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// (ids, classes + attributes + pseudo-classes, types + pseudo-elements)
pub type Specificity = (u32, u32, u32);

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let mut sheet = Stylesheet::default();
        sheet.append(css);
        sheet
    }

    /// Parse `css` and add its rules after the existing ones.
    pub fn append(&mut self, css: &str) {
        let css = strip_comments(css);
        let mut rest = css.as_str();
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            if rest.starts_with('@') {
                rest = skip_at_rule(rest);
                continue;
            }
            let Some(open) = rest.find('{') else {
                break;
            };
            let selector_text = &rest[..open];
            let body_start = open + 1;
            let body_len = rest[body_start..].find('}').unwrap_or(rest.len() - body_start);
            let body = &rest[body_start..body_start + body_len];
            rest = rest.get(body_start + body_len + 1..).unwrap_or("");

            let declarations = parse_declarations(body);
            if declarations.is_empty() {
                continue;
            }
            for part in split_top_level(selector_text, ',') {
                let part = part.trim();
                match Selector::parse(part) {
                    Ok(selector) => {
                        let order = self.rules.len();
                        self.rules.push(Rule {
                            selector,
                            specificity: specificity(part),
                            declarations: declarations.clone(),
                            order,
                        });
                    }
                    Err(e) => log::debug!("ignoring unsupported selector '{part}': {e:?}"),
                }
            }
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Declarations that apply to `element`, in cascade order (later
    /// entries win): normal before important, then by specificity, then by
    /// source order.
    pub fn matching_declarations(&self, element: &ElementRef<'_>) -> Vec<&Declaration> {
        let mut matched: Vec<(bool, Specificity, usize, &Declaration)> = Vec::new();
        for rule in &self.rules {
            if !rule.selector.matches(element) {
                continue;
            }
            for decl in &rule.declarations {
                matched.push((decl.important, rule.specificity, rule.order, decl));
            }
        }
        matched.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
        matched.into_iter().map(|(_, _, _, d)| d).collect()
    }
}

/// Parse a declaration block (`color: red; margin: 0 !important`).
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    split_top_level(block, ';')
        .into_iter()
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let mut value = value.trim();
            let mut important = false;
            if let Some(idx) = value.to_ascii_lowercase().rfind("!important") {
                important = true;
                value = value[..idx].trim_end();
            }
            if prop.is_empty() || value.is_empty() {
                return None;
            }
            Some(Declaration {
                property: prop,
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

/// Specificity of one complex selector that `scraper` has already accepted.
///
/// Arguments of functional pseudo-classes count once as the pseudo-class
/// itself.
fn specificity(selector: &str) -> Specificity {
    let (mut ids, mut classes, mut types) = (0, 0, 0);
    let mut chars = selector.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '#' => {
                ids += 1;
                skip_ident(&mut chars);
            }
            '.' => {
                classes += 1;
                skip_ident(&mut chars);
            }
            '[' => {
                classes += 1;
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                }
            }
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                types += 1;
                skip_ident(&mut chars);
            }
            ':' => {
                classes += 1;
                skip_ident(&mut chars);
                if chars.peek() == Some(&'(') {
                    let mut depth = 0usize;
                    for c in chars.by_ref() {
                        match c {
                            '(' => depth += 1,
                            ')' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            c if c.is_alphabetic() || c == '_' || c == '-' => {
                types += 1;
                skip_ident(&mut chars);
            }
            _ => {}
        }
    }
    (ids, classes, types)
}

fn skip_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars
        .peek()
        .is_some_and(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
    {
        chars.next();
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Skip an `@`-rule: either up to `;` or over its balanced `{ ... }` block.
fn skip_at_rule(css: &str) -> &str {
    let semi = css.find(';');
    let open = css.find('{');
    match (semi, open) {
        (Some(s), Some(o)) if s < o => &css[s + 1..],
        (Some(s), None) => &css[s + 1..],
        (_, Some(o)) => {
            let mut depth = 0usize;
            for (i, c) in css[o..].char_indices() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            return &css[o + i + 1..];
                        }
                    }
                    _ => {}
                }
            }
            ""
        }
        (None, None) => "",
    }
}

/// Split on `sep` outside parentheses and quotes.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth -= 1,
            (None, c) if c == sep && depth <= 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}
