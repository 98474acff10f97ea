//! Integration tests for the mdforge pipeline.
//!
//! These tests validate:
//! - Markdown files convert to valid PDF files
//! - Input validation and error reporting per stage
//! - Batch conversion, sequential and parallel
//! - Stylesheet ordering and re-reading
//! - Pagination of long documents, code blocks and tables

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;

use mdforge::markdown::MarkdownError;
use mdforge::pipeline::compute_layout_config;
use mdforge::styler::StyleError;
use mdforge::stylesheet::BASELINE_CSS;
use mdforge::{
    ConversionOptions, ConversionRequest, ConvertError, Converter, ConverterConfig,
    MarkdownRenderer, PdfError, PdfRenderer, PipelineConfig, RenderContext, Stage, StageError,
    DEFAULT_PATTERN,
};

// =====================================================================
// Helpers
// =====================================================================

fn assert_valid_pdf(path: &Path) {
    let bytes = fs::read(path).unwrap();
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Lay out Markdown the way a conversion would, without writing a PDF.
fn layout_markdown(markdown: &str) -> mdforge::layout_config::LayoutConfig {
    let doc = Converter::default().render_document(markdown).unwrap();
    compute_layout_config(&doc.html, &PipelineConfig::default()).unwrap()
}

fn all_lines(layout: &mdforge::layout_config::LayoutConfig) -> Vec<String> {
    (0..layout.pages.len())
        .flat_map(|page| layout.page_text(page))
        .collect()
}

/// A PDF engine that returns something that is not a PDF.
struct HtmlEcho;

impl PdfRenderer for HtmlEcho {
    fn render_bytes(&self, html: &str, _ctx: &RenderContext) -> Result<Vec<u8>, PdfError> {
        Ok(html.as_bytes().to_vec())
    }
}

/// A Markdown engine that always fails.
struct BrokenMarkdown;

impl MarkdownRenderer for BrokenMarkdown {
    fn render(&self, _markdown: &str) -> Result<String, MarkdownError> {
        Err(MarkdownError("engine unavailable".into()))
    }
}

/// A Markdown engine whose HTML has no `<head>` to style.
struct HeadlessMarkdown;

impl MarkdownRenderer for HeadlessMarkdown {
    fn render(&self, markdown: &str) -> Result<String, MarkdownError> {
        Ok(format!("<p>{markdown}</p>"))
    }
}

// =====================================================================
// Single conversions
// =====================================================================

#[test]
fn heading_converts_to_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "hello.md", "# Hello\n\nSome *text*.\n");
    let output = Converter::default().convert(&input, None).unwrap();
    assert_eq!(output, dir.path().join("hello.pdf"));
    assert_valid_pdf(&output);
}

#[test]
fn heading_renders_to_html_and_pdf_bytes() {
    let doc = Converter::default().render_document("# Hello\n\nWorld").unwrap();
    assert!(doc.html.contains("<h1>Hello</h1>"));

    let (bytes, layout) =
        mdforge::generate_pdf(&doc.html, &PipelineConfig::default(), None).unwrap();
    assert_eq!(&bytes[0..5], b"%PDF-");
    assert_eq!(layout.title, "Hello");
    assert_eq!(layout.page_text(0), vec!["Hello", "World"]);
}

#[test]
fn explicit_output_in_new_directory() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "doc.markdown", "text");
    let target = dir.path().join("out").join("nested").join("doc.pdf");
    let output = Converter::default().convert(&input, Some(&target)).unwrap();
    assert_eq!(output, target);
    assert_valid_pdf(&target);
}

#[test]
fn gfm_document_converts() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(
        dir.path(),
        "gfm.md",
        "# Features\n\n\
         | a | b |\n|---|---|\n| 1 | 2 |\n\n\
         - [x] done\n- [ ] todo\n\n\
         ~~gone~~ and `code`\n\n\
         ```\nfn main() {}\n```\n\n\
         > quoted\n\n---\n",
    );
    let output = Converter::default().convert(&input, None).unwrap();
    assert_valid_pdf(&output);
}

#[test]
fn missing_input_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = Converter::default()
        .convert(dir.path().join("nope.md"), None)
        .unwrap_err();
    assert!(matches!(err, ConvertError::NotFound { .. }), "{err}");
}

#[test]
fn text_file_is_invalid_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "notes.txt", "# Not markdown");
    let err = Converter::default().convert(&input, None).unwrap_err();
    assert!(matches!(err, ConvertError::InvalidFormat { .. }), "{err}");
    assert!(!dir.path().join("notes.pdf").exists());
}

#[test]
fn invalid_utf8_fails_while_reading() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.md");
    fs::write(&input, [b'#', b' ', 0xff, 0xfe, b'\n']).unwrap();
    let err = Converter::default().convert(&input, None).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Reading));
    assert!(matches!(
        err,
        ConvertError::Conversion {
            source: StageError::Decode { .. },
            ..
        }
    ));
}

#[test]
fn non_pdf_engine_output_fails_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "doc.md", "# Title");
    let converter = Converter::default().with_pdf_renderer(HtmlEcho);
    let err = converter.convert(&input, None).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::PdfGenerating));
    assert!(matches!(
        err,
        ConvertError::Conversion {
            source: StageError::Pdf(PdfError::InvalidOutput),
            ..
        }
    ));
    assert!(!dir.path().join("doc.pdf").exists());
}

#[test]
fn invalid_option_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "doc.md", "x");
    let request = ConversionRequest::new(&input)
        .with_options(ConversionOptions::new().with("page_size", "tabloid"));
    assert!(matches!(
        Converter::default().convert_request(&request),
        Err(ConvertError::Configuration(_))
    ));
}

#[test]
fn options_reach_the_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "doc.md", "# Wide");
    let request = ConversionRequest::new(&input).with_options(
        ConversionOptions::new()
            .with("page_size", "letter")
            .with("orientation", "landscape")
            .with("debug_html", true),
    );
    let output = Converter::default().convert_request(&request).unwrap();
    assert_valid_pdf(&output);
    let html = fs::read_to_string(dir.path().join("doc.html")).unwrap();
    assert!(html.contains("<h1>Wide</h1>"));
}

// =====================================================================
// Styling
// =====================================================================

#[test]
fn custom_css_follows_baseline() {
    let converter =
        Converter::new(ConverterConfig::default().with_custom_css("body{color:red}")).unwrap();
    let css = converter.stylesheet().unwrap();
    assert!(css.starts_with(BASELINE_CSS));
    assert!(css.find("color:red").unwrap() >= BASELINE_CSS.len());

    let doc = converter.render_document("# Red").unwrap();
    assert!(doc.html.contains(&css));
}

#[test]
fn styled_html_has_exactly_one_style_block() {
    let converter =
        Converter::new(ConverterConfig::default().with_custom_css("p { margin: 0; }")).unwrap();
    let doc = converter.render_document("para\n\n<b>raw</b>\n").unwrap();
    assert_eq!(doc.html.matches("<style>").count(), 1);
    assert_eq!(doc.applied_styles.fragments().len(), 2);
}

#[test]
fn css_file_is_reread_per_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let css = write(dir.path(), "theme.css", "h1 { color: blue; }");
    let converter = Converter::new(ConverterConfig::default().with_css_path(&css)).unwrap();

    assert!(converter.stylesheet().unwrap().contains("color: blue"));
    fs::write(&css, "h1 { color: green; }").unwrap();
    let doc = converter.render_document("# x").unwrap();
    assert!(doc.html.contains("color: green"));
    assert!(!doc.html.contains("color: blue"));
}

#[test]
fn strict_css_requires_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConverterConfig::default()
        .with_css_path(dir.path().join("missing.css"))
        .strict(true);
    assert!(matches!(
        Converter::new(config),
        Err(ConvertError::Configuration(_))
    ));
}

#[test]
fn lenient_css_skips_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConverterConfig::default().with_css_path(dir.path().join("missing.css"));
    let converter = Converter::new(config).unwrap();
    assert_eq!(converter.stylesheet().unwrap(), BASELINE_CSS);
}

#[test]
fn unreadable_css_fails_while_styling() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "doc.md", "# Doc");
    let css_dir = dir.path().join("theme.css");
    fs::create_dir(&css_dir).unwrap();

    for strict in [false, true] {
        let config = ConverterConfig::default()
            .with_css_path(&css_dir)
            .strict(strict);
        let err = Converter::new(config).unwrap().convert(&input, None).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Styling));
        assert!(matches!(
            &err,
            ConvertError::Conversion { path, source: StageError::Io(_), .. } if path == &input
        ));
    }
    assert!(!dir.path().join("doc.pdf").exists());
}

#[test]
fn extreme_nth_child_in_custom_css_converts() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "t.md", "| a |\n|---|\n| 1 |\n| 2 |\n");
    let config = ConverterConfig::default()
        .with_custom_css("tr:nth-child(-n-2147483648) { color: red } tr:nth-child(2n) { color: blue }");
    let output = Converter::new(config).unwrap().convert(&input, None).unwrap();
    assert_valid_pdf(&output);
}

// =====================================================================
// Pluggable Markdown engines
// =====================================================================

#[test]
fn failing_markdown_engine_fails_while_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "doc.md", "# Doc");
    let err = Converter::default()
        .with_markdown_renderer(BrokenMarkdown)
        .convert(&input, None)
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Rendering));
    assert!(matches!(
        &err,
        ConvertError::Conversion { source: StageError::Markdown(MarkdownError(msg)), .. }
            if msg == "engine unavailable"
    ));
    assert!(!dir.path().join("doc.pdf").exists());
}

#[test]
fn html_without_head_fails_while_styling() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "doc.md", "plain");
    let err = Converter::default()
        .with_markdown_renderer(HeadlessMarkdown)
        .convert(&input, None)
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Styling));
    assert!(matches!(
        err,
        ConvertError::Conversion {
            source: StageError::Style(StyleError::MissingHead),
            ..
        }
    ));
    assert!(!dir.path().join("doc.pdf").exists());
}

// =====================================================================
// Batch
// =====================================================================

#[test]
fn batch_converts_only_matching_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.md", "# A");
    write(dir.path(), "b.md", "# B");
    write(dir.path(), "c.txt", "not markdown");
    let out = dir.path().join("pdfs");

    let result = Converter::default()
        .batch_convert(dir.path(), Some(&out), DEFAULT_PATTERN)
        .unwrap();
    assert_eq!(result.len(), 2);
    assert!(result.is_success());
    assert_valid_pdf(&out.join("a.pdf"));
    assert_valid_pdf(&out.join("b.pdf"));
    assert!(!out.join("c.pdf").exists());
}

#[test]
fn batch_records_failures_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.md", "# Good");
    fs::write(dir.path().join("broken.md"), [0xc3, 0x28]).unwrap();

    let result = Converter::default()
        .batch_convert(dir.path(), None, DEFAULT_PATTERN)
        .unwrap();
    assert_eq!(result.success_count(), 1);
    assert_eq!(result.error_count(), 1);

    let (failed, err) = result.failures().next().unwrap();
    assert_eq!(failed, dir.path().join("broken.md"));
    assert_eq!(err.stage(), Some(Stage::Reading));
    assert!(dir.path().join("good.pdf").exists());
}

#[test]
fn batch_with_pattern_over_subdirectories() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    write(dir.path(), "top.md", "top");
    write(&dir.path().join("sub"), "inner.md", "inner");

    let result = Converter::default()
        .batch_convert(dir.path(), Some(&dir.path().join("out")), "**/*.md")
        .unwrap();
    let inputs: Vec<_> = result.iter().map(|(p, _)| p.clone()).collect();
    assert_eq!(
        inputs,
        vec![dir.path().join("sub").join("inner.md"), dir.path().join("top.md")]
    );
}

#[test]
fn batch_on_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Converter::default().batch_convert(dir.path().join("none"), None, DEFAULT_PATTERN),
        Err(ConvertError::NotFound { .. })
    ));
}

#[test]
fn parallel_batch_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..6 {
        write(dir.path(), &format!("doc{i}.md"), &format!("# Doc {i}\n\nbody"));
    }
    let out = dir.path().join("out");
    let options = ConversionOptions::new().with("page_size", "legal");

    let result = Converter::default()
        .batch_convert_parallel(dir.path(), Some(&out), DEFAULT_PATTERN, &options, Some(2))
        .unwrap();
    assert_eq!(result.len(), 6);
    assert!(result.is_success());
    for (_, output) in result.successes() {
        assert_valid_pdf(output);
    }
}

// =====================================================================
// Pagination
// =====================================================================

#[test]
fn long_document_spans_pages_without_losing_text() {
    let markdown: String = (0..150).map(|i| format!("Paragraph {i}\n\n")).collect();
    let layout = layout_markdown(&markdown);
    assert!(layout.pages.len() > 1, "expected several pages");

    let expected: Vec<String> = (0..150).map(|i| format!("Paragraph {i}")).collect();
    assert_eq!(all_lines(&layout), expected);
}

#[test]
fn long_code_block_is_split_across_pages() {
    let code: String = (0..120).map(|i| format!("line {i}\n")).collect();
    let layout = layout_markdown(&format!("```\n{code}```\n"));
    assert!(layout.pages.len() > 1);

    let lines: Vec<String> = all_lines(&layout)
        .into_iter()
        .filter(|l| l.starts_with("line "))
        .collect();
    assert_eq!(lines.len(), 120);
    assert_eq!(lines.first().map(String::as_str), Some("line 0"));
    assert_eq!(lines.last().map(String::as_str), Some("line 119"));

    // The code background is painted on every page the block touches.
    for page in &layout.pages {
        assert!(page.boxes.iter().any(|b| b.background_color.is_some()));
    }
}

#[test]
fn table_rows_are_never_split() {
    let mut markdown = String::from("| key | value |\n|---|---|\n");
    for i in 0..90 {
        markdown.push_str(&format!("| k{i} | v{i} |\n"));
    }
    let layout = layout_markdown(&markdown);
    assert!(layout.pages.len() > 1);

    let lines = all_lines(&layout);
    for i in 0..90 {
        assert_eq!(lines.iter().filter(|l| **l == format!("k{i}")).count(), 1);
        assert_eq!(lines.iter().filter(|l| **l == format!("v{i}")).count(), 1);
    }
    // Each page keeps the key and value of a row together.
    for page in 0..layout.pages.len() {
        let text = layout.page_text(page);
        for i in 0..90 {
            let has_key = text.contains(&format!("k{i}"));
            let has_value = text.contains(&format!("v{i}"));
            assert_eq!(has_key, has_value, "row {i} split on page {page}");
        }
    }
}

#[test]
fn huge_ordered_list_start_converts() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(
        dir.path(),
        "list.md",
        "<ol start=\"9223372036854775807\"><li>a</li><li>b</li></ol>\n",
    );
    let output = Converter::default().convert(&input, None).unwrap();
    assert_valid_pdf(&output);
}

#[test]
fn boxes_stay_inside_the_page() {
    let markdown: String = (0..60)
        .map(|i| format!("## Section {i}\n\nSome body text for section {i}.\n\n"))
        .collect();
    let layout = layout_markdown(&markdown);
    for page in &layout.pages {
        for b in &page.boxes {
            assert!(b.y >= 0.0);
            assert!(b.y + b.height <= layout.page_height_pt + 0.5, "{b:?}");
        }
    }
}
