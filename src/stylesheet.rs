//! Style provider – the baseline stylesheet and its merge with user CSS.
//!
//! Fragments are kept in a fixed order (baseline, inline, file) so that later
//! fragments win through the normal cascade. Baseline and inline CSS are
//! resolved once per [`crate::Converter`]; the file fragment is re-read for
//! every conversion so edits to it are picked up without rebuilding the
//! converter.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::error::{ConvertError, Result};

/// GitHub-like default styling applied to every document.
pub const BASELINE_CSS: &str = r#"
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
    font-size: 16px;
    line-height: 1.5;
    color: #24292e;
    max-width: 980px;
    margin: 0 auto;
}

h1, h2, h3, h4, h5, h6 {
    margin-top: 24px;
    margin-bottom: 16px;
    font-weight: 600;
    line-height: 1.25;
}

h1 { font-size: 2em; border-bottom: 1px solid #eaecef; padding-bottom: 0.3em; }
h2 { font-size: 1.5em; border-bottom: 1px solid #eaecef; padding-bottom: 0.3em; }
h3 { font-size: 1.25em; }
h4 { font-size: 1em; }
h5 { font-size: 0.875em; }
h6 { font-size: 0.85em; color: #6a737d; }

p, blockquote, ul, ol, table, pre { margin-top: 0; margin-bottom: 16px; }

a { color: #0366d6; text-decoration: none; }

ul, ol { padding-left: 2em; }
li { margin-bottom: 0.25em; }

code {
    font-family: SFMono-Regular, Consolas, 'Liberation Mono', Menlo, monospace;
    background-color: rgba(27, 31, 35, 0.05);
    border-radius: 3px;
    font-size: 85%;
    margin: 0;
    padding: 0.2em 0.4em;
}

pre {
    font-family: SFMono-Regular, Consolas, 'Liberation Mono', Menlo, monospace;
    background-color: #f6f8fa;
    border-radius: 6px;
    font-size: 85%;
    line-height: 1.45;
    overflow: auto;
    padding: 16px;
}

pre code {
    background-color: transparent;
    font-size: 100%;
    padding: 0;
}

blockquote {
    border-left: 0.25em solid #dfe2e5;
    color: #6a737d;
    padding: 0 1em;
    margin-left: 0;
}

table {
    border-collapse: collapse;
    border-spacing: 0;
    width: 100%;
}

table th, table td {
    border: 1px solid #dfe2e5;
    padding: 6px 13px;
}

table th { font-weight: 600; }

table tr:nth-child(2n) {
    background-color: #f6f8fa;
}

hr {
    height: 0.25em;
    padding: 0;
    margin: 24px 0;
    background-color: #e1e4e8;
    border: 0;
}

img { max-width: 100%; }

del { text-decoration: line-through; }
"#;

/// Where a stylesheet fragment came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleOrigin {
    Baseline,
    Inline,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleFragment {
    pub origin: StyleOrigin,
    pub css: String,
}

/// Ordered stylesheet fragments: baseline, then inline, then file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSet {
    fragments: Vec<StyleFragment>,
}

/// User styling for a converter. Immutable once the converter is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConverterConfig {
    /// CSS file appended last; re-read on every conversion.
    pub css_path: Option<PathBuf>,
    /// CSS text appended right after the baseline.
    pub custom_css: Option<String>,
    /// Fail with [`ConvertError::Configuration`] when `css_path` is missing
    /// instead of skipping it.
    pub strict_css: bool,
}

impl ConverterConfig {
    pub fn with_css_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.css_path = Some(path.into());
        self
    }

    pub fn with_custom_css(mut self, css: impl Into<String>) -> Self {
        self.custom_css = Some(css.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_css = strict;
        self
    }
}

/// Why the configured CSS file could not be added.
#[derive(Debug, Error)]
pub enum CssFileError {
    /// Strict mode and the file does not exist.
    #[error("stylesheet not found: '{}'", .0.display())]
    Missing(PathBuf),

    /// The file exists but could not be read as UTF-8 text.
    #[error(transparent)]
    Unreadable(#[from] io::Error),
}

impl From<CssFileError> for ConvertError {
    fn from(e: CssFileError) -> Self {
        ConvertError::Configuration(e.to_string())
    }
}

impl StyleSet {
    /// Baseline followed by the configured inline CSS, if any.
    pub fn from_config(config: &ConverterConfig) -> Self {
        let mut fragments = vec![StyleFragment {
            origin: StyleOrigin::Baseline,
            css: BASELINE_CSS.to_string(),
        }];
        if let Some(css) = &config.custom_css {
            fragments.push(StyleFragment {
                origin: StyleOrigin::Inline,
                css: css.clone(),
            });
        }
        Self { fragments }
    }

    /// A copy of this set with the configured CSS file appended.
    ///
    /// A missing file is skipped unless `strict_css` is set. A path that
    /// exists but cannot be read (a directory, invalid UTF-8) is always an
    /// error.
    pub fn with_file_fragment(&self, config: &ConverterConfig) -> Result<Self, CssFileError> {
        let mut set = self.clone();
        let Some(path) = &config.css_path else {
            return Ok(set);
        };

        if !path.exists() {
            if config.strict_css {
                return Err(CssFileError::Missing(path.clone()));
            }
            log::debug!("stylesheet '{}' not found, skipping", path.display());
            return Ok(set);
        }

        let css = fs::read_to_string(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("cannot read stylesheet '{}': {e}", path.display()),
            )
        })?;
        set.fragments.push(StyleFragment {
            origin: StyleOrigin::File(path.clone()),
            css,
        });
        Ok(set)
    }

    pub fn fragments(&self) -> &[StyleFragment] {
        &self.fragments
    }

    /// The combined stylesheet text, fragments separated by newlines.
    pub fn to_css(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.css.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Build the full stylesheet for `config`, reading the CSS file now.
pub fn build_stylesheet(config: &ConverterConfig) -> Result<String> {
    Ok(StyleSet::from_config(config)
        .with_file_fragment(config)?
        .to_css())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn baseline_only_by_default() {
        let css = build_stylesheet(&ConverterConfig::default()).unwrap();
        assert_eq!(css, BASELINE_CSS);
    }

    #[test]
    fn inline_css_follows_baseline() {
        let config = ConverterConfig::default().with_custom_css("body{color:red}");
        let css = build_stylesheet(&config).unwrap();
        let baseline_at = css.find("font-family").unwrap();
        let custom_at = css.find("color:red").unwrap();
        assert!(custom_at > baseline_at);
        assert!(css.starts_with(BASELINE_CSS));
    }

    #[test]
    fn file_fragment_comes_last() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "h1 {{ color: green; }}").unwrap();
        let config = ConverterConfig::default()
            .with_custom_css("p { color: blue; }")
            .with_css_path(file.path());

        let set = StyleSet::from_config(&config)
            .with_file_fragment(&config)
            .unwrap();
        let origins: Vec<_> = set.fragments().iter().map(|f| f.origin.clone()).collect();
        assert_eq!(
            origins,
            vec![
                StyleOrigin::Baseline,
                StyleOrigin::Inline,
                StyleOrigin::File(file.path().to_path_buf()),
            ]
        );
        assert!(set.to_css().ends_with("h1 { color: green; }"));
    }

    #[test]
    fn missing_file_is_skipped() {
        let config = ConverterConfig::default().with_css_path("/definitely/not/here.css");
        let css = build_stylesheet(&config).unwrap();
        assert_eq!(css, BASELINE_CSS);
    }

    #[test]
    fn missing_file_fails_in_strict_mode() {
        let config = ConverterConfig::default()
            .with_css_path("/definitely/not/here.css")
            .strict(true);
        let err = build_stylesheet(&config).unwrap_err();
        assert!(matches!(err, ConvertError::Configuration(_)));
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConverterConfig::default()
            .with_css_path(dir.path())
            .strict(true);
        let err = StyleSet::from_config(&config)
            .with_file_fragment(&config)
            .unwrap_err();
        assert!(matches!(err, CssFileError::Unreadable(_)), "{err:?}");
        assert!(err.to_string().contains("cannot read stylesheet"));

        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), [0xFF, 0xFE, b'p']).unwrap();
        let config = ConverterConfig::default().with_css_path(file.path());
        let err = StyleSet::from_config(&config)
            .with_file_fragment(&config)
            .unwrap_err();
        assert!(matches!(err, CssFileError::Unreadable(_)), "{err:?}");
    }

    #[test]
    fn build_is_idempotent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "code {{ color: purple; }}").unwrap();
        let config = ConverterConfig::default()
            .with_custom_css("em { color: teal; }")
            .with_css_path(file.path());
        assert_eq!(
            build_stylesheet(&config).unwrap(),
            build_stylesheet(&config).unwrap()
        );
    }
}
