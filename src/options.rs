//! Per-request conversion options.
//!
//! Options travel as a loose `key → JSON value` map so callers (and the CLI's
//! `--option KEY=VALUE`) can pass them without a schema. They are checked
//! and turned into typed settings during validation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConvertError, StageError};
use crate::pipeline::{PageOrientation, PageSize, PipelineConfig};

pub const KEY_TITLE: &str = "title";
pub const KEY_PAGE_SIZE: &str = "page_size";
pub const KEY_ORIENTATION: &str = "orientation";
pub const KEY_MARGIN: &str = "margin";
pub const KEY_ENCODING: &str = "encoding";
pub const KEY_DEBUG_HTML: &str = "debug_html";

const KNOWN_KEYS: &[&str] = &[
    KEY_TITLE,
    KEY_PAGE_SIZE,
    KEY_ORIENTATION,
    KEY_MARGIN,
    KEY_ENCODING,
    KEY_DEBUG_HTML,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionOptions(BTreeMap<String, Value>);

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Check every recognized key and build the typed settings.
    pub fn parse(&self) -> Result<ParsedOptions, ConvertError> {
        for key in self.0.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
            log::debug!("ignoring unknown conversion option '{key}'");
        }

        let mut page = PipelineConfig::default();
        if let Some(size) = self.string(KEY_PAGE_SIZE)? {
            let size: PageSize = size.parse().map_err(ConvertError::Configuration)?;
            page = page.with_page_size(size);
        }
        if let Some(orientation) = self.string(KEY_ORIENTATION)? {
            page.orientation = orientation
                .parse::<PageOrientation>()
                .map_err(ConvertError::Configuration)?;
        }
        if let Some(value) = self.get(KEY_MARGIN) {
            let margin = value
                .as_f64()
                .filter(|m| *m > 0.0)
                .ok_or_else(|| invalid(KEY_MARGIN, "a positive number", value))?;
            page.page_margin = margin as f32;
        }
        page.validate().map_err(ConvertError::Configuration)?;

        let debug_html = match self.get(KEY_DEBUG_HTML) {
            None => false,
            Some(value) => value
                .as_bool()
                .ok_or_else(|| invalid(KEY_DEBUG_HTML, "a boolean", value))?,
        };

        Ok(ParsedOptions {
            title: self.string(KEY_TITLE)?.map(str::to_string),
            page,
            encoding: self.string(KEY_ENCODING)?.unwrap_or("utf-8").to_string(),
            debug_html,
        })
    }

    fn string(&self, key: &str) -> Result<Option<&str>, ConvertError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(invalid(key, "a string", other)),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ConversionOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn invalid(key: &str, expected: &str, got: &Value) -> ConvertError {
    ConvertError::Configuration(format!("option '{key}' must be {expected}, got {got}"))
}

/// Typed view of [`ConversionOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOptions {
    pub title: Option<String>,
    /// Page geometry; its title is filled in by the converter.
    pub page: PipelineConfig,
    /// Encoding name as given; resolved when the input is read.
    pub encoding: String,
    pub debug_html: bool,
}

/// Text encodings the input can be decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

impl TextEncoding {
    pub fn from_name(name: &str) -> Result<Self, StageError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            _ => Err(StageError::UnsupportedEncoding(name.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Latin1 => "ISO-8859-1",
        }
    }

    pub fn decode(self, bytes: Vec<u8>) -> Result<String, StageError> {
        match self {
            TextEncoding::Utf8 => {
                let mut text = String::from_utf8(bytes).map_err(|e| StageError::Decode {
                    encoding: self.name(),
                    detail: e.utf8_error().to_string(),
                })?;
                if text.starts_with('\u{FEFF}') {
                    text.replace_range(..'\u{FEFF}'.len_utf8(), "");
                }
                Ok(text)
            }
            // Every byte maps to the code point of the same value.
            TextEncoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

/// One conversion job.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub input_path: PathBuf,
    /// Explicit destination; derived from the input when `None`.
    pub output_path: Option<PathBuf>,
    pub options: ConversionOptions,
}

impl ConversionRequest {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: None,
            options: ConversionOptions::default(),
        }
    }

    #[must_use]
    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }
}
