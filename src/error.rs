//! Error taxonomy for the conversion pipeline.
//!
//! [`ConvertError`] is what callers see. Its variants separate "the input is
//! wrong" (missing file, wrong extension, bad configuration) from "a
//! pipeline stage failed", and the latter keeps both the [`Stage`] and the
//! underlying [`StageError`] reachable through `source()`.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::markdown::MarkdownError;
use crate::pdf::PdfError;
use crate::styler::StyleError;

/// A step of a single conversion, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validating,
    Reading,
    Rendering,
    Styling,
    PdfGenerating,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating input",
            Stage::Reading => "reading input",
            Stage::Rendering => "rendering markdown",
            Stage::Styling => "applying styles",
            Stage::PdfGenerating => "generating PDF",
            Stage::Done => "finishing",
        };
        f.write_str(name)
    }
}

/// All errors returned by the public conversion API.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// An input file or directory does not exist.
    #[error("{what} not found: '{}'", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// The input exists but is not a Markdown file.
    #[error("not a Markdown file (expected .md or .markdown): '{}'", path.display())]
    InvalidFormat { path: PathBuf },

    /// A pipeline stage failed; `source` is the original cause.
    #[error("failed to convert '{}' while {stage}: {source}", path.display())]
    Conversion {
        path: PathBuf,
        stage: Stage,
        #[source]
        source: StageError,
    },

    /// Converter configuration or request options are invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ConvertError {
    /// The stage a [`ConvertError::Conversion`] failed in.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ConvertError::Conversion { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// The cause of a failed pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("input is not valid {encoding}: {detail}")]
    Decode {
        encoding: &'static str,
        detail: String,
    },

    #[error("unsupported text encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error(transparent)]
    Markdown(#[from] MarkdownError),

    #[error(transparent)]
    Style(#[from] StyleError),

    #[error(transparent)]
    Pdf(#[from] PdfError),
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;
