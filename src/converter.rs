//! Conversion orchestrator: Markdown file → styled HTML → PDF file.
//!
//! A conversion walks the stages of [`Stage`] in order and stops at the first
//! failure. Batch mode runs one conversion per discovered file and records
//! every outcome instead of stopping.

use std::fs;
use std::path::{Component, Path, PathBuf};

use rayon::prelude::*;

use crate::batch::BatchResult;
use crate::dom::{document_title, parse_html};
use crate::error::{ConvertError, Result, Stage, StageError};
use crate::markdown::{GfmRenderer, MarkdownRenderer, DEFAULT_TITLE};
use crate::options::{ConversionOptions, ConversionRequest, TextEncoding};
use crate::paths::{debug_html_path, is_markdown_path, resolve_output_path};
use crate::pdf::{ForgeRenderer, PdfRenderer, RenderContext};
use crate::stylesheet::{ConverterConfig, CssFileError, StyleSet};
use crate::styler::apply_style;

/// Pattern used by batch mode when the caller gives none.
pub const DEFAULT_PATTERN: &str = "*.md";

/// Path reported for errors from [`Converter::render_document`].
const MEMORY_INPUT: &str = "<memory>";

/// Styled HTML ready for the PDF engine.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub html: String,
    pub applied_styles: StyleSet,
}

pub struct Converter {
    config: ConverterConfig,
    /// Baseline plus inline CSS, fixed at construction.
    base_styles: StyleSet,
    markdown: Box<dyn MarkdownRenderer>,
    pdf: Box<dyn PdfRenderer>,
}

impl Default for Converter {
    fn default() -> Self {
        let config = ConverterConfig::default();
        Self {
            base_styles: StyleSet::from_config(&config),
            config,
            markdown: Box::new(GfmRenderer::default()),
            pdf: Box::new(ForgeRenderer),
        }
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Build a converter with the built-in engines.
    ///
    /// In strict mode a configured CSS file must already exist.
    pub fn new(config: ConverterConfig) -> Result<Self> {
        if config.strict_css {
            if let Some(path) = config.css_path.as_ref().filter(|p| !p.exists()) {
                return Err(ConvertError::Configuration(format!(
                    "stylesheet not found: '{}'",
                    path.display()
                )));
            }
        }
        Ok(Self {
            base_styles: StyleSet::from_config(&config),
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    #[must_use]
    pub fn with_markdown_renderer(mut self, renderer: impl MarkdownRenderer + 'static) -> Self {
        self.markdown = Box::new(renderer);
        self
    }

    #[must_use]
    pub fn with_pdf_renderer(mut self, renderer: impl PdfRenderer + 'static) -> Self {
        self.pdf = Box::new(renderer);
        self
    }

    /// The stylesheet the next conversion would use. Reads the CSS file.
    pub fn stylesheet(&self) -> Result<String> {
        Ok(self.base_styles.with_file_fragment(&self.config)?.to_css())
    }

    /// Convert `input`, writing to `output` or next to the input.
    pub fn convert(&self, input: impl AsRef<Path>, output: Option<&Path>) -> Result<PathBuf> {
        let mut request = ConversionRequest::new(input.as_ref());
        request.output_path = output.map(Path::to_path_buf);
        self.convert_request(&request)
    }

    pub fn convert_request(&self, request: &ConversionRequest) -> Result<PathBuf> {
        let input = request.input_path.as_path();

        enter(input, Stage::Validating);
        if !input.exists() {
            return Err(ConvertError::NotFound {
                what: "input file",
                path: input.to_path_buf(),
            });
        }
        if !input.is_file() || !is_markdown_path(input) {
            return Err(ConvertError::InvalidFormat {
                path: input.to_path_buf(),
            });
        }
        let options = request.options.parse()?;
        let output = request
            .output_path
            .clone()
            .unwrap_or_else(|| resolve_output_path(input, None));

        enter(input, Stage::Reading);
        let markdown = TextEncoding::from_name(&options.encoding)
            .and_then(|encoding| encoding.decode(fs::read(input)?))
            .map_err(|e| failed(input, Stage::Reading, e))?;

        let document = self.render_stages(&markdown, input)?;

        enter(input, Stage::PdfGenerating);
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| failed(input, Stage::PdfGenerating, e))?;
        }

        let mut page = options.page;
        page.title = options
            .title
            .or_else(|| document_title(&parse_html(&document.html)).filter(|t| t != DEFAULT_TITLE))
            .or_else(|| input.file_stem().map(|s| s.to_string_lossy().into_owned()));
        let ctx = RenderContext {
            page,
            base_dir: input
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(Path::to_path_buf),
        };
        self.pdf
            .render(&document.html, &ctx, &output)
            .map_err(|e| failed(input, Stage::PdfGenerating, e))?;
        // Only alongside a PDF that was actually written.
        if options.debug_html {
            let html_path = debug_html_path(&output);
            fs::write(&html_path, &document.html)
                .map_err(|e| failed(input, Stage::PdfGenerating, e))?;
            log::debug!("wrote styled HTML to {}", html_path.display());
        }

        enter(input, Stage::Done);
        log::info!("converted {} -> {}", input.display(), output.display());
        Ok(output)
    }

    /// Run the Rendering and Styling stages on in-memory Markdown.
    pub fn render_document(&self, markdown: &str) -> Result<RenderedDocument> {
        self.render_stages(markdown, Path::new(MEMORY_INPUT))
    }

    fn render_stages(&self, markdown: &str, input: &Path) -> Result<RenderedDocument> {
        enter(input, Stage::Rendering);
        let html = self
            .markdown
            .render(markdown)
            .map_err(|e| failed(input, Stage::Rendering, e))?;

        enter(input, Stage::Styling);
        let applied_styles = self
            .base_styles
            .with_file_fragment(&self.config)
            .map_err(|e| match e {
                CssFileError::Unreadable(source) => failed(input, Stage::Styling, source),
                missing => missing.into(),
            })?;
        let html = apply_style(&html, &applied_styles.to_css())
            .map_err(|e| failed(input, Stage::Styling, e))?;

        Ok(RenderedDocument {
            html,
            applied_styles,
        })
    }

    /// Convert every file in `input_dir` matching `pattern`.
    ///
    /// Per-file failures are recorded in the result; only a missing
    /// directory or a bad pattern fails the whole batch.
    pub fn batch_convert(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: Option<&Path>,
        pattern: &str,
    ) -> Result<BatchResult> {
        self.batch_convert_with(input_dir, output_dir, pattern, &ConversionOptions::default())
    }

    /// [`batch_convert`](Self::batch_convert) applying `options` to every file.
    pub fn batch_convert_with(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: Option<&Path>,
        pattern: &str,
        options: &ConversionOptions,
    ) -> Result<BatchResult> {
        let files = discover(input_dir.as_ref(), pattern)?;
        Ok(files
            .into_iter()
            .map(|file| {
                let outcome = self.batch_item(&file, output_dir, options);
                (file, outcome)
            })
            .collect())
    }

    /// [`batch_convert_with`](Self::batch_convert_with) on a rayon pool of
    /// `jobs` threads (rayon's default when `None`).
    pub fn batch_convert_parallel(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: Option<&Path>,
        pattern: &str,
        options: &ConversionOptions,
        jobs: Option<usize>,
    ) -> Result<BatchResult> {
        let files = discover(input_dir.as_ref(), pattern)?;
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = jobs {
            builder = builder.num_threads(jobs);
        }
        let pool = builder
            .build()
            .map_err(|e| ConvertError::Configuration(format!("failed to create thread pool: {e}")))?;

        let outcomes: Vec<_> = pool.install(|| {
            files
                .into_par_iter()
                .map(|file| {
                    let outcome = self.batch_item(&file, output_dir, options);
                    (file, outcome)
                })
                .collect()
        });
        Ok(outcomes.into_iter().collect())
    }

    fn batch_item(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
        options: &ConversionOptions,
    ) -> Result<PathBuf> {
        let request = ConversionRequest::new(input)
            .with_output(resolve_output_path(input, output_dir))
            .with_options(options.clone());
        let outcome = self.convert_request(&request);
        if let Err(e) = &outcome {
            log::warn!("{e}");
        }
        outcome
    }
}

fn enter(input: &Path, stage: Stage) {
    log::debug!("{}: {stage}", input.display());
}

fn failed(input: &Path, stage: Stage, source: impl Into<StageError>) -> ConvertError {
    ConvertError::Conversion {
        path: input.to_path_buf(),
        stage,
        source: source.into(),
    }
}

/// Regular files under `dir` matching `pattern`, sorted.
fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConvertError::NotFound {
            what: "input directory",
            path: dir.to_path_buf(),
        });
    }
    // No root, prefix or `..`: matches must stay under `dir`.
    let escapes = Path::new(pattern)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ConvertError::Configuration(format!(
            "glob pattern must stay inside the input directory: '{pattern}'"
        )));
    }
    let dir_str = dir.to_str().ok_or_else(|| {
        ConvertError::Configuration(format!(
            "input directory is not valid UTF-8: '{}'",
            dir.display()
        ))
    })?;
    let full = Path::new(&glob::Pattern::escape(dir_str)).join(pattern);
    let entries = glob::glob(&full.to_string_lossy())
        .map_err(|e| ConvertError::Configuration(format!("invalid glob pattern '{pattern}': {e}")))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("cannot read {}: {}", e.path().display(), e.error());
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    log::info!(
        "found {} file(s) matching '{pattern}' in {}",
        files.len(),
        dir.display()
    );
    Ok(files)
}
