//! mdforge – command-line Markdown → PDF converter.
//!
//! Usage:
//!   mdforge <input.md> [output.pdf] [--css style.css] [--title "My Report"]
//!   mdforge <dir> --batch [--output-dir out] [--pattern "**/*.md"] [--parallel]
//!
//! If `output.pdf` is omitted the PDF is written next to the input file with
//! the same (sanitised) stem.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;

use mdforge::{
    ConversionOptions, ConversionRequest, ConvertError, Converter, ConverterConfig, PageSize,
    DEFAULT_PATTERN,
};

#[derive(Debug, Parser)]
#[command(name = "mdforge", version, about = "Convert GitHub-flavored Markdown to PDF")]
struct Cli {
    /// Markdown file to convert, or a directory with --batch.
    input: PathBuf,

    /// Output PDF path (single mode only).
    output: Option<PathBuf>,

    /// Convert every file in INPUT matching --pattern.
    #[arg(long)]
    batch: bool,

    /// Directory the PDFs are written to.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// CSS file appended after the built-in styles; re-read for every file.
    #[arg(long, value_name = "FILE")]
    css: Option<PathBuf>,

    /// Inline CSS appended after the built-in styles.
    #[arg(long, value_name = "CSS")]
    style: Option<String>,

    /// Fail when the --css file does not exist.
    #[arg(long)]
    strict_css: bool,

    /// Glob selecting files in batch mode, relative to INPUT.
    #[arg(long, value_name = "GLOB", default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// Document title in the PDF metadata.
    #[arg(long)]
    title: Option<String>,

    /// Use landscape page orientation.
    #[arg(long)]
    landscape: bool,

    /// Paper size: a4, letter or legal.
    #[arg(long, value_name = "SIZE")]
    page_size: Option<PageSize>,

    /// Convert batch files in parallel.
    #[arg(long)]
    parallel: bool,

    /// Worker threads for batch mode (implies --parallel).
    #[arg(long, short = 'j', value_name = "N")]
    jobs: Option<usize>,

    /// Extra conversion option; VALUE is parsed as JSON, else taken as text.
    #[arg(long = "option", short = 'o', value_name = "KEY=VALUE", value_parser = parse_option)]
    options: Vec<(String, Value)>,

    /// Also write the styled HTML next to each PDF.
    #[arg(long)]
    debug_html: bool,

    /// Log every conversion stage and list per-file batch results.
    #[arg(long, short)]
    verbose: bool,
}

fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing option name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

impl Cli {
    fn converter_config(&self) -> ConverterConfig {
        ConverterConfig {
            css_path: self.css.clone(),
            custom_css: self.style.clone(),
            strict_css: self.strict_css,
        }
    }

    fn conversion_options(&self) -> ConversionOptions {
        let mut options: ConversionOptions = self.options.iter().cloned().collect();
        if let Some(title) = &self.title {
            options.insert("title", title.as_str());
        }
        if self.landscape {
            options.insert("orientation", "landscape");
        }
        if let Some(size) = self.page_size {
            options.insert("page_size", serde_json::to_value(size).unwrap_or(Value::Null));
        }
        if self.debug_html {
            options.insert("debug_html", true);
        }
        options
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "warn,mdforge=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Conversion error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, ConvertError> {
    let converter = Converter::new(cli.converter_config())?;
    let options = cli.conversion_options();

    if cli.batch {
        if !cli.input.is_dir() {
            eprintln!("Error: '{}' is not a directory", cli.input.display());
            return Ok(ExitCode::FAILURE);
        }
        let output_dir = cli.output_dir.as_deref();
        let result = if cli.parallel || cli.jobs.is_some() {
            converter.batch_convert_parallel(&cli.input, output_dir, &cli.pattern, &options, cli.jobs)?
        } else {
            converter.batch_convert_with(&cli.input, output_dir, &cli.pattern, &options)?
        };

        if cli.verbose {
            for (input, outcome) in &result {
                match outcome {
                    Ok(output) => println!("  ok    {} -> {}", input.display(), output.display()),
                    Err(e) => println!("  error {}: {e}", input.display()),
                }
            }
        }
        println!(
            "Batch conversion completed: {} successful, {} errors",
            result.success_count(),
            result.error_count()
        );
        return Ok(if result.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    if cli.input.is_dir() {
        eprintln!(
            "Error: '{}' is a directory; use --batch to convert its files",
            cli.input.display()
        );
        return Ok(ExitCode::FAILURE);
    }

    let output = cli.output.clone().or_else(|| {
        cli.output_dir
            .as_deref()
            .map(|dir| mdforge::paths::resolve_output_path(&cli.input, Some(dir)))
    });
    let mut request = ConversionRequest::new(&cli.input).with_options(options);
    request.output_path = output;

    let written = converter.convert_request(&request)?;
    println!("{}", written.display());
    Ok(ExitCode::SUCCESS)
}
