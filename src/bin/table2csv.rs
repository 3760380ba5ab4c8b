use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use pdf_table_ocr::{
    ClusterConfig, ExtractError, ExtractOptions, ExtractionReport, Extractor, HeaderMode,
    LowConfidenceAction, PageSelection, list_input_files,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "table2csv",
    version,
    about = "Extract tables from PDFs and scanned images into CSV"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract page tables into per-page and combined CSV files.
    Extract(ExtractArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Input PDF or image. Prompts for a file from --input-dir when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory listed by the interactive prompt.
    #[arg(long, default_value = "input_files")]
    input_dir: PathBuf,

    /// Output directory for CSV files, page images and the summary.
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Page selection like all or 1-3,5.
    #[arg(long, default_value = "all")]
    pages: String,

    /// Render and OCR resolution.
    #[arg(long, default_value_t = 200)]
    dpi: u32,

    /// Vertical tolerance for grouping tokens into rows, in points.
    #[arg(long, default_value_t = ClusterConfig::default().y_tol)]
    y_tol: f32,

    /// Horizontal tolerance for clustering tokens into columns, in points.
    #[arg(long, default_value_t = ClusterConfig::default().x_eps)]
    x_eps: f32,

    /// Minimum OCR confidence (0-100). Unset keeps every token.
    #[arg(long)]
    min_confidence: Option<f32>,

    /// What to do with OCR tokens under --min-confidence: drop or flag.
    #[arg(long, default_value = "drop")]
    low_confidence: String,

    /// OCR language passed to tesseract.
    #[arg(long, default_value = "eng")]
    ocr_lang: String,

    /// Path to the tesseract binary.
    #[arg(long)]
    tesseract_path: Option<PathBuf>,

    /// Path to the pdftoppm binary.
    #[arg(long)]
    pdftoppm_path: Option<PathBuf>,

    /// Ignore the PDF text layer and OCR every page.
    #[arg(long)]
    force_ocr: bool,

    /// Also save images embedded in PDF pages.
    #[arg(long)]
    embedded_images: bool,

    /// Header handling: none, first-row or auto.
    #[arg(long, default_value = "none")]
    header: String,

    /// Output delimiter character.
    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Enable verbose warning output.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_options(args: &ExtractArgs) -> Result<ExtractOptions> {
    let pages = PageSelection::from_str(&args.pages)
        .map_err(ExtractError::InvalidPageSelection)
        .context("failed to parse --pages")?;
    let header_mode = HeaderMode::from_str(&args.header)
        .map_err(|error| anyhow!(error))
        .context("failed to parse --header")?;
    let low_confidence = LowConfidenceAction::from_str(&args.low_confidence)
        .map_err(|error| anyhow!(error))
        .context("failed to parse --low-confidence")?;

    if !args.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }

    let options = ExtractOptions {
        pages,
        output_dir: args.output.clone(),
        dpi: args.dpi,
        cluster: ClusterConfig {
            y_tol: args.y_tol,
            x_eps: args.x_eps,
        },
        min_confidence: args.min_confidence,
        low_confidence,
        tesseract_path: args.tesseract_path.clone(),
        pdftoppm_path: args.pdftoppm_path.clone(),
        ocr_lang: args.ocr_lang.clone(),
        force_ocr: args.force_ocr,
        embedded_images: args.embedded_images,
        header_mode,
        delimiter: args.delimiter as u8,
    };
    options.validate()?;
    Ok(options)
}

/// Lists the supported files in `dir` and reads a choice from stdin.
/// `None` means the user aborted.
fn prompt_for_input(dir: &Path) -> Result<Option<PathBuf>> {
    let files = list_input_files(dir)
        .with_context(|| format!("failed to list '{}'", dir.display()))?;
    if files.is_empty() {
        bail!("no PDF or image files found in '{}'", dir.display());
    }

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Files in {}:", dir.display())?;
    for (index, file) in files.iter().enumerate() {
        let name = file.file_name().map_or_else(
            || file.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        writeln!(stdout, "  {}. {name}", index + 1)?;
    }

    let mut stdin = std::io::stdin().lock();
    loop {
        write!(stdout, "Select a file (0 to abort): ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match line.trim().parse::<usize>() {
            Ok(0) => return Ok(None),
            Ok(choice) if choice <= files.len() => return Ok(Some(files[choice - 1].clone())),
            _ => writeln!(stdout, "Enter a number between 0 and {}.", files.len())?,
        }
    }
}

fn log_report(report: &ExtractionReport, verbose: bool) {
    eprintln!(
        "{}: {} row(s); pages succeeded {:?}, empty {:?}, failed {:?}",
        report.input.display(),
        report.row_count,
        report.succeeded(),
        report.empty(),
        report.failed()
    );

    if report.warnings.is_empty() {
        return;
    }

    eprintln!("warning: {} issue(s) detected", report.warnings.len());
    if verbose {
        for warning in &report.warnings {
            eprintln!(
                "  - {:?} page={:?} confidence={:?}: {}",
                warning.code, warning.page, warning.confidence, warning.message
            );
        }
    }
}

fn run_extract(args: &ExtractArgs) -> Result<Option<ExtractionReport>> {
    let options = parse_options(args)?;
    let input = match &args.input {
        Some(input) => input.clone(),
        None => match prompt_for_input(&args.input_dir)? {
            Some(input) => input,
            None => return Ok(None),
        },
    };

    Extractor::new(options)
        .extract(&input)
        .map(Some)
        .with_context(|| format!("failed to extract tables from '{}'", input.display()))
}

fn exit_code(report: &ExtractionReport) -> ExitCode {
    if !report.failed().is_empty() {
        ExitCode::from(3)
    } else if report.row_count > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pdf_table_ocr=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Extract(args) => match run_extract(&args) {
            Ok(Some(report)) => {
                log_report(&report, args.verbose);
                exit_code(&report)
            }
            Ok(None) => {
                eprintln!("aborted");
                ExitCode::SUCCESS
            }
            Err(error) => {
                eprintln!("error: {error:#}");
                ExitCode::from(1)
            }
        },
    }
}
