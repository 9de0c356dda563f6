//! CLI binary for edgequake-pdf2docx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, drives the progress stream and prints results.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use edgequake_pdf2docx::{
    extract_embedded_images, extract_text, format_file_size, format_relative_time, inspect,
    rasterize_pages, ConversionConfig, ConversionJob, ConversionPipeline, DocumentBuilder,
    DocxBuilder, ExportedImage, FileLibrary, PaperSize, PdfiumSource, ProgressEvent, Stage,
    ViewerConfig, ViewerController,
};
use edgequake_pdf2docx::pipeline::encode::encode_png;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Progress bar fed from the progress stream ────────────────────────────────

struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold:>10}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    fn update(&self, event: &ProgressEvent) {
        self.bar.set_prefix(capitalize(event.stage.as_str()));
        self.bar.set_position(event.progress_percent as u64);
        self.bar.set_message(event.message.clone());
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert to report_converted.docx next to the input
  pdf2docx convert report.pdf

  # Higher quality, A4 pages, explicit output
  pdf2docx convert --quality 0.95 --paper a4 report.pdf -o out/report.docx

  # Page count and sizes
  pdf2docx inspect report.pdf --json

  # Text layer dump
  pdf2docx text report.pdf -o report.txt

  # Every page as page-N.png, or only embedded images as page-N-image-M.png
  pdf2docx images report.pdf --out-dir pages/
  pdf2docx images report.pdf --out-dir figures/ --embedded

  # Page 3 as the viewer shows it at 150 % zoom
  pdf2docx page report.pdf --page 3 --zoom 1.5 -o page3.png

  # Remember converted files, then list them
  pdf2docx convert --remember report.pdf
  pdf2docx files list

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH       Path to libpdfium (else ./, ./lib, then system paths)
  PDF2DOCX_QUALITY      Default --quality
  PDF2DOCX_SCALE        Default --scale
  PDF2DOCX_PAPER        Default --paper
  PDF2DOCX_LIBRARY      File library location (default: pdf2docx/library.json
                        under the per-user data directory)
  RUST_LOG              Log filter, overrides --verbose/--quiet
"#;

/// View-quality PDF → searchable DOCX conversion.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2docx",
    version,
    about = "Convert PDF files to searchable Word documents",
    long_about = "Convert PDF documents to Word (.docx) files that look exactly like the \
original: every page becomes a high-resolution image with its text layer embedded \
underneath as invisible, searchable text.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output structured JSON instead of human-readable text.
    #[arg(long, global = true, env = "PDF2DOCX_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "PDF2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2DOCX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a PDF to DOCX.
    Convert {
        /// PDF file to convert.
        input: PathBuf,

        /// Output path. Default: <stem>_converted.docx next to the input.
        #[arg(short, long, env = "PDF2DOCX_OUTPUT")]
        output: Option<PathBuf>,

        /// JPEG quality of page images (0.5–1.0).
        #[arg(long, env = "PDF2DOCX_QUALITY", default_value_t = 0.85)]
        quality: f32,

        /// Rasterisation scale (0.5–4.0).
        #[arg(long, env = "PDF2DOCX_SCALE", default_value_t = 2.0)]
        scale: f32,

        /// Paper size: letter or a4.
        #[arg(long, env = "PDF2DOCX_PAPER", default_value = "letter")]
        paper: String,

        /// Record the input in the file library after a successful conversion.
        #[arg(long)]
        remember: bool,
    },

    /// Print page count and page sizes.
    Inspect {
        input: PathBuf,
    },

    /// Dump the text layer of every page.
    Text {
        input: PathBuf,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export pages (or embedded images) as PNG files.
    Images {
        input: PathBuf,

        /// Directory to write PNGs into.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Export images embedded in the page content instead of whole pages.
        #[arg(long)]
        embedded: bool,

        /// Rasterisation scale for whole-page export.
        #[arg(long, default_value_t = 2.0)]
        scale: f32,
    },

    /// Render one page through the viewer and save it as PNG.
    Page {
        input: PathBuf,

        /// Page number (1-indexed, clamped to the document).
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Viewer zoom (0.5–3.0, snapped to 0.25 steps).
        #[arg(long, default_value_t = 1.0)]
        zoom: f32,

        /// Output PNG. Default: page-N.png in the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the list of remembered files.
    Files {
        #[command(subcommand)]
        action: FilesAction,

        /// Library file.
        #[arg(long, env = "PDF2DOCX_LIBRARY")]
        library: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum FilesAction {
    /// List remembered files, newest first.
    List,
    /// Remember a file (reads its page count).
    Add { path: PathBuf },
    /// Forget a file by id.
    Remove { id: Uuid },
    /// Forget every file.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Convert {
            input,
            output,
            quality,
            scale,
            paper,
            remember,
        } => {
            let paper: PaperSize = paper.parse().context("Invalid --paper")?;
            let config = ConversionConfig::builder()
                .quality(*quality)
                .render_scale(*scale)
                .page_size(paper)
                .build()
                .context("Invalid configuration")?;
            run_convert(&cli, input, output.as_deref(), config, *remember, show_progress).await
        }
        Command::Inspect { input } => run_inspect(&cli, input).await,
        Command::Text { input, output } => run_text(&cli, input, output.as_deref()).await,
        Command::Images {
            input,
            out_dir,
            embedded,
            scale,
        } => run_images(&cli, input, out_dir, *embedded, *scale).await,
        Command::Page {
            input,
            page,
            zoom,
            output,
        } => run_page(&cli, input, *page, *zoom, output.as_deref()).await,
        Command::Files {
            action,
            library: library_path,
        } => {
            let path = library_path
                .clone()
                .unwrap_or_else(FileLibrary::default_path);
            run_files(&cli, action, path).await
        }
    }
}

async fn read_input(input: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise output")?
    );
    Ok(())
}

// ── convert ──────────────────────────────────────────────────────────────

async fn run_convert(
    cli: &Cli,
    input: &Path,
    output: Option<&Path>,
    config: ConversionConfig,
    remember: bool,
    show_progress: bool,
) -> Result<()> {
    let job = ConversionJob::from_path(input)
        .await
        .context("Failed to read input")?
        .with_config(config);
    let builder = Arc::new(DocxBuilder::new());
    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(job.output_file_name(builder.extension())),
    };
    let job = job.write_to(&output_path);

    let mut pipeline = ConversionPipeline::new(
        Arc::new(PdfiumSource::new()),
        builder,
        job,
    );

    let progress = show_progress.then(CliProgress::new);
    {
        let mut events = pipeline.run().context("Failed to start conversion")?;
        while let Some(event) = events.next().await {
            if let Some(p) = &progress {
                p.update(&event);
            } else if !cli.quiet && !cli.json {
                eprintln!(
                    "[{:>3}%] {:<10} {}",
                    event.progress_percent,
                    event.stage.as_str(),
                    event.message
                );
            }
        }
    }
    if let Some(p) = &progress {
        p.finish();
    }

    if pipeline.stage() != Stage::Success {
        let message = pipeline
            .last_error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "conversion cancelled".to_string());
        if !cli.quiet {
            eprintln!("{} {}", red("✘"), message);
        }
        bail!("Conversion failed");
    }

    let Some(result) = pipeline.take_output() else {
        bail!("Conversion finished without output");
    };

    if remember {
        let mut lib = FileLibrary::open(FileLibrary::default_path())?;
        lib.add(
            input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            pipeline.job().bytes.len() as u64,
            Some(result.page_count()),
            Utc::now(),
        );
        lib.save()?;
    }

    if cli.json {
        print_json(&result)?;
    } else if !cli.quiet {
        eprintln!(
            "{}  {} pages  {}  {}ms  →  {}",
            green("✔"),
            result.page_count(),
            format_file_size(result.file_size_bytes()),
            result.stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if result.stats.pages_without_text > 0 {
            eprintln!(
                "   {}",
                dim(&format!(
                    "{} pages had no text layer (not searchable)",
                    result.stats.pages_without_text
                ))
            );
        }
    }
    Ok(())
}

// ── inspect / text / images ──────────────────────────────────────────────

async fn run_inspect(cli: &Cli, input: &Path) -> Result<()> {
    let bytes = read_input(input).await?;
    let info = inspect(&PdfiumSource::new(), bytes)
        .await
        .context("Failed to inspect PDF")?;

    if cli.json {
        return print_json(&info);
    }
    println!("File:   {}", input.display());
    println!("Size:   {}", format_file_size(info.file_size_bytes));
    println!("Pages:  {}", info.page_count);
    for page in &info.pages {
        println!(
            "  {:>4}  {:.0} × {:.0} pt",
            page.page, page.width, page.height
        );
    }
    Ok(())
}

async fn run_text(cli: &Cli, input: &Path, output: Option<&Path>) -> Result<()> {
    let bytes = read_input(input).await?;
    let text = extract_text(&PdfiumSource::new(), bytes)
        .await
        .context("Failed to extract text")?;

    if cli.json {
        return print_json(&text);
    }
    match output {
        Some(path) => {
            tokio::fs::write(path, text.to_text())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{} {} pages → {}", green("✔"), text.pages.len(), path.display());
            }
        }
        None => print!("{}", text.to_text()),
    }
    Ok(())
}

async fn run_images(cli: &Cli, input: &Path, out_dir: &Path, embedded: bool, scale: f32) -> Result<()> {
    let bytes = read_input(input).await?;
    let source = PdfiumSource::new();
    let images: Vec<ExportedImage> = if embedded {
        extract_embedded_images(&source, bytes)
            .await
            .context("Failed to extract embedded images")?
    } else {
        rasterize_pages(&source, bytes, scale)
            .await
            .context("Failed to rasterise pages")?
    };

    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    for image in &images {
        let path = out_dir.join(&image.file_name);
        tokio::fs::write(&path, &image.png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if cli.json {
        return print_json(&images);
    }
    if !cli.quiet {
        if images.is_empty() && embedded {
            eprintln!("{}", dim("No embedded images found"));
        } else {
            eprintln!("{} {} images → {}", green("✔"), images.len(), out_dir.display());
        }
    }
    Ok(())
}

// ── page ─────────────────────────────────────────────────────────────────

async fn run_page(
    cli: &Cli,
    input: &Path,
    page: usize,
    zoom: f32,
    output: Option<&Path>,
) -> Result<()> {
    let bytes = read_input(input).await?;
    let mut viewer = ViewerController::new(Arc::new(PdfiumSource::new()), ViewerConfig::default())
        .context("Invalid viewer configuration")?;
    viewer
        .load_document(bytes)
        .await
        .context("Failed to open PDF")?;
    viewer.set_page(page);
    viewer.set_zoom(zoom);
    if let Some(Err(e)) = viewer.settle().await {
        bail!("{e}");
    }

    let Some(frame) = viewer.surface().snapshot() else {
        bail!("Page {} was not rendered", viewer.current_page());
    };
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("page-{}.png", frame.page)));
    let (width, height) = frame.image.dimensions();
    let png = encode_png(&image::DynamicImage::ImageRgba8(frame.image))
        .context("Failed to encode PNG")?;
    tokio::fs::write(&path, &png.data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if cli.json {
        return print_json(&serde_json::json!({
            "page": frame.page,
            "page_count": viewer.page_count(),
            "zoom": viewer.zoom(),
            "width": width,
            "height": height,
            "path": path,
        }));
    }
    if !cli.quiet {
        eprintln!(
            "{} page {}/{} at {:.0}%  {}×{} px  →  {}",
            green("✔"),
            frame.page,
            viewer.page_count(),
            viewer.zoom() * 100.0,
            width,
            height,
            path.display()
        );
    }
    Ok(())
}

// ── files ────────────────────────────────────────────────────────────────

async fn run_files(cli: &Cli, action: &FilesAction, path: PathBuf) -> Result<()> {
    let mut lib = FileLibrary::open(path)?;

    match action {
        FilesAction::List => {
            if cli.json {
                return print_json(&lib.records());
            }
            if lib.is_empty() {
                println!("{}", dim("No files"));
                return Ok(());
            }
            let now = Utc::now();
            for record in lib.records() {
                println!(
                    "{:<36} {:<40} {:>10} {:>6}  {}",
                    record.id,
                    record.name,
                    format_file_size(record.size),
                    record
                        .page_count
                        .map(|n| format!("{n}p"))
                        .unwrap_or_else(|| "?".into()),
                    dim(&format_relative_time(record.uploaded_at, now)),
                );
            }
        }
        FilesAction::Add { path } => {
            let bytes = read_input(path).await?;
            let size = bytes.len() as u64;
            let page_count = inspect(&PdfiumSource::new(), bytes)
                .await
                .map(|info| info.page_count)
                .ok();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let record = lib.add(name, size, page_count, Utc::now());
            lib.save()?;
            if cli.json {
                return print_json(&record);
            }
            println!("{} {} ({})", green("✔"), record.name, record.id);
        }
        FilesAction::Remove { id } => {
            if lib.remove(*id).is_none() {
                bail!("No file with id '{id}'");
            }
            lib.save()?;
            if !cli.quiet {
                println!("{} removed {}", green("✔"), id);
            }
        }
        FilesAction::Clear => {
            let n = lib.len();
            lib.clear();
            lib.save()?;
            if !cli.quiet {
                println!("{} cleared {} files", green("✔"), n);
            }
        }
    }
    Ok(())
}
