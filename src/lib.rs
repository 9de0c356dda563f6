//! # edgequake-pdf2docx
//!
//! View PDF documents page by page and convert them into searchable Word
//! documents.
//!
//! ## Why this crate?
//!
//! Text-reflow PDF→DOCX converters mangle anything with a real layout:
//! columns drift, tables collapse, figures lose their captions. This crate
//! keeps every page exactly as it looks by placing a high-resolution raster
//! of it in the Word file, and lays the page's own text layer underneath as
//! an invisible run, so the result still searches and copies like text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Analyze   open via the DocumentSource (pdfium, spawn_blocking)
//!  ├─ 2. Render    page by page, in order: 2× raster → JPEG, text layer   0–70 %
//!  ├─ 3. Generate  one unit per page: image + hidden text + page break   70–95 %
//!  └─ 4. Save      DocumentBuilder → .docx bytes, atomic write            100 %
//! ```
//!
//! Progress arrives as a [`ProgressStream`] of [`ProgressEvent`]s; the job's
//! [`ConversionState`] is observable between events, and a failed job can be
//! retried from the rendering stage.
//!
//! The interactive side is [`ViewerController`] (page, zoom, keyboard,
//! cancel-on-change rendering) and [`ThumbnailCache`] (visibility-gated
//! thumbnails rendered at most once).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2docx::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().quality(0.85).build()?;
//!     let output = convert_to_file("report.pdf", "report_converted.docx", &config).await?;
//!     eprintln!("{} pages, {} bytes", output.page_count(), output.file_size_bytes());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2docx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2docx = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDFium
//!
//! The default [`PdfiumSource`] resolves the pdfium shared library once per
//! process, looking at `PDFIUM_LIB_PATH`, then `./`, then `./lib`, then the
//! system search path, and binds it afresh inside every blocking call.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod docx;
pub mod error;
pub mod library;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod source;
pub mod state;
pub mod thumbnail;
pub mod viewer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PaperSize, ThumbnailConfig, ViewerConfig};
pub use convert::{
    convert, convert_from_bytes, convert_to_file, extract_embedded_images, extract_text,
    inspect, rasterize_pages, ConversionJob, ConversionPipeline, OutputTarget,
};
pub use docx::{DocumentBuilder, DocxBuilder, OutputUnit};
pub use error::{PageError, Pdf2DocxError, SourceError};
pub use library::{format_relative_time, FileLibrary, FileRecord};
pub use output::{
    format_file_size, ConversionOutput, ConversionStats, ConversionSummary, DocumentInfo,
    ExportedImage, PreviewImage, TextExtraction,
};
pub use progress::{ProgressEvent, ProgressStream, Stage};
pub use render::{CancellationToken, DrawingSurface, Frame, PageRenderer, RenderOutcome, RenderTask, Surface};
pub use source::pdfium::PdfiumSource;
pub use source::{DocumentHandle, DocumentSource, PageHandle, PageSize};
pub use state::{ConversionFailure, ConversionState, ConversionStateMachine};
pub use thumbnail::{ThumbnailCache, ThumbnailEntry, ThumbnailState, VisibilityPort};
pub use viewer::{Focus, Key, LoadError, LoadFailureCause, ViewState, ViewerCommand, ViewerController};
