//! Conversion entry points: the step-driven [`ConversionPipeline`], eager
//! wrappers around it, and the standalone extraction tools.
//!
//! ## Why a pipeline object instead of one async function?
//!
//! A conversion job has observable state (see [`crate::state`]) that outlives
//! one run: after an error the caller may retry from rendering with the
//! document still open, or cancel back to idle. The pipeline owns that state;
//! [`ConversionPipeline::run`] and [`ConversionPipeline::retry`] hand out a
//! [`ProgressStream`] that drives the job one step per poll.
//!
//! Use [`convert`], [`convert_to_file`] or [`convert_from_bytes`] when you
//! only want the result.

use crate::config::ConversionConfig;
use crate::docx::{DocumentBuilder, DocxBuilder, OutputUnit};
use crate::error::Pdf2DocxError;
use crate::output::{
    ConversionOutput, ConversionStats, ConversionSummary, DocumentInfo, ExportedImage,
    PageInfo, PageText, PreviewImage, TextExtraction, format_file_size,
};
use crate::pipeline::render::{capture_page, CapturedPage};
use crate::pipeline::{assemble, encode, extract};
use crate::progress::{band, ProgressEvent, ProgressStream, Stage};
use crate::render::{CancellationToken, PageRenderer};
use crate::source::pdfium::PdfiumSource;
use crate::source::{DocumentHandle, DocumentSource};
use crate::state::{ConversionState, ConversionStateMachine};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a finished document goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputTarget {
    /// Keep the bytes in [`ConversionOutput::bytes`] only. (default)
    #[default]
    Memory,
    /// Also write them atomically to this path.
    File(PathBuf),
}

/// One document to convert, with its options.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Display name of the source, used for the default output name.
    pub name: String,
    pub bytes: Vec<u8>,
    pub config: ConversionConfig,
    pub target: OutputTarget,
}

impl ConversionJob {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            config: ConversionConfig::default(),
            target: OutputTarget::Memory,
        }
    }

    /// Read `path` into a new job.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, Pdf2DocxError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Pdf2DocxError::InputReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        Ok(Self::from_bytes(name, bytes))
    }

    pub fn with_config(mut self, config: ConversionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn write_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.target = OutputTarget::File(path.into());
        self
    }

    /// Output file name for this job when written by a builder producing
    /// `extension` files.
    pub fn output_file_name(&self, extension: &str) -> String {
        match &self.target {
            OutputTarget::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.config.output_file_name(&self.name, extension)),
            OutputTarget::Memory => self.config.output_file_name(&self.name, extension),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Begin,
    Open,
    Render(usize),
    Generate,
    Write,
    Done,
}

#[derive(Debug, Default)]
struct Timings {
    started: Option<Instant>,
    stage_started: Option<Instant>,
}

impl Timings {
    fn lap(&mut self) -> u64 {
        let ms = self
            .stage_started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.stage_started = Some(Instant::now());
        ms
    }
}

/// Drives one [`ConversionJob`] through its state machine.
pub struct ConversionPipeline {
    source: Arc<dyn DocumentSource>,
    builder: Arc<dyn DocumentBuilder>,
    renderer: PageRenderer,
    job: ConversionJob,
    machine: ConversionStateMachine,
    document: Option<Arc<dyn DocumentHandle>>,
    captured: VecDeque<CapturedPage>,
    units: Vec<OutputUnit>,
    preview: Option<PreviewImage>,
    progress: u8,
    step: Step,
    cancel: CancellationToken,
    stats: ConversionStats,
    timings: Timings,
    output: Option<ConversionOutput>,
    last_error: Option<Pdf2DocxError>,
}

impl std::fmt::Debug for ConversionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionPipeline")
            .field("job", &self.job.name)
            .field("state", self.machine.state())
            .field("progress", &self.progress)
            .field("step", &self.step)
            .finish()
    }
}

impl ConversionPipeline {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        builder: Arc<dyn DocumentBuilder>,
        job: ConversionJob,
    ) -> Self {
        Self {
            source,
            builder,
            renderer: PageRenderer::new(),
            job,
            machine: ConversionStateMachine::new(),
            document: None,
            captured: VecDeque::new(),
            units: Vec::new(),
            preview: None,
            progress: 0,
            step: Step::Done,
            cancel: CancellationToken::new(),
            stats: ConversionStats::default(),
            timings: Timings::default(),
            output: None,
            last_error: None,
        }
    }

    // ── Observable state ─────────────────────────────────────────────────

    pub fn state(&self) -> &ConversionState {
        self.machine.state()
    }

    pub fn stage(&self) -> Stage {
        self.machine.stage()
    }

    /// Last reported progress, 0–100.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn job(&self) -> &ConversionJob {
        &self.job
    }

    /// Page count of the open document, if one is open.
    pub fn page_count(&self) -> Option<usize> {
        self.document.as_ref().map(|d| d.page_count())
    }

    pub fn output(&self) -> Option<&ConversionOutput> {
        self.output.as_ref()
    }

    pub fn take_output(&mut self) -> Option<ConversionOutput> {
        self.output.take()
    }

    /// The error that moved the job to `error`, if any.
    pub fn last_error(&self) -> Option<&Pdf2DocxError> {
        self.last_error.as_ref()
    }

    /// Token that stops the current run at the next page boundary.
    ///
    /// A cancelled token is replaced when the next run starts; fetch a fresh
    /// one for every run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Start the job from `idle`.
    ///
    /// Nothing happens until the returned stream is polled.
    ///
    /// # Errors
    /// [`Pdf2DocxError::InvalidTransition`] unless the job is idle,
    /// [`Pdf2DocxError::InvalidConfig`] if the job's config is out of range.
    pub fn run(&mut self) -> Result<ProgressStream<'_>, Pdf2DocxError> {
        if self.stage() != Stage::Idle {
            return Err(Pdf2DocxError::InvalidTransition {
                from: self.stage().as_str(),
                to: Stage::Analyzing.as_str(),
            });
        }
        self.job.config.validate()?;
        self.clear_run();
        self.step = Step::Begin;
        Ok(self.stream())
    }

    /// Re-run from `rendering` after an error, with the same options and
    /// the document still open.
    ///
    /// # Errors
    /// [`Pdf2DocxError::InvalidTransition`] unless the job is in `error`
    /// with an open document. A job that failed while analyzing has nothing
    /// to re-render; cancel it and run again instead.
    pub fn retry(&mut self) -> Result<ProgressStream<'_>, Pdf2DocxError> {
        if self.stage() != Stage::Error || self.document.is_none() {
            return Err(Pdf2DocxError::InvalidTransition {
                from: self.stage().as_str(),
                to: Stage::Rendering.as_str(),
            });
        }
        self.clear_run();
        self.machine.transition(ConversionState::Rendering)?;
        info!("Retrying conversion of {} from rendering", self.job.name);
        self.timings.started = Some(Instant::now());
        self.timings.lap();
        self.step = Step::Render(1);
        Ok(self.stream())
    }

    /// Leave `error` for `idle`, closing the document.
    pub fn cancel(&mut self) -> Result<(), Pdf2DocxError> {
        if self.stage() != Stage::Error {
            return Err(Pdf2DocxError::InvalidTransition {
                from: self.stage().as_str(),
                to: Stage::Idle.as_str(),
            });
        }
        self.machine.transition(ConversionState::Idle)?;
        self.document = None;
        self.last_error = None;
        self.clear_run();
        Ok(())
    }

    /// Leave `success` for `idle`, dropping the output and the document.
    pub fn reset(&mut self) -> Result<(), Pdf2DocxError> {
        if self.stage() != Stage::Success {
            return Err(Pdf2DocxError::InvalidTransition {
                from: self.stage().as_str(),
                to: Stage::Idle.as_str(),
            });
        }
        self.machine.transition(ConversionState::Idle)?;
        self.document = None;
        self.clear_run();
        Ok(())
    }

    /// Run to the end and return the output.
    pub async fn run_to_completion(&mut self) -> Result<ConversionOutput, Pdf2DocxError> {
        {
            let mut events = self.run()?;
            while events.next().await.is_some() {}
        }
        self.finish()
    }

    /// Retry to the end and return the output.
    pub async fn retry_to_completion(&mut self) -> Result<ConversionOutput, Pdf2DocxError> {
        {
            let mut events = self.retry()?;
            while events.next().await.is_some() {}
        }
        self.finish()
    }

    fn finish(&mut self) -> Result<ConversionOutput, Pdf2DocxError> {
        match self.stage() {
            Stage::Success => self
                .output
                .clone()
                .ok_or_else(|| Pdf2DocxError::Internal("success without output".into())),
            Stage::Error => Err(self
                .last_error
                .take()
                .unwrap_or_else(|| Pdf2DocxError::Internal("error without cause".into()))),
            _ => Err(Pdf2DocxError::ConversionFailed("Conversion cancelled".into())),
        }
    }

    // ── Stepping ─────────────────────────────────────────────────────────

    fn clear_run(&mut self) {
        self.captured.clear();
        self.units.clear();
        self.preview = None;
        self.progress = 0;
        self.output = None;
        self.stats = ConversionStats::default();
        self.timings = Timings::default();
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }

    fn stream(&mut self) -> ProgressStream<'_> {
        Box::pin(stream::unfold(self, |pipeline| async move {
            let event = pipeline.step().await?;
            Some((event, pipeline))
        }))
    }

    fn event(&self, stage: Stage, message: impl Into<String>) -> ProgressEvent {
        ProgressEvent::new(stage, message, self.progress)
    }

    fn advance(&mut self, percent: u8) {
        self.progress = self.progress.max(percent);
    }

    fn fail(&mut self, error: Pdf2DocxError) -> ProgressEvent {
        warn!("Conversion of {} failed: {}", self.job.name, error);
        self.machine.fail(&error);
        let event = self.event(Stage::Error, error.to_string());
        self.last_error = Some(error);
        self.step = Step::Done;
        event
    }

    fn abort(&mut self) -> ProgressEvent {
        info!("Conversion of {} cancelled", self.job.name);
        if let Err(e) = self.machine.transition(ConversionState::Idle) {
            return self.fail(e);
        }
        self.document = None;
        self.captured.clear();
        self.units.clear();
        self.step = Step::Done;
        self.event(Stage::Idle, "Conversion cancelled")
    }

    /// Advance the job by one observable step.
    async fn step(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.step {
                Step::Done => return None,

                // ── Step 1: Analyze ──────────────────────────────────────
                Step::Begin => {
                    if let Err(e) = self.machine.transition(ConversionState::Analyzing) {
                        return Some(self.fail(e));
                    }
                    info!(
                        "Starting conversion: {} ({})",
                        self.job.name,
                        format_file_size(self.job.bytes.len() as u64)
                    );
                    self.timings.started = Some(Instant::now());
                    self.timings.lap();
                    self.step = Step::Open;
                    return Some(self.event(Stage::Analyzing, format!("Analyzing {}", self.job.name)));
                }

                Step::Open => {
                    if self.cancel.is_cancelled() {
                        return Some(self.abort());
                    }
                    let document = match self.source.open(self.job.bytes.clone()).await {
                        Ok(document) => document,
                        Err(e) => return Some(self.fail(e.into_load_error())),
                    };
                    let total = document.page_count();
                    if total == 0 {
                        return Some(self.fail(Pdf2DocxError::DocumentLoadFailed {
                            detail: "document has no pages".into(),
                        }));
                    }
                    info!("Document has {} pages", total);
                    self.document = Some(document);

                    if let Err(e) = self.machine.transition(ConversionState::Rendering) {
                        return Some(self.fail(e));
                    }
                    self.timings.lap();
                    self.step = Step::Render(1);
                }

                // ── Step 2: Render + extract, strictly in page order ─────
                Step::Render(n) => {
                    let Some(document) = self.document.clone() else {
                        return Some(self.fail(Pdf2DocxError::Internal(
                            "rendering without an open document".into(),
                        )));
                    };
                    let total = document.page_count();

                    if n > total {
                        self.stats.render_duration_ms = self.timings.lap();
                        info!(
                            "Rendered {} pages in {} ms",
                            total, self.stats.render_duration_ms
                        );
                        if let Err(e) = self.machine.transition(ConversionState::Generating) {
                            return Some(self.fail(e));
                        }
                        self.step = Step::Generate;
                        continue;
                    }

                    if self.cancel.is_cancelled() {
                        return Some(self.abort());
                    }

                    let captured = capture_page(
                        document.as_ref(),
                        n,
                        &self.job.config,
                        &self.renderer,
                        &self.cancel,
                    )
                    .await;
                    match captured {
                        Ok(Some(page)) => {
                            if page.preview.is_some() {
                                self.preview = page.preview.clone();
                            }
                            if page.text.is_empty() {
                                self.stats.pages_without_text += 1;
                            }
                            self.stats.text_chars += page.text.chars().count();
                            self.captured.push_back(page);
                        }
                        Ok(None) => return Some(self.abort()),
                        Err(e) => return Some(self.fail(e.into())),
                    }

                    if n % self.job.config.yield_every == 0 {
                        tokio::task::yield_now().await;
                    }

                    self.advance(band(0, 70, n, total));
                    self.step = Step::Render(n + 1);
                    return Some(
                        self.event(Stage::Rendering, format!("Rendering page {n} of {total}"))
                            .with_page(n),
                    );
                }

                // ── Step 3: Generate output units ────────────────────────
                Step::Generate => {
                    let total = self.page_count().unwrap_or(0);

                    let Some(page) = self.captured.pop_front() else {
                        self.stats.generate_duration_ms = self.timings.lap();
                        if let Err(e) = self.machine.transition(ConversionState::Saving) {
                            return Some(self.fail(e));
                        }
                        self.advance(95);
                        self.step = Step::Write;
                        let name = self.job.output_file_name(self.builder.extension());
                        return Some(self.event(Stage::Saving, format!("Saving {name}")));
                    };

                    if self.cancel.is_cancelled() {
                        return Some(self.abort());
                    }

                    let number = page.number;
                    let is_last = self.captured.is_empty();
                    self.units.push(assemble::unit_for(page, is_last));
                    self.advance(band(70, 95, self.units.len(), total));
                    debug!("Assembled unit for page {}", number);
                    return Some(
                        self.event(
                            Stage::Generating,
                            format!("Assembling page {number} of {total}"),
                        )
                        .with_page(number),
                    );
                }

                // ── Step 4: Serialize and save ───────────────────────────
                Step::Write => {
                    let units = std::mem::take(&mut self.units);
                    let page_count = units.len();
                    let builder = Arc::clone(&self.builder);
                    let paper = self.job.config.page_size;

                    let built = tokio::task::spawn_blocking(move || builder.build(&units, paper))
                        .await
                        .map_err(|e| {
                            Pdf2DocxError::ConversionFailed(format!("builder task panicked: {e}"))
                        })
                        .and_then(|r| r);
                    let bytes = match built {
                        Ok(bytes) => bytes,
                        Err(e) => return Some(self.fail(e)),
                    };

                    let path = match self.job.target.clone() {
                        OutputTarget::File(path) => {
                            if let Err(e) = write_atomic(&path, &bytes).await {
                                return Some(self.fail(e));
                            }
                            info!(
                                "Wrote {} ({})",
                                path.display(),
                                format_file_size(bytes.len() as u64)
                            );
                            Some(path)
                        }
                        OutputTarget::Memory => None,
                    };

                    self.stats.save_duration_ms = self.timings.lap();
                    self.stats.total_duration_ms = self
                        .timings
                        .started
                        .map(|t| t.elapsed().as_millis() as u64)
                        .unwrap_or(0);

                    let summary = ConversionSummary {
                        page_count,
                        file_size_bytes: bytes.len() as u64,
                        preview_image: self.preview.take(),
                    };
                    self.advance(100);
                    if let Err(e) = self
                        .machine
                        .transition(ConversionState::Success(summary.clone()))
                    {
                        return Some(self.fail(e));
                    }

                    let message = format!(
                        "Converted {} pages ({})",
                        page_count,
                        format_file_size(summary.file_size_bytes)
                    );
                    info!(
                        "Conversion complete: {} pages, {} bytes, {} ms",
                        page_count, summary.file_size_bytes, self.stats.total_duration_ms
                    );
                    self.output = Some(ConversionOutput {
                        summary,
                        file_name: self.job.output_file_name(self.builder.extension()),
                        path,
                        stats: self.stats.clone(),
                        bytes,
                    });
                    self.step = Step::Done;
                    return Some(self.event(Stage::Success, message));
                }
            }
        }
    }
}

/// Write to a temp file next to `path`, then rename over it, so a failed
/// save never leaves a truncated document behind.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2DocxError> {
    let write_err = |e| Pdf2DocxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── Eager wrappers ───────────────────────────────────────────────────────

fn default_pipeline(job: ConversionJob) -> ConversionPipeline {
    ConversionPipeline::new(
        Arc::new(PdfiumSource::new()),
        Arc::new(DocxBuilder::new()),
        job,
    )
}

/// Convert a PDF file to DOCX in memory.
///
/// # Errors
/// Whatever moved the job to `error`: load failures, a page that failed to
/// render, or an assembly failure.
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let job = ConversionJob::from_path(input).await?.with_config(config.clone());
    default_pipeline(job).run_to_completion().await
}

/// Convert a PDF file and write the DOCX to `output`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let job = ConversionJob::from_path(input)
        .await?
        .with_config(config.clone())
        .write_to(output.as_ref());
    default_pipeline(job).run_to_completion().await
}

/// Convert PDF bytes held in memory.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2docx::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let output = convert_from_bytes("document.pdf", bytes, &ConversionConfig::default()).await?;
/// std::fs::write(&output.file_name, &output.bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let job = ConversionJob::from_bytes(name, bytes).with_config(config.clone());
    default_pipeline(job).run_to_completion().await
}

// ── Extraction tools ─────────────────────────────────────────────────────

async fn open(
    source: &dyn DocumentSource,
    bytes: Vec<u8>,
) -> Result<Arc<dyn DocumentHandle>, Pdf2DocxError> {
    source.open(bytes).await.map_err(|e| e.into_load_error())
}

/// Page count and page sizes, without rendering anything.
pub async fn inspect(
    source: &dyn DocumentSource,
    bytes: Vec<u8>,
) -> Result<DocumentInfo, Pdf2DocxError> {
    let file_size_bytes = bytes.len() as u64;
    let document = open(source, bytes).await?;

    let mut pages = Vec::with_capacity(document.page_count());
    for number in 1..=document.page_count() {
        let page = document
            .page(number)
            .await
            .map_err(|e| Pdf2DocxError::from(e.into_render_error(number)))?;
        let size = page.base_size();
        pages.push(PageInfo {
            page: number,
            width: size.width,
            height: size.height,
        });
    }

    Ok(DocumentInfo {
        page_count: document.page_count(),
        file_size_bytes,
        pages,
    })
}

/// Text layer of every page, in order.
pub async fn extract_text(
    source: &dyn DocumentSource,
    bytes: Vec<u8>,
) -> Result<TextExtraction, Pdf2DocxError> {
    let document = open(source, bytes).await?;
    let mut pages = Vec::with_capacity(document.page_count());
    for number in 1..=document.page_count() {
        let page = document
            .page(number)
            .await
            .map_err(|e| Pdf2DocxError::from(e.into_render_error(number)))?;
        let text = extract::page_text(page.as_ref()).await?;
        pages.push(PageText { page: number, text });
    }
    info!("Extracted text from {} pages", pages.len());
    Ok(TextExtraction { pages })
}

/// Every page rasterised at `scale` as `page-N.png`.
pub async fn rasterize_pages(
    source: &dyn DocumentSource,
    bytes: Vec<u8>,
    scale: f32,
) -> Result<Vec<ExportedImage>, Pdf2DocxError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(Pdf2DocxError::InvalidConfig(format!(
            "Scale must be positive, got {scale}"
        )));
    }
    let document = open(source, bytes).await?;
    let renderer = PageRenderer::new();
    let never = CancellationToken::new();

    let mut images = Vec::with_capacity(document.page_count());
    for number in 1..=document.page_count() {
        let page = document
            .page(number)
            .await
            .map_err(|e| Pdf2DocxError::from(e.into_render_error(number)))?;
        let Some(raster) = renderer.rasterize(page, scale, &never).await? else {
            continue;
        };
        let png = encode_png_blocking(DynamicImage::ImageRgba8(raster)).await?;
        images.push(ExportedImage {
            file_name: extract::page_image_name(number),
            page: number,
            width: png.width,
            height: png.height,
            png: png.data,
        });
    }
    Ok(images)
}

/// Images embedded in page content as `page-N-image-M.png`.
///
/// Pages without embedded images contribute nothing; pages are never
/// rasterised as a substitute.
pub async fn extract_embedded_images(
    source: &dyn DocumentSource,
    bytes: Vec<u8>,
) -> Result<Vec<ExportedImage>, Pdf2DocxError> {
    let document = open(source, bytes).await?;

    let mut images = Vec::new();
    for number in 1..=document.page_count() {
        let page = document
            .page(number)
            .await
            .map_err(|e| Pdf2DocxError::from(e.into_render_error(number)))?;
        let embedded = page
            .extract_images()
            .await
            .map_err(|e| Pdf2DocxError::ConversionFailed(format!("page {number}: {e}")))?;
        drop(page);
        debug!("Page {} has {} embedded images", number, embedded.len());

        for (i, img) in embedded.into_iter().enumerate() {
            let png = encode_png_blocking(img).await?;
            images.push(ExportedImage {
                file_name: extract::embedded_image_name(number, i + 1),
                page: number,
                width: png.width,
                height: png.height,
                png: png.data,
            });
        }
    }
    Ok(images)
}

async fn encode_png_blocking(img: DynamicImage) -> Result<encode::EncodedImage, Pdf2DocxError> {
    tokio::task::spawn_blocking(move || encode::encode_png(&img))
        .await
        .map_err(|e| Pdf2DocxError::Internal(format!("encode task panicked: {e}")))?
        .map_err(|e| Pdf2DocxError::ConversionFailed(format!("PNG encoding failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_output_name_follows_target() {
        let job = ConversionJob::from_bytes("scan.pdf", vec![]);
        assert_eq!(job.output_file_name("docx"), "scan_converted.docx");

        let job = job.write_to("/tmp/out/final.docx");
        assert_eq!(job.output_file_name("docx"), "final.docx");
    }

    #[tokio::test]
    async fn write_atomic_creates_parents_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.docx");
        write_atomic(&path, b"PK").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PK");
        assert!(!path.with_extension("docx.tmp").exists());
    }

    #[tokio::test]
    async fn from_path_reports_missing_input() {
        let err = ConversionJob::from_path("/definitely/not/here.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2DocxError::InputReadFailed { .. }));
    }
}
