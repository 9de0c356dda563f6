//! PDFium-backed [`DocumentSource`] via `pdfium-render`.
//!
//! ## Binding
//!
//! The location of the pdfium shared library is resolved once per process
//! and cached in a `OnceLock`. Each blocking call then binds its own
//! `Pdfium` from that location; the instance is neither `Send` nor `Sync`
//! and never leaves the thread that created it. [`PdfiumSource`] is a
//! plain value that callers construct and inject.
//!
//! Library resolution order: `PDFIUM_LIB_PATH`, then `./`, then `./lib`,
//! then the system library search path.
//!
//! ## Why reopen per page?
//!
//! `PdfDocument` borrows the `Pdfium` instance and is not `Send`, so it
//! cannot cross into `spawn_blocking`. Each page operation reopens the
//! document from a shared in-memory copy of the bytes on the blocking pool,
//! does its work and drops everything. Parsing an already-loaded buffer is
//! cheap next to rasterisation, and it makes page release automatic.

use super::{DocumentHandle, DocumentSource, PageHandle, PageSize};
use crate::error::SourceError;
use crate::render::CancellationToken;
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Where the pdfium shared library was found.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LibraryLocation {
    Path(PathBuf),
    System,
}

static RESOLVED: OnceLock<Result<LibraryLocation, String>> = OnceLock::new();

fn candidate_paths() -> Vec<PathBuf> {
    match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => vec![PathBuf::from(path)],
        _ => vec![
            Pdfium::pdfium_platform_library_name_at_path("./"),
            Pdfium::pdfium_platform_library_name_at_path("./lib"),
        ],
    }
}

fn resolve_location() -> Result<LibraryLocation, String> {
    let explicit = matches!(std::env::var("PDFIUM_LIB_PATH"), Ok(p) if !p.is_empty());
    let mut last_error = String::from("no candidate library paths");
    for path in candidate_paths() {
        match Pdfium::bind_to_library(&path) {
            Ok(_) => {
                info!("pdfium resolved at {}", path.display());
                return Ok(LibraryLocation::Path(path));
            }
            Err(e) => {
                debug!("pdfium not usable at {}: {}", path.display(), e);
                last_error = format!("{e}");
            }
        }
    }
    if explicit {
        return Err(last_error);
    }
    Pdfium::bind_to_system_library()
        .map(|_| {
            info!("pdfium resolved from the system library path");
            LibraryLocation::System
        })
        .map_err(|e| format!("{e}"))
}

/// Bind a fresh `Pdfium` for the calling thread.
///
/// The first call resolves and caches the library location; later calls
/// only bind.
pub fn bind_pdfium() -> Result<Pdfium, SourceError> {
    let location = RESOLVED
        .get_or_init(resolve_location)
        .as_ref()
        .map_err(|message| SourceError::Unavailable(message.clone()))?;
    let bindings = match location {
        LibraryLocation::Path(path) => Pdfium::bind_to_library(path),
        LibraryLocation::System => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| SourceError::Unavailable(format!("{e}")))?;
    Ok(Pdfium::new(bindings))
}

/// Map a pdfium load error onto the password/corrupt split.
fn classify_load_error(err: &PdfiumError) -> SourceError {
    let err_str = format!("{:?}", err);
    if err_str.contains("Password") || err_str.contains("password") {
        SourceError::PasswordProtected
    } else {
        SourceError::Corrupt(err_str)
    }
}

fn load<'a>(pdfium: &'a Pdfium, bytes: &'a [u8]) -> Result<PdfDocument<'a>, SourceError> {
    pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| classify_load_error(&e))
}

fn page_index(number: usize, total: usize) -> Result<u16, SourceError> {
    if number == 0 || number > total || number > u16::MAX as usize {
        return Err(SourceError::PageOutOfRange {
            page: number,
            total,
        });
    }
    Ok((number - 1) as u16)
}

async fn blocking<T, F>(f: F) -> Result<T, SourceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SourceError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SourceError::PageFailed(format!("pdfium task panicked: {e}")))?
}

/// Opens PDF bytes with PDFium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumSource;

impl PdfiumSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentSource for PdfiumSource {
    async fn open(&self, bytes: Vec<u8>) -> Result<Arc<dyn DocumentHandle>, SourceError> {
        let bytes = Arc::new(bytes);
        let shared = Arc::clone(&bytes);

        let sizes = blocking(move || {
            let pdfium = bind_pdfium()?;
            let document = load(&pdfium, &shared)?;
            let sizes: Vec<PageSize> = document
                .pages()
                .iter()
                .map(|page| PageSize::new(page.width().value, page.height().value))
                .collect();
            Ok(sizes)
        })
        .await?;

        info!("PDF loaded: {} pages", sizes.len());
        Ok(Arc::new(PdfiumDocument { bytes, sizes }))
    }
}

/// A PDF opened by [`PdfiumSource`].
pub struct PdfiumDocument {
    bytes: Arc<Vec<u8>>,
    sizes: Vec<PageSize>,
}

#[async_trait]
impl DocumentHandle for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    async fn page(&self, number: usize) -> Result<Box<dyn PageHandle>, SourceError> {
        let index = page_index(number, self.sizes.len())?;
        Ok(Box::new(PdfiumPage {
            bytes: Arc::clone(&self.bytes),
            number,
            index,
            total: self.sizes.len(),
            size: self.sizes[index as usize],
        }))
    }

    async fn prefetch(&self, number: usize) -> Result<(), SourceError> {
        // Sizes are already known; the OS page cache holds the bytes.
        page_index(number, self.sizes.len()).map(drop)
    }
}

struct PdfiumPage {
    bytes: Arc<Vec<u8>>,
    number: usize,
    index: u16,
    total: usize,
    size: PageSize,
}

impl PdfiumPage {
    /// Run `f` against this page on the blocking pool.
    async fn with_page<T, F>(&self, f: F) -> Result<T, SourceError>
    where
        T: Send + 'static,
        F: FnOnce(&PdfPage<'_>) -> Result<T, SourceError> + Send + 'static,
    {
        let bytes = Arc::clone(&self.bytes);
        let index = self.index;
        let total = self.total;
        blocking(move || {
            let pdfium = bind_pdfium()?;
            let document = load(&pdfium, &bytes)?;
            let page = document
                .pages()
                .get(index)
                .map_err(|_| SourceError::PageOutOfRange {
                    page: index as usize + 1,
                    total,
                })?;
            f(&page)
        })
        .await
    }
}

#[async_trait]
impl PageHandle for PdfiumPage {
    fn number(&self) -> usize {
        self.number
    }

    fn base_size(&self) -> PageSize {
        self.size
    }

    async fn render(
        &self,
        scale: f32,
        cancel: &CancellationToken,
    ) -> Result<RgbaImage, SourceError> {
        let cancel = cancel.clone();
        let number = self.number;
        self.with_page(move |page| {
            if cancel.is_cancelled() {
                debug!("Render of page {} cancelled before start", number);
                return Ok(RgbaImage::new(1, 1));
            }
            let config = PdfRenderConfig::new().scale_page_by_factor(scale);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| SourceError::PageFailed(format!("{:?}", e)))?;
            let image = bitmap.as_image().to_rgba8();
            debug!(
                "Rendered page {} at {:.2}x → {}x{} px",
                number,
                scale,
                image.width(),
                image.height()
            );
            Ok(image)
        })
        .await
    }

    async fn extract_text(&self) -> Result<String, SourceError> {
        self.with_page(|page| {
            let text = page
                .text()
                .map_err(|e| SourceError::PageFailed(format!("{:?}", e)))?;
            Ok(text.all())
        })
        .await
    }

    async fn extract_images(&self) -> Result<Vec<DynamicImage>, SourceError> {
        self.with_page(|page| {
            let mut images = Vec::new();
            for object in page.objects().iter() {
                if let Some(image_object) = object.as_image_object() {
                    let image = image_object
                        .get_raw_image()
                        .map_err(|e| SourceError::PageFailed(format!("{:?}", e)))?;
                    images.push(image);
                }
            }
            Ok(images)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_index_bounds() {
        assert_eq!(page_index(1, 3), Ok(0));
        assert_eq!(page_index(3, 3), Ok(2));
        assert_eq!(
            page_index(0, 3),
            Err(SourceError::PageOutOfRange { page: 0, total: 3 })
        );
        assert_eq!(
            page_index(4, 3),
            Err(SourceError::PageOutOfRange { page: 4, total: 3 })
        );
    }

    #[test]
    fn resolved_location_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OnceLock<Result<LibraryLocation, String>>>();
        assert_send_sync::<PdfiumSource>();
    }

    #[test]
    fn bind_failures_surface_as_unavailable() {
        // Either the library is present or the error names the decoder as
        // unavailable; binding never panics.
        match bind_pdfium() {
            Ok(_) => {}
            Err(err) => assert!(matches!(err, SourceError::Unavailable(_))),
        }
    }

    // Opening real PDFs needs the pdfium shared library; covered by the
    // E2E_ENABLED-gated tests in tests/e2e.rs.
}
