//! Rendering stage: one page → encoded image + text (+ preview for page 1).
//!
//! ## Why spawn_blocking for encoding?
//!
//! The decoder already rasterises on the blocking pool. JPEG-encoding a 2×
//! page is another 20–60 ms of pure CPU, so it goes to the blocking pool as
//! well instead of stalling a Tokio worker thread.

use crate::config::ConversionConfig;
use crate::error::PageError;
use crate::output::PreviewImage;
use crate::pipeline::encode::{self, EncodedImage};
use crate::pipeline::extract;
use crate::render::{CancellationToken, PageRenderer};
use crate::source::DocumentHandle;
use std::time::Instant;
use tracing::debug;

/// Everything the generating stage needs from one page.
#[derive(Debug, Clone)]
pub struct CapturedPage {
    /// 1-indexed page number.
    pub number: usize,
    pub image: EncodedImage,
    /// Cleaned text layer; empty when the page has none.
    pub text: String,
    /// Only captured for page 1.
    pub preview: Option<PreviewImage>,
}

/// Render, encode and extract text for page `number`.
///
/// Returns `Ok(None)` if `cancel` fired during the render.
pub async fn capture_page(
    document: &dyn DocumentHandle,
    number: usize,
    config: &ConversionConfig,
    renderer: &PageRenderer,
    cancel: &CancellationToken,
) -> Result<Option<CapturedPage>, PageError> {
    let start = Instant::now();

    // Text first: the render consumes the page handle.
    let page = document
        .page(number)
        .await
        .map_err(|e| e.into_render_error(number))?;
    let text = extract::page_text(page.as_ref()).await?;

    let Some(raster) = renderer
        .rasterize(page, config.render_scale, cancel)
        .await?
    else {
        return Ok(None);
    };

    let quality = config.jpeg_quality();
    let preview_width = config.preview_width;
    let want_preview = number == 1;

    let (image, preview) = tokio::task::spawn_blocking(move || {
        let image = encode::encode_jpeg(&raster, quality)?;
        let preview = if want_preview {
            Some(encode::preview(&raster, preview_width)?)
        } else {
            None
        };
        Ok::<_, image::ImageError>((image, preview))
    })
    .await
    .map_err(|e| PageError::RenderFailed {
        page: number,
        detail: format!("encode task panicked: {e}"),
    })?
    .map_err(|e| PageError::RenderFailed {
        page: number,
        detail: format!("image encoding failed: {e}"),
    })?;

    debug!(
        "Captured page {} in {} ms ({} bytes image, {} chars text)",
        number,
        start.elapsed().as_millis(),
        image.data.len(),
        text.chars().count()
    );

    Ok(Some(CapturedPage {
        number,
        image,
        text,
        preview,
    }))
}
