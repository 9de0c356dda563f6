//! Document-source seam: the decoder that turns raw bytes into pages.
//!
//! Everything above this module (renderer, viewer, thumbnails, conversion
//! pipeline) talks to documents only through these three traits, and
//! receives the source as an `Arc<dyn DocumentSource>` constructor argument.
//! That keeps the decoder swappable and lets tests drive the whole stack with
//! an in-memory fake.
//!
//! ## Lifetimes
//!
//! A [`DocumentHandle`] lives as long as the component that opened it. A
//! [`PageHandle`] is fetched lazily for one render or extract call and is
//! released by dropping it; nothing in this crate keeps a page alive past
//! one render cycle.
//!
//! ## Two image capabilities
//!
//! [`PageHandle::render`] rasterises the whole page. [`PageHandle::extract_images`]
//! returns only images embedded in the page content. They are separate
//! capabilities: a backend that cannot extract embedded images says so with
//! [`SourceError::Unsupported`] instead of falling back to rasterisation.

pub mod pdfium;

use crate::error::SourceError;
use crate::render::CancellationToken;
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Page dimensions in pixels at a given scale (points at scale 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Scale both edges by `factor`.
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Integer pixel dimensions, never below 1×1.
    pub fn pixels(self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }
}

/// Opens raw document bytes.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Decode `bytes` into a navigable document.
    ///
    /// # Errors
    /// [`SourceError::PasswordProtected`] for encrypted documents,
    /// [`SourceError::Corrupt`] for anything that cannot be parsed.
    async fn open(&self, bytes: Vec<u8>) -> Result<Arc<dyn DocumentHandle>, SourceError>;
}

/// An opened, paginated document.
#[async_trait]
pub trait DocumentHandle: Send + Sync {
    /// Number of pages (may be zero).
    fn page_count(&self) -> usize;

    /// Fetch page `number` (1-indexed).
    async fn page(&self, number: usize) -> Result<Box<dyn PageHandle>, SourceError>;

    /// Warm whatever cache the backend keeps for `number` without rendering.
    ///
    /// The default fetches the page and drops it immediately.
    async fn prefetch(&self, number: usize) -> Result<(), SourceError> {
        self.page(number).await.map(drop)
    }
}

/// One page of a [`DocumentHandle`]. Dropping it releases page-local resources.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// 1-indexed page number.
    fn number(&self) -> usize;

    /// Intrinsic size at scale 1.0.
    fn base_size(&self) -> PageSize;

    /// Size at `scale`.
    fn size(&self, scale: f32) -> PageSize {
        self.base_size().scaled(scale)
    }

    /// Rasterise the whole page at `scale`.
    ///
    /// Backends check `cancel` before and after the expensive part; a
    /// cancelled render may return either `Ok` (discarded by the caller) or
    /// the error it produced.
    async fn render(&self, scale: f32, cancel: &CancellationToken)
        -> Result<RgbaImage, SourceError>;

    /// Read the page's text layer. Empty string when the page has none.
    async fn extract_text(&self) -> Result<String, SourceError>;

    /// Images embedded in the page content, in content order.
    async fn extract_images(&self) -> Result<Vec<DynamicImage>, SourceError> {
        Err(SourceError::Unsupported("embedded image extraction"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_size_and_pixels() {
        let letter = PageSize::new(612.0, 792.0);
        let s = letter.scaled(2.0);
        assert_eq!(s, PageSize::new(1224.0, 1584.0));
        assert_eq!(s.pixels(), (1224, 1584));
    }

    #[test]
    fn pixels_never_collapse_to_zero() {
        assert_eq!(PageSize::new(0.2, 0.0).pixels(), (1, 1));
    }
}
