//! Lazy, visibility-gated page thumbnails.
//!
//! Each page has one [`ThumbnailEntry`] that moves through
//!
//! ```text
//! unseen ──(became visible)──► loading ──► loaded
//!                                  └─────► failed
//! ```
//!
//! The first edge is taken at most once per entry, so a thumbnail renders at
//! most once for the life of the cache. Visibility arrives through the
//! [`VisibilityPort`]: either a host UI reports it directly, or the cache
//! derives it from the strip's scroll position with
//! [`ThumbnailCache::update_viewport`].
//!
//! The cache belongs to one document. Drop it when the document changes;
//! dropping aborts renders still in flight. Renders run on the tokio runtime
//! captured at construction, so visibility can be reported from any thread.

use crate::config::ThumbnailConfig;
use crate::error::{PageError, Pdf2DocxError};
use crate::render::{CancellationToken, DrawingSurface, Frame, PageRenderer};
use crate::source::DocumentHandle;
use image::RgbaImage;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Load state of one thumbnail.
#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailState {
    Unseen,
    Loading,
    Loaded(Arc<RgbaImage>),
    Failed(String),
}

/// One row of the thumbnail strip.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailEntry {
    /// 1-indexed page number.
    pub page: usize,
    pub visible: bool,
    pub state: ThumbnailState,
}

impl ThumbnailEntry {
    pub fn is_loading(&self) -> bool {
        self.state == ThumbnailState::Loading
    }

    pub fn raster(&self) -> Option<&RgbaImage> {
        match &self.state {
            ThumbnailState::Loaded(img) => Some(img.as_ref()),
            _ => None,
        }
    }
}

/// Receives "this page became visible" signals.
pub trait VisibilityPort {
    /// Report that `page` came into view. Returns `true` if this started a
    /// render, `false` if the page was already seen or does not exist.
    fn became_visible(&mut self, page: usize) -> bool;
}

type Entries = Arc<Mutex<Vec<ThumbnailEntry>>>;

fn lock(entries: &Entries) -> MutexGuard<'_, Vec<ThumbnailEntry>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Surface that stores a finished render into its cache entry.
struct ThumbnailSlot {
    entries: Entries,
    page: usize,
}

impl DrawingSurface for ThumbnailSlot {
    fn present(&mut self, frame: Frame) -> bool {
        let mut entries = lock(&self.entries);
        match entries.get_mut(self.page - 1) {
            Some(entry) => {
                entry.state = ThumbnailState::Loaded(Arc::new(frame.image));
                true
            }
            None => false,
        }
    }

    fn present_error(&mut self, error: &PageError) -> bool {
        let mut entries = lock(&self.entries);
        match entries.get_mut(self.page - 1) {
            Some(entry) => {
                entry.state = ThumbnailState::Failed(error.to_string());
                true
            }
            None => false,
        }
    }
}

/// Thumbnails for every page of one document.
pub struct ThumbnailCache {
    document: Arc<dyn DocumentHandle>,
    renderer: PageRenderer,
    config: ThumbnailConfig,
    entries: Entries,
    runtime: Handle,
    tasks: JoinSet<()>,
    selected: Option<usize>,
    scroll_top: f32,
    viewport_height: f32,
}

impl ThumbnailCache {
    /// One unseen entry per page of `document`. Nothing renders yet.
    ///
    /// Must be called from within a tokio runtime; use
    /// [`ThumbnailCache::with_runtime`] elsewhere.
    pub fn new(
        document: Arc<dyn DocumentHandle>,
        config: ThumbnailConfig,
    ) -> Result<Self, Pdf2DocxError> {
        let runtime = Handle::try_current().map_err(|e| {
            Pdf2DocxError::Internal(format!("thumbnail cache needs a tokio runtime: {e}"))
        })?;
        Self::with_runtime(document, config, runtime)
    }

    pub fn with_runtime(
        document: Arc<dyn DocumentHandle>,
        config: ThumbnailConfig,
        runtime: Handle,
    ) -> Result<Self, Pdf2DocxError> {
        config.validate()?;
        let entries = (1..=document.page_count())
            .map(|page| ThumbnailEntry {
                page,
                visible: false,
                state: ThumbnailState::Unseen,
            })
            .collect();
        Ok(Self {
            document,
            renderer: PageRenderer::new(),
            config,
            entries: Arc::new(Mutex::new(entries)),
            runtime,
            tasks: JoinSet::new(),
            selected: None,
            scroll_top: 0.0,
            viewport_height: 0.0,
        })
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry(&self, page: usize) -> Option<ThumbnailEntry> {
        let entries = lock(&self.entries);
        page.checked_sub(1).and_then(|i| entries.get(i)).cloned()
    }

    pub fn entries(&self) -> Vec<ThumbnailEntry> {
        lock(&self.entries).clone()
    }

    /// Pages whose thumbnail has left `unseen`.
    pub fn requested_pages(&self) -> Vec<usize> {
        lock(&self.entries)
            .iter()
            .filter(|e| e.state != ThumbnailState::Unseen)
            .map(|e| e.page)
            .collect()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Mark `page` visible and start its render if it has never been seen.
    pub fn notify_visible(&mut self, page: usize) -> bool {
        {
            let mut entries = lock(&self.entries);
            let Some(entry) = page.checked_sub(1).and_then(|i| entries.get_mut(i)) else {
                return false;
            };
            if entry.visible {
                return false;
            }
            entry.visible = true;
            entry.state = ThumbnailState::Loading;
        }

        debug!("Thumbnail for page {} became visible", page);
        let document = Arc::clone(&self.document);
        let renderer = self.renderer;
        let scale = self.config.scale;
        let mut slot = ThumbnailSlot {
            entries: Arc::clone(&self.entries),
            page,
        };
        let task = async move {
            let page_handle = match document.page(page).await {
                Ok(p) => p,
                Err(e) => {
                    let err = e.into_render_error(page);
                    warn!("Thumbnail {}", err);
                    slot.present_error(&err);
                    return;
                }
            };
            let token = CancellationToken::new();
            if let Err(e) = renderer.render(page_handle, scale, &mut slot, &token).await {
                warn!("Thumbnail {}", e);
            }
        };
        self.tasks.spawn_on(task, &self.runtime);
        true
    }

    /// Pixel range `[top, bottom)` of `page`'s row in the strip.
    pub fn item_bounds(&self, page: usize) -> (f32, f32) {
        let top = page.saturating_sub(1) as f32 * self.config.item_height_px;
        (top, top + self.config.item_height_px)
    }

    /// Record the strip's scroll position and notify every page within the
    /// visibility margin. Returns the pages whose render this started.
    pub fn update_viewport(&mut self, scroll_top: f32, viewport_height: f32) -> Vec<usize> {
        self.scroll_top = scroll_top.max(0.0);
        self.viewport_height = viewport_height.max(0.0);

        let margin = self.config.visibility_margin_px;
        let lo = self.scroll_top - margin;
        let hi = self.scroll_top + self.viewport_height + margin;

        let candidates: Vec<usize> = (1..=self.len())
            .filter(|&page| {
                let (top, bottom) = self.item_bounds(page);
                bottom > lo && top < hi
            })
            .collect();

        candidates
            .into_iter()
            .filter(|&page| self.notify_visible(page))
            .collect()
    }

    /// Select `page`. If its row is not fully inside the viewport, returns
    /// the scroll offset that brings it into view (nearest edge) and applies
    /// it.
    pub fn select(&mut self, page: usize) -> Option<f32> {
        if page == 0 || page > self.len() {
            return None;
        }
        self.selected = Some(page);

        let (top, bottom) = self.item_bounds(page);
        let view_bottom = self.scroll_top + self.viewport_height;
        let target = if top < self.scroll_top {
            top
        } else if bottom > view_bottom {
            bottom - self.viewport_height
        } else {
            return None;
        };

        let height = self.viewport_height;
        self.update_viewport(target, height);
        Some(target)
    }

    /// Wait for every started render to finish.
    pub async fn settle(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

impl VisibilityPort for ThumbnailCache {
    fn became_visible(&mut self, page: usize) -> bool {
        self.notify_visible(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_writes_loaded_and_failed() {
        let entries: Entries = Arc::new(Mutex::new(vec![ThumbnailEntry {
            page: 1,
            visible: true,
            state: ThumbnailState::Loading,
        }]));
        let mut slot = ThumbnailSlot {
            entries: Arc::clone(&entries),
            page: 1,
        };
        assert!(slot.present(Frame {
            page: 1,
            scale: 0.3,
            image: RgbaImage::new(3, 4),
        }));
        assert!(lock(&entries)[0].raster().is_some());

        slot.present_error(&PageError::RenderFailed {
            page: 1,
            detail: "boom".into(),
        });
        assert!(matches!(lock(&entries)[0].state, ThumbnailState::Failed(_)));

        let mut missing = ThumbnailSlot { entries, page: 9 };
        assert!(!missing.present(Frame {
            page: 9,
            scale: 0.3,
            image: RgbaImage::new(1, 1),
        }));
    }
}
