//! Page rendering: one page, one scale, one surface, cancellable.
//!
//! [`PageRenderer`] is shared by the viewer, the thumbnail cache and the
//! conversion pipeline. It fetches nothing on its own; callers hand it a
//! [`PageHandle`] (or a document plus page number when spawning) and a
//! [`DrawingSurface`] to present the result on.
//!
//! ## Cancellation is silent
//!
//! A render whose [`CancellationToken`] fired returns
//! [`RenderOutcome::Cancelled`], never an error. A render that finished but
//! whose surface no longer wants it (a newer render took over) returns
//! [`RenderOutcome::Superseded`] and the pixels are dropped.
//!
//! ## Generation-guarded surface
//!
//! [`Surface`] is the viewer's drawing target. Every new render first calls
//! [`Surface::advance`], which bumps a generation counter, and then renders
//! through a [`SurfaceLease`] that captured the generation at task start. The
//! lease only writes if the generation is still current, so a stale render
//! can never overwrite a newer frame, however late it resolves.

use crate::error::PageError;
use crate::source::{DocumentHandle, PageHandle};
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Cooperative cancellation flag shared between a task and its owner.
///
/// Clones observe the same flag. Cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A rasterised page together with the parameters it was rendered at.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 1-indexed page number.
    pub page: usize,
    /// Scale the page was rendered at.
    pub scale: f32,
    pub image: RgbaImage,
}

/// Where a finished render is presented.
pub trait DrawingSurface: Send {
    /// Accept `frame`. Returns `false` if the surface refused it as stale.
    fn present(&mut self, frame: Frame) -> bool;

    /// Record a render failure. Returns `false` if it was ignored as stale.
    fn present_error(&mut self, error: &PageError) -> bool {
        let _ = error;
        false
    }
}

/// How a render ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The frame reached the surface.
    Presented,
    /// The render finished but the surface had moved on; pixels dropped.
    Superseded,
    /// The render was cancelled before it could present.
    Cancelled,
}

/// Summary of what a [`Surface`] currently shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub page: usize,
    pub scale: f32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default)]
struct SurfaceState {
    generation: u64,
    frame: Option<Frame>,
    notice: Option<PageError>,
    writes: u64,
}

/// Generation-guarded drawing surface owned by one viewer.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    state: Arc<Mutex<SurfaceState>>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new generation. Outstanding leases become stale and the
    /// previous failure notice is cleared; the current frame stays on screen.
    pub fn advance(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.notice = None;
        state.generation
    }

    /// A writer bound to the current generation.
    pub fn lease(&self) -> SurfaceLease {
        SurfaceLease {
            generation: self.lock().generation,
            surface: self.clone(),
        }
    }

    /// Drop the frame and any notice, and invalidate outstanding leases.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.frame = None;
        state.notice = None;
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// What is on screen, without copying pixels.
    pub fn frame_info(&self) -> Option<FrameInfo> {
        self.lock().frame.as_ref().map(|f| FrameInfo {
            page: f.page,
            scale: f.scale,
            width: f.image.width(),
            height: f.image.height(),
        })
    }

    /// Copy of the current frame.
    pub fn snapshot(&self) -> Option<Frame> {
        self.lock().frame.clone()
    }

    /// Failure of the current generation's render, if any.
    pub fn notice(&self) -> Option<PageError> {
        self.lock().notice.clone()
    }

    /// Number of frames ever written.
    pub fn writes(&self) -> u64 {
        self.lock().writes
    }
}

/// Writes to a [`Surface`] only while its generation is current.
#[derive(Debug, Clone)]
pub struct SurfaceLease {
    surface: Surface,
    generation: u64,
}

impl SurfaceLease {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.surface.generation() == self.generation
    }
}

impl DrawingSurface for SurfaceLease {
    fn present(&mut self, frame: Frame) -> bool {
        let mut state = self.surface.lock();
        if state.generation != self.generation {
            debug!(
                "Discarding stale render of page {} (generation {} < {})",
                frame.page, self.generation, state.generation
            );
            return false;
        }
        state.frame = Some(frame);
        state.writes += 1;
        true
    }

    fn present_error(&mut self, error: &PageError) -> bool {
        let mut state = self.surface.lock();
        if state.generation != self.generation {
            return false;
        }
        state.notice = Some(error.clone());
        true
    }
}

/// Renders a single page onto a surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageRenderer;

impl PageRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Rasterise `page` at `scale` without presenting it.
    ///
    /// Returns `Ok(None)` when `cancel` fired. The page is released before
    /// this returns, whatever the result.
    pub async fn rasterize(
        &self,
        page: Box<dyn PageHandle>,
        scale: f32,
        cancel: &CancellationToken,
    ) -> Result<Option<RgbaImage>, PageError> {
        let number = page.number();
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let result = page.render(scale, cancel).await;
        drop(page);

        if cancel.is_cancelled() {
            debug!("Render of page {} cancelled", number);
            return Ok(None);
        }
        result
            .map(Some)
            .map_err(|e| e.into_render_error(number))
    }

    /// Render `page` at `scale` and present it on `surface`.
    ///
    /// # Errors
    /// [`PageError::RenderFailed`] for any failure other than cancellation.
    /// The failure is also offered to the surface via
    /// [`DrawingSurface::present_error`].
    pub async fn render(
        &self,
        page: Box<dyn PageHandle>,
        scale: f32,
        surface: &mut dyn DrawingSurface,
        cancel: &CancellationToken,
    ) -> Result<RenderOutcome, PageError> {
        let number = page.number();
        match self.rasterize(page, scale, cancel).await {
            Ok(Some(image)) => {
                let frame = Frame {
                    page: number,
                    scale,
                    image,
                };
                if surface.present(frame) {
                    Ok(RenderOutcome::Presented)
                } else {
                    Ok(RenderOutcome::Superseded)
                }
            }
            Ok(None) => Ok(RenderOutcome::Cancelled),
            Err(e) => {
                if surface.present_error(&e) {
                    warn!("{}", e);
                }
                Err(e)
            }
        }
    }

    /// Fetch page `number` of `document` and render it on a task spawned
    /// onto `runtime`. Callable from any thread.
    pub fn spawn<S>(
        &self,
        runtime: &Handle,
        document: Arc<dyn DocumentHandle>,
        number: usize,
        scale: f32,
        mut surface: S,
    ) -> RenderTask
    where
        S: DrawingSurface + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let renderer = *self;

        let handle = runtime.spawn(async move {
            if token.is_cancelled() {
                return Ok(RenderOutcome::Cancelled);
            }
            let page = match document.page(number).await {
                Ok(page) => page,
                Err(e) => {
                    let err = e.into_render_error(number);
                    surface.present_error(&err);
                    return Err(err);
                }
            };
            renderer.render(page, scale, &mut surface, &token).await
        });

        RenderTask {
            page: number,
            scale,
            cancel,
            handle,
        }
    }
}

/// An in-flight render started by [`PageRenderer::spawn`].
#[derive(Debug)]
pub struct RenderTask {
    page: usize,
    scale: f32,
    cancel: CancellationToken,
    handle: JoinHandle<Result<RenderOutcome, PageError>>,
}

impl RenderTask {
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request cancellation and drop the task's page. Safe to call on a
    /// finished task and safe to call repeatedly.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.handle.abort();
    }

    /// Wait for the task to end.
    pub async fn wait(self) -> Result<RenderOutcome, PageError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(RenderOutcome::Cancelled),
            Err(e) => Err(PageError::RenderFailed {
                page: self.page,
                detail: format!("render task panicked: {e}"),
            }),
        }
    }
}
