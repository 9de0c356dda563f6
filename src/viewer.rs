//! Interactive page viewer: current page, zoom, fullscreen, keyboard.
//!
//! [`ViewerController`] owns one document and one [`Surface`]. Every change
//! of page or zoom goes through the same three steps:
//!
//! 1. cancel the in-flight [`RenderTask`], if any;
//! 2. advance the surface generation and spawn exactly one new render;
//! 3. warm page n+1 through [`DocumentHandle::prefetch`]. The prefetch never
//!    touches the surface.
//!
//! A render that fails leaves the previous frame on screen and shows up as
//! [`ViewState::render_notice`]; selecting the same page again retries it. A
//! document that fails to load clears the view and shows up as
//! [`ViewState::last_error`] until the next load.
//!
//! Renders are spawned onto the tokio runtime captured at construction (or
//! by the first [`ViewerController::load_document`]), so the synchronous
//! commands can be called from a thread that is not itself inside the
//! runtime, such as a UI thread.

use crate::config::ViewerConfig;
use crate::error::{PageError, Pdf2DocxError};
use crate::render::{PageRenderer, RenderOutcome, RenderTask, Surface};
use crate::source::{DocumentHandle, DocumentSource};
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why the last document load failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadFailureCause {
    /// Not a readable document.
    Corrupt,
    /// Encrypted; password entry is not supported.
    PasswordProtected,
    /// The decoder itself could not start.
    DecoderUnavailable,
}

/// Persistent load error shown by the viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadError {
    pub cause: LoadFailureCause,
    pub message: String,
}

impl From<&Pdf2DocxError> for LoadError {
    fn from(e: &Pdf2DocxError) -> Self {
        let cause = match e {
            Pdf2DocxError::PasswordProtected => LoadFailureCause::PasswordProtected,
            Pdf2DocxError::DecoderUnavailable(_) => LoadFailureCause::DecoderUnavailable,
            _ => LoadFailureCause::Corrupt,
        };
        Self {
            cause,
            message: e.to_string(),
        }
    }
}

/// Snapshot of everything a UI needs to draw the viewer chrome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub current_page: usize,
    pub page_count: usize,
    pub zoom: f32,
    pub is_fullscreen: bool,
    pub is_loading: bool,
    pub last_error: Option<LoadError>,
    /// Failure of the current page render, if it failed.
    pub render_notice: Option<PageError>,
}

/// Keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowRight,
    ArrowLeft,
    ArrowUp,
    ArrowDown,
    PageUp,
    PageDown,
    Home,
    End,
    Char(char),
}

/// Where keyboard focus is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Viewer,
    /// A text field has focus; navigation keys belong to it.
    TextInput,
}

/// What a key press asks the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    ZoomIn,
    ZoomOut,
}

impl ViewerCommand {
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::ArrowRight | Key::ArrowDown | Key::PageDown => Some(ViewerCommand::NextPage),
            Key::ArrowLeft | Key::ArrowUp | Key::PageUp => Some(ViewerCommand::PreviousPage),
            Key::Home => Some(ViewerCommand::FirstPage),
            Key::End => Some(ViewerCommand::LastPage),
            Key::Char('+') | Key::Char('=') => Some(ViewerCommand::ZoomIn),
            Key::Char('-') => Some(ViewerCommand::ZoomOut),
            Key::Char(_) => None,
        }
    }
}

/// Owns current page and zoom for one open document.
pub struct ViewerController {
    source: Arc<dyn DocumentSource>,
    renderer: PageRenderer,
    config: ViewerConfig,
    document: Option<Arc<dyn DocumentHandle>>,
    current_page: usize,
    zoom: f32,
    is_fullscreen: bool,
    is_loading: bool,
    last_error: Option<LoadError>,
    surface: Surface,
    runtime: Option<Handle>,
    active: Option<RenderTask>,
    prefetch: Option<JoinHandle<()>>,
    renders_issued: u64,
}

impl ViewerController {
    /// Create a viewer with no document.
    ///
    /// Picks up the current tokio runtime if there is one; otherwise the
    /// first `load_document` does.
    ///
    /// # Errors
    /// [`Pdf2DocxError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        source: Arc<dyn DocumentSource>,
        config: ViewerConfig,
    ) -> Result<Self, Pdf2DocxError> {
        Self::build(source, config, Handle::try_current().ok())
    }

    /// Create a viewer whose renders run on `runtime`.
    pub fn with_runtime(
        source: Arc<dyn DocumentSource>,
        config: ViewerConfig,
        runtime: Handle,
    ) -> Result<Self, Pdf2DocxError> {
        Self::build(source, config, Some(runtime))
    }

    fn build(
        source: Arc<dyn DocumentSource>,
        config: ViewerConfig,
        runtime: Option<Handle>,
    ) -> Result<Self, Pdf2DocxError> {
        config.validate()?;
        Ok(Self {
            source,
            renderer: PageRenderer::new(),
            config,
            document: None,
            current_page: 1,
            zoom: 1.0,
            is_fullscreen: false,
            is_loading: false,
            last_error: None,
            surface: Surface::new(),
            runtime,
            active: None,
            prefetch: None,
            renders_issued: 0,
        })
    }

    // ── Observable state ─────────────────────────────────────────────────

    pub fn state(&self) -> ViewState {
        ViewState {
            current_page: self.current_page,
            page_count: self.page_count(),
            zoom: self.zoom,
            is_fullscreen: self.is_fullscreen,
            is_loading: self.is_loading,
            last_error: self.last_error.clone(),
            render_notice: self.surface.notice(),
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, |d| d.page_count())
    }

    pub fn last_error(&self) -> Option<&LoadError> {
        self.last_error.as_ref()
    }

    /// The surface renders land on.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Render scale for the current zoom.
    pub fn render_scale(&self) -> f32 {
        self.zoom * self.config.device_pixel_ratio
    }

    /// Number of renders started since construction.
    pub fn renders_issued(&self) -> u64 {
        self.renders_issued
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Replace the open document with one decoded from `bytes`.
    ///
    /// The previous document and its frame are dropped before decoding
    /// starts, so a failed load never leaves stale content visible.
    pub async fn load_document(&mut self, bytes: Vec<u8>) -> Result<(), Pdf2DocxError> {
        self.cancel_render();
        self.document = None;
        self.surface.clear();
        self.current_page = 1;
        self.zoom = 1.0;
        self.last_error = None;
        self.is_loading = true;
        if self.runtime.is_none() {
            self.runtime = Handle::try_current().ok();
        }

        let result = self.source.open(bytes).await;
        self.is_loading = false;

        match result {
            Ok(document) => {
                info!("Viewer loaded document: {} pages", document.page_count());
                self.document = Some(document);
                self.issue_render();
                Ok(())
            }
            Err(e) => {
                let err = e.into_load_error();
                warn!("Viewer failed to load document: {}", err);
                self.last_error = Some(LoadError::from(&err));
                Err(err)
            }
        }
    }

    /// Close the document and clear the surface.
    pub fn close(&mut self) {
        self.cancel_render();
        self.document = None;
        self.surface.clear();
        self.current_page = 1;
    }

    /// Go to page `n`, clamped to the document. No-op without a document
    /// or when `n` is already shown.
    pub fn set_page(&mut self, n: usize) {
        let count = self.page_count();
        if count == 0 {
            return;
        }
        let page = n.clamp(1, count);
        if page == self.current_page && self.has_view() {
            return;
        }
        debug!("Viewer page {} → {}", self.current_page, page);
        self.current_page = page;
        self.issue_render();
    }

    /// Set the zoom, clamped to the configured range and snapped to the
    /// zoom grid.
    pub fn set_zoom(&mut self, zoom: f32) {
        let zoom = self.config.snap_zoom(zoom, self.zoom);
        if zoom == self.zoom && self.has_view() {
            return;
        }
        debug!("Viewer zoom {} → {}", self.zoom, zoom);
        self.zoom = zoom;
        if self.page_count() > 0 {
            self.issue_render();
        }
    }

    pub fn next_page(&mut self) {
        self.set_page(self.current_page.saturating_add(1));
    }

    pub fn previous_page(&mut self) {
        self.set_page(self.current_page.saturating_sub(1).max(1));
    }

    pub fn first_page(&mut self) {
        self.set_page(1);
    }

    pub fn last_page(&mut self) {
        self.set_page(self.page_count());
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + self.config.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - self.config.zoom_step);
    }

    /// Flip fullscreen. Does not re-render.
    pub fn toggle_fullscreen(&mut self) -> bool {
        self.is_fullscreen = !self.is_fullscreen;
        self.is_fullscreen
    }

    /// Apply the command bound to `key`. Returns the command applied, or
    /// `None` when the key is unbound or focus is in a text input.
    pub fn handle_key(&mut self, key: Key, focus: Focus) -> Option<ViewerCommand> {
        if focus == Focus::TextInput {
            return None;
        }
        let command = ViewerCommand::from_key(key)?;
        self.apply(command);
        Some(command)
    }

    pub fn apply(&mut self, command: ViewerCommand) {
        match command {
            ViewerCommand::NextPage => self.next_page(),
            ViewerCommand::PreviousPage => self.previous_page(),
            ViewerCommand::FirstPage => self.first_page(),
            ViewerCommand::LastPage => self.last_page(),
            ViewerCommand::ZoomIn => self.zoom_in(),
            ViewerCommand::ZoomOut => self.zoom_out(),
        }
    }

    /// Wait for the current render and prefetch to finish.
    ///
    /// Returns the outcome of the current render, or `None` if nothing was
    /// in flight.
    pub async fn settle(&mut self) -> Option<Result<RenderOutcome, PageError>> {
        if let Some(prefetch) = self.prefetch.take() {
            let _ = prefetch.await;
        }
        let task = self.active.take()?;
        Some(task.wait().await)
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// True when the surface already shows, or is about to show, the
    /// current page at the current scale. A failed render never counts.
    fn has_view(&self) -> bool {
        if self.surface.notice().is_some() {
            return false;
        }
        let scale = self.render_scale();
        let matches = |page: usize, s: f32| page == self.current_page && s == scale;
        match &self.active {
            Some(task) => matches(task.page(), task.scale()),
            None => self
                .surface
                .frame_info()
                .is_some_and(|f| matches(f.page, f.scale)),
        }
    }

    fn cancel_render(&mut self) {
        if let Some(task) = self.active.take() {
            task.cancel();
        }
        if let Some(prefetch) = self.prefetch.take() {
            prefetch.abort();
        }
    }

    fn issue_render(&mut self) {
        let Some(document) = self.document.clone() else {
            return;
        };
        if document.page_count() == 0 {
            return;
        }
        let Some(runtime) = self.runtime.clone() else {
            warn!("No tokio runtime available; page {} not rendered", self.current_page);
            return;
        };

        self.cancel_render();
        let generation = self.surface.advance();
        let page = self.current_page;
        let scale = self.render_scale();
        debug!(
            "Issuing render of page {} at {:.2}x (generation {})",
            page, scale, generation
        );
        self.active = Some(self.renderer.spawn(
            &runtime,
            Arc::clone(&document),
            page,
            scale,
            self.surface.lease(),
        ));
        self.renders_issued += 1;

        let next = page + 1;
        if self.config.prefetch && next <= document.page_count() {
            self.prefetch = Some(runtime.spawn(async move {
                if let Err(e) = document.prefetch(next).await {
                    debug!("Prefetch of page {} failed: {}", next, e);
                }
            }));
        }
    }
}

impl Drop for ViewerController {
    fn drop(&mut self) {
        self.cancel_render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_bindings() {
        use ViewerCommand::*;
        let cases = [
            (Key::ArrowRight, Some(NextPage)),
            (Key::ArrowDown, Some(NextPage)),
            (Key::PageDown, Some(NextPage)),
            (Key::ArrowLeft, Some(PreviousPage)),
            (Key::ArrowUp, Some(PreviousPage)),
            (Key::PageUp, Some(PreviousPage)),
            (Key::Home, Some(FirstPage)),
            (Key::End, Some(LastPage)),
            (Key::Char('+'), Some(ZoomIn)),
            (Key::Char('='), Some(ZoomIn)),
            (Key::Char('-'), Some(ZoomOut)),
            (Key::Char('x'), None),
        ];
        for (key, expected) in cases {
            assert_eq!(ViewerCommand::from_key(key), expected, "{key:?}");
        }
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        struct NoSource;

        #[async_trait::async_trait]
        impl DocumentSource for NoSource {
            async fn open(
                &self,
                _bytes: Vec<u8>,
            ) -> Result<Arc<dyn DocumentHandle>, crate::error::SourceError> {
                Err(crate::error::SourceError::Corrupt("empty".into()))
            }
        }

        let config = ViewerConfig {
            min_zoom: 3.0,
            max_zoom: 0.5,
            ..Default::default()
        };
        let err = ViewerController::new(Arc::new(NoSource), config).err().unwrap();
        assert_eq!(err.kind(), "invalid_config");

        let config = ViewerConfig {
            zoom_step: 0.0,
            ..Default::default()
        };
        assert!(ViewerController::new(Arc::new(NoSource), config).is_err());
        assert!(ViewerController::new(Arc::new(NoSource), ViewerConfig::default()).is_ok());
    }

    #[test]
    fn load_error_cause() {
        let e = LoadError::from(&Pdf2DocxError::PasswordProtected);
        assert_eq!(e.cause, LoadFailureCause::PasswordProtected);
        let e = LoadError::from(&Pdf2DocxError::DocumentLoadFailed {
            detail: "bad".into(),
        });
        assert_eq!(e.cause, LoadFailureCause::Corrupt);
        assert!(e.message.contains("bad"));
    }
}
