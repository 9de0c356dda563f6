//! In-memory document source for integration tests.
//!
//! `FakeSource` decodes nothing: the bytes passed to `open` are ignored and
//! the document shape comes from a [`FakeDoc`]. Every render, prefetch and
//! page release is recorded in a shared [`Probe`] so tests can assert on
//! exactly what the component under test asked the decoder for.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pdf2docx::{
    CancellationToken, DocumentHandle, DocumentSource, PageHandle, PageSize, SourceError,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Route library logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Shape of the fake document.
#[derive(Debug, Clone)]
pub struct FakeDoc {
    pub pages: usize,
    pub password: bool,
    pub corrupt: bool,
    /// Size of every page at scale 1.0.
    pub page_size: PageSize,
    /// How long one render takes.
    pub render_delay: Duration,
    /// Embedded images per page; `None` means the capability is unsupported.
    pub images_per_page: Option<usize>,
    /// Pages that have no text layer.
    pub blank_text_pages: Vec<usize>,
}

impl Default for FakeDoc {
    fn default() -> Self {
        Self {
            pages: 1,
            password: false,
            corrupt: false,
            page_size: PageSize::new(60.0, 80.0),
            render_delay: Duration::ZERO,
            images_per_page: None,
            blank_text_pages: Vec::new(),
        }
    }
}

impl FakeDoc {
    pub fn pages(pages: usize) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }
}

/// Everything the decoder was asked to do.
#[derive(Debug, Default)]
pub struct Probe {
    pub opens: AtomicUsize,
    pub pages_fetched: AtomicUsize,
    pub pages_dropped: AtomicUsize,
    /// `(page, scale)` of every render that started.
    pub renders_started: Mutex<Vec<(usize, f32)>>,
    /// `(page, scale)` of every render that produced pixels.
    pub renders_completed: Mutex<Vec<(usize, f32)>>,
    pub prefetched: Mutex<Vec<usize>>,
    /// Pages whose render currently fails. Mutable mid-test.
    pub failing: Mutex<HashSet<usize>>,
    /// Treat every later `open` as corrupt.
    pub reject_opens: AtomicBool,
}

impl Probe {
    pub fn started(&self) -> Vec<(usize, f32)> {
        self.renders_started.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<(usize, f32)> {
        self.renders_completed.lock().unwrap().clone()
    }

    pub fn started_pages(&self) -> Vec<usize> {
        self.started().into_iter().map(|(p, _)| p).collect()
    }

    pub fn prefetched(&self) -> Vec<usize> {
        self.prefetched.lock().unwrap().clone()
    }

    pub fn fail_page(&self, page: usize) {
        self.failing.lock().unwrap().insert(page);
    }

    pub fn heal_all(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Every fetched page handle has been dropped.
    pub fn all_pages_released(&self) -> bool {
        self.pages_fetched.load(Ordering::SeqCst) == self.pages_dropped.load(Ordering::SeqCst)
    }
}

/// The text every page reports.
pub fn page_text(page: usize) -> String {
    format!("Page {page} text")
}

#[derive(Debug, Clone)]
pub struct FakeSource {
    doc: FakeDoc,
    probe: Arc<Probe>,
}

impl FakeSource {
    pub fn new(doc: FakeDoc) -> Self {
        init_tracing();
        Self {
            doc,
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }

    pub fn arc(self) -> (Arc<dyn DocumentSource>, Arc<Probe>) {
        let probe = self.probe();
        let source: Arc<dyn DocumentSource> = Arc::new(self);
        (source, probe)
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn open(&self, _bytes: Vec<u8>) -> Result<Arc<dyn DocumentHandle>, SourceError> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.doc.password {
            return Err(SourceError::PasswordProtected);
        }
        if self.doc.corrupt || self.probe.reject_opens.load(Ordering::SeqCst) {
            return Err(SourceError::Corrupt("missing %PDF header".into()));
        }
        Ok(Arc::new(FakeDocument {
            doc: self.doc.clone(),
            probe: self.probe(),
        }))
    }
}

pub struct FakeDocument {
    doc: FakeDoc,
    probe: Arc<Probe>,
}

impl FakeDocument {
    /// Open a fake document directly, bypassing the source.
    pub fn handle(doc: FakeDoc) -> (Arc<dyn DocumentHandle>, Arc<Probe>) {
        init_tracing();
        let probe = Arc::new(Probe::default());
        let handle: Arc<dyn DocumentHandle> = Arc::new(FakeDocument {
            doc,
            probe: Arc::clone(&probe),
        });
        (handle, probe)
    }
}

#[async_trait]
impl DocumentHandle for FakeDocument {
    fn page_count(&self) -> usize {
        self.doc.pages
    }

    async fn page(&self, number: usize) -> Result<Box<dyn PageHandle>, SourceError> {
        if number == 0 || number > self.doc.pages {
            return Err(SourceError::PageOutOfRange {
                page: number,
                total: self.doc.pages,
            });
        }
        self.probe.pages_fetched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            number,
            doc: self.doc.clone(),
            probe: Arc::clone(&self.probe),
        }))
    }

    async fn prefetch(&self, number: usize) -> Result<(), SourceError> {
        self.probe.prefetched.lock().unwrap().push(number);
        Ok(())
    }
}

struct FakePage {
    number: usize,
    doc: FakeDoc,
    probe: Arc<Probe>,
}

impl Drop for FakePage {
    fn drop(&mut self) {
        self.probe.pages_dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageHandle for FakePage {
    fn number(&self) -> usize {
        self.number
    }

    fn base_size(&self) -> PageSize {
        self.doc.page_size
    }

    async fn render(
        &self,
        scale: f32,
        cancel: &CancellationToken,
    ) -> Result<RgbaImage, SourceError> {
        self.probe
            .renders_started
            .lock()
            .unwrap()
            .push((self.number, scale));

        if self.doc.render_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.doc.render_delay).await;
        }
        if cancel.is_cancelled() {
            return Err(SourceError::PageFailed("cancelled".into()));
        }
        if self.probe.failing.lock().unwrap().contains(&self.number) {
            return Err(SourceError::PageFailed("simulated decoder fault".into()));
        }

        let (w, h) = self.size(scale).pixels();
        let shade = (self.number * 10 % 256) as u8;
        self.probe
            .renders_completed
            .lock()
            .unwrap()
            .push((self.number, scale));
        Ok(RgbaImage::from_pixel(w, h, Rgba([shade, 128, 255 - shade, 255])))
    }

    async fn extract_text(&self) -> Result<String, SourceError> {
        if self.doc.blank_text_pages.contains(&self.number) {
            return Ok(String::new());
        }
        Ok(page_text(self.number))
    }

    async fn extract_images(&self) -> Result<Vec<DynamicImage>, SourceError> {
        match self.doc.images_per_page {
            None => Err(SourceError::Unsupported("embedded image extraction")),
            Some(n) => Ok((0..n)
                .map(|i| DynamicImage::new_rgb8(4 + i as u32, 3))
                .collect()),
        }
    }
}
