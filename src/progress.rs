//! Progress events emitted by a conversion job.
//!
//! [`crate::convert::ConversionPipeline::run`] returns a [`ProgressStream`]:
//! a lazy, finite stream of [`ProgressEvent`]s. Nothing happens until the
//! stream is polled, and each poll drives the job one step further. The
//! stream ends after the event whose stage is [`Stage::Success`],
//! [`Stage::Error`] or [`Stage::Idle`] (cancelled), and cannot be restarted.
//!
//! # Example
//!
//! ```rust,no_run
//! use edgequake_pdf2docx::{ConversionPipeline, ConversionJob, PdfiumSource, DocxBuilder};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let job = ConversionJob::from_bytes("in.pdf", std::fs::read("in.pdf")?);
//! let mut pipeline = ConversionPipeline::new(
//!     Arc::new(PdfiumSource::new()),
//!     Arc::new(DocxBuilder::new()),
//!     job,
//! );
//! let mut events = pipeline.run()?;
//! while let Some(event) = events.next().await {
//!     eprintln!("[{:>3}%] {}: {}", event.progress_percent, event.stage, event.message);
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;

/// Coarse phase of a conversion job; one per state-machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Analyzing,
    Rendering,
    Generating,
    Saving,
    Success,
    Error,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Analyzing => "analyzing",
            Stage::Rendering => "rendering",
            Stage::Generating => "generating",
            Stage::Saving => "saving",
            Stage::Success => "success",
            Stage::Error => "error",
        }
    }

    /// True for stages a job does not leave on its own.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Idle | Stage::Success | Stage::Error)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    /// Human-readable status line.
    pub message: String,
    /// 0–100, never decreasing within one run.
    pub progress_percent: u8,
    /// Page this event is about, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl ProgressEvent {
    pub fn new(stage: Stage, message: impl Into<String>, progress_percent: u8) -> Self {
        Self {
            stage,
            message: message.into(),
            progress_percent: progress_percent.min(100),
            page: None,
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }
}

/// A boxed stream of progress events borrowing the pipeline that drives it.
pub type ProgressStream<'a> = Pin<Box<dyn Stream<Item = ProgressEvent> + Send + 'a>>;

/// Map `done` of `total` onto the `[start, end]` percent band.
pub(crate) fn band(start: u8, end: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return end;
    }
    let span = (end - start) as usize;
    start + (span * done.min(total) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_maps_into_range() {
        assert_eq!(band(0, 70, 0, 5), 0);
        assert_eq!(band(0, 70, 1, 5), 14);
        assert_eq!(band(0, 70, 5, 5), 70);
        assert_eq!(band(70, 95, 3, 3), 95);
        assert_eq!(band(70, 95, 9, 3), 95);
        assert_eq!(band(70, 95, 0, 0), 95);
    }

    #[test]
    fn band_is_monotonic() {
        let mut last = 0;
        for done in 0..=37 {
            let p = band(0, 70, done, 37);
            assert!(p >= last);
            last = p;
        }
    }

    #[test]
    fn event_clamps_percent() {
        let e = ProgressEvent::new(Stage::Saving, "x", 140).with_page(2);
        assert_eq!(e.progress_percent, 100);
        assert_eq!(e.page, Some(2));
    }

    #[test]
    fn stage_serialises_snake_case() {
        let json = serde_json::to_string(&Stage::Generating).unwrap();
        assert_eq!(json, "\"generating\"");
        assert!(Stage::Error.is_terminal());
        assert!(!Stage::Rendering.is_terminal());
    }
}
