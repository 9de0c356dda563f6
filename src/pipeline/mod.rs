//! Stages of the document conversion pipeline.
//!
//! Each submodule implements one transformation step; the state machine in
//! [`crate::convert::ConversionPipeline`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! page ──▶ render ──▶ encode ──▶ assemble ──▶ DocumentBuilder
//!          (raster +   (JPEG,     (one unit     (docx bytes)
//!           text)      preview)   per page)
//! ```
//!
//! 1. [`render`]   — rasterise one page at the configured scale and read its
//!    text layer; the only stage that talks to the decoder
//! 2. [`encode`]   — JPEG for the output document, PNG data URI for the page-1
//!    preview
//! 3. [`assemble`] — wrap each page as an output unit with its hidden text and
//!    page-break flag
//!
//! [`extract`] holds the text cleanup and naming shared with the standalone
//! extraction tools.

pub mod assemble;
pub mod encode;
pub mod extract;
pub mod render;
