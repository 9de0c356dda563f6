//! Error types for the edgequake-pdf2docx library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`Pdf2DocxError`] — **Fatal** for the operation that returned it: the
//!   document cannot be opened, a conversion job cannot finish, the output
//!   cannot be written. A conversion job that hits one of these moves its
//!   state machine to `error` and keeps the message for display.
//!
//! * [`PageError`] — **Non-fatal** in the viewer: a single page failed to
//!   rasterise or yield its text. The viewer reports it as a transient notice
//!   and stays usable. The conversion pipeline promotes it to
//!   [`Pdf2DocxError::RenderFailed`] because its output must be complete.
//!
//! * [`SourceError`] — what a [`crate::source::DocumentSource`] backend
//!   reports. It is mapped into one of the two above at the seam.
//!
//! Cancellation of a superseded render is **not** an error anywhere in this
//! crate; it is reported as [`crate::render::RenderOutcome::Cancelled`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2docx library.
#[derive(Debug, Error)]
pub enum Pdf2DocxError {
    // ── Document errors ───────────────────────────────────────────────────
    /// The bytes could not be decoded as a document.
    #[error("Document could not be loaded: {detail}\nThe file may be corrupt or not a PDF.")]
    DocumentLoadFailed { detail: String },

    /// The document is encrypted. Password entry is not supported.
    #[error("Document is password-protected.\nRemove the password (e.g. qpdf --decrypt in.pdf out.pdf) and try again.")]
    PasswordProtected,

    /// A specific page could not be rasterised or its text read.
    #[error("Rendering failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Assembling or serialising the output document failed.
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read the input file.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file library could not be read or written.
    #[error("File library '{path}' is unusable: {detail}")]
    LibraryFailed { path: PathBuf, detail: String },

    // ── State errors ──────────────────────────────────────────────────────
    /// A conversion state-machine edge that does not exist was requested.
    #[error("Invalid conversion transition: {from} → {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Decoder binding errors ────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or place the library next to the\n\
binary or in ./lib, or install it system-wide.\n"
    )]
    DecoderUnavailable(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2DocxError {
    /// Stable short name of the taxonomy entry, used in JSON output and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Pdf2DocxError::DocumentLoadFailed { .. } => "document_load_failed",
            Pdf2DocxError::PasswordProtected => "password_protected",
            Pdf2DocxError::RenderFailed { .. } => "render_failed",
            Pdf2DocxError::ConversionFailed(_)
            | Pdf2DocxError::OutputWriteFailed { .. }
            | Pdf2DocxError::InputReadFailed { .. } => "conversion_failed",
            Pdf2DocxError::LibraryFailed { .. } => "library_failed",
            Pdf2DocxError::InvalidTransition { .. } => "invalid_transition",
            Pdf2DocxError::InvalidConfig(_) => "invalid_config",
            Pdf2DocxError::DecoderUnavailable(_) => "decoder_unavailable",
            Pdf2DocxError::Internal(_) => "internal",
        }
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rendering failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The page's text layer could not be read.
    #[error("Page {page}: text extraction failed: {detail}")]
    TextExtractionFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. } | PageError::TextExtractionFailed { page, .. } => {
                *page
            }
        }
    }
}

impl From<PageError> for Pdf2DocxError {
    fn from(e: PageError) -> Self {
        match e {
            PageError::RenderFailed { page, detail }
            | PageError::TextExtractionFailed { page, detail } => {
                Pdf2DocxError::RenderFailed { page, detail }
            }
        }
    }
}

/// Errors reported by a document-source backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The document needs a password.
    #[error("document is password-protected")]
    PasswordProtected,

    /// The bytes are not a readable document.
    #[error("corrupt document: {0}")]
    Corrupt(String),

    /// The requested page does not exist.
    #[error("page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// A page operation failed (rasterisation, text layer, resources).
    #[error("{0}")]
    PageFailed(String),

    /// The backend does not implement this capability.
    #[error("{0} is not supported by this document source")]
    Unsupported(&'static str),

    /// The backend library could not be initialised.
    #[error("{0}")]
    Unavailable(String),
}

impl SourceError {
    /// Map an `open` failure into the fatal taxonomy.
    pub fn into_load_error(self) -> Pdf2DocxError {
        match self {
            SourceError::PasswordProtected => Pdf2DocxError::PasswordProtected,
            SourceError::Unavailable(detail) => Pdf2DocxError::DecoderUnavailable(detail),
            other => Pdf2DocxError::DocumentLoadFailed {
                detail: other.to_string(),
            },
        }
    }

    /// Map a page-level failure into a [`PageError::RenderFailed`].
    pub fn into_render_error(self, page: usize) -> PageError {
        PageError::RenderFailed {
            page,
            detail: self.to_string(),
        }
    }
}
