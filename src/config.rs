//! Configuration types for viewing and converting documents.
//!
//! Conversion behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. The interactive components take the
//! smaller [`ViewerConfig`] and [`ThumbnailConfig`], which are plain structs
//! with defaults, validated when the component that uses them is created.
//!
//! Setters clamp out-of-range values; `build()` still validates so a config
//! assembled by hand (struct literal, deserialised JSON) is caught too.

use crate::error::Pdf2DocxError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest accepted encoding quality.
pub const MIN_QUALITY: f32 = 0.5;
/// Highest accepted encoding quality.
pub const MAX_QUALITY: f32 = 1.0;

/// Configuration for a document conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2docx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .quality(0.9)
///     .output_name("report.docx")
///     .build()
///     .unwrap();
/// assert_eq!(config.quality, 0.9);
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// JPEG quality for page images, 0.5–1.0. Default: 0.85.
    ///
    /// Below 0.5 scanned text turns to mush; 1.0 roughly triples file size
    /// for no visible gain on screen.
    pub quality: f32,

    /// Rasterisation scale for page images. Range: 0.5–4.0. Default: 2.0.
    ///
    /// 2× keeps text crisp when the Word document is zoomed or printed.
    pub render_scale: f32,

    /// Yield to the scheduler after every N rendered pages. Default: 3.
    pub yield_every: usize,

    /// Width in pixels of the page-1 preview thumbnail. Default: 240.
    pub preview_width: u32,

    /// Paper size of the output document. Default: Letter.
    pub page_size: PaperSize,

    /// File name of the output document. If None, `<stem>_converted.docx`.
    pub output_name: Option<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality: 0.85,
            render_scale: 2.0,
            yield_every: 3,
            preview_width: 240,
            page_size: PaperSize::default(),
            output_name: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("quality", &self.quality)
            .field("render_scale", &self.render_scale)
            .field("yield_every", &self.yield_every)
            .field("preview_width", &self.preview_width)
            .field("page_size", &self.page_size)
            .field("output_name", &self.output_name)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// JPEG quality as the 1–100 integer the encoder wants.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality.clamp(MIN_QUALITY, MAX_QUALITY) * 100.0).round() as u8
    }

    /// Output file name for a source called `source_name`, written by a
    /// builder whose files end in `extension`.
    ///
    /// Uses `output_name` when set, otherwise `<stem>_converted.<extension>`.
    pub fn output_file_name(&self, source_name: &str, extension: &str) -> String {
        if let Some(name) = &self.output_name {
            return name.clone();
        }
        let stem = std::path::Path::new(source_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("document");
        format!("{stem}_converted.{extension}")
    }

    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<(), Pdf2DocxError> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.quality) {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "Quality must be {MIN_QUALITY}–{MAX_QUALITY}, got {}",
                self.quality
            )));
        }
        if !(0.5..=4.0).contains(&self.render_scale) {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "Render scale must be 0.5–4.0, got {}",
                self.render_scale
            )));
        }
        if self.yield_every == 0 {
            return Err(Pdf2DocxError::InvalidConfig(
                "yield_every must be ≥ 1".into(),
            ));
        }
        if self.preview_width == 0 {
            return Err(Pdf2DocxError::InvalidConfig(
                "Preview width must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn quality(mut self, q: f32) -> Self {
        self.config.quality = if q.is_nan() {
            ConversionConfig::default().quality
        } else {
            q.clamp(MIN_QUALITY, MAX_QUALITY)
        };
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = if scale.is_nan() {
            ConversionConfig::default().render_scale
        } else {
            scale.clamp(0.5, 4.0)
        };
        self
    }

    pub fn yield_every(mut self, pages: usize) -> Self {
        self.config.yield_every = pages.max(1);
        self
    }

    pub fn preview_width(mut self, px: u32) -> Self {
        self.config.preview_width = px.max(16);
        self
    }

    pub fn page_size(mut self, size: PaperSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.config.output_name = Some(name.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2DocxError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Paper size of the generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    /// US Letter, 8.5 × 11 in. (default)
    #[default]
    Letter,
    /// ISO A4, 210 × 297 mm.
    A4,
}

impl PaperSize {
    /// Width and height in twentieths of a point (twips).
    pub fn twips(self) -> (u32, u32) {
        match self {
            PaperSize::Letter => (12240, 15840),
            PaperSize::A4 => (11906, 16838),
        }
    }
}

impl std::str::FromStr for PaperSize {
    type Err = Pdf2DocxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "letter" => Ok(PaperSize::Letter),
            "a4" => Ok(PaperSize::A4),
            other => Err(Pdf2DocxError::InvalidConfig(format!(
                "Unknown paper size '{other}' (expected letter or a4)"
            ))),
        }
    }
}

// ── Interactive components ───────────────────────────────────────────────

/// Zoom range and rendering options for [`crate::viewer::ViewerController`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Zoom grid; every accepted zoom is `min_zoom + k * zoom_step`.
    pub zoom_step: f32,
    /// Multiplied into the zoom to get the render scale.
    pub device_pixel_ratio: f32,
    /// Warm page n+1 after every navigation.
    pub prefetch: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 3.0,
            zoom_step: 0.25,
            device_pixel_ratio: 1.0,
            prefetch: true,
        }
    }
}

/// `value` is finite and strictly positive.
fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

impl ViewerConfig {
    /// Check the zoom range, grid and pixel ratio.
    pub fn validate(&self) -> Result<(), Pdf2DocxError> {
        if !positive(self.min_zoom) || !positive(self.max_zoom) {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "Zoom range must be positive, got {}–{}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.min_zoom > self.max_zoom {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "min_zoom ({}) must not exceed max_zoom ({})",
                self.min_zoom, self.max_zoom
            )));
        }
        if !positive(self.zoom_step) {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "Zoom step must be > 0, got {}",
                self.zoom_step
            )));
        }
        if !positive(self.device_pixel_ratio) {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "Device pixel ratio must be > 0, got {}",
                self.device_pixel_ratio
            )));
        }
        Ok(())
    }

    /// Clamp `zoom` into range and snap it to the grid.
    ///
    /// Non-finite input yields `fallback`.
    pub fn snap_zoom(&self, zoom: f32, fallback: f32) -> f32 {
        if !zoom.is_finite() {
            return fallback;
        }
        let clamped = zoom.clamp(self.min_zoom, self.max_zoom);
        let steps = ((clamped - self.min_zoom) / self.zoom_step).round();
        (self.min_zoom + steps * self.zoom_step).clamp(self.min_zoom, self.max_zoom)
    }
}

/// Geometry and render scale for [`crate::thumbnail::ThumbnailCache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Fixed render scale, independent of the viewer zoom.
    pub scale: f32,
    /// How far outside the viewport a thumbnail counts as visible.
    pub visibility_margin_px: f32,
    /// Height of one thumbnail row in the strip, including spacing.
    pub item_height_px: f32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            scale: 0.3,
            visibility_margin_px: 100.0,
            item_height_px: 260.0,
        }
    }
}

impl ThumbnailConfig {
    pub fn validate(&self) -> Result<(), Pdf2DocxError> {
        if !positive(self.scale) {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "Thumbnail scale must be > 0, got {}",
                self.scale
            )));
        }
        if !positive(self.item_height_px) {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "Thumbnail row height must be > 0, got {}",
                self.item_height_px
            )));
        }
        if !(self.visibility_margin_px.is_finite() && self.visibility_margin_px >= 0.0) {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "Visibility margin must be ≥ 0, got {}",
                self.visibility_margin_px
            )));
        }
        Ok(())
    }
}
