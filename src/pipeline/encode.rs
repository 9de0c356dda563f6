//! Image encoding: rasterised page → JPEG for the output document, PNG for
//! previews and exported images.
//!
//! Page images go into the Word file as JPEG at the configured quality:
//! a 2× Letter page is ~1700×2200 px, which is 15 MB as raw RGBA and ~4 MB as
//! PNG, but a few hundred KB as JPEG at 0.85. The preview stays PNG because
//! it is tiny and shown as-is.

use crate::output::PreviewImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Encoding of an [`EncodedImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Jpeg,
    Png,
}

impl ImageEncoding {
    pub fn extension(self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "jpeg",
            ImageEncoding::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Png => "image/png",
        }
    }
}

/// Compressed image bytes plus pixel dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub encoding: ImageEncoding,
    pub width: u32,
    pub height: u32,
}

/// Encode a rasterised page as JPEG at `quality` (1–100).
///
/// JPEG has no alpha channel, so transparent areas are flattened onto white
/// first; pdfium renders page backgrounds opaque, but embedded scans with
/// alpha would otherwise turn black.
pub fn encode_jpeg(img: &RgbaImage, quality: u8) -> Result<EncodedImage, image::ImageError> {
    let mut flattened = img.clone();
    for pixel in flattened.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a < 255 {
            let blend = |c: u8| ((c as u16 * a as u16 + 255 * (255 - a as u16)) / 255) as u8;
            pixel.0 = [blend(r), blend(g), blend(b), 255];
        }
    }
    let rgb = DynamicImage::ImageRgba8(flattened).to_rgb8();

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    debug!(
        "Encoded {}x{} page → {} bytes JPEG (q={})",
        rgb.width(),
        rgb.height(),
        buf.len(),
        quality
    );

    Ok(EncodedImage {
        data: buf,
        encoding: ImageEncoding::Jpeg,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Encode any image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(EncodedImage {
        data: buf,
        encoding: ImageEncoding::Png,
        width: img.width(),
        height: img.height(),
    })
}

/// Downscale `img` to `width` (keeping aspect) and wrap it as a PNG data URI.
///
/// Images narrower than `width` are not upscaled.
pub fn preview(img: &RgbaImage, width: u32) -> Result<PreviewImage, image::ImageError> {
    let source = DynamicImage::ImageRgba8(img.clone());
    let thumb = if img.width() > width && width > 0 {
        let height = ((img.height() as u64 * width as u64) / img.width() as u64).max(1) as u32;
        source.resize_exact(width, height, FilterType::Triangle)
    } else {
        source
    };

    let png = encode_png(&thumb)?;
    let b64 = STANDARD.encode(&png.data);
    debug!("Encoded preview → {} bytes base64", b64.len());

    Ok(PreviewImage {
        width: png.width,
        height: png.height,
        data_uri: format!("data:{};base64,{}", png.encoding.mime_type(), b64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn page(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255]))
    }

    #[test]
    fn jpeg_has_soi_marker_and_dimensions() {
        let enc = encode_jpeg(&page(40, 30), 85).expect("encode should succeed");
        assert_eq!(&enc.data[..2], &[0xFF, 0xD8]);
        assert_eq!((enc.width, enc.height), (40, 30));
        assert_eq!(enc.encoding.extension(), "jpeg");
    }

    #[test]
    fn higher_quality_is_not_smaller() {
        let mut img = page(64, 64);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgba([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 8) as u8, 255]);
        }
        let low = encode_jpeg(&img, 50).unwrap();
        let high = encode_jpeg(&img, 100).unwrap();
        assert!(high.data.len() >= low.data.len());
    }

    #[test]
    fn transparent_pixels_flatten_to_white() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        let enc = encode_jpeg(&img, 100).unwrap();
        let decoded = image::load_from_memory(&enc.data).unwrap().to_rgb8();
        assert!(decoded.get_pixel(4, 4).0.iter().all(|&c| c > 240));
    }

    #[test]
    fn preview_is_downscaled_png_data_uri() {
        let p = preview(&page(480, 640), 240).unwrap();
        assert_eq!((p.width, p.height), (240, 320));
        assert!(p.data_uri.starts_with("data:image/png;base64,"));
        let b64 = p.data_uri.trim_start_matches("data:image/png;base64,");
        let png = STANDARD.decode(b64).expect("valid base64");
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn small_preview_is_not_upscaled() {
        let p = preview(&page(100, 50), 240).unwrap();
        assert_eq!((p.width, p.height), (100, 50));
    }
}
