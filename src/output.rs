//! Result types returned by conversions and the extraction tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Small PNG of page 1, base64-encoded as a `data:` URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewImage {
    pub width: u32,
    pub height: u32,
    /// `data:image/png;base64,…`
    pub data_uri: String,
}

/// What a finished conversion reports upward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub page_count: usize,
    pub file_size_bytes: u64,
    pub preview_image: Option<PreviewImage>,
}

/// Timing and size statistics for one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub render_duration_ms: u64,
    pub generate_duration_ms: u64,
    pub save_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Characters of extracted text carried into the output.
    pub text_chars: usize,
    /// Pages whose text layer was empty.
    pub pages_without_text: usize,
}

/// Complete result of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    #[serde(flatten)]
    pub summary: ConversionSummary,
    /// Output file name (`<stem>_converted.docx` unless configured).
    pub file_name: String,
    /// Where the document was written, when the job targeted a file.
    pub path: Option<PathBuf>,
    pub stats: ConversionStats,
    /// Serialized output document.
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ConversionOutput {
    pub fn page_count(&self) -> usize {
        self.summary.page_count
    }

    pub fn file_size_bytes(&self) -> u64 {
        self.summary.file_size_bytes
    }
}

/// Basic facts about a document, as reported by `inspect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub file_size_bytes: u64,
    /// Page sizes at scale 1.0, in points.
    pub pages: Vec<PageInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: usize,
    pub width: f32,
    pub height: f32,
}

/// Text layer of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub page: usize,
    pub text: String,
}

/// Text layer of a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextExtraction {
    pub pages: Vec<PageText>,
}

impl TextExtraction {
    /// All pages as one dump, each headed `--- Page N ---`.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            out.push_str(&format!("--- Page {} ---\n{}\n\n", page.page, page.text));
        }
        out
    }
}

/// A PNG produced by `rasterize_pages` or `extract_embedded_images`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedImage {
    /// `page-N.png` or `page-N-image-M.png`.
    pub file_name: String,
    pub page: usize,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub png: Vec<u8>,
}

/// Human-readable byte count: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB`.
///
/// Uses 1024-based units with up to two decimals and no trailing zeros.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exp = 0;
    while exp + 1 < UNITS.len() && bytes >= 1u64 << (10 * (exp + 1)) {
        exp += 1;
    }
    let value = bytes as f64 / (1u64 << (10 * exp)) as f64;
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exp])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
        // Larger than the last unit stays in GB.
        assert_eq!(format_file_size(2048 * 1024 * 1024 * 1024), "2048 GB");
    }

    #[test]
    fn text_dump_has_page_headers() {
        let t = TextExtraction {
            pages: vec![
                PageText {
                    page: 1,
                    text: "alpha".into(),
                },
                PageText {
                    page: 2,
                    text: String::new(),
                },
            ],
        };
        assert_eq!(t.to_text(), "--- Page 1 ---\nalpha\n\n--- Page 2 ---\n\n\n");
    }

    #[test]
    fn output_serialises_flat_summary_without_bytes() {
        let out = ConversionOutput {
            summary: ConversionSummary {
                page_count: 3,
                file_size_bytes: 10,
                preview_image: None,
            },
            file_name: "a_converted.docx".into(),
            path: None,
            stats: ConversionStats::default(),
            bytes: vec![1, 2, 3],
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["page_count"], 3);
        assert!(json.get("bytes").is_none());
    }
}
