//! Text-layer cleanup and export naming.

use crate::error::PageError;
use crate::source::PageHandle;

/// Read and clean the text layer of `page`.
pub async fn page_text(page: &dyn PageHandle) -> Result<String, PageError> {
    let number = page.number();
    let raw = page
        .extract_text()
        .await
        .map_err(|e| PageError::TextExtractionFailed {
            page: number,
            detail: e.to_string(),
        })?;
    Ok(clean_text(&raw))
}

/// Normalise extracted text so it is safe to embed in XML and pleasant to
/// search.
///
/// Rules:
/// 1. CRLF / CR → LF
/// 2. Control characters other than LF and TAB are dropped, as are the
///    noncharacters U+FFFE and U+FFFF (XML 1.0 forbids them, and pdfium
///    emits stray form feeds)
/// 3. Trailing whitespace is trimmed per line
/// 4. Runs of blank lines collapse to one
/// 5. Leading and trailing blank lines are removed
pub fn clean_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(normalized.len());
    let mut blank_run = 0;
    for line in normalized.lines() {
        let line: String = line
            .chars()
            .filter(|c| {
                *c == '\t' || !(c.is_control() || matches!(c, '\u{FFFE}' | '\u{FFFF}'))
            })
            .collect();
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_matches('\n').to_string()
}

/// `page-N.png`
pub fn page_image_name(page: usize) -> String {
    format!("page-{page}.png")
}

/// `page-N-image-M.png` (both 1-indexed)
pub fn embedded_image_name(page: usize, index: usize) -> String {
    format!("page-{page}-image-{index}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_line_endings_and_controls() {
        let raw = "Title\r\n\r\n\r\nBody\x0c text  \rEnd\x00";
        assert_eq!(clean_text(raw), "Title\n\nBody text\nEnd");
        assert_eq!(clean_text("a\u{FFFE}b\u{0b}c"), "abc");
    }

    #[test]
    fn keeps_tabs_and_unicode() {
        assert_eq!(clean_text("a\tb — ü"), "a\tb — ü");
    }

    #[test]
    fn empty_and_blank_input() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("\n\n  \n"), "");
    }

    #[test]
    fn export_names() {
        assert_eq!(page_image_name(3), "page-3.png");
        assert_eq!(embedded_image_name(2, 1), "page-2-image-1.png");
    }
}
