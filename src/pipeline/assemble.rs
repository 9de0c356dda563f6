//! Generating stage: captured pages → ordered output units.
//!
//! One unit per page, in page order. Every unit except the last ends with a
//! page break, so the output has exactly as many pages as the source.

use crate::docx::OutputUnit;
use crate::pipeline::render::CapturedPage;

/// Turn one captured page into its output unit.
pub fn unit_for(page: CapturedPage, is_last: bool) -> OutputUnit {
    OutputUnit {
        page: page.number,
        image: page.image,
        hidden_text: page.text,
        page_break_after: !is_last,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::{EncodedImage, ImageEncoding};

    fn captured(number: usize) -> CapturedPage {
        CapturedPage {
            number,
            image: EncodedImage {
                data: vec![0xFF, 0xD8],
                encoding: ImageEncoding::Jpeg,
                width: 10,
                height: 10,
            },
            text: format!("text {number}"),
            preview: None,
        }
    }

    #[test]
    fn page_break_after_all_but_last() {
        let units: Vec<OutputUnit> = (1..=4).map(|n| unit_for(captured(n), n == 4)).collect();
        assert_eq!(
            units.iter().map(|u| u.page_break_after).collect::<Vec<_>>(),
            vec![true, true, true, false]
        );
        assert_eq!(
            units.iter().map(|u| u.page).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(units[2].hidden_text, "text 3");
    }

    #[test]
    fn single_page_has_no_break() {
        assert!(!unit_for(captured(1), true).page_break_after);
    }
}
