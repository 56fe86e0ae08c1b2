//! Plain-text extraction from uploaded teaser PDFs.

use tracing::{debug, info_span, warn};

/// Pulls text out of raw PDF bytes.
///
/// Never fails: a document that cannot be read yields an empty string, and
/// the run continues without analysis.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, pdf_bytes: &[u8]) -> String;
}

/// Page-by-page text extraction through lopdf. No OCR.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> String {
        let _span = info_span!("extract.pdf", bytes = pdf_bytes.len()).entered();

        let doc = match lopdf::Document::load_mem(pdf_bytes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Failed to parse PDF; continuing without text");
                return String::new();
            }
        };

        let mut text = String::new();
        for (page_num, _) in doc.get_pages() {
            match doc.extract_text(&[page_num]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => debug!(page = page_num, error = %e, "Skipping unreadable page"),
            }
        }

        if !is_usable_text(&text) {
            warn!("Extracted text is empty or garbled; discarding it");
            return String::new();
        }
        text.trim().to_string()
    }
}

/// Marker lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Below this many characters the alphanumeric ratio is not checked.
const MIN_TOTAL_CHARS: usize = 50;

const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// False for empty text, text made only of font-decoding markers, and text
/// that is mostly non-alphanumeric noise.
pub fn is_usable_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return false;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
    !(total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT)
}
