//! Text extraction: read the PDF as one linear text stream and drop the
//! bibliography.
//!
//! Layout is ignored on purpose. Page texts are concatenated in page order
//! and everything from the first literal references heading onward is cut,
//! since the bibliography is never annotated.
//!
//! pdfium is not async-safe, so the pipeline calls [`TextExtractor::extract`]
//! inside `spawn_blocking`.

use crate::error::PaperError;
use std::path::Path;
use tracing::{debug, info};

/// Turns a PDF file into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract the full text, references included.
    fn extract(&self, path: &Path, password: Option<&str>) -> Result<String, PaperError>;
}

/// [`TextExtractor`] backed by pdfium, bound through `pdfium-auto`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumExtractor;

impl TextExtractor for PdfiumExtractor {
    fn extract(&self, path: &Path, password: Option<&str>) -> Result<String, PaperError> {
        let pdfium = pdfium_auto::bind_pdfium_silent()
            .map_err(|e| PaperError::PdfiumBindingFailed(e.to_string()))?;

        let document = pdfium
            .load_pdf_from_file(path, password)
            .map_err(|e| PaperError::CorruptPdf {
                path: path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut text = String::new();
        for (idx, page) in pages.iter().enumerate() {
            let page_text = page.text().map_err(|e| PaperError::CorruptPdf {
                path: path.to_path_buf(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?;
            let content = page_text.all();
            debug!("Page {}: {} chars", idx + 1, content.chars().count());
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&content);
        }

        Ok(text)
    }
}

/// Cut `text` at the first occurrence of `heading`. Case-sensitive.
pub fn strip_references<'a>(text: &'a str, heading: &str) -> &'a str {
    if heading.is_empty() {
        return text;
    }
    match text.find(heading) {
        Some(idx) => {
            debug!("Dropping {} bytes from '{}' onward", text.len() - idx, heading);
            &text[..idx]
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_from_first_heading() {
        let text = "1 Intro\nbody\nReferences\n[1] A. Author\nReferences again";
        assert_eq!(strip_references(text, "References"), "1 Intro\nbody\n");
    }

    #[test]
    fn keeps_text_without_heading() {
        assert_eq!(strip_references("no bibliography", "References"), "no bibliography");
    }

    #[test]
    fn match_is_case_sensitive() {
        assert_eq!(
            strip_references("see references below", "References"),
            "see references below"
        );
    }

    #[test]
    fn heading_at_start_leaves_nothing() {
        assert_eq!(strip_references("References\n[1] x", "References"), "");
    }
}
