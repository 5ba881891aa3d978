use std::path::Path;

use crate::config::schema::DocumentFormat;
use crate::error::ProcessError;
use crate::reader::{push_unit, DocumentReader};

pub struct PdfReader;

impl PdfReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfReader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentReader for PdfReader {
    fn read(&self, path: &Path) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("reader.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ProcessError::extraction("PDF", format!("failed to load PDF: {}", e)))?;

        Ok(extract_text_from_pdf(&doc))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

/// Concatenates page text in page order. Pages whose content stream cannot
/// be decoded are skipped rather than failing the whole deck.
fn extract_text_from_pdf(doc: &lopdf::Document) -> String {
    let mut text = String::new();
    let pages = doc.get_pages();

    for (page_num, _) in &pages {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => push_unit(&mut text, &page_text),
            Err(e) => {
                tracing::warn!(page = page_num, "Skipping undecodable PDF page: {}", e);
            }
        }
    }

    tracing::debug!(pages = pages.len(), chars = text.len(), "Extracted PDF text");
    text
}
