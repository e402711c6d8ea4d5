//! lopdf-based structural text extraction.
//! The primary extraction method; OCR is the fallback (see `ocr.rs`).

use std::path::Path;

use lopdf::Document as PdfDoc;
use sentinel_common::{Result, SentinelError};
use tracing::debug;

use crate::extractor::PdfTextExtractor;

/// Extracts the text layer of each page with lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfExtractor;

impl PdfTextExtractor for LopdfExtractor {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn extract_pages(&self, pdf_path: &Path) -> Result<Vec<String>> {
        let pdf = PdfDoc::load(pdf_path)
            .map_err(|e| SentinelError::extraction(pdf_path.display().to_string(), e))?;
        Ok(extract_pages_from(&pdf))
    }
}

/// Per-page text in page order. A page that fails to decode yields an empty
/// string rather than aborting the document.
pub fn extract_pages_from(pdf: &PdfDoc) -> Vec<String> {
    pdf.get_pages()
        .keys()
        .map(|&page_num| match pdf.extract_text(&[page_num]) {
            Ok(text) => text,
            Err(e) => {
                debug!(page = page_num, error = %e, "Page text extraction failed");
                String::new()
            }
        })
        .collect()
}
