//! Text extraction with OCR fallback.
//!
//! The primary method reads the PDF text layer. When it yields fewer than
//! `min_text_chars` non-blank characters the document is treated as scanned
//! and the OCR engine is run. Errors from either method are logged and count
//! as "no text from that method"; extraction itself never fails.

use std::path::Path;

use sentinel_common::Result;
use tracing::{debug, info, warn};

use crate::models::{ExtractionMethod, ExtractionResult};

/// Observed threshold below which the text layer is considered insufficient.
pub const DEFAULT_MIN_TEXT_CHARS: usize = 100;

/// Structural (text-layer) PDF extraction.
pub trait PdfTextExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Text of each page, in page order.
    fn extract_pages(&self, pdf_path: &Path) -> Result<Vec<String>>;
}

/// Optical character recognition over rendered pages.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Recognised text of each page, in page order.
    fn recognise_pages(&self, pdf_path: &Path) -> Result<Vec<String>>;
}

/// Whether primary output of this size must go through OCR.
pub fn needs_ocr(primary_text: &str, min_text_chars: usize) -> bool {
    primary_text.trim().chars().count() < min_text_chars
}

pub struct FallbackExtractor {
    primary: Box<dyn PdfTextExtractor>,
    ocr: Option<Box<dyn OcrEngine>>,
    min_text_chars: usize,
}

impl FallbackExtractor {
    pub fn new(primary: Box<dyn PdfTextExtractor>) -> Self {
        Self {
            primary,
            ocr: None,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
        }
    }

    pub fn with_ocr(mut self, ocr: Box<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_min_text_chars(mut self, min_text_chars: usize) -> Self {
        self.min_text_chars = min_text_chars;
        self
    }

    pub fn min_text_chars(&self) -> usize {
        self.min_text_chars
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Extract text from the PDF at `pdf_path`. `document` is only used for
    /// log context.
    pub fn extract(&self, document: &str, pdf_path: &Path) -> ExtractionResult {
        let primary_pages = match self.primary.extract_pages(pdf_path) {
            Ok(pages) => pages,
            Err(e) => {
                warn!(document, method = self.primary.name(), error = %e, "Primary extraction failed");
                Vec::new()
            }
        };
        let primary_text = primary_pages.join("\n");

        if !needs_ocr(&primary_text, self.min_text_chars) {
            debug!(document, chars = primary_text.len(), "Text layer sufficient");
            return ExtractionResult {
                text: primary_text,
                method: ExtractionMethod::Primary,
                page_count: primary_pages.len(),
                ocr_attempted: false,
            };
        }

        let Some(ocr) = &self.ocr else {
            debug!(document, "Text layer insufficient and OCR disabled");
            return keep_primary(primary_text, primary_pages.len(), false);
        };

        info!(
            document,
            chars = primary_text.trim().chars().count(),
            threshold = self.min_text_chars,
            "Text layer insufficient, falling back to OCR"
        );
        match ocr.recognise_pages(pdf_path) {
            Ok(pages) => {
                let text = pages.join("\n");
                if !text.trim().is_empty() {
                    return ExtractionResult {
                        text,
                        method: ExtractionMethod::Ocr,
                        page_count: pages.len(),
                        ocr_attempted: true,
                    };
                }
                warn!(document, method = ocr.name(), "OCR produced no text");
            }
            Err(e) => warn!(document, method = ocr.name(), error = %e, "OCR failed"),
        }

        keep_primary(primary_text, primary_pages.len(), true)
    }
}

/// A short text layer is still better than nothing: a scanned cover page with
/// a typed ticker must not be dropped just because OCR failed.
fn keep_primary(text: String, page_count: usize, ocr_attempted: bool) -> ExtractionResult {
    if text.trim().is_empty() {
        return ExtractionResult::empty(ocr_attempted);
    }
    ExtractionResult {
        text,
        method: ExtractionMethod::Primary,
        page_count,
        ocr_attempted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_common::SentinelError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedPrimary(Vec<String>);

    impl PdfTextExtractor for FixedPrimary {
        fn name(&self) -> &str { "fixed" }
        fn extract_pages(&self, _: &Path) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenPrimary;

    impl PdfTextExtractor for BrokenPrimary {
        fn name(&self) -> &str { "broken" }
        fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
            Err(SentinelError::extraction(path.display().to_string(), "xref table damaged"))
        }
    }

    struct CountingOcr {
        calls: Arc<AtomicUsize>,
        output: Option<Vec<String>>,
    }

    impl OcrEngine for CountingOcr {
        fn name(&self) -> &str { "counting" }
        fn recognise_pages(&self, path: &Path) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output
                .clone()
                .ok_or_else(|| SentinelError::extraction(path.display().to_string(), "tesseract crashed"))
        }
    }

    fn extractor(primary: &[&str], ocr: Option<&[&str]>) -> (FallbackExtractor, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let ocr = CountingOcr {
            calls: calls.clone(),
            output: ocr.map(|pages| pages.iter().map(|p| p.to_string()).collect()),
        };
        let primary = FixedPrimary(primary.iter().map(|p| p.to_string()).collect());
        (FallbackExtractor::new(Box::new(primary)).with_ocr(Box::new(ocr)), calls)
    }

    #[test]
    fn test_threshold_boundary() {
        let at_threshold = "x".repeat(DEFAULT_MIN_TEXT_CHARS);
        let below = "x".repeat(DEFAULT_MIN_TEXT_CHARS - 1);
        assert!(!needs_ocr(&at_threshold, DEFAULT_MIN_TEXT_CHARS));
        assert!(needs_ocr(&below, DEFAULT_MIN_TEXT_CHARS));
        assert!(needs_ocr("", DEFAULT_MIN_TEXT_CHARS));
        // Whitespace padding does not count towards the threshold.
        assert!(needs_ocr(&format!("   {below}\n\n"), DEFAULT_MIN_TEXT_CHARS));
    }

    #[test]
    fn test_sufficient_text_layer_skips_ocr() {
        let long = "UnitedHealth Group Inc. common stock, sale, $15,001 - $50,000. ".repeat(3);
        let (ex, calls) = extractor(&[long.as_str()], Some(&["never used"]));
        let result = ex.extract("doc", Path::new("/tmp/doc.pdf"));
        assert_eq!(result.method, ExtractionMethod::Primary);
        assert!(!result.ocr_attempted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_short_text_layer_triggers_ocr() {
        let (ex, calls) = extractor(&["Periodic Transaction Report"], Some(&["UNH 500 shares", "page two"]));
        let result = ex.extract("doc", Path::new("/tmp/doc.pdf"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.method, ExtractionMethod::Ocr);
        assert_eq!(result.text, "UNH 500 shares\npage two");
        assert_eq!(result.page_count, 2);
    }

    #[test]
    fn test_exactly_threshold_does_not_trigger_ocr() {
        let exact = "y".repeat(DEFAULT_MIN_TEXT_CHARS);
        let (ex, calls) = extractor(&[exact.as_str()], Some(&["ocr"]));
        ex.extract("doc", Path::new("/tmp/doc.pdf"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_ocr_keeps_short_text_layer() {
        let (ex, calls) = extractor(&["UNH"], None);
        let result = ex.extract("doc", Path::new("/tmp/doc.pdf"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.ocr_attempted);
        assert_eq!(result.method, ExtractionMethod::Primary);
        assert_eq!(result.text, "UNH");
    }

    #[test]
    fn test_both_methods_failing_is_empty_not_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ex = FallbackExtractor::new(Box::new(BrokenPrimary))
            .with_ocr(Box::new(CountingOcr { calls: calls.clone(), output: Some(vec!["  ".into()]) }));
        let result = ex.extract("doc", Path::new("/tmp/doc.pdf"));
        assert!(result.is_empty());
        assert_eq!(result.method, ExtractionMethod::None);
        assert!(result.ocr_attempted);
    }

    #[test]
    fn test_without_ocr_engine_short_text_is_returned() {
        let ex = FallbackExtractor::new(Box::new(FixedPrimary(vec!["short".into()]))).with_min_text_chars(10);
        let result = ex.extract("doc", Path::new("/tmp/doc.pdf"));
        assert_eq!(result.text, "short");
        assert!(!result.ocr_attempted);
    }
}
