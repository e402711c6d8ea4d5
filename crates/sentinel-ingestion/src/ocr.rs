//! OCR fallback for scanned filings.
//!
//! Pages are rendered with `pdftoppm` (poppler-utils) and recognised one by
//! one with `tesseract`. Both binaries are external collaborators and must be
//! on `PATH` (or configured explicitly).

use std::path::{Path, PathBuf};
use std::process::Command;

use sentinel_common::{Result, SentinelError};
use tracing::{debug, info, warn};

use crate::extractor::OcrEngine;

#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pub dpi: u32,
    pub lang: String,
    pub pdftoppm_bin: String,
    pub tesseract_bin: String,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            dpi: 300,
            lang: "eng".to_string(),
            pdftoppm_bin: "pdftoppm".to_string(),
            tesseract_bin: "tesseract".to_string(),
        }
    }
}

impl TesseractOcr {
    pub fn new(dpi: u32, lang: impl Into<String>) -> Self {
        Self { dpi, lang: lang.into(), ..Default::default() }
    }

    /// Whether both external tools can be spawned.
    pub fn is_available(&self) -> bool {
        let pdftoppm = Command::new(&self.pdftoppm_bin).arg("-v").output().is_ok();
        let tesseract = Command::new(&self.tesseract_bin).arg("--version").output().is_ok();
        if !pdftoppm {
            debug!("pdftoppm not found - install poppler-utils for OCR support");
        }
        if !tesseract {
            debug!("tesseract not found - install tesseract-ocr for OCR support");
        }
        pdftoppm && tesseract
    }

    fn render_pages(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let document = pdf_path.display().to_string();
        let output = Command::new(&self.pdftoppm_bin)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf_path)
            .arg(out_dir.join("page"))
            .output()
            .map_err(|e| SentinelError::extraction(&document, format!("failed to run pdftoppm: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SentinelError::extraction(&document, format!("pdftoppm failed: {}", stderr.trim())));
        }

        let mut images: Vec<PathBuf> = std::fs::read_dir(out_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "png").unwrap_or(false))
            .collect();
        // pdftoppm zero-pads page numbers, so lexical order is page order.
        images.sort();
        Ok(images)
    }

    fn recognise_image(&self, image: &Path, page: usize) -> Result<String> {
        let output = Command::new(&self.tesseract_bin)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .output()
            .map_err(|e| {
                SentinelError::extraction(image.display().to_string(), format!("failed to run tesseract: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(page, "Tesseract warning: {}", stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognise_pages(&self, pdf_path: &Path) -> Result<Vec<String>> {
        let workdir = tempfile::Builder::new().prefix("sentinel-ocr-").tempdir()?;
        let images = self.render_pages(pdf_path, workdir.path())?;
        if images.is_empty() {
            return Err(SentinelError::extraction(
                pdf_path.display().to_string(),
                "pdftoppm produced no images",
            ));
        }

        info!(pages = images.len(), dpi = self.dpi, lang = %self.lang, "Running OCR");
        let mut pages = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            match self.recognise_image(image, i + 1) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    warn!(page = i + 1, error = %e, "OCR failed for page");
                    pages.push(String::new());
                }
            }
        }
        Ok(pages)
    }
}
