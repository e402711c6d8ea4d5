//! sentinel-ingestion: disclosure scraping pipeline.
//! Covers the whole forward flow of one run:
//! - Source listing (HTML index pages, ZIP archives)
//! - Scoped document fetching
//! - lopdf text extraction with OCR fallback
//! - Keyword matching
//! - Append-only match log
//! - Notification (Pushover, email)

pub mod sources;
pub mod models;
pub mod fetcher;
pub mod pdf_parser;
pub mod ocr;
pub mod extractor;
pub mod matcher;
pub mod match_log;
pub mod notify;
pub mod pipeline;

pub use pipeline::{Pipeline, PipelineOptions, RunError, RunSummary};
