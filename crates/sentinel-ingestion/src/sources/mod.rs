//! Disclosure source listers.
//!
//! A source turns an index location into an ordered, deduplicated list of
//! document references. Failures are returned as typed errors; the pipeline
//! decides to carry on with zero documents.

pub mod archive;
pub mod index_page;

use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;
use sentinel_common::Result;
use tempfile::TempDir;
use url::Url;

use crate::models::DocumentReference;

pub use archive::{ArchiveSource, DEFAULT_MAX_ARCHIVE_BYTES};
pub use index_page::IndexPageSource;

/// Common interface for all disclosure sources.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Short name for logs and summaries.
    fn name(&self) -> &str;

    /// List candidate documents.
    async fn list(&self) -> Result<SourceListing>;
}

/// The documents one source produced.
///
/// Archive sources extract into a working directory owned by the listing; the
/// directory is removed when the listing is dropped, so it must outlive
/// processing of its documents.
#[derive(Debug, Default)]
pub struct SourceListing {
    pub documents: Vec<DocumentReference>,
    _workdir: Option<TempDir>,
}

impl SourceListing {
    pub fn new(documents: Vec<DocumentReference>) -> Self {
        Self { documents, _workdir: None }
    }

    pub fn with_workdir(documents: Vec<DocumentReference>, workdir: TempDir) -> Self {
        Self { documents, _workdir: Some(workdir) }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Which hyperlinks on an index page are disclosure documents.
#[derive(Debug, Clone)]
pub enum LinkPattern {
    /// URL path ends with `.pdf` (any case).
    PdfExtension,
    /// Regular expression matched against the URL path.
    PathRegex(Regex),
}

impl LinkPattern {
    pub fn regex(pattern: &str) -> std::result::Result<Self, regex::Error> {
        Ok(LinkPattern::PathRegex(Regex::new(pattern)?))
    }

    pub fn matches(&self, url: &Url) -> bool {
        let path = url.path();
        match self {
            LinkPattern::PdfExtension => path.to_ascii_lowercase().ends_with(".pdf"),
            LinkPattern::PathRegex(re) => re.is_match(path),
        }
    }
}

impl Default for LinkPattern {
    fn default() -> Self {
        LinkPattern::PdfExtension
    }
}

/// Keep first occurrences in order, then apply the optional cap.
pub fn dedup_and_cap<T, K, F>(items: Vec<T>, key: F, max: Option<usize>) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    let mut out: Vec<T> = items.into_iter().filter(|item| seen.insert(key(item))).collect();
    if let Some(max) = max {
        out.truncate(max);
    }
    out
}
