//! Document fetcher.
//!
//! Remote documents are downloaded with a bounded timeout and spooled to a
//! temp file that is deleted when the [`FetchedDocument`] is dropped. Local
//! and archive-extracted documents are read in place. Bodies are read chunk
//! by chunk and abandoned as soon as they pass the byte cap.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sentinel_common::{Result, SandboxClient, SentinelError};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::models::{DocumentLocation, DocumentReference};

/// Default download cap: 50 MiB.
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;

/// Where a fetched document's bytes live.
#[derive(Debug)]
pub enum DocumentBody {
    /// Downloaded bytes in a temp file, removed on drop.
    Spooled(NamedTempFile),
    /// A file that already existed on disk and is left alone.
    InPlace(PathBuf),
}

/// A document ready for text extraction.
#[derive(Debug)]
pub struct FetchedDocument {
    pub reference: DocumentReference,
    pub size: u64,
    body: DocumentBody,
}

impl FetchedDocument {
    /// Spool `bytes` into a fresh temp file.
    pub fn spooled(reference: DocumentReference, bytes: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("sentinel-doc-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self {
            reference,
            size: bytes.len() as u64,
            body: DocumentBody::Spooled(file),
        })
    }

    /// Wrap a document that is already on disk.
    pub fn in_place(reference: DocumentReference, path: PathBuf) -> Result<Self> {
        let size = std::fs::metadata(&path)?.len();
        Ok(Self {
            reference,
            size,
            body: DocumentBody::InPlace(path),
        })
    }

    pub fn path(&self) -> &Path {
        match &self.body {
            DocumentBody::Spooled(file) => file.path(),
            DocumentBody::InPlace(path) => path,
        }
    }

}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, reference: &DocumentReference) -> Result<FetchedDocument>;
}

/// Fetches remote documents over HTTP through the sandboxed client.
pub struct HttpFetcher {
    client: SandboxClient,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(client: SandboxClient) -> Self {
        Self { client, max_bytes: DEFAULT_MAX_DOCUMENT_BYTES }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[instrument(skip(self, reference))]
    async fn download(&self, reference: &DocumentReference, url: &str) -> Result<FetchedDocument> {
        let bytes = download_capped(&self.client, url, self.max_bytes).await?;
        if !bytes.starts_with(b"%PDF") {
            debug!(bytes = bytes.len(), "Body does not start with a PDF header");
        }
        FetchedDocument::spooled(reference.clone(), &bytes)
    }
}

/// GET `url` and read the body, failing once it passes `max_bytes`.
///
/// A declared Content-Length over the cap is refused before any body is read;
/// otherwise the running total is checked after every chunk.
pub(crate) async fn download_capped(client: &SandboxClient, url: &str, max_bytes: u64) -> Result<Vec<u8>> {
    let mut resp = client
        .get(url)?
        .send()
        .await
        .map_err(|e| SentinelError::network(url, e))?;

    if !resp.status().is_success() {
        return Err(SentinelError::network(url, format!("HTTP {}", resp.status())));
    }

    let too_large = |len: u64| SentinelError::network(url, format!("body is over {max_bytes} bytes (at least {len})"));

    let declared = resp.content_length();
    if let Some(len) = declared {
        if len > max_bytes {
            return Err(too_large(len));
        }
    }

    let mut body = Vec::with_capacity(declared.unwrap_or(0) as usize);
    while let Some(chunk) = resp.chunk().await.map_err(|e| SentinelError::network(url, e))? {
        let total = (body.len() + chunk.len()) as u64;
        if total > max_bytes {
            return Err(too_large(total));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, reference: &DocumentReference) -> Result<FetchedDocument> {
        match &reference.location {
            DocumentLocation::Remote(url) => self.download(reference, url.as_str()).await,
            DocumentLocation::Local(path) | DocumentLocation::Archived { path, .. } => {
                FetchedDocument::in_place(reference.clone(), path.clone())
            }
        }
    }
}
