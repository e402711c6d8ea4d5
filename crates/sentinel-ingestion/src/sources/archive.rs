//! ZIP archive lister.
//!
//! Downloads an archive of filings, unpacks every PDF entry into a fresh
//! working directory and lists the extracted paths. The directory lives as
//! long as the returned [`SourceListing`].

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sentinel_common::{Result, SandboxClient, SentinelError};
use tracing::{debug, info, instrument, warn};
use url::Url;
use zip::ZipArchive;

use super::{dedup_and_cap, DocumentSource, SourceListing};
use crate::fetcher::download_capped;
use crate::models::{Chamber, DocumentLocation, DocumentReference};

/// Default archive download cap: 512 MiB.
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 512 * 1024 * 1024;

pub struct ArchiveSource {
    client: SandboxClient,
    name: String,
    archive_url: Url,
    chamber: Chamber,
    max_documents: Option<usize>,
    max_bytes: u64,
}

impl ArchiveSource {
    pub fn new(client: SandboxClient, name: impl Into<String>, archive_url: Url, chamber: Chamber) -> Self {
        Self {
            client,
            name: name.into(),
            archive_url,
            chamber,
            max_documents: None,
            max_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
        }
    }

    pub fn with_max_documents(mut self, max: Option<usize>) -> Self {
        self.max_documents = max;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl DocumentSource for ArchiveSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(source = %self.name, url = %self.archive_url))]
    async fn list(&self) -> Result<SourceListing> {
        let bytes = download_capped(&self.client, self.archive_url.as_str(), self.max_bytes).await?;
        debug!(bytes = bytes.len(), "Archive downloaded");

        let workdir = tempfile::Builder::new()
            .prefix("sentinel-archive-")
            .tempdir()?;
        let dest = workdir.path().to_path_buf();

        let archive_id = self.archive_url.to_string();
        let entries = tokio::task::spawn_blocking(move || extract_pdf_entries(&bytes, &dest))
            .await
            .map_err(|e| SentinelError::archive(&archive_id, e))?
            .map_err(|e| SentinelError::archive(&archive_id, e))?;

        let entries = dedup_and_cap(entries, |(name, _)| name.clone(), self.max_documents);
        info!(n = entries.len(), "Archive unpacked");

        let documents = entries
            .into_iter()
            .map(|(entry, path)| DocumentReference {
                location: DocumentLocation::Archived {
                    archive: self.archive_url.clone(),
                    entry,
                    path,
                },
                chamber: self.chamber,
            })
            .collect();

        Ok(SourceListing::with_workdir(documents, workdir))
    }
}

/// Unpack every `.pdf` entry of a ZIP archive under `dest`.
///
/// Returns `(entry name, extracted path)` in archive order. Entries whose
/// names would escape `dest` are skipped.
pub fn extract_pdf_entries(bytes: &[u8], dest: &Path) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if !name.to_ascii_lowercase().ends_with(".pdf") {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %name, "Skipping archive entry with unsafe path");
            continue;
        };

        let out_path = dest.join(relative);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push((name, out_path));
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_only_pdf_entries_are_extracted_in_order() {
        let zip = build_zip(&[
            ("2025FD.txt", b"index"),
            ("2025/10001.pdf", b"%PDF-1.4 one"),
            ("2025/10002.PDF", b"%PDF-1.4 two"),
            ("2025FD.xml", b"<xml/>"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let entries = extract_pdf_entries(&zip, dir.path()).unwrap();

        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["2025/10001.pdf", "2025/10002.PDF"]);
        assert_eq!(fs::read(&entries[0].1).unwrap(), b"%PDF-1.4 one");
        assert!(entries.iter().all(|(_, p)| p.starts_with(dir.path())));
    }

    #[test]
    fn test_path_traversal_entries_are_skipped() {
        let zip = build_zip(&[("../escape.pdf", b"%PDF"), ("ok.pdf", b"%PDF")]);
        let dir = tempfile::tempdir().unwrap();
        let entries = extract_pdf_entries(&zip, dir.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "ok.pdf");
    }

    #[test]
    fn test_corrupt_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_pdf_entries(b"definitely not a zip", dir.path()).is_err());
    }
}
