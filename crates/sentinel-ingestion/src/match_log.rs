//! Append-only match log.
//!
//! One line per match, `<timestamp> | <document-identifier> | <matched-line>`.
//! Each record is appended, flushed and synced on its own; existing lines
//! are never rewritten.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use sentinel_common::Result;
use tracing::{debug, warn};

use crate::models::{LogEntry, MatchRecord};

pub const DEFAULT_LOG_PATH: &str = "unh_matches.log";

#[derive(Debug, Clone)]
pub struct MatchLog {
    path: PathBuf,
}

impl MatchLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &MatchRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut line = record.to_log_line();
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_data()?;
        debug!(path = %self.path.display(), document = %record.document, "Match logged");
        Ok(())
    }

    /// All parseable entries in file order. A missing file is an empty log.
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match LogEntry::parse(&line) {
                Some(entry) => entries.push(entry),
                None => warn!(line = n + 1, "Unparseable match log line"),
            }
        }
        Ok(entries)
    }

    /// The last `limit` entries, oldest first.
    pub fn tail(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let mut entries = self.entries()?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }

    /// Identifiers of every document already recorded.
    pub fn known_documents(&self) -> Result<HashSet<String>> {
        Ok(self.entries()?.into_iter().map(|e| e.identifier).collect())
    }
}

impl Default for MatchLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_PATH)
    }
}
