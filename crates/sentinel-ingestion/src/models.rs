//! Data models for the disclosure pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Which chamber published a disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::House  => "house",
            Chamber::Senate => "senate",
        }
    }
}

impl fmt::Display for Chamber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a disclosure document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    /// A PDF reachable over HTTP.
    Remote(Url),
    /// A PDF already on local disk.
    Local(PathBuf),
    /// A PDF extracted from a downloaded ZIP archive into a working directory.
    Archived {
        archive: Url,
        entry: String,
        path: PathBuf,
    },
}

/// Identifies one disclosure document. Produced by a source lister and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReference {
    pub location: DocumentLocation,
    pub chamber: Chamber,
}

impl DocumentReference {
    pub fn remote(url: Url, chamber: Chamber) -> Self {
        Self { location: DocumentLocation::Remote(url), chamber }
    }

    pub fn local(path: impl Into<PathBuf>, chamber: Chamber) -> Self {
        Self { location: DocumentLocation::Local(path.into()), chamber }
    }

    /// Stable identifier used in logs, match records and notifications.
    pub fn identifier(&self) -> String {
        match &self.location {
            DocumentLocation::Remote(url) => url.to_string(),
            DocumentLocation::Local(path) => path.display().to_string(),
            DocumentLocation::Archived { archive, entry, .. } => format!("{archive}#{entry}"),
        }
    }

    /// A clickable link for notifications, when the document has one.
    pub fn link(&self) -> Option<String> {
        match &self.location {
            DocumentLocation::Remote(url) => Some(url.to_string()),
            DocumentLocation::Archived { archive, .. } => Some(archive.to_string()),
            DocumentLocation::Local(_) => None,
        }
    }

    /// Local path for documents that need no download.
    pub fn local_path(&self) -> Option<&Path> {
        match &self.location {
            DocumentLocation::Remote(_) => None,
            DocumentLocation::Local(path) => Some(path),
            DocumentLocation::Archived { path, .. } => Some(path),
        }
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.chamber, self.identifier())
    }
}

/// Which method produced the extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Primary,
    Ocr,
    /// Neither method produced any text.
    None,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Primary => "primary",
            ExtractionMethod::Ocr     => "ocr",
            ExtractionMethod::None    => "none",
        }
    }
}

/// Plain text pulled out of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
    pub page_count: usize,
    pub ocr_attempted: bool,
}

impl ExtractionResult {
    pub fn empty(ocr_attempted: bool) -> Self {
        Self {
            text: String::new(),
            method: ExtractionMethod::None,
            page_count: 0,
            ocr_attempted,
        }
    }

    /// Empty text means "no match possible", not an error.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Longest snippet kept in a match record.
pub const MAX_SNIPPET_CHARS: usize = 240;

const FIELD_SEPARATOR: &str = " | ";

/// One keyword hit in one document. The only persisted entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub keyword: String,
    pub snippet: String,
    pub document: String,
    pub link: Option<String>,
    pub chamber: Chamber,
    pub timestamp: DateTime<Utc>,
}

impl MatchRecord {
    pub fn new(
        document: &DocumentReference,
        keyword: impl Into<String>,
        snippet: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            snippet: clean_snippet(snippet),
            document: document.identifier(),
            link: document.link(),
            chamber: document.chamber,
            timestamp,
        }
    }

    /// Serialise as `<timestamp> | <document-identifier> | <matched-line>`.
    /// No trailing newline.
    pub fn to_log_line(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            log_identifier(&self.document),
            self.snippet,
            sep = FIELD_SEPARATOR,
        )
    }
}

/// Document identifier as written to the match log.
pub fn log_identifier(identifier: &str) -> String {
    identifier.replace('|', "%7C").replace(['\r', '\n'], " ")
}

/// A parsed line of the match log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub identifier: String,
    pub snippet: String,
}

impl LogEntry {
    /// Parse one log line. Returns `None` for anything that is not a record.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.splitn(3, FIELD_SEPARATOR);
        let timestamp = DateTime::parse_from_rfc3339(parts.next()?.trim())
            .ok()?
            .with_timezone(&Utc);
        let identifier = parts.next()?.to_string();
        let snippet = parts.next()?.to_string();
        if identifier.is_empty() {
            return None;
        }
        Some(Self { timestamp, identifier, snippet })
    }
}

/// Collapse whitespace, drop line breaks and cap the length on a char boundary.
fn clean_snippet(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(MAX_SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}…", &collapsed[..idx]),
        None => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn house_ref(url: &str) -> DocumentReference {
        DocumentReference::remote(Url::parse(url).unwrap(), Chamber::House)
    }

    #[test]
    fn test_log_line_round_trips_through_parser() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        let doc = house_ref("https://disclosures-clerk.house.gov/public_disc/ptr-pdfs/2025/20026590.pdf");
        let record = MatchRecord::new(&doc, "UNH", "SP UnitedHealth Group Inc (UNH) | S | 03/01/2025", ts);

        let line = record.to_log_line();
        assert_eq!(
            line,
            "2025-03-14T09:30:00Z | https://disclosures-clerk.house.gov/public_disc/ptr-pdfs/2025/20026590.pdf | SP UnitedHealth Group Inc (UNH) | S | 03/01/2025"
        );

        let entry = LogEntry::parse(&line).unwrap();
        assert_eq!(entry.timestamp, ts);
        assert_eq!(entry.identifier, record.document);
        assert_eq!(entry.snippet, "SP UnitedHealth Group Inc (UNH) | S | 03/01/2025");
    }

    #[test]
    fn test_snippet_is_single_line_and_capped() {
        let doc = house_ref("https://disclosures-clerk.house.gov/a.pdf");
        let long = format!("UNH\n{}", "x".repeat(1000));
        let record = MatchRecord::new(&doc, "UNH", &long, Utc::now());
        assert!(!record.snippet.contains('\n'));
        assert_eq!(record.snippet.chars().count(), MAX_SNIPPET_CHARS + 1);
    }

    #[test]
    fn test_archived_identifier_names_entry() {
        let doc = DocumentReference {
            location: DocumentLocation::Archived {
                archive: Url::parse("https://disclosures-clerk.house.gov/public_disc/financial-pdfs/2025FD.zip").unwrap(),
                entry: "2025/10001.pdf".to_string(),
                path: PathBuf::from("/tmp/work/2025/10001.pdf"),
            },
            chamber: Chamber::House,
        };
        assert_eq!(
            doc.identifier(),
            "https://disclosures-clerk.house.gov/public_disc/financial-pdfs/2025FD.zip#2025/10001.pdf"
        );
        assert_eq!(doc.local_path(), Some(Path::new("/tmp/work/2025/10001.pdf")));
    }

    #[test]
    fn test_garbage_lines_do_not_parse() {
        assert!(LogEntry::parse("").is_none());
        assert!(LogEntry::parse("not a timestamp | doc | line").is_none());
        assert!(LogEntry::parse("2025-03-14T09:30:00Z | only-two-fields").is_none());
    }

    #[test]
    fn test_empty_extraction_is_empty() {
        assert!(ExtractionResult::empty(true).is_empty());
        let whitespace = ExtractionResult {
            text: "  \n\t".to_string(),
            method: ExtractionMethod::Primary,
            page_count: 1,
            ocr_attempted: false,
        };
        assert!(whitespace.is_empty());
    }
}
