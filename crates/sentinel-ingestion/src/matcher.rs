//! Keyword matching over extracted text.
//!
//! A document matches if any keyword occurs anywhere in its text as a
//! case-insensitive substring. The first line containing a keyword is kept
//! as the representative snippet. Keywords never contain line breaks, so a
//! whole-text match always has a matching line.

use sentinel_common::{Result, SentinelError};

/// Tickers and names watched by default.
pub const DEFAULT_KEYWORDS: &[&str] = &["UNH", "UnitedHealth"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHit {
    /// The keyword as configured (original casing).
    pub keyword: String,
    /// The first line of text containing any keyword, trimmed.
    pub snippet: String,
}

/// A validated, non-empty set of keywords.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    keywords: Vec<(String, String)>,
}

impl KeywordSet {
    /// Trims, drops blanks and case-insensitive duplicates. Fails on an empty
    /// result or a keyword spanning lines.
    pub fn new<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<(String, String)> = Vec::new();
        for raw in keywords {
            let keyword = raw.as_ref().trim();
            if keyword.is_empty() {
                continue;
            }
            if keyword.contains(['\n', '\r']) {
                return Err(SentinelError::Config(format!(
                    "keyword {keyword:?} must not contain a line break"
                )));
            }
            let lowered = keyword.to_lowercase();
            if !out.iter().any(|(_, l)| *l == lowered) {
                out.push((keyword.to_string(), lowered));
            }
        }
        if out.is_empty() {
            return Err(SentinelError::Config("keyword list is empty".to_string()));
        }
        Ok(Self { keywords: out })
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Whole-text verdict.
    pub fn is_match(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.keywords.iter().any(|(_, k)| lowered.contains(k.as_str()))
    }

    /// First matching line and the first configured keyword found on it.
    pub fn find(&self, text: &str) -> Option<KeywordHit> {
        text.lines().find_map(|line| {
            let lowered = line.to_lowercase();
            self.keywords
                .iter()
                .find(|(_, k)| lowered.contains(k.as_str()))
                .map(|(keyword, _)| KeywordHit {
                    keyword: keyword.clone(),
                    snippet: line.trim().to_string(),
                })
        })
    }
}

impl Default for KeywordSet {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS
                .iter()
                .map(|k| (k.to_string(), k.to_lowercase()))
                .collect(),
        }
    }
}
