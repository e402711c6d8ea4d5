//! Notification channels.
//!
//! A run builds at most one [`NotificationRequest`] and hands it to every
//! configured [`Notifier`]. A failing channel does not stop the others.

pub mod email;
pub mod pushover;

use async_trait::async_trait;
use sentinel_common::Result;
use serde::{Deserialize, Serialize};

use crate::models::MatchRecord;

pub use email::EmailNotifier;
pub use pushover::PushoverNotifier;

pub const DEFAULT_TITLE: &str = "UNH Disclosure Alert";

/// When a run sends a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// Only when at least one document matched.
    #[default]
    OnMatch,
    /// Every run, including a "no matches" summary.
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: String,
    /// Plain-text body.
    pub message: String,
    /// HTML body listing matched document links.
    pub html: String,
    /// Links (or identifiers) of the matched documents, in match order.
    pub links: Vec<String>,
}

impl NotificationRequest {
    pub fn from_matches(title: &str, matches: &[MatchRecord]) -> Self {
        let links: Vec<String> = matches.iter().map(target_of).collect();

        let message = matches
            .iter()
            .map(|m| format!("{} found in:\n{}\n> {}", m.keyword, target_of(m), m.snippet))
            .collect::<Vec<_>>()
            .join("\n\n");

        let items: String = matches
            .iter()
            .map(|m| {
                let target = target_of(m);
                format!(
                    "<li><a href=\"{href}\">{label}</a> ({chamber}): <b>{keyword}</b>: {snippet}</li>",
                    href = escape_html(&target),
                    label = escape_html(&m.document),
                    chamber = m.chamber,
                    keyword = escape_html(&m.keyword),
                    snippet = escape_html(&m.snippet),
                )
            })
            .collect();
        let html = format!(
            "<p>Keyword matches in {} disclosure document(s):</p><ul>{}</ul>",
            matches.len(),
            items
        );

        Self { title: title.to_string(), message, html, links }
    }

    /// Liveness summary for runs without matches.
    pub fn no_matches(title: &str, documents_scanned: usize) -> Self {
        let message = format!("No matches found in {documents_scanned} disclosure document(s).");
        Self {
            title: title.to_string(),
            html: format!("<p>{}</p>", escape_html(&message)),
            message,
            links: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs and summaries.
    fn channel(&self) -> &str;

    async fn send(&self, request: &NotificationRequest) -> Result<()>;
}

fn target_of(m: &MatchRecord) -> String {
    m.link.clone().unwrap_or_else(|| m.document.clone())
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Cut `s` to at most `max` chars, marking the cut.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{keep}…")
}
