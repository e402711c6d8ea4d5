//! HTML index-page lister.
//!
//! Fetches a disclosure listing page, collects hyperlink targets, resolves
//! them against the page URL and keeps the ones matching a [`LinkPattern`].

use async_trait::async_trait;
use scraper::{Html, Selector};
use sentinel_common::{Result, SandboxClient, SentinelError};
use tracing::{debug, info, instrument};
use url::Url;

use super::{dedup_and_cap, DocumentSource, LinkPattern, SourceListing};
use crate::models::{Chamber, DocumentReference};

pub struct IndexPageSource {
    client: SandboxClient,
    name: String,
    index_url: Url,
    chamber: Chamber,
    pattern: LinkPattern,
    max_documents: Option<usize>,
}

impl IndexPageSource {
    pub fn new(client: SandboxClient, name: impl Into<String>, index_url: Url, chamber: Chamber) -> Self {
        Self {
            client,
            name: name.into(),
            index_url,
            chamber,
            pattern: LinkPattern::default(),
            max_documents: None,
        }
    }

    pub fn with_pattern(mut self, pattern: LinkPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_max_documents(mut self, max: Option<usize>) -> Self {
        self.max_documents = max;
        self
    }
}

#[async_trait]
impl DocumentSource for IndexPageSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(source = %self.name, url = %self.index_url))]
    async fn list(&self) -> Result<SourceListing> {
        let url = self.index_url.as_str();
        let resp = self
            .client
            .get(url)?
            .send()
            .await
            .map_err(|e| SentinelError::network(url, e))?;

        if !resp.status().is_success() {
            return Err(SentinelError::network(url, format!("HTTP {}", resp.status())));
        }

        let html = resp.text().await.map_err(|e| SentinelError::network(url, e))?;
        let links = parse_index_links(&html, &self.index_url, &self.pattern, self.max_documents);
        info!(n = links.len(), "Index page listed");

        let documents = links
            .into_iter()
            .map(|link| DocumentReference::remote(link, self.chamber))
            .collect();
        Ok(SourceListing::new(documents))
    }
}

/// Extract matching document links from an index page.
///
/// Links are resolved against `base`, filtered by `pattern`, deduplicated in
/// page order (fragments ignored) and capped at `max`.
pub fn parse_index_links(html: &str, base: &Url, pattern: &LinkPattern, max: Option<usize>) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else { continue };
        let href = href.trim();
        if href.is_empty() || href.starts_with("javascript:") || href.starts_with("mailto:") {
            continue;
        }
        match base.join(href) {
            Ok(mut url) if matches!(url.scheme(), "http" | "https") => {
                url.set_fragment(None);
                if pattern.matches(&url) {
                    links.push(url);
                }
            }
            Ok(_) => {}
            Err(e) => debug!(href, error = %e, "Skipping unresolvable link"),
        }
    }

    dedup_and_cap(links, |u| u.to_string(), max)
}
