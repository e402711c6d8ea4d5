use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use url::Url;

use crate::error::SentinelError;

/// Default per-request timeout for disclosure sites.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

pub const DEFAULT_USER_AGENT: &str = concat!("disclosure-sentinel/", env!("CARGO_PKG_VERSION"));

/// Redirect hops followed before a request is abandoned.
pub const MAX_REDIRECTS: usize = 10;

type Allowlist = Arc<RwLock<HashSet<String>>>;

/// An HTTP client capped to an allowlist of domains.
///
/// A host is allowed if it equals an allowlisted domain or is a subdomain of
/// one (`efdsearch.senate.gov` is allowed by `senate.gov`). Every redirect
/// hop is checked against the same allowlist; a hop to any other host fails
/// the request. Clones share one allowlist.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: Allowlist,
}

impl SandboxClient {
    /// Creates a client with the default disclosure/notification allowlist.
    pub fn new() -> Result<Self, SentinelError> {
        Self::with_settings(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, SentinelError> {
        let domains = [
            "house.gov",         // Clerk of the House disclosures
            "senate.gov",        // Senate eFD
            "api.pushover.net",  // Push notifications
            "api.resend.com",    // Email API
            "localhost",
            "127.0.0.1",
        ];
        let allowlist: Allowlist = Arc::new(RwLock::new(domains.iter().map(|d| d.to_string()).collect()));

        let hops = Arc::clone(&allowlist);
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::custom(move |attempt| follow_if_allowed(&hops, attempt)))
            .build()
            .map_err(|e| SentinelError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
        if !domain.is_empty() {
            self.allowlist
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(domain);
        }
    }

    /// Allows the host of `url`, if it has one.
    pub fn allow_url_host(&mut self, url: &Url) {
        if let Some(host) = url.host_str() {
            self.allow_domain(host);
        }
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|parsed| host_allowed(&self.allowlist, &parsed))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, SentinelError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, SentinelError> {
        self.check(url)?;
        Ok(self.client.post(url))
    }

    fn check(&self, url: &str) -> Result<(), SentinelError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(SentinelError::Blocked(url.to_string()))
        }
    }
}

fn host_allowed(allowlist: &Allowlist, url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    allowlist
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .iter()
        .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)))
}

fn follow_if_allowed(allowlist: &Allowlist, attempt: Attempt) -> reqwest::redirect::Action {
    if attempt.previous().len() >= MAX_REDIRECTS {
        return attempt.error(format!("more than {MAX_REDIRECTS} redirects"));
    }
    if host_allowed(allowlist, attempt.url()) {
        attempt.follow()
    } else {
        let target = attempt.url().to_string();
        tracing::warn!(%target, "Blocked redirect to host outside the allowlist");
        attempt.error(SentinelError::Blocked(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::response::Redirect;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    async fn serve_on(addr: &str, app: Router) -> String {
        let listener = TcpListener::bind(addr).await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base
    }

    #[test]
    fn test_subdomains_of_allowed_domains_pass() {
        let client = SandboxClient::new().unwrap();
        assert!(client.is_allowed("https://disclosures-clerk.house.gov/public_disc/ptr-pdfs/2025/20026590.pdf"));
        assert!(client.is_allowed("https://efdsearch.senate.gov/search/"));
        assert!(client.is_allowed("http://127.0.0.1:8080/index.html"));
    }

    #[test]
    fn test_lookalike_hosts_are_blocked() {
        let client = SandboxClient::new().unwrap();
        assert!(!client.is_allowed("https://evilhouse.gov/a.pdf"));
        assert!(!client.is_allowed("https://house.gov.example.com/a.pdf"));
        assert!(!client.is_allowed("not a url"));
    }

    #[test]
    fn test_allow_url_host_extends_allowlist() {
        let mut client = SandboxClient::new().unwrap();
        let url = Url::parse("https://filings.example.org/index.html").unwrap();
        assert!(!client.is_allowed(url.as_str()));
        client.allow_url_host(&url);
        assert!(client.is_allowed("https://filings.example.org/2025/a.pdf"));
        assert!(matches!(client.get("https://other.example.org/"), Err(SentinelError::Blocked(_))));
    }

    #[test]
    fn test_clones_share_the_allowlist() {
        let mut client = SandboxClient::new().unwrap();
        let clone = client.clone();
        client.allow_domain(".Mirror.Example.com ");
        assert!(clone.is_allowed("https://cdn.mirror.example.com/a.pdf"));
    }

    #[tokio::test]
    async fn test_redirect_to_host_outside_allowlist_is_refused() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let outside = serve_on(
            "127.0.0.2:0",
            Router::new().route(
                "/x.pdf",
                get(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { "%PDF-1.4" }
                }),
            ),
        )
        .await;

        let target = format!("{outside}/x.pdf");
        let redirect_to = target.clone();
        let inside = serve_on(
            "127.0.0.1:0",
            Router::new().route(
                "/a.pdf",
                get(move || {
                    let to = redirect_to.clone();
                    async move { Redirect::temporary(&to) }
                }),
            ),
        )
        .await;

        let client = SandboxClient::new().unwrap();
        assert!(!client.is_allowed(&target));

        let err = client.get(&format!("{inside}/a.pdf")).unwrap().send().await.unwrap_err();
        assert!(err.is_redirect());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_redirect_within_allowlist_is_followed() {
        let app = Router::new()
            .route("/old.pdf", get(|| async { Redirect::permanent("/new.pdf") }))
            .route("/new.pdf", get(|| async { "%PDF-1.4 moved" }));
        let base = serve_on("127.0.0.1:0", app).await;

        let client = SandboxClient::new().unwrap();
        let resp = client.get(&format!("{base}/old.pdf")).unwrap().send().await.unwrap();
        assert_eq!(resp.url().path(), "/new.pdf");
        assert_eq!(resp.text().await.unwrap(), "%PDF-1.4 moved");
    }
}
