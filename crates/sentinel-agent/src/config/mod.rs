//! Configuration loading for Sentinel.
//! Reads sentinel.toml from the current directory or the path in the
//! SENTINEL_CONFIG env var. Secrets only ever come from the environment.

use std::path::Path;

use secrecy::SecretString;
use sentinel_ingestion::extractor::DEFAULT_MIN_TEXT_CHARS;
use sentinel_ingestion::fetcher::DEFAULT_MAX_DOCUMENT_BYTES;
use sentinel_ingestion::sources::DEFAULT_MAX_ARCHIVE_BYTES;
use sentinel_ingestion::match_log::DEFAULT_LOG_PATH;
use sentinel_ingestion::matcher::{KeywordSet, DEFAULT_KEYWORDS};
use sentinel_ingestion::models::Chamber;
use sentinel_ingestion::notify::{NotifyPolicy, DEFAULT_TITLE};
use sentinel_ingestion::sources::LinkPattern;
use serde::{Deserialize, Serialize};
use url::Url;

pub const CONFIG_ENV: &str = "SENTINEL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "sentinel.toml";
pub const KEYWORDS_ENV: &str = "SENTINEL_KEYWORDS";
pub const PUSHOVER_TOKEN_ENV: &str = "PUSHOVER_API_TOKEN";
pub const PUSHOVER_USER_ENV: &str = "PUSHOVER_USER_KEY";
pub const EMAIL_API_KEY_ENV: &str = "SENTINEL_EMAIL_API_KEY";

pub const HOUSE_DISCLOSURE_URL: &str =
    "https://disclosures-clerk.house.gov/PublicDisclosure/FinancialDisclosure";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_sources() -> Vec<SourceConfig> {
    vec![SourceConfig {
        name: "house".to_string(),
        chamber: Chamber::House,
        kind: SourceKind::IndexPage,
        url: HOUSE_DISCLOSURE_URL.to_string(),
        link_pattern: None,
        max_documents: None,
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            sources: default_sources(),
            fetch: FetchConfig::default(),
            extraction: ExtractionConfig::default(),
            log: LogConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    IndexPage,
    Archive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub chamber: Chamber,
    #[serde(default)]
    pub kind: SourceKind,
    pub url: String,
    /// Regex over the link path. Defaults to "ends with .pdf".
    pub link_pattern: Option<String>,
    pub max_documents: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,
    /// Cap on a whole archive download for `kind = "archive"` sources.
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Extra hosts on top of the built-in allowlist and source hosts.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

fn default_timeout_secs()       -> u64    { 20 }
fn default_max_document_bytes() -> u64    { DEFAULT_MAX_DOCUMENT_BYTES }
fn default_max_archive_bytes()  -> u64    { DEFAULT_MAX_ARCHIVE_BYTES }
fn default_user_agent()         -> String { sentinel_common::sandbox::DEFAULT_USER_AGENT.to_string() }

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_document_bytes: default_max_document_bytes(),
            max_archive_bytes: default_max_archive_bytes(),
            user_agent: default_user_agent(),
            allowed_domains: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    #[serde(default = "bool_true")]
    pub ocr_enabled: bool,
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,
    #[serde(default = "default_ocr_lang")]
    pub ocr_lang: String,
}

fn default_min_text_chars() -> usize  { DEFAULT_MIN_TEXT_CHARS }
fn bool_true()              -> bool   { true }
fn default_ocr_dpi()        -> u32    { 300 }
fn default_ocr_lang()       -> String { "eng".to_string() }

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text_chars(),
            ocr_enabled: true,
            ocr_dpi: default_ocr_dpi(),
            ocr_lang: default_ocr_lang(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_path")]
    pub path: String,
}

fn default_log_path() -> String { DEFAULT_LOG_PATH.to_string() }

impl Default for LogConfig {
    fn default() -> Self {
        Self { path: default_log_path() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub policy: NotifyPolicy,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub suppress_repeats: bool,
    #[serde(default = "default_pushover")]
    pub pushover: Option<PushoverConfig>,
    pub email: Option<EmailConfig>,
}

fn default_title()    -> String                 { DEFAULT_TITLE.to_string() }
fn default_pushover() -> Option<PushoverConfig> { Some(PushoverConfig::default()) }

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            policy: NotifyPolicy::default(),
            title: default_title(),
            suppress_repeats: false,
            pushover: default_pushover(),
            email: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushoverConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Pushover priority, -2..=2.
    pub priority: Option<i8>,
    pub endpoint: Option<String>,
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self { enabled: true, priority: None, endpoint: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub from: String,
    pub to: Vec<String>,
    pub endpoint: Option<String>,
}

/// Channel credentials read from the environment.
#[derive(Debug, Default)]
pub struct Secrets {
    pub pushover_token: Option<SecretString>,
    pub pushover_user: Option<SecretString>,
    pub email_api_key: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            pushover_token: secret_var(PUSHOVER_TOKEN_ENV),
            pushover_user: secret_var(PUSHOVER_USER_ENV),
            email_api_key: secret_var(EMAIL_API_KEY_ENV),
        }
    }
}

fn secret_var(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}


impl Config {
    /// Load configuration from sentinel.toml.
    /// Checks SENTINEL_CONFIG env var first, then current directory. A
    /// missing file yields the built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            tracing::info!("No config file at {path}, using built-in defaults");
            Self::default()
        };

        if let Ok(raw) = std::env::var(KEYWORDS_ENV) {
            config.apply_keyword_override(&raw);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Replace the keyword list with a comma separated override. A blank
    /// override is ignored.
    pub fn apply_keyword_override(&mut self, raw: &str) {
        let keywords: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        if !keywords.is_empty() {
            self.keywords = keywords;
        }
    }

    /// Reject anything that would only fail halfway through a run.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.keyword_set()?;

        if self.sources.is_empty() {
            anyhow::bail!("No sources configured");
        }
        for source in &self.sources {
            let url = Url::parse(&source.url)
                .map_err(|e| anyhow::anyhow!("Source '{}': invalid url {:?}: {e}", source.name, source.url))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("Source '{}': url must be http(s)", source.name);
            }
            if let Some(pattern) = &source.link_pattern {
                LinkPattern::regex(pattern)
                    .map_err(|e| anyhow::anyhow!("Source '{}': invalid link_pattern: {e}", source.name))?;
            }
        }

        if self.fetch.timeout_secs == 0 {
            anyhow::bail!("fetch.timeout_secs must be positive");
        }
        if self.fetch.max_document_bytes == 0 || self.fetch.max_archive_bytes == 0 {
            anyhow::bail!("fetch byte limits must be positive");
        }
        if let Some(pushover) = &self.notify.pushover {
            if let Some(p) = pushover.priority {
                if !(-2..=2).contains(&p) {
                    anyhow::bail!("notify.pushover.priority must be between -2 and 2");
                }
            }
        }
        if let Some(email) = &self.notify.email {
            if email.to.is_empty() {
                anyhow::bail!("notify.email.to needs at least one recipient");
            }
        }
        Ok(())
    }

    pub fn keyword_set(&self) -> anyhow::Result<KeywordSet> {
        Ok(KeywordSet::new(&self.keywords)?)
    }
}
