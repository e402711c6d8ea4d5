//! Turns a validated [`Config`] into a ready-to-run [`Pipeline`].

use std::time::Duration;

use anyhow::Context;
use sentinel_common::SandboxClient;
use sentinel_ingestion::extractor::FallbackExtractor;
use sentinel_ingestion::fetcher::HttpFetcher;
use sentinel_ingestion::match_log::MatchLog;
use sentinel_ingestion::notify::{EmailNotifier, Notifier, PushoverNotifier};
use sentinel_ingestion::ocr::TesseractOcr;
use sentinel_ingestion::pdf_parser::LopdfExtractor;
use sentinel_ingestion::sources::{ArchiveSource, DocumentSource, IndexPageSource, LinkPattern};
use sentinel_ingestion::{Pipeline, PipelineOptions};
use tracing::{info, warn};
use url::Url;

use crate::config::{Config, Secrets, SourceKind, EMAIL_API_KEY_ENV, PUSHOVER_TOKEN_ENV, PUSHOVER_USER_ENV};

/// Sandboxed HTTP client allowing the built-in hosts, every source host and
/// any extra configured domains.
pub fn build_client(config: &Config) -> anyhow::Result<SandboxClient> {
    let mut client = SandboxClient::with_settings(
        Duration::from_secs(config.fetch.timeout_secs),
        &config.fetch.user_agent,
    )?;
    for source in &config.sources {
        let url = Url::parse(&source.url).with_context(|| format!("source '{}'", source.name))?;
        client.allow_url_host(&url);
    }
    for domain in &config.fetch.allowed_domains {
        client.allow_domain(domain);
    }
    let endpoints = config
        .notify
        .pushover
        .iter()
        .filter_map(|p| p.endpoint.as_deref())
        .chain(config.notify.email.iter().filter_map(|e| e.endpoint.as_deref()));
    for endpoint in endpoints {
        let url = Url::parse(endpoint).with_context(|| format!("notification endpoint {endpoint:?}"))?;
        client.allow_url_host(&url);
    }
    Ok(client)
}

pub fn build_sources(config: &Config, client: &SandboxClient) -> anyhow::Result<Vec<Box<dyn DocumentSource>>> {
    let mut sources: Vec<Box<dyn DocumentSource>> = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        let url = Url::parse(&source.url).with_context(|| format!("source '{}'", source.name))?;
        let built: Box<dyn DocumentSource> = match source.kind {
            SourceKind::IndexPage => {
                let mut index = IndexPageSource::new(client.clone(), &source.name, url, source.chamber)
                    .with_max_documents(source.max_documents);
                if let Some(pattern) = &source.link_pattern {
                    index = index.with_pattern(LinkPattern::regex(pattern)?);
                }
                Box::new(index)
            }
            SourceKind::Archive => Box::new(
                ArchiveSource::new(client.clone(), &source.name, url, source.chamber)
                    .with_max_documents(source.max_documents)
                    .with_max_bytes(config.fetch.max_archive_bytes),
            ),
        };
        sources.push(built);
    }
    Ok(sources)
}

pub fn build_extractor(config: &Config) -> FallbackExtractor {
    let extractor = FallbackExtractor::new(Box::new(LopdfExtractor))
        .with_min_text_chars(config.extraction.min_text_chars);
    if !config.extraction.ocr_enabled {
        info!("OCR fallback disabled");
        return extractor;
    }
    let ocr = TesseractOcr::new(config.extraction.ocr_dpi, &config.extraction.ocr_lang);
    if !ocr.is_available() {
        warn!("pdftoppm/tesseract not found, scanned filings will yield no text");
    }
    extractor.with_ocr(Box::new(ocr))
}

/// Channels with complete credentials. Incomplete ones are skipped with a
/// warning.
pub fn build_notifiers(config: &Config, secrets: Secrets, client: &SandboxClient) -> Vec<Box<dyn Notifier>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

    if let Some(pushover) = config.notify.pushover.as_ref().filter(|p| p.enabled) {
        match (secrets.pushover_token, secrets.pushover_user) {
            (Some(token), Some(user)) => {
                let mut notifier = PushoverNotifier::new(client.clone(), token, user).with_priority(pushover.priority);
                if let Some(endpoint) = &pushover.endpoint {
                    notifier = notifier.with_endpoint(endpoint);
                }
                notifiers.push(Box::new(notifier));
            }
            _ => warn!(
                "Pushover configured but credentials missing (set {PUSHOVER_TOKEN_ENV} and {PUSHOVER_USER_ENV})"
            ),
        }
    }

    if let Some(email) = &config.notify.email {
        match secrets.email_api_key {
            Some(key) => {
                let mut notifier = EmailNotifier::new(client.clone(), key, &email.from, email.to.clone());
                if let Some(endpoint) = &email.endpoint {
                    notifier = notifier.with_endpoint(endpoint);
                }
                notifiers.push(Box::new(notifier));
            }
            None => warn!("Email configured but no API key found (set {EMAIL_API_KEY_ENV})"),
        }
    }

    notifiers
}

pub fn build_pipeline(config: &Config, secrets: Secrets, dry_run: bool) -> anyhow::Result<Pipeline> {
    let client = build_client(config)?;
    let fetcher = HttpFetcher::new(client.clone()).with_max_bytes(config.fetch.max_document_bytes);

    let mut pipeline = Pipeline::new(
        Box::new(fetcher),
        build_extractor(config),
        config.keyword_set()?,
        MatchLog::new(&config.log.path),
    )
    .with_options(PipelineOptions {
        title: config.notify.title.clone(),
        policy: config.notify.policy,
        suppress_repeats: config.notify.suppress_repeats,
        dry_run,
    });

    for source in build_sources(config, &client)? {
        pipeline = pipeline.with_source(source);
    }
    for notifier in build_notifiers(config, secrets, &client) {
        pipeline = pipeline.with_notifier(notifier);
    }
    Ok(pipeline)
}
