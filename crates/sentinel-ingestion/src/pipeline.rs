//! End-to-end disclosure pipeline.
//!
//! Orchestrates one run:
//!   1. List documents from each configured source
//!   2. Deduplicate references across sources by identifier
//!   3. Fetch each document into scoped temp storage
//!   4. Extract text (primary, OCR fallback) on the blocking pool
//!   5. Match keywords and append each match to the log
//!   6. Notify every configured channel at most once
//!
//! The pipeline is the only place that decides skip-vs-abort: a failing
//! source, document or channel is logged, recorded in the summary, and the
//! run carries on. Documents are processed one at a time.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sentinel_common::{ErrorKind, SentinelError};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::extractor::FallbackExtractor;
use crate::fetcher::DocumentFetcher;
use crate::match_log::MatchLog;
use crate::matcher::KeywordSet;
use crate::models::{log_identifier, DocumentReference, ExtractionResult, MatchRecord};
use crate::notify::{NotificationRequest, Notifier, NotifyPolicy, DEFAULT_TITLE};
use crate::sources::DocumentSource;

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Notification title / email subject.
    pub title: String,
    pub policy: NotifyPolicy,
    /// Leave documents already present in the match log out of notifications.
    pub suppress_repeats: bool,
    /// Skip every notification channel.
    pub dry_run: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            policy: NotifyPolicy::OnMatch,
            suppress_repeats: false,
            dry_run: false,
        }
    }
}

// ── Result summary ───────────────────────────────────────────────────────────

/// One recoverable failure recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RunError {
    fn new(context: impl fmt::Display, error: &SentinelError) -> Self {
        Self { kind: error.kind(), message: format!("{context}: {error}") }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

/// Outcome of one run. Serializes to the `run --json` output.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub sources_listed: usize,
    pub sources_failed: usize,
    pub documents_found: usize,
    pub documents_processed: usize,
    pub fetch_failures: usize,
    pub empty_extractions: usize,
    pub ocr_invocations: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub matches: Vec<MatchRecord>,
    pub errors: Vec<RunError>,
    pub duration_ms: u64,
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            sources_listed: 0,
            sources_failed: 0,
            documents_found: 0,
            documents_processed: 0,
            fetch_failures: 0,
            empty_extractions: 0,
            ocr_invocations: 0,
            notifications_sent: 0,
            notifications_failed: 0,
            matches: Vec::new(),
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Every configured source failed to list.
    pub fn is_total_failure(&self) -> bool {
        self.sources_listed == 0 && self.sources_failed > 0
    }

    pub fn errors_of(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }
}

// ── Pipeline orchestrator ────────────────────────────────────────────────────

pub struct Pipeline {
    sources: Vec<Box<dyn DocumentSource>>,
    fetcher: Box<dyn DocumentFetcher>,
    extractor: Arc<FallbackExtractor>,
    keywords: KeywordSet,
    log: MatchLog,
    notifiers: Vec<Box<dyn Notifier>>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        fetcher: Box<dyn DocumentFetcher>,
        extractor: FallbackExtractor,
        keywords: KeywordSet,
        log: MatchLog,
    ) -> Self {
        Self {
            sources: Vec::new(),
            fetcher,
            extractor: Arc::new(extractor),
            keywords,
            log,
            notifiers: Vec::new(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_source(mut self, source: Box<dyn DocumentSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn log(&self) -> &MatchLog {
        &self.log
    }

    /// Run the pipeline once. Never fails; problems end up in
    /// [`RunSummary::errors`].
    #[instrument(skip(self), fields(sources = self.sources.len(), notifiers = self.notifiers.len()))]
    pub async fn run(&self) -> RunSummary {
        let run_id = Uuid::new_v4();
        let t0 = Instant::now();
        let mut summary = RunSummary::new(run_id);
        info!(run_id = %run_id, "Starting disclosure run");

        let known = if self.options.suppress_repeats {
            self.known_documents(&mut summary)
        } else {
            HashSet::new()
        };

        // ── 1. List and process each source ─────────────────────────────────
        let mut seen: HashSet<String> = HashSet::new();
        for source in &self.sources {
            let listing = match source.list().await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Source listing failed, continuing with zero documents");
                    summary.sources_failed += 1;
                    summary.errors.push(RunError::new(source.name(), &e));
                    continue;
                }
            };
            summary.sources_listed += 1;
            info!(source = source.name(), documents = listing.len(), "Source listed");

            // `listing` owns any extraction directory; it stays alive until
            // its documents are done.
            for doc in &listing.documents {
                if !seen.insert(doc.identifier()) {
                    debug!(document = %doc, "Duplicate reference skipped");
                    continue;
                }
                summary.documents_found += 1;
                self.process_document(doc, &mut summary).await;
            }
        }

        // ── 2. Notify ───────────────────────────────────────────────────────
        self.notify(&known, &mut summary).await;

        summary.duration_ms = t0.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            sources_listed = summary.sources_listed,
            sources_failed = summary.sources_failed,
            documents = summary.documents_processed,
            fetch_failures = summary.fetch_failures,
            ocr = summary.ocr_invocations,
            matches = summary.matches.len(),
            notifications = summary.notifications_sent,
            duration_ms = summary.duration_ms,
            "Run complete: {} match(es) in {} document(s)",
            summary.matches.len(),
            summary.documents_processed
        );
        summary
    }

    async fn process_document(&self, doc: &DocumentReference, summary: &mut RunSummary) {
        let fetched = match self.fetcher.fetch(doc).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(document = %doc, error = %e, "Fetch failed, skipping document");
                summary.fetch_failures += 1;
                summary.errors.push(RunError::new(doc, &e));
                return;
            }
        };
        debug!(document = %doc, bytes = fetched.size, "Fetched");

        // `fetched` owns the spooled file; it is dropped only after extraction.
        let extractor = Arc::clone(&self.extractor);
        let identifier = doc.identifier();
        let path = fetched.path().to_path_buf();
        let extraction = match tokio::task::spawn_blocking(move || extractor.extract(&identifier, &path)).await {
            Ok(result) => result,
            Err(e) => {
                error!(document = %doc, error = %e, "Extraction task panicked");
                let failed = SentinelError::extraction(doc.identifier(), format!("extraction task failed: {e}"));
                summary.errors.push(RunError::new(doc, &failed));
                ExtractionResult::empty(false)
            }
        };
        drop(fetched);

        summary.documents_processed += 1;
        if extraction.ocr_attempted {
            summary.ocr_invocations += 1;
        }
        if extraction.is_empty() {
            debug!(document = %doc, "No text extracted");
            summary.empty_extractions += 1;
            return;
        }

        let Some(hit) = self.keywords.find(&extraction.text) else {
            debug!(document = %doc, method = extraction.method.as_str(), "No keyword match");
            return;
        };

        let record = MatchRecord::new(doc, hit.keyword, &hit.snippet, Utc::now());
        info!(
            document = %doc,
            keyword = %record.keyword,
            method = extraction.method.as_str(),
            "🎯 Keyword match"
        );
        if let Err(e) = self.log.append(&record) {
            error!(document = %doc, path = %self.log.path().display(), error = %e, "Failed to append match log");
            summary.errors.push(RunError::new("match log", &e));
        }
        summary.matches.push(record);
    }

    async fn notify(&self, known: &HashSet<String>, summary: &mut RunSummary) {
        let fresh: Vec<MatchRecord> = summary
            .matches
            .iter()
            .filter(|m| !known.contains(&log_identifier(&m.document)))
            .cloned()
            .collect();
        if fresh.len() < summary.matches.len() {
            info!(suppressed = summary.matches.len() - fresh.len(), "Repeat matches left out of notification");
        }

        let request = if !fresh.is_empty() {
            NotificationRequest::from_matches(&self.options.title, &fresh)
        } else if self.options.policy == NotifyPolicy::Always {
            NotificationRequest::no_matches(&self.options.title, summary.documents_processed)
        } else {
            debug!("Nothing to notify");
            return;
        };

        if self.options.dry_run {
            info!(links = request.links.len(), "Dry run, notifications skipped");
            return;
        }
        if self.notifiers.is_empty() {
            warn!("No notification channel configured");
            return;
        }

        for notifier in &self.notifiers {
            match notifier.send(&request).await {
                Ok(()) => summary.notifications_sent += 1,
                Err(e) => {
                    warn!(channel = notifier.channel(), error = %e, "Notification failed");
                    summary.notifications_failed += 1;
                    summary.errors.push(RunError::new(notifier.channel(), &e));
                }
            }
        }
    }

    fn known_documents(&self, summary: &mut RunSummary) -> HashSet<String> {
        match self.log.known_documents() {
            Ok(known) => known,
            Err(e) => {
                warn!(path = %self.log.path().display(), error = %e, "Could not read match log, no repeats suppressed");
                summary.errors.push(RunError::new("match log", &e));
                HashSet::new()
            }
        }
    }
}
