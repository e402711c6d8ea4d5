//! Sentinel: congressional disclosure keyword watcher.
//! Entry point for the `sentinel` binary.

mod config;
mod setup;

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use sentinel_ingestion::match_log::MatchLog;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Secrets};

#[derive(Parser, Debug)]
#[command(name = "sentinel", version, about = "Scan House/Senate disclosure filings for watched keywords")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline once (default).
    Run(RunArgs),
    /// Load and validate the configuration, then print it.
    CheckConfig,
    /// Print the most recent match log entries.
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Exit with status 1 when every source failed to list.
    #[arg(long)]
    strict: bool,
    /// Scan and log, but send no notifications.
    #[arg(long)]
    dry_run: bool,
    /// Print the run summary as JSON instead of match lines.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // .env is optional
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sentinel=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run(config, args).await,
        Command::CheckConfig => {
            check_config(&config);
            Ok(ExitCode::SUCCESS)
        }
        Command::History { limit } => {
            history(&config, limit)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(config: Config, args: RunArgs) -> anyhow::Result<ExitCode> {
    info!("🔎 Sentinel v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Watching {} keyword(s) across {} source(s)",
        config.keywords.len(),
        config.sources.len()
    );

    let pipeline = setup::build_pipeline(&config, Secrets::from_env(), args.dry_run)?;
    let summary = pipeline.run().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for record in &summary.matches {
            println!("{}", record.to_log_line());
        }
    }
    for error in &summary.errors {
        warn!("{error}");
    }

    if args.strict && summary.is_total_failure() {
        warn!("Every source failed to list");
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn check_config(config: &Config) {
    let secrets = Secrets::from_env();

    println!("Keywords: {}", config.keywords.join(", "));
    println!("Sources:");
    for source in &config.sources {
        println!("  - {} [{} {:?}] {}", source.name, source.chamber, source.kind, source.url);
    }
    println!(
        "Extraction: min_text_chars={} ocr={}",
        config.extraction.min_text_chars, config.extraction.ocr_enabled
    );
    println!(
        "Limits: document={}B archive={}B timeout={}s",
        config.fetch.max_document_bytes, config.fetch.max_archive_bytes, config.fetch.timeout_secs
    );
    println!("Match log: {}", config.log.path);
    println!("Policy: {:?} (suppress_repeats={})", config.notify.policy, config.notify.suppress_repeats);

    match &config.notify.pushover {
        Some(p) if p.enabled => {
            let ready = secrets.pushover_token.is_some() && secrets.pushover_user.is_some();
            println!("Pushover: {}", if ready { "ready" } else { "missing credentials" });
        }
        _ => println!("Pushover: disabled"),
    }
    match &config.notify.email {
        Some(email) => {
            let ready = secrets.email_api_key.is_some();
            println!(
                "Email: {} -> {} ({})",
                email.from,
                email.to.join(", "),
                if ready { "ready" } else { "missing API key" }
            );
        }
        None => println!("Email: disabled"),
    }
}

fn history(config: &Config, limit: usize) -> anyhow::Result<()> {
    let log = MatchLog::new(&config.log.path);
    let entries = log.tail(limit)?;
    if entries.is_empty() {
        println!("No matches recorded in {}", log.path().display());
        return Ok(());
    }
    for entry in entries {
        println!("{}  {}\n    {}", entry.timestamp.format("%Y-%m-%d %H:%M"), entry.identifier, entry.snippet);
    }
    Ok(())
}
