//! CLI entry point for the TAPR scraper.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tapr_core::{
    DistrictTypeFetcher, DownloadOutcome, FormSessionProvider, Level, Orchestrator,
    OrchestratorConfig, ProgressSink, Request, StdoutSink, request,
};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let years = request::parse_years(&args.years);
    let variables = request::parse_variables(&args.variables);
    let level = Level::parse(&args.level)?;
    let request = Request::new(
        args.directory,
        years,
        variables,
        level,
        !args.no_district_types,
    )?;

    let provider = FormSessionProvider::new()?;
    let fetcher = DistrictTypeFetcher::new(reqwest::Client::new());
    let progress: Arc<dyn ProgressSink> = if args.quiet {
        Arc::new(tapr_core::NullSink)
    } else {
        Arc::new(StdoutSink)
    };

    let config = OrchestratorConfig {
        watch_timeout: Duration::from_secs(args.timeout),
        ..OrchestratorConfig::default()
    };
    let orchestrator =
        Orchestrator::with_config(Box::new(provider), Box::new(fetcher), progress, config);

    let summary = orchestrator.run(&request).await?;

    info!(
        years = summary.years.len(),
        skipped_years = summary.skipped_years(),
        downloaded = summary.count(DownloadOutcome::Downloaded),
        already_present = summary.count(DownloadOutcome::AlreadyPresent),
        unavailable = summary.count(DownloadOutcome::UnavailableOnSite),
        timed_out = summary.count(DownloadOutcome::TimedOut),
        "batch finished"
    );

    Ok(())
}
