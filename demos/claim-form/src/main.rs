//! Command-line demo for the claim form.
//!
//! Submits each identifier given on the command line and prints the
//! notifications, the outcome of every submission, and the final list.

use anyhow::{Context, Result};
use clap::Parser;
use claim_form::{ClaimConfig, ClaimForm, SimulatedEmailClient, SubmissionEnvironment, SubmitOutcome};
use composable_forms_core::environment::SystemClock;
use composable_forms_core::mutation::OverlapPolicy;
use composable_forms_core::notification::Notification;
use composable_forms_core::request::{IdentifierValidator, Status, SubmissionRequest};
use composable_forms_runtime::metrics::MetricsRecorder;
use composable_forms_runtime::notify::ChannelSink;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Claim usernames through a simulated confirmation email.
///
/// Settings default to the `CLAIM_*` environment variables (a `.env` file is
/// loaded first if present); flags override them.
#[derive(Debug, Parser)]
#[command(name = "claim-form", version)]
struct Cli {
    /// Identifiers to claim, submitted in order
    #[arg(required = true)]
    identifiers: Vec<String>,

    /// Simulated email latency in milliseconds
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Probability in [0, 1] that a send fails
    #[arg(long)]
    failure_rate: Option<f64>,

    /// Seed for reproducible failures
    #[arg(long)]
    seed: Option<u64>,

    /// Where pending entries are shown: optimistic or direct
    #[arg(long)]
    mode: Option<claim_form::SubmissionMode>,

    /// How overlapping submissions share the mutation flags: isolated or shared
    #[arg(long)]
    overlap: Option<OverlapPolicy>,

    /// Start every submission before waiting for any of them
    #[arg(long)]
    concurrent: bool,

    /// Retry each failed identifier once
    #[arg(long)]
    retry_failed: bool,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,

    /// Print a Prometheus metrics snapshot at the end
    #[arg(long)]
    metrics: bool,

    /// Read CLAIM_* settings from this file instead of `.env`
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> Result<ClaimConfig> {
        let mut config = match &self.env_file {
            Some(path) => ClaimConfig::from_env_file(path)?,
            None => ClaimConfig::from_env().context("invalid CLAIM_* environment")?,
        };
        if let Some(latency_ms) = self.latency_ms {
            config.latency_ms = latency_ms;
        }
        if let Some(failure_rate) = self.failure_rate {
            config.failure_rate = failure_rate;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(overlap) = self.overlap {
            config.overlap = overlap;
        }
        config.validate().context("invalid command-line settings")?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct Report<'a> {
    config: &'a ClaimConfig,
    outcomes: Vec<(String, SubmitOutcome)>,
    notifications: Vec<Notification>,
    list: Vec<SubmissionRequest>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.env_file.is_none() {
        // CLAIM_* settings may come from a .env file
        let _ = dotenvy::dotenv();
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = cli.config()?;

    let recorder = if cli.metrics {
        Some(MetricsRecorder::install()?)
    } else {
        None
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(&cli, &config))?;

    if let Some(snapshot) = recorder.as_ref().and_then(MetricsRecorder::render) {
        println!("{snapshot}");
    }
    Ok(())
}

async fn run(cli: &Cli, config: &ClaimConfig) -> Result<()> {
    let (sink, mut notifications) = ChannelSink::new();
    let client = SimulatedEmailClient::new(config.latency(), config.fault_injector());
    let env = SubmissionEnvironment::new(Arc::new(client), Arc::new(sink), Arc::new(SystemClock))
        .with_validator(Arc::new(IdentifierValidator::with_min_len(config.min_identifier_len)))
        .with_overlap_policy(config.overlap);
    let form = ClaimForm::new(config.mode, env);

    tracing::info!(?config, "Claim form ready");

    let mut outcomes = Vec::new();
    if cli.concurrent {
        for identifier in &cli.identifiers {
            form.start(identifier.clone()).await?;
        }
        if !cli.json {
            print_list("While pending", &form.display_list().await);
        }
        let budget = config.latency() * 2 + Duration::from_secs(5);
        form.settle_all(budget).await?;
    } else {
        for identifier in &cli.identifiers {
            let outcome = form.submit(identifier.clone()).await?;
            outcomes.push((identifier.clone(), outcome));
        }
    }

    if cli.retry_failed {
        let failed: Vec<String> = form
            .log()
            .await
            .iter()
            .filter(|r| r.status == Status::Error)
            .map(|r| r.identifier.clone())
            .collect();
        for identifier in failed {
            let outcome = form.retry(identifier.clone()).await?;
            outcomes.push((identifier, outcome));
        }
    }

    form.shutdown(Duration::from_secs(5)).await?;

    let mut delivered = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        delivered.push(notification);
    }
    let list = form.display_list().await;

    if cli.json {
        let report = Report {
            config,
            outcomes,
            notifications: delivered,
            list,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for notification in &delivered {
            println!("[{:?}] {}", notification.kind, notification.message);
        }
        for (identifier, outcome) in &outcomes {
            match outcome {
                SubmitOutcome::Invalid { error } => println!("{identifier}: {error}"),
                SubmitOutcome::Failed { message, .. } => println!("{identifier}: failed ({message})"),
                SubmitOutcome::Requested { .. } => println!("{identifier}: requested"),
                SubmitOutcome::Ignored => println!("{identifier}: ignored"),
            }
        }
        print_list("Final list", &list);
    }

    Ok(())
}

fn print_list(title: &str, list: &[SubmissionRequest]) {
    println!("{title} ({} entries):", list.len());
    for entry in list {
        println!("  {:<16} {}", entry.identifier, entry.status);
    }
}
