extern crate clap;

mod cancel;
mod config;
mod errors;
mod history;
mod probe;
mod progress;
mod results;
mod retry;
mod session;
mod stats;

use crate::config::{
    Endpoint, ProbeConfig, DEFAULT_REFERENCE_URL, DEFAULT_THROUGHPUT_URL,
};
use crate::errors::ProbeError;
use crate::history::HistoryEntry;
use crate::probe::client::Client;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::results::bits_to_mbps;
use crate::session::SessionController;
use chrono::{DateTime, Utc};
use clap::Parser;
use colored::Colorize;
use log::{debug, warn};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Latency reference URL (any quick 2xx response works)
    #[arg(long, default_value = DEFAULT_REFERENCE_URL)]
    reference_url: String,

    /// Throughput URL supporting a `bytes` query parameter
    #[arg(long, default_value = DEFAULT_THROUGHPUT_URL)]
    throughput_url: String,

    /// Number of sequential latency attempts
    #[arg(long, default_value_t = 10)]
    latency_attempts: usize,

    /// Download payload cap in bytes
    #[arg(long, default_value_t = 50 * 1024 * 1024)]
    download_max_bytes: u64,

    /// Download time budget in milliseconds
    #[arg(long, default_value_t = 10_000)]
    download_time_budget_ms: u64,

    /// Upload display window in milliseconds
    #[arg(long, default_value_t = 5_000)]
    upload_window_ms: u64,

    /// Minimum spacing between rate samples in milliseconds
    #[arg(long, default_value_t = 100)]
    sample_interval_ms: u64,

    /// History file location
    #[arg(long, default_value = "netpulse_history.json")]
    history_file: PathBuf,

    /// Maximum number of stored history entries
    #[arg(long, default_value_t = 10)]
    history_cap: usize,

    /// Label for the serving node stored with the result
    #[arg(long, default_value = "unknown")]
    node: String,

    /// Label for the ISP stored with the result
    #[arg(long, default_value = "unknown")]
    isp: String,

    /// Print the completed result as JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity,
}

/// Progress rendering for a terminal: phase headlines on stdout, the
/// per-sample firehose at debug level.
struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn on_progress(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::PhaseChange(phase) => {
                println!(
                    "{} {}",
                    "Phase:".bold().white(),
                    phase.to_string().bright_blue()
                );
            }
            ProgressEvent::LatencyProgress {
                running_mean_ms,
                current,
                total,
            } => {
                debug!(
                    "latency {}/{}: running mean {:.1} ms",
                    current, total, running_mean_ms
                );
            }
            ProgressEvent::RateSample { phase, bits_per_second, .. } => {
                debug!(
                    "{} rate: {:.1} Mbps",
                    phase,
                    bits_to_mbps(bits_per_second)
                );
            }
            ProgressEvent::Complete(_) => {}
            ProgressEvent::Error(kind) => {
                warn!("session error: {}", kind.description());
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbosity.log_level_filter())
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("{}", err);
        std::process::exit(err.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), ProbeError> {
    let config = ProbeConfig {
        reference: Endpoint::parse("reference", &cli.reference_url)?,
        throughput: Endpoint::parse("throughput", &cli.throughput_url)?,
        latency_attempts: cli.latency_attempts,
        download_max_bytes: cli.download_max_bytes,
        download_time_budget: Duration::from_millis(
            cli.download_time_budget_ms,
        ),
        upload_window: Duration::from_millis(cli.upload_window_ms),
        sample_emit_interval: Duration::from_millis(cli.sample_interval_ms),
        history_cap: cli.history_cap,
        history_path: cli.history_file.clone(),
        node: cli.node.clone(),
        isp: cli.isp.clone(),
        ..ProbeConfig::default()
    };

    let client =
        Client::new(config.reference.clone(), config.throughput.clone());
    let controller = SessionController::new(client, config);

    let Some(result) = controller.run_once(&ConsoleSink).await? else {
        return Ok(());
    };

    if cli.json {
        let entry = HistoryEntry::from(&result);
        let json = serde_json::to_string_pretty(&entry).map_err(|e| {
            ProbeError::persistence("failed to serialize result")
                .with_source(e)
        })?;
        println!("{}", json);
        return Ok(());
    }

    println!();
    println!(
        "{} {} ms",
        "Latency:".bold().white(),
        result.latency.mean_ms().round()
    );
    println!(
        "{} {} ms",
        "Jitter:".bold().white(),
        result.latency.jitter_ms().round()
    );
    println!(
        "{} {}",
        "Download:".bold().white(),
        format!("{:.1} Mbps", result.download.mbps()).bright_cyan()
    );
    println!(
        "{} {}",
        "Upload (estimated):".bold().white(),
        format!("{:.1} Mbps", result.upload_mbps()).bright_cyan()
    );
    println!(
        "{} {} s",
        "Duration:".bold().white(),
        result.duration_secs()
    );

    let history = controller.history();
    if !history.is_empty() {
        println!();
        println!("{}", "Recent results:".bold().white());
        for entry in &history {
            println!(
                "  {}  ping {} ms  down {:.1} Mbps  up {:.1} Mbps  ({})",
                format_timestamp(entry.timestamp),
                entry.ping,
                entry.download,
                entry.upload,
                entry.node
            );
        }
    }

    Ok(())
}

fn format_timestamp(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .map(|when| when.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
