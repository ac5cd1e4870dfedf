//! Engine configuration.
//!
//! Everything the engine needs is passed in here explicitly; the
//! measurement code holds no ambient globals. Endpoints are parsed into
//! typed descriptors once, at configuration load, not per request.

use crate::errors::ProbeError;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default reference endpoint for latency sampling.
pub const DEFAULT_REFERENCE_URL: &str = "https://1.1.1.1/cdn-cgi/trace";

/// Default endpoint serving range-bounded download payloads.
pub const DEFAULT_THROUGHPUT_URL: &str = "https://speed.cloudflare.com/__down";

/// A named, pre-resolved test endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Display name for logs and results.
    pub name: String,
    /// Parsed endpoint URL.
    pub url: Url,
}

impl Endpoint {
    /// Parse an endpoint descriptor, failing with a config error on an
    /// invalid URL.
    pub fn parse(
        name: impl Into<String>,
        url: &str,
    ) -> Result<Self, ProbeError> {
        let url = Url::parse(url).map_err(|e| {
            ProbeError::config(format!("invalid endpoint URL {url:?}: {e}"))
        })?;

        Ok(Self { name: name.into(), url })
    }
}

/// Configuration for a probe session.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Latency reference endpoint. Any quick 2xx response works.
    pub reference: Endpoint,

    /// Throughput endpoint supporting a `bytes` query parameter for
    /// range-bounded streamed responses.
    pub throughput: Endpoint,

    /// Number of sequential latency attempts.
    /// Default: 10
    pub latency_attempts: usize,

    /// Upper bound on the download payload.
    /// Default: 50 MiB
    pub download_max_bytes: u64,

    /// Time budget for the download phase; the stream stops at whichever
    /// of payload or budget runs out first.
    /// Default: 10s
    pub download_time_budget: Duration,

    /// Length of the synthetic upload display window.
    /// Default: 5s
    pub upload_window: Duration,

    /// Minimum spacing between emitted rate samples.
    /// Default: 100ms
    pub sample_emit_interval: Duration,

    /// Maximum number of history entries kept.
    /// Default: 10
    pub history_cap: usize,

    /// Location of the persisted history file.
    pub history_path: PathBuf,

    /// How long a finished session stays visible before the controller
    /// returns to idle.
    /// Default: 3s
    pub settle_delay: Duration,

    /// Label for the serving node recorded with each result.
    pub node: String,

    /// Label for the ISP recorded with each result.
    pub isp: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            reference: Endpoint::parse("reference", DEFAULT_REFERENCE_URL)
                .unwrap(),
            throughput: Endpoint::parse("throughput", DEFAULT_THROUGHPUT_URL)
                .unwrap(),
            latency_attempts: 10,
            download_max_bytes: 50 * 1024 * 1024,
            download_time_budget: Duration::from_millis(10_000),
            upload_window: Duration::from_millis(5_000),
            sample_emit_interval: Duration::from_millis(100),
            history_cap: 10,
            history_path: PathBuf::from("netpulse_history.json"),
            settle_delay: Duration::from_millis(3_000),
            node: "unknown".to_string(),
            isp: "unknown".to_string(),
        }
    }
}
