//! Result data structures for a probe session.
//!
//! These are the engine-side types: durations and raw bits-per-second.
//! The rounded, serialized form written to the history file lives in
//! [`crate::history`].

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Convert a raw rate in bits per second to megabits per second.
pub fn bits_to_mbps(bits_per_second: f64) -> f64 {
    bits_per_second / 1_000_000.0
}

/// Aggregated latency measurement for one session.
///
/// Immutable once computed; `mean` covers exactly the successful attempts
/// and `jitter` is their population standard deviation.
#[derive(Debug, Clone)]
pub struct LatencyResult {
    /// Mean round-trip time over the successful attempts.
    pub mean: Duration,
    /// Population standard deviation of the round-trip times.
    pub jitter: Duration,
    /// Number of successful attempts; always at least 1.
    pub sample_count: usize,
}

impl LatencyResult {
    pub fn mean_ms(&self) -> f64 {
        self.mean.as_secs_f64() * 1000.0
    }

    pub fn jitter_ms(&self) -> f64 {
        self.jitter.as_secs_f64() * 1000.0
    }
}

/// One instantaneous-rate observation during a streaming transfer.
///
/// The rate is cumulative bytes over cumulative elapsed time converted to
/// bits, not a true derivative; that damps the noise of early samples
/// where elapsed time is near zero.
#[derive(Debug, Clone, Copy)]
pub struct RateSample {
    /// Elapsed time since the transfer started.
    pub offset: Duration,
    /// Cumulative throughput to date, in bits per second.
    pub bits_per_second: f64,
}

/// Aggregated throughput measurement for one transfer.
#[derive(Debug, Clone)]
pub struct ThroughputResult {
    /// Trimmed mean of the rate samples, in bits per second.
    pub trimmed_mean_bps: f64,
    /// Total payload bytes received.
    pub total_bytes: u64,
    /// Number of rate samples that fed the aggregate.
    pub sample_count: usize,
}

impl ThroughputResult {
    pub fn mbps(&self) -> f64 {
        bits_to_mbps(self.trimmed_mean_bps)
    }
}

/// The complete outcome of one measurement session.
///
/// Built exactly once per completed session and never mutated afterwards;
/// this is the unit handed to the history store.
#[derive(Debug, Clone)]
pub struct SessionResult {
    /// When the session completed.
    pub timestamp: DateTime<Utc>,
    /// Latency and jitter over the reference endpoint.
    pub latency: LatencyResult,
    /// Download throughput over the streamed payload.
    pub download: ThroughputResult,
    /// Estimated upload rate in bits per second. This is a synthetic
    /// value derived from the download result, not a wire measurement.
    pub upload_bps: f64,
    /// Wall-clock duration of the whole session.
    pub duration: Duration,
    /// Label of the serving node.
    pub node: String,
    /// Label of the ISP.
    pub isp: String,
}

impl SessionResult {
    pub fn upload_mbps(&self) -> f64 {
        bits_to_mbps(self.upload_bps)
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_to_mbps() {
        assert!((bits_to_mbps(100_000_000.0) - 100.0).abs() < 1e-9);
        assert_eq!(bits_to_mbps(0.0), 0.0);
    }

    #[test]
    fn test_latency_result_ms_conversions() {
        let latency = LatencyResult {
            mean: Duration::from_micros(23_500),
            jitter: Duration::from_micros(1_250),
            sample_count: 10,
        };

        assert!((latency.mean_ms() - 23.5).abs() < 1e-9);
        assert!((latency.jitter_ms() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_result_mbps() {
        let download = ThroughputResult {
            trimmed_mean_bps: 87_300_000.0,
            total_bytes: 50 * 1024 * 1024,
            sample_count: 95,
        };

        assert!((download.mbps() - 87.3).abs() < 1e-9);
    }

    #[test]
    fn test_session_duration_whole_seconds() {
        let session = SessionResult {
            timestamp: Utc::now(),
            latency: LatencyResult {
                mean: Duration::from_millis(20),
                jitter: Duration::from_millis(2),
                sample_count: 10,
            },
            download: ThroughputResult {
                trimmed_mean_bps: 100_000_000.0,
                total_bytes: 10_000_000,
                sample_count: 80,
            },
            upload_bps: 70_000_000.0,
            duration: Duration::from_millis(17_800),
            node: "LAX".to_string(),
            isp: "Example ISP".to_string(),
        };

        assert_eq!(session.duration_secs(), 17);
        assert!((session.upload_mbps() - 70.0).abs() < 1e-9);
    }
}
