//! Progress event types and callback interface.
//!
//! Defines the events emitted by the measurement engine for an external
//! renderer and the callback trait for receiving them. The engine only
//! ever hands out numbers and state changes; drawing them is someone
//! else's job.

use crate::errors::ErrorKind;
use crate::results::SessionResult;
use std::fmt;
use std::time::Duration;

/// Measurement phases of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Sequential round trips against the reference endpoint.
    Latency,
    /// Streaming download measurement.
    Download,
    /// Synthetic upload estimation.
    Upload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Latency => write!(f, "latency"),
            Phase::Download => write!(f, "download"),
            Phase::Upload => write!(f, "upload"),
        }
    }
}

/// Progress events emitted during a session.
///
/// Events for one phase arrive in increasing elapsed-time order and never
/// interleave with another phase's events; phases are strictly sequential.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A new measurement phase has started.
    PhaseChange(Phase),
    /// Incremental running mean during the latency phase. Display
    /// smoothing only; the final result is computed from the full
    /// sample set.
    LatencyProgress {
        running_mean_ms: f64,
        /// Attempts completed so far (1-indexed).
        current: usize,
        total: usize,
    },
    /// An instantaneous-rate observation during a transfer.
    RateSample {
        phase: Phase,
        bits_per_second: f64,
        elapsed: Duration,
    },
    /// The session finished; the result has already been recorded.
    Complete(SessionResult),
    /// The session failed with the given error kind.
    Error(ErrorKind),
}

/// Callback interface for progress updates.
///
/// Implementations must be non-blocking to avoid skewing the
/// measurements they observe.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// A sink that discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _event: ProgressEvent) {}
}
