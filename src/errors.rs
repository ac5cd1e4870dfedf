//! Error types for the measurement engine.
//!
//! Every failure mode of a probe session maps onto one [`ErrorKind`];
//! nothing in this crate is fatal to the host process. The worst outcome
//! is a session reporting a failure and the caller retrying.

use std::error::Error;
use std::fmt;

/// Exit codes for the command-line front-end.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Network error (reference endpoint unreachable, stream dropped, etc.).
    pub const NETWORK_ERROR: i32 = 1;
    /// The session was cancelled before completing.
    pub const CANCELLED: i32 = 2;
    /// Configuration error (invalid URL, bad arguments).
    pub const CONFIG_ERROR: i32 = 3;
    /// History could not be loaded or saved.
    pub const PERSISTENCE_ERROR: i32 = 4;
}

/// Categories of errors that can occur during a probe session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A single network operation failed. Latency attempts carry this
    /// internally; it is not surfaced for a whole session.
    Network,
    /// Every latency attempt failed; there is no sample to report.
    NoSamples,
    /// The throughput endpoint was unreachable or returned a
    /// non-success status before any body bytes arrived.
    DownloadUnavailable,
    /// The connection dropped mid-stream before the first chunk.
    StreamRead,
    /// The session was cancelled by the caller.
    Cancelled,
    /// History load/save failure. Never aborts a session.
    Persistence,
    /// Invalid configuration or arguments.
    Config,
}

impl ErrorKind {
    /// Get the exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Network => exit_codes::NETWORK_ERROR,
            ErrorKind::NoSamples => exit_codes::NETWORK_ERROR,
            ErrorKind::DownloadUnavailable => exit_codes::NETWORK_ERROR,
            ErrorKind::StreamRead => exit_codes::NETWORK_ERROR,
            ErrorKind::Cancelled => exit_codes::CANCELLED,
            ErrorKind::Persistence => exit_codes::PERSISTENCE_ERROR,
            ErrorKind::Config => exit_codes::CONFIG_ERROR,
        }
    }

    /// Get a user-friendly description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Network error",
            ErrorKind::NoSamples => "No latency samples",
            ErrorKind::DownloadUnavailable => "Download test unavailable",
            ErrorKind::StreamRead => "Stream read error",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Persistence => "History persistence error",
            ErrorKind::Config => "Configuration error",
        }
    }
}

/// A structured error for probe operations.
#[derive(Debug)]
pub struct ProbeError {
    /// The kind of error.
    pub kind: ErrorKind,
    /// User-friendly error message.
    pub message: String,
    /// Optional suggestion for how to resolve the error.
    pub suggestion: Option<String>,
    /// The underlying error, if any.
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl ProbeError {
    /// Create a new ProbeError.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), suggestion: None, source: None }
    }

    /// Add a suggestion for how to resolve the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add the underlying error source.
    pub fn with_source(
        mut self,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// A single network operation failed.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
            .with_suggestion("Check your internet connection and try again.")
    }

    /// Every latency attempt failed.
    pub fn no_samples(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoSamples, message)
            .with_suggestion("Check your internet connection and try again.")
    }

    /// The throughput endpoint could not serve the test payload.
    pub fn download_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DownloadUnavailable, message).with_suggestion(
            "The test endpoint may be down or blocked. Try again later.",
        )
    }

    /// The download stream dropped before any data arrived.
    pub fn stream_read(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StreamRead, message).with_suggestion(
            "The connection dropped mid-test. Try again on a steadier link.",
        )
    }

    /// The session was cancelled.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "session cancelled by caller")
    }

    /// History could not be read or written.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Persistence, message).with_suggestion(
            "Check that the history file location is writable.",
        )
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.message)?;

        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

impl Error for ProbeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}
