//! Session orchestration.
//!
//! One session runs latency, download and upload strictly in sequence,
//! assembles the result, hands it to the history store and settles back
//! to idle. The controller owns the run-guard: only one session can be
//! active at a time. Repetition policy belongs to the caller; there is
//! deliberately no periodic re-run built in.

use crate::cancel::CancelToken;
use crate::config::ProbeConfig;
use crate::errors::ProbeError;
use crate::history::{HistoryEntry, HistoryStore};
use crate::probe::{download, latency, upload, ProbeTarget};
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::results::SessionResult;
use crate::retry::{retry_async, RetryConfig, RetryResult};
use chrono::Utc;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Lifecycle of a measurement session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    RunningLatency,
    RunningDownload,
    RunningUpload,
    /// Finished; the last result stays visible until the settle delay
    /// passes and the state returns to [`SessionState::Idle`].
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            SessionState::RunningLatency
                | SessionState::RunningDownload
                | SessionState::RunningUpload
        )
    }
}

/// Drives one measurement session at a time against a [`ProbeTarget`].
pub struct SessionController<T: ProbeTarget> {
    target: T,
    config: ProbeConfig,
    retry: RetryConfig,
    state: Arc<Mutex<SessionState>>,
    // The run-guard already implies a single writer; the mutex keeps
    // appends serialized even if a caller misuses the controller from
    // several tasks.
    history: Mutex<HistoryStore>,
    cancel: Mutex<CancelToken>,
}

impl<T: ProbeTarget> SessionController<T> {
    /// Create a controller and load the persisted history.
    pub fn new(target: T, config: ProbeConfig) -> Self {
        let history =
            HistoryStore::load(&config.history_path, config.history_cap);

        Self {
            target,
            retry: RetryConfig::default(),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            history: Mutex::new(history),
            cancel: Mutex::new(CancelToken::new()),
            config,
        }
    }

    /// Override the retry policy for opening the download stream.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Snapshot of the stored history, most recent first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().unwrap().entries().to_vec()
    }

    /// Best-effort cancellation of the in-flight session, if any. The
    /// active phase's network operation is aborted and the session lands
    /// in [`SessionState::Failed`] with a cancellation error.
    pub fn cancel(&self) {
        self.cancel.lock().unwrap().cancel();
    }

    /// Run one complete session.
    ///
    /// Invoked while a session is already active this is a no-op
    /// returning `Ok(None)`; concurrent runs are rejected, never queued.
    /// A completed session is appended to the history before the
    /// `Complete` event fires. A failed phase aborts the remaining
    /// phases and records nothing.
    pub async fn run_once(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Option<SessionResult>, ProbeError> {
        if !self.try_begin() {
            debug!("run requested while a session is active; ignoring");
            return Ok(None);
        }

        let cancel = CancelToken::new();
        *self.cancel.lock().unwrap() = cancel.clone();

        let started = Instant::now();

        match self.run_phases(sink, &cancel, started).await {
            Ok(result) => {
                let entry = HistoryEntry::from(&result);
                if let Err(e) = self.history.lock().unwrap().append(entry) {
                    // Best-effort durability: report it, keep the session.
                    warn!("failed to persist session history: {}", e);
                    sink.on_progress(ProgressEvent::Error(e.kind));
                }

                self.set_state(SessionState::Completed);
                sink.on_progress(ProgressEvent::Complete(result.clone()));
                self.settle_to_idle();

                info!(
                    "session complete: ping {:.0} ms, down {:.1} Mbps, \
                     up {:.1} Mbps in {} s",
                    result.latency.mean_ms(),
                    result.download.mbps(),
                    result.upload_mbps(),
                    result.duration_secs()
                );

                Ok(Some(result))
            }
            Err(err) => {
                warn!("session failed: {}", err);
                self.set_state(SessionState::Failed);
                sink.on_progress(ProgressEvent::Error(err.kind));
                self.settle_to_idle();

                Err(err)
            }
        }
    }

    async fn run_phases(
        &self,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<SessionResult, ProbeError> {
        self.set_state(SessionState::RunningLatency);
        sink.on_progress(ProgressEvent::PhaseChange(Phase::Latency));
        info!(
            "phase: latency ({} attempts against {})",
            self.config.latency_attempts, self.config.reference.name
        );

        let latency = latency::probe(
            &self.target,
            self.config.latency_attempts,
            sink,
            cancel,
        )
        .await?;

        info!(
            "latency: {:.1} ms, jitter {:.1} ms over {} samples",
            latency.mean_ms(),
            latency.jitter_ms(),
            latency.sample_count
        );

        self.set_state(SessionState::RunningDownload);
        sink.on_progress(ProgressEvent::PhaseChange(Phase::Download));
        info!(
            "phase: download (up to {} bytes within {:?})",
            self.config.download_max_bytes, self.config.download_time_budget
        );

        // Opening the stream carries no timing of its own, so it gets
        // the retry treatment; the measured transfer below does not.
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::cancelled()),
            r = retry_async(&self.retry, "open download stream", || {
                self.target.open_download(self.config.download_max_bytes)
            }) => r,
        };

        let mut stream = match opened {
            RetryResult::Success(stream) => stream,
            RetryResult::Failed { last_error, attempts } => {
                let mut err = ProbeError::download_unavailable(format!(
                    "could not open download stream after {attempts} attempts"
                ));
                err.source = Some(last_error);
                return Err(err);
            }
        };

        let download = download::measure(
            &mut stream,
            self.config.download_max_bytes,
            self.config.download_time_budget,
            self.config.sample_emit_interval,
            sink,
            cancel,
        )
        .await?;

        info!(
            "download: {:.1} Mbps over {} bytes ({} samples)",
            download.mbps(),
            download.total_bytes,
            download.sample_count
        );

        self.set_state(SessionState::RunningUpload);
        sink.on_progress(ProgressEvent::PhaseChange(Phase::Upload));
        info!("phase: upload (synthetic estimate)");

        let mut rng = StdRng::from_entropy();
        let upload_bps = upload::estimate(
            download.trimmed_mean_bps,
            self.config.upload_window,
            self.config.sample_emit_interval,
            &mut rng,
            sink,
            cancel,
        )
        .await?;

        Ok(SessionResult {
            timestamp: Utc::now(),
            latency,
            download,
            upload_bps,
            duration: started.elapsed(),
            node: self.config.node.clone(),
            isp: self.config.isp.clone(),
        })
    }

    fn try_begin(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state != SessionState::Idle {
            return false;
        }

        *state = SessionState::RunningLatency;
        true
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap() = next;
    }

    /// Return to idle after the settle delay, leaving the terminal state
    /// visible in the meantime.
    fn settle_to_idle(&self) {
        let state = Arc::clone(&self.state);
        let delay = self.config.settle_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut state = state.lock().unwrap();
            if matches!(
                *state,
                SessionState::Completed | SessionState::Failed
            ) {
                *state = SessionState::Idle;
            }
        });
    }
}
