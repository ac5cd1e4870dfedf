//! Streaming download throughput measurement.
//!
//! The response body is read incrementally, never buffered to
//! completion, so memory stays flat and the rate can be observed
//! mid-stream.

use crate::cancel::CancelToken;
use crate::errors::ProbeError;
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::results::ThroughputResult;
use crate::stats::trimmed_mean;
use log::{debug, warn};
use std::time::Duration;
use tokio::time::Instant;

/// Incremental access to a response body.
///
/// Only chunk sizes matter to the meter; the payload content is
/// throwaway filler.
pub trait ChunkStream {
    /// Byte count of the next chunk, or `None` at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<usize>, ProbeError>;
}

/// Drain the stream until `max_bytes` arrive or `time_budget` runs out,
/// whichever comes first, and aggregate the observed rates.
///
/// The instantaneous rate is cumulative bytes over cumulative elapsed
/// time (8 bits per byte), sampled no more often than `emit_interval`;
/// starting the sampling clock at the first byte damps the noise of
/// near-zero elapsed times. The reported speed is the trimmed mean of
/// those samples.
///
/// A connection dropped mid-stream keeps the partial result as long as
/// at least one chunk arrived; partial reads are valid and simply yield
/// fewer bytes.
pub async fn measure(
    stream: &mut impl ChunkStream,
    max_bytes: u64,
    time_budget: Duration,
    emit_interval: Duration,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<ThroughputResult, ProbeError> {
    let start = Instant::now();
    let mut last_emit = start;
    let mut total_bytes: u64 = 0;
    let mut chunks = 0usize;
    let mut rates: Vec<f64> = Vec::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::cancelled()),
            c = stream.next_chunk() => c,
        };

        match chunk {
            Ok(Some(len)) => {
                chunks += 1;
                total_bytes += len as u64;
            }
            Ok(None) => break,
            Err(e) => {
                if chunks == 0 {
                    return Err(e);
                }
                warn!(
                    "download stream dropped after {} bytes: {}; \
                     keeping partial result",
                    total_bytes, e
                );
                break;
            }
        }

        let now = Instant::now();
        let elapsed = now.duration_since(start);

        if now.duration_since(last_emit) >= emit_interval
            && !elapsed.is_zero()
        {
            let rate = (total_bytes * 8) as f64 / elapsed.as_secs_f64();
            rates.push(rate);
            sink.on_progress(ProgressEvent::RateSample {
                phase: Phase::Download,
                bits_per_second: rate,
                elapsed,
            });
            last_emit = now;
        }

        if total_bytes >= max_bytes {
            debug!("download reached payload cap at {} bytes", total_bytes);
            break;
        }

        if elapsed >= time_budget {
            debug!(
                "download reached time budget after {} bytes",
                total_bytes
            );
            break;
        }
    }

    if total_bytes == 0 {
        return Err(ProbeError::stream_read(
            "download stream ended without delivering any payload",
        ));
    }

    // A transfer shorter than the emit interval never ticked; fall back
    // to a single whole-transfer sample so a successful measurement
    // always carries at least one.
    if rates.is_empty() {
        let elapsed = start.elapsed();
        if !elapsed.is_zero() {
            let rate = (total_bytes * 8) as f64 / elapsed.as_secs_f64();
            rates.push(rate);
            sink.on_progress(ProgressEvent::RateSample {
                phase: Phase::Download,
                bits_per_second: rate,
                elapsed,
            });
        }
    }

    Ok(ThroughputResult {
        trimmed_mean_bps: trimmed_mean(&rates),
        total_bytes,
        sample_count: rates.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Step {
        /// Wait, then deliver a chunk of the given size.
        Chunk(Duration, usize),
        /// Wait, then fail the read.
        Fail(Duration),
    }

    /// Plays back a scripted body; end of script is end of stream.
    struct FakeStream {
        script: VecDeque<Step>,
    }

    impl FakeStream {
        fn new(script: Vec<Step>) -> Self {
            Self { script: script.into() }
        }

        fn uniform(chunks: usize, size: usize, spacing: Duration) -> Self {
            Self::new(
                (0..chunks).map(|_| Step::Chunk(spacing, size)).collect(),
            )
        }
    }

    impl ChunkStream for FakeStream {
        async fn next_chunk(&mut self) -> Result<Option<usize>, ProbeError> {
            match self.script.pop_front() {
                None => Ok(None),
                Some(Step::Chunk(delay, len)) => {
                    tokio::time::sleep(delay).await;
                    Ok(Some(len))
                }
                Some(Step::Fail(delay)) => {
                    tokio::time::sleep(delay).await;
                    Err(ProbeError::stream_read("scripted mid-stream drop"))
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        rates: Mutex<Vec<f64>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, event: ProgressEvent) {
            if let ProgressEvent::RateSample { bits_per_second, .. } = event {
                self.rates.lock().unwrap().push(bits_per_second);
            }
        }
    }

    const MS: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_uniform_stream_totals_and_trimmed_band() {
        // 10,000,000 bytes delivered uniformly: 80 chunks of 125,000
        // bytes, one every 10ms, sampled on the same 10ms cadence.
        let mut stream =
            FakeStream::uniform(80, 125_000, Duration::from_millis(10));
        let sink = RecordingSink::default();

        let result = measure(
            &mut stream,
            u64::MAX,
            Duration::from_secs(30),
            Duration::from_millis(10),
            &sink,
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.total_bytes, 10_000_000);
        assert!(result.sample_count >= 10);

        // The reported speed must sit inside the band that remains after
        // cutting the top and bottom decile of the observed samples.
        let mut rates = sink.rates.lock().unwrap().clone();
        rates.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let cut = rates.len() / 10;
        let lo = rates[cut];
        let hi = rates[rates.len() - 1 - cut];
        assert!(
            result.trimmed_mean_bps >= lo - 1.0
                && result.trimmed_mean_bps <= hi + 1.0,
            "trimmed mean {} outside band [{lo}, {hi}]",
            result.trimmed_mean_bps
        );
    }

    #[tokio::test]
    async fn test_stops_at_payload_cap() {
        let mut stream = FakeStream::uniform(10, 1_000, MS);

        let result = measure(
            &mut stream,
            2_500,
            Duration::from_secs(5),
            MS,
            &RecordingSink::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        // The cap lands mid-chunk: the third chunk tips the total over.
        assert_eq!(result.total_bytes, 3_000);
        // The remaining scripted chunks were never read.
        assert_eq!(stream.script.len(), 7);
    }

    #[tokio::test]
    async fn test_stops_at_time_budget_with_partial_bytes() {
        let mut stream =
            FakeStream::uniform(100, 1_000, Duration::from_millis(20));

        let result = measure(
            &mut stream,
            u64::MAX,
            Duration::from_millis(70),
            Duration::from_millis(10),
            &RecordingSink::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        // Partial read is a valid result, just fewer bytes.
        assert!(result.total_bytes >= 1_000);
        assert!(result.total_bytes < 100_000);
        assert!(result.sample_count >= 1);
    }

    #[tokio::test]
    async fn test_mid_stream_drop_keeps_partial_result() {
        let mut stream = FakeStream::new(vec![
            Step::Chunk(MS, 4_000),
            Step::Chunk(MS, 4_000),
            Step::Fail(MS),
        ]);

        let result = measure(
            &mut stream,
            u64::MAX,
            Duration::from_secs(5),
            MS,
            &RecordingSink::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.total_bytes, 8_000);
        assert!(result.sample_count >= 1);
        assert!(result.trimmed_mean_bps > 0.0);
    }

    #[tokio::test]
    async fn test_drop_before_first_chunk_is_an_error() {
        let mut stream = FakeStream::new(vec![Step::Fail(MS)]);

        let err = measure(
            &mut stream,
            u64::MAX,
            Duration::from_secs(5),
            MS,
            &RecordingSink::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, ErrorKind::StreamRead);
    }

    #[tokio::test]
    async fn test_empty_body_is_an_error() {
        let mut stream = FakeStream::new(vec![]);

        let err = measure(
            &mut stream,
            u64::MAX,
            Duration::from_secs(5),
            MS,
            &RecordingSink::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, ErrorKind::StreamRead);
    }

    #[tokio::test]
    async fn test_short_transfer_still_yields_one_sample() {
        // Whole payload lands inside a single emit interval.
        let mut stream = FakeStream::uniform(3, 1_000, MS);

        let result = measure(
            &mut stream,
            u64::MAX,
            Duration::from_secs(5),
            Duration::from_secs(10),
            &RecordingSink::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.total_bytes, 3_000);
        assert_eq!(result.sample_count, 1);
        assert!(result.trimmed_mean_bps > 0.0);
    }

    #[tokio::test]
    async fn test_cancel_aborts_the_transfer() {
        let mut stream =
            FakeStream::uniform(100, 1_000, Duration::from_millis(20));
        let cancel = CancelToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = measure(
            &mut stream,
            u64::MAX,
            Duration::from_secs(30),
            MS,
            &RecordingSink::default(),
            &cancel,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Cancelled);
    }
}
