//! Latency probing against the reference endpoint.

use crate::cancel::CancelToken;
use crate::errors::ProbeError;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::results::LatencyResult;
use crate::stats::{mean, population_std_dev};
use log::{debug, warn};
use std::time::Duration;

/// One timed round trip to the reference endpoint.
pub trait Sampler {
    async fn sample(&self) -> Result<Duration, ProbeError>;
}

impl<S: Sampler> Sampler for &S {
    async fn sample(&self) -> Result<Duration, ProbeError> {
        (**self).sample().await
    }
}

/// Run `attempts` sequential timed round trips and aggregate them.
///
/// Attempts never overlap: concurrent requests would contend for the same
/// connection and bias the reading. A failed attempt is excluded from the
/// sample set but does not abort the probe; only a fully failed run does.
/// After every even-indexed attempt the running mean is pushed to the
/// sink; that is display smoothing only, the final result comes from the
/// full sample set.
pub async fn probe(
    sampler: &impl Sampler,
    attempts: usize,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<LatencyResult, ProbeError> {
    let mut samples_ms: Vec<f64> = Vec::with_capacity(attempts);
    let mut failed = 0usize;

    for attempt in 0..attempts {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::cancelled()),
            r = sampler.sample() => r,
        };

        match result {
            Ok(elapsed) => {
                let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
                debug!(
                    "latency attempt {}/{}: {:.2} ms",
                    attempt + 1,
                    attempts,
                    elapsed_ms
                );
                samples_ms.push(elapsed_ms);
            }
            Err(e) => {
                failed += 1;
                warn!(
                    "latency attempt {}/{} failed: {}",
                    attempt + 1,
                    attempts,
                    e
                );
            }
        }

        if attempt % 2 == 0 && !samples_ms.is_empty() {
            sink.on_progress(ProgressEvent::LatencyProgress {
                running_mean_ms: mean(&samples_ms),
                current: attempt + 1,
                total: attempts,
            });
        }
    }

    if samples_ms.is_empty() {
        return Err(ProbeError::no_samples(format!(
            "all {attempts} latency attempts failed"
        )));
    }

    if failed > 0 {
        warn!(
            "{} of {} latency attempts failed; continuing with {}",
            failed,
            attempts,
            samples_ms.len()
        );
    }

    let mean_ms = mean(&samples_ms);
    let jitter_ms = population_std_dev(&samples_ms);

    Ok(LatencyResult {
        mean: Duration::from_secs_f64(mean_ms / 1000.0),
        jitter: Duration::from_secs_f64(jitter_ms / 1000.0),
        sample_count: samples_ms.len(),
    })
}
