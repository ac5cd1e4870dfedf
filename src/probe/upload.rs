//! Synthetic upload estimation.
//!
//! This is an approximation, not a wire measurement: no upload bytes are
//! sent. The reference front-end this engine descends from cannot issue
//! large uploads from a browser, so it reports a randomized fraction of
//! the download rate instead, and this module preserves that behavior
//! exactly. Treat the upload number accordingly.

use crate::cancel::CancelToken;
use crate::errors::ProbeError;
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use log::debug;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// The estimate is the download rate scaled by a factor drawn once per
/// session from this range.
const RATE_FRACTION: std::ops::Range<f64> = 0.6..0.9;

/// Each display tick perturbs the estimate by an independent factor from
/// this range, purely to animate a live indicator.
const DISPLAY_JITTER: std::ops::Range<f64> = 0.8..1.2;

/// Derive the upload estimate from a completed download measurement and
/// animate it over the display window.
///
/// The returned value is the fixed `download_bps * fraction` product;
/// the perturbed ticks pushed to the sink never feed back into it.
pub async fn estimate(
    download_bps: f64,
    window: Duration,
    emit_interval: Duration,
    rng: &mut impl Rng,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<f64, ProbeError> {
    let upload_bps = download_bps * rng.gen_range(RATE_FRACTION);
    debug!(
        "synthetic upload estimate: {:.0} bps from download {:.0} bps",
        upload_bps, download_bps
    );

    let start = Instant::now();

    while start.elapsed() < window {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::cancelled()),
            _ = tokio::time::sleep(emit_interval) => {}
        }

        let displayed = upload_bps * rng.gen_range(DISPLAY_JITTER);
        sink.on_progress(ProgressEvent::RateSample {
            phase: Phase::Upload,
            bits_per_second: displayed,
            elapsed: start.elapsed(),
        });
    }

    Ok(upload_bps)
}
