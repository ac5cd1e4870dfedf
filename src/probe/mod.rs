//! Network-facing measurement pieces.
//!
//! [`client`] owns the HTTP plumbing; [`latency`], [`download`] and
//! [`upload`] implement the three measurement phases over narrow seams
//! so the session controller and the tests never touch the wire
//! directly.

pub mod client;
pub mod download;
pub mod latency;
pub mod upload;

use crate::errors::ProbeError;
use download::ChunkStream;
use latency::Sampler;

/// Everything the session controller needs from the network: timed
/// reference round trips and a freshly opened download stream.
pub trait ProbeTarget: Sampler {
    type Stream: ChunkStream;

    /// Issue the streaming GET for a payload of up to `max_bytes`.
    ///
    /// Fails with `DownloadUnavailable` when the request cannot be made
    /// or the endpoint answers with a non-success status.
    async fn open_download(
        &self,
        max_bytes: u64,
    ) -> Result<Self::Stream, ProbeError>;
}

impl<T: ProbeTarget> ProbeTarget for &T {
    type Stream = T::Stream;

    async fn open_download(
        &self,
        max_bytes: u64,
    ) -> Result<Self::Stream, ProbeError> {
        (**self).open_download(max_bytes).await
    }
}
