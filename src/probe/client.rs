//! HTTP client over the configured endpoints.

use crate::config::Endpoint;
use crate::errors::ProbeError;
use crate::probe::download::ChunkStream;
use crate::probe::latency::Sampler;
use crate::probe::ProbeTarget;
use futures::stream::BoxStream;
use futures::StreamExt;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, USER_AGENT};
use reqwest::Client as ReqwestClient;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// Client for the reference and throughput endpoints.
#[derive(Debug, Clone)]
pub struct Client {
    http: ReqwestClient,
    reference: Endpoint,
    throughput: Endpoint,
}

impl Client {
    pub fn new(reference: Endpoint, throughput: Endpoint) -> Self {
        Client { http: ReqwestClient::new(), reference, throughput }
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(
            USER_AGENT,
            format!("{}/{} ({})", NAME, VERSION, REPO).parse().unwrap(),
        );

        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        headers
    }

    /// Throughput URL with the payload bound in the `bytes` query
    /// parameter, replacing any query the configured URL carried.
    fn download_url(&self, max_bytes: u64) -> Url {
        let mut url = self.throughput.url.clone();
        url.set_query(Some(&format!("bytes={max_bytes}")));
        url
    }
}

impl Sampler for Client {
    /// One timed round trip: request sent to body fully drained. The
    /// reference endpoint returns a tiny payload, so the body read adds
    /// nothing meaningful beyond the final TCP segments.
    async fn sample(&self) -> Result<Duration, ProbeError> {
        let start = Instant::now();

        let response = self
            .http
            .get(self.reference.url.clone())
            .headers(Self::headers())
            .send()
            .await
            .map_err(|e| {
                ProbeError::network(format!(
                    "reference request to {} failed",
                    self.reference.url
                ))
                .with_source(e)
            })?
            .error_for_status()
            .map_err(|e| {
                ProbeError::network(format!(
                    "reference endpoint {} answered with an error status",
                    self.reference.url
                ))
                .with_source(e)
            })?;

        response.bytes().await.map_err(|e| {
            ProbeError::network("reference response body read failed")
                .with_source(e)
        })?;

        Ok(start.elapsed())
    }
}

impl ProbeTarget for Client {
    type Stream = HttpChunkStream;

    async fn open_download(
        &self,
        max_bytes: u64,
    ) -> Result<Self::Stream, ProbeError> {
        let url = self.download_url(max_bytes);
        debug!("opening download stream: {}", url);

        let response = self
            .http
            .get(url.clone())
            .headers(Self::headers())
            .send()
            .await
            .map_err(|e| {
                ProbeError::download_unavailable(format!(
                    "request to {url} failed"
                ))
                .with_source(e)
            })?
            .error_for_status()
            .map_err(|e| {
                ProbeError::download_unavailable(format!(
                    "{url} answered with an error status"
                ))
                .with_source(e)
            })?;

        // Only chunk sizes reach the meter; the payload itself is
        // dropped as it arrives.
        let sizes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.len()))
            .boxed();

        Ok(HttpChunkStream { inner: sizes })
    }
}

/// A streaming response body reduced to its chunk sizes.
pub struct HttpChunkStream {
    inner: BoxStream<'static, reqwest::Result<usize>>,
}

impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<usize>, ProbeError> {
        match self.inner.next().await {
            None => Ok(None),
            Some(Ok(len)) => Ok(Some(len)),
            Some(Err(e)) => Err(ProbeError::stream_read(
                "download body read failed",
            )
            .with_source(e)),
        }
    }
}
