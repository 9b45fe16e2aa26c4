//! Remote retrieval of image bytes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::config::CacheConfig;

/// Upper bound on buffer preallocation from a declared content length.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Errors from fetching image bytes.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP client error (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("Server returned status {0}")]
    Status(u16),

    /// The locator is not something this transport can fetch.
    #[error("Unsupported locator: {0}")]
    UnsupportedLocator(String),

    /// Any other transport-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Callback receiving `(bytes_received, total_bytes)` during a fetch.
///
/// `total_bytes` is 0 when the length is unknown.
#[derive(Clone)]
pub struct ProgressSink {
    report: Arc<dyn Fn(u64, u64) + Send + Sync>,
}

impl ProgressSink {
    /// Wrap a progress callback.
    pub fn new(report: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        Self {
            report: Arc::new(report),
        }
    }

    /// A sink that discards reports.
    #[must_use]
    pub fn ignore() -> Self {
        Self::new(|_, _| {})
    }

    /// Report progress.
    pub fn report(&self, received: u64, total: u64) {
        (self.report)(received, total);
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

/// Retrieves the bytes behind a remote locator.
///
/// Fetches run on a spawned task; cancelling the task cancels the fetch.
pub trait Transport: Send + Sync + 'static {
    /// Fetch the bytes for `locator`, reporting progress as they arrive.
    fn fetch(
        &self,
        locator: &str,
        progress: ProgressSink,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}

/// [`Transport`] for `http` and `https` locators.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build an HTTP transport using the timeout and user agent from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new(config: &CacheConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn fetch(
        &self,
        locator: &str,
        progress: ProgressSink,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send {
        let client = self.client.clone();
        let locator = locator.to_owned();

        async move {
            let url = reqwest::Url::parse(&locator)
                .map_err(|_| TransportError::UnsupportedLocator(locator.clone()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(TransportError::UnsupportedLocator(locator));
            }

            let mut response = client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status(status.as_u16()));
            }

            let total = response.content_length().unwrap_or(0);
            let capacity = usize::try_from(total.min(MAX_PREALLOC)).unwrap_or(0);
            let mut body = BytesMut::with_capacity(capacity);
            let mut received = 0_u64;

            while let Some(chunk) = response.chunk().await? {
                body.extend_from_slice(&chunk);
                received = received.saturating_add(chunk.len() as u64);
                progress.report(received, total);
            }

            debug!("Fetched {} bytes from {}", received, locator);
            Ok(body.freeze())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn progress_sink_forwards_reports() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            ProgressSink::new(move |received, total| seen.lock().unwrap().push((received, total)))
        };

        sink.report(10, 100);
        sink.clone().report(100, 100);

        assert_eq!(*seen.lock().unwrap(), vec![(10, 100), (100, 100)]);
    }

    #[tokio::test]
    async fn rejects_non_http_locators() {
        let transport = HttpTransport::new(&CacheConfig::default()).unwrap();

        let result = transport.fetch("r://large", ProgressSink::ignore()).await;
        assert!(matches!(result, Err(TransportError::UnsupportedLocator(_))));

        let result = transport.fetch("not a url", ProgressSink::ignore()).await;
        assert!(matches!(result, Err(TransportError::UnsupportedLocator(_))));
    }
}
