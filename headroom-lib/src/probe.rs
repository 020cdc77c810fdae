use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use log::trace;
use tokio_util::sync::CancellationToken;

/// Issues a single test request against a URL.
///
/// The only thing reported back is whether the request succeeded. Network
/// errors, timeouts, unexpected status codes and cancellation all count as
/// a plain failure.
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    /// Send one test request to `url`.
    ///
    /// Once `cancel` has fired, implementations should fail fast instead of
    /// starting new network activity.
    async fn test(&self, url: &str, cancel: &CancellationToken) -> bool;
}

/// [`ProbeExecutor`] which sends a `GET` request and accepts only `200 OK`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpProbe {
    /// Create a probe executor sending requests through `client`
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Give up on a single test request after `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ProbeExecutor for HttpProbe {
    async fn test(&self, url: &str, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        let mut request = self.client.get(url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        tokio::select! {
            () = cancel.cancelled() => false,
            response = request.send() => match response {
                Ok(response) => response.status() == StatusCode::OK,
                Err(e) => {
                    trace!("Test request to {url} failed: {e}");
                    false
                }
            },
        }
    }
}
