//! HTTP collaborator used by providers and extractors.
//!
//! [`Transport`] is the seam: production code uses [`ReqwestTransport`],
//! tests substitute scripted transports. [`HttpClient`] wraps a transport
//! with retry and logging.

pub mod request;
pub mod transport;

pub use request::{ByteRange, HttpRequest, HttpResponse, Method};
pub use transport::ReqwestTransport;

use crate::error::NetworkError;
use async_trait::async_trait;
use shared::config::HttpConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Sends one request and classifies the outcome.
///
/// Implementations map HTTP 404 to [`NetworkError::NotFound`], any other
/// non-success status to [`NetworkError::Status`], and return
/// [`NetworkError::Canceled`] once `cancel` fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, NetworkError>;
}

/// Retry policy applied by [`HttpClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

/// Throttling and server-side failures are worth another attempt.
fn is_retryable(err: &NetworkError) -> bool {
    match err {
        NetworkError::Status { status, .. } => *status == 429 || *status >= 500,
        NetworkError::Timeout { .. } | NetworkError::Transport { .. } => true,
        NetworkError::NotFound { .. } | NetworkError::InvalidUrl(_) | NetworkError::Canceled => {
            false
        }
    }
}

#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    /// Client over a [`ReqwestTransport`] configured from `[http]`
    pub fn from_config(config: &HttpConfig) -> Result<Self, NetworkError> {
        let transport = ReqwestTransport::from_config(config)?;
        Ok(Self::new(Arc::new(transport)).with_retry(RetryPolicy::from_config(config)))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send with retry and exponential backoff.
    pub async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, NetworkError> {
        let mut attempt = 0;
        loop {
            debug!(
                method = ?request.method,
                url = %request.url,
                attempt = attempt + 1,
                "Sending request"
            );

            let err = match self.transport.send(request.clone(), cancel).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !is_retryable(&err) || attempt >= self.retry.max_retries {
                match &err {
                    NetworkError::NotFound { .. } | NetworkError::Canceled => {
                        debug!(url = %request.url, error = %err, "Request ended")
                    }
                    _ => warn!(url = %request.url, error = %err, "Request failed"),
                }
                return Err(err);
            }

            let delay = self.retry.delay(attempt);
            warn!(
                url = %request.url,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "Request failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(NetworkError::Canceled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    pub async fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, NetworkError> {
        self.send(HttpRequest::get(url).with_headers(headers), cancel)
            .await
    }

    pub async fn post(
        &self,
        url: &str,
        body: impl Into<String>,
        headers: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, NetworkError> {
        self.send(HttpRequest::post(url, body).with_headers(headers), cancel)
            .await
    }

    pub async fn head(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, NetworkError> {
        self.send(HttpRequest::head(url).with_headers(headers), cancel)
            .await
    }

    pub async fn get_range(
        &self,
        url: &str,
        range: ByteRange,
        headers: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, NetworkError> {
        self.send(
            HttpRequest::get(url).with_headers(headers).with_range(range),
            cancel,
        )
        .await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
