use std::time::Duration;

use reqwest::redirect::Policy;
use tracing::{debug, info};

use crate::error::{Result, UploadError};
use crate::request::UploadRequest;
use crate::types::UploadResponse;

/// Total time allowed for one request, from connect to the last body byte.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends an [`UploadRequest`] and hands back whatever the server answered.
///
/// Implementations return every HTTP status as a response; only failures to
/// complete the exchange are errors.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, request: &UploadRequest) -> Result<UploadResponse>;
}

/// The HTTP transport used against API Gateway.
///
/// Redirects are not followed, 4xx and 5xx responses are not errors, and each
/// request is bounded by a fixed timeout.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport with the [`DEFAULT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// - `UploadError::Transport` if the internal HTTP client fails to build.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a transport with a custom timeout.
    ///
    /// This is useful for testing against a slow mock server.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(UploadError::Transport)?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(&self, err: reqwest::Error) -> UploadError {
        if err.is_timeout() {
            UploadError::Timeout {
                timeout: self.timeout,
                source: err,
            }
        } else {
            UploadError::Transport(err)
        }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &UploadRequest) -> Result<UploadResponse> {
        info!(
            method = %request.method(),
            url = %request.url(),
            bytes = request.body().len(),
            "sending request"
        );

        let response = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .body(request.body().clone())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        debug!(%status, bytes = body.len(), "received response");

        Ok(UploadResponse {
            status,
            headers,
            body,
        })
    }
}
