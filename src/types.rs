use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::request::UploadRequest;

/// Whether an upload is signed with AWS SigV4 before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    /// Sign with the configured AWS credentials (required by `AWS_IAM` authorizers).
    Signed,
    /// Send the request as built, authenticated by the API key at most.
    Unsigned,
}

impl FromStr for SigningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signed" => Ok(SigningMode::Signed),
            "unsigned" => Ok(SigningMode::Unsigned),
            other => Err(format!("unknown signing mode: {other}")),
        }
    }
}

impl fmt::Display for SigningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningMode::Signed => f.write_str("signed"),
            SigningMode::Unsigned => f.write_str("unsigned"),
        }
    }
}

/// An [`UploadRequest`] carrying the SigV4 headers.
///
/// Produced by [`RequestSigner::sign`](crate::RequestSigner::sign); the request
/// it was derived from is left untouched.
#[derive(Debug, Clone)]
pub struct SignedUploadRequest {
    request: UploadRequest,
}

impl SignedUploadRequest {
    pub(crate) fn new(request: UploadRequest) -> Self {
        Self { request }
    }

    /// The request with the signature headers applied.
    pub fn request(&self) -> &UploadRequest {
        &self.request
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// The value of the `Authorization` header.
    pub fn authorization(&self) -> Option<&str> {
        self.request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }

    pub fn into_request(self) -> UploadRequest {
        self.request
    }
}

/// The response returned by API Gateway, whatever its status.
#[derive(Debug, Clone)]
pub struct UploadResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The raw response body.
    pub body: Bytes,
}

impl UploadResponse {
    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
