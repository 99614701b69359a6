use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use url::Url;

use crate::error::{Result, UploadError};

/// Header carrying the API Gateway API key.
pub const X_API_KEY: &str = "x-api-key";

/// A raw-body `POST` to the upload endpoint.
///
/// Header names are case-insensitive. The body is shared, never copied or
/// modified after the file is read.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl UploadRequest {
    /// Builds the upload request.
    ///
    /// `Content-type` is set to `mime_type`. `X-API-Key` is only sent when
    /// `api_key` is present and non-empty.
    pub fn post(url: Url, mime_type: &str, body: Bytes, api_key: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(mime_type).map_err(|_| UploadError::InvalidHeader {
                name: "Content-type",
            })?,
        );

        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(key)
                .map_err(|_| UploadError::InvalidHeader { name: "X-API-Key" })?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(X_API_KEY), value);
        }

        Ok(Self {
            method: Method::POST,
            url,
            headers,
            body,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[cfg(test)]
    pub(crate) fn from_parts(method: Method, url: &str, headers: HeaderMap, body: &'static [u8]) -> Self {
        Self {
            method,
            url: Url::parse(url).expect("url must be valid"),
            headers,
            body: Bytes::from_static(body),
        }
    }
}

/// Joins the endpoint URI and path the way they are configured: by plain
/// concatenation.
pub fn endpoint_url(uri: Option<&str>, path: Option<&str>) -> Result<Url> {
    let uri = uri.ok_or(UploadError::MissingConfig(crate::config::API_ENDPOINT_URI))?;
    let joined = format!("{}{}", uri, path.unwrap_or_default());
    Ok(Url::parse(&joined)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://abc123.execute-api.us-east-1.amazonaws.com/prod/images").unwrap()
    }

    #[test]
    fn test_post_sets_content_type_and_method() {
        let req = UploadRequest::post(url(), "image/jpeg", Bytes::from_static(b"jpeg"), None)
            .unwrap();

        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.url(), &url());
        assert_eq!(req.headers()["content-type"], "image/jpeg");
        assert_eq!(req.headers()["Content-Type"], "image/jpeg");
        assert_eq!(req.body().as_ref(), b"jpeg");
    }

    #[test]
    fn test_api_key_omitted_when_absent_or_empty() {
        let req = UploadRequest::post(url(), "image/png", Bytes::new(), None).unwrap();
        assert!(req.headers().get(X_API_KEY).is_none());

        let req = UploadRequest::post(url(), "image/png", Bytes::new(), Some("")).unwrap();
        assert!(req.headers().get(X_API_KEY).is_none());
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn test_api_key_included_verbatim() {
        let req =
            UploadRequest::post(url(), "image/png", Bytes::new(), Some("Ab3+/Key=")).unwrap();
        assert_eq!(req.headers()["X-API-Key"], "Ab3+/Key=");
    }

    #[test]
    fn test_invalid_header_values_are_rejected() {
        let err = UploadRequest::post(url(), "image/png", Bytes::new(), Some("bad\nkey"))
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidHeader { name: "X-API-Key" }));

        let err = UploadRequest::post(url(), "image/\npng", Bytes::new(), None).unwrap_err();
        assert!(matches!(err, UploadError::InvalidHeader { name: "Content-type" }));
    }

    #[test]
    fn test_endpoint_url() {
        let url = endpoint_url(
            Some("https://abc123.execute-api.us-east-1.amazonaws.com"),
            Some("/prod/images"),
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc123.execute-api.us-east-1.amazonaws.com/prod/images"
        );

        let url = endpoint_url(Some("https://example.com/prod/upload"), None).unwrap();
        assert_eq!(url.as_str(), "https://example.com/prod/upload");
    }

    #[test]
    fn test_endpoint_url_errors() {
        let err = endpoint_url(None, Some("/prod")).unwrap_err();
        assert!(matches!(err, UploadError::MissingConfig("API_ENDPOINT_URI")));

        let err = endpoint_url(Some("not a url"), None).unwrap_err();
        assert!(matches!(err, UploadError::InvalidUrl(_)));
    }
}
