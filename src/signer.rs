//! AWS Signature Version 4 request signing.
//!
//! - [Signature Version 4 signing process](https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html)
//!
//! The canonicalization rules and encode sets follow the `reqsign` crate
//! (Apache-2.0, see `NOTICE`).

use aws_credential_types::Credentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, HOST};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::error::{Result, UploadError};
use crate::request::UploadRequest;
use crate::types::SignedUploadRequest;

type HmacSha256 = Hmac<Sha256>;

/// Service name API Gateway uses in the credential scope.
pub const API_GATEWAY_SERVICE: &str = "execute-api";
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub const X_AMZ_CONTENT_SHA_256: &str = "x-amz-content-sha256";
pub const X_AMZ_DATE: &str = "x-amz-date";
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// Path segments keep `A-Z a-z 0-9 - . _ ~` and the `/` separator as is.
static AWS_URI_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Query keys and values keep only `A-Z a-z 0-9 - . _ ~`.
static AWS_QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// How the request path is encoded in the canonical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriEncoding {
    /// Encode the path as sent on the wire once more (`%20` becomes `%2520`).
    /// Every service except S3 expects this.
    Double,
    /// Decode the path, then encode it once.
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningSettings {
    pub uri_encoding: UriEncoding,
    /// Send and sign the payload hash as `X-Amz-Content-Sha256`.
    pub content_sha256_header: bool,
}

impl Default for SigningSettings {
    fn default() -> Self {
        Self {
            uri_encoding: UriEncoding::Double,
            content_sha256_header: true,
        }
    }
}

/// Signs [`UploadRequest`]s with AWS SigV4 for one service and region.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    service: String,
    region: String,
    settings: SigningSettings,
}

impl RequestSigner {
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
            settings: SigningSettings::default(),
        }
    }

    /// A signer for API Gateway (`execute-api`) in `region`.
    pub fn api_gateway(region: &str) -> Self {
        Self::new(API_GATEWAY_SERVICE, region)
    }

    pub fn with_settings(mut self, settings: SigningSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Signs `req` as of `now`, returning a new request with the `Authorization`,
    /// `X-Amz-Date`, `X-Amz-Content-Sha256` and (for temporary credentials)
    /// `X-Amz-Security-Token` headers.
    ///
    /// The output depends only on the arguments. `req` is not modified.
    ///
    /// # Errors
    ///
    /// `UploadError::Signing` if the region, service, access key or secret key
    /// is empty, or a header value is not visible ASCII.
    pub fn sign(
        &self,
        req: &UploadRequest,
        cred: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<SignedUploadRequest> {
        if self.region.is_empty() {
            return Err(UploadError::signing("region is empty"));
        }
        if self.service.is_empty() {
            return Err(UploadError::signing("service name is empty"));
        }
        if cred.access_key_id().is_empty() {
            return Err(UploadError::signing("access key id is empty"));
        }
        if cred.secret_access_key().is_empty() {
            return Err(UploadError::signing("secret access key is empty"));
        }

        let mut signed = req.clone();
        let payload_hash = hex_sha256(req.body());
        canonicalize_headers(
            signed.headers_mut(),
            req.url(),
            cred,
            now,
            self.settings.content_sha256_header.then_some(payload_hash.as_str()),
        )?;

        let (creq, signed_headers) = canonical_request_string(&signed, &self.settings, &payload_hash)?;
        // The canonical request holds token and API key values, so only its shape is logged.
        debug!(%signed_headers, "calculated canonical request");

        // <yyyymmdd>/<region>/<service>/aws4_request
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );

        // Algorithm, timestamp, scope and the hex SHA-256 of the canonical
        // request, one per line.
        let string_to_sign = format!(
            "{ALGORITHM}\n{}\n{scope}\n{}",
            format_iso8601(now),
            hex_sha256(creq.as_bytes())
        );
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            generate_signing_key(cred.secret_access_key(), now, &self.region, &self.service);
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        let mut authorization = HeaderValue::from_str(&format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            cred.access_key_id(),
        ))
        .map_err(|e| UploadError::signing(format!("failed to create authorization header: {e}")))?;
        authorization.set_sensitive(true);
        signed.headers_mut().insert(AUTHORIZATION, authorization);

        Ok(SignedUploadRequest::new(signed))
    }
}

/// Adds the headers that take part in the signature.
fn canonicalize_headers(
    headers: &mut HeaderMap,
    url: &Url,
    cred: &Credentials,
    now: DateTime<Utc>,
    content_sha256: Option<&str>,
) -> Result<()> {
    // A stale signature must not end up in the signed header list.
    headers.remove(AUTHORIZATION);

    if !headers.contains_key(HOST) {
        headers.insert(HOST, header_value(&host(url)?)?);
    }

    headers.insert(
        HeaderName::from_static(X_AMZ_DATE),
        header_value(&format_iso8601(now))?,
    );

    if let Some(hash) = content_sha256 {
        headers.insert(HeaderName::from_static(X_AMZ_CONTENT_SHA_256), header_value(hash)?);
    }

    if let Some(token) = cred.session_token() {
        let mut value = header_value(token)?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static(X_AMZ_SECURITY_TOKEN), value);
    }

    Ok(())
}

/// Returns the canonical request and the `;`-joined signed header names.
fn canonical_request_string(
    req: &UploadRequest,
    settings: &SigningSettings,
    payload_hash: &str,
) -> Result<(String, String)> {
    let mut names: Vec<&str> = req.headers().keys().map(HeaderName::as_str).collect();
    names.sort_unstable();

    let mut lines = vec![
        req.method().to_string(),
        canonical_uri(req.url(), settings.uri_encoding)?,
        canonical_query(req.url()),
    ];
    for name in &names {
        let values = req
            .headers()
            .get_all(*name)
            .iter()
            .map(|v| {
                v.to_str()
                    .map(normalize_header_value)
                    .map_err(|_| UploadError::signing(format!("header {name} is not visible ASCII")))
            })
            .collect::<Result<Vec<_>>>()?;
        lines.push(format!("{name}:{}", values.join(",")));
    }

    // The header block is terminated by an empty line.
    let signed_headers = names.join(";");
    lines.push(String::new());
    lines.push(signed_headers.clone());
    lines.push(payload_hash.to_string());

    Ok((lines.join("\n"), signed_headers))
}

fn canonical_uri(url: &Url, encoding: UriEncoding) -> Result<String> {
    let path = match url.path() {
        "" => "/",
        path => path,
    };

    let encoded = match encoding {
        UriEncoding::Double => utf8_percent_encode(path, &AWS_URI_ENCODE_SET).to_string(),
        UriEncoding::Single => {
            let decoded = percent_decode_str(path)
                .decode_utf8()
                .map_err(|e| UploadError::signing(format!("failed to decode path: {e}")))?;
            utf8_percent_encode(&decoded, &AWS_URI_ENCODE_SET).to_string()
        }
    };
    Ok(encoded)
}

fn canonical_query(url: &Url) -> String {
    let Some(query) = url.query() else {
        return String::new();
    };

    let encode = |raw: &str| {
        let decoded = percent_decode_str(raw).decode_utf8_lossy();
        utf8_percent_encode(&decoded, &AWS_QUERY_ENCODE_SET).to_string()
    };

    let mut pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (encode(k), encode(v))
        })
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Trims the value and collapses inner runs of whitespace to one space.
fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn host(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| UploadError::signing(format!("url {url} has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| UploadError::signing(format!("invalid header value: {e}")))
}

/// Derives the per-day, per-scope key: `secret -> date -> region -> service -> aws4_request`.
fn generate_signing_key(secret: &str, time: DateTime<Utc>, region: &str, service: &str) -> [u8; 32] {
    let mut key = hmac_sha256(format!("AWS4{secret}").as_bytes(), format_date(time).as_bytes());
    for part in [region, service, "aws4_request"] {
        key = hmac_sha256(&key, part.as_bytes());
    }
    key
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(msg);
    let mut output = [0u8; 32];
    output.copy_from_slice(&mac.finalize().into_bytes());
    output
}

fn hex_sha256(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// `20220313`
fn format_date(t: DateTime<Utc>) -> String {
    t.format("%Y%m%d").to_string()
}

/// `20220313T072004Z`
fn format_iso8601(t: DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use reqwest::header::CONTENT_TYPE;
    use reqwest::Method;

    const ACCESS_KEY: &str = "AKIDEXAMPLE";
    const SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    fn credentials(token: Option<&str>) -> Credentials {
        Credentials::new(
            ACCESS_KEY,
            SECRET_KEY,
            token.map(str::to_string),
            None,
            "hardcoded-credentials",
        )
    }

    /// The AWS test suite vectors carry no payload hash header.
    fn test_suite_signer(service: &str) -> RequestSigner {
        RequestSigner::new(service, "us-east-1").with_settings(SigningSettings {
            content_sha256_header: false,
            ..Default::default()
        })
    }

    fn upload_request(api_key: Option<&str>) -> UploadRequest {
        UploadRequest::post(
            Url::parse("https://abc123.execute-api.us-east-1.amazonaws.com/prod/images").unwrap(),
            "image/jpeg",
            bytes::Bytes::from_static(b"\xff\xd8\xff\xe0jpeg-bytes"),
            api_key,
        )
        .unwrap()
    }

    #[test]
    fn test_get_vanilla() {
        let req = UploadRequest::from_parts(
            Method::GET,
            "https://example.amazonaws.com/",
            HeaderMap::new(),
            b"",
        );
        let signed = test_suite_signer("service")
            .sign(&req, &credentials(None), test_time())
            .unwrap();

        assert_eq!(
            signed.authorization().unwrap(),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(signed.headers()[X_AMZ_DATE], "20150830T123600Z");
        assert_eq!(signed.headers()[HOST], "example.amazonaws.com");
    }

    #[test]
    fn test_post_vanilla() {
        let req = UploadRequest::from_parts(
            Method::POST,
            "https://example.amazonaws.com/",
            HeaderMap::new(),
            b"",
        );
        let signed = test_suite_signer("service")
            .sign(&req, &credentials(None), test_time())
            .unwrap();

        assert_eq!(
            signed.authorization().unwrap(),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5da7c1a2acd57cee7505fc6676e4e544621c30862966e37dddb68e92efbe5d6b"
        );
    }

    #[test]
    fn test_iam_list_users() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        let req = UploadRequest::from_parts(
            Method::GET,
            "https://iam.amazonaws.com/?Version=2010-05-08&Action=ListUsers",
            headers,
            b"",
        );
        let signed = test_suite_signer("iam")
            .sign(&req, &credentials(None), test_time())
            .unwrap();

        assert_eq!(
            signed.authorization().unwrap(),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
    }

    #[test]
    fn test_signing_key() {
        let key = generate_signing_key(SECRET_KEY, test_time(), "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_sign_upload_request() {
        let req = upload_request(Some("key-123"));
        let signed = RequestSigner::api_gateway("us-east-1")
            .sign(&req, &credentials(None), test_time())
            .unwrap();

        assert_eq!(
            signed.authorization().unwrap(),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/execute-api/aws4_request, \
             SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date;x-api-key, \
             Signature=6c96a15ae3ef80a8ce6e00ff3e918ac641efb30b506058ac5a263754e5d197df"
        );
        assert_eq!(
            signed.headers()[X_AMZ_CONTENT_SHA_256],
            "b394aa7865c287a1a910721d9fd6ec887f4193f3dad4a74261454f0a42ee3a02"
        );
        assert_eq!(signed.headers()["content-type"], "image/jpeg");
        assert_eq!(signed.headers()["x-api-key"], "key-123");
        assert!(signed.headers().get(X_AMZ_SECURITY_TOKEN).is_none());
        assert_eq!(signed.request().body(), req.body());
    }

    #[test]
    fn test_sign_with_session_token() {
        let req = upload_request(Some("key-123"));
        let signed = RequestSigner::api_gateway("us-east-1")
            .sign(&req, &credentials(Some("session-token")), test_time())
            .unwrap();

        assert_eq!(signed.headers()[X_AMZ_SECURITY_TOKEN], "session-token");
        assert!(signed.headers()[X_AMZ_SECURITY_TOKEN].is_sensitive());
        assert!(signed.headers()[AUTHORIZATION].is_sensitive());
        assert_eq!(
            signed.authorization().unwrap(),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/execute-api/aws4_request, \
             SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date;x-amz-security-token;x-api-key, \
             Signature=700dc88aad93dd7dbd529f5d8af6e841d5d377685c0f66c1143cca504218cfbd"
        );
    }

    #[test]
    fn test_sign_is_deterministic_and_leaves_input_untouched() {
        let req = upload_request(None);
        let before = format!("{:?}", req.headers());
        let signer = RequestSigner::api_gateway("eu-west-1");

        let first = signer.sign(&req, &credentials(None), test_time()).unwrap();
        let second = signer.sign(&req, &credentials(None), test_time()).unwrap();

        assert_eq!(first.headers(), second.headers());
        assert_eq!(format!("{:?}", req.headers()), before);
        assert_eq!(req.headers().len(), 1);
        assert!(req.headers().get(AUTHORIZATION).is_none());

        let later = signer
            .sign(
                &req,
                &credentials(None),
                Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 1).unwrap(),
            )
            .unwrap();
        assert_ne!(first.authorization(), later.authorization());
    }

    #[test]
    fn test_resigning_replaces_authorization() {
        let req = upload_request(None);
        let signer = RequestSigner::api_gateway("us-east-1");
        let signed = signer.sign(&req, &credentials(None), test_time()).unwrap();
        let resigned = signer
            .sign(signed.request(), &credentials(None), test_time())
            .unwrap();

        assert_eq!(signed.authorization(), resigned.authorization());
    }

    #[test]
    fn test_sign_rejects_incomplete_input() {
        let req = upload_request(None);
        let now = test_time();

        let empty_access = Credentials::new("", SECRET_KEY, None, None, "test");
        let err = RequestSigner::api_gateway("us-east-1")
            .sign(&req, &empty_access, now)
            .unwrap_err();
        assert!(matches!(err, UploadError::Signing(_)));

        let empty_secret = Credentials::new(ACCESS_KEY, "", None, None, "test");
        let err = RequestSigner::api_gateway("us-east-1")
            .sign(&req, &empty_secret, now)
            .unwrap_err();
        assert!(matches!(err, UploadError::Signing(_)));

        let err = RequestSigner::api_gateway("")
            .sign(&req, &credentials(None), now)
            .unwrap_err();
        assert!(matches!(err, UploadError::Signing(_)));
    }

    #[test]
    fn test_canonical_uri() {
        let url = Url::parse("https://example.com/prod/my photos/a+b.jpg").unwrap();
        assert_eq!(
            canonical_uri(&url, UriEncoding::Double).unwrap(),
            "/prod/my%2520photos/a%2Bb.jpg"
        );
        assert_eq!(
            canonical_uri(&url, UriEncoding::Single).unwrap(),
            "/prod/my%20photos/a%2Bb.jpg"
        );

        let url = Url::parse("https://example.com").unwrap();
        assert_eq!(canonical_uri(&url, UriEncoding::Double).unwrap(), "/");
    }

    #[test]
    fn test_canonical_query() {
        let url = Url::parse("https://example.com/?b=2&a=2&a=1&prefix=CI/&empty").unwrap();
        assert_eq!(canonical_query(&url), "a=1&a=2&b=2&empty=&prefix=CI%2F");

        let url = Url::parse("https://example.com/?key=hello%20world").unwrap();
        assert_eq!(canonical_query(&url), "key=hello%20world");

        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(canonical_query(&url), "");
    }

    #[test]
    fn test_canonical_request() {
        let mut headers = HeaderMap::new();
        headers.insert("my-header1", HeaderValue::from_static("  value1  "));
        headers.append("my-header1", HeaderValue::from_static("a   b   c"));
        headers.insert(HOST, HeaderValue::from_static("example.amazonaws.com"));
        let req = UploadRequest::from_parts(
            Method::GET,
            "https://example.amazonaws.com/",
            headers,
            b"",
        );

        let (creq, signed_headers) =
            canonical_request_string(&req, &SigningSettings::default(), &hex_sha256(b""))
                .unwrap();
        assert_eq!(signed_headers, "host;my-header1");
        assert_eq!(
            creq,
            "GET\n/\n\nhost:example.amazonaws.com\nmy-header1:value1,a b c\n\nhost;my-header1\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_host_keeps_non_default_port() {
        let url = Url::parse("http://127.0.0.1:9000/upload").unwrap();
        assert_eq!(host(&url).unwrap(), "127.0.0.1:9000");

        let url = Url::parse("https://example.com:443/upload").unwrap();
        assert_eq!(host(&url).unwrap(), "example.com");
    }
}
