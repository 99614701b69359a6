//! The upload run: read the file, build the request, sign it, send it, report.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::client::Transport;
use crate::config::Config;
use crate::error::{Result, UploadError, UploadFailure};
use crate::file::read_file;
use crate::request::{endpoint_url, UploadRequest};
use crate::signer::RequestSigner;
use crate::types::{SigningMode, UploadResponse};

/// `Content-type` sent when no MIME type can be guessed for the file.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Progress of a single run. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    ConfigLoaded,
    FileRead,
    RequestBuilt,
    Signed,
    Sent,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::ConfigLoaded => "config-loaded",
            Stage::FileRead => "file-read",
            Stage::RequestBuilt => "request-built",
            Stage::Signed => "signed",
            Stage::Sent => "sent",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Uploads one file per [`run`](Uploader::run) through a [`Transport`].
pub struct Uploader<T> {
    config: Config,
    base_dir: PathBuf,
    transport: T,
    time: Option<DateTime<Utc>>,
}

impl<T: Transport> Uploader<T> {
    pub fn new(config: Config, base_dir: impl Into<PathBuf>, transport: T) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
            transport,
            time: None,
        }
    }

    /// Pins the SigV4 timestamp instead of reading the clock at send time.
    ///
    /// API Gateway rejects signatures more than a few minutes off, so this is
    /// only meant for reproducible tests.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Uploads `filename` (relative to the base directory), writing progress
    /// and the response to `out`.
    ///
    /// Any HTTP status counts as success. On failure nothing further is sent,
    /// and the error carries the last stage reached.
    pub async fn run<W: Write>(
        &self,
        filename: &str,
        out: &mut W,
    ) -> Result<UploadResponse, UploadFailure> {
        let mut stage = Stage::Init;
        advance(&mut stage, Stage::ConfigLoaded);

        match self.execute(filename, out, &mut stage).await {
            Ok(response) => Ok(response),
            Err(error) => {
                warn!(%stage, %error, "upload failed");
                Err(UploadFailure { stage, error })
            }
        }
    }

    async fn execute<W: Write>(
        &self,
        filename: &str,
        out: &mut W,
        stage: &mut Stage,
    ) -> Result<UploadResponse> {
        let file = read_file(&self.base_dir, filename).await?;
        let mime_type = file.mime_type().unwrap_or_else(|| {
            warn!(
                path = %file.path().display(),
                "could not determine MIME type, using {FALLBACK_MIME_TYPE}"
            );
            FALLBACK_MIME_TYPE
        });
        writeln!(out, "Mime type: {mime_type}").map_err(UploadError::Output)?;
        writeln!(out, "Uploading {} bytes", file.len()).map_err(UploadError::Output)?;
        advance(stage, Stage::FileRead);

        let url = endpoint_url(
            self.config.endpoint_uri.as_deref(),
            self.config.endpoint_path.as_deref(),
        )?;
        let request = UploadRequest::post(
            url,
            mime_type,
            file.contents().clone(),
            self.config.api_key.as_deref(),
        )?;
        advance(stage, Stage::RequestBuilt);

        let outgoing = match self.config.signing_mode() {
            SigningMode::Signed => {
                let credentials = self.config.credentials()?;
                let region = self.config.region.as_deref().unwrap_or_default();
                let now = self.time.unwrap_or_else(Utc::now);
                let signed = RequestSigner::api_gateway(region).sign(&request, &credentials, now)?;
                advance(stage, Stage::Signed);
                signed.into_request()
            }
            SigningMode::Unsigned => {
                info!("no AWS credentials configured, sending unsigned request");
                request
            }
        };

        let response = self.transport.send(&outgoing).await?;
        advance(stage, Stage::Sent);

        writeln!(out, "Response status code: {}", response.status.as_u16())
            .map_err(UploadError::Output)?;
        out.write_all(&response.body).map_err(UploadError::Output)?;
        writeln!(out).map_err(UploadError::Output)?;
        out.flush().map_err(UploadError::Output)?;
        advance(stage, Stage::Done);

        Ok(response)
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "stage transition");
    *stage = next;
}
