//! Upload a local image to an AWS API Gateway endpoint.
//!
//! The crate reads a file relative to a base directory, guesses its MIME type,
//! and `POST`s the raw bytes to `API_ENDPOINT_URI + API_ENDPOINT_PATH`. When AWS
//! credentials are configured the request is signed with AWS Signature
//! Version 4 for the `execute-api` service, so it passes an `AWS_IAM`
//! authorizer.
//!
//! ## Features
//! - Configuration from the environment and an optional `.env` file.
//! - Self-contained SigV4 signer, checked against the published AWS test vectors.
//! - HTTP transport with a fixed timeout, no redirects, and no errors on 4xx/5xx.
//! - Typed errors that record how far a run got before failing.
//!
//! ```no_run
//! # use apigw_upload::{Config, HttpTransport, Uploader};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let base_dir = std::env::current_dir()?;
//! let config = Config::load(&base_dir);
//! let uploader = Uploader::new(config, base_dir, HttpTransport::new()?);
//! let response = uploader.run("photo.jpg", &mut std::io::stdout()).await?;
//! println!("finished with {}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod request;
pub mod signer;
pub mod types;

pub use app::{Stage, Uploader};
pub use client::{HttpTransport, Transport};
pub use config::Config;
pub use error::{UploadError, UploadFailure};
pub use file::{read_file, LocalFile};
pub use request::{endpoint_url, UploadRequest};
pub use signer::{RequestSigner, SigningSettings, UriEncoding};
pub use types::{SignedUploadRequest, SigningMode, UploadResponse};
