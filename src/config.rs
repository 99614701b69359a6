//! Runtime configuration.
//!
//! All settings come from the process environment, optionally seeded from a
//! `.env` file in the base directory. Nothing else in the crate reads the
//! environment: components receive an explicit [`Config`].

use std::fmt;
use std::path::Path;

use aws_credential_types::Credentials;
use tracing::{debug, warn};

use crate::error::{Result, UploadError};
use crate::types::SigningMode;

pub const API_KEY: &str = "API_KEY";
pub const API_ENDPOINT_URI: &str = "API_ENDPOINT_URI";
pub const API_ENDPOINT_PATH: &str = "API_ENDPOINT_PATH";
pub const API_ENDPOINT_REGION: &str = "API_ENDPOINT_REGION";
pub const API_SIGNING_MODE: &str = "API_SIGNING_MODE";
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// Every variable the loader understands.
pub const ALL_VARIABLES: [&str; 8] = [
    API_KEY,
    API_ENDPOINT_URI,
    API_ENDPOINT_PATH,
    API_ENDPOINT_REGION,
    API_SIGNING_MODE,
    AWS_ACCESS_KEY_ID,
    AWS_SECRET_ACCESS_KEY,
    AWS_SESSION_TOKEN,
];

/// Name of the optional environment file looked up in the base directory.
pub const DOTENV_FILE: &str = ".env";

/// Immutable settings for a single upload run.
///
/// Every field is optional; an empty variable counts as unset. Missing values
/// are only reported by the component that needs them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<String>,
    pub endpoint_uri: Option<String>,
    pub endpoint_path: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Explicit `API_SIGNING_MODE`, if any.
    pub forced_mode: Option<SigningMode>,
}

impl Config {
    /// Loads `<base_dir>/.env` into the process environment and reads the
    /// configuration from it.
    ///
    /// Variables already present in the environment win over the file. A
    /// missing file is not an error.
    pub fn load(base_dir: &Path) -> Self {
        let dotenv = base_dir.join(DOTENV_FILE);
        match dotenvy::from_path(&dotenv) {
            Ok(()) => debug!(path = %dotenv.display(), "loaded environment file"),
            Err(err) if err.not_found() => {
                debug!(path = %dotenv.display(), "no environment file found")
            }
            Err(err) => {
                warn!(path = %dotenv.display(), error = %err, "ignoring unreadable environment file")
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let forced_mode = value(API_SIGNING_MODE).and_then(|raw| {
            let mode = raw.parse::<SigningMode>().ok();
            if mode.is_none() {
                warn!(value = %raw, "ignoring unknown {API_SIGNING_MODE}");
            }
            mode
        });

        Self {
            api_key: value(API_KEY),
            endpoint_uri: value(API_ENDPOINT_URI),
            endpoint_path: value(API_ENDPOINT_PATH),
            region: value(API_ENDPOINT_REGION),
            access_key_id: value(AWS_ACCESS_KEY_ID),
            secret_access_key: value(AWS_SECRET_ACCESS_KEY),
            session_token: value(AWS_SESSION_TOKEN),
            forced_mode,
        }
    }

    /// Whether requests from this configuration are signed.
    ///
    /// Without an explicit `API_SIGNING_MODE`, the presence of either half of
    /// the AWS key pair selects signing. A half-configured pair therefore fails
    /// at signing time rather than silently going out unsigned.
    pub fn signing_mode(&self) -> SigningMode {
        match self.forced_mode {
            Some(mode) => mode,
            None if self.access_key_id.is_some() || self.secret_access_key.is_some() => {
                SigningMode::Signed
            }
            None => SigningMode::Unsigned,
        }
    }

    /// AWS credentials for signing.
    pub fn credentials(&self) -> Result<Credentials> {
        let access_key_id = self
            .access_key_id
            .as_deref()
            .ok_or_else(|| UploadError::signing(format!("{AWS_ACCESS_KEY_ID} is not set")))?;
        let secret_access_key = self
            .secret_access_key
            .as_deref()
            .ok_or_else(|| UploadError::signing(format!("{AWS_SECRET_ACCESS_KEY} is not set")))?;

        Ok(Credentials::new(
            access_key_id,
            secret_access_key,
            self.session_token.clone(),
            None,
            "environment",
        ))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> Option<&'static str> {
            value.as_ref().map(|_| "** redacted **")
        }

        f.debug_struct("Config")
            .field("api_key", &redact(&self.api_key))
            .field("endpoint_uri", &self.endpoint_uri)
            .field("endpoint_path", &self.endpoint_path)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("session_token", &redact(&self.session_token))
            .field("forced_mode", &self.forced_mode)
            .finish()
    }
}
