//! Switch login credentials
//!
//! Credentials are resolved once per run and handed to transports and action
//! executors as an opaque value. Secrets never appear in `Debug` output.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use tracing::debug;

/// Where the login secret comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CredentialSource {
    /// No credentials (switch CLI runs as the local user)
    #[default]
    None,
    /// Username with a password read from an environment variable
    Password {
        /// Login user
        username: String,
        /// Environment variable holding the password
        password_env: String,
    },
    /// Username with a private key file
    KeyFile {
        /// Login user
        username: String,
        /// Path to the private key
        path: PathBuf,
    },
    /// Username with a base64-encoded private key in an environment variable
    EnvKey {
        /// Login user
        username: String,
        /// Environment variable holding the encoded key
        var: String,
    },
}

impl CredentialSource {
    /// Load the secret material
    ///
    /// For `EnvKey`, decodes the key and writes it to a private temp file
    /// that lives as long as the returned [`Credentials`].
    ///
    /// # Errors
    /// Returns `CredentialError` if the environment variable is missing, the
    /// key is not valid base64, or the key file has loose permissions.
    pub fn resolve(&self) -> Result<Credentials, CredentialError> {
        match self {
            CredentialSource::None => Ok(Credentials::anonymous()),
            CredentialSource::Password {
                username,
                password_env,
            } => {
                let password = env::var(password_env)
                    .map_err(|_| CredentialError::EnvNotSet(password_env.clone()))?;
                Ok(Credentials {
                    username: Some(username.clone()),
                    secret: Secret::Password(password),
                })
            }
            CredentialSource::KeyFile { username, path } => {
                validate_key_permissions(path)?;
                Ok(Credentials {
                    username: Some(username.clone()),
                    secret: Secret::KeyPath(path.clone()),
                })
            }
            CredentialSource::EnvKey { username, var } => {
                let encoded = env::var(var).map_err(|_| CredentialError::EnvNotSet(var.clone()))?;
                let key_data = base64_decode(&encoded).map_err(|_| CredentialError::InvalidBase64)?;
                let path = write_temp_key(&key_data)?;
                Ok(Credentials {
                    username: Some(username.clone()),
                    secret: Secret::TempKey(path),
                })
            }
        }
    }
}

/// Resolved login secret
pub enum Secret {
    /// Nothing to present
    None,
    /// Plain password
    Password(String),
    /// Private key on disk
    KeyPath(PathBuf),
    /// Private key decoded into a temp file (removed on drop)
    TempKey(TempPath),
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::None => f.write_str("None"),
            Secret::Password(_) => f.write_str("Password(<redacted>)"),
            Secret::KeyPath(p) => f.debug_tuple("KeyPath").field(p).finish(),
            Secret::TempKey(p) => f.debug_tuple("TempKey").field(&p.display()).finish(),
        }
    }
}

/// Username plus secret, consumed opaquely by transports
#[derive(Debug)]
pub struct Credentials {
    /// Login user, if the source names one
    pub username: Option<String>,
    /// Login secret
    pub secret: Secret,
}

impl Credentials {
    /// Credentials that present nothing
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            username: None,
            secret: Secret::None,
        }
    }

    /// Username and password pair
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            secret: Secret::Password(password.into()),
        }
    }

    /// Password, when the secret is one
    #[must_use]
    pub fn password_value(&self) -> Option<&str> {
        match &self.secret {
            Secret::Password(p) => Some(p),
            _ => None,
        }
    }

    /// Private key path, when the secret is a key
    #[must_use]
    pub fn key_path(&self) -> Option<&Path> {
        match &self.secret {
            Secret::KeyPath(p) => Some(p.as_path()),
            Secret::TempKey(p) => {
                let path: &Path = p;
                Some(path)
            }
            _ => None,
        }
    }
}

/// Credential resolution errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

fn validate_key_permissions(path: &Path) -> Result<(), CredentialError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode();

    // group/other bits must be clear
    if mode & 0o77 != 0 {
        return Err(CredentialError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

/// Write the key to a fresh `0600` file that no other process can have
/// pre-created; the file is removed when the returned path drops.
fn write_temp_key(key_data: &[u8]) -> Result<TempPath, CredentialError> {
    use std::io::Write;

    let mut file = tempfile::Builder::new().prefix("ztpflow_key_").tempfile()?;
    file.write_all(key_data)?;
    file.as_file().sync_all()?;
    let path = file.into_temp_path();

    debug!(path = %path.display(), "wrote temporary switch key");

    Ok(path)
}
