//! Error types for ztpflow-exec

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a command transport
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Switch could not be reached
    #[error("connection to {host} failed: {reason}")]
    ConnectionFailed {
        /// Address that was dialed
        host: String,
        /// Underlying failure
        reason: String,
    },

    /// Login was rejected
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Command did not finish in time
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Credential material could not be loaded
    #[error("credential error: {0}")]
    Credentials(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// Channel or pipe I/O failed mid-command
    #[error("I/O error: {0}")]
    IoError(String),

    /// Session was never established
    #[error("not connected")]
    NotConnected,
}

impl ExecError {
    /// Whether a later attempt could plausibly succeed.
    ///
    /// Switches that are still booting refuse connections or stall, so those
    /// two cases are worth another try; everything else is not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed { .. } | ExecError::Timeout { .. } | ExecError::NotConnected
        )
    }
}
