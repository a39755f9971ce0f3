//! SSH command execution using the russh crate

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::credentials::Credentials;
use crate::error::ExecError;
use crate::result::{CommandResult, ConnectionInfo};
use crate::traits::RemoteExecutor;

#[derive(Debug)]
struct SwitchClientHandler;

impl client::Handler for SwitchClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Factory-default switches regenerate host keys on every reset.
        Ok(true)
    }
}

/// Runs commands on a switch over a lazily opened SSH session
///
/// The session is opened on first use and reused for every later command,
/// so a stage that issues many CLI calls logs in once.
pub struct SshExecutor {
    conn_info: ConnectionInfo,
    credentials: Arc<Credentials>,
    session: Mutex<Option<client::Handle<SwitchClientHandler>>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("conn_info", &self.conn_info)
            .field("credentials", &self.credentials)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Create an executor for one switch
    #[must_use]
    pub fn new(conn_info: ConnectionInfo, credentials: Arc<Credentials>) -> Self {
        Self {
            conn_info,
            credentials,
            session: Mutex::new(None),
        }
    }

    /// Get connection info
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.conn_info
    }

    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn connect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if session_lock.is_some() {
            return Ok(());
        }

        info!(
            port = self.conn_info.port,
            user = %self.conn_info.user,
            "opening SSH session"
        );

        let config = Arc::new(client::Config::default());
        let mut session = client::connect(
            config,
            (&self.conn_info.host[..], self.conn_info.port),
            SwitchClientHandler,
        )
        .await
        .map_err(|e| ExecError::ConnectionFailed {
            host: self.conn_info.host.clone(),
            reason: e.to_string(),
        })?;

        let authenticated = if let Some(password) = self.credentials.password_value() {
            session
                .authenticate_password(&self.conn_info.user, password)
                .await
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?
                .success()
        } else if let Some(key_path) = self.credentials.key_path() {
            let key_pair =
                load_secret_key(key_path, None).map_err(|e| ExecError::Credentials(e.to_string()))?;

            let hash_alg = session
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();
            session
                .authenticate_publickey(
                    &self.conn_info.user,
                    PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                )
                .await
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?
                .success()
        } else {
            return Err(ExecError::AuthenticationFailed(
                "no password or key configured".to_string(),
            ));
        };

        if !authenticated {
            return Err(ExecError::AuthenticationFailed(format!(
                "switch {} rejected user {}",
                self.conn_info.host, self.conn_info.user
            )));
        }

        info!("SSH session authenticated");

        *session_lock = Some(session);
        Ok(())
    }

    #[instrument(skip(self, cmd), fields(host = %self.conn_info.host))]
    async fn execute_remote(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let mut session_lock = self.session.lock().await;
        let session = session_lock.as_mut().ok_or(ExecError::NotConnected)?;

        let start = Instant::now();

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut status = -1;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                // ext 1 is stderr
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => stderr.extend_from_slice(&data),
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    status = exit_status.cast_signed();
                }
                Some(ChannelMsg::Eof) | None => break,
                _ => {}
            }
        }

        let result = CommandResult {
            status,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration: start.elapsed(),
        };

        debug!(status, duration = ?result.duration, "remote command completed");

        Ok(result)
    }

    /// Close the session, if one is open
    ///
    /// # Errors
    /// Returns `ExecError::IoError` if the disconnect message cannot be sent
    pub async fn disconnect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %self.conn_info.host, "SSH session closed");
        }
        Ok(())
    }

    async fn drop_session(&self) {
        // A stalled channel may leave the session unusable; reconnect next time.
        self.session.lock().await.take();
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.connect().await?;
        self.execute_remote(cmd).await
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<CommandResult, ExecError> {
        // Login counts against the same timeout as the command.
        match timeout(timeout_duration, self.run(cmd)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    host = %self.conn_info.host,
                    timeout = ?timeout_duration,
                    "remote command timed out"
                );
                self.drop_session().await;
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.session
            .try_lock()
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_switch_is_retryable() {
        // Nothing listens on port 1; the dial fails before auth is attempted.
        let executor = SshExecutor::new(
            ConnectionInfo::new("127.0.0.1", "network-admin").with_port(1),
            Arc::new(Credentials::anonymous()),
        );

        let err = executor.run("switch-local-show").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!executor.is_connected());
    }
}
