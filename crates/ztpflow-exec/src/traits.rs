//! Command transport trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Runs a single command line on a switch
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command to completion
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Run a command, giving up after `timeout`
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Whether a session is currently open
    fn is_connected(&self) -> bool {
        true
    }

    /// Short transport name for logs
    fn executor_type(&self) -> &'static str;
}
