//! Action executor trait

use async_trait::async_trait;

use crate::types::{ActionOutcome, ActionParams};

/// Performs one provisioning action against one switch, or against the
/// fabric as a whole when `host` is `None`.
///
/// The engine retries invocations, so implementations must tolerate being
/// called again after a timeout or partial failure without corrupting the
/// switch. Failures are reported through the returned outcome, never by
/// panicking.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn invoke(&self, action: &str, host: Option<&str>, params: &ActionParams)
    -> ActionOutcome;

    /// Whether this executor knows the action
    fn supports(&self, _action: &str) -> bool {
        true
    }
}
