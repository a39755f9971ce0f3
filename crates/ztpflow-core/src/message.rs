//! Message types for actor communication
//!
//! Message handlers are implemented in their respective actor modules.

use kameo_macros::Reply;
use ztpflow_actions::{ActionParams, OutcomeStatus};

use crate::retry::RetryPolicy;
use crate::state::SwitchState;

/// Run one stage's action on the switch, with retries
#[derive(Debug, Clone)]
pub struct InvokeAction {
    /// Stage the invocation belongs to
    pub stage: String,
    /// Action id
    pub action: String,
    /// Parameters already rendered for this switch
    pub params: ActionParams,
    /// Retry policy of the stage
    pub policy: RetryPolicy,
}

/// Get the switch's status
#[derive(Debug)]
pub struct GetSwitchStatus;

/// Switch status response
#[derive(Debug, Clone, Reply)]
pub struct SwitchStatus {
    /// Switch name
    pub name: String,
    /// Current state
    pub state: SwitchState,
    /// Action invocations handled (retries count once)
    pub invocations: u32,
    /// Stage of the last invocation
    pub last_stage: Option<String>,
    /// Outcome status of the last invocation
    pub last_status: Option<OutcomeStatus>,
}
