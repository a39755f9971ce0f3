//! Core error types for ztpflow-core

use thiserror::Error;
use ztpflow_actions::ActionError;
use ztpflow_inventory::InventoryError;

use crate::state::StageState;

/// Errors that stop a run before any stage executes, or break the engine
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Workflow file could not be read
    #[error("failed to read workflow {path}: {reason}")]
    Read {
        /// File path
        path: String,
        /// Underlying error
        reason: String,
    },

    /// Workflow file is not valid TOML or has the wrong shape
    #[error("invalid workflow: {0}")]
    Parse(String),

    /// Stage id is empty
    #[error("stage #{0} has an empty id")]
    EmptyStageId(usize),

    /// Two stages share an id
    #[error("duplicate stage id: {0}")]
    DuplicateStage(String),

    /// Gate references a stage that does not exist
    #[error("stage {stage} requires unknown stage {requires}")]
    UnknownDependency {
        /// Gated stage
        stage: String,
        /// Missing dependency
        requires: String,
    },

    /// Gate references the stage itself or a stage declared after it
    #[error("stage {stage} requires {requires}, which does not run before it")]
    ForwardDependency {
        /// Gated stage
        stage: String,
        /// Dependency declared later
        requires: String,
    },

    /// The action executor does not know the stage's action
    #[error("stage {stage}: unsupported action {action}")]
    UnsupportedAction {
        /// Stage id
        stage: String,
        /// Action id
        action: String,
    },

    /// Target expression selected no hosts
    #[error("stage {stage}: target {targets} selects no hosts")]
    EmptyTargets {
        /// Stage id
        stage: String,
        /// Target expression
        targets: String,
    },

    /// A group action's params refer to the current host
    #[error("stage {stage} runs once per group but parameter {param} uses {{{{ host }}}}")]
    HostPlaceholderInGroupStage {
        /// Stage id
        stage: String,
        /// Parameter name
        param: String,
    },

    /// Stage parameter is malformed
    #[error("stage {stage}: {source}")]
    Param {
        /// Stage id
        stage: String,
        /// Template problem
        source: ActionError,
    },

    /// Host group or selector problem
    #[error("stage {stage}: {source}")]
    Targets {
        /// Stage id
        stage: String,
        /// Resolution problem
        source: InventoryError,
    },

    /// An `[actions.<id>]` table is invalid
    #[error(transparent)]
    Action(#[from] ActionError),

    /// Host group resolution failed
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Outcome recorded twice for one stage
    #[error("outcome already recorded for stage {0}")]
    AlreadyRecorded(String),

    /// Invalid stage state transition attempted
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: StageState,
        /// Attempted target state
        to: StageState,
    },

    /// Actor communication error
    #[error("actor communication error: {0}")]
    ActorError(String),
}
