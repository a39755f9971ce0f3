//! Stage and switch state machines

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one stage within a run
///
/// ```text
/// Pending ──► Running ──► Completed
///    │
///    └──────► Skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Running,
    Completed,
    Skipped,
}

impl StageState {
    /// Check if transition to the target state is valid
    #[must_use]
    pub fn can_transition_to(self, target: StageState) -> bool {
        matches!(
            (self, target),
            (StageState::Pending, StageState::Running | StageState::Skipped)
                | (StageState::Running, StageState::Completed)
        )
    }

    /// Whether the stage will not change any more
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, StageState::Completed | StageState::Skipped)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Completed => "completed",
            StageState::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// What a switch actor is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    Idle,
    Busy,
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchState::Idle => write!(f, "idle"),
            SwitchState::Busy => write!(f, "busy"),
        }
    }
}
