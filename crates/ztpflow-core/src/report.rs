//! Run reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ztpflow_actions::{ActionOutcome, OutcomeStatus};

use crate::stage::StageDefinition;
use crate::state::StageState;

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every stage completed successfully
    Success,
    /// At least one stage failed fatally
    Fatal,
    /// Soft failures, skipped stages or an aborted run
    Incomplete,
}

impl Verdict {
    /// Process exit code for this verdict
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Success => 0,
            Verdict::Fatal => 1,
            Verdict::Incomplete => 2,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Success => write!(f, "success"),
            Verdict::Fatal => write!(f, "fatal"),
            Verdict::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// One stage's line in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub id: String,
    pub description: String,
    pub state: StageState,
    pub status: OutcomeStatus,
    /// `"1"` for fatal failures, `"0"` otherwise
    pub error_code: String,
    pub attempts: u32,
    pub changed: bool,
    pub output: Vec<String>,
    /// Switches the stage targeted
    pub hosts: Vec<String>,
}

impl StageReport {
    #[must_use]
    pub fn new(
        stage: &StageDefinition,
        state: StageState,
        outcome: &ActionOutcome,
        hosts: Vec<String>,
    ) -> Self {
        Self {
            id: stage.id.clone(),
            description: stage.description.clone(),
            state,
            status: outcome.status,
            error_code: outcome.error_code().to_string(),
            attempts: outcome.attempts,
            changed: outcome.changed,
            output: outcome.output.clone(),
            hosts,
        }
    }
}

/// Everything a run did, in stage order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub stages: Vec<StageReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Run stopped before reaching every stage
    pub aborted: bool,
}

impl ExecutionReport {
    /// Look up a stage by id
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn verdict(&self) -> Verdict {
        if self.stages.iter().any(|s| s.status == OutcomeStatus::FatalFailure) {
            Verdict::Fatal
        } else if !self.aborted
            && self
                .stages
                .iter()
                .all(|s| s.state == StageState::Completed && s.status == OutcomeStatus::Success)
        {
            Verdict::Success
        } else {
            Verdict::Incomplete
        }
    }

    /// Run duration
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
