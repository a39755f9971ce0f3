//! Progress events broadcast while a run is in flight

use serde::{Deserialize, Serialize};
use ztpflow_actions::OutcomeStatus;

use crate::report::Verdict;

/// Event emitted by the orchestrator and switch actors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Targets resolved, first stage about to start
    RunStarted { stages: usize },
    /// Stage passed its gate and started
    StageStarted { stage: String, hosts: Vec<String> },
    /// One attempt of one invocation finished
    AttemptFinished {
        stage: String,
        host: Option<String>,
        attempt: u32,
        status: OutcomeStatus,
    },
    /// Stage gate was closed
    StageSkipped { stage: String, reason: String },
    /// Stage outcome recorded
    StageCompleted {
        stage: String,
        status: OutcomeStatus,
        attempts: u32,
        output: Vec<String>,
    },
    /// Run stopped early; `next_stage` never ran
    RunAborted { next_stage: Option<String> },
    /// Run over
    RunFinished { verdict: Verdict },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::StageSkipped {
            stage: "vrrp-setup".to_string(),
            reason: "required stage l3-setup failed fatally".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage_skipped");
        assert_eq!(json["stage"], "vrrp-setup");
    }
}
