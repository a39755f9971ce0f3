//! Stage gating on earlier outcomes

use ztpflow_actions::OutcomeStatus;

use crate::context::ExecutionContext;
use crate::stage::StageDefinition;

/// Result of evaluating a stage's gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Stage has no dependency
    Ungated,
    /// Dependency outcome allows the stage to run
    Permitted,
    /// Stage must be skipped
    Denied(String),
}

impl GateDecision {
    #[must_use]
    pub fn is_permitted(&self) -> bool {
        !matches!(self, GateDecision::Denied(_))
    }
}

/// Decides whether a stage may run given what has run before it
pub struct StageGate;

impl StageGate {
    /// Whether `stage` may run
    #[must_use]
    pub fn permits(stage: &StageDefinition, context: &ExecutionContext) -> bool {
        Self::evaluate(stage, context).is_permitted()
    }

    /// Evaluate the gate, with the reason when it is closed
    ///
    /// A fatal dependency always closes the gate. A dependency that has no
    /// outcome, or was itself skipped, closes it unless the gate allows
    /// missing outcomes. Soft failures close it only when asked to.
    #[must_use]
    pub fn evaluate(stage: &StageDefinition, context: &ExecutionContext) -> GateDecision {
        let Some(gate) = &stage.requires else {
            return GateDecision::Ungated;
        };

        let prior = context
            .get(&gate.stage)
            .filter(|outcome| outcome.status != OutcomeStatus::Skipped);

        match prior {
            None if gate.allow_missing => GateDecision::Permitted,
            None => GateDecision::Denied(format!("required stage {} did not run", gate.stage)),
            Some(outcome) => match outcome.status {
                OutcomeStatus::FatalFailure => GateDecision::Denied(format!(
                    "required stage {} failed fatally",
                    gate.stage
                )),
                OutcomeStatus::SoftFailure if gate.block_on_soft_failure => GateDecision::Denied(
                    format!("required stage {} did not succeed", gate.stage),
                ),
                _ => GateDecision::Permitted,
            },
        }
    }
}
