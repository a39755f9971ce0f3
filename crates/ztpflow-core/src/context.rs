//! Per-run record of stage outcomes

use std::collections::HashMap;

use ztpflow_actions::ActionOutcome;

use crate::error::CoreError;

/// Outcomes of the stages that have finished so far
///
/// Only the orchestrator writes to it, once per stage. Gates and reporting
/// read from it.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    outcomes: HashMap<String, ActionOutcome>,
    order: Vec<String>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stage's final outcome
    ///
    /// # Errors
    /// Returns `CoreError::AlreadyRecorded` if the stage already has one.
    pub fn record(
        &mut self,
        stage: impl Into<String>,
        outcome: ActionOutcome,
    ) -> Result<(), CoreError> {
        let stage = stage.into();
        if self.outcomes.contains_key(&stage) {
            return Err(CoreError::AlreadyRecorded(stage));
        }
        self.order.push(stage.clone());
        self.outcomes.insert(stage, outcome);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, stage: &str) -> Option<&ActionOutcome> {
        self.outcomes.get(stage)
    }

    /// Stage ids in the order they were recorded
    #[must_use]
    pub fn completion_order(&self) -> &[String] {
        &self.order
    }

    /// (stage, outcome) in completion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionOutcome)> {
        self.order
            .iter()
            .filter_map(|id| self.outcomes.get(id).map(|o| (id.as_str(), o)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
