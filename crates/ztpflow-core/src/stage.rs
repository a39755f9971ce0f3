//! Stage definitions and workflow files

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use ztpflow_actions::{ActionParams, ActionSpec, ParamValue};
use ztpflow_inventory::TargetSelector;

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::params::referenced_groups;
use crate::retry::RetryPolicy;

/// How many times a stage's action is invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Once per selected switch
    #[default]
    PerHost,
    /// Once for the whole fabric, with no current host
    Group,
}

/// Dependency of a stage on an earlier one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSpec {
    /// Stage whose outcome is consulted
    pub stage: String,
    /// Also block when that stage ended in a soft failure
    #[serde(default)]
    pub block_on_soft_failure: bool,
    /// Run even if that stage never produced an outcome
    #[serde(default)]
    pub allow_missing: bool,
}

impl GateSpec {
    /// Gate on `stage` with default policy
    pub fn on(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            block_on_soft_failure: false,
            allow_missing: false,
        }
    }

    /// Block on soft failures too
    #[must_use]
    pub fn block_on_soft_failure(mut self) -> Self {
        self.block_on_soft_failure = true;
        self
    }

    /// Permit when the dependency has no outcome
    #[must_use]
    pub fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }
}

fn default_retries() -> u32 {
    3
}

fn default_delay_secs() -> u64 {
    1
}

/// One provisioning step (`[[stage]]` in a workflow)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Unique id, also the key other stages gate on
    pub id: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Switches the stage runs against
    pub targets: TargetSelector,
    /// Action handed to the executor
    pub action: String,
    /// Action parameters; strings may hold `{{ host }}` / `{{ groups.NAME }}`
    #[serde(default)]
    pub params: ActionParams,
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Maximum attempts; 0 means a single attempt
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Seconds between attempts
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    #[serde(default)]
    pub requires: Option<GateSpec>,
}

impl StageDefinition {
    /// Stage with default retry policy and no gate
    pub fn new(id: impl Into<String>, targets: TargetSelector, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            targets,
            action: action.into(),
            params: ActionParams::new(),
            cardinality: Cardinality::PerHost,
            retries: default_retries(),
            delay_secs: default_delay_secs(),
            requires: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Run once for the fabric instead of once per switch
    #[must_use]
    pub fn group_action(mut self) -> Self {
        self.cardinality = Cardinality::Group;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32, delay_secs: u64) -> Self {
        self.retries = retries;
        self.delay_secs = delay_secs;
        self
    }

    #[must_use]
    pub fn requires(mut self, gate: GateSpec) -> Self {
        self.requires = Some(gate);
        self
    }

    /// Retry policy for this stage under the given engine settings
    #[must_use]
    pub fn retry_policy(&self, config: &EngineConfig) -> RetryPolicy {
        let policy = RetryPolicy::new(self.retries, Duration::from_secs(self.delay_secs));
        match config.action_timeout() {
            Some(timeout) => policy.with_timeout(timeout),
            None => policy,
        }
    }
}

/// A workflow file: stages plus the actions they call
///
/// ```toml
/// [[stage]]
/// id = "initial-setup"
/// targets = "all"
/// action = "accept-eula"
///
/// [actions.accept-eula]
/// commands = ["switch-setup-modify password {{ password }} eula-accepted true"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Optional name shown in reports
    #[serde(default)]
    pub name: Option<String>,
    /// Stages in execution order
    #[serde(default, rename = "stage")]
    pub stages: Vec<StageDefinition>,
    /// Command actions keyed by id
    #[serde(default)]
    pub actions: BTreeMap<String, ActionSpec>,
}

impl Workflow {
    /// Parse a workflow from TOML text
    ///
    /// # Errors
    /// Returns `CoreError::Parse` if the text is not a valid workflow.
    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        toml::from_str(content).map_err(|e| CoreError::Parse(e.to_string()))
    }

    /// Load a workflow file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let workflow = Self::from_toml_str(&content)?;
        debug!(
            path = %path.display(),
            stages = workflow.stages.len(),
            actions = workflow.actions.len(),
            "loaded workflow"
        );
        Ok(workflow)
    }
}

/// Check stage ids and gates
///
/// Ids must be non-empty and unique, and a gate may only name a stage
/// declared before it.
///
/// # Errors
/// Returns the first offending stage.
pub fn check_dependencies(stages: &[StageDefinition]) -> Result<(), CoreError> {
    let declared: HashSet<&str> = stages.iter().map(|s| s.id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();

    for (index, stage) in stages.iter().enumerate() {
        if stage.id.trim().is_empty() {
            return Err(CoreError::EmptyStageId(index));
        }
        if seen.contains(stage.id.as_str()) {
            return Err(CoreError::DuplicateStage(stage.id.clone()));
        }
        if let Some(gate) = &stage.requires
            && !seen.contains(gate.stage.as_str())
        {
            return Err(if declared.contains(gate.stage.as_str()) {
                CoreError::ForwardDependency {
                    stage: stage.id.clone(),
                    requires: gate.stage.clone(),
                }
            } else {
                CoreError::UnknownDependency {
                    stage: stage.id.clone(),
                    requires: gate.stage.clone(),
                }
            });
        }
        seen.insert(&stage.id);
    }
    Ok(())
}

impl Workflow {
    /// Checks that need no inventory: stage ids and gates, parameter
    /// templates, and that every stage's action has a valid definition
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), CoreError> {
        check_dependencies(&self.stages)?;
        for (id, spec) in &self.actions {
            spec.validate(id)?;
        }
        for stage in &self.stages {
            if !self.actions.contains_key(&stage.action) {
                return Err(CoreError::UnsupportedAction {
                    stage: stage.id.clone(),
                    action: stage.action.clone(),
                });
            }
            referenced_groups(stage)?;
        }
        Ok(())
    }

    /// Every group name the workflow refers to
    ///
    /// # Errors
    /// Returns an error for malformed parameter templates.
    pub fn group_names(&self) -> Result<Vec<String>, CoreError> {
        let mut names = Vec::new();
        for stage in &self.stages {
            for name in std::iter::once(stage.targets.group_name().to_string())
                .chain(referenced_groups(stage)?)
            {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }
}
