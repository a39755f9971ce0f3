//! `Orchestrator`: Workflow execution
//!
//! Validates a workflow, resolves its host groups once, then runs the stages
//! strictly in order. Per-switch invocations of a stage fan out to
//! [`SwitchActor`]s in batches and are joined before the stage is recorded.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use kameo::actor::{ActorRef, Spawn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use ztpflow_actions::{ActionExecutor, ActionOutcome, ActionParams, OutcomeStatus};
use ztpflow_inventory::{HostGroupResolver, ResolvedGroups};

use crate::abort::AbortSignal;
use crate::actor::switch::{SwitchActor, SwitchActorArgs};
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::CoreError;
use crate::event::ProgressEvent;
use crate::gate::{GateDecision, StageGate};
use crate::message::InvokeAction;
use crate::params::{ParamRenderer, referenced_groups};
use crate::report::{ExecutionReport, StageReport};
use crate::retry::RetryPolicy;
use crate::stage::{Cardinality, StageDefinition, check_dependencies};
use crate::state::StageState;

/// What `plan` reports for each stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStage {
    pub id: String,
    pub description: String,
    pub action: String,
    pub cardinality: Cardinality,
    /// Resolved target switches
    pub hosts: Vec<String>,
    /// Stage this one is gated on
    pub requires: Option<String>,
    pub max_attempts: u32,
}

enum Invocations {
    PerHost(Vec<(String, ActionParams)>),
    Group(ActionParams),
}

/// A validated stage with its targets and rendered parameters
struct Prepared<'a> {
    def: &'a StageDefinition,
    hosts: Vec<String>,
    invocations: Invocations,
}

/// Runs workflows against a switch fabric
pub struct Orchestrator {
    executor: Arc<dyn ActionExecutor>,
    resolver: Arc<dyn HostGroupResolver>,
    config: EngineConfig,
    abort: Option<AbortSignal>,
    event_tx: broadcast::Sender<ProgressEvent>,
}

impl Orchestrator {
    /// Create an orchestrator
    pub fn new(
        executor: Arc<dyn ActionExecutor>,
        resolver: Arc<dyn HostGroupResolver>,
        config: EngineConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            executor,
            resolver,
            config,
            abort: None,
            event_tx,
        }
    }

    /// Observe `signal` between stages
    #[must_use]
    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }

    /// Subscribe to progress events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.event_tx.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate the workflow and resolve every stage's targets without
    /// invoking anything
    ///
    /// # Errors
    /// Returns the first structural error in the workflow.
    pub fn plan(&self, stages: &[StageDefinition]) -> Result<Vec<PlannedStage>, CoreError> {
        Ok(self
            .prepare(stages)?
            .into_iter()
            .map(|stage| PlannedStage {
                id: stage.def.id.clone(),
                description: stage.def.description.clone(),
                action: stage.def.action.clone(),
                cardinality: stage.def.cardinality,
                hosts: stage.hosts,
                requires: stage.def.requires.as_ref().map(|g| g.stage.clone()),
                max_attempts: stage.def.retry_policy(&self.config).attempts(),
            })
            .collect())
    }

    /// Run the workflow
    ///
    /// Stage failures never surface as `Err`; they are recorded in the
    /// report. An abort request is honoured before the next stage starts.
    ///
    /// # Errors
    /// Returns a structural error before any stage runs.
    pub async fn run(&self, stages: &[StageDefinition]) -> Result<ExecutionReport, CoreError> {
        let prepared = self.prepare(stages)?;
        let started_at = Utc::now();

        info!(stages = prepared.len(), "starting run");
        self.emit(ProgressEvent::RunStarted {
            stages: prepared.len(),
        });

        let mut context = ExecutionContext::new();
        let mut entries = Vec::with_capacity(prepared.len());
        let mut switches: HashMap<String, ActorRef<SwitchActor>> = HashMap::new();
        let mut aborted = false;

        for (index, stage) in prepared.iter().enumerate() {
            let id = &stage.def.id;
            if self.abort_requested() {
                warn!(next_stage = %id, "abort requested, stopping run");
                self.emit(ProgressEvent::RunAborted {
                    next_stage: Some(id.clone()),
                });
                aborted = true;
                break;
            }

            let mut state = StageState::Pending;

            if let GateDecision::Denied(reason) = StageGate::evaluate(stage.def, &context) {
                advance(&mut state, StageState::Skipped)?;
                warn!(stage = %id, reason = %reason, "stage skipped");
                self.emit(ProgressEvent::StageSkipped {
                    stage: id.clone(),
                    reason: reason.clone(),
                });
                let outcome = ActionOutcome::skipped(reason);
                entries.push(StageReport::new(stage.def, state, &outcome, stage.hosts.clone()));
                context.record(id, outcome)?;
                continue;
            }

            advance(&mut state, StageState::Running)?;
            info!(
                stage = %id,
                description = %stage.def.description,
                action = %stage.def.action,
                hosts = ?stage.hosts,
                "stage started"
            );
            self.emit(ProgressEvent::StageStarted {
                stage: id.clone(),
                hosts: stage.hosts.clone(),
            });

            let policy = stage.def.retry_policy(&self.config);
            let outcome = match &stage.invocations {
                Invocations::PerHost(hosts) => {
                    self.run_per_host(stage.def, hosts, policy, &mut switches).await
                }
                Invocations::Group(params) => self.run_group(stage.def, params, policy).await,
            };

            advance(&mut state, StageState::Completed)?;
            log_outcome(id, &outcome);
            self.emit(ProgressEvent::StageCompleted {
                stage: id.clone(),
                status: outcome.status,
                attempts: outcome.attempts,
                output: outcome.output.clone(),
            });
            entries.push(StageReport::new(stage.def, state, &outcome, stage.hosts.clone()));

            let fatal = outcome.is_fatal();
            context.record(id, outcome)?;

            if fatal && self.config.abort_on_fatal {
                if let Some(next) = prepared.get(index + 1) {
                    warn!(stage = %id, next_stage = %next.def.id, "fatal failure, stopping run");
                    self.emit(ProgressEvent::RunAborted {
                        next_stage: Some(next.def.id.clone()),
                    });
                    aborted = true;
                }
                break;
            }
        }

        for (name, actor) in switches {
            if let Err(e) = actor.stop_gracefully().await {
                warn!(switch = %name, error = %e, "failed to stop switch actor");
            }
            // the actor holds the executor, and with it the credentials
            actor.wait_for_shutdown().await;
        }

        let report = ExecutionReport {
            stages: entries,
            started_at,
            finished_at: Utc::now(),
            aborted,
        };
        let verdict = report.verdict();
        info!(
            verdict = %verdict,
            stages = report.stages.len(),
            aborted,
            elapsed_ms = report.elapsed().num_milliseconds(),
            "run finished"
        );
        self.emit(ProgressEvent::RunFinished { verdict });
        Ok(report)
    }

    fn prepare<'a>(&self, stages: &'a [StageDefinition]) -> Result<Vec<Prepared<'a>>, CoreError> {
        check_dependencies(stages)?;

        let mut group_names: Vec<String> = Vec::new();
        for stage in stages {
            if !self.executor.supports(&stage.action) {
                return Err(CoreError::UnsupportedAction {
                    stage: stage.id.clone(),
                    action: stage.action.clone(),
                });
            }
            group_names.push(stage.targets.group_name().to_string());
            group_names.extend(referenced_groups(stage)?);
        }

        let groups = ResolvedGroups::resolve(
            self.resolver.as_ref(),
            group_names.iter().map(String::as_str),
        )?;
        let renderer = ParamRenderer::new(&groups);

        let prepared = stages
            .iter()
            .map(|stage| prepare_stage(stage, &groups, &renderer))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            stages = prepared.len(),
            groups = groups.iter().count(),
            switches = groups.all_hosts().len(),
            "workflow validated"
        );
        Ok(prepared)
    }

    async fn run_per_host(
        &self,
        stage: &StageDefinition,
        invocations: &[(String, ActionParams)],
        policy: RetryPolicy,
        switches: &mut HashMap<String, ActorRef<SwitchActor>>,
    ) -> ActionOutcome {
        let batch_size = self.config.concurrency_for(invocations.len());
        let mut outcomes = Vec::with_capacity(invocations.len());

        for batch in invocations.chunks(batch_size) {
            let mut handles = Vec::with_capacity(batch.len());

            for (host, params) in batch {
                let actor = switches
                    .entry(host.clone())
                    .or_insert_with(|| {
                        SwitchActor::spawn(SwitchActorArgs {
                            name: host.clone(),
                            executor: Arc::clone(&self.executor),
                            event_tx: self.event_tx.clone(),
                        })
                    })
                    .clone();
                let msg = InvokeAction {
                    stage: stage.id.clone(),
                    action: stage.action.clone(),
                    params: params.clone(),
                    policy,
                };

                let handle = tokio::spawn(async move { actor.ask(msg).await });
                handles.push((host.clone(), handle));
            }

            // Barrier: the stage is only recorded once every switch answered
            let results = join_all(
                handles
                    .into_iter()
                    .map(|(host, handle)| async move { (host, handle.await) }),
            )
            .await;

            for (host, result) in results {
                let outcome = match result {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        error!(
                            stage = %stage.id,
                            switch = %host,
                            error = %e,
                            "switch actor failed"
                        );
                        ActionOutcome::fatal(vec![format!("switch actor error: {e}")])
                            .with_host(&host)
                    }
                    Err(e) => {
                        error!(
                            stage = %stage.id,
                            switch = %host,
                            error = %e,
                            "invocation task panicked"
                        );
                        ActionOutcome::fatal(vec![format!("invocation task failed: {e}")])
                            .with_host(&host)
                    }
                };
                outcomes.push(outcome);
            }
        }

        aggregate_outcomes(outcomes)
    }

    async fn run_group(
        &self,
        stage: &StageDefinition,
        params: &ActionParams,
        policy: RetryPolicy,
    ) -> ActionOutcome {
        let event_tx = &self.event_tx;
        policy
            .execute_observed(
                self.executor.as_ref(),
                &stage.action,
                None,
                params,
                |attempt, outcome| {
                    let _ = event_tx.send(ProgressEvent::AttemptFinished {
                        stage: stage.id.clone(),
                        host: None,
                        attempt,
                        status: outcome.status,
                    });
                },
            )
            .await
    }

    fn abort_requested(&self) -> bool {
        self.abort.as_ref().is_some_and(AbortSignal::is_aborted)
    }

    fn emit(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

fn prepare_stage<'a>(
    stage: &'a StageDefinition,
    groups: &ResolvedGroups,
    renderer: &ParamRenderer<'_>,
) -> Result<Prepared<'a>, CoreError> {
    let hosts = stage
        .targets
        .select(groups)
        .map_err(|source| CoreError::Targets {
            stage: stage.id.clone(),
            source,
        })?;
    if hosts.is_empty() {
        return Err(CoreError::EmptyTargets {
            stage: stage.id.clone(),
            targets: stage.targets.to_string(),
        });
    }

    let invocations = match stage.cardinality {
        Cardinality::PerHost => Invocations::PerHost(
            hosts
                .iter()
                .map(|host| Ok((host.clone(), renderer.render(stage, Some(host))?)))
                .collect::<Result<Vec<_>, CoreError>>()?,
        ),
        Cardinality::Group => Invocations::Group(renderer.render(stage, None)?),
    };

    Ok(Prepared {
        def: stage,
        hosts,
        invocations,
    })
}

fn advance(state: &mut StageState, to: StageState) -> Result<(), CoreError> {
    if !state.can_transition_to(to) {
        return Err(CoreError::InvalidTransition { from: *state, to });
    }
    *state = to;
    Ok(())
}

fn log_outcome(stage: &str, outcome: &ActionOutcome) {
    match outcome.status {
        OutcomeStatus::Success => {
            info!(stage, attempts = outcome.attempts, changed = outcome.changed, "stage succeeded");
        }
        OutcomeStatus::SoftFailure => {
            warn!(stage, attempts = outcome.attempts, "stage failed");
        }
        OutcomeStatus::FatalFailure => {
            error!(
                stage,
                attempts = outcome.attempts,
                error = outcome.error_code(),
                "stage failed fatally"
            );
        }
        OutcomeStatus::Skipped => {}
    }
    for line in &outcome.output {
        info!(stage, "{line}");
    }
}

/// Fold per-switch outcomes into one stage outcome
///
/// Success only if every switch succeeded, fatal if any switch was fatal,
/// soft failure otherwise. Output lines are prefixed with their switch.
#[must_use]
pub fn aggregate_outcomes(outcomes: Vec<ActionOutcome>) -> ActionOutcome {
    let status = if outcomes.iter().all(ActionOutcome::success) {
        OutcomeStatus::Success
    } else if outcomes.iter().any(ActionOutcome::is_fatal) {
        OutcomeStatus::FatalFailure
    } else {
        OutcomeStatus::SoftFailure
    };

    let attempts = outcomes.iter().map(|o| o.attempts).max().unwrap_or(0);
    let changed = outcomes.iter().any(|o| o.changed);
    let output = outcomes
        .iter()
        .flat_map(|o| {
            let host = o.host.as_deref().unwrap_or("fabric");
            o.output.iter().map(move |line| format!("{host}: {line}"))
        })
        .collect();

    ActionOutcome {
        status,
        output,
        attempts,
        changed,
        host: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_all_success() {
        let outcome = aggregate_outcomes(vec![
            ActionOutcome::succeeded(vec!["EULA accepted".into()]).with_host("leaf1"),
            ActionOutcome::succeeded(vec![])
                .with_host("leaf2")
                .with_attempts(3)
                .with_changed(true),
        ]);
        assert!(outcome.success());
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.changed);
        assert_eq!(outcome.output, vec!["leaf1: EULA accepted"]);
    }

    #[test]
    fn test_aggregate_fatal_dominates() {
        let outcome = aggregate_outcomes(vec![
            ActionOutcome::soft_failure(vec![]).with_host("leaf1"),
            ActionOutcome::fatal(vec!["fabric-join failed".into()]).with_host("leaf2"),
            ActionOutcome::succeeded(vec![]).with_host("leaf3"),
        ]);
        assert!(outcome.is_fatal());
        assert_eq!(outcome.error_code(), "1");
        assert_eq!(outcome.output, vec!["leaf2: fabric-join failed"]);
    }

    #[test]
    fn test_aggregate_soft_when_no_fatal() {
        let outcome = aggregate_outcomes(vec![
            ActionOutcome::soft_failure(vec![]).with_host("leaf1"),
            ActionOutcome::succeeded(vec![]).with_host("leaf2"),
        ]);
        assert_eq!(outcome.status, OutcomeStatus::SoftFailure);
    }
}
