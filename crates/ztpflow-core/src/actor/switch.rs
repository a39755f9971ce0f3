//! `SwitchActor`: Per-switch execution
//!
//! Owns all work against one switch so invocations on the same device never
//! overlap, and reports each attempt as a progress event.

use std::sync::Arc;

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use ztpflow_actions::{ActionExecutor, ActionOutcome, OutcomeStatus};

use crate::error::CoreError;
use crate::event::ProgressEvent;
use crate::message::{GetSwitchStatus, InvokeAction, SwitchStatus};
use crate::state::SwitchState;

/// Arguments for spawning a `SwitchActor`
pub struct SwitchActorArgs {
    /// Switch name
    pub name: String,
    /// Action executor shared by the run
    pub executor: Arc<dyn ActionExecutor>,
    /// Progress event sender
    pub event_tx: broadcast::Sender<ProgressEvent>,
}

/// Per-switch actor
pub struct SwitchActor {
    name: String,
    state: SwitchState,
    executor: Arc<dyn ActionExecutor>,
    event_tx: broadcast::Sender<ProgressEvent>,
    invocations: u32,
    last_stage: Option<String>,
    last_status: Option<OutcomeStatus>,
}

impl SwitchActor {
    /// Get the switch name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Actor for SwitchActor {
    type Args = SwitchActorArgs;
    type Error = CoreError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        debug!(switch = %args.name, id = %actor_ref.id(), "SwitchActor starting");

        Ok(Self {
            name: args.name,
            state: SwitchState::Idle,
            executor: args.executor,
            event_tx: args.event_tx,
            invocations: 0,
            last_stage: None,
            last_status: None,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        debug!(
            switch = %self.name,
            invocations = self.invocations,
            reason = ?reason,
            "SwitchActor stopping"
        );
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<InvokeAction> for SwitchActor {
    type Reply = Result<ActionOutcome, CoreError>;

    async fn handle(
        &mut self,
        msg: InvokeAction,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.state = SwitchState::Busy;
        info!(switch = %self.name, stage = %msg.stage, action = %msg.action, "invoking action");

        let event_tx = &self.event_tx;
        let stage = &msg.stage;
        let outcome = msg
            .policy
            .execute_observed(
                self.executor.as_ref(),
                &msg.action,
                Some(self.name.as_str()),
                &msg.params,
                |attempt, outcome| {
                    let _ = event_tx.send(ProgressEvent::AttemptFinished {
                        stage: stage.clone(),
                        host: outcome.host.clone(),
                        attempt,
                        status: outcome.status,
                    });
                },
            )
            .await;

        if outcome.is_fatal() {
            error!(
                switch = %self.name,
                stage = %msg.stage,
                attempts = outcome.attempts,
                "action failed fatally"
            );
        }

        self.invocations += 1;
        self.last_stage = Some(msg.stage);
        self.last_status = Some(outcome.status);
        self.state = SwitchState::Idle;
        Ok(outcome)
    }
}

impl Message<GetSwitchStatus> for SwitchActor {
    type Reply = SwitchStatus;

    async fn handle(
        &mut self,
        _msg: GetSwitchStatus,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        SwitchStatus {
            name: self.name.clone(),
            state: self.state,
            invocations: self.invocations,
            last_stage: self.last_stage.clone(),
            last_status: self.last_status,
        }
    }
}
