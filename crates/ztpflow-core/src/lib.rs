//! ztpflow-core: Staged provisioning engine
//!
//! Runs an ordered list of [`StageDefinition`]s against host groups. Each
//! stage is gated on an earlier stage's outcome, retried with a fixed delay
//! and aggregated across its switches into one verdict. Per-switch work goes
//! through a kameo [`SwitchActor`], one per device.

pub mod abort;
pub mod actor;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod gate;
pub mod message;
pub mod orchestrator;
pub mod params;
pub mod report;
pub mod retry;
pub mod stage;
pub mod state;

pub use abort::{AbortHandle, AbortSignal};
pub use actor::switch::{SwitchActor, SwitchActorArgs};
pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use error::CoreError;
pub use event::ProgressEvent;
pub use gate::{GateDecision, StageGate};
pub use message::{GetSwitchStatus, InvokeAction, SwitchStatus};
pub use orchestrator::{Orchestrator, PlannedStage, aggregate_outcomes};
pub use params::ParamRenderer;
pub use report::{ExecutionReport, StageReport, Verdict};
pub use retry::RetryPolicy;
pub use stage::{Cardinality, GateSpec, StageDefinition, Workflow};
pub use state::{StageState, SwitchState};
