//! ztpflow-actions: Provisioning action contract
//!
//! Defines what the engine expects from whatever actually configures a switch
//! ([`ActionExecutor`]), the [`ActionOutcome`] it hands back, and a
//! command-template implementation that drives the switch CLI through a
//! [`ztpflow_exec::RemoteExecutor`].

pub mod command;
pub mod error;
pub mod template;
pub mod traits;
pub mod types;

pub use command::{ActionSpec, CommandActionExecutor, TransportFactory};
pub use error::ActionError;
pub use template::Template;
pub use traits::ActionExecutor;
pub use types::{ActionOutcome, ActionParams, OutcomeStatus, ParamValue};
