//! Actor implementations

pub mod switch;

pub use switch::{SwitchActor, SwitchActorArgs};
