//! Error types for ztpflow-actions

use thiserror::Error;

/// Errors building or rendering an action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// No `[actions.<id>]` table for the requested action
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A command template references a parameter nobody supplied
    #[error("action {action}: missing parameter `{param}`")]
    MissingParam {
        /// Action being rendered
        action: String,
        /// Placeholder without a value
        param: String,
    },

    /// A substituted value cannot be quoted for the shell (it contains a NUL byte)
    #[error("action {action}: parameter `{param}` cannot be quoted for the shell")]
    UnquotableParam {
        /// Action being rendered
        action: String,
        /// Placeholder whose value was rejected
        param: String,
    },

    /// `{{` without a matching `}}`
    #[error("unterminated placeholder in template: {0}")]
    UnterminatedPlaceholder(String),

    /// Action declares no commands
    #[error("action {0} has no commands")]
    EmptyAction(String),
}
