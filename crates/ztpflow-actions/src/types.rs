//! Outcome and parameter types

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How an action invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Action completed
    Success,
    /// Action failed, downstream stages may still run
    SoftFailure,
    /// Action signalled a structural failure (e.g. the fabric never formed)
    FatalFailure,
    /// Action never ran because its gate was closed
    Skipped,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::SoftFailure => "soft_failure",
            OutcomeStatus::FatalFailure => "fatal_failure",
            OutcomeStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Result of one action invocation, or of a whole stage once aggregated
///
/// Outcomes are values: a retry builds a new one rather than patching the
/// previous attempt's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Terminal status
    pub status: OutcomeStatus,
    /// Diagnostic output lines
    #[serde(default)]
    pub output: Vec<String>,
    /// Number of invocations that produced this outcome
    pub attempts: u32,
    /// Whether the switch configuration was modified
    #[serde(default)]
    pub changed: bool,
    /// Switch the outcome belongs to (`None` for group-level actions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ActionOutcome {
    fn with_status(status: OutcomeStatus, output: Vec<String>) -> Self {
        Self {
            status,
            output,
            attempts: 1,
            changed: false,
            host: None,
        }
    }

    /// Successful outcome
    #[must_use]
    pub fn succeeded(output: Vec<String>) -> Self {
        Self::with_status(OutcomeStatus::Success, output)
    }

    /// Failure that should not block dependent stages
    #[must_use]
    pub fn soft_failure(output: Vec<String>) -> Self {
        Self::with_status(OutcomeStatus::SoftFailure, output)
    }

    /// Failure that blocks dependent stages
    #[must_use]
    pub fn fatal(output: Vec<String>) -> Self {
        Self::with_status(OutcomeStatus::FatalFailure, output)
    }

    /// Placeholder recorded for a stage whose gate denied execution
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            attempts: 0,
            ..Self::with_status(OutcomeStatus::Skipped, vec![reason.into()])
        }
    }

    /// Set attempt count
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Mark as having changed the switch
    #[must_use]
    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    /// Attach the switch name
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Whether the action succeeded
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// Whether the action signalled a fatal failure
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.status == OutcomeStatus::FatalFailure
    }

    /// Legacy string discriminator: `"1"` for fatal, `"0"` otherwise
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        if self.is_fatal() { "1" } else { "0" }
    }
}

/// Action parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    String(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// String contents, if this is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    /// Renders the value the way the switch CLI expects it on a command line
    /// (lists are comma-joined).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::String(s) => f.write_str(s),
            ParamValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::List(values.into_iter().map(ParamValue::String).collect())
    }
}

/// Parameters passed to one action invocation
pub type ActionParams = BTreeMap<String, ParamValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_only_for_fatal() {
        assert_eq!(ActionOutcome::fatal(vec![]).error_code(), "1");
        assert_eq!(ActionOutcome::soft_failure(vec![]).error_code(), "0");
        assert_eq!(ActionOutcome::succeeded(vec![]).error_code(), "0");
        assert_eq!(ActionOutcome::skipped("gate closed").error_code(), "0");
    }

    #[test]
    fn test_skipped_has_no_attempts() {
        let outcome = ActionOutcome::skipped("initial-setup failed");
        assert_eq!(outcome.attempts, 0);
        assert!(!outcome.success());
        assert_eq!(outcome.output, vec!["initial-setup failed"]);
    }

    #[test]
    fn test_list_renders_comma_joined() {
        let spines = ParamValue::from(vec!["spine1".to_string(), "spine2".to_string()]);
        assert_eq!(spines.to_string(), "spine1,spine2");
        assert_eq!(ParamValue::Integer(65000).to_string(), "65000");
    }

    #[test]
    fn test_untagged_params_from_json() {
        let params: ActionParams = serde_json::from_str(
            r#"{"fabric_name":"ztp-fabric","toggle_40g":true,"bgp_as":65000,"leaves":["leaf1","leaf2"]}"#,
        )
        .unwrap();

        assert_eq!(params["fabric_name"], ParamValue::from("ztp-fabric"));
        assert_eq!(params["toggle_40g"], ParamValue::Bool(true));
        assert_eq!(params["bgp_as"], ParamValue::Integer(65000));
        assert_eq!(params["leaves"].to_string(), "leaf1,leaf2");
    }
}
