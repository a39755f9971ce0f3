//! Command-template action executor
//!
//! Each action is an ordered list of switch CLI command templates. Commands
//! run one after another on the target switch; output is interpreted the way
//! the switch CLI reports errors (a command that prints nothing on stdout but
//! something on stderr has failed).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use ztpflow_exec::{Credentials, ExecError, RemoteExecutor};

use crate::error::ActionError;
use crate::template::Template;
use crate::traits::ActionExecutor;
use crate::types::{ActionOutcome, ActionParams};

/// Declarative definition of one action (`[actions.<id>]` in a workflow)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Command templates, run in order
    pub commands: Vec<String>,
    /// Progress line appended to the output when every command succeeds
    #[serde(default)]
    pub message: Option<String>,
}

impl ActionSpec {
    /// Check that the action has commands and every template parses
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self, id: &str) -> Result<(), ActionError> {
        if self.commands.is_empty() {
            return Err(ActionError::EmptyAction(id.to_string()));
        }
        for cmd in self.commands.iter().chain(self.message.iter()) {
            Template::parse(cmd.as_str())?;
        }
        Ok(())
    }
}

/// Hands out a command transport per switch
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Transport for `host`, or for the controller when `host` is `None`
    async fn transport(&self, host: Option<&str>) -> Result<Arc<dyn RemoteExecutor>, ExecError>;
}

/// Runs [`ActionSpec`] command lists through a [`TransportFactory`]
pub struct CommandActionExecutor {
    actions: BTreeMap<String, ActionSpec>,
    transports: Arc<dyn TransportFactory>,
    credentials: Arc<Credentials>,
    command_timeout: Duration,
}

impl CommandActionExecutor {
    /// Create an executor for the given action table
    pub fn new(
        actions: BTreeMap<String, ActionSpec>,
        transports: Arc<dyn TransportFactory>,
        credentials: Arc<Credentials>,
    ) -> Self {
        Self {
            actions,
            transports,
            credentials,
            command_timeout: Duration::from_secs(120),
        }
    }

    /// Limit how long a single CLI command may run
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Validate every action in the table
    ///
    /// # Errors
    /// Returns the first invalid action.
    pub fn validate(&self) -> Result<(), ActionError> {
        for (id, spec) in &self.actions {
            spec.validate(id)?;
        }
        Ok(())
    }

    /// Login and host values; secrets only when `secrets` is set
    fn builtin(&self, name: &str, host: Option<&str>, secrets: bool) -> Option<String> {
        match name {
            "host" => host.map(ToString::to_string),
            "username" if secrets => self.credentials.username.clone(),
            "password" if secrets => self.credentials.password_value().map(ToString::to_string),
            _ => None,
        }
    }

    /// Value of a placeholder. Stage params may themselves carry login or
    /// host placeholders; those are expanded here, one level deep.
    fn lookup(
        &self,
        name: &str,
        host: Option<&str>,
        params: &ActionParams,
        secrets: bool,
    ) -> Option<String> {
        if let Some(value) = self.builtin(name, host, secrets) {
            return Some(value);
        }
        let raw = params.get(name)?.to_string();
        match Template::parse(raw.as_str()) {
            Ok(t) => Some(t.render_partial(|inner| self.builtin(inner, host, secrets))),
            Err(_) => Some(raw),
        }
    }

    /// Render a command line; every substituted value is shell-quoted
    fn render(
        &self,
        action: &str,
        template: &str,
        host: Option<&str>,
        params: &ActionParams,
    ) -> Result<String, ActionError> {
        let mut unquotable = None;
        let rendered = Template::parse(template)?
            .render(|name| {
                let value = self.lookup(name, host, params, true)?;
                match shlex::try_quote(&value) {
                    Ok(quoted) => Some(quoted.into_owned()),
                    Err(_) => {
                        unquotable.get_or_insert_with(|| name.to_string());
                        Some(String::new())
                    }
                }
            })
            .map_err(|param| ActionError::MissingParam {
                action: action.to_string(),
                param,
            })?;

        match unquotable {
            Some(param) => Err(ActionError::UnquotableParam {
                action: action.to_string(),
                param,
            }),
            None => Ok(rendered),
        }
    }
}

fn transport_failure(err: &ExecError, mut lines: Vec<String>) -> ActionOutcome {
    lines.push(err.to_string());
    if err.is_retryable() {
        ActionOutcome::soft_failure(lines)
    } else {
        ActionOutcome::fatal(lines)
    }
}

#[async_trait]
impl ActionExecutor for CommandActionExecutor {
    #[instrument(skip(self, params), fields(host = host.unwrap_or("-")))]
    async fn invoke(
        &self,
        action: &str,
        host: Option<&str>,
        params: &ActionParams,
    ) -> ActionOutcome {
        let outcome = self.run_action(action, host, params).await;
        match host {
            Some(h) => outcome.with_host(h),
            None => outcome,
        }
    }

    fn supports(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }
}

impl CommandActionExecutor {
    async fn run_action(
        &self,
        action: &str,
        host: Option<&str>,
        params: &ActionParams,
    ) -> ActionOutcome {
        let Some(spec) = self.actions.get(action) else {
            error!(action, "unknown action");
            let err = ActionError::UnknownAction(action.to_string());
            return ActionOutcome::fatal(vec![err.to_string()]);
        };

        let transport = match self.transports.transport(host).await {
            Ok(t) => t,
            Err(e) => {
                warn!(action, error = %e, "no transport for switch");
                return transport_failure(
                    &e,
                    vec![format!("cannot reach {}", host.unwrap_or("controller"))],
                );
            }
        };

        let mut lines = Vec::new();

        for template in &spec.commands {
            let cmd = match self.render(action, template, host, params) {
                Ok(c) => c,
                Err(e) => {
                    error!(action, error = %e, "cannot render command");
                    return ActionOutcome::fatal(vec![e.to_string()]);
                }
            };

            // Rendered commands may carry the password; only the template is logged.
            debug!(
                action,
                template = %template,
                transport = transport.executor_type(),
                "running command"
            );

            let result = match transport.run_with_timeout(&cmd, self.command_timeout).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(action, template = %template, error = %e, "command did not complete");
                    lines.push(format!("Operation Failed: {template}"));
                    return transport_failure(&e, lines);
                }
            };

            let stdout = result.stdout_lines();
            if !stdout.is_empty() {
                lines.extend(stdout);
                continue;
            }

            let stderr = result.stderr_lines();
            if !stderr.is_empty() {
                error!(
                    action,
                    template = %template,
                    status = result.status,
                    "switch CLI reported an error"
                );
                lines.push(format!("Operation Failed: {template}"));
                lines.extend(stderr);
                return ActionOutcome::fatal(lines);
            }

            lines.push("Success".to_string());
        }

        if let Some(message) = &spec.message
            && let Ok(t) = Template::parse(message.as_str())
        {
            lines.push(t.render_partial(|name| self.lookup(name, host, params, false)));
        }

        info!(action, commands = spec.commands.len(), "action completed");

        ActionOutcome::succeeded(lines).with_changed(true)
    }
}
