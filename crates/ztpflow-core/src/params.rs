//! Host-scoped parameter substitution
//!
//! Stage parameters are rendered once per invocation:
//!
//! - `{{ host }}` becomes the switch the invocation targets;
//! - `{{ groups.spine }}` becomes the hosts of `spine`, as a list when it is
//!   the whole value and comma-joined inside a longer string;
//! - `{{ groups.spine[0] }}` (any target expression) becomes that selection.
//!
//! Anything else is left for the action executor, which expands login
//! placeholders such as `{{ password }}` when it renders a command.

use ztpflow_actions::{ActionParams, ParamValue, Template};
use ztpflow_inventory::{ResolvedGroups, Selection, TargetSelector};

use crate::error::CoreError;
use crate::stage::{Cardinality, StageDefinition};

const HOST: &str = "host";
const GROUPS_PREFIX: &str = "groups.";

enum Placeholder {
    Host,
    Hosts(TargetSelector),
    Passthrough,
}

fn classify(stage: &str, expr: &str) -> Result<Placeholder, CoreError> {
    if expr == HOST {
        return Ok(Placeholder::Host);
    }
    match expr.strip_prefix(GROUPS_PREFIX) {
        Some(selector) => TargetSelector::parse(selector)
            .map(Placeholder::Hosts)
            .map_err(|source| CoreError::Targets {
                stage: stage.to_string(),
                source,
            }),
        None => Ok(Placeholder::Passthrough),
    }
}

fn parse(stage: &str, source: &str) -> Result<Template, CoreError> {
    Template::parse(source).map_err(|source| CoreError::Param {
        stage: stage.to_string(),
        source,
    })
}

fn strings(value: &ParamValue, out: &mut Vec<String>) {
    match value {
        ParamValue::String(s) => out.push(s.clone()),
        ParamValue::List(items) => items.iter().for_each(|v| strings(v, out)),
        ParamValue::Bool(_) | ParamValue::Integer(_) => {}
    }
}

/// Group names a stage's parameters refer to
///
/// # Errors
/// Returns an error for malformed templates or group expressions, and for a
/// `group` stage whose parameters use `{{ host }}`.
pub fn referenced_groups(stage: &StageDefinition) -> Result<Vec<String>, CoreError> {
    let mut groups = Vec::new();
    for (name, value) in &stage.params {
        let mut sources = Vec::new();
        strings(value, &mut sources);
        for source in sources {
            let template = parse(&stage.id, &source)?;
            for expr in template.placeholders() {
                match classify(&stage.id, expr)? {
                    Placeholder::Host if stage.cardinality == Cardinality::Group => {
                        return Err(CoreError::HostPlaceholderInGroupStage {
                            stage: stage.id.clone(),
                            param: name.clone(),
                        });
                    }
                    Placeholder::Hosts(selector) => groups.push(selector.group_name().to_string()),
                    Placeholder::Host | Placeholder::Passthrough => {}
                }
            }
        }
    }
    Ok(groups)
}

/// Renders stage parameters against a membership snapshot
pub struct ParamRenderer<'a> {
    groups: &'a ResolvedGroups,
}

impl<'a> ParamRenderer<'a> {
    #[must_use]
    pub fn new(groups: &'a ResolvedGroups) -> Self {
        Self { groups }
    }

    /// Parameters for one invocation of `stage` on `host`
    ///
    /// # Errors
    /// Returns an error if a group expression cannot be evaluated.
    pub fn render(
        &self,
        stage: &StageDefinition,
        host: Option<&str>,
    ) -> Result<ActionParams, CoreError> {
        stage
            .params
            .iter()
            .map(|(name, value)| {
                Ok::<_, CoreError>((name.clone(), self.render_value(&stage.id, value, host)?))
            })
            .collect()
    }

    fn select(&self, stage: &str, selector: &TargetSelector) -> Result<Vec<String>, CoreError> {
        selector.select(self.groups).map_err(|source| CoreError::Targets {
            stage: stage.to_string(),
            source,
        })
    }

    fn render_value(
        &self,
        stage: &str,
        value: &ParamValue,
        host: Option<&str>,
    ) -> Result<ParamValue, CoreError> {
        match value {
            ParamValue::String(source) => self.render_string(stage, source, host),
            ParamValue::List(items) => items
                .iter()
                .map(|item| self.render_value(stage, item, host))
                .collect::<Result<Vec<_>, _>>()
                .map(ParamValue::List),
            other => Ok(other.clone()),
        }
    }

    fn render_string(
        &self,
        stage: &str,
        source: &str,
        host: Option<&str>,
    ) -> Result<ParamValue, CoreError> {
        let template = parse(stage, source)?;

        if let Some(expr) = template.sole_placeholder()
            && let Placeholder::Hosts(selector) = classify(stage, expr)?
            && !matches!(selector.selection(), Selection::Index(_))
        {
            return Ok(ParamValue::from(self.select(stage, &selector)?));
        }

        let mut failure = None;
        let rendered = template.render_partial(|expr| match classify(stage, expr) {
            Ok(Placeholder::Host) => host.map(ToString::to_string),
            Ok(Placeholder::Hosts(selector)) => match self.select(stage, &selector) {
                Ok(hosts) => Some(hosts.join(",")),
                Err(e) => {
                    failure.get_or_insert(e);
                    None
                }
            },
            Ok(Placeholder::Passthrough) => None,
            Err(e) => {
                failure.get_or_insert(e);
                None
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(ParamValue::String(rendered)),
        }
    }
}
