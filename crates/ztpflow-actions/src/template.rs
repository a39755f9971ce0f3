//! `{{ name }}` placeholder templates
//!
//! Used for both stage parameters (host-scoped substitution) and the command
//! lines an action sends to the switch CLI.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::ActionError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder pattern is valid")
});

/// A string with `{{ expr }}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
}

impl Template {
    /// Parse a template
    ///
    /// # Errors
    /// Returns `ActionError::UnterminatedPlaceholder` when a `{{` is left
    /// without its closing braces.
    pub fn parse(source: impl Into<String>) -> Result<Self, ActionError> {
        let source = source.into();
        let stripped = PLACEHOLDER.replace_all(&source, "");
        if stripped.contains("{{") {
            return Err(ActionError::UnterminatedPlaceholder(source));
        }
        Ok(Self { source })
    }

    /// Raw template text
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder expressions in order of appearance
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        PLACEHOLDER
            .captures_iter(&self.source)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// The expression, when the whole template is exactly one placeholder
    #[must_use]
    pub fn sole_placeholder(&self) -> Option<&str> {
        let caps = PLACEHOLDER.captures(self.source.trim())?;
        let whole = caps.get(0)?;
        if whole.as_str().len() == self.source.trim().len() {
            caps.get(1).map(|m| m.as_str())
        } else {
            None
        }
    }

    /// Substitute every placeholder
    ///
    /// # Errors
    /// Returns the first expression `lookup` has no value for.
    pub fn render<F>(&self, mut lookup: F) -> Result<String, String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut missing = None;
        let rendered = PLACEHOLDER.replace_all(&self.source, |caps: &Captures<'_>| {
            match lookup(&caps[1]) {
                Some(value) => value,
                None => {
                    missing.get_or_insert_with(|| caps[1].to_string());
                    String::new()
                }
            }
        });
        match missing {
            Some(expr) => Err(expr),
            None => Ok(rendered.into_owned()),
        }
    }

    /// Substitute the placeholders `lookup` knows, leave the rest verbatim
    pub fn render_partial<F>(&self, mut lookup: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        PLACEHOLDER
            .replace_all(&self.source, |caps: &Captures<'_>| {
                lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_in_order() {
        let t = Template::parse("fabric-create name {{ fabric_name }} fabric-network {{network}}")
            .unwrap();
        assert_eq!(t.placeholders(), vec!["fabric_name", "network"]);
    }

    #[test]
    fn test_render_reports_missing() {
        let t = Template::parse("stp-modify {{ flag }} on {{ host }}").unwrap();
        let err = t
            .render(|name| (name == "flag").then(|| "disable".to_string()))
            .unwrap_err();
        assert_eq!(err, "host");
    }

    #[test]
    fn test_render_partial_keeps_unknown() {
        let t = Template::parse("{{ host }} joins {{ fabric_name }}").unwrap();
        let out = t.render_partial(|name| (name == "host").then(|| "leaf1".to_string()));
        assert_eq!(out, "leaf1 joins {{ fabric_name }}");
    }

    #[test]
    fn test_sole_placeholder() {
        assert_eq!(
            Template::parse("{{ groups.spine }}").unwrap().sole_placeholder(),
            Some("groups.spine")
        );
        assert_eq!(
            Template::parse("x {{ groups.spine }}").unwrap().sole_placeholder(),
            None
        );
    }

    #[test]
    fn test_unterminated_rejected() {
        assert!(matches!(
            Template::parse("vrouter-create name {{ host"),
            Err(ActionError::UnterminatedPlaceholder(_))
        ));
    }
}
