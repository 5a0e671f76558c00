//! Configuration for templates and the propagation engine.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Exclusions enabled on a template when it does not list its own.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["ez-templates", "disabled", "description"];

fn default_exclusions() -> Vec<String> {
    DEFAULT_EXCLUSIONS.iter().map(|id| (*id).to_string()).collect()
}

/// Per-template settings, stored on the template job itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Ids of the exclusions applied when this template is propagated.
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            exclusions: default_exclusions(),
        }
    }
}

impl TemplateSettings {
    /// Creates settings with an explicit exclusion list.
    #[must_use]
    pub fn with_exclusions<I, S>(exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclusions: exclusions.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads settings from the raw value of a template's exclusions field.
    ///
    /// Returns `None` when the template does not configure its exclusions:
    /// the value is absent, null, or malformed (which is logged).
    #[must_use]
    pub fn from_field_value(job: &str, value: Option<serde_json::Value>) -> Option<Self> {
        match value {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => match serde_json::from_value::<Vec<String>>(value) {
                Ok(exclusions) => Some(Self { exclusions }),
                Err(e) => {
                    warn!(job = %job, error = %e, "Malformed exclusion list, ignoring it");
                    None
                }
            },
        }
    }
}

/// Settings for the propagation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stop at the first implementation that fails instead of continuing
    /// with the rest.
    pub fail_fast: bool,
    /// Exclusions used for templates whose settings cannot be read.
    pub default_exclusions: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            default_exclusions: default_exclusions(),
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets fail-fast behaviour.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Sets the fallback exclusion list.
    #[must_use]
    pub fn with_default_exclusions<I, S>(mut self, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_exclusions = exclusions.into_iter().map(Into::into).collect();
        self
    }

    /// Parses a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> crate::errors::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
