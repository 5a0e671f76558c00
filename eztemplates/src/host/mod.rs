//! The host job model, as seen by templating.
//!
//! The CI server owns jobs and their persistence. This crate only needs a
//! handful of capabilities from it, expressed by the [`Saveable`] and [`Job`]
//! traits.

use crate::change::{self, ChangeContext, SaveableId, ScopeTarget};
use crate::config::TemplateSettings;
use crate::errors::{FieldAccessError, HostError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field marking a job as a template.
pub const TEMPLATE_FIELD: &str = "ez-templates.template";

/// Field naming the template a job implements.
pub const IMPLEMENTS_FIELD: &str = "ez-templates.implements";

/// Field listing the exclusion ids a template applies.
pub const EXCLUSIONS_FIELD: &str = "ez-templates.exclusions";

/// A job's full configuration, keyed by field name.
pub type JobConfiguration = serde_json::Map<String, Value>;

/// What a save request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    /// The object was written to storage.
    Saved,
    /// An open persistence scope vetoed the write.
    Suppressed,
}

/// Something the host can persist.
pub trait Saveable {
    /// Identity used to key change scopes.
    fn saveable_id(&self) -> SaveableId;

    /// Persists the object.
    ///
    /// Implementations must return [`SaveOutcome::Suppressed`] without
    /// writing, and without notifying save listeners, when [`save_vetoed`]
    /// is true for their id.
    fn save(&mut self) -> Result<SaveOutcome, HostError>;
}

/// Returns true if an open [`ChangeContext::PERSISTENCE`] scope covers `id`.
///
/// Hosts call this at the top of [`Saveable::save`].
pub fn save_vetoed(id: &SaveableId) -> bool {
    change::contains(&ScopeTarget::from(id), ChangeContext::PERSISTENCE)
}

/// A host job.
pub trait Job: Saveable + Send {
    /// The job's unique full name.
    fn full_name(&self) -> &str;

    /// Whether the job is disabled.
    fn is_disabled(&self) -> bool;

    /// Reads a field.
    fn field(&self, name: &str) -> Result<Value, FieldAccessError>;

    /// Writes a field directly, bypassing the job's setters.
    ///
    /// Must never trigger a save or any other side effect.
    fn force_field(&mut self, name: &str, value: Value) -> Result<(), FieldAccessError>;

    /// Returns the job's full configuration.
    fn configuration(&self) -> JobConfiguration;

    /// Overwrites the job's configuration with `configuration`.
    ///
    /// Like [`force_field`](Self::force_field) this must not save.
    fn apply_configuration(&mut self, configuration: &JobConfiguration) -> Result<(), HostError>;

    /// Whether this job is a template.
    fn is_template(&self) -> bool {
        matches!(self.field(TEMPLATE_FIELD), Ok(Value::Bool(true)))
    }

    /// Full name of the template this job implements, if any.
    fn implemented_template(&self) -> Option<String> {
        self.field(IMPLEMENTS_FIELD)
            .ok()
            .and_then(|value| value.as_str().map(String::from))
    }

    /// The templating settings stored on this job, if it configures any.
    fn template_settings(&self) -> Option<TemplateSettings> {
        TemplateSettings::from_field_value(self.full_name(), self.field(EXCLUSIONS_FIELD).ok())
    }
}
