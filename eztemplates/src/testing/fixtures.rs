//! In-memory job fixture.

use std::collections::BTreeSet;

use serde_json::{json, Value};
use tracing::debug;

use crate::change::SaveableId;
use crate::config::TemplateSettings;
use crate::errors::{FieldAccessError, HostError};
use crate::host::{
    self, Job, JobConfiguration, SaveOutcome, Saveable, EXCLUSIONS_FIELD, IMPLEMENTS_FIELD,
    TEMPLATE_FIELD,
};

/// A job held entirely in memory.
///
/// Saves honour persistence scopes the way a real host's do, and the fixture
/// counts both real and vetoed saves. Fields can be removed to simulate a
/// host model that predates them.
#[derive(Debug, Clone)]
pub struct InMemoryJob {
    name: String,
    fields: JobConfiguration,
    unsupported: BTreeSet<String>,
    persisted: Option<JobConfiguration>,
    save_count: usize,
    suppressed_saves: usize,
    save_failure: Option<String>,
}

impl InMemoryJob {
    /// Creates a plain job with the standard fields at their defaults.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let fields = json!({
            "disabled": false,
            "description": "",
            "parameters": [],
            "triggers": [],
            "scm": null,
            "assignedNode": null,
            TEMPLATE_FIELD: false,
            IMPLEMENTS_FIELD: null,
            EXCLUSIONS_FIELD: null,
        });

        Self {
            name: name.into(),
            fields: match fields {
                Value::Object(map) => map,
                _ => JobConfiguration::new(),
            },
            unsupported: BTreeSet::new(),
            persisted: None,
            save_count: 0,
            suppressed_saves: 0,
            save_failure: None,
        }
    }

    /// Creates a template job.
    #[must_use]
    pub fn template(name: impl Into<String>) -> Self {
        Self::new(name).with_field(TEMPLATE_FIELD, Value::Bool(true))
    }

    /// Creates a job implementing `template`.
    #[must_use]
    pub fn implementation(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self::new(name).with_field(IMPLEMENTS_FIELD, Value::String(template.into()))
    }

    /// Sets a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        self.unsupported.remove(&name);
        self.fields.insert(name, value);
        self
    }

    /// Sets the disabled flag.
    #[must_use]
    pub fn with_disabled(self, disabled: bool) -> Self {
        self.with_field("disabled", Value::Bool(disabled))
    }

    /// Stores template settings on the job.
    #[must_use]
    pub fn with_template_settings(self, settings: &TemplateSettings) -> Self {
        self.with_field(EXCLUSIONS_FIELD, json!(settings.exclusions))
    }

    /// Removes a field from the job model entirely.
    #[must_use]
    pub fn without_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.remove(&name);
        self.unsupported.insert(name);
        self
    }

    /// Makes every unvetoed save fail with `message`.
    #[must_use]
    pub fn failing_saves(mut self, message: impl Into<String>) -> Self {
        self.save_failure = Some(message.into());
        self
    }

    /// The job's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of saves that reached storage.
    #[must_use]
    pub const fn save_count(&self) -> usize {
        self.save_count
    }

    /// Number of saves vetoed by a persistence scope.
    #[must_use]
    pub const fn suppressed_saves(&self) -> usize {
        self.suppressed_saves
    }

    /// The configuration as of the last real save.
    #[must_use]
    pub const fn persisted(&self) -> Option<&JobConfiguration> {
        self.persisted.as_ref()
    }

    /// Enables or disables the job through the normal setter, which saves.
    pub fn set_disabled(&mut self, disabled: bool) -> Result<SaveOutcome, HostError> {
        self.fields.insert("disabled".to_string(), Value::Bool(disabled));
        self.save()
    }

    /// Changes the description through the normal setter, which saves.
    pub fn set_description(&mut self, description: impl Into<String>) -> Result<SaveOutcome, HostError> {
        self.fields
            .insert("description".to_string(), Value::String(description.into()));
        self.save()
    }
}

impl Saveable for InMemoryJob {
    fn saveable_id(&self) -> SaveableId {
        SaveableId::new(self.name.as_str())
    }

    fn save(&mut self) -> Result<SaveOutcome, HostError> {
        if host::save_vetoed(&self.saveable_id()) {
            self.suppressed_saves += 1;
            debug!(job = %self.name, "Save vetoed by persistence scope");
            return Ok(SaveOutcome::Suppressed);
        }
        if let Some(message) = &self.save_failure {
            return Err(HostError::new(self.name.as_str(), message.as_str()));
        }
        self.persisted = Some(self.fields.clone());
        self.save_count += 1;
        Ok(SaveOutcome::Saved)
    }
}

impl Job for InMemoryJob {
    fn full_name(&self) -> &str {
        &self.name
    }

    fn is_disabled(&self) -> bool {
        self.fields
            .get("disabled")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn field(&self, name: &str) -> Result<Value, FieldAccessError> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| FieldAccessError::missing(self.name.as_str(), name))
    }

    fn force_field(&mut self, name: &str, value: Value) -> Result<(), FieldAccessError> {
        match self.fields.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(FieldAccessError::missing(self.name.as_str(), name)),
        }
    }

    fn configuration(&self) -> JobConfiguration {
        self.fields.clone()
    }

    fn apply_configuration(&mut self, configuration: &JobConfiguration) -> Result<(), HostError> {
        self.fields = configuration
            .iter()
            .filter(|(name, _)| !self.unsupported.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Ok(())
    }
}
