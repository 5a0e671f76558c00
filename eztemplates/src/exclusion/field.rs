//! Exclusions that retain raw field values verbatim.

use super::{Exclusion, ExclusionSnapshot};
use crate::errors::{FieldAccessError, Result};
use crate::host::{Job, EXCLUSIONS_FIELD, IMPLEMENTS_FIELD, TEMPLATE_FIELD};

/// Retains one or more named fields exactly as the implementation had them.
#[derive(Debug, Clone)]
pub struct FieldExclusion {
    id: String,
    description: String,
    fields: Vec<String>,
}

impl FieldExclusion {
    /// Creates an exclusion retaining `fields`.
    pub fn new<I, S>(id: impl Into<String>, description: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            description: description.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Keeps the implementation's own templating settings, so that it does
    /// not turn into a copy of its template's template.
    #[must_use]
    pub fn ez_templates() -> Self {
        Self::new(
            "ez-templates",
            "Retain local templating settings",
            [TEMPLATE_FIELD, IMPLEMENTS_FIELD, EXCLUSIONS_FIELD],
        )
    }

    /// Keeps the local description.
    #[must_use]
    pub fn description() -> Self {
        Self::new("description", "Retain local description", ["description"])
    }

    /// Keeps the local job parameters.
    #[must_use]
    pub fn job_params() -> Self {
        Self::new("job-params", "Retain local job parameters", ["parameters"])
    }

    /// Keeps the local build triggers.
    #[must_use]
    pub fn triggers() -> Self {
        Self::new("triggers", "Retain local build triggers", ["triggers"])
    }

    /// Keeps the local source code management settings.
    #[must_use]
    pub fn scm() -> Self {
        Self::new("scm", "Retain local source code management", ["scm"])
    }

    /// Keeps the local node label.
    #[must_use]
    pub fn assigned_label() -> Self {
        Self::new("assigned-label", "Retain local assigned label", ["assignedNode"])
    }

    /// The fields this exclusion retains.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl Exclusion for FieldExclusion {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn capture(&self, source: &dyn Job) -> std::result::Result<ExclusionSnapshot, FieldAccessError> {
        self.fields
            .iter()
            .try_fold(ExclusionSnapshot::new(&self.id), |snapshot, field| {
                Ok(snapshot.with_value(field, source.field(field)?))
            })
    }

    fn restore(&self, target: &mut dyn Job, snapshot: ExclusionSnapshot) -> Result<()> {
        snapshot.ensure_owned_by(&self.id)?;
        for (field, value) in snapshot.into_values() {
            target.force_field(&field, value)?;
        }
        Ok(())
    }
}
