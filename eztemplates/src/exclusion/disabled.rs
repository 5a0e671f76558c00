//! Retain-disabled exclusion.

use super::{Exclusion, ExclusionSnapshot};
use crate::errors::{FieldAccessError, Result};
use crate::host::Job;
use serde_json::Value;

const DISABLED_FIELD: &str = "disabled";

/// Keeps an implementation's own enabled/disabled state.
///
/// Capture goes through [`Job::is_disabled`]; restore force-writes the raw
/// field because the host's disable/enable setters save the job.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledExclusion;

impl DisabledExclusion {
    /// Stable id of this exclusion.
    pub const ID: &'static str = "disabled";

    /// Creates the exclusion.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Exclusion for DisabledExclusion {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "Retain local disabled setting"
    }

    fn capture(&self, source: &dyn Job) -> std::result::Result<ExclusionSnapshot, FieldAccessError> {
        Ok(ExclusionSnapshot::new(Self::ID).with_value(DISABLED_FIELD, Value::Bool(source.is_disabled())))
    }

    fn restore(&self, target: &mut dyn Job, snapshot: ExclusionSnapshot) -> Result<()> {
        snapshot.ensure_owned_by(Self::ID)?;
        let disabled = snapshot
            .value(DISABLED_FIELD)
            .and_then(Value::as_bool)
            .ok_or_else(|| FieldAccessError::type_mismatch(target.full_name(), DISABLED_FIELD))?;
        target.force_field(DISABLED_FIELD, Value::Bool(disabled))?;
        Ok(())
    }
}
