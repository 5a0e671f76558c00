//! Exclusions: fields an implementation keeps across template propagation.
//!
//! Propagation overwrites an implementation's configuration with its
//! template's. An [`Exclusion`] captures the implementation's own value of
//! some field before the overwrite and puts it back afterwards. Capture
//! returns an [`ExclusionSnapshot`] instead of storing state on the
//! exclusion, so one instance can serve any number of concurrent
//! propagations, and a restore without a prior capture cannot be expressed.

mod disabled;
mod field;
mod registry;

pub use disabled::DisabledExclusion;
pub use field::FieldExclusion;
pub use registry::{ExclusionDescriptor, ExclusionRegistry};

use crate::errors::{EzTemplatesError, FieldAccessError};
use crate::host::Job;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// A field-retention strategy.
///
/// Neither operation may persist the job: `restore` writes through
/// [`Job::force_field`], never through a setter that could save.
pub trait Exclusion: Send + Sync + Debug {
    /// Stable identifier, as listed in template settings.
    fn id(&self) -> &str;

    /// Human-readable label.
    fn description(&self) -> &str;

    /// Reads the retained value(s) from `source` before it is overwritten.
    fn capture(&self, source: &dyn Job) -> Result<ExclusionSnapshot, FieldAccessError>;

    /// Writes the captured value(s) back onto `target`.
    fn restore(&self, target: &mut dyn Job, snapshot: ExclusionSnapshot) -> crate::errors::Result<()>;
}

/// Values captured by one exclusion, to be handed back to its `restore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSnapshot {
    exclusion: String,
    values: BTreeMap<String, Value>,
}

impl ExclusionSnapshot {
    /// Creates an empty snapshot owned by `exclusion`.
    #[must_use]
    pub fn new(exclusion: impl Into<String>) -> Self {
        Self {
            exclusion: exclusion.into(),
            values: BTreeMap::new(),
        }
    }

    /// Adds a captured field value.
    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    /// Id of the exclusion that captured this snapshot.
    #[must_use]
    pub fn exclusion_id(&self) -> &str {
        &self.exclusion
    }

    /// The captured value of `field`.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Iterates captured `(field, value)` pairs in field order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Consumes the snapshot, yielding its values.
    #[must_use]
    pub fn into_values(self) -> BTreeMap<String, Value> {
        self.values
    }

    /// Fails unless this snapshot was captured by `exclusion`.
    pub fn ensure_owned_by(&self, exclusion: &str) -> crate::errors::Result<()> {
        if self.exclusion == exclusion {
            Ok(())
        } else {
            Err(EzTemplatesError::SnapshotMismatch {
                expected: exclusion.to_string(),
                actual: self.exclusion.clone(),
            })
        }
    }
}
