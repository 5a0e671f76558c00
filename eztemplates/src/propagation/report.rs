//! Propagation outcomes.

use crate::host::SaveOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An exclusion that could not be applied to one implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedExclusion {
    /// The exclusion's id.
    pub exclusion: String,
    /// Why it was skipped.
    pub reason: String,
}

/// What happened when a template was copied onto one implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationReport {
    /// The template's full name.
    pub template: String,
    /// The implementation's full name.
    pub implementation: String,
    /// Exclusions whose values were retained.
    pub applied_exclusions: Vec<String>,
    /// Exclusions that failed and were skipped.
    pub skipped_exclusions: Vec<SkippedExclusion>,
    /// Result of the final save, once it ran.
    pub save: Option<SaveOutcome>,
    /// When propagation started.
    pub propagated_at: DateTime<Utc>,
}

impl PropagationReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(template: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            implementation: implementation.into(),
            applied_exclusions: Vec::new(),
            skipped_exclusions: Vec::new(),
            save: None,
            propagated_at: Utc::now(),
        }
    }

    /// Records a skipped exclusion.
    pub fn skip(&mut self, exclusion: impl Into<String>, reason: impl ToString) {
        self.skipped_exclusions.push(SkippedExclusion {
            exclusion: exclusion.into(),
            reason: reason.to_string(),
        });
    }

    /// Returns true if every requested exclusion was applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped_exclusions.is_empty()
    }
}

/// An implementation the engine failed to update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationFailure {
    /// The template's full name.
    pub template: String,
    /// The implementation's full name.
    pub implementation: String,
    /// The error, rendered.
    pub error: String,
}

/// Everything one save triggered, including cascades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReport {
    /// The job whose save was handled.
    pub job: String,
    /// Implementations updated, in the order they were updated.
    pub propagations: Vec<PropagationReport>,
    /// Implementations that failed.
    pub failures: Vec<PropagationFailure>,
    /// Implementations left alone because they were already being updated
    /// further up the call stack.
    pub skipped: Vec<String>,
}

impl SaveReport {
    /// Creates an empty report for `job`.
    #[must_use]
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            propagations: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Full names of updated implementations, in update order.
    #[must_use]
    pub fn updated(&self) -> Vec<&str> {
        self.propagations
            .iter()
            .map(|p| p.implementation.as_str())
            .collect()
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
