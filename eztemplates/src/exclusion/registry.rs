//! Registry of available exclusions.

use super::{DisabledExclusion, Exclusion, FieldExclusion};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Id and label of a registered exclusion, for listing in a UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionDescriptor {
    /// Stable identifier.
    pub id: String,
    /// Human-readable label.
    pub description: String,
}

/// Ordered set of exclusions, keyed by id.
///
/// Registration order is the order in which exclusions are captured and
/// restored during propagation.
#[derive(Default)]
pub struct ExclusionRegistry {
    exclusions: RwLock<Vec<Arc<dyn Exclusion>>>,
}

impl ExclusionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in exclusions.
    #[must_use]
    pub fn builtin() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(FieldExclusion::ez_templates()));
        registry.register(Arc::new(DisabledExclusion::new()));
        registry.register(Arc::new(FieldExclusion::description()));
        registry.register(Arc::new(FieldExclusion::job_params()));
        registry.register(Arc::new(FieldExclusion::triggers()));
        registry.register(Arc::new(FieldExclusion::scm()));
        registry.register(Arc::new(FieldExclusion::assigned_label()));
        registry
    }

    /// Registers an exclusion, replacing any with the same id in place.
    pub fn register(&self, exclusion: Arc<dyn Exclusion>) {
        let mut exclusions = self.exclusions.write();
        match exclusions.iter().position(|e| e.id() == exclusion.id()) {
            Some(index) => exclusions[index] = exclusion,
            None => exclusions.push(exclusion),
        }
    }

    /// Looks up an exclusion by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Exclusion>> {
        self.exclusions.read().iter().find(|e| e.id() == id).cloned()
    }

    /// Resolves `ids` in registry order.
    ///
    /// Unknown ids are returned alongside the resolved exclusions so that one
    /// bad id does not block the rest.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> (Vec<Arc<dyn Exclusion>>, Vec<String>) {
        let unknown = ids
            .iter()
            .map(|id| id.as_ref())
            .filter(|id| self.get(id).is_none())
            .map(String::from)
            .collect();

        let resolved = self
            .exclusions
            .read()
            .iter()
            .filter(|e| ids.iter().any(|id| id.as_ref() == e.id()))
            .cloned()
            .collect();

        (resolved, unknown)
    }

    /// Lists registered exclusions.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ExclusionDescriptor> {
        self.exclusions
            .read()
            .iter()
            .map(|e| ExclusionDescriptor {
                id: e.id().to_string(),
                description: e.description().to_string(),
            })
            .collect()
    }

    /// Number of registered exclusions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exclusions.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exclusions.read().is_empty()
    }
}

impl std::fmt::Debug for ExclusionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.exclusions.read().iter().map(|e| e.id().to_string()).collect();
        f.debug_struct("ExclusionRegistry").field("exclusions", &ids).finish()
    }
}
