//! Identities a change scope is keyed on.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a persisted host object.
///
/// For jobs this is the full name, which the host guarantees unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaveableId(String);

impl SaveableId {
    /// Creates an identity from a full name.
    #[must_use]
    pub fn new(full_name: impl Into<String>) -> Self {
        Self(full_name.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SaveableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SaveableId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SaveableId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What a change scope suppresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeTarget {
    /// Every saveable under the scope's context.
    All,
    /// One specific saveable.
    Saveable(SaveableId),
}

impl ScopeTarget {
    /// Scope target for a single saveable.
    #[must_use]
    pub fn saveable(id: impl Into<SaveableId>) -> Self {
        Self::Saveable(id.into())
    }

    /// Returns true for the [`ScopeTarget::All`] sentinel.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Returns true if a scope opened on `self` covers `candidate`.
    #[must_use]
    pub fn covers(&self, candidate: &Self) -> bool {
        self.is_all() || self == candidate
    }
}

impl From<SaveableId> for ScopeTarget {
    fn from(id: SaveableId) -> Self {
        Self::Saveable(id)
    }
}

impl From<&SaveableId> for ScopeTarget {
    fn from(id: &SaveableId) -> Self {
        Self::Saveable(id.clone())
    }
}

impl fmt::Display for ScopeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "<all>"),
            Self::Saveable(id) => write!(f, "{id}"),
        }
    }
}

/// Opaque token separating independent propagation graphs.
///
/// Scopes only ever match queries made under the same context, which is what
/// lets one job be an implementation of one template and a template for
/// others at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeContext(Uuid);

impl ChangeContext {
    /// A template pushing its configuration to its implementations.
    pub const TEMPLATE: Self = Self(Uuid::from_u128(0x0e7a_0000_0000_0000_0000_0000_0000_0001));

    /// An implementation having its template re-applied.
    pub const IMPLEMENTATION: Self = Self(Uuid::from_u128(0x0e7a_0000_0000_0000_0000_0000_0000_0002));

    /// In-memory reconfiguration during which host saves are vetoed.
    pub const PERSISTENCE: Self = Self(Uuid::from_u128(0x0e7a_0000_0000_0000_0000_0000_0000_0003));

    /// Mints a fresh context that matches no other.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ChangeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChangeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::TEMPLATE {
            write!(f, "template")
        } else if *self == Self::IMPLEMENTATION {
            write!(f, "implementation")
        } else if *self == Self::PERSISTENCE {
            write!(f, "persistence")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
