//! Change scopes: loop-safe propagation of saves.
//!
//! Saving a template re-saves its implementations, and those saves must not
//! bounce back into templating. Before propagating to a job, the caller opens
//! a [`ChangeScope`] for `(job, context)`; any save hook further down the
//! call stack asks [`contains`] and skips work already owned above it.
//!
//! This module provides:
//! - Identities scopes are keyed on ([`SaveableId`], [`ScopeTarget`], [`ChangeContext`])
//! - The RAII [`ChangeScope`] guard and its thread-local stack
//! - Stack queries ([`contains`], [`current`]) and leak diagnostics ([`open_scopes`], [`reset`])

#[cfg(test)]
mod change_tests;
mod scope;
mod target;

pub use scope::{contains, current, depth, open_scopes, reset, ChangeScope, ScopeId, ScopeInfo};
pub use target::{ChangeContext, SaveableId, ScopeTarget};

/// Sentinel target that makes a scope cover every saveable in its context.
pub const ALL: ScopeTarget = ScopeTarget::All;
