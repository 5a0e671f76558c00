//! # EZ Templates
//!
//! Template propagation for CI jobs.
//!
//! A job marked as a template pushes its configuration to every job that
//! implements it, while each implementation keeps the fields its template
//! excludes. The crate provides:
//!
//! - **Change scopes**: thread-local guards marking an object as being
//!   changed in a given context, used to suppress saves and break loops
//! - **Exclusions**: capture/restore pairs that retain local fields across
//!   a propagation
//! - **Propagation**: applying a template to one implementation
//! - **Listener**: reacting to host saves, including cascading templates
//!
//! ## Quick Start
//!
//! ```rust
//! use eztemplates::prelude::*;
//! use std::sync::Arc;
//!
//! let repo = Arc::new(InMemoryJobRepository::new());
//! repo.insert(InMemoryJob::template("tpl"));
//! repo.insert(InMemoryJob::implementation("app", "tpl").with_disabled(true));
//!
//! let engine = TemplateEngine::new(Arc::clone(&repo));
//! let report = engine.on_saved("tpl")?;
//!
//! assert_eq!(report.updated(), vec!["app"]);
//! assert!(repo.get("app").unwrap().lock().is_disabled());
//! # Ok::<(), eztemplates::errors::EzTemplatesError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod change;
pub mod config;
pub mod errors;
pub mod exclusion;
pub mod host;
pub mod listener;
pub mod observability;
pub mod propagation;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::change::{ChangeContext, ChangeScope, SaveableId, ScopeTarget, ALL};
    pub use crate::config::{EngineConfig, TemplateSettings, DEFAULT_EXCLUSIONS};
    pub use crate::errors::{EzTemplatesError, FieldAccessError, FieldAccessKind, HostError};
    pub use crate::exclusion::{
        DisabledExclusion, Exclusion, ExclusionRegistry, ExclusionSnapshot, FieldExclusion,
    };
    pub use crate::host::{save_vetoed, Job, JobConfiguration, SaveOutcome, Saveable};
    pub use crate::listener::{JobRepository, SharedJob, TemplateEngine};
    pub use crate::propagation::{PropagationReport, SaveReport, TemplatePropagator};
    pub use crate::testing::{InMemoryJob, InMemoryJobRepository};
}
