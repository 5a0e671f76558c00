//! In-memory host model for exercising templating without a CI server.
//!
//! This module provides:
//! - [`InMemoryJob`], a job whose saves honour persistence scopes
//! - [`InMemoryJobRepository`], a concurrent job lookup for the engine
//! - Assertions on scope stacks and save counters

mod assertions;
mod fixtures;
mod repository;

pub use assertions::{assert_no_open_scopes, assert_save_counts};
pub use fixtures::InMemoryJob;
pub use repository::InMemoryJobRepository;
