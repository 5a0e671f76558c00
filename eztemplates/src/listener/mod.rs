//! Save listener: turns host job saves into template propagation.
//!
//! This module provides:
//! - [`TemplateEngine`], the save hook the host calls after persisting a job
//! - [`JobRepository`], the job index the engine reads from

mod engine;
mod repository;

pub use engine::TemplateEngine;
pub use repository::{JobRepository, SharedJob};
