//! Copying a template's configuration onto an implementation.
//!
//! This module provides:
//! - [`TemplatePropagator`], which runs the capture, copy, restore, save sequence
//! - [`PropagationReport`], what happened to one implementation

mod propagator;
mod report;

pub use propagator::TemplatePropagator;
pub use report::{PropagationFailure, PropagationReport, SaveReport, SkippedExclusion};
