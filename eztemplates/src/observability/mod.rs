//! Observability utilities.
//!
//! The crate itself only emits `tracing` events and spans. Hosts that do not
//! configure their own subscriber can install a console one from here.

mod subscriber;

pub use subscriber::{build_filter, init_tracing, init_tracing_with, LogFormat};
