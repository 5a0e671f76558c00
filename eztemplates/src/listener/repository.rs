//! Job lookup used by the engine.

use crate::host::Job;
use parking_lot::Mutex;
use std::sync::Arc;

/// A job shared between the host and the engine.
pub type SharedJob = Arc<Mutex<dyn Job>>;

/// The host's job index.
///
/// The engine never holds a job's lock while calling back into the
/// repository, so implementations may lock jobs freely. The one lock held
/// across host code is an implementation's during its real save; save
/// listeners calling [`TemplateEngine::on_saved`](super::TemplateEngine::on_saved)
/// for that job return without touching the repository.
pub trait JobRepository: Send + Sync {
    /// Looks up a job by full name.
    fn job(&self, name: &str) -> Option<SharedJob>;

    /// Full names of the jobs implementing `template`, in a stable order.
    fn implementations_of(&self, template: &str) -> Vec<String>;
}
