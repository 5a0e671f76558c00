//! In-memory job repository.

use super::InMemoryJob;
use crate::host::Job;
use crate::listener::{JobRepository, SharedJob};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Concurrent map of [`InMemoryJob`]s keyed by full name.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: DashMap<String, Arc<Mutex<InMemoryJob>>>,
}

impl InMemoryJobRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a job, returning the shared handle.
    pub fn insert(&self, job: InMemoryJob) -> Arc<Mutex<InMemoryJob>> {
        let handle = Arc::new(Mutex::new(job));
        self.jobs
            .insert(handle.lock().name().to_string(), Arc::clone(&handle));
        handle
    }

    /// Returns the concrete handle for a job.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<InMemoryJob>>> {
        self.jobs.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of jobs held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true if no jobs are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobRepository for InMemoryJobRepository {
    fn job(&self, name: &str) -> Option<SharedJob> {
        self.get(name).map(|job| job as SharedJob)
    }

    fn implementations_of(&self, template: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().lock().implemented_template().as_deref() == Some(template))
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let repo = InMemoryJobRepository::new();
        assert!(repo.is_empty());

        repo.insert(InMemoryJob::template("tpl"));
        assert_eq!(repo.len(), 1);
        assert!(repo.job("tpl").is_some());
        assert!(repo.job("missing").is_none());
        assert!(repo.job("tpl").unwrap().lock().is_template());
    }

    #[test]
    fn test_implementations_are_sorted() {
        let repo = InMemoryJobRepository::new();
        repo.insert(InMemoryJob::template("tpl"));
        repo.insert(InMemoryJob::implementation("zeta", "tpl"));
        repo.insert(InMemoryJob::implementation("alpha", "tpl"));
        repo.insert(InMemoryJob::implementation("other", "different"));

        assert_eq!(repo.implementations_of("tpl"), vec!["alpha", "zeta"]);
        assert!(repo.implementations_of("alpha").is_empty());
    }

    #[test]
    fn test_shared_handle_sees_engine_writes() {
        let repo = InMemoryJobRepository::new();
        let concrete = repo.insert(InMemoryJob::new("app"));

        let shared = repo.job("app").unwrap();
        shared.lock().force_field("description", "changed".into()).unwrap();

        assert_eq!(concrete.lock().field("description").unwrap(), "changed");
    }
}
