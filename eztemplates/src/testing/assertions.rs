//! Test assertions for scopes and saves.

use super::InMemoryJob;
use crate::change;

/// Asserts that the calling thread has no open change scopes.
pub fn assert_no_open_scopes() {
    let open = change::open_scopes();
    assert!(
        open.is_empty(),
        "Expected no open change scopes, found {}: {:?}",
        open.len(),
        open
    );
}

/// Asserts how many saves a job performed and how many were vetoed.
pub fn assert_save_counts(job: &InMemoryJob, saved: usize, suppressed: usize) {
    assert_eq!(
        (job.save_count(), job.suppressed_saves()),
        (saved, suppressed),
        "Unexpected (saved, suppressed) counts for job '{}'",
        job.name()
    );
}
