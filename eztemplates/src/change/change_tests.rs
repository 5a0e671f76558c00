//! Behavioural tests for change scopes.

#[cfg(test)]
mod tests {
    use crate::change::{self, ChangeContext, ChangeScope, ScopeTarget, ALL};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn job(name: &str) -> ScopeTarget {
        ScopeTarget::saveable(name)
    }

    #[test]
    fn test_nested_scopes_walk_parent_chain() {
        let ctx1 = ChangeContext::new();
        let ctx2 = ChangeContext::new();

        let mut a = ChangeScope::open(job("job1"), ctx1);
        assert!(change::contains(&job("job1"), ctx1));
        assert!(!change::contains(&job("job1"), ctx2));

        let mut b = ChangeScope::open(job("job2"), ctx1);
        assert!(change::contains(&job("job1"), ctx1));
        assert!(change::contains(&job("job2"), ctx1));

        b.commit();
        a.commit();
        assert!(!change::contains(&job("job1"), ctx1));
        assert!(change::current().is_none());
    }

    #[test]
    fn test_all_sentinel_vetoes_context() {
        let ctx1 = ChangeContext::new();
        let mut scope = ChangeScope::open(ALL, ctx1);

        assert!(change::contains(&job("never-mentioned"), ctx1));
        assert!(!change::contains(&job("never-mentioned"), ChangeContext::new()));

        scope.commit();
        assert!(!change::contains(&job("never-mentioned"), ctx1));
    }

    #[test]
    fn test_contexts_never_cross_match() {
        let mut as_child = ChangeScope::open(job("shared"), ChangeContext::IMPLEMENTATION);
        assert!(change::contains(&job("shared"), ChangeContext::IMPLEMENTATION));
        assert!(!change::contains(&job("shared"), ChangeContext::TEMPLATE));

        let mut as_template = ChangeScope::open(job("shared"), ChangeContext::TEMPLATE);
        assert!(change::contains(&job("shared"), ChangeContext::TEMPLATE));

        as_template.commit();
        assert!(!change::contains(&job("shared"), ChangeContext::TEMPLATE));
        assert!(change::contains(&job("shared"), ChangeContext::IMPLEMENTATION));
        as_child.commit();
    }

    #[test]
    fn test_commit_and_abort_are_idempotent() {
        let mut outer = ChangeScope::open(job("outer"), ChangeContext::TEMPLATE);
        let mut inner = ChangeScope::open(job("inner"), ChangeContext::TEMPLATE);

        inner.commit();
        assert!(inner.is_completed());
        let depth_after_first_close = change::depth();

        inner.commit();
        inner.abort();
        assert_eq!(change::depth(), depth_after_first_close);
        assert_eq!(change::current().map(|info| info.id), Some(outer.id()));

        outer.abort();
        outer.commit();
        assert_eq!(change::depth(), 0);
    }

    #[test]
    fn test_abort_after_commit_in_finally_style() {
        let mut scope = ChangeScope::open(job("app"), ChangeContext::TEMPLATE);
        let work = || -> Result<(), String> { Ok(()) };
        if work().is_ok() {
            scope.commit();
        }
        scope.abort();
        assert!(change::current().is_none());
    }

    #[test]
    fn test_out_of_order_close_leaves_clean_stack_after_unwind() {
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut outer = ChangeScope::open(job("outer"), ChangeContext::TEMPLATE);
            let _inner = ChangeScope::open(job("inner"), ChangeContext::TEMPLATE);
            outer.commit();
        }));

        assert!(result.is_err());
        assert_eq!(change::depth(), 0);
        assert!(!change::contains(&job("outer"), ChangeContext::TEMPLATE));
    }

    #[test]
    fn test_panic_inside_scope_releases_it() {
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _scope = ChangeScope::open(job("app"), ChangeContext::IMPLEMENTATION);
            panic!("propagation failed");
        }));

        assert!(result.is_err());
        assert!(!change::contains(&job("app"), ChangeContext::IMPLEMENTATION));
    }

    #[test]
    fn test_scopes_are_thread_local() {
        let mut scope = ChangeScope::open(ALL, ChangeContext::TEMPLATE);

        let seen_elsewhere = std::thread::spawn(|| {
            (
                change::contains(&job("app"), ChangeContext::TEMPLATE),
                change::current().is_none(),
            )
        })
        .join()
        .unwrap();

        assert_eq!(seen_elsewhere, (false, true));
        assert!(change::contains(&job("app"), ChangeContext::TEMPLATE));
        scope.commit();
    }

    #[test]
    fn test_concurrent_threads_do_not_interfere() {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    let name = format!("job-{i}");
                    let mut scope = ChangeScope::open(job(&name), ChangeContext::TEMPLATE);
                    for j in 0..8 {
                        let other = format!("job-{j}");
                        assert_eq!(change::contains(&job(&other), ChangeContext::TEMPLATE), i == j);
                    }
                    scope.commit();
                    change::depth()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 0);
        }
    }

    /// Drives random properly-nested open/commit/abort sequences and checks
    /// `contains` against a model of the open scopes after every step.
    #[test]
    fn test_random_nested_sequences_match_model() {
        let contexts = [ChangeContext::TEMPLATE, ChangeContext::IMPLEMENTATION, ChangeContext::new()];
        let targets = [job("a"), job("b"), job("c"), ALL];
        let mut rng = StdRng::seed_from_u64(0x0e7a);

        for _ in 0..200 {
            let mut open: Vec<ChangeScope> = Vec::new();
            let mut model: Vec<(ScopeTarget, ChangeContext)> = Vec::new();

            for _ in 0..rng.gen_range(1..40) {
                if open.is_empty() || rng.gen_bool(0.55) {
                    let target = targets[rng.gen_range(0..targets.len())].clone();
                    let context = contexts[rng.gen_range(0..contexts.len())];
                    open.push(ChangeScope::open(target.clone(), context));
                    model.push((target, context));
                } else {
                    let mut top = open.pop().unwrap();
                    model.pop();
                    if rng.gen_bool(0.5) {
                        top.commit();
                    } else {
                        top.abort();
                    }
                }

                for candidate in &targets {
                    for context in contexts {
                        let expected = model
                            .iter()
                            .any(|(t, c)| *c == context && (t == candidate || t.is_all()));
                        assert_eq!(change::contains(candidate, context), expected);
                    }
                }
                assert_eq!(change::depth(), model.len());
            }

            while let Some(mut top) = open.pop() {
                top.commit();
            }
            assert!(change::current().is_none());
        }
    }
}
