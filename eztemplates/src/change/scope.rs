//! Thread-local change scopes.
//!
//! Each thread owns a stack of open scopes. Opening a scope pushes it,
//! committing or aborting pops it, and [`contains`] walks the stack from the
//! innermost scope outwards. Scopes must close in LIFO order; closing any
//! other scope is a bug and panics.

use super::target::{ChangeContext, ScopeTarget};
use chrono::{DateTime, Utc};
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Process-unique identifier of an opened scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// An open scope as recorded on its thread's stack.
#[derive(Clone)]
pub struct ScopeInfo {
    /// The scope's identifier.
    pub id: ScopeId,
    /// What the scope suppresses.
    pub target: ScopeTarget,
    /// The context the scope was opened under.
    pub context: ChangeContext,
    /// The scope that was on top when this one opened.
    pub parent: Option<ScopeId>,
    /// When the scope was opened.
    pub opened_at: DateTime<Utc>,
    /// Where the scope was opened. Captured unconditionally, independent of
    /// `RUST_BACKTRACE`, so leak reports always name the opener.
    pub allocator: Arc<Backtrace>,
}

impl ScopeInfo {
    fn matches(&self, target: &ScopeTarget, context: ChangeContext) -> bool {
        self.context == context && self.target.covers(target)
    }
}

impl fmt::Debug for ScopeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeInfo")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("context", &self.context)
            .field("parent", &self.parent)
            .field("opened_at", &self.opened_at)
            .finish_non_exhaustive()
    }
}

thread_local! {
    static IN_SCOPE: RefCell<Vec<ScopeInfo>> = const { RefCell::new(Vec::new()) };
}

/// Marks `(target, context)` as being changed on the current thread.
///
/// The scope is closed by [`ChangeScope::commit`], [`ChangeScope::abort`] or,
/// failing both, by being dropped (which aborts). Closing is idempotent.
///
/// ```rust
/// use eztemplates::change::{self, ChangeContext, ChangeScope, ScopeTarget};
///
/// let job = ScopeTarget::saveable("app");
/// let mut scope = ChangeScope::open(job.clone(), ChangeContext::IMPLEMENTATION);
/// assert!(change::contains(&job, ChangeContext::IMPLEMENTATION));
/// scope.commit();
/// assert!(!change::contains(&job, ChangeContext::IMPLEMENTATION));
/// ```
#[must_use = "a change scope closes as soon as it is dropped"]
pub struct ChangeScope {
    info: ScopeInfo,
    completed: bool,
    // Scopes live on one thread's stack and must be closed there.
    _thread_bound: PhantomData<*const ()>,
}

impl ChangeScope {
    /// Opens a scope and makes it the current one for this thread.
    pub fn open(target: impl Into<ScopeTarget>, context: ChangeContext) -> Self {
        let id = ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed));
        let target = target.into();

        let (info, depth) = IN_SCOPE.with(|stack| {
            let mut stack = stack.borrow_mut();
            let info = ScopeInfo {
                id,
                target,
                context,
                parent: stack.last().map(|top| top.id),
                opened_at: Utc::now(),
                allocator: Arc::new(Backtrace::force_capture()),
            };
            stack.push(info.clone());
            (info, stack.len())
        });

        debug!(
            scope = %id,
            target = %info.target,
            context = %context,
            depth,
            "Opened change scope"
        );

        Self {
            info,
            completed: false,
            _thread_bound: PhantomData,
        }
    }

    /// Runs `f` inside a scope, committing on `Ok` and aborting on `Err`.
    pub fn scoped<T, E, F>(target: impl Into<ScopeTarget>, context: ChangeContext, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut scope = Self::open(target, context);
        let result = f();
        if result.is_ok() {
            scope.commit();
        } else {
            scope.abort();
        }
        result
    }

    /// Returns the scope's identifier.
    pub const fn id(&self) -> ScopeId {
        self.info.id
    }

    /// Returns what the scope suppresses.
    pub const fn target(&self) -> &ScopeTarget {
        &self.info.target
    }

    /// Returns the scope's context.
    pub const fn context(&self) -> ChangeContext {
        self.info.context
    }

    /// Returns the scope that was current when this one opened.
    pub const fn parent(&self) -> Option<ScopeId> {
        self.info.parent
    }

    /// Returns when the scope was opened.
    pub const fn opened_at(&self) -> DateTime<Utc> {
        self.info.opened_at
    }

    /// Returns where the scope was opened.
    pub fn allocator(&self) -> &Backtrace {
        &self.info.allocator
    }

    /// Returns true once the scope has been committed or aborted.
    pub const fn is_completed(&self) -> bool {
        self.completed
    }

    /// Ends the scope; the change is finished and may now be persisted
    /// through the normal save path.
    ///
    /// # Panics
    ///
    /// Panics if the scope is not the current one on this thread.
    pub fn commit(&mut self) {
        if self.completed {
            return;
        }
        self.pop("commit");
    }

    /// Ends the scope without the change being considered finished.
    ///
    /// In-memory mutations made inside the scope are not rolled back. Calling
    /// this after [`commit`](Self::commit) does nothing.
    ///
    /// # Panics
    ///
    /// Panics if the scope is not the current one on this thread.
    pub fn abort(&mut self) {
        if self.completed {
            return;
        }
        self.pop("abort");
    }

    fn pop(&mut self, action: &'static str) {
        let id = self.info.id;
        let outcome = IN_SCOPE.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.last() {
                Some(top) if top.id == id => {
                    stack.pop();
                    Ok(stack.len())
                }
                top => Err(top.map(|top| top.id)),
            }
        });

        match outcome {
            Ok(Ok(depth)) => {
                self.completed = true;
                debug!(scope = %id, action, depth, "Closed change scope");
            }
            Ok(Err(current)) => {
                let current = current.map_or_else(|| "none".to_string(), |c| c.to_string());
                panic!(
                    "Trying to {action} change scope {id} that's not in scope (current: {current})"
                );
            }
            // The thread is tearing down its locals; there is no stack left.
            Err(_) => self.completed = true,
        }
    }

    fn discard_while_unwinding(&mut self) {
        self.completed = true;
        let id = self.info.id;
        let removed = IN_SCOPE
            .try_with(|stack| {
                let Ok(mut stack) = stack.try_borrow_mut() else {
                    return None;
                };
                let index = stack.iter().rposition(|info| info.id == id)?;
                let was_top = index + 1 == stack.len();
                stack.remove(index);
                Some(was_top)
            })
            .ok()
            .flatten();

        if removed == Some(false) {
            warn!(scope = %id, target = %self.info.target, "Discarded out-of-order change scope while unwinding");
        }
    }
}

impl Drop for ChangeScope {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if std::thread::panicking() {
            self.discard_while_unwinding();
            return;
        }
        debug!(scope = %self.info.id, "Change scope dropped without commit");
        self.abort();
    }
}

impl fmt::Debug for ChangeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeScope")
            .field("id", &self.info.id)
            .field("target", &self.info.target)
            .field("context", &self.info.context)
            .field("parent", &self.info.parent)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

/// Returns the innermost open scope on this thread.
pub fn current() -> Option<ScopeInfo> {
    IN_SCOPE.with(|stack| stack.borrow().last().cloned())
}

/// Returns true if an open scope on this thread covers `target` under
/// `context`.
///
/// This is what a save path consults before persisting: `true` means some
/// caller further up the stack already owns this change.
pub fn contains(target: &ScopeTarget, context: ChangeContext) -> bool {
    IN_SCOPE.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .any(|info| info.matches(target, context))
    })
}

/// Number of open scopes on this thread.
pub fn depth() -> usize {
    IN_SCOPE.with(|stack| stack.borrow().len())
}

/// Lists this thread's open scopes, outermost first.
///
/// Meant for diagnosing scopes that were opened and never closed.
pub fn open_scopes() -> Vec<ScopeInfo> {
    IN_SCOPE.with(|stack| stack.borrow().clone())
}

/// Empties this thread's stack, returning whatever was still open.
///
/// Each leaked scope is logged with its allocator backtrace. Handles of the
/// discarded scopes that are still alive will panic if closed afterwards.
pub fn reset() -> Vec<ScopeInfo> {
    let leaked = IN_SCOPE.with(|stack| std::mem::take(&mut *stack.borrow_mut()));
    for info in &leaked {
        warn!(
            scope = %info.id,
            target = %info.target,
            context = %info.context,
            opened_at = %info.opened_at,
            allocator = %info.allocator,
            "Discarding leaked change scope"
        );
    }
    leaked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::backtrace::BacktraceStatus;

    #[test]
    fn test_open_sets_parent() {
        let mut outer = ChangeScope::open(ScopeTarget::saveable("a"), ChangeContext::TEMPLATE);
        let mut inner = ChangeScope::open(ScopeTarget::saveable("b"), ChangeContext::TEMPLATE);

        assert_eq!(outer.parent(), None);
        assert_eq!(inner.parent(), Some(outer.id()));
        assert_eq!(current().map(|info| info.id), Some(inner.id()));

        inner.commit();
        outer.commit();
        assert!(current().is_none());
    }

    #[test]
    fn test_drop_aborts() {
        {
            let _scope = ChangeScope::open(ScopeTarget::saveable("a"), ChangeContext::TEMPLATE);
            assert_eq!(depth(), 1);
        }
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_scoped_closes_on_error() {
        let target = ScopeTarget::saveable("a");
        let result: Result<(), &str> = ChangeScope::scoped(target.clone(), ChangeContext::TEMPLATE, || {
            assert!(contains(&target, ChangeContext::TEMPLATE));
            Err("boom")
        });

        assert_eq!(result, Err("boom"));
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_scoped_returns_value() {
        let value: Result<u32, ()> =
            ChangeScope::scoped(ScopeTarget::All, ChangeContext::PERSISTENCE, || Ok(7));
        assert_eq!(value, Ok(7));
        assert!(current().is_none());
    }

    #[test]
    #[should_panic(expected = "not in scope")]
    fn test_out_of_order_commit_panics() {
        let mut outer = ChangeScope::open(ScopeTarget::saveable("a"), ChangeContext::TEMPLATE);
        let _inner = ChangeScope::open(ScopeTarget::saveable("b"), ChangeContext::TEMPLATE);
        outer.commit();
    }

    #[test]
    #[should_panic(expected = "not in scope")]
    fn test_out_of_order_drop_panics() {
        let outer = ChangeScope::open(ScopeTarget::saveable("a"), ChangeContext::TEMPLATE);
        let _inner = ChangeScope::open(ScopeTarget::saveable("b"), ChangeContext::TEMPLATE);
        drop(outer);
    }

    #[test]
    fn test_reset_returns_leaked_scopes() {
        let scope = ChangeScope::open(ScopeTarget::saveable("leaky"), ChangeContext::TEMPLATE);
        std::mem::forget(scope);

        let leaked = reset();
        assert_eq!(leaked.len(), 1);
        assert_eq!(leaked[0].target, ScopeTarget::saveable("leaky"));
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_allocator_backtrace_is_always_captured() {
        let mut scope = ChangeScope::open(ScopeTarget::saveable("a"), ChangeContext::TEMPLATE);
        assert_ne!(scope.allocator().status(), BacktraceStatus::Disabled);

        let info = current().unwrap();
        assert_ne!(info.allocator.status(), BacktraceStatus::Disabled);
        scope.commit();
    }

    #[test]
    fn test_debug_omits_backtrace() {
        let scope = ChangeScope::open(ScopeTarget::saveable("a"), ChangeContext::TEMPLATE);
        let rendered = format!("{scope:?}");
        assert!(rendered.contains("ChangeScope"));
        assert!(!rendered.contains("allocator"));
    }
}
