//! Ambient counter scope
//!
//! Counted items never receive a counter argument: serde gives them no room
//! for one. Instead each thread keeps a stack of counters; an enclosure pushes
//! its counter for the duration of its payload traversal and every counted item
//! increments whatever is on top. With an empty stack items fall back to the
//! process-wide counter.
//!
//! Worker threads that serialize part of an operation in parallel carry the
//! counter over explicitly:
//!
//! ```ignore
//! let counter = sercount::scope::current();
//! std::thread::spawn(move || {
//!     let _guard = sercount::scope::enter(counter);
//!     serde_json::to_vec(&chunk)
//! });
//! ```

use std::cell::RefCell;
use std::sync::Arc;

use tracing::debug;

use crate::counter::{self, ProgressCounter};

thread_local! {
    /// Counters entered on this thread, innermost last
    static STACK: RefCell<Vec<Arc<ProgressCounter>>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a counter entered until dropped
///
/// Dropping pops the counter again, also when a serde error unwinds the
/// traversal early. Guards must be dropped in reverse order of creation, which
/// scoping guarantees for the usual `let _guard = enter(..)` pattern.
#[must_use = "the counter is only entered while the guard is alive"]
#[derive(Debug)]
pub struct ScopeGuard {
    depth: usize,
    // Not Send: the guard belongs to the thread whose stack it pushed to
    _not_send: std::marker::PhantomData<*const ()>,
}

/// Make `counter` the ambient counter on this thread until the guard drops
pub fn enter(counter: Arc<ProgressCounter>) -> ScopeGuard {
    let depth = STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(counter);
        stack.len()
    });
    debug!(depth, "scope::enter: called");
    ScopeGuard {
        depth,
        _not_send: std::marker::PhantomData,
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            // Anything above our own entry was leaked by an inner guard
            stack.truncate(self.depth.saturating_sub(1));
        });
        debug!(depth = self.depth, "ScopeGuard::drop: left scope");
    }
}

/// The counter items on this thread currently report to
pub fn current() -> Arc<ProgressCounter> {
    STACK
        .with(|stack| stack.borrow().last().cloned())
        .unwrap_or_else(|| counter::global().clone())
}

/// Run `f` with `counter` entered
pub fn with<R>(counter: Arc<ProgressCounter>, f: impl FnOnce() -> R) -> R {
    let _guard = enter(counter);
    f()
}

/// Number of counters entered on this thread
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}
