//! The observer runtime: the active-observer stack and the pending queue.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{Observer, ReactError};

/// The context object tracking running observers and queueing dirty ones.
///
/// This is cheap to clone, so you can pass it around by just cloning it;
/// clones share one stack and one queue. Construct one runtime per
/// independent reactive world: typically one per process, but tests can
/// isolate as many as they like.
///
/// The runtime is purely passive. A cell notification only *enqueues* a
/// dependent observer; nothing re-runs until the caller's own driver loop
/// invokes [`Runtime::update`] on whatever cadence the application
/// chooses, such as per frame or per event-loop tick. The crate never
/// calls it.
#[derive(Clone, Default)]
pub struct Runtime {
    stack: Arc<Mutex<StackState>>,
}

#[derive(Default)]
struct StackState {
    /// Currently executing observers, in nested call order.
    active: Vec<Weak<Observer>>,
    /// Observers marked dirty and awaiting the next drain. Not deduplicated.
    pending: Vec<Weak<Observer>>,
}

impl Runtime {
    /// Create a new runtime.
    pub fn new() -> Self {
        Default::default()
    }

    /// The nearest live observer on the active stack, if any.
    ///
    /// Dead entries at the top are pruned along the way.
    pub fn top(&self) -> Option<Arc<Observer>> {
        let mut stack = self.stack.lock();
        while let Some(weak) = stack.active.last() {
            if let Some(observer) = weak.upgrade() {
                return Some(observer);
            }
            stack.active.pop();
        }
        None
    }

    /// Execute an observer's effect with dependency capture enabled.
    ///
    /// The observer's previous subscriptions are torn down first, then the
    /// effect runs with this observer on top of the active stack so that
    /// every signal it reads re-subscribes it. The stack lock is not held
    /// while the effect runs, so effects may freely run *other* observers
    /// nested; an attempt to re-run an observer that is already active is
    /// skipped with [`ReactError::CircularObservation`], leaving the outer
    /// run unaffected.
    pub fn run(&self, observer: &Arc<Observer>) -> Result<(), ReactError> {
        {
            let mut stack = self.stack.lock();
            stack.active.retain(|weak| weak.strong_count() > 0);
            let already_active = stack
                .active
                .iter()
                .any(|weak| weak.upgrade().is_some_and(|active| Arc::ptr_eq(&active, observer)));
            if already_active {
                drop(stack);
                tracing::warn!("skipped circular observer run");
                return Err(ReactError::CircularObservation);
            }
            stack.active.push(Arc::downgrade(observer));
        }

        observer.unreact_all();
        observer.run_effect();

        let mut stack = self.stack.lock();
        if let Some(index) = stack
            .active
            .iter()
            .rposition(|weak| weak.upgrade().is_some_and(|active| Arc::ptr_eq(&active, observer)))
        {
            stack.active.remove(index);
        }
        Ok(())
    }

    /// Mark an observer dirty without executing it.
    ///
    /// Callable from any thread, including from inside a cell's
    /// notification round. The queue is not deduplicated: scheduling the
    /// same observer twice re-runs it twice at the next drain, which is
    /// harmless because each run rebuilds the subscription set from
    /// scratch.
    pub fn schedule(&self, observer: &Arc<Observer>) {
        self.stack.lock().pending.push(Arc::downgrade(observer));
    }

    /// Drain the pending queue, re-running each still-live observer.
    ///
    /// This is the sole point where deferred execution happens. The queue
    /// is swapped out atomically, so observers scheduled *during* the drain
    /// (for example by a re-run writing a downstream cell) land in the next
    /// drain rather than extending this one.
    pub fn update(&self) {
        let pending = std::mem::take(&mut self.stack.lock().pending);
        for weak in pending {
            if let Some(observer) = weak.upgrade() {
                // A circular skip is already reported inside `run`.
                let _ = self.run(&observer);
            }
        }
    }

    /// Number of entries currently awaiting a drain, dead or alive.
    pub fn pending_count(&self) -> usize {
        self.stack.lock().pending.len()
    }
}
