//! The observer factory and lifetime manager.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Observer, Runtime};

/// Creates and owns [`Observer`]s. That's it.
///
/// This is the recommended entry point for reacting to signal changes:
/// [`Observatory::react_to_changes`] creates an observer, retains it, and
/// runs it once immediately so its dependency set is populated. Dropping
/// the observatory (or calling [`Observatory::unreact`]) tears observers
/// down, unsubscribing them from every signal they read.
pub struct Observatory {
    runtime: Runtime,
    observers: Mutex<Vec<Arc<Observer>>>,
}

impl Observatory {
    /// Create an observatory whose observers capture dependencies on
    /// `runtime`.
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            observers: Mutex::new(Vec::new()),
        }
    }

    /// The runtime this observatory runs observers on.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Create, retain, and immediately run an observer for `effect`.
    ///
    /// Every signal the effect reads during a run subscribes the observer;
    /// later writes to those signals enqueue it for the next
    /// [`Runtime::update`].
    pub fn react_to_changes(&self, effect: impl Fn() + Send + Sync + 'static) -> Arc<Observer> {
        let observer = Arc::new(Observer::new(effect));
        self.observers.lock().push(observer.clone());
        // A freshly created observer cannot already be on the stack.
        let _ = self.runtime.run(&observer);
        observer
    }

    /// Release an observer early and tear down its subscriptions.
    ///
    /// Subsequent writes to the signals it read no longer schedule it. The
    /// teardown is immediate even if the caller still holds clones of the
    /// `Arc`; such a clone only re-subscribes if the caller re-runs it.
    pub fn unreact(&self, observer: &Arc<Observer>) {
        self.observers
            .lock()
            .retain(|owned| !Arc::ptr_eq(owned, observer));
        observer.unreact_all();
    }

    /// Number of observers currently owned.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}
