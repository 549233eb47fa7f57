//! Observers: a reactive computation plus its current dependency set.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::SignalId;

/// Zero-argument subscription teardown.
///
/// Signals are generic over their value type but an observer must hold all
/// of its subscriptions uniformly, so each teardown is boxed: it captures
/// the listener token plus a weak handle to the cell, and is a safe no-op
/// if the cell has since been dropped.
pub(crate) type Unsubscribe = Box<dyn FnMut() + Send>;

/// A zero-argument computation plus the subscriptions it picked up during
/// its most recent run.
///
/// Observers never subscribe explicitly: reading a [`Signal`](crate::Signal)
/// while the observer is running wires the edge. Every run first discards
/// all prior subscriptions, then the effect re-declares its dependencies by
/// reading, so the set always reflects what the effect actually touched
/// last time, which may differ from run to run.
///
/// Create observers through an [`Observatory`](crate::Observatory); dropping
/// the last reference tears every subscription down.
pub struct Observer {
    effect: Box<dyn Fn() + Send + Sync>,
    subscriptions: Mutex<HashMap<SignalId, Unsubscribe>>,
}

impl Observer {
    pub(crate) fn new(effect: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            effect: Box::new(effect),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn run_effect(&self) {
        (self.effect)()
    }

    pub(crate) fn is_subscribed(&self, id: SignalId) -> bool {
        self.subscriptions.lock().contains_key(&id)
    }

    pub(crate) fn add_subscription(&self, id: SignalId, unsubscribe: Unsubscribe) {
        self.subscriptions.lock().insert(id, unsubscribe);
    }

    /// Tear down every tracked subscription and clear the set.
    ///
    /// Called at the start of every run and on drop.
    pub(crate) fn unreact_all(&self) {
        let drained: Vec<Unsubscribe> = {
            let mut subscriptions = self.subscriptions.lock();
            subscriptions.drain().map(|(_, unsub)| unsub).collect()
        };
        for mut unsubscribe in drained {
            unsubscribe();
        }
    }

    /// Number of signals this observer is currently subscribed to.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.unreact_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_unreact_all_runs_each_teardown_once() {
        let observer = Observer::new(|| {});
        let torn_down = Arc::new(AtomicU32::new(0));
        for id in [SignalId::next(), SignalId::next()] {
            let torn_down = torn_down.clone();
            observer.add_subscription(
                id,
                Box::new(move || {
                    torn_down.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        assert_eq!(observer.subscription_count(), 2);
        observer.unreact_all();
        assert_eq!(torn_down.load(Ordering::SeqCst), 2);
        assert_eq!(observer.subscription_count(), 0);
        // Drop must not run the already-drained teardowns again.
        drop(observer);
        assert_eq!(torn_down.load(Ordering::SeqCst), 2);
    }
}
