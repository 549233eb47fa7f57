//! Signals: cells with identity that auto-subscribe running observers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::{Cell, Observatory, ReactError, RefHandle, Runtime, Session};

/// Counter behind [`SignalId`]. Global rather than per-runtime so that
/// identities stay unique even when an observer spans signals from
/// different runtimes.
static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a signal.
///
/// Assigned once at construction from a monotonically increasing counter;
/// never reused for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u64);

impl SignalId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A reactive value with identity: the externally visible unit of state.
///
/// Reading or writing a signal while an observer is running subscribes
/// that observer to the signal automatically; no explicit subscribe call
/// exists. When the signal's cell later notifies, the observer is enqueued
/// on the runtime's pending queue; it re-runs only when the driver calls
/// [`Runtime::update`].
///
/// Share a signal across observers and threads by wrapping it in an `Arc`,
/// or hand out [`RefHandle`]s via [`Signal::ref_handle`].
pub struct Signal<T> {
    cell: Cell<T>,
    id: SignalId,
    runtime: Runtime,
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// Create a signal holding `value`, tied to `runtime` for dependency
    /// capture.
    pub fn new(runtime: Runtime, value: T) -> Self {
        Self {
            cell: Cell::new(value),
            id: SignalId::next(),
            runtime,
        }
    }

    /// This signal's process-unique identity.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// The runtime this signal captures dependencies on.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Clone of the current value. A tracked access.
    pub fn get(&self) -> T {
        self.track();
        self.cell.get()
    }

    /// Borrow the current value under the cell's lock. A tracked access.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        self.cell.with(f)
    }

    /// Store a new value and notify. A tracked access.
    ///
    /// Notification always fires, even when the new value equals the old.
    pub fn set(&self, value: T) -> Result<(), ReactError> {
        self.track();
        self.cell.set(value)
    }

    /// Store a new value and notify without consulting the observer stack.
    ///
    /// Use this when writing from inside an observer that must not become
    /// a dependent of its own output.
    pub fn set_untracked(&self, value: T) -> Result<(), ReactError> {
        self.cell.set(value)
    }

    /// Open a batched-mutation session on the signal's cell. A tracked
    /// access.
    pub fn session(&self) -> Result<Session<T>, ReactError> {
        self.track();
        self.cell.session()
    }

    /// A sharable handle to the underlying cell. Accesses through the
    /// handle are not tracked.
    pub fn ref_handle(&self) -> RefHandle<T> {
        self.cell.handle()
    }

    /// Wire this signal to the observer currently on top of the runtime's
    /// stack, if there is one and it has not subscribed during its current
    /// run.
    ///
    /// The registered listener only upgrades a weak observer reference and
    /// schedules it; it never executes the effect. The unsubscribe action
    /// recorded into the observer captures the listener token plus a weak
    /// cell handle, so teardown is a safe no-op if either side is gone.
    fn track(&self) {
        let Some(observer) = self.runtime.top() else {
            return;
        };
        if observer.is_subscribed(self.id) {
            return;
        }

        let runtime = self.runtime.clone();
        let weak_observer = Arc::downgrade(&observer);
        let token = self.cell.react(move |_| {
            if let Some(observer) = weak_observer.upgrade() {
                runtime.schedule(&observer);
            }
        });

        let handle = self.cell.downgrade();
        observer.add_subscription(
            self.id,
            Box::new(move || {
                if let Some(cell) = handle.lock() {
                    cell.unreact(token);
                }
            }),
        );
    }
}

/// A signal maintained by re-evaluating a compute function.
///
/// Construction immediately runs an observer that evaluates `compute`,
/// auto-subscribing to exactly the signals the function read, and writes
/// the result into the computed signal's own cell. Each re-run re-derives
/// the dependency set from scratch, so dependencies may differ between
/// runs. The closing write is untracked: the maintaining observer never
/// becomes a dependent of its own output.
///
/// Reads through [`ComputedSignal::get`] are tracked, so computed signals
/// compose: an observer reading one is re-run (after a drain) when the
/// computed value is rewritten.
pub struct ComputedSignal<T> {
    signal: Arc<Signal<T>>,
    _observatory: Observatory,
}

impl<T: Clone + Default + Send + 'static> ComputedSignal<T> {
    /// Create a computed signal maintained by `compute`.
    ///
    /// `compute` runs once before this returns, so the `T::default()`
    /// placeholder is never observable.
    pub fn new(runtime: Runtime, compute: impl Fn() -> T + Send + Sync + 'static) -> Self {
        let signal = Arc::new(Signal::new(runtime.clone(), T::default()));
        let observatory = Observatory::new(runtime);
        let target = Arc::downgrade(&signal);
        observatory.react_to_changes(move || {
            let value = compute();
            if let Some(signal) = target.upgrade() {
                let _ = signal.set_untracked(value);
            }
        });
        Self {
            signal,
            _observatory: observatory,
        }
    }

    /// Clone of the current computed value. A tracked access.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// The underlying signal, for sharing or handle creation.
    pub fn signal(&self) -> &Arc<Signal<T>> {
        &self.signal
    }

    /// The computed signal's process-unique identity.
    pub fn id(&self) -> SignalId {
        self.signal.id()
    }
}
