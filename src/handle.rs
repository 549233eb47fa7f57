//! Non-owning references to a cell: weak handles, lock guards, and the
//! sharable [`RefHandle`] proxy.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::cell::CellCore;
use crate::{ListenerToken, ReactError, Session};

/// A non-owning reference to a cell.
///
/// Locking yields a [`CellGuard`] while the cell is alive and `None` once
/// it has been dropped, so a dead parent is always an observable absence
/// rather than a crash.
pub struct WeakHandle<T> {
    core: Weak<CellCore<T>>,
}

impl<T> WeakHandle<T> {
    pub(crate) fn new(core: Weak<CellCore<T>>) -> Self {
        Self { core }
    }

    /// Atomically attempt to obtain the cell.
    ///
    /// A successful lock pins the cell's shared state for the guard's
    /// lifetime, so the cell cannot be torn down mid-use.
    pub fn lock(&self) -> Option<CellGuard<T>> {
        self.core.upgrade().map(|core| CellGuard { core })
    }
}

impl<T> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

/// A successfully locked cell reference.
///
/// Exposes the full cell contract; the underlying state stays valid for as
/// long as the guard is held, even if the owning [`Cell`](crate::Cell) is
/// dropped concurrently.
pub struct CellGuard<T> {
    core: Arc<CellCore<T>>,
}

impl<T> CellGuard<T> {
    /// Clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.core.get()
    }

    /// Borrow the current value under the cell's lock.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.core.with(f)
    }

    /// Store a new value and run one notification round.
    pub fn set(&self, value: T) -> Result<(), ReactError>
    where
        T: Clone,
    {
        self.core.set(value)
    }

    /// Append a change listener.
    pub fn react(&self, f: impl Fn(&T) + Send + Sync + 'static) -> ListenerToken {
        self.core.react(f)
    }

    /// Remove a listener. No-op if the token is absent.
    pub fn unreact(&self, token: ListenerToken) {
        self.core.unreact(token)
    }

    /// True while the calling thread is inside the cell's own notification.
    pub fn is_notifying(&self) -> bool {
        self.core.is_notifying()
    }

    /// Open a batched-mutation session on the cell.
    pub fn session(&self) -> Result<Session<T>, ReactError>
    where
        T: Clone,
    {
        Session::open(&self.core)
    }

    pub(crate) fn end_session(&self, thread: std::thread::ThreadId) {
        self.core.end_session(thread)
    }
}

/// A sharable, closure-capturable proxy to a cell.
///
/// Every operation goes through a weak lock: once the cell is dropped,
/// reads yield `None`, writes yield [`ReactError::CellDropped`], and
/// listener registration yields `None`. The handle tracks every listener
/// token it registered and unsubscribes them all on drop, so listeners
/// never outlive their logical owner.
///
/// Cloning yields a new handle to the same cell with an **empty** owned
/// token set: subscriptions are not transferred to the clone. This exists
/// so a handle can be captured by `Fn` closures without inheriting (or
/// double-releasing) the original's listeners.
pub struct RefHandle<T> {
    handle: WeakHandle<T>,
    owned: Mutex<Vec<ListenerToken>>,
}

impl<T> RefHandle<T> {
    pub(crate) fn new(handle: WeakHandle<T>) -> Self {
        Self {
            handle,
            owned: Mutex::new(Vec::new()),
        }
    }

    /// Clone of the current value, or `None` if the cell is gone.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.handle.lock().map(|cell| cell.get())
    }

    /// Borrow the current value, or `None` if the cell is gone.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.handle.lock().map(|cell| cell.with(f))
    }

    /// Store a new value and run one notification round.
    pub fn set(&self, value: T) -> Result<(), ReactError>
    where
        T: Clone,
    {
        match self.handle.lock() {
            Some(cell) => cell.set(value),
            None => Err(ReactError::CellDropped),
        }
    }

    /// Append a change listener owned by this handle, or `None` if the cell
    /// is gone. The listener is removed when this handle is dropped.
    pub fn react(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Option<ListenerToken> {
        let cell = self.handle.lock()?;
        let token = cell.react(f);
        self.owned.lock().push(token);
        Some(token)
    }

    /// Remove a listener registered through this handle. No-op if the token
    /// is absent or the cell is gone.
    pub fn unreact(&self, token: ListenerToken) {
        if let Some(cell) = self.handle.lock() {
            cell.unreact(token);
            self.owned.lock().retain(|owned| *owned != token);
        }
    }

    /// Open a batched-mutation session on the cell.
    pub fn session(&self) -> Result<Session<T>, ReactError>
    where
        T: Clone,
    {
        match self.handle.lock() {
            Some(cell) => cell.session(),
            None => Err(ReactError::CellDropped),
        }
    }

    /// Lock the underlying cell directly.
    pub fn lock(&self) -> Option<CellGuard<T>> {
        self.handle.lock()
    }
}

impl<T> Clone for RefHandle<T> {
    fn clone(&self) -> Self {
        // Subscriptions are deliberately not copied over.
        Self::new(self.handle.clone())
    }
}

impl<T> Drop for RefHandle<T> {
    fn drop(&mut self) {
        if let Some(cell) = self.handle.lock() {
            for token in self.owned.get_mut().drain(..) {
                cell.unreact(token);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Cell;

    #[test]
    fn test_weak_handle_reports_absence() {
        let cell = Cell::new(7);
        let weak = cell.downgrade();
        assert_eq!(weak.lock().map(|c| c.get()), Some(7));
        drop(cell);
        assert!(weak.lock().is_none());
    }

    #[test]
    fn test_guard_pins_the_cell() {
        let cell = Cell::new(7);
        let weak = cell.downgrade();
        let guard = weak.lock().unwrap();
        drop(cell);
        // The guard keeps the state alive until it is released.
        assert_eq!(guard.get(), 7);
        drop(guard);
        assert!(weak.lock().is_none());
    }
}
