//! Batched mutation scopes.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::cell::CellCore;
use crate::{ReactError, WeakHandle};

/// RAII scope giving batched mutable access to a cell's value.
///
/// The session clones the value into a private snapshot on open and writes
/// it back with exactly one `set` on drop, so K edits produce one
/// notification round, not K, including K = 0. While the session is open
/// the opening thread is marked as inside the cell's notification, so
/// direct writes to the cell from that thread are rejected just as they
/// would be from inside a listener; the session's own closing write is
/// still allowed.
///
/// The snapshot is private to the session, so reads and writes through it
/// need no synchronization. A session is meant to stay on the thread that
/// opened it. If the cell is dropped mid-session, the closing write is a
/// silent no-op and the edits are discarded.
pub struct Session<T: Clone> {
    handle: WeakHandle<T>,
    /// Taken on drop; `None` only after the closing write.
    snapshot: Option<T>,
    opened_by: ThreadId,
}

impl<T: Clone> Session<T> {
    /// Lock the cell, snapshot its value, and mark the opening thread.
    ///
    /// Fails with [`ReactError::ReentrantMutation`] when opened from inside
    /// the cell's own notification: a session there could otherwise clear
    /// the round's reentrancy mark on close and defeat the guard.
    pub(crate) fn open(core: &Arc<CellCore<T>>) -> Result<Self, ReactError> {
        let snapshot = core.begin_session()?;
        Ok(Self {
            handle: WeakHandle::new(Arc::downgrade(core)),
            snapshot: Some(snapshot),
            opened_by: thread::current().id(),
        })
    }

    /// Replace the session's snapshot wholesale.
    pub fn set(&mut self, value: T) {
        self.snapshot = Some(value);
    }
}

impl<T: Clone> Deref for Session<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.snapshot.as_ref().expect("session snapshot taken before drop")
    }
}

impl<T: Clone> DerefMut for Session<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.snapshot.as_mut().expect("session snapshot taken before drop")
    }
}

impl<T: Clone> Drop for Session<T> {
    fn drop(&mut self) {
        let Some(value) = self.snapshot.take() else {
            return;
        };
        if let Some(cell) = self.handle.lock() {
            cell.end_session(self.opened_by);
            let _ = cell.set(value);
        }
    }
}
