//! The reactive cell: a value, its listeners, and reentrancy bookkeeping.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::{ReactError, RefHandle, Session, WeakHandle};

/// Opaque identifier for a registered listener.
///
/// Tokens are unique per cell for the cell's lifetime and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

pub(crate) type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Shared state behind a cell and all of its handles.
///
/// `Cell` is the unique strong owner; handles hold `Weak` references, so
/// dropping the `Cell` revokes every outstanding handle at once. A guard
/// obtained before the drop pins the state for the guard's lifetime only.
pub(crate) struct CellCore<T> {
    state: Mutex<CellState<T>>,
}

struct CellState<T> {
    value: T,
    /// Registration order is notification order.
    listeners: Vec<(ListenerToken, Listener<T>)>,
    next_token: u64,
    /// Threads currently inside this cell's own notification round.
    notifying: HashSet<ThreadId>,
}

impl<T> CellCore<T> {
    fn new(value: T) -> Self {
        Self {
            state: Mutex::new(CellState {
                value,
                listeners: Vec::new(),
                next_token: 0,
                notifying: HashSet::new(),
            }),
        }
    }

    pub(crate) fn get(&self) -> T
    where
        T: Clone,
    {
        self.state.lock().value.clone()
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.lock().value)
    }

    /// Store a new value and notify every listener, in registration order,
    /// synchronously on the calling thread.
    ///
    /// The listener list is snapshotted under the lock and the lock released
    /// before any callback runs, so additions and removals during an
    /// in-flight round do not affect that round, and a listener touching a
    /// different cell cannot deadlock. A same-thread write from inside this
    /// cell's own round is rejected with [`ReactError::ReentrantMutation`].
    ///
    /// There is no value-equality check: setting a value equal to the
    /// current one still notifies.
    pub(crate) fn set(&self, value: T) -> Result<(), ReactError>
    where
        T: Clone,
    {
        let thread = thread::current().id();
        let snapshot: Vec<Listener<T>> = {
            let mut state = self.state.lock();
            if state.notifying.contains(&thread) {
                drop(state);
                tracing::warn!("rejected cell write from inside its own notification");
                return Err(ReactError::ReentrantMutation);
            }
            state.notifying.insert(thread);
            state.value = value.clone();
            state.listeners.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in &snapshot {
            listener(&value);
        }
        self.state.lock().notifying.remove(&thread);
        Ok(())
    }

    pub(crate) fn react(&self, f: impl Fn(&T) + Send + Sync + 'static) -> ListenerToken {
        let mut state = self.state.lock();
        let token = ListenerToken(state.next_token);
        state.next_token += 1;
        state.listeners.push((token, Arc::new(f)));
        token
    }

    pub(crate) fn unreact(&self, token: ListenerToken) {
        self.state
            .lock()
            .listeners
            .retain(|(existing, _)| *existing != token);
    }

    pub(crate) fn is_notifying(&self) -> bool {
        self.state
            .lock()
            .notifying
            .contains(&thread::current().id())
    }

    /// Mark the calling thread as inside this cell's notification and hand
    /// out a snapshot of the value. Used by [`Session`] so that direct
    /// writes nested under the session are rejected exactly as under `set`.
    pub(crate) fn begin_session(&self) -> Result<T, ReactError>
    where
        T: Clone,
    {
        let mut state = self.state.lock();
        let thread = thread::current().id();
        if state.notifying.contains(&thread) {
            drop(state);
            tracing::warn!("rejected session open from inside the cell's own notification");
            return Err(ReactError::ReentrantMutation);
        }
        state.notifying.insert(thread);
        Ok(state.value.clone())
    }

    /// Remove the session mark placed by [`CellCore::begin_session`].
    ///
    /// Takes the thread explicitly so a session moved to another thread
    /// still unmarks the thread that opened it.
    pub(crate) fn end_session(&self, thread: ThreadId) {
        self.state.lock().notifying.remove(&thread);
    }
}

/// A unit of reactive mutable state: a value plus an ordered listener list.
///
/// Writes notify every listener synchronously on the writing thread, and a
/// listener may freely read or write *other* cells; a same-thread write back
/// into the cell it is reacting to is rejected rather than recursed into.
/// Dropping the cell revokes all outstanding [`WeakHandle`]s and
/// [`RefHandle`]s, which from then on report absence instead of crashing.
pub struct Cell<T> {
    core: Arc<CellCore<T>>,
}

impl<T> Cell<T> {
    /// Create a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            core: Arc::new(CellCore::new(value)),
        }
    }

    /// Clone of the current value, read under the cell's lock.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.core.get()
    }

    /// Borrow the current value under the cell's lock.
    ///
    /// `f` must not call back into this cell; doing so deadlocks.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.core.with(f)
    }

    /// Store a new value and run one notification round.
    ///
    /// See [`ReactError::ReentrantMutation`] for the rejection rule.
    pub fn set(&self, value: T) -> Result<(), ReactError>
    where
        T: Clone,
    {
        self.core.set(value)
    }

    /// Append a change listener. Listeners fire in registration order and
    /// see the value of their own round.
    pub fn react(&self, f: impl Fn(&T) + Send + Sync + 'static) -> ListenerToken {
        self.core.react(f)
    }

    /// Remove a listener. No-op if the token is absent.
    pub fn unreact(&self, token: ListenerToken) {
        self.core.unreact(token)
    }

    /// True while the calling thread is inside this cell's own notification.
    pub fn is_notifying(&self) -> bool {
        self.core.is_notifying()
    }

    /// Open a batched-mutation session. Any number of edits through the
    /// session coalesce into exactly one notification round on drop.
    pub fn session(&self) -> Result<Session<T>, ReactError>
    where
        T: Clone,
    {
        Session::open(&self.core)
    }

    /// A non-owning handle that reports absence once this cell is dropped.
    pub fn downgrade(&self) -> WeakHandle<T> {
        WeakHandle::new(Arc::downgrade(&self.core))
    }

    /// A sharable proxy that owns the lifetime of listeners it registers.
    pub fn handle(&self) -> RefHandle<T> {
        RefHandle::new(self.downgrade())
    }
}
