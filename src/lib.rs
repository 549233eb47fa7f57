#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

mod cell;
mod error;
mod handle;
mod observatory;
mod observer;
mod runtime;
mod session;
mod signal;

pub use cell::{Cell, ListenerToken};
pub use error::ReactError;
pub use handle::{CellGuard, RefHandle, WeakHandle};
pub use observatory::Observatory;
pub use observer::Observer;
pub use runtime::Runtime;
pub use session::Session;
pub use signal::{ComputedSignal, Signal, SignalId};
