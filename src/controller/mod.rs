//! Screen state holders.
//!
//! Each controller keeps its state in a `watch` channel: every mutation goes
//! through `send_modify`, and observers `subscribe()` to the latest value.

pub mod add;
pub mod detail;
pub mod list;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
