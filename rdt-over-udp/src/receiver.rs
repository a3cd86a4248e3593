//! Delivery callbacks.
//!
//! A [`Receiver`] is handed every application payload an engine delivers, in
//! order, on the endpoint's worker task.  Any `Fn(&[u8]) + Send + Sync`
//! closure is a receiver.  Callbacks must not block; the receive loop stalls
//! until they return.  A callback that panics is logged and skipped; the
//! remaining callbacks still run.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// Upcall for delivered payloads.
pub trait Receiver: Send + Sync {
    fn receive(&self, payload: &[u8]);
}

impl<F> Receiver for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn receive(&self, payload: &[u8]) {
        self(payload)
    }
}

/// The set of callbacks registered on one endpoint.
///
/// Cheap to clone; clones share the same registrations.
#[derive(Clone, Default)]
pub struct Receivers {
    inner: Arc<Mutex<Vec<Arc<dyn Receiver>>>>,
}

impl fmt::Debug for Receivers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receivers").field("len", &self.len()).finish()
    }
}

impl Receivers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, receiver: Arc<dyn Receiver>) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(receiver);
    }

    /// Invoke every callback with `payload`, in registration order.
    ///
    /// The registry is snapshotted first, so a callback may register or
    /// clear receivers without deadlocking.
    pub fn notify(&self, payload: &[u8]) {
        let snapshot: Vec<_> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for receiver in snapshot {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| receiver.receive(payload))) {
                log::error!("delivery callback panicked: {}", panic_message(&*panic));
            }
        }
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
