//! In-memory doubles for every booking interface.
//!
//! Used by unit and integration tests. Each double records what it was asked
//! to do; [`CallLog`] can be shared between doubles to observe call order
//! across them.

pub mod credentials;
pub mod gateway;
pub mod notification;
pub mod scanner;

pub use credentials::{device_token, MockCredentials};
pub use gateway::MockGateway;
pub use notification::MockNotificationChannel;
pub use scanner::MockScanSource;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Ordered record of calls, shareable between doubles
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call
    pub fn record(&self, call: &'static str) {
        lock(&self.0).push(call);
    }

    /// Calls so far, in order
    #[must_use]
    pub fn entries(&self) -> Vec<&'static str> {
        lock(&self.0).clone()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decrements a live-resource counter when dropped
#[derive(Debug)]
pub(crate) struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    pub(crate) fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
