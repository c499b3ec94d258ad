//! Diagnostic observers for resolution events.
//!
//! Observers are notified around every factory invocation. They are only
//! called when a factory actually runs; cache hits are not reported.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::Key;

/// Observer trait for dependency injection resolution events.
///
/// Observer calls are made synchronously during resolution. Keep
/// implementations lightweight.
///
/// # Examples
///
/// ```
/// use ferrous_worker_di::{DiObserver, DiError, Key, ServiceCollection};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver(AtomicUsize);
///
/// impl DiObserver for CountingObserver {
///     fn resolving(&self, _key: &Key) {}
///     fn resolved(&self, _key: &Key, _duration: Duration) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
///     fn provider_failed(&self, _key: &Key, _error: &DiError) {}
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(CountingObserver::default()));
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before a factory runs.
    fn resolving(&self, key: &Key);

    /// Called after a factory returned an instance.
    fn resolved(&self, key: &Key, duration: Duration);

    /// Called after a factory returned an error.
    fn provider_failed(&self, key: &Key, error: &DiError);
}

/// Container for registered observers.
#[derive(Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &Key) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    #[inline]
    pub(crate) fn provider_failed(&self, key: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.provider_failed(key, error);
        }
    }
}

/// Built-in observer that emits `tracing` events.
///
/// Successful constructions are logged at `DEBUG`, failures at `WARN`.
///
/// ```
/// use ferrous_worker_di::{ServiceCollection, TracingObserver};
/// use std::sync::Arc;
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(TracingObserver::new()));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl DiObserver for TracingObserver {
    fn resolving(&self, key: &Key) {
        tracing::trace!(service = key.display_name(), "constructing");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        tracing::debug!(service = key.display_name(), ?duration, "constructed");
    }

    fn provider_failed(&self, key: &Key, error: &DiError) {
        tracing::warn!(service = key.display_name(), %error, "provider failed");
    }
}
