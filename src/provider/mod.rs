//! Service provider module for dependency injection.
//!
//! This module contains the root [`ServiceProvider`] (the composition root,
//! built once at process start) and the per-call [`Lifecycle`] resolvers that
//! delegate singleton lookups back to it.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::cache::Resource;
use crate::error::{DiError, DiResult};
use crate::internal::with_circular_guard;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::observer::Observers;
use crate::registration::{AnyArc, Registration, Registry};
use crate::teardown;
use crate::traits::ResolverCore;

pub mod context;
pub mod lifecycle;
pub use context::ResolverContext;
pub use lifecycle::Lifecycle;

/// Root resolver shared by every lifecycle.
///
/// Owns the registry, the singleton instances and the observers. Cloning is
/// cheap (`Arc` internally) and every clone refers to the same singletons.
///
/// # Examples
///
/// ```
/// use ferrous_worker_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Engine;
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton_factory::<Engine, _>(|_| Engine);
///
/// let provider = collection.build();
/// let a = provider.begin_lifecycle().get_required::<Engine>();
/// let b = provider.begin_lifecycle().get_required::<Engine>();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    pub(crate) registry: Registry,
    pub(crate) observers: Observers,
    /// Singleton resources in creation order
    pub(crate) resources: Mutex<Vec<Resource>>,
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry, observers: Observers) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                registry,
                observers,
                resources: Mutex::new(Vec::new()),
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    /// Starts a new lifecycle with an empty scoped cache.
    ///
    /// Scoped services resolved through the returned lifecycle are cached in
    /// it and released by [`Lifecycle::close`].
    pub fn begin_lifecycle(&self) -> Lifecycle {
        Lifecycle::new(self.clone())
    }

    /// Returns true if a registration exists for `key`.
    pub fn is_registered(&self, key: &Key) -> bool {
        self.inner.registry.contains_key(key)
    }

    /// Number of registered keys.
    pub fn registration_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Closes singleton resources in creation order.
    ///
    /// Intended for process shutdown. Each resource is closed once; calling
    /// this again only closes singletons created since the previous call.
    pub async fn close_all(&self) {
        let resources = std::mem::take(&mut *self.inner.resources.lock());
        teardown::sweep(resources).await;
    }

    /// Blocking variant of [`close_all`](Self::close_all); async resources are skipped.
    pub fn close_all_blocking(&self) {
        let resources = std::mem::take(&mut *self.inner.resources.lock());
        teardown::sweep_blocking(resources);
    }

    /// Resolves a singleton, constructing it at most once.
    ///
    /// The slot lock is held while the factory runs, so concurrent first
    /// access from several lifecycles waits for the first construction.
    /// Singleton factories always resolve from the root.
    pub(crate) fn resolve_singleton(&self, reg: &Registration, key: &Key) -> DiResult<AnyArc> {
        let Some(slot) = &reg.single_runtime else {
            return Err(DiError::WrongLifetime("Registration has no singleton slot"));
        };

        let mut guard = slot.lock();
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }

        let value = self.construct(self, reg, key)?;
        if let Some(handle) = reg.capability.and_then(|cap| cap(&value)) {
            self.inner.resources.lock().push(Resource::new(key.display_name(), handle));
        }
        *guard = Some(value.clone());
        Ok(value)
    }

    /// Runs the registration's factory against `resolver`, notifying observers.
    pub(crate) fn construct(
        &self,
        resolver: &dyn ResolverCore,
        reg: &Registration,
        key: &Key,
    ) -> DiResult<AnyArc> {
        let ctx = ResolverContext::new(resolver);
        let observers = &self.inner.observers;
        if !observers.has_observers() {
            return (reg.ctor)(&ctx);
        }

        let start = Instant::now();
        observers.resolving(key);
        let result = (reg.ctor)(&ctx);
        match &result {
            Ok(_) => observers.resolved(key, start.elapsed()),
            Err(err) => observers.provider_failed(key, err),
        }
        result
    }

    fn resolve_any_impl(&self, key: &Key) -> DiResult<AnyArc> {
        let name = key.display_name();

        let Some(reg) = self.inner.registry.get(key) else {
            return Err(DiError::NotFound(name));
        };
        if reg.ambient {
            return Err(DiError::MissingAmbient(name));
        }

        match reg.lifetime {
            Lifetime::Singleton => self.resolve_singleton(reg, key),
            Lifetime::Scoped => {
                Err(DiError::WrongLifetime("Cannot resolve scoped service from root provider"))
            }
            Lifetime::Transient => self.construct(self, reg, key),
        }
    }
}

impl Clone for ServiceProvider {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.inner.registry.len())
            .finish()
    }
}

impl Drop for ServiceProvider {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            if let Some(resources) = self.inner.resources.try_lock() {
                if !resources.is_empty() {
                    tracing::warn!(
                        count = resources.len(),
                        "ServiceProvider dropped with unclosed singleton resources; call close_all() before dropping"
                    );
                }
            }
        }
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        with_circular_guard(key.display_name(), || self.resolve_any_impl(key))
    }
}
