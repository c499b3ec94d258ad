//! Per-lifecycle instance cache.
//!
//! A [`ScopedCache`] belongs to exactly one lifecycle and holds at most one
//! instance per key. Entries keep their first-cached order, which is the
//! order the teardown sweep closes resources in.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::registration::{AnyArc, CloseCapability, sync_capability};
use crate::teardown;
use crate::traits::{AsyncCloseable, Closeable};

#[derive(Clone)]
pub(crate) enum CloseHandle {
    Sync(Arc<dyn Closeable>),
    Async(Arc<dyn AsyncCloseable>),
}

/// A cached instance that exposes the close capability.
#[derive(Clone)]
pub struct Resource {
    type_name: &'static str,
    pub(crate) handle: CloseHandle,
}

impl Resource {
    pub(crate) fn new(type_name: &'static str, handle: CloseHandle) -> Self {
        Self { type_name, handle }
    }

    /// Type name of the resource, used when reporting close failures.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True if the resource can only be closed by the async sweep.
    pub fn is_async(&self) -> bool {
        matches!(self.handle, CloseHandle::Async(_))
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("type_name", &self.type_name)
            .field("async", &self.is_async())
            .finish()
    }
}

struct CacheEntry {
    value: AnyArc,
    resource: Option<Resource>,
}

/// At-most-once instance cache for a single lifecycle.
///
/// The entry lock is only held for lookups and inserts, never while a
/// provider runs, so providers may resolve other keys from the same cache.
/// Concurrent callers for the same key wait on that key's construction slot
/// and receive the first caller's instance. A provider must not resolve its
/// own key from the same cache.
///
/// # Examples
///
/// ```
/// use ferrous_worker_di::{ScopedCache, key_of_type};
/// use std::sync::Arc;
///
/// let cache = ScopedCache::new();
/// let key = key_of_type::<String>();
///
/// let a = cache.resolve(&key, || Ok(Arc::new("config".to_string()))).unwrap();
/// let b = cache.resolve(&key, || unreachable!("cached")).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Default)]
pub struct ScopedCache {
    entries: Mutex<Entries>,
    /// Keys whose provider is running. Never locked together with `entries`.
    building: Mutex<HashMap<Key, Arc<Mutex<()>>>>,
}

#[derive(Default)]
struct Entries {
    map: IndexMap<Key, CacheEntry>,
    sealed: bool,
}

impl ScopedCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached instance for `key`, or runs `provider` once and
    /// caches its result.
    ///
    /// If the provider fails the error is returned and nothing is cached, so
    /// a later call for the same key runs the provider again. A sealed cache
    /// returns [`DiError::LifecycleClosed`].
    pub fn resolve<F>(&self, key: &Key, provider: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        self.resolve_resource(key, provider, None)
    }

    /// Typed variant of [`resolve`](Self::resolve) for closeable instances.
    ///
    /// The instance is reported by [`closable_instances`](Self::closable_instances).
    pub fn resolve_closeable<T, F>(&self, key: &Key, provider: F) -> DiResult<Arc<T>>
    where
        T: Closeable,
        F: FnOnce() -> DiResult<Arc<T>>,
    {
        let any = self.resolve_resource(
            key,
            || provider().map(|inst| inst as AnyArc),
            Some(sync_capability::<T> as CloseCapability),
        )?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    pub(crate) fn resolve_resource<F>(
        &self,
        key: &Key,
        provider: F,
        capability: Option<CloseCapability>,
    ) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        if let Some(value) = self.lookup(key)? {
            return Ok(value);
        }

        let slot = self.building.lock().entry(key.clone()).or_default().clone();
        let _building = slot.lock();

        // Another caller may have finished while we waited on the slot
        if let Some(value) = self.lookup(key)? {
            return Ok(value);
        }

        let value = provider()?;
        let resource = capability
            .and_then(|cap| cap(&value))
            .map(|handle| Resource::new(key.display_name(), handle));

        let mut entries = self.entries.lock();
        if entries.sealed {
            drop(entries);
            tracing::warn!(
                service = key.display_name(),
                "instance finished after its lifecycle closed; releasing it now"
            );
            if let Some(resource) = resource {
                teardown::sweep_blocking(vec![resource]);
            }
            return Err(DiError::LifecycleClosed(key.display_name()));
        }
        entries.map.insert(key.clone(), CacheEntry { value: value.clone(), resource });
        drop(entries);

        self.building.lock().remove(key);
        Ok(value)
    }

    /// Cached instance for `key`, or `LifecycleClosed` once sealed.
    pub(crate) fn lookup(&self, key: &Key) -> DiResult<Option<AnyArc>> {
        let entries = self.entries.lock();
        if entries.sealed {
            return Err(DiError::LifecycleClosed(key.display_name()));
        }
        Ok(entries.map.get(key).map(|entry| entry.value.clone()))
    }

    /// Binds an externally created instance, replacing any cached one.
    ///
    /// Bound instances are never treated as resources.
    pub fn insert(&self, key: Key, value: AnyArc) -> Option<AnyArc> {
        self.entries
            .lock()
            .map
            .insert(key, CacheEntry { value, resource: None })
            .map(|old| old.value)
    }

    /// Returns the cached instance for `key` without constructing it.
    pub fn get(&self, key: &Key) -> Option<AnyArc> {
        self.entries.lock().map.get(key).map(|entry| entry.value.clone())
    }

    /// Every cached instance with the close capability, in first-cached order.
    pub fn closable_instances(&self) -> Vec<Resource> {
        Self::resources(&self.entries.lock())
    }

    /// Refuses every later resolution and returns the resources to sweep.
    ///
    /// Instances still under construction when the cache is sealed are
    /// released as soon as their provider returns.
    pub fn seal(&self) -> Vec<Resource> {
        let mut entries = self.entries.lock();
        entries.sealed = true;
        Self::resources(&entries)
    }

    pub fn is_sealed(&self) -> bool {
        self.entries.lock().sealed
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.lock().map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().map.is_empty()
    }

    fn resources(entries: &Entries) -> Vec<Resource> {
        entries
            .map
            .values()
            .filter_map(|entry| entry.resource.clone())
            .collect()
    }
}

impl fmt::Debug for ScopedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("ScopedCache")
            .field("keys", &entries.map.keys().map(Key::display_name).collect::<Vec<_>>())
            .field("sealed", &entries.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::key_of_type;
    use crate::traits::CloseError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Session;
    impl Closeable for Session {
        fn close(&self) -> Result<(), CloseError> {
            Ok(())
        }
    }

    struct Engine;
    impl Closeable for Engine {
        fn close(&self) -> Result<(), CloseError> {
            Ok(())
        }
    }

    #[test]
    fn provider_runs_once_per_key() {
        let cache = ScopedCache::new();
        let calls = AtomicUsize::new(0);
        let key = key_of_type::<u64>();

        for _ in 0..3 {
            cache
                .resolve(&key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(7u64) as AnyArc)
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_provider_leaves_key_unresolved() {
        let cache = ScopedCache::new();
        let key = key_of_type::<u64>();

        let err = cache.resolve(&key, || Err(DiError::NotFound("u64"))).unwrap_err();
        assert!(matches!(err, DiError::NotFound("u64")));
        assert!(!cache.contains(&key));

        let v = cache.resolve(&key, || Ok(Arc::new(1u64) as AnyArc)).unwrap();
        assert_eq!(*v.downcast::<u64>().unwrap(), 1);
    }

    #[test]
    fn closable_instances_keep_insertion_order() {
        let cache = ScopedCache::new();
        cache.resolve_closeable(&key_of_type::<Session>(), || Ok(Arc::new(Session))).unwrap();
        cache.resolve(&key_of_type::<u8>(), || Ok(Arc::new(1u8) as AnyArc)).unwrap();
        cache.resolve_closeable(&key_of_type::<Engine>(), || Ok(Arc::new(Engine))).unwrap();

        let names: Vec<_> = cache
            .closable_instances()
            .iter()
            .map(Resource::type_name)
            .collect();
        assert_eq!(names, vec![std::any::type_name::<Session>(), std::any::type_name::<Engine>()]);
    }

    #[test]
    fn inserted_values_are_not_resources() {
        let cache = ScopedCache::new();
        cache.insert(key_of_type::<Session>(), Arc::new(Session));
        assert!(cache.closable_instances().is_empty());
        assert!(cache.get(&key_of_type::<Session>()).is_some());
    }

    #[test]
    fn concurrent_callers_share_one_construction() {
        let cache = Arc::new(ScopedCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(std::sync::Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (cache, calls, barrier) = (cache.clone(), calls.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    cache
                        .resolve_closeable(&key_of_type::<Session>(), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            Ok(Arc::new(Session))
                        })
                        .unwrap()
                })
            })
            .collect();
        let resolved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(resolved.iter().all(|s| Arc::ptr_eq(s, &resolved[0])));
        assert_eq!(cache.closable_instances().len(), 1);
    }

    #[test]
    fn sealed_cache_refuses_lookups() {
        let cache = ScopedCache::new();
        cache.resolve_closeable(&key_of_type::<Session>(), || Ok(Arc::new(Session))).unwrap();

        assert_eq!(cache.seal().len(), 1);
        assert!(cache.is_sealed());

        let cached = cache.resolve_closeable(&key_of_type::<Session>(), || Ok(Arc::new(Session)));
        assert!(matches!(cached, Err(DiError::LifecycleClosed(_))));
        let fresh = cache.resolve(&key_of_type::<u8>(), || Ok(Arc::new(1u8) as AnyArc));
        assert!(matches!(fresh, Err(DiError::LifecycleClosed(_))));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn resource_finished_after_seal_is_closed_at_once() {
        struct Late(Arc<AtomicUsize>);
        impl Closeable for Late {
            fn close(&self) -> Result<(), CloseError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let closed = Arc::new(AtomicUsize::new(0));
        let cache = ScopedCache::new();
        let result = cache.resolve_closeable(&key_of_type::<Late>(), || {
            assert!(cache.seal().is_empty());
            Ok(Arc::new(Late(closed.clone())))
        });

        assert!(matches!(result, Err(DiError::LifecycleClosed(_))));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }
}
