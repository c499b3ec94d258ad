//! Service registration types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::CloseHandle;
use crate::error::DiResult;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::traits::{AsyncCloseable, Closeable};

// ResolverContext is defined in provider module
pub(crate) use crate::provider::ResolverContext;

/// Type-erased `Arc` used for storage.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Extracts the close handle from a stored instance.
pub(crate) type CloseCapability = fn(&AnyArc) -> Option<CloseHandle>;

pub(crate) fn sync_capability<T: Closeable>(any: &AnyArc) -> Option<CloseHandle> {
    any.clone()
        .downcast::<T>()
        .ok()
        .map(|inst| CloseHandle::Sync(inst as Arc<dyn Closeable>))
}

pub(crate) fn async_capability<T: AsyncCloseable>(any: &AnyArc) -> Option<CloseHandle> {
    any.clone()
        .downcast::<T>()
        .ok()
        .map(|inst| CloseHandle::Async(inst as Arc<dyn AsyncCloseable>))
}

/// Service registration with lifetime and constructor
pub(crate) struct Registration {
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    /// Set when the instance is a resource swept at lifecycle end
    pub(crate) capability: Option<CloseCapability>,
    /// Ambient values are bound by the worker integration, never constructed
    pub(crate) ambient: bool,
    /// Singleton slot. The lock is held while the factory runs so concurrent
    /// first access constructs exactly one instance.
    pub(crate) single_runtime: Option<Mutex<Option<AnyArc>>>,
}

impl Registration {
    pub(crate) fn new(lifetime: Lifetime, ctor: Ctor) -> Self {
        let single_runtime = match lifetime {
            Lifetime::Singleton => Some(Mutex::new(None)),
            _ => None,
        };

        Self {
            lifetime,
            ctor,
            capability: None,
            ambient: false,
            single_runtime,
        }
    }

    pub(crate) fn with_capability(mut self, capability: CloseCapability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub(crate) fn ambient(mut self) -> Self {
        self.ambient = true;
        self
    }
}

/// Service registry holding all registrations
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<Key, Registration>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a registration, replacing any earlier one for the same key.
    pub(crate) fn insert(&mut self, key: Key, registration: Registration) {
        self.entries.insert(key, registration);
    }

    #[inline(always)]
    pub(crate) fn get(&self, key: &Key) -> Option<&Registration> {
        self.entries.get(key)
    }

    pub(crate) fn remove(&mut self, key: &Key) -> Option<Registration> {
        self.entries.remove(key)
    }

    #[inline(always)]
    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
