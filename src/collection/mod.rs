//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type used at composition time
//! to register providers, resources and ambient keys before building the root
//! [`ServiceProvider`].

use std::any::TypeId;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::provider::ResolverContext;
use crate::registration::{async_capability, sync_capability, AnyArc, CloseCapability, Registration, Registry};
use crate::traits::{AsyncCloseable, Closeable};
use crate::ServiceProvider;

pub mod module_system;
pub use module_system::*;

/// Registration table, consumed by [`build`](ServiceCollection::build).
///
/// Registering the same key twice replaces the earlier registration.
pub struct ServiceCollection {
    registry: Registry,
    observers: Observers,
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            observers: Observers::new(),
        }
    }

    // ----- Concrete Type Registrations -----

    /// Registers a singleton instance shared by every lifecycle.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_worker_di::ServiceCollection;
    /// struct Config {
    ///     database_url: String
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".to_string()
    /// });
    /// ```
    pub fn add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> &mut Self {
        let arc: AnyArc = Arc::new(value);
        let ctor = move |_: &ResolverContext| -> DiResult<AnyArc> { Ok(arc.clone()) };
        self.insert(type_key::<T>(), Registration::new(Lifetime::Singleton, Arc::new(ctor)))
    }

    /// Registers a singleton factory that runs on first request.
    ///
    /// The factory runs at most once even when several lifecycles request the
    /// service concurrently. It resolves its own dependencies from the root
    /// provider, so it cannot depend on scoped services.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_worker_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Settings { url: String }
    /// struct Engine { settings: Arc<Settings> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Settings { url: "postgres://localhost".to_string() });
    /// services.add_singleton_factory::<Engine, _>(|resolver| Engine {
    ///     settings: resolver.get_required::<Settings>(),
    /// });
    /// ```
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, move |r| Ok(factory(r)), None)
    }

    /// Registers a factory that runs once per lifecycle.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_worker_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Engine;
    /// struct Session { engine: Arc<Engine> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Engine);
    /// services.add_scoped_factory::<Session, _>(|resolver| Session {
    ///     engine: resolver.get_required::<Engine>(),
    /// });
    /// ```
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, move |r| Ok(factory(r)), None)
    }

    /// Registers a factory that runs on every request.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, move |r| Ok(factory(r)), None)
    }

    // ----- Fallible Registrations -----

    /// Fallible variant of [`add_singleton_factory`](Self::add_singleton_factory).
    ///
    /// A failed factory leaves nothing cached; the next request retries.
    pub fn add_singleton_try_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory, None)
    }

    /// Fallible variant of [`add_scoped_factory`](Self::add_scoped_factory).
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_worker_di::{ServiceCollection, Resolver, DiError};
    /// struct Session;
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_try_factory::<Session, _>(|_| {
    ///     Err(DiError::provider("Session", std::io::Error::other("refused")))
    /// });
    ///
    /// let lifecycle = services.build().begin_lifecycle();
    /// assert!(lifecycle.get::<Session>().is_err());
    /// assert!(lifecycle.cache().is_empty());
    /// ```
    pub fn add_scoped_try_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory, None)
    }

    /// Fallible variant of [`add_transient_factory`](Self::add_transient_factory).
    pub fn add_transient_try_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory, None)
    }

    // ----- Resources -----

    /// Registers a scoped resource closed by the lifecycle's teardown sweep.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_worker_di::{ServiceCollection, Resolver, Closeable, CloseError};
    /// struct Session;
    ///
    /// impl Closeable for Session {
    ///     fn close(&self) -> Result<(), CloseError> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_resource::<Session, _>(|_| Session);
    ///
    /// let lifecycle = services.build().begin_lifecycle();
    /// lifecycle.get_required::<Session>();
    /// assert_eq!(lifecycle.cache().closable_instances().len(), 1);
    /// lifecycle.close_blocking();
    /// ```
    pub fn add_scoped_resource<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Closeable,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, move |r| Ok(factory(r)), Some(sync_capability::<T> as CloseCapability))
    }

    /// Fallible variant of [`add_scoped_resource`](Self::add_scoped_resource).
    pub fn add_scoped_try_resource<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Closeable,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory, Some(sync_capability::<T> as CloseCapability))
    }

    /// Registers a scoped resource whose close is async.
    ///
    /// Only [`Lifecycle::close`](crate::Lifecycle::close) awaits it; the
    /// blocking sweep skips it with a warning.
    pub fn add_scoped_async_resource<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: AsyncCloseable,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, move |r| Ok(factory(r)), Some(async_capability::<T> as CloseCapability))
    }

    /// Registers a scoped trait-object resource.
    ///
    /// The trait must extend [`Closeable`].
    ///
    /// ```rust
    /// # use ferrous_worker_di::{ServiceCollection, Resolver, Closeable, CloseError};
    /// # use std::sync::Arc;
    /// trait Channel: Closeable {
    ///     fn publish(&self, body: &str);
    /// }
    ///
    /// struct AmqpChannel;
    /// impl Closeable for AmqpChannel {
    ///     fn close(&self) -> Result<(), CloseError> { Ok(()) }
    /// }
    /// impl Channel for AmqpChannel {
    ///     fn publish(&self, _body: &str) {}
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_trait_resource::<dyn Channel, _>(|_| Arc::new(AmqpChannel));
    ///
    /// let lifecycle = services.build().begin_lifecycle();
    /// lifecycle.get_required_trait::<dyn Channel>().publish("hello");
    /// assert_eq!(lifecycle.cache().closable_instances().len(), 1);
    /// ```
    pub fn add_scoped_trait_resource<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Closeable,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add_factory(
            Lifetime::Scoped,
            move |r| Ok(factory(r)),
            Some(sync_capability::<Arc<Trait>> as CloseCapability),
        );
        self.rekey_as_trait::<Trait>()
    }

    /// Registers a singleton resource closed by
    /// [`ServiceProvider::close_all`](crate::ServiceProvider::close_all).
    pub fn add_singleton_resource<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Closeable,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, move |r| Ok(factory(r)), Some(sync_capability::<T> as CloseCapability))
    }

    /// Registers a singleton resource whose close is async.
    pub fn add_singleton_async_resource<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: AsyncCloseable,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, move |r| Ok(factory(r)), Some(async_capability::<T> as CloseCapability))
    }

    fn add_factory<T, F>(
        &mut self,
        lifetime: Lifetime,
        factory: F,
        capability: Option<CloseCapability>,
    ) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor = move |r: &ResolverContext| -> DiResult<AnyArc> {
            factory(r).map(|value| Arc::new(value) as AnyArc)
        };
        let mut registration = Registration::new(lifetime, Arc::new(ctor));
        if let Some(capability) = capability {
            registration = registration.with_capability(capability);
        }
        self.insert(type_key::<T>(), registration)
    }

    /// Moves the registration just made for `Arc<Trait>` under the trait key.
    fn rekey_as_trait<Trait: ?Sized + 'static>(&mut self) -> &mut Self {
        if let Some(registration) = self.registry.remove(&type_key::<Arc<Trait>>()) {
            self.registry.insert(Key::Trait(std::any::type_name::<Trait>()), registration);
        }
        self
    }

    // ----- Trait Registrations -----

    /// Registers a singleton trait implementation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_worker_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// trait Clock: Send + Sync {
    ///     fn now(&self) -> u64;
    /// }
    ///
    /// struct SystemClock;
    /// impl Clock for SystemClock {
    ///     fn now(&self) -> u64 { 0 }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait::<dyn Clock>(Arc::new(SystemClock));
    /// ```
    pub fn add_singleton_trait<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + 'static + Send + Sync,
    {
        // Trait objects are stored as Arc<Arc<dyn Trait>>
        let any_arc: AnyArc = Arc::new(value);
        let ctor = move |_: &ResolverContext| -> DiResult<AnyArc> { Ok(any_arc.clone()) };
        self.insert(
            Key::Trait(std::any::type_name::<T>()),
            Registration::new(Lifetime::Singleton, Arc::new(ctor)),
        )
    }

    /// Registers a singleton trait factory.
    pub fn add_singleton_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add_trait_factory_impl(Lifetime::Singleton, factory)
    }

    /// Registers a trait factory that runs once per lifecycle.
    pub fn add_scoped_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add_trait_factory_impl(Lifetime::Scoped, factory)
    }

    /// Registers a trait factory that runs on every request.
    pub fn add_transient_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add_trait_factory_impl(Lifetime::Transient, factory)
    }

    fn add_trait_factory_impl<Trait, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        let ctor = move |r: &ResolverContext| -> DiResult<AnyArc> { Ok(Arc::new(factory(r))) };
        self.insert(
            Key::Trait(std::any::type_name::<Trait>()),
            Registration::new(lifetime, Arc::new(ctor)),
        )
    }

    // ----- Ambient Keys -----

    /// Declares `T` as an ambient dependency of every lifecycle.
    ///
    /// Ambient values (the triggering event, the worker context) are never
    /// constructed by the container. The worker integration binds them with
    /// [`Lifecycle::bind_ambient`](crate::Lifecycle::bind_ambient) when a
    /// lifecycle begins. Resolving the key before it is bound, or from the
    /// root provider, fails with [`DiError::MissingAmbient`].
    ///
    /// ```rust
    /// # use ferrous_worker_di::{ServiceCollection, Resolver};
    /// #[derive(Debug)]
    /// struct Event { body: String }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_ambient::<Event>();
    ///
    /// let lifecycle = services.build().begin_lifecycle();
    /// assert!(lifecycle.get::<Event>().unwrap_err().is_missing_ambient());
    ///
    /// lifecycle.bind_ambient(Event { body: "ping".to_string() });
    /// assert_eq!(lifecycle.get_required::<Event>().body, "ping");
    /// ```
    pub fn add_ambient<T: 'static + Send + Sync>(&mut self) -> &mut Self {
        let ctor = |_: &ResolverContext| -> DiResult<AnyArc> {
            Err(DiError::MissingAmbient(std::any::type_name::<T>()))
        };
        self.insert(
            type_key::<T>(),
            Registration::new(Lifetime::Scoped, Arc::new(ctor)).ambient(),
        )
    }

    // ----- Diagnostics -----

    /// Adds an observer notified around every factory invocation.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Returns true if a registration exists for `key`.
    pub fn is_registered(&self, key: &Key) -> bool {
        self.registry.contains_key(key)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    /// Builds the root provider. The collection is consumed.
    pub fn build(self) -> ServiceProvider {
        tracing::debug!(registrations = self.registry.len(), "building service provider");
        ServiceProvider::new(self.registry, self.observers)
    }

    fn insert(&mut self, key: Key, registration: Registration) -> &mut Self {
        if self.registry.contains_key(&key) {
            tracing::debug!(service = key.display_name(), "replacing earlier registration");
        }
        self.registry.insert(key, registration);
        self
    }
}

#[inline]
fn type_key<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}
