//! Worker host integration.
//!
//! A worker host (an RPC consumer, an event dispatcher, an HTTP server)
//! calls into a service through three hooks: once when the service is set up,
//! and at the beginning and end of every unit of work. [`WorkerInjector`] maps
//! those hooks onto the container:
//!
//! | host hook             | injector                                   |
//! |-----------------------|--------------------------------------------|
//! | dependency setup      | [`WorkerInjector::setup`]                  |
//! | lifecycle begin       | [`WorkerInjector::begin`]                  |
//! | lifecycle end         | [`WorkerInjector::end`] / [`end_blocking`] |
//!
//! [`run`](WorkerInjector::run) and [`dispatch`](WorkerInjector::dispatch)
//! combine begin and end so teardown always runs, including when the unit of
//! work fails, panics or is cancelled.
//!
//! [`end_blocking`]: WorkerInjector::end_blocking

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use tracing::Instrument;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::decoration::Entrypoints;
use crate::error::DiResult;
use crate::provider::{Lifecycle, ServiceProvider};
use crate::ServiceCollection;

/// Identity of one worker call, bound as an ambient value of its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerContext {
    pub service_name: String,
    pub entrypoint: String,
    /// Unique per call; a UUID v4 unless the host supplies its own.
    pub call_id: String,
    /// Caller metadata such as headers or an originating call chain.
    pub metadata: HashMap<String, String>,
}

impl WorkerContext {
    pub fn new(service_name: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            entrypoint: entrypoint.into(),
            call_id: Uuid::new_v4().to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Binds a [`ServiceProvider`] to a worker host's lifecycle hooks.
///
/// `E` is the triggering event (an inbound request or message) and `C` the
/// lifecycle context. Both are ambient: they can be injected into any
/// scoped factory or entry handler, but only inside a lifecycle started by
/// [`begin`](Self::begin).
///
/// # Examples
///
/// ```
/// use ferrous_worker_di::{
///     decorate, Dep, Entrypoints, ServiceCollection, ServiceConfig, WorkerContext, WorkerInjector,
/// };
///
/// struct Request { path: String }
///
/// struct Greeter { prefix: String }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<Greeter, _>(|r| {
///     use ferrous_worker_di::Resolver;
///     let config = r.get_required::<ServiceConfig>();
///     Greeter { prefix: config.get_string_or("greeting", "hello") }
/// });
///
/// let injector = WorkerInjector::<Request>::setup(services, ServiceConfig::new());
///
/// let mut entrypoints = Entrypoints::<(), String>::new();
/// entrypoints.register(
///     "greet",
///     decorate(|(): (), req: Dep<Request>, greeter: Dep<Greeter>| format!("{} {}", greeter.prefix, req.path)),
/// );
///
/// let out = injector
///     .dispatch(
///         &entrypoints,
///         "greet",
///         WorkerContext::new("greeter", "greet"),
///         Some(Request { path: "/world".into() }),
///         (),
///     )
///     .unwrap();
/// assert_eq!(out, "hello /world");
/// ```
pub struct WorkerInjector<E, C = WorkerContext> {
    provider: ServiceProvider,
    _marker: PhantomData<fn() -> (E, C)>,
}

impl<E, C> WorkerInjector<E, C>
where
    E: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    /// Dependency setup hook: builds the root provider.
    ///
    /// Declares `E` and `C` as ambient keys and registers `config` as a
    /// singleton. These registrations are applied after the caller's, so they
    /// replace any binding the collection already has for those types.
    pub fn setup(mut services: ServiceCollection, config: ServiceConfig) -> Self {
        services.add_ambient::<E>();
        services.add_ambient::<C>();
        services.add_singleton(config);

        let provider = services.build();
        tracing::debug!(
            event = std::any::type_name::<E>(),
            context = std::any::type_name::<C>(),
            registrations = provider.registration_count(),
            "worker injector ready"
        );
        Self::from_provider(provider)
    }

    /// Wraps a provider that already declares `E` and `C` as ambient keys.
    pub fn from_provider(provider: ServiceProvider) -> Self {
        Self {
            provider,
            _marker: PhantomData,
        }
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// Lifecycle begin hook.
    ///
    /// Starts a lifecycle with `context` bound, and `event` if the call was
    /// triggered by one.
    pub fn begin(&self, context: C, event: Option<E>) -> Lifecycle {
        let lifecycle = self.provider.begin_lifecycle();
        lifecycle.bind_ambient(context);
        if let Some(event) = event {
            lifecycle.bind_ambient(event);
        }
        tracing::debug!(lifecycle = lifecycle.id(), "worker lifecycle begin");
        lifecycle
    }

    /// Lifecycle end hook: runs the teardown sweep.
    pub async fn end(&self, lifecycle: &Lifecycle) {
        lifecycle.close().await;
        tracing::debug!(lifecycle = lifecycle.id(), "worker lifecycle end");
    }

    /// Blocking lifecycle end hook; async resources are skipped.
    pub fn end_blocking(&self, lifecycle: &Lifecycle) {
        lifecycle.close_blocking();
        tracing::debug!(lifecycle = lifecycle.id(), "worker lifecycle end");
    }

    /// Runs one unit of work inside a fresh lifecycle.
    ///
    /// The lifecycle is bound as the task's current lifecycle while `work`
    /// runs and is always torn down afterwards. If `work` panics or the
    /// returned future is dropped before completion, the blocking sweep runs
    /// from a drop guard. The teardown outcome never changes the result.
    pub async fn run<F, Fut, R>(&self, context: C, event: Option<E>, work: F) -> R
    where
        F: FnOnce(Lifecycle) -> Fut,
        Fut: Future<Output = R>,
    {
        let lifecycle = self.begin(context, event);
        let guard = TeardownGuard::new(lifecycle.clone());
        let span = tracing::debug_span!("worker", lifecycle = lifecycle.id());

        let output = lifecycle
            .scope(work(lifecycle.clone()))
            .instrument(span)
            .await;

        self.end(&lifecycle).await;
        drop(guard);
        output
    }

    /// Synchronously runs the entrypoint `name` inside a fresh lifecycle.
    pub fn dispatch<Args, R>(
        &self,
        entrypoints: &Entrypoints<Args, R>,
        name: &str,
        context: C,
        event: Option<E>,
        args: Args,
    ) -> DiResult<R>
    where
        Args: 'static,
        R: 'static,
    {
        let lifecycle = self.begin(context, event);
        let guard = TeardownGuard::new(lifecycle.clone());

        let result = lifecycle.sync_scope(|| entrypoints.dispatch(name, &lifecycle, args));

        self.end_blocking(&lifecycle);
        drop(guard);
        result
    }

    /// Process shutdown: closes singleton resources.
    pub async fn stop(&self) {
        tracing::debug!("worker injector stopping");
        self.provider.close_all().await;
    }
}

impl<E, C> Clone for WorkerInjector<E, C> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E, C> fmt::Debug for WorkerInjector<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerInjector")
            .field("event", &std::any::type_name::<E>())
            .field("context", &std::any::type_name::<C>())
            .field("provider", &self.provider)
            .finish()
    }
}

/// Runs the blocking sweep if a unit of work exits before its end hook ran.
struct TeardownGuard {
    lifecycle: Lifecycle,
}

impl TeardownGuard {
    fn new(lifecycle: Lifecycle) -> Self {
        Self { lifecycle }
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if !self.lifecycle.is_closed() {
            tracing::warn!(
                lifecycle = self.lifecycle.id(),
                "unit of work ended abnormally; running blocking teardown"
            );
            self.lifecycle.close_blocking();
        }
    }
}
