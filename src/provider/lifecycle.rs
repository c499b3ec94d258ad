//! Per-call lifecycle resolution and teardown.
//!
//! A [`Lifecycle`] is one unit of work: one inbound request or one worker
//! invocation. It owns the [`ScopedCache`] for scoped services and delegates
//! singleton lookups to the root [`ServiceProvider`].

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::ScopedCache;
use crate::error::{DiError, DiResult};
use crate::internal::with_circular_guard;
use crate::key::{key_of_type, Key};
use crate::lifetime::Lifetime;
use crate::registration::AnyArc;
use crate::teardown;
use crate::traits::ResolverCore;
use super::ServiceProvider;

static NEXT_LIFECYCLE_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CURRENT: Lifecycle;
}

/// Resolver for a single worker call.
///
/// # Lifetime Behavior
///
/// - **Singleton**: resolved and cached by the root provider (shared by all lifecycles)
/// - **Scoped**: resolved and cached within this lifecycle
/// - **Transient**: created fresh on every resolution
///
/// Cloning a `Lifecycle` yields another handle to the same cache.
///
/// # Examples
///
/// ```
/// use ferrous_worker_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct RequestId(u64);
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<RequestId, _>(|_| RequestId(1));
///
/// let provider = services.build();
/// let first = provider.begin_lifecycle();
/// let second = provider.begin_lifecycle();
///
/// let a = first.get_required::<RequestId>();
/// assert!(Arc::ptr_eq(&a, &first.get_required::<RequestId>()));
/// assert!(!Arc::ptr_eq(&a, &second.get_required::<RequestId>()));
/// ```
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

struct LifecycleInner {
    id: u64,
    root: ServiceProvider,
    cache: ScopedCache,
    closed: AtomicBool,
}

impl Lifecycle {
    pub(crate) fn new(root: ServiceProvider) -> Self {
        let id = NEXT_LIFECYCLE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(lifecycle = id, "lifecycle started");
        Self {
            inner: Arc::new(LifecycleInner {
                id,
                root,
                cache: ScopedCache::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Process-unique identifier of this lifecycle.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The root provider this lifecycle resolves singletons from.
    pub fn provider(&self) -> &ServiceProvider {
        &self.inner.root
    }

    /// The scoped cache owned by this lifecycle.
    pub fn cache(&self) -> &ScopedCache {
        &self.inner.cache
    }

    /// Binds an ambient value (triggering event, worker context) for this lifecycle.
    ///
    /// The value is placed directly in the scoped cache, replacing whatever
    /// was bound before.
    pub fn bind_ambient<T: Send + Sync + 'static>(&self, value: T) -> &Self {
        self.bind_ambient_arc(Arc::new(value))
    }

    /// Binds an already shared ambient value.
    pub fn bind_ambient_arc<T: Send + Sync + 'static>(&self, value: Arc<T>) -> &Self {
        self.inner.cache.insert(key_of_type::<T>(), value);
        self
    }

    /// True once a teardown sweep has run for this lifecycle.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Runs the teardown sweep over every resource this lifecycle created.
    ///
    /// Only the first call (of this or [`close_blocking`](Self::close_blocking))
    /// sweeps; later calls are no-ops. Once closed, scoped lookups through any
    /// clone of this lifecycle fail with [`DiError::LifecycleClosed`].
    pub async fn close(&self) {
        if self.mark_closed() {
            teardown::sweep(self.inner.cache.seal()).await;
        }
    }

    /// Blocking teardown sweep; async resources are skipped with a warning.
    pub fn close_blocking(&self) {
        if self.mark_closed() {
            teardown::sweep_blocking(self.inner.cache.seal());
        }
    }

    fn mark_closed(&self) -> bool {
        let first = !self.inner.closed.swap(true, Ordering::AcqRel);
        if first {
            tracing::trace!(lifecycle = self.inner.id, "lifecycle closing");
        }
        first
    }

    /// Runs `fut` with this lifecycle bound as the current one for the task.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT.scope(self.clone(), fut).await
    }

    /// Runs `f` with this lifecycle bound as the current one.
    pub fn sync_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(self.clone(), f)
    }

    /// The lifecycle bound to the current task by [`scope`](Self::scope).
    pub fn current() -> DiResult<Lifecycle> {
        CURRENT
            .try_with(|lifecycle| lifecycle.clone())
            .map_err(|_| DiError::NoActiveLifecycle)
    }

    fn resolve_any_impl(&self, key: &Key) -> DiResult<AnyArc> {
        let name = key.display_name();
        let root = &self.inner.root;

        let Some(reg) = root.inner().registry.get(key) else {
            // Ambient values may be bound without a registration.
            return self.inner.cache.lookup(key)?.ok_or(DiError::NotFound(name));
        };

        match reg.lifetime {
            Lifetime::Singleton => root.resolve_singleton(reg, key),
            Lifetime::Scoped => self.inner.cache.resolve_resource(
                key,
                || root.construct(self, reg, key),
                reg.capability,
            ),
            Lifetime::Transient => root.construct(self, reg, key),
        }
    }
}

impl ResolverCore for Lifecycle {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        with_circular_guard(key.display_name(), || self.resolve_any_impl(key))
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("id", &self.inner.id)
            .field("cached", &self.inner.cache.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for LifecycleInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            let pending = self.cache.closable_instances().len();
            if pending > 0 {
                tracing::warn!(
                    lifecycle = self.id,
                    pending,
                    "lifecycle dropped with unclosed resources; call close() at the end of the call"
                );
            }
        }
    }
}
