//! Entry decoration: dependency injection for worker entrypoints.
//!
//! An entry handler is an ordinary function whose first parameter carries the
//! call's own arguments and whose remaining parameters are dependencies:
//!
//! ```rust
//! use ferrous_worker_di::{decorate, Dep, ServiceCollection};
//!
//! struct Repository;
//! impl Repository {
//!     fn find(&self, id: u32) -> String { format!("user-{id}") }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_scoped_factory::<Repository, _>(|_| Repository);
//! let provider = services.build();
//!
//! let get_user = decorate(|id: u32, repo: Dep<Repository>| repo.find(id));
//!
//! let lifecycle = provider.begin_lifecycle();
//! assert_eq!(get_user.call(&lifecycle, 7).unwrap(), "user-7");
//! ```
//!
//! Dependencies are resolved in declaration order from the lifecycle before
//! the handler runs. If any of them fails to resolve the handler is not
//! invoked and the resolution error is returned.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{DiError, DiResult};
use crate::provider::Lifecycle;
use crate::traits::Resolver;

/// Values that can be resolved from a lifecycle and passed to an entry handler.
pub trait Inject: Sized {
    fn inject(lifecycle: &Lifecycle) -> DiResult<Self>;
}

/// A concrete service resolved from the current lifecycle.
///
/// Derefs to `T`.
pub struct Dep<T>(Arc<T>);

impl<T> Dep<T> {
    /// Unwraps the inner [`Arc`]
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T> Deref for Dep<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> Clone for Dep<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Dep<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dep").field(&self.0).finish()
    }
}

impl<T: Send + Sync + 'static> Inject for Dep<T> {
    #[inline]
    fn inject(lifecycle: &Lifecycle) -> DiResult<Self> {
        lifecycle.get::<T>().map(Dep)
    }
}

/// A trait object resolved from the current lifecycle.
///
/// ```rust
/// use ferrous_worker_di::{decorate, DynDep, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Mailer: Send + Sync {
///     fn send(&self, to: &str) -> bool;
/// }
///
/// struct NullMailer;
/// impl Mailer for NullMailer {
///     fn send(&self, _to: &str) -> bool { true }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_trait::<dyn Mailer>(Arc::new(NullMailer));
///
/// let notify = decorate(|to: &'static str, mailer: DynDep<dyn Mailer>| mailer.send(to));
/// let lifecycle = services.build().begin_lifecycle();
/// assert!(notify.call(&lifecycle, "ops@example.com").unwrap());
/// ```
pub struct DynDep<T: ?Sized>(Arc<T>);

impl<T: ?Sized> DynDep<T> {
    /// Unwraps the inner [`Arc`]
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T: ?Sized> Deref for DynDep<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> Clone for DynDep<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized + Send + Sync + 'static> Inject for DynDep<T> {
    #[inline]
    fn inject(lifecycle: &Lifecycle) -> DiResult<Self> {
        lifecycle.get_trait::<T>().map(DynDep)
    }
}

/// The lifecycle itself, for handlers that resolve lazily.
impl Inject for Lifecycle {
    #[inline]
    fn inject(lifecycle: &Lifecycle) -> DiResult<Self> {
        Ok(lifecycle.clone())
    }
}

macro_rules! define_inject_tuple ({ $($D:ident)* } => {
    impl<$($D: Inject,)*> Inject for ($($D,)*) {
        #[inline]
        #[allow(unused_variables)]
        fn inject(lifecycle: &Lifecycle) -> DiResult<Self> {
            Ok(($($D::inject(lifecycle)?,)*))
        }
    }
});

define_inject_tuple! {}
define_inject_tuple! { D1 }
define_inject_tuple! { D1 D2 }
define_inject_tuple! { D1 D2 D3 }
define_inject_tuple! { D1 D2 D3 D4 }
define_inject_tuple! { D1 D2 D3 D4 D5 }
define_inject_tuple! { D1 D2 D3 D4 D5 D6 }
define_inject_tuple! { D1 D2 D3 D4 D5 D6 D7 }
define_inject_tuple! { D1 D2 D3 D4 D5 D6 D7 D8 }

/// A handler taking the call arguments followed by 0 to 8 injected values.
pub trait EntryHandler<Args, Deps>: Send + Sync + 'static {
    type Output;

    fn call(&self, args: Args, deps: Deps) -> Self::Output;
}

macro_rules! define_entry_handler ({ $($D:ident)* } => {
    impl<Func, Args, R, $($D,)*> EntryHandler<Args, ($($D,)*)> for Func
    where
        Func: Fn(Args, $($D),*) -> R + Send + Sync + 'static,
    {
        type Output = R;

        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, args: Args, ($($D,)*): ($($D,)*)) -> R {
            (self)(args, $($D),*)
        }
    }
});

define_entry_handler! {}
define_entry_handler! { D1 }
define_entry_handler! { D1 D2 }
define_entry_handler! { D1 D2 D3 }
define_entry_handler! { D1 D2 D3 D4 }
define_entry_handler! { D1 D2 D3 D4 D5 }
define_entry_handler! { D1 D2 D3 D4 D5 D6 }
define_entry_handler! { D1 D2 D3 D4 D5 D6 D7 }
define_entry_handler! { D1 D2 D3 D4 D5 D6 D7 D8 }

/// Wraps `handler` so its dependencies are resolved per call.
///
/// The returned [`Entry`] has the handler's external signature: it takes the
/// call arguments and a lifecycle. Async handlers work unchanged, the future
/// is returned after dependencies have been resolved.
pub fn decorate<H, Args, Deps>(handler: H) -> Entry<H, Args, Deps>
where
    H: EntryHandler<Args, Deps>,
    Deps: Inject,
{
    Entry {
        handler,
        _marker: PhantomData,
    }
}

/// A decorated entry handler.
pub struct Entry<H, Args, Deps> {
    handler: H,
    _marker: PhantomData<fn(Args, Deps)>,
}

impl<H, Args, Deps> Entry<H, Args, Deps>
where
    H: EntryHandler<Args, Deps>,
    Deps: Inject,
{
    /// Resolves the declared dependencies from `lifecycle`, then runs the handler.
    pub fn call(&self, lifecycle: &Lifecycle, args: Args) -> DiResult<H::Output> {
        let deps = Deps::inject(lifecycle)?;
        Ok(self.handler.call(args, deps))
    }

    /// Like [`call`](Self::call), using the lifecycle bound to the current task.
    pub fn call_current(&self, args: Args) -> DiResult<H::Output> {
        let lifecycle = Lifecycle::current()?;
        self.call(&lifecycle, args)
    }
}

impl<H, Args, Deps> fmt::Debug for Entry<H, Args, Deps> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("handler", &std::any::type_name::<H>())
            .finish()
    }
}

type BoxedEntry<Args, R> = Box<dyn Fn(&Lifecycle, Args) -> DiResult<R> + Send + Sync>;

/// Named entrypoints of one service, decorated at composition time.
///
/// All entrypoints of a table share the argument and output types; use an
/// enum or a serialized payload for heterogeneous services.
///
/// ```rust
/// use ferrous_worker_di::{decorate, Dep, Entrypoints, ServiceCollection};
///
/// struct Greeting(&'static str);
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Greeting("hello"));
/// let provider = services.build();
///
/// let mut entrypoints = Entrypoints::<String, String>::new();
/// entrypoints
///     .register("greet", decorate(|name: String, g: Dep<Greeting>| format!("{} {name}", g.0)))
///     .register("echo", decorate(|name: String| name));
///
/// let lifecycle = provider.begin_lifecycle();
/// assert_eq!(entrypoints.dispatch("greet", &lifecycle, "bob".into()).unwrap(), "hello bob");
/// assert!(entrypoints.dispatch("missing", &lifecycle, "bob".into()).is_err());
/// ```
pub struct Entrypoints<Args, R> {
    entries: IndexMap<String, BoxedEntry<Args, R>>,
}

impl<Args, R> Default for Entrypoints<Args, R> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<Args: 'static, R: 'static> Entrypoints<Args, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entry` under `name`, replacing any earlier one.
    pub fn register<H, Deps>(&mut self, name: impl Into<String>, entry: Entry<H, Args, Deps>) -> &mut Self
    where
        H: EntryHandler<Args, Deps, Output = R>,
        Deps: Inject + 'static,
    {
        let name = name.into();
        tracing::trace!(entrypoint = %name, "registering entrypoint");
        self.entries
            .insert(name, Box::new(move |lifecycle, args| entry.call(lifecycle, args)));
        self
    }

    /// Runs the entrypoint registered under `name`.
    pub fn dispatch(&self, name: &str, lifecycle: &Lifecycle, args: Args) -> DiResult<R> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| DiError::UnknownEntrypoint(name.to_string()))?;
        entry(lifecycle, args)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<Args, R> fmt::Debug for Entrypoints<Args, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entrypoints")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
