//! # ferrous-worker-di
//!
//! Dependency injection scoped to worker lifecycles, with resource teardown.
//!
//! A worker service handles many units of work (an RPC call, a consumed
//! message, an HTTP request) concurrently. Some dependencies are shared by
//! the whole process, others must live exactly as long as one unit of work
//! and be released when it ends: database sessions, channels, transactions.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped (per lifecycle) and Transient services
//! - **Scoped cache**: at most one instance per key within a lifecycle
//! - **Teardown sweep**: every [`Closeable`] instance a lifecycle created is
//!   closed at its end, in creation order, even when some of them fail
//! - **Ambient values**: the triggering event and the lifecycle context are
//!   injectable like any other dependency once the worker binds them
//! - **Entry decoration**: handlers declare dependencies as parameters
//! - **Circular dependency detection**: reported as errors with the full path
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_worker_di::{Closeable, CloseError, Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct Engine {
//!     url: String,
//! }
//!
//! struct Session {
//!     engine: Arc<Engine>,
//! }
//!
//! impl Closeable for Session {
//!     fn close(&self) -> Result<(), CloseError> {
//!         // return the connection to the engine's pool
//!         Ok(())
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Engine { url: "postgres://localhost".to_string() });
//! services.add_scoped_resource::<Session, _>(|resolver| Session {
//!     engine: resolver.get_required::<Engine>(),
//! });
//!
//! let provider = services.build();
//!
//! let lifecycle = provider.begin_lifecycle();
//! let session = lifecycle.get_required::<Session>();
//! assert!(Arc::ptr_eq(&session, &lifecycle.get_required::<Session>()));
//! assert_eq!(session.engine.url, "postgres://localhost");
//! lifecycle.close_blocking(); // Session::close runs here
//! ```
//!
//! ## Worker Integration
//!
//! ```rust
//! use ferrous_worker_di::{Dep, ServiceCollection, ServiceConfig, WorkerContext, WorkerInjector, decorate};
//!
//! struct Message {
//!     body: String,
//! }
//!
//! let injector = WorkerInjector::<Message>::setup(ServiceCollection::new(), ServiceConfig::new());
//! let handle = decorate(|(): (), message: Dep<Message>, ctx: Dep<WorkerContext>| {
//!     format!("{}:{}", ctx.entrypoint, message.body)
//! });
//!
//! # tokio_test_runtime(async {
//! let out = injector
//!     .run(
//!         WorkerContext::new("billing", "on_invoice"),
//!         Some(Message { body: "42".into() }),
//!         |lifecycle| async move { handle.call(&lifecycle, ()) },
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(out, "on_invoice:42");
//! # });
//! # fn tokio_test_runtime<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

// Module declarations
pub mod cache;
pub mod collection;
pub mod config;
pub mod decoration;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod options;
pub mod provider;
pub mod teardown;
pub mod traits;
pub mod worker;

// Internal modules
mod internal;
mod registration;

// Re-export core types
pub use cache::{Resource, ScopedCache};
pub use collection::{ServiceCollection, ServiceCollectionExt, ServiceCollectionModuleExt, ServiceModule};
pub use config::{ConfigValue, MissingConfigKey, ServiceConfig};
pub use decoration::{decorate, Dep, DynDep, Entry, EntryHandler, Entrypoints, Inject};
pub use error::{DiError, DiResult};
pub use key::{key_of_trait, key_of_type, Key};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, TracingObserver};
pub use options::{Options, OptionsBuilder, OptionsValidationError};
pub use provider::{Lifecycle, ResolverContext, ServiceProvider};
pub use registration::AnyArc;
pub use teardown::{teardown, teardown_async};
pub use traits::{AsyncCloseable, CloseError, Closeable, Resolver, ResolverCore};
pub use worker::{WorkerContext, WorkerInjector};
