//! Close capability for resources released at the end of a lifecycle.

use std::sync::Arc;

/// Error returned by a failed close.
pub type CloseError = Box<dyn std::error::Error + Send + Sync>;

/// Capability for resources that must be released when their lifecycle ends.
///
/// Register the type with one of the `*_resource` methods on
/// `ServiceCollection`; the teardown sweep then calls `close` exactly once
/// per cached instance, in the order the instances were first created.
/// A failing `close` is logged and does not stop the sweep.
///
/// # Examples
///
/// ```
/// use ferrous_worker_di::{Closeable, CloseError, ServiceCollection, Resolver};
///
/// struct DbSession {
///     id: u32,
/// }
///
/// impl Closeable for DbSession {
///     fn close(&self) -> Result<(), CloseError> {
///         println!("Releasing session {}", self.id);
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_resource::<DbSession, _>(|_| DbSession { id: 7 });
///
/// let provider = services.build();
/// let lifecycle = provider.begin_lifecycle();
/// let session = lifecycle.get_required::<DbSession>();
/// assert_eq!(session.id, 7);
/// lifecycle.close_blocking();
/// ```
pub trait Closeable: Send + Sync + 'static {
    /// Release the resource.
    fn close(&self) -> Result<(), CloseError>;
}

impl<T: Closeable + ?Sized> Closeable for Arc<T> {
    fn close(&self) -> Result<(), CloseError> {
        (**self).close()
    }
}

impl<T: Closeable + ?Sized> Closeable for Box<T> {
    fn close(&self) -> Result<(), CloseError> {
        (**self).close()
    }
}

/// Asynchronous close capability.
///
/// Async resources are only released by the async sweep
/// (`Lifecycle::close`); the blocking sweep logs and skips them.
///
/// # Examples
///
/// ```
/// use ferrous_worker_di::{AsyncCloseable, CloseError};
/// use async_trait::async_trait;
///
/// struct Connection;
///
/// #[async_trait]
/// impl AsyncCloseable for Connection {
///     async fn close(&self) -> Result<(), CloseError> {
///         // flush and shut the socket down...
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait AsyncCloseable: Send + Sync + 'static {
    /// Release the resource asynchronously.
    async fn close(&self) -> Result<(), CloseError>;
}
