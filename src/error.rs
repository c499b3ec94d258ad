//! Error types for the dependency injection container.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Dependency injection errors
///
/// Represents the various error conditions that can occur while resolving
/// services from the root provider or from a worker lifecycle.
///
/// Failures while closing resources at the end of a lifecycle are not
/// represented here: they are logged and swallowed by the teardown sweep.
///
/// # Examples
///
/// ```rust
/// use ferrous_worker_di::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use ferrous_worker_di::DiError;
///
/// let missing = DiError::MissingAmbient("my_service::Request");
/// assert!(missing.to_string().contains("my_service::Request"));
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// Service not registered
    NotFound(&'static str),
    /// Type downcast failed
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    Circular(Vec<&'static str>),
    /// Invalid lifetime resolution (e.g., scoped from root)
    WrongLifetime(&'static str),
    /// Maximum recursion depth exceeded
    DepthExceeded(usize),
    /// An ambient value (triggering event or worker context) was requested
    /// before the worker integration bound it
    MissingAmbient(&'static str),
    /// A factory failed while constructing an instance
    Provider {
        service: &'static str,
        source: Arc<dyn Error + Send + Sync>,
    },
    /// No entrypoint registered under this name
    UnknownEntrypoint(String),
    /// No lifecycle is bound to the current task
    NoActiveLifecycle,
    /// A scoped lookup reached a lifecycle whose teardown already ran
    LifecycleClosed(&'static str),
}

impl DiError {
    /// Wraps a factory failure for `service`.
    ///
    /// ```rust
    /// use ferrous_worker_di::DiError;
    ///
    /// let err = DiError::provider("app::Config", std::io::Error::other("no file"));
    /// assert_eq!(err.to_string(), "Provider for app::Config failed: no file");
    /// ```
    pub fn provider<E>(service: &'static str, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        DiError::Provider { service, source: Arc::new(source) }
    }

    /// Returns true if this is a missing ambient dependency error.
    pub fn is_missing_ambient(&self) -> bool {
        matches!(self, DiError::MissingAmbient(_))
    }
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NotFound(name) => write!(f, "Service not found: {}", name),
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::Circular(path) => {
                write!(f, "Circular dependency: {}", path.join(" -> "))
            }
            DiError::WrongLifetime(msg) => write!(f, "Lifetime error: {}", msg),
            DiError::DepthExceeded(depth) => write!(f, "Max depth {} exceeded", depth),
            DiError::MissingAmbient(name) => write!(
                f,
                "{} not found in the current worker lifecycle. The worker integration \
                 did not bind it: ensure WorkerInjector::begin runs for this call and \
                 is not mocked away in tests",
                name
            ),
            DiError::Provider { service, source } => {
                write!(f, "Provider for {} failed: {}", service, source)
            }
            DiError::UnknownEntrypoint(name) => write!(f, "Unknown entrypoint: {}", name),
            DiError::NoActiveLifecycle => {
                write!(f, "No worker lifecycle is bound to the current task")
            }
            DiError::LifecycleClosed(name) => {
                write!(f, "Cannot resolve {}: the worker lifecycle is already closed", name)
            }
        }
    }
}

impl Error for DiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DiError::Provider { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type for DI operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout the crate.
pub type DiResult<T> = Result<T, DiError>;
