//! Typed options bound at composition time.
//!
//! `Options<T>` is an immutable snapshot of a settings struct, built once on
//! first resolution from defaults, configure callbacks (which may read other
//! services such as the host [`ServiceConfig`]) and validators.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::error::{DiError, DiResult};
use crate::provider::ResolverContext;
use crate::traits::Resolver;
use crate::ServiceCollection;

type ConfigureFn<T> = Arc<dyn Fn(&ResolverContext, &mut T) -> DiResult<()> + Send + Sync>;
type ValidateFn<T> = Arc<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

/// Immutable options snapshot registered as a singleton.
///
/// ```
/// use ferrous_worker_di::{Options, Resolver, ServiceCollection, ServiceConfig};
///
/// #[derive(Default)]
/// struct AmqpSettings {
///     uri: String,
///     prefetch: i64,
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(ServiceConfig::new().with("AMQP_URI", "amqp://localhost"));
/// services
///     .add_options::<AmqpSettings>()
///     .default_with(|| AmqpSettings { prefetch: 10, ..Default::default() })
///     .from_config(|config, settings| {
///         settings.uri = config.get_string("AMQP_URI")?;
///         Ok(())
///     })
///     .validate(|s| if s.prefetch > 0 { Ok(()) } else { Err("prefetch must be positive".into()) })
///     .register();
///
/// let provider = services.build();
/// let settings = provider.get_required::<Options<AmqpSettings>>();
/// assert_eq!(settings.uri, "amqp://localhost");
/// assert_eq!(settings.get().prefetch, 10);
/// ```
pub struct Options<T> {
    inner: Arc<T>,
}

impl<T> Options<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Arc::new(value) }
    }

    /// The configured value.
    pub fn get(&self) -> Arc<T> {
        self.inner.clone()
    }
}

impl<T> std::ops::Deref for Options<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> Clone for Options<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for Options<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Options").field(&self.inner).finish()
    }
}

/// Validation failure reported as the source of a [`DiError::Provider`].
#[derive(Debug, Clone)]
pub struct OptionsValidationError {
    pub options: &'static str,
    pub message: String,
}

impl fmt::Display for OptionsValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failed: {}", self.options, self.message)
    }
}

impl Error for OptionsValidationError {}

/// Builder returned by [`ServiceCollection::add_options`].
///
/// Nothing is registered until [`register`](Self::register) is called.
pub struct OptionsBuilder<'a, T>
where
    T: Default + Send + Sync + 'static,
{
    services: &'a mut ServiceCollection,
    default_maker: Option<Arc<dyn Fn() -> T + Send + Sync>>,
    configures: Vec<ConfigureFn<T>>,
    validates: Vec<ValidateFn<T>>,
}

impl<'a, T> OptionsBuilder<'a, T>
where
    T: Default + Send + Sync + 'static,
{
    fn new(services: &'a mut ServiceCollection) -> Self {
        Self {
            services,
            default_maker: None,
            configures: Vec::new(),
            validates: Vec::new(),
        }
    }

    /// Provide a custom default value creator (otherwise `T::default()`).
    pub fn default_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.default_maker = Some(Arc::new(f));
        self
    }

    /// Configure options from other services. Callbacks run in the order added.
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResolverContext, &mut T) + Send + Sync + 'static,
    {
        self.configures.push(Arc::new(move |r: &ResolverContext, value: &mut T| {
            f(r, value);
            Ok(())
        }));
        self
    }

    /// Configure options from the host [`ServiceConfig`] singleton.
    ///
    /// Fails resolution of `Options<T>` if no `ServiceConfig` is registered or
    /// the callback returns an error.
    pub fn from_config<F>(mut self, f: F) -> Self
    where
        F: Fn(&ServiceConfig, &mut T) -> DiResult<()> + Send + Sync + 'static,
    {
        self.configures.push(Arc::new(move |r: &ResolverContext, value: &mut T| {
            let config = r.get::<ServiceConfig>()?;
            f(&config, value)
        }));
        self
    }

    /// Validate the final value after all configure callbacks.
    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validates.push(Arc::new(f));
        self
    }

    /// Registers `Options<T>` as a singleton.
    ///
    /// A validation failure surfaces as [`DiError::Provider`] when
    /// `Options<T>` is first resolved; nothing is cached, so a later
    /// resolution runs the callbacks again.
    pub fn register(self) {
        let Self {
            services,
            default_maker,
            configures,
            validates,
        } = self;

        services.add_singleton_try_factory::<Options<T>, _>(move |resolver| {
            let mut value = match &default_maker {
                Some(make) => make(),
                None => T::default(),
            };
            for configure in &configures {
                configure(resolver, &mut value)?;
            }
            for validate in &validates {
                if let Err(message) = validate(&value) {
                    let options = std::any::type_name::<T>();
                    return Err(DiError::provider(options, OptionsValidationError { options, message }));
                }
            }
            Ok(Options::new(value))
        });
    }
}

impl ServiceCollection {
    /// Starts an options registration for `T`.
    pub fn add_options<T>(&mut self) -> OptionsBuilder<'_, T>
    where
        T: Default + Send + Sync + 'static,
    {
        OptionsBuilder::new(self)
    }
}
