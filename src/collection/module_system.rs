//! Service module system for modular registration.
//!
//! A worker service usually assembles its bindings from several modules
//! (configuration, database, clients). Modules are applied in order, so a
//! later module can re-bind a key registered by an earlier one.

use crate::{DiResult, ServiceCollection};

/// A module that registers services with a [`ServiceCollection`].
///
/// Closures of the shape `FnOnce(&mut ServiceCollection) -> DiResult<()>` are
/// modules too.
///
/// # Example
///
/// ```rust
/// use ferrous_worker_di::{ServiceCollection, ServiceModule, ServiceCollectionExt, DiResult, Resolver};
///
/// #[derive(Default)]
/// struct DbConfig;
///
/// struct Session;
///
/// struct DbModule;
///
/// impl ServiceModule for DbModule {
///     fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
///         services.add_singleton(DbConfig::default());
///         services.add_scoped_factory::<Session, _>(|r| {
///             let _config = r.get_required::<DbConfig>();
///             Session
///         });
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let provider = ServiceCollection::new()
///     .add_module(DbModule)?
///     .add_module(|services: &mut ServiceCollection| -> DiResult<()> {
///         services.add_singleton(3u8);
///         Ok(())
///     })?
///     .build();
/// assert_eq!(*provider.get_required::<u8>(), 3);
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule {
    /// Register this module's services with the ServiceCollection.
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()>;
}

impl<F> ServiceModule for F
where
    F: FnOnce(&mut ServiceCollection) -> DiResult<()>,
{
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
        self(services)
    }
}

/// Builder-style module registration.
pub trait ServiceCollectionExt {
    /// Applies `module` and returns the collection for chaining.
    fn add_module<M: ServiceModule>(self, module: M) -> DiResult<Self>
    where
        Self: Sized;
}

impl ServiceCollectionExt for ServiceCollection {
    fn add_module<M: ServiceModule>(mut self, module: M) -> DiResult<Self> {
        module.register_services(&mut self)?;
        Ok(self)
    }
}

/// In-place module registration matching the `&mut Self` registration methods.
pub trait ServiceCollectionModuleExt {
    fn add_module_mut<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self>;
}

impl ServiceCollectionModuleExt for ServiceCollection {
    fn add_module_mut<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }
}
