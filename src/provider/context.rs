//! Resolver context for dependency injection.
//!
//! This module contains the ResolverContext type which provides
//! the interface for factory functions to resolve dependencies.

use crate::error::DiResult;
use crate::key::Key;
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

/// Context passed to factory functions for resolving dependencies.
///
/// Wraps the resolver that requested the instance: the root provider for
/// singletons, the owning lifecycle for scoped and transient services. A
/// factory can therefore resolve arbitrarily deep dependency graphs.
///
/// # Examples
///
/// ```
/// use ferrous_worker_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Engine { url: String }
/// struct Session { engine: Arc<Engine> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Engine { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<Session, _>(|resolver| Session {
///     engine: resolver.get_required::<Engine>(),
/// });
///
/// let provider = services.build();
/// let lifecycle = provider.begin_lifecycle();
/// assert_eq!(lifecycle.get_required::<Session>().engine.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    resolver: &'a dyn ResolverCore,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(resolver: &'a dyn ResolverCore) -> Self {
        Self { resolver }
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.resolver.resolve_any(key)
    }
}
