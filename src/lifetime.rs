//! Service lifetime definitions.

/// Instance lifetime policy for a registration.
///
/// - `Singleton`: one instance for the whole process, shared by every lifecycle
/// - `Scoped`: one instance per worker lifecycle (request / worker call)
/// - `Transient`: a fresh instance on every lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Singleton,
    Scoped,
    Transient,
}
