//! Service key types for the dependency injection container.

use std::any::TypeId;

/// Identifies what is being requested from the container.
///
/// Concrete types are keyed by their `TypeId`; trait objects by the trait's
/// type name. The `&'static str` carried by `Key::Type` is only used for
/// diagnostics and never takes part in equality or hashing.
///
/// # Examples
///
/// ```rust
/// use ferrous_worker_di::{Key, key_of_type};
///
/// let a = key_of_type::<String>();
/// let b = key_of_type::<String>();
/// assert_eq!(a, b);
/// assert_eq!(a.display_name(), "alloc::string::String");
/// ```
#[derive(Debug, Clone)]
pub enum Key {
    Type(TypeId, &'static str),
    Trait(&'static str),
}

impl Key {
    /// Human-readable name used in errors and logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(name) => name,
        }
    }
}

// TypeId-only comparison for concrete types
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Trait(a), Key::Trait(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Trait(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

/// Key for a concrete type.
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Key for a trait object type such as `dyn Repository`.
#[inline(always)]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(std::any::type_name::<T>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn type_keys_ignore_display_name() {
        let a = Key::Type(TypeId::of::<u32>(), "u32");
        let b = Key::Type(TypeId::of::<u32>(), "renamed");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn type_and_trait_keys_never_collide() {
        trait Marker {}
        let t = key_of_type::<u32>();
        let d = key_of_trait::<dyn Marker>();
        assert_ne!(t, d);
    }
}
