/// Unit tests for Key type methods

use ferrous_worker_di::{key_of_trait, key_of_type, Key};
use std::any::TypeId;
use std::collections::HashMap;

trait Plugin: Send + Sync {}

#[test]
fn test_key_display_name_type() {
    let key = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    assert_eq!(key.display_name(), "alloc::string::String");
    assert_ne!(key.display_name(), "");
}

#[test]
fn test_key_display_name_trait() {
    let key = Key::Trait("dyn core::fmt::Debug");
    assert_eq!(key.display_name(), "dyn core::fmt::Debug");
    assert_ne!(key.display_name(), "");
}

#[test]
fn test_key_helpers_use_type_names() {
    assert_eq!(key_of_type::<u32>().display_name(), "u32");
    assert_eq!(key_of_trait::<dyn Plugin>().display_name(), "dyn unit_key::Plugin");
    assert!(matches!(key_of_type::<u32>(), Key::Type(id, _) if id == TypeId::of::<u32>()));
    assert!(matches!(key_of_trait::<dyn Plugin>(), Key::Trait(_)));
}

#[test]
fn test_key_debug_format() {
    let key = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    let debug_str = format!("{:?}", key);

    assert!(debug_str.contains("Type"));
    assert!(debug_str.contains("alloc::string::String"));
}

#[test]
fn test_key_clone() {
    let key = key_of_trait::<dyn Plugin>();
    let cloned = key.clone();
    assert_eq!(key, cloned);
    assert_eq!(key.display_name(), cloned.display_name());
}

#[test]
fn test_key_equality() {
    let key1 = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    let key2 = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    let key3 = Key::Type(TypeId::of::<u32>(), "u32");

    assert_eq!(key1, key2);
    assert_ne!(key1, key3);
}

#[test]
fn test_key_equality_ignores_diagnostic_name() {
    let a = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    let b = Key::Type(TypeId::of::<String>(), "String");
    assert_eq!(a, b);

    let mut map = HashMap::new();
    map.insert(a, 1);
    assert_eq!(map.get(&b), Some(&1));
}

#[test]
fn test_type_and_trait_keys_never_collide() {
    let type_key = Key::Type(TypeId::of::<String>(), "dyn unit_key::Plugin");
    let trait_key = key_of_trait::<dyn Plugin>();
    assert_eq!(type_key.display_name(), trait_key.display_name());
    assert_ne!(type_key, trait_key);
}

#[test]
fn test_key_hash() {
    let key = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    let mut map = HashMap::new();
    map.insert(key, "test_value");
    map.insert(key_of_trait::<dyn Plugin>(), "plugin");

    assert_eq!(map.get(&key_of_type::<String>()), Some(&"test_value"));
    assert_eq!(map.get(&key_of_trait::<dyn Plugin>()), Some(&"plugin"));
    assert_eq!(map.get(&key_of_type::<u32>()), None);
}
