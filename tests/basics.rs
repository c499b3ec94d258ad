use ferrous_worker_di::{DiError, Resolver, ServiceCollection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn test_concrete_singleton() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(42usize);
    sc.add_singleton("hello".to_string());

    let sp = sc.build();

    let num1 = sp.get_required::<usize>();
    let num2 = sp.get_required::<usize>();
    let str1 = sp.get_required::<String>();
    let str2 = sp.get_required::<String>();

    assert_eq!(*num1, 42);
    assert_eq!(*str1, "hello");
    assert!(Arc::ptr_eq(&num1, &num2)); // Same instance
    assert!(Arc::ptr_eq(&str1, &str2)); // Same instance
}

#[test]
fn test_factory_with_dependencies() {
    #[derive(Debug)]
    struct Config {
        port: u16,
    }

    #[derive(Debug)]
    struct Server {
        config: Arc<Config>,
        name: String,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Config { port: 8080 });
    sc.add_singleton_factory::<Server, _>(|r| Server {
        config: r.get_required::<Config>(),
        name: "MyServer".to_string(),
    });

    let sp = sc.build();
    let server = sp.get_required::<Server>();

    assert_eq!(server.config.port, 8080);
    assert_eq!(server.name, "MyServer");
}

#[test]
fn test_transient_creates_new_instances() {
    let counter = Arc::new(Mutex::new(0));
    let counter_clone = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<String, _>(move |_| {
        let mut c = counter_clone.lock().unwrap();
        *c += 1;
        format!("instance-{}", *c)
    });

    let lifecycle = sc.build().begin_lifecycle();

    let a = lifecycle.get_required::<String>();
    let b = lifecycle.get_required::<String>();
    let c = lifecycle.get_required::<String>();

    assert_eq!(*a, "instance-1");
    assert_eq!(*b, "instance-2");
    assert_eq!(*c, "instance-3");
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&b, &c));

    // Transients are never cached
    assert!(lifecycle.cache().is_empty());
}

#[test]
fn test_deep_dependency_graph() {
    struct Settings {
        dsn: &'static str,
    }
    struct Engine {
        settings: Arc<Settings>,
    }
    struct Session {
        engine: Arc<Engine>,
    }
    struct Repository {
        session: Arc<Session>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Settings { dsn: "sqlite://" });
    sc.add_singleton_factory::<Engine, _>(|r| Engine {
        settings: r.get_required::<Settings>(),
    });
    sc.add_scoped_factory::<Session, _>(|r| Session {
        engine: r.get_required::<Engine>(),
    });
    sc.add_transient_factory::<Repository, _>(|r| Repository {
        session: r.get_required::<Session>(),
    });

    let lifecycle = sc.build().begin_lifecycle();
    let repo1 = lifecycle.get_required::<Repository>();
    let repo2 = lifecycle.get_required::<Repository>();

    assert_eq!(repo1.session.engine.settings.dsn, "sqlite://");
    assert!(!Arc::ptr_eq(&repo1, &repo2));
    assert!(Arc::ptr_eq(&repo1.session, &repo2.session));
}

#[test]
fn test_failed_provider_is_retried_on_next_lookup() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = attempts.clone();

    let mut sc = ServiceCollection::new();
    sc.add_scoped_try_factory::<String, _>(move |_| {
        if a.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(DiError::provider(
                "String",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "db down"),
            ))
        } else {
            Ok("connected".to_string())
        }
    });

    let lifecycle = sc.build().begin_lifecycle();

    let err = lifecycle.get::<String>().unwrap_err();
    assert!(matches!(err, DiError::Provider { service: "String", .. }));
    assert!(err.to_string().contains("db down"));
    assert!(lifecycle.cache().is_empty());

    let value = lifecycle.get_required::<String>();
    assert_eq!(*value, "connected");
    assert!(Arc::ptr_eq(&value, &lifecycle.get_required::<String>()));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failed_singleton_is_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = attempts.clone();

    let mut sc = ServiceCollection::new();
    sc.add_singleton_try_factory::<u32, _>(move |_| {
        if a.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(DiError::NotFound("upstream"))
        } else {
            Ok(7)
        }
    });

    let sp = sc.build();
    assert!(sp.get::<u32>().is_err());
    assert_eq!(*sp.get_required::<u32>(), 7);
    assert_eq!(*sp.get_required::<u32>(), 7);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_not_found() {
    struct Unregistered;

    let sp = ServiceCollection::new().build();
    match sp.begin_lifecycle().get::<Unregistered>() {
        Err(DiError::NotFound(name)) => assert!(name.ends_with("Unregistered")),
        other => panic!("expected NotFound, got {:?}", other.err()),
    }
}

#[test]
fn test_rebinding_replaces_earlier_registration() {
    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }
    struct SystemClock;
    impl Clock for SystemClock {
        fn now(&self) -> u64 {
            1
        }
    }
    struct FrozenClock;
    impl Clock for FrozenClock {
        fn now(&self) -> u64 {
            0
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton_trait::<dyn Clock>(Arc::new(SystemClock));
    // Test override, as a fixture would do
    sc.add_singleton_trait::<dyn Clock>(Arc::new(FrozenClock));

    let sp = sc.build();
    assert_eq!(sp.get_required_trait::<dyn Clock>().now(), 0);
}

#[test]
fn test_scoped_trait_factory_identity() {
    trait Channel: Send + Sync {
        fn id(&self) -> usize;
    }
    struct Amqp(usize);
    impl Channel for Amqp {
        fn id(&self) -> usize {
            self.0
        }
    }

    let next = Arc::new(AtomicUsize::new(0));
    let n = next.clone();
    let mut sc = ServiceCollection::new();
    sc.add_scoped_trait_factory::<dyn Channel, _>(move |_| Arc::new(Amqp(n.fetch_add(1, Ordering::SeqCst))));

    let sp = sc.build();
    let first = sp.begin_lifecycle();
    let second = sp.begin_lifecycle();

    let a = first.get_required_trait::<dyn Channel>();
    assert!(Arc::ptr_eq(&a, &first.get_required_trait::<dyn Channel>()));
    assert_ne!(a.id(), second.get_required_trait::<dyn Channel>().id());
}
