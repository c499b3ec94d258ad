use async_trait::async_trait;
use ferrous_worker_di::{
    teardown, AsyncCloseable, CloseError, Closeable, Resolver, ServiceCollection,
};
use std::sync::{Arc, Mutex};

type CloseLog = Arc<Mutex<Vec<&'static str>>>;

struct FailingOnCloseResource {
    log: CloseLog,
}

impl Closeable for FailingOnCloseResource {
    fn close(&self) -> Result<(), CloseError> {
        self.log.lock().unwrap().push("failing");
        Err("connection reset by peer".into())
    }
}

struct NormalResource {
    log: CloseLog,
}

impl Closeable for NormalResource {
    fn close(&self) -> Result<(), CloseError> {
        self.log.lock().unwrap().push("normal");
        Ok(())
    }
}

struct PanickingResource {
    log: CloseLog,
}

impl Closeable for PanickingResource {
    fn close(&self) -> Result<(), CloseError> {
        self.log.lock().unwrap().push("panicking");
        panic!("close exploded");
    }
}

struct AsyncChannel {
    log: CloseLog,
}

#[async_trait]
impl AsyncCloseable for AsyncChannel {
    async fn close(&self) -> Result<(), CloseError> {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push("async");
        Ok(())
    }
}

/// Not closeable: never appears in the sweep.
struct PlainValue;

fn services(log: &CloseLog) -> ServiceCollection {
    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_scoped_resource::<FailingOnCloseResource, _>(move |_| FailingOnCloseResource { log: l.clone() });
    let l = log.clone();
    sc.add_scoped_resource::<NormalResource, _>(move |_| NormalResource { log: l.clone() });
    let l = log.clone();
    sc.add_scoped_resource::<PanickingResource, _>(move |_| PanickingResource { log: l.clone() });
    let l = log.clone();
    sc.add_scoped_async_resource::<AsyncChannel, _>(move |_| AsyncChannel { log: l.clone() });
    sc.add_scoped_factory::<PlainValue, _>(|_| PlainValue);
    sc
}

#[test]
fn test_failing_close_does_not_stop_the_sweep() {
    let log = CloseLog::default();
    let lifecycle = services(&log).build().begin_lifecycle();

    lifecycle.get_required::<FailingOnCloseResource>();
    lifecycle.get_required::<NormalResource>();
    lifecycle.close_blocking();

    assert_eq!(*log.lock().unwrap(), vec!["failing", "normal"]);
}

#[test]
fn test_sweep_follows_first_cached_order() {
    let log = CloseLog::default();
    let lifecycle = services(&log).build().begin_lifecycle();

    lifecycle.get_required::<NormalResource>();
    lifecycle.get_required::<PlainValue>();
    lifecycle.get_required::<FailingOnCloseResource>();
    // A repeated lookup does not move an entry
    lifecycle.get_required::<NormalResource>();

    let names: Vec<_> = lifecycle
        .cache()
        .closable_instances()
        .iter()
        .map(|r| r.type_name())
        .collect();
    assert_eq!(
        names,
        vec![
            std::any::type_name::<NormalResource>(),
            std::any::type_name::<FailingOnCloseResource>(),
        ]
    );

    teardown(lifecycle.cache());
    assert_eq!(*log.lock().unwrap(), vec!["normal", "failing"]);
}

#[test]
fn test_close_called_exactly_once_per_instance_despite_panics() {
    let log = CloseLog::default();
    let lifecycle = services(&log).build().begin_lifecycle();

    lifecycle.get_required::<PanickingResource>();
    lifecycle.get_required::<FailingOnCloseResource>();
    lifecycle.get_required::<NormalResource>();

    lifecycle.close_blocking();
    // Second call is a no-op
    lifecycle.close_blocking();

    assert_eq!(*log.lock().unwrap(), vec!["panicking", "failing", "normal"]);
    assert!(lifecycle.is_closed());
}

#[test]
fn test_empty_lifecycle_teardown_is_a_no_op() {
    let log = CloseLog::default();
    let lifecycle = services(&log).build().begin_lifecycle();
    lifecycle.close_blocking();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_blocking_sweep_skips_async_resources() {
    let log = CloseLog::default();
    let lifecycle = services(&log).build().begin_lifecycle();

    lifecycle.get_required::<AsyncChannel>();
    lifecycle.get_required::<NormalResource>();
    lifecycle.close_blocking();

    assert_eq!(*log.lock().unwrap(), vec!["normal"]);
}

#[tokio::test]
async fn test_async_sweep_closes_sync_and_async_resources() {
    let log = CloseLog::default();
    let lifecycle = services(&log).build().begin_lifecycle();

    lifecycle.get_required::<AsyncChannel>();
    lifecycle.get_required::<FailingOnCloseResource>();
    lifecycle.get_required::<NormalResource>();
    lifecycle.close().await;
    lifecycle.close().await;

    assert_eq!(*log.lock().unwrap(), vec!["async", "failing", "normal"]);
}

#[test]
fn test_bound_values_are_not_swept() {
    let log = CloseLog::default();
    let lifecycle = services(&log).build().begin_lifecycle();

    lifecycle.bind_ambient(NormalResource { log: log.clone() });
    lifecycle.close_blocking();

    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_scoped_trait_resources_are_swept() {
    trait Channel: Closeable {
        fn publish(&self) -> usize;
    }

    struct LoggingChannel(CloseLog);
    impl Closeable for LoggingChannel {
        fn close(&self) -> Result<(), CloseError> {
            self.0.lock().unwrap().push("channel");
            Ok(())
        }
    }
    impl Channel for LoggingChannel {
        fn publish(&self) -> usize {
            1
        }
    }

    let log = CloseLog::default();
    let l = log.clone();
    let mut sc = ServiceCollection::new();
    sc.add_scoped_trait_resource::<dyn Channel, _>(move |_| Arc::new(LoggingChannel(l.clone())));

    let lifecycle = sc.build().begin_lifecycle();
    assert_eq!(lifecycle.get_required_trait::<dyn Channel>().publish(), 1);
    lifecycle.close_blocking();

    assert_eq!(*log.lock().unwrap(), vec!["channel"]);
}

#[tokio::test]
async fn test_singleton_resources_close_at_shutdown() {
    let log = CloseLog::default();
    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_singleton_resource::<NormalResource, _>(move |_| NormalResource { log: l.clone() });
    let l = log.clone();
    sc.add_singleton_async_resource::<AsyncChannel, _>(move |_| AsyncChannel { log: l.clone() });

    let sp = sc.build();
    let lifecycle = sp.begin_lifecycle();
    lifecycle.get_required::<NormalResource>();
    lifecycle.get_required::<AsyncChannel>();

    // Singletons outlive the lifecycle
    lifecycle.close().await;
    assert!(log.lock().unwrap().is_empty());

    sp.close_all().await;
    assert_eq!(*log.lock().unwrap(), vec!["normal", "async"]);

    sp.close_all().await;
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn test_blocking_shutdown_skips_async_singletons() {
    let log = CloseLog::default();
    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_singleton_resource::<NormalResource, _>(move |_| NormalResource { log: l.clone() });
    let l = log.clone();
    sc.add_singleton_async_resource::<AsyncChannel, _>(move |_| AsyncChannel { log: l.clone() });

    let sp = sc.build();
    sp.get_required::<AsyncChannel>();
    sp.get_required::<NormalResource>();

    sp.close_all_blocking();
    assert_eq!(*log.lock().unwrap(), vec!["normal"]);

    sp.close_all_blocking();
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_closed_lifecycle_builds_no_more_resources() {
    let log = CloseLog::default();
    let sp = services(&log).build();
    let lifecycle = sp.begin_lifecycle();
    lifecycle.get_required::<NormalResource>();
    lifecycle.close_blocking();

    let late = lifecycle.get::<NormalResource>();
    assert!(matches!(late, Err(ferrous_worker_di::DiError::LifecycleClosed(_))));
    assert!(lifecycle.clone().get::<PlainValue>().is_err());
    assert_eq!(lifecycle.cache().len(), 1);

    lifecycle.close_blocking();
    assert_eq!(*log.lock().unwrap(), vec!["normal"]);
}
