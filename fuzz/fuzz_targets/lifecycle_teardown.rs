#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_worker_di::{CloseError, Closeable, DiError, Resolver, ServiceCollection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Conn<const N: usize> {
    closed: Arc<AtomicUsize>,
    fail: bool,
}

impl<const N: usize> Closeable for Conn<N> {
    fn close(&self) -> Result<(), CloseError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("close failed".into());
        }
        Ok(())
    }
}

fn register<const N: usize>(services: &mut ServiceCollection, closed: &Arc<AtomicUsize>, fail: bool) {
    let closed = closed.clone();
    services.add_scoped_resource::<Conn<N>, _>(move |_| Conn::<N> { closed: closed.clone(), fail });
}

// Each byte resolves one of four resources in one of two lifecycles; the
// high bit closes that lifecycle instead. Every resolved instance must be
// closed exactly once, however the lookups and closes interleave, and a
// closed lifecycle must refuse every later lookup.
fuzz_target!(|data: &[u8]| {
    let Some((&flags, ops)) = data.split_first() else {
        return;
    };

    let closed = Arc::new(AtomicUsize::new(0));
    let mut services = ServiceCollection::new();
    register::<0>(&mut services, &closed, flags & 1 != 0);
    register::<1>(&mut services, &closed, flags & 2 != 0);
    register::<2>(&mut services, &closed, flags & 4 != 0);
    register::<3>(&mut services, &closed, flags & 8 != 0);
    let provider = services.build();

    let lifecycles = [provider.begin_lifecycle(), provider.begin_lifecycle()];
    let mut resolved = [[false; 4]; 2];
    let mut swept = [false; 2];

    for &op in ops {
        let which = usize::from(op & 1);
        let lifecycle = &lifecycles[which];
        if op & 0x80 != 0 {
            lifecycle.close_blocking();
            swept[which] = true;
            continue;
        }
        let slot = usize::from((op >> 1) & 3);
        let result = match slot {
            0 => lifecycle.get::<Conn<0>>().map(drop),
            1 => lifecycle.get::<Conn<1>>().map(drop),
            2 => lifecycle.get::<Conn<2>>().map(drop),
            _ => lifecycle.get::<Conn<3>>().map(drop),
        };
        if swept[which] {
            assert!(matches!(result, Err(DiError::LifecycleClosed(_))));
        } else {
            assert!(result.is_ok());
            resolved[which][slot] = true;
        }
    }

    for lifecycle in &lifecycles {
        lifecycle.close_blocking();
    }

    let expected: usize = resolved.iter().flatten().filter(|r| **r).count();
    assert_eq!(closed.load(Ordering::SeqCst), expected);
});
