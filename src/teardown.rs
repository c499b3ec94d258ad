//! Resource teardown sweep.
//!
//! Runs at the end of a lifecycle and closes every closeable instance the
//! lifecycle created. Teardown is best-effort: a failing or panicking `close`
//! is logged with the resource's type name and the sweep moves on.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use futures_util::FutureExt;

use crate::cache::{CloseHandle, Resource, ScopedCache};
use crate::traits::CloseError;

/// Closes every synchronous resource in `cache`, in first-cached order.
///
/// Async resources cannot be awaited here; they are logged and skipped.
/// Use [`teardown_async`] when the cache may hold them.
pub fn teardown(cache: &ScopedCache) {
    sweep_blocking(cache.closable_instances());
}

/// Closes every resource in `cache`, sync and async, in first-cached order.
pub async fn teardown_async(cache: &ScopedCache) {
    sweep(cache.closable_instances()).await;
}

pub(crate) fn sweep_blocking(resources: Vec<Resource>) {
    for resource in resources {
        match &resource.handle {
            CloseHandle::Sync(inst) => {
                let outcome = catch_unwind(AssertUnwindSafe(|| inst.close()));
                report(&resource, outcome);
            }
            CloseHandle::Async(_) => {
                tracing::warn!(
                    resource = resource.type_name(),
                    "async resource skipped by blocking teardown; it will not be closed"
                );
            }
        }
    }
}

pub(crate) async fn sweep(resources: Vec<Resource>) {
    for resource in resources {
        let outcome = match &resource.handle {
            CloseHandle::Sync(inst) => catch_unwind(AssertUnwindSafe(|| inst.close())),
            CloseHandle::Async(inst) => AssertUnwindSafe(inst.close()).catch_unwind().await,
        };
        report(&resource, outcome);
    }
}

fn report(resource: &Resource, outcome: Result<Result<(), CloseError>, Box<dyn Any + Send>>) {
    match outcome {
        Ok(Ok(())) => {
            tracing::trace!(resource = resource.type_name(), "resource closed");
        }
        Ok(Err(err)) => {
            tracing::error!(
                resource = resource.type_name(),
                error = %err,
                "failed to close lifecycle resource; closing the remaining resources"
            );
        }
        Err(payload) => {
            tracing::error!(
                resource = resource.type_name(),
                panic = panic_message(payload.as_ref()),
                "resource panicked while closing; closing the remaining resources"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
