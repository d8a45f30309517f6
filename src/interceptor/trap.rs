// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Process-wide panic hook routing escaped panics to bound runs.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    future::Future,
    marker::PhantomData,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Once, Weak,
    },
    thread,
    time::Duration,
};

use futures::{future, FutureExt as _};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::Failure;

use super::Shared;

/// Run bound to a thread, keyed by its [`Binding`] ID.
type Bound = (u64, Weak<Mutex<Shared>>);

/// How long the hook waits for a contended lock before giving up on routing.
const LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Runs bound anywhere in the process, in binding order.
static RUNS: Lazy<Mutex<Vec<Bound>>> = Lazy::new(Mutex::default);

thread_local! {
    /// Runs bound to this thread, in binding order.
    static BOUND: RefCell<Vec<Bound>> = const { RefCell::new(Vec::new()) };

    /// Depth of the panic-catching regions this thread is inside of.
    static CATCHING: Cell<usize> = const { Cell::new(0) };
}

/// Binding of a run to the thread driving it. Undone on drop.
#[derive(Debug)]
pub(crate) struct Binding {
    /// ID of this [`Binding`].
    id: u64,

    /// Must be dropped on the binding thread.
    _not_send: PhantomData<*const ()>,
}

impl Drop for Binding {
    fn drop(&mut self) {
        let id = self.id;
        _ = BOUND.try_with(|b| b.borrow_mut().retain(|(i, _)| *i != id));
        RUNS.lock().retain(|(i, _)| *i != id);
    }
}

/// Binds the given run to the current thread.
pub(super) fn bind(shared: Weak<Mutex<Shared>>) -> Binding {
    /// [`AtomicU64`] ID.
    static ID: AtomicU64 = AtomicU64::new(0);

    install_hook();

    let id = ID.fetch_add(1, Ordering::Relaxed);
    BOUND.with(|b| b.borrow_mut().push((id, Weak::clone(&shared))));
    RUNS.lock().push((id, shared));
    Binding { id, _not_send: PhantomData }
}

/// Installs the panic hook once per process, chaining the previous one for
/// panics no run claims.
fn install_hook() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !route(info.payload()) {
                previous(info);
            }
        }));
    });
}

/// Routes a panic payload to the run claiming it.
///
/// Returns `false` if no run claims it.
fn route(payload: &(dyn Any + Send)) -> bool {
    if CATCHING.try_with(Cell::get).unwrap_or_default() > 0 {
        // Caught and reported by whoever entered the region.
        return true;
    }

    let Some(shared) = claimant() else {
        return false;
    };
    let Some(mut shared) = shared.try_lock_for(LOCK_TIMEOUT) else {
        return false;
    };
    tracing::debug!(
        thread = thread::current().name().unwrap_or("<unnamed>"),
        "routing an escaped panic",
    );
    shared.capture_escaped(Failure::uncaught_from_panic(payload));
    true
}

/// Latest live run bound to the current thread, or, if none, to any thread.
fn claimant() -> Option<Arc<Mutex<Shared>>> {
    let latest =
        |runs: &[Bound]| runs.iter().rev().find_map(|(_, r)| r.upgrade());

    BOUND
        .try_with(|b| b.try_borrow().ok().and_then(|b| latest(b.as_slice())))
        .ok()
        .flatten()
        .or_else(|| {
            RUNS.try_lock_for(LOCK_TIMEOUT)
                .and_then(|runs| latest(runs.as_slice()))
        })
}

/// Region of the current thread whose panics are caught by its owner.
struct CatchScope;

impl CatchScope {
    /// Enters a new [`CatchScope`].
    fn enter() -> Self {
        CATCHING.with(|c| c.set(c.get() + 1));
        Self
    }
}

impl Drop for CatchScope {
    fn drop(&mut self) {
        _ = CATCHING.try_with(|c| c.set(c.get().saturating_sub(1)));
    }
}

/// [`panic::catch_unwind()`] whose panics are never routed by the hook.
pub(crate) fn catch<T>(f: impl FnOnce() -> T) -> thread::Result<T> {
    let _scope = CatchScope::enter();
    panic::catch_unwind(AssertUnwindSafe(f))
}

/// [`FutureExt::catch_unwind()`] whose panics are never routed by the hook.
pub(crate) fn catch_future<F: Future>(
    fut: F,
) -> impl Future<Output = thread::Result<F::Output>> {
    let mut fut = Box::pin(AssertUnwindSafe(fut).catch_unwind());
    future::poll_fn(move |cx| {
        let _scope = CatchScope::enter();
        fut.as_mut().poll(cx)
    })
}
