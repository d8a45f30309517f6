// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Capture of errors escaping a runnable's completion channel.
//!
//! Every invocation of a runnable installs a [`CaptureGuard`] bound to a fresh
//! [`InvocationId`]. Errors raised through an [`UncaughtHandle`] of that
//! invocation are attributed to it while it's executing, and become
//! run-level [`LateFailure`]s once its completion has been recorded. Dropping
//! the guard unbinds the capture on every exit path.
//!
//! Panics escaping every [`catch_unwind()`] (e.g. of a bare [`tokio::spawn`]
//! or [`std::thread::spawn`]) are routed by a process-wide panic hook to the
//! run bound to the panicking thread, or to the most recently bound run for
//! threads no run is bound to. There they're attributed to the executing
//! invocation, if any, or become [`LateFailure`]s otherwise.
//!
//! [`catch_unwind()`]: std::panic::catch_unwind

mod trap;

use std::{
    mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use derive_more::with_trait::Display;
use futures::channel::oneshot;
use parking_lot::Mutex;

use crate::error::Failure;

pub(crate) use self::trap::{catch, catch_future, Binding};

/// Title of errors escaped before any runnable was invoked.
const OUTSIDE_TITLE: &str = "outside of any runnable";

/// ID of a single invocation of a runnable.
///
/// **NOTE**: Every retry attempt gets a different ID, so errors raised by
/// detached operations of an earlier attempt are never attributed to a later
/// one.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub struct InvocationId(u64);

impl InvocationId {
    /// Creates a new unique [`InvocationId`].
    pub fn new() -> Self {
        /// [`AtomicU64`] ID.
        static ID: AtomicU64 = AtomicU64::new(0);

        Self(ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Error captured after its runnable had already completed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LateFailure {
    /// Title of the runnable that started the failing operation.
    pub title: Arc<str>,

    /// Full title of that runnable.
    pub full_title: Arc<str>,

    /// Captured error.
    pub failure: Failure,
}

/// Capture currently bound to an executing invocation.
#[derive(Debug)]
struct Slot {
    /// Invocation the capture is bound to.
    id: InvocationId,

    /// Wakes the scheduler waiting on the invocation. Taken by the first
    /// captured error.
    tx: Option<oneshot::Sender<Failure>>,
}

impl Slot {
    /// Delivers the `failure` to the waiting scheduler, unless an earlier one
    /// has been delivered already.
    fn deliver(&mut self, failure: Failure) {
        if let Some(tx) = self.tx.take() {
            // Receiver is only dropped along with the guard, which clears the
            // slot first.
            _ = tx.send(failure);
        } else {
            tracing::debug!(
                invocation = %self.id,
                %failure,
                "invocation has already captured an error"
            );
        }
    }
}

/// State shared between an [`Interceptor`] and its [`UncaughtHandle`]s.
#[derive(Debug, Default)]
struct Shared {
    /// Capture of the single currently executing invocation.
    active: Option<Slot>,

    /// Titles of the most recently invoked runnable.
    last: Option<(Arc<str>, Arc<str>)>,

    /// Errors captured outside of their invocation's window.
    late: Vec<LateFailure>,
}

impl Shared {
    /// Captures a `failure` nobody raised on purpose.
    ///
    /// It fails the executing invocation, if any. Otherwise, it becomes late
    /// and is reported on behalf of the most recently invoked runnable.
    fn capture_escaped(&mut self, failure: Failure) {
        if let Some(slot) = self.active.as_mut() {
            slot.deliver(failure);
            return;
        }

        let (title, full_title) = self.last.clone().unwrap_or_else(|| {
            (OUTSIDE_TITLE.into(), OUTSIDE_TITLE.into())
        });
        tracing::warn!(
            runnable = %full_title,
            %failure,
            "panic escaped after the runnable completed"
        );
        self.late.push(LateFailure { title, full_title, failure });
    }
}

/// Per-run capture of errors not delivered through a runnable's completion
/// channel.
///
/// Owned by a single run, so repeated or concurrent runs in the same process
/// never see each other's errors.
#[derive(Clone, Debug, Default)]
pub struct Interceptor {
    /// Shared capture state.
    shared: Arc<Mutex<Shared>>,
}

impl Interceptor {
    /// Creates a new [`Interceptor`] with nothing installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the capture to the given invocation until the returned
    /// [`CaptureGuard`] is completed or dropped.
    pub fn install(
        &self,
        title: Arc<str>,
        full_title: Arc<str>,
    ) -> CaptureGuard {
        let id = InvocationId::new();
        let (tx, rx) = oneshot::channel();

        let prev = {
            let mut shared = self.shared.lock();
            shared.last = Some((Arc::clone(&title), Arc::clone(&full_title)));
            shared.active.replace(Slot { id, tx: Some(tx) })
        };
        if let Some(prev) = prev {
            tracing::warn!(
                invocation = %prev.id,
                "replacing a capture that was never uninstalled"
            );
        }

        CaptureGuard {
            handle: UncaughtHandle {
                id,
                title,
                full_title,
                shared: Arc::clone(&self.shared),
            },
            rx,
        }
    }

    /// Binds this [`Interceptor`] to the current thread, so panics escaping
    /// on it are routed here until the returned [`Binding`] is dropped.
    ///
    /// Installs the process-wide panic hook on the first call.
    pub(crate) fn bind(&self) -> Binding {
        trap::bind(Arc::downgrade(&self.shared))
    }

    /// Indicates whether a capture is currently installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.shared.lock().active.is_some()
    }

    /// Takes all the errors captured outside of their invocation's window.
    #[must_use]
    pub fn drain_late(&self) -> Vec<LateFailure> {
        mem::take(&mut self.shared.lock().late)
    }
}

/// Handle for raising errors on behalf of a single runnable invocation.
#[derive(Clone, Debug)]
pub struct UncaughtHandle {
    /// Invocation this handle belongs to.
    id: InvocationId,

    /// Title of the invoked runnable.
    title: Arc<str>,

    /// Full title of the invoked runnable.
    full_title: Arc<str>,

    /// Capture state of the owning [`Interceptor`].
    shared: Arc<Mutex<Shared>>,
}

impl UncaughtHandle {
    /// Invocation this handle belongs to.
    #[must_use]
    pub const fn invocation(&self) -> InvocationId {
        self.id
    }

    /// Raises an error outside of the completion channel.
    ///
    /// While the invocation is executing, the error fails it. Once its
    /// completion is recorded, the error is kept as a [`LateFailure`] of the
    /// run instead.
    pub fn raise(&self, failure: impl Into<Failure>) {
        let failure = failure.into();
        let mut shared = self.shared.lock();

        if let Some(slot) = shared.active.as_mut().filter(|s| s.id == self.id)
        {
            slot.deliver(failure);
            return;
        }

        tracing::warn!(
            runnable = %self.full_title,
            %failure,
            "error raised after the runnable completed"
        );
        shared.late.push(LateFailure {
            title: Arc::clone(&self.title),
            full_title: Arc::clone(&self.full_title),
            failure,
        });
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Self::uncaught(message)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self::uncaught(message)
    }
}

/// Scoped registration of a capture for a single invocation.
///
/// The capture is unbound either by [`CaptureGuard::complete()`] or on drop,
/// whichever comes first.
#[derive(Debug)]
pub struct CaptureGuard {
    /// Handle given to the invoked code.
    handle: UncaughtHandle,

    /// Receives the first error captured in the invocation's window.
    rx: oneshot::Receiver<Failure>,
}

impl CaptureGuard {
    /// Handle raising errors on behalf of this invocation.
    #[must_use]
    pub fn handle(&self) -> UncaughtHandle {
        self.handle.clone()
    }

    /// Resolves with the first error captured in the invocation's window.
    /// Never resolves if nothing is captured.
    pub async fn captured(&mut self) -> Failure {
        match (&mut self.rx).await {
            Ok(failure) => failure,
            Err(oneshot::Canceled) => futures::future::pending().await,
        }
    }

    /// Records the completion of the invocation, unbinding the capture.
    ///
    /// Returns an error captured before the completion was recorded, but not
    /// observed yet. Anything raised afterwards becomes a [`LateFailure`].
    pub fn complete(&mut self) -> Option<Failure> {
        self.unbind();
        self.rx.try_recv().ok().flatten()
    }

    /// Clears the active slot if it's still bound to this invocation.
    fn unbind(&self) {
        let mut shared = self.handle.shared.lock();
        if shared.active.as_ref().is_some_and(|s| s.id == self.handle.id) {
            shared.active = None;
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.unbind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(interceptor: &Interceptor, title: &str) -> CaptureGuard {
        interceptor.install(title.into(), format!("suite {title}").into())
    }

    #[test]
    fn test_invocation_ids_are_unique() {
        assert_ne!(InvocationId::new(), InvocationId::new());
    }

    #[tokio::test]
    async fn test_attributes_to_active_invocation() {
        let interceptor = Interceptor::new();
        let mut g = guard(&interceptor, "a");

        g.handle().raise("boom");

        assert_eq!(g.captured().await, Failure::uncaught("boom"));
        assert!(interceptor.drain_late().is_empty());
    }

    #[test]
    fn test_only_first_error_is_captured() {
        let interceptor = Interceptor::new();
        let mut g = guard(&interceptor, "a");

        g.handle().raise("first");
        g.handle().raise("second");

        assert_eq!(g.complete(), Some(Failure::uncaught("first")));
        assert!(interceptor.drain_late().is_empty());
    }

    #[test]
    fn test_error_after_completion_is_late() {
        let interceptor = Interceptor::new();
        let mut g = guard(&interceptor, "a");
        let handle = g.handle();

        assert_eq!(g.complete(), None);
        assert!(!interceptor.is_installed());

        handle.raise("too late");

        let late = interceptor.drain_late();
        assert_eq!(late.len(), 1);
        assert_eq!(&*late[0].title, "a");
        assert_eq!(&*late[0].full_title, "suite a");
        assert_eq!(late[0].failure, Failure::uncaught("too late"));
        assert!(interceptor.drain_late().is_empty());
    }

    #[test]
    fn test_never_attributes_to_next_invocation() {
        let interceptor = Interceptor::new();
        let first = guard(&interceptor, "first");
        let stale = first.handle();
        drop(first);

        let mut second = guard(&interceptor, "second");
        stale.raise("from first");

        assert_eq!(second.complete(), None);
        let late = interceptor.drain_late();
        assert_eq!(late.len(), 1);
        assert_eq!(&*late[0].title, "first");
    }

    #[test]
    fn test_drop_uninstalls() {
        let interceptor = Interceptor::new();
        {
            let _g = guard(&interceptor, "a");
            assert!(interceptor.is_installed());
        }
        assert!(!interceptor.is_installed());
    }
}
