// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Hooks and tests: the atomic units the scheduler executes.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use derive_more::with_trait::Display;
use futures::{
    channel::oneshot,
    future::LocalBoxFuture,
    FutureExt as _,
};

use crate::{
    error::Failure,
    interceptor::{catch, catch_future, UncaughtHandle},
    suite::SuiteId,
};

/// Phase a hook is bound to.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "output-json", derive(serde::Serialize))]
#[cfg_attr(feature = "output-json", serde(rename_all = "snake_case"))]
pub enum HookKind {
    /// Runs once before any test or child suite of its suite.
    #[display("before all")]
    BeforeAll,

    /// Runs before every test of its suite and of its descendants.
    #[display("before each")]
    BeforeEach,

    /// Runs after every test of its suite and of its descendants.
    #[display("after each")]
    AfterEach,

    /// Runs once after all tests and child suites of its suite.
    #[display("after all")]
    AfterAll,
}

impl HookKind {
    /// All the [`HookKind`]s in their scheduling order.
    pub const ALL: [Self; 4] =
        [Self::BeforeAll, Self::BeforeEach, Self::AfterEach, Self::AfterAll];
}

/// Kind of a [`Runnable`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum RunnableKind {
    /// Hook of the given phase.
    #[display("{_0} hook")]
    Hook(HookKind),

    /// Test.
    #[display("test")]
    Test,
}

impl RunnableKind {
    /// Returns the [`HookKind`] if this is a hook.
    #[must_use]
    pub const fn hook(self) -> Option<HookKind> {
        match self {
            Self::Hook(kind) => Some(kind),
            Self::Test => None,
        }
    }

    /// Indicates whether this is a [`RunnableKind::Test`].
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Test)
    }
}

impl From<HookKind> for RunnableKind {
    fn from(kind: HookKind) -> Self {
        Self::Hook(kind)
    }
}

/// Lifecycle state of a [`Runnable`].
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq)]
pub enum State {
    /// Not invoked yet (or reset for a retry).
    #[default]
    #[display("pending")]
    Pending,

    /// Currently executing.
    #[display("running")]
    Running,

    /// Finished successfully.
    #[display("passed")]
    Passed,

    /// Finished with a [`Failure`].
    #[display("failed")]
    Failed,

    /// Emitted a skip signal.
    #[display("skipped")]
    Skipped,
}

impl State {
    /// Indicates whether this [`State`] is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Skipped)
    }
}

/// Result of a single execution step of a [`Runnable`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Completed normally, scheduling continues.
    Continue,

    /// Aborted via a skip signal.
    Skip,

    /// Failed.
    Fail(Failure),
}

impl Outcome {
    /// Creates an [`Outcome::Fail`] with a [`Failure::Assertion`].
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(Failure::assertion(message))
    }

    /// Returns the [`Failure`], if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Fail(f) => Some(f),
            Self::Continue | Self::Skip => None,
        }
    }
}

impl From<()> for Outcome {
    fn from((): ()) -> Self {
        Self::Continue
    }
}

impl From<Failure> for Outcome {
    fn from(failure: Failure) -> Self {
        Self::Fail(failure)
    }
}

impl<E: fmt::Display> From<Result<(), E>> for Outcome {
    fn from(res: Result<(), E>) -> Self {
        match res {
            Ok(()) => Self::Continue,
            Err(e) => Self::fail(e.to_string()),
        }
    }
}

/// Code of a [`Runnable`].
pub enum Callback {
    /// Completes as soon as it returns.
    Sync(Box<dyn FnMut(&Context) -> Outcome>),

    /// Completes when the returned [`Future`] resolves.
    Future(Box<dyn FnMut(Context) -> LocalBoxFuture<'static, Outcome>>),

    /// Completes when the provided [`Done`] is called.
    Done(Box<dyn FnMut(Context, Done)>),
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sync(_) => "Callback::Sync",
            Self::Future(_) => "Callback::Future",
            Self::Done(_) => "Callback::Done",
        })
    }
}

impl Callback {
    /// Creates a synchronous [`Callback`].
    pub fn sync<F, O>(mut f: F) -> Self
    where
        F: FnMut(&Context) -> O + 'static,
        O: Into<Outcome>,
    {
        Self::Sync(Box::new(move |cx| f(cx).into()))
    }

    /// Creates a [`Callback`] completing with the returned [`Future`].
    pub fn future<F, Fut>(mut f: F) -> Self
    where
        F: FnMut(Context) -> Fut + 'static,
        Fut: Future + 'static,
        Fut::Output: Into<Outcome>,
    {
        Self::Future(Box::new(move |cx| f(cx).map(Into::into).boxed_local()))
    }

    /// Creates a [`Callback`] completing via an explicit [`Done`] signal.
    pub fn done<F>(f: F) -> Self
    where
        F: FnMut(Context, Done) + 'static,
    {
        Self::Done(Box::new(f))
    }

    /// Invokes this [`Callback`], converting panics of its synchronous part
    /// and of the returned [`Future`] into [`Failure::Assertion`]s.
    pub(crate) fn invoke(
        &mut self,
        cx: Context,
    ) -> LocalBoxFuture<'static, Outcome> {
        let fail = |p: Box<dyn std::any::Any + Send>| {
            Outcome::Fail(Failure::from_panic(&*p))
        };

        match self {
            Self::Sync(f) => {
                let res = catch(|| f(&cx));
                futures::future::ready(res.unwrap_or_else(fail)).boxed_local()
            }
            Self::Future(f) => {
                match catch(|| f(cx)) {
                    Ok(fut) => catch_future(fut)
                        .map(move |res| res.unwrap_or_else(fail))
                        .boxed_local(),
                    Err(p) => futures::future::ready(fail(p)).boxed_local(),
                }
            }
            Self::Done(f) => {
                let (done, rx) = Done::channel();
                match catch(|| f(cx, done)) {
                    Ok(()) => rx
                        .map(|res| {
                            res.unwrap_or(Outcome::Fail(Failure::DoneDropped))
                        })
                        .boxed_local(),
                    Err(p) => futures::future::ready(fail(p)).boxed_local(),
                }
            }
        }
    }
}

/// Explicit completion channel of a [`Callback::Done`].
///
/// Signals sent after the [`Runnable`] has been recorded are ignored. Dropping
/// it without calling fails the [`Runnable`] with [`Failure::DoneDropped`].
#[derive(Debug)]
pub struct Done {
    /// Sender half of the completion channel.
    tx: oneshot::Sender<Outcome>,
}

impl Done {
    /// Creates a new [`Done`] along with the receiving half.
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Signals completion with the given [`Outcome`].
    pub fn call(self, outcome: impl Into<Outcome>) {
        if self.tx.send(outcome.into()).is_err() {
            tracing::warn!("completion signalled after the runnable finished");
        }
    }

    /// Signals successful completion.
    pub fn ok(self) {
        self.call(Outcome::Continue);
    }

    /// Signals completion with a skip.
    pub fn skip(self) {
        self.call(Outcome::Skip);
    }

    /// Signals completion with a [`Failure::Assertion`].
    pub fn fail(self, message: impl Into<String>) {
        self.call(Outcome::fail(message));
    }
}

/// Per-invocation context handed to a [`Callback`].
#[derive(Clone, Debug)]
pub struct Context {
    /// Kind of the invoked [`Runnable`].
    kind: RunnableKind,

    /// Title of the invoked [`Runnable`].
    title: Arc<str>,

    /// Title including all the ancestor suites.
    full_title: Arc<str>,

    /// Number of the current retry attempt.
    current_retry: usize,

    /// Capture of errors escaping the completion channel.
    uncaught: UncaughtHandle,
}

impl Context {
    /// Creates a new [`Context`].
    pub(crate) const fn new(
        kind: RunnableKind,
        title: Arc<str>,
        full_title: Arc<str>,
        current_retry: usize,
        uncaught: UncaughtHandle,
    ) -> Self {
        Self { kind, title, full_title, current_retry, uncaught }
    }

    /// Kind of the invoked [`Runnable`].
    #[must_use]
    pub const fn kind(&self) -> RunnableKind {
        self.kind
    }

    /// Title of the invoked [`Runnable`].
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Title of the invoked [`Runnable`] prefixed with its suites' titles.
    #[must_use]
    pub fn full_title(&self) -> &str {
        &self.full_title
    }

    /// Number of the current retry attempt: `0` for the first attempt and
    /// always `0` for hooks.
    #[must_use]
    pub const fn current_retry(&self) -> usize {
        self.current_retry
    }

    /// Handle for raising errors outside of the completion channel, e.g. from
    /// a detached thread.
    #[must_use]
    pub fn uncaught(&self) -> UncaughtHandle {
        self.uncaught.clone()
    }

    /// Spawns a detached [`Future`] on the current [`tokio`] runtime.
    ///
    /// A panic inside it is routed to the interceptor: attributed to this
    /// invocation while it's still running, or recorded as a run-level
    /// failure afterwards.
    pub fn spawn<F>(&self, fut: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let uncaught = self.uncaught.clone();
        tokio::spawn(async move {
            if let Err(p) = catch_future(fut).await {
                uncaught.raise(Failure::uncaught_from_panic(&*p));
            }
        })
    }
}

/// Hook or test declared in a [`Suite`].
///
/// [`Suite`]: crate::Suite
#[derive(Debug)]
pub struct Runnable {
    /// Kind of this [`Runnable`].
    kind: RunnableKind,

    /// Title of this [`Runnable`].
    title: String,

    /// Suite that declared this [`Runnable`].
    suite: SuiteId,

    /// Code of this [`Runnable`], released once the final state is recorded.
    callback: Option<Callback>,

    /// Own timeout override.
    timeout: Option<Duration>,

    /// Own retries override. Ignored for hooks.
    retries: Option<usize>,

    /// Number of the current retry attempt.
    current_retry: usize,

    /// Lifecycle state.
    state: State,

    /// Whether this test is marked exclusive.
    exclusive: bool,

    /// Whether this test is marked pending.
    pending: bool,
}

impl Runnable {
    /// Creates a new [`Runnable`] in [`State::Pending`].
    pub(crate) fn new(
        kind: RunnableKind,
        title: impl Into<String>,
        suite: SuiteId,
        callback: Option<Callback>,
    ) -> Self {
        let pending = callback.is_none();
        Self {
            kind,
            title: title.into(),
            suite,
            callback,
            timeout: None,
            retries: None,
            current_retry: 0,
            state: State::Pending,
            exclusive: false,
            pending,
        }
    }

    /// Kind of this [`Runnable`].
    #[must_use]
    pub const fn kind(&self) -> RunnableKind {
        self.kind
    }

    /// Declared title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Title as reported: hooks are prefixed with their phase.
    #[must_use]
    pub fn display_title(&self) -> String {
        match self.kind {
            RunnableKind::Test => self.title.clone(),
            RunnableKind::Hook(h) if self.title.is_empty() => {
                format!("\"{h}\" hook")
            }
            RunnableKind::Hook(h) => format!("\"{h}\" hook: {}", self.title),
        }
    }

    /// Suite that declared this [`Runnable`].
    #[must_use]
    pub const fn suite(&self) -> SuiteId {
        self.suite
    }

    /// Current lifecycle [`State`].
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Number of the current retry attempt. Defined (`0`) before any attempt.
    #[must_use]
    pub const fn current_retry(&self) -> usize {
        self.current_retry
    }

    /// Own timeout override.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Own retries override.
    #[must_use]
    pub const fn retries(&self) -> Option<usize> {
        self.retries
    }

    /// Whether this test is marked exclusive.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Whether this test is marked pending.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether the [`Callback`] has been released.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.callback.is_none()
    }

    /// Overrides the timeout. [`Duration::ZERO`] disables it.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the retry budget. Hooks are never retried.
    pub fn set_retries(&mut self, retries: usize) -> &mut Self {
        self.retries = Some(retries);
        self
    }

    pub(crate) fn mark_exclusive(&mut self) {
        self.exclusive = true;
    }

    pub(crate) fn mark_pending(&mut self) {
        self.pending = true;
    }

    pub(crate) fn set_state(&mut self, state: State) {
        self.state = state;
    }

    /// Resets this [`Runnable`] for the next retry attempt.
    pub(crate) fn reset_for_retry(&mut self) {
        self.state = State::Pending;
        self.current_retry += 1;
    }

    pub(crate) fn callback_mut(&mut self) -> Option<&mut Callback> {
        self.callback.as_mut()
    }

    /// Drops the [`Callback`] along with everything it captured.
    pub(crate) fn release(&mut self) {
        drop(self.callback.take());
    }
}
