// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Depth-first walk over a [`Plan`] driving hooks and tests.

use std::{collections::HashSet, sync::Arc, time::Duration};

use futures::{channel::mpsc, future::LocalBoxFuture, FutureExt as _};
use tracing::Instrument as _;

use crate::{
    error::Failure,
    event::{Event, RunEvent, RunnableEvent, SuiteEvent},
    exclusive::Plan,
    future::yield_now,
    interceptor::Interceptor,
    result::{FailureOrigin, FailureRecord, RunResult, TestRecord, Verdict},
    runnable::{Context, HookKind, Outcome, RunnableKind, State},
    suite::{Child, RunnableId, SuiteId, Tree},
};

use super::{
    invoke::{await_completion, effective_timeout},
    retry::RetryBudget,
};

/// Defaults applied to runnables without their own overrides.
#[derive(Clone, Copy, Debug)]
pub(super) struct Defaults {
    /// Timeout of every runnable.
    pub(super) timeout: Duration,

    /// Retry budget of every test.
    pub(super) retries: usize,

    /// Whether to stop entering nodes after the first failure.
    pub(super) bail: bool,
}

/// How a chain of hooks has ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Chain {
    /// Every hook completed normally.
    Completed,

    /// At least one hook emitted a skip signal, the rest still ran.
    Skipped,

    /// A hook failed, the rest were aborted.
    Failed,
}

/// State of a single run.
pub(super) struct Scheduler {
    /// Frozen suite tree.
    tree: Tree,

    /// Scheduled view of the [`Tree`].
    plan: Plan,

    /// Defaults of the run.
    defaults: Defaults,

    /// Capture of errors escaping completion channels.
    interceptor: Interceptor,

    /// Sender of [`RunEvent`]s, if anyone listens.
    events: Option<mpsc::UnboundedSender<Event<RunEvent>>>,

    /// Result being collected.
    result: RunResult,

    /// Whether the run has bailed out.
    bailed: bool,

    /// Suites whose after-each hooks skipped, so their remaining tests are
    /// skipped too.
    cut_short: HashSet<SuiteId>,
}

impl Scheduler {
    /// Creates a new [`Scheduler`] for the given [`Tree`] and [`Plan`].
    pub(super) fn new(
        tree: Tree,
        plan: Plan,
        defaults: Defaults,
        events: Option<mpsc::UnboundedSender<Event<RunEvent>>>,
    ) -> Self {
        Self {
            tree,
            plan,
            defaults,
            interceptor: Interceptor::new(),
            events,
            result: RunResult::default(),
            bailed: false,
            cut_short: HashSet::new(),
        }
    }

    /// Runs the whole [`Plan`], returning the collected [`RunResult`].
    pub(super) async fn run(mut self) -> RunResult {
        let _binding = self.interceptor.bind();
        self.release_unscheduled();
        self.emit(RunEvent::Started { tests: self.plan.tests_len() });

        let root = self.tree.root();
        if self.plan.is_scheduled(root) {
            self.run_suite(root).await;
        }

        yield_now().await;
        self.drain_late();

        let stats = self.result.stats();
        tracing::debug!(?stats, "run finished");
        self.emit(RunEvent::Finished { stats });
        self.result
    }

    /// Releases everything the [`Plan`] has dropped.
    fn release_unscheduled(&mut self) {
        let scheduled = self
            .plan
            .subtree_tests(self.tree.root())
            .into_iter()
            .collect::<HashSet<_>>();

        for id in self.tree.runnable_ids().collect::<Vec<_>>() {
            let runnable = self.tree.runnable(id);
            let dropped = !self.plan.is_scheduled(runnable.suite())
                || (runnable.kind().is_test() && !scheduled.contains(&id));
            if dropped {
                self.tree.runnable_mut(id).release();
            }
        }
    }

    /// Runs the given entered [`Suite`] with all its scheduled content.
    ///
    /// [`Suite`]: crate::Suite
    fn run_suite(&mut self, id: SuiteId) -> LocalBoxFuture<'_, ()> {
        let full_title = self.tree.suite_full_title(id);
        let span = tracing::debug_span!("suite", title = %full_title);

        async move {
            self.emit(RunEvent::Suite {
                full_title: full_title.clone(),
                event: SuiteEvent::Started,
            });

            if self.tree.is_suite_pending(id) {
                for t in self.plan.subtree_tests(id) {
                    self.record_pending(t);
                }
            } else {
                self.run_suite_body(id).await;
            }

            self.release_subtree(id);
            self.emit(RunEvent::Suite {
                full_title,
                event: SuiteEvent::Finished,
            });
        }
        .instrument(span)
        .boxed_local()
    }

    /// Runs hooks, tests and child suites of a non-pending [`Suite`].
    ///
    /// [`Suite`]: crate::Suite
    async fn run_suite_body(&mut self, id: SuiteId) {
        let before_all = self.hooks_of(id, HookKind::BeforeAll);
        match self.run_hooks(&before_all).await {
            Chain::Completed => {
                for child in self.plan.children(id).to_vec() {
                    match child {
                        Child::Test(t) if self.bailed => {
                            self.record_not_run(t);
                        }
                        Child::Test(t) if self.is_cut_short(id) => {
                            self.record_skipped(t);
                        }
                        Child::Test(t) => self.run_test(id, t).await,
                        Child::Suite(s) if self.bailed => {
                            for t in self.plan.subtree_tests(s) {
                                self.record_not_run(t);
                            }
                        }
                        Child::Suite(s) if self.is_cut_short(id) => {
                            for t in self.plan.subtree_tests(s) {
                                self.record_skipped(t);
                            }
                        }
                        Child::Suite(s) => self.run_suite(s).await,
                    }
                }
            }
            Chain::Skipped => {
                tracing::debug!("before all hooks skipped, skipping subtree");
                for t in self.plan.subtree_tests(id) {
                    self.record_skipped(t);
                }
            }
            Chain::Failed => {
                tracing::debug!("before all hooks failed, subtree won't run");
                for t in self.plan.subtree_tests(id) {
                    self.record_not_run(t);
                }
            }
        }

        _ = self.cut_short.remove(&id);

        let after_all = self.hooks_of(id, HookKind::AfterAll);
        _ = self.run_hooks(&after_all).await;
    }

    /// Indicates whether the given [`Suite`] or any of its ancestors had its
    /// after-each hooks skipped.
    ///
    /// [`Suite`]: crate::Suite
    fn is_cut_short(&self, id: SuiteId) -> bool {
        !self.cut_short.is_empty()
            && self.tree.path(id).iter().any(|s| self.cut_short.contains(s))
    }

    /// Runs a single test along with its each-hooks, retrying it on failure
    /// while the budget allows.
    async fn run_test(&mut self, suite: SuiteId, id: RunnableId) {
        if self.tree.is_test_pending(id) {
            self.record_pending(id);
            return;
        }

        let path = self.tree.path(suite);
        let retries = self
            .tree
            .effective_retries(id)
            .unwrap_or(self.defaults.retries);
        let mut budget = RetryBudget::new(retries);
        let mut attempts = 0;

        let verdict = loop {
            let before_each = path
                .iter()
                .flat_map(|s| self.hooks_of(*s, HookKind::BeforeEach))
                .collect::<Vec<_>>();

            let verdict = match self.run_hooks(&before_each).await {
                Chain::Completed => {
                    attempts += 1;
                    match self.invoke(id).await {
                        Outcome::Continue => Some(Verdict::Passed),
                        Outcome::Skip => Some(Verdict::Pending),
                        Outcome::Fail(failure) => {
                            let failed = budget.attempt();
                            if budget.consume() {
                                tracing::trace!(
                                    attempt = failed,
                                    %failure,
                                    "test failed, retrying",
                                );
                                self.emit_runnable(
                                    id,
                                    RunnableEvent::Retried(failure),
                                );
                                None
                            } else {
                                self.emit_runnable(
                                    id,
                                    RunnableEvent::Failed(failure.clone()),
                                );
                                self.record_failure(
                                    id,
                                    FailureOrigin::Test,
                                    failure,
                                );
                                Some(Verdict::Failed)
                            }
                        }
                    }
                }
                Chain::Skipped => {
                    tracing::debug!("before each hooks skipped the test");
                    self.tree.runnable_mut(id).set_state(State::Skipped);
                    Some(Verdict::Pending)
                }
                Chain::Failed => {
                    tracing::debug!("before each hooks failed, test won't run");
                    Some(Verdict::NotRun)
                }
            };

            for s in path.iter().rev() {
                let after_each = self.hooks_of(*s, HookKind::AfterEach);
                if self.run_hooks(&after_each).await == Chain::Skipped {
                    tracing::debug!(
                        suite = %s,
                        "after each hooks skipped, skipping remaining tests",
                    );
                    _ = self.cut_short.insert(*s);
                }
            }

            match verdict {
                Some(v) => break v,
                None => self.tree.runnable_mut(id).reset_for_retry(),
            }
        };

        match verdict {
            Verdict::Pending => self.emit(RunEvent::TestPending {
                full_title: self.tree.full_title(id),
            }),
            Verdict::NotRun => self.emit(RunEvent::TestNotRun {
                full_title: self.tree.full_title(id),
            }),
            Verdict::Passed | Verdict::Failed => {}
        }
        self.record_test(id, verdict, attempts);
    }

    /// Runs the given hooks in order, until one of them fails.
    ///
    /// A skip doesn't stop the chain: the remaining hooks of the same phase
    /// still run, and the chain reports [`Chain::Skipped`] at the end.
    async fn run_hooks(&mut self, hooks: &[RunnableId]) -> Chain {
        let mut chain = Chain::Completed;
        for &id in hooks {
            let outcome = self.invoke(id).await;
            let kind = self.tree.runnable(id).kind();

            if matches!(
                kind,
                RunnableKind::Hook(HookKind::BeforeAll | HookKind::AfterAll),
            ) {
                self.tree.runnable_mut(id).release();
            }

            match outcome {
                Outcome::Continue => {}
                Outcome::Skip => {
                    tracing::debug!(hook = %kind, "hook skipped");
                    chain = Chain::Skipped;
                }
                Outcome::Fail(failure) => {
                    tracing::debug!(
                        hook = %kind,
                        %failure,
                        "hook failed, aborting chain",
                    );
                    self.emit_runnable(
                        id,
                        RunnableEvent::Failed(failure.clone()),
                    );
                    if let Some(h) = kind.hook() {
                        let origin = FailureOrigin::Hook(h);
                        self.record_failure(id, origin, failure);
                    }
                    return Chain::Failed;
                }
            }
        }
        chain
    }

    /// Invokes a single [`Runnable`] once, binding the interceptor's capture
    /// to this invocation.
    ///
    /// [`Runnable`]: crate::Runnable
    async fn invoke(&mut self, id: RunnableId) -> Outcome {
        let full_title: Arc<str> = self.tree.full_title(id).into();
        let timeout = effective_timeout(
            self.tree.effective_timeout(id).unwrap_or(self.defaults.timeout),
        );

        let runnable = self.tree.runnable(id);
        let kind = runnable.kind();
        let attempt = runnable.current_retry();
        let title: Arc<str> = runnable.display_title().into();

        self.emit_runnable(id, RunnableEvent::Started);
        let span = tracing::debug_span!(
            "runnable",
            %kind,
            title = %full_title,
            attempt,
        );

        let mut guard = self
            .interceptor
            .install(Arc::clone(&title), Arc::clone(&full_title));
        let cx = Context::new(kind, title, full_title, attempt, guard.handle());

        let runnable = self.tree.runnable_mut(id);
        runnable.set_state(State::Running);
        let Some(callback) = runnable.callback_mut() else {
            drop(guard);
            tracing::error!("invoking a released runnable");
            runnable.set_state(State::Failed);
            return Outcome::Fail(Failure::Released);
        };
        let completion = span.in_scope(|| callback.invoke(cx));

        let outcome = await_completion(&mut guard, completion, timeout)
            .instrument(span)
            .await;
        drop(guard);

        self.tree.runnable_mut(id).set_state(match outcome {
            Outcome::Continue => State::Passed,
            Outcome::Skip => State::Skipped,
            Outcome::Fail(_) => State::Failed,
        });
        match &outcome {
            Outcome::Continue => self.emit_runnable(id, RunnableEvent::Passed),
            Outcome::Skip => self.emit_runnable(id, RunnableEvent::Skipped),
            Outcome::Fail(_) => {}
        }

        self.drain_late();
        outcome
    }

    /// Turns errors raised after their runnable completed into run-level
    /// failures.
    fn drain_late(&mut self) {
        for late in self.interceptor.drain_late() {
            self.emit(RunEvent::Uncaught {
                full_title: late.full_title.to_string(),
                failure: late.failure.clone(),
            });
            self.push_failure(FailureRecord {
                title: late.title.to_string(),
                full_title: late.full_title.to_string(),
                origin: FailureOrigin::Uncaught,
                error: late.failure,
            });
        }
    }

    /// Hooks of the given phase declared in the given [`Suite`].
    ///
    /// [`Suite`]: crate::Suite
    fn hooks_of(&self, suite: SuiteId, kind: HookKind) -> Vec<RunnableId> {
        self.tree.suite(suite).hooks().of(kind).to_vec()
    }

    fn record_test(
        &mut self,
        id: RunnableId,
        verdict: Verdict,
        attempts: usize,
    ) {
        let test = self.tree.runnable_mut(id);
        test.release();
        let title = test.title().to_owned();
        self.result.push_test(TestRecord {
            title,
            full_title: self.tree.full_title(id),
            verdict,
            attempts,
        });
    }

    fn record_pending(&mut self, id: RunnableId) {
        self.emit(RunEvent::TestPending {
            full_title: self.tree.full_title(id),
        });
        self.record_test(id, Verdict::Pending, 0);
    }

    fn record_skipped(&mut self, id: RunnableId) {
        self.tree.runnable_mut(id).set_state(State::Skipped);
        self.record_pending(id);
    }

    fn record_not_run(&mut self, id: RunnableId) {
        self.emit(RunEvent::TestNotRun {
            full_title: self.tree.full_title(id),
        });
        self.record_test(id, Verdict::NotRun, 0);
    }

    fn record_failure(
        &mut self,
        id: RunnableId,
        origin: FailureOrigin,
        error: Failure,
    ) {
        self.push_failure(FailureRecord {
            title: self.tree.runnable(id).display_title(),
            full_title: self.tree.full_title(id),
            origin,
            error,
        });
    }

    fn push_failure(&mut self, record: FailureRecord) {
        if self.defaults.bail && !self.bailed {
            tracing::debug!("bailing out after the first failure");
            self.bailed = true;
        }
        self.result.push_failure(record);
    }

    /// Releases every callback of the given [`Suite`]'s subtree.
    ///
    /// [`Suite`]: crate::Suite
    fn release_subtree(&mut self, id: SuiteId) {
        let ids = self
            .tree
            .subtree_hooks(id)
            .into_iter()
            .chain(self.tree.subtree_tests(id));
        for r in ids.collect::<Vec<_>>() {
            self.tree.runnable_mut(r).release();
        }
    }

    fn emit_runnable(&self, id: RunnableId, event: RunnableEvent) {
        let runnable = self.tree.runnable(id);
        self.emit(RunEvent::Runnable {
            kind: runnable.kind(),
            full_title: self.tree.full_title(id),
            attempt: runnable.current_retry(),
            event,
        });
    }

    /// Notifies with the given [`RunEvent`].
    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            // If the receiver end is dropped, then no one listens for events,
            // so we can just ignore it.
            drop(tx.unbounded_send(Event::new(event)));
        }
    }
}
