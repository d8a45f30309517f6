// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Declarative [`Suite`] tree.
//!
//! [`Suite`]s and [`Runnable`]s live in a [`Tree`] arena and refer to each
//! other by [`SuiteId`] and [`RunnableId`], so the parent back-reference of a
//! [`Suite`] never owns anything. The [`Tree`] is moved into the runner, which
//! freezes it: nothing can be declared once a run has started.

use std::{iter, time::Duration};

use derive_more::with_trait::Display;
use itertools::Itertools as _;

use crate::runnable::{Callback, HookKind, Runnable, RunnableKind};

/// ID of a [`Suite`] in its [`Tree`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SuiteId(usize);

impl SuiteId {
    /// ID of the root [`Suite`] of every [`Tree`].
    pub const ROOT: Self = Self(0);
}

/// ID of a [`Runnable`] in its [`Tree`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RunnableId(usize);

/// Child of a [`Suite`], in declaration order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Child {
    /// Test declared directly in the [`Suite`].
    Test(RunnableId),

    /// Nested [`Suite`].
    Suite(SuiteId),
}

/// Hooks of a [`Suite`], grouped by phase in declaration order.
#[derive(Clone, Debug, Default)]
pub struct Hooks {
    /// [`HookKind::BeforeAll`] hooks.
    pub before_all: Vec<RunnableId>,

    /// [`HookKind::BeforeEach`] hooks.
    pub before_each: Vec<RunnableId>,

    /// [`HookKind::AfterEach`] hooks.
    pub after_each: Vec<RunnableId>,

    /// [`HookKind::AfterAll`] hooks.
    pub after_all: Vec<RunnableId>,
}

impl Hooks {
    /// Hooks of the given phase.
    #[must_use]
    pub fn of(&self, kind: HookKind) -> &[RunnableId] {
        match kind {
            HookKind::BeforeAll => &self.before_all,
            HookKind::BeforeEach => &self.before_each,
            HookKind::AfterEach => &self.after_each,
            HookKind::AfterAll => &self.after_all,
        }
    }

    fn of_mut(&mut self, kind: HookKind) -> &mut Vec<RunnableId> {
        match kind {
            HookKind::BeforeAll => &mut self.before_all,
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterEach => &mut self.after_each,
            HookKind::AfterAll => &mut self.after_all,
        }
    }

    /// All the hooks of every phase.
    pub fn iter(&self) -> impl Iterator<Item = RunnableId> + '_ {
        HookKind::ALL.into_iter().flat_map(|k| self.of(k).iter().copied())
    }
}

/// Named grouping node of the [`Tree`].
#[derive(Clone, Debug)]
pub struct Suite {
    /// Title of this [`Suite`]. Empty for the root.
    title: String,

    /// Non-owning back-reference to the parent.
    parent: Option<SuiteId>,

    /// Tests and child suites in declaration order.
    children: Vec<Child>,

    /// Hooks of this [`Suite`].
    hooks: Hooks,

    /// Whether this [`Suite`] is marked exclusive.
    exclusive: bool,

    /// Whether this [`Suite`] is marked pending.
    pending: bool,

    /// Timeout inherited by runnables without their own.
    timeout: Option<Duration>,

    /// Retries inherited by tests without their own.
    retries: Option<usize>,
}

impl Suite {
    fn new(title: impl Into<String>, parent: Option<SuiteId>) -> Self {
        Self {
            title: title.into(),
            parent,
            children: Vec::new(),
            hooks: Hooks::default(),
            exclusive: false,
            pending: false,
            timeout: None,
            retries: None,
        }
    }

    /// Title of this [`Suite`].
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Parent of this [`Suite`], if it's not the root.
    #[must_use]
    pub const fn parent(&self) -> Option<SuiteId> {
        self.parent
    }

    /// Tests and child suites in declaration order.
    #[must_use]
    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Tests declared directly in this [`Suite`].
    pub fn tests(&self) -> impl Iterator<Item = RunnableId> + '_ {
        self.children.iter().filter_map(|c| match c {
            Child::Test(id) => Some(*id),
            Child::Suite(_) => None,
        })
    }

    /// Child suites of this [`Suite`].
    pub fn suites(&self) -> impl Iterator<Item = SuiteId> + '_ {
        self.children.iter().filter_map(|c| match c {
            Child::Suite(id) => Some(*id),
            Child::Test(_) => None,
        })
    }

    /// Hooks of this [`Suite`].
    #[must_use]
    pub const fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Whether this [`Suite`] itself is marked exclusive.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Whether this [`Suite`] itself is marked pending.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }
}

/// Arena holding a [`Suite`] hierarchy with all its [`Runnable`]s.
#[derive(Debug)]
pub struct Tree {
    /// All the [`Suite`]s, indexed by [`SuiteId`].
    suites: Vec<Suite>,

    /// All the [`Runnable`]s, indexed by [`RunnableId`].
    runnables: Vec<Runnable>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a new [`Tree`] with an empty root [`Suite`].
    #[must_use]
    pub fn new() -> Self {
        Self { suites: vec![Suite::new("", None)], runnables: Vec::new() }
    }

    /// ID of the root [`Suite`].
    #[must_use]
    pub const fn root(&self) -> SuiteId {
        SuiteId::ROOT
    }

    /// Appends a child [`Suite`] to the given one.
    pub fn add_suite(
        &mut self,
        parent: SuiteId,
        title: impl Into<String>,
    ) -> SuiteId {
        let id = SuiteId(self.suites.len());
        self.suites.push(Suite::new(title, Some(parent)));
        self.suites[parent.0].children.push(Child::Suite(id));
        id
    }

    /// Appends a test to the given [`Suite`].
    pub fn add_test(
        &mut self,
        suite: SuiteId,
        title: impl Into<String>,
        callback: Callback,
    ) -> RunnableId {
        self.push_test(suite, title, Some(callback))
    }

    /// Appends a pending test (one without any code) to the given [`Suite`].
    pub fn add_pending_test(
        &mut self,
        suite: SuiteId,
        title: impl Into<String>,
    ) -> RunnableId {
        self.push_test(suite, title, None)
    }

    fn push_test(
        &mut self,
        suite: SuiteId,
        title: impl Into<String>,
        callback: Option<Callback>,
    ) -> RunnableId {
        let id = self.push_runnable(RunnableKind::Test, suite, title, callback);
        self.suites[suite.0].children.push(Child::Test(id));
        id
    }

    /// Appends an untitled hook of the given phase to the given [`Suite`].
    pub fn add_hook(
        &mut self,
        suite: SuiteId,
        kind: HookKind,
        callback: Callback,
    ) -> RunnableId {
        self.add_named_hook(suite, kind, "", callback)
    }

    /// Appends a titled hook of the given phase to the given [`Suite`].
    pub fn add_named_hook(
        &mut self,
        suite: SuiteId,
        kind: HookKind,
        title: impl Into<String>,
        callback: Callback,
    ) -> RunnableId {
        let id =
            self.push_runnable(kind.into(), suite, title, Some(callback));
        self.suites[suite.0].hooks.of_mut(kind).push(id);
        id
    }

    fn push_runnable(
        &mut self,
        kind: RunnableKind,
        suite: SuiteId,
        title: impl Into<String>,
        callback: Option<Callback>,
    ) -> RunnableId {
        let id = RunnableId(self.runnables.len());
        self.runnables.push(Runnable::new(kind, title, suite, callback));
        id
    }

    /// Marks the given [`Suite`] exclusive.
    ///
    /// Descendants aren't touched: the exclusivity is inherited while
    /// resolving the run plan.
    pub fn mark_exclusive(&mut self, suite: SuiteId) {
        self.suites[suite.0].exclusive = true;
    }

    /// Marks the given test exclusive.
    pub fn mark_test_exclusive(&mut self, test: RunnableId) {
        self.runnables[test.0].mark_exclusive();
    }

    /// Marks the given [`Suite`] pending: none of its hooks run and all of
    /// its tests are reported pending.
    pub fn mark_pending(&mut self, suite: SuiteId) {
        self.suites[suite.0].pending = true;
    }

    /// Marks the given test pending.
    pub fn mark_test_pending(&mut self, test: RunnableId) {
        self.runnables[test.0].mark_pending();
    }

    /// Sets the timeout inherited by the [`Suite`]'s runnables.
    pub fn set_suite_timeout(&mut self, suite: SuiteId, timeout: Duration) {
        self.suites[suite.0].timeout = Some(timeout);
    }

    /// Sets the retries inherited by the [`Suite`]'s tests.
    pub fn set_suite_retries(&mut self, suite: SuiteId, retries: usize) {
        self.suites[suite.0].retries = Some(retries);
    }

    /// Returns the [`Suite`] with the given ID.
    #[must_use]
    pub fn suite(&self, id: SuiteId) -> &Suite {
        &self.suites[id.0]
    }

    /// Returns the [`Runnable`] with the given ID.
    #[must_use]
    pub fn runnable(&self, id: RunnableId) -> &Runnable {
        &self.runnables[id.0]
    }

    /// Returns the [`Runnable`] with the given ID for configuring it.
    pub fn runnable_mut(&mut self, id: RunnableId) -> &mut Runnable {
        &mut self.runnables[id.0]
    }

    /// IDs of all the declared [`Runnable`]s.
    pub fn runnable_ids(&self) -> impl Iterator<Item = RunnableId> {
        (0..self.runnables.len()).map(RunnableId)
    }

    /// Number of [`Suite`]s, including the root.
    #[must_use]
    pub fn suites_len(&self) -> usize {
        self.suites.len()
    }

    /// Number of declared tests.
    #[must_use]
    pub fn tests_len(&self) -> usize {
        self.runnables.iter().filter(|r| r.kind().is_test()).count()
    }

    /// The given [`Suite`] followed by all its ancestors up to the root.
    pub fn ancestors(&self, id: SuiteId) -> impl Iterator<Item = SuiteId> + '_ {
        iter::successors(Some(id), |s| self.suite(*s).parent)
    }

    /// Path of [`Suite`]s from the root down to the given one.
    #[must_use]
    pub fn path(&self, id: SuiteId) -> Vec<SuiteId> {
        let mut path = self.ancestors(id).collect::<Vec<_>>();
        path.reverse();
        path
    }

    /// Title of the given [`Suite`] prefixed with its ancestors' titles.
    #[must_use]
    pub fn suite_full_title(&self, id: SuiteId) -> String {
        self.path(id)
            .into_iter()
            .map(|s| self.suite(s).title())
            .filter(|t| !t.is_empty())
            .join(" ")
    }

    /// Title of the given [`Runnable`] prefixed with its suites' titles.
    #[must_use]
    pub fn full_title(&self, id: RunnableId) -> String {
        let runnable = self.runnable(id);
        let prefix = self.suite_full_title(runnable.suite());
        let title = runnable.display_title();
        if prefix.is_empty() {
            title
        } else {
            format!("{prefix} {title}")
        }
    }

    /// Whether the given [`Suite`] or any of its ancestors is pending.
    #[must_use]
    pub fn is_suite_pending(&self, id: SuiteId) -> bool {
        self.ancestors(id).any(|s| self.suite(s).pending)
    }

    /// Whether the given test is pending, by itself or via its suites.
    #[must_use]
    pub fn is_test_pending(&self, id: RunnableId) -> bool {
        let test = self.runnable(id);
        test.is_pending() || self.is_suite_pending(test.suite())
    }

    /// Effective timeout of the given [`Runnable`], if overridden by itself
    /// or any of its suites.
    #[must_use]
    pub fn effective_timeout(&self, id: RunnableId) -> Option<Duration> {
        let runnable = self.runnable(id);
        runnable.timeout().or_else(|| {
            self.ancestors(runnable.suite())
                .find_map(|s| self.suite(s).timeout)
        })
    }

    /// Effective retries of the given test, if overridden by itself or any of
    /// its suites. Always [`None`] for hooks.
    #[must_use]
    pub fn effective_retries(&self, id: RunnableId) -> Option<usize> {
        let runnable = self.runnable(id);
        if !runnable.kind().is_test() {
            return None;
        }
        runnable.retries().or_else(|| {
            self.ancestors(runnable.suite())
                .find_map(|s| self.suite(s).retries)
        })
    }

    /// All the tests in the subtree of the given [`Suite`], depth-first in
    /// declaration order.
    #[must_use]
    pub fn subtree_tests(&self, id: SuiteId) -> Vec<RunnableId> {
        let mut out = Vec::new();
        self.collect_tests(id, &mut out);
        out
    }

    fn collect_tests(&self, id: SuiteId, out: &mut Vec<RunnableId>) {
        for child in &self.suite(id).children {
            match *child {
                Child::Test(t) => out.push(t),
                Child::Suite(s) => self.collect_tests(s, out),
            }
        }
    }

    /// All the hooks in the subtree of the given [`Suite`].
    #[must_use]
    pub fn subtree_hooks(&self, id: SuiteId) -> Vec<RunnableId> {
        let mut out = self.suite(id).hooks.iter().collect::<Vec<_>>();
        for s in self.suite(id).suites() {
            out.extend(self.subtree_hooks(s));
        }
        out
    }
}
