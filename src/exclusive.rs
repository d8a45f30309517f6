// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Resolution of the scheduled subset of a [`Tree`].
//!
//! A [`Plan`] is computed exactly once before scheduling begins. It applies
//! the exclusivity markers first and the [`Grep`] filter afterwards, then
//! prunes every [`Suite`] left without tests. Dropped nodes never enter the
//! schedule and never produce records.
//!
//! [`Suite`]: crate::Suite

use std::collections::HashMap;

use regex::Regex;

use crate::{
    error::{ConfigError, ConfigResult},
    suite::{Child, RunnableId, SuiteId, Tree},
};

/// Filter of tests by their full title.
#[derive(Clone, Debug)]
pub struct Grep {
    /// Pattern matched against full titles.
    regex: Regex,

    /// Whether matching tests are dropped instead of kept.
    invert: bool,
}

impl Grep {
    /// Creates a new [`Grep`] out of an already compiled [`Regex`].
    #[must_use]
    pub const fn new(regex: Regex, invert: bool) -> Self {
        Self { regex, invert }
    }

    /// Compiles the given `pattern` into a [`Grep`].
    ///
    /// # Errors
    ///
    /// If the `pattern` is not a valid [`Regex`].
    pub fn parse(pattern: &str, invert: bool) -> ConfigResult<Self> {
        Regex::new(pattern)
            .map(|regex| Self::new(regex, invert))
            .map_err(|e| ConfigError::invalid_grep(pattern, e))
    }

    /// Indicates whether a test with the given full title is kept.
    #[must_use]
    pub fn is_kept(&self, full_title: &str) -> bool {
        self.regex.is_match(full_title) != self.invert
    }
}

/// Scheduled view of a [`Tree`].
#[derive(Clone, Debug, Default)]
pub struct Plan {
    /// Scheduled children of every entered [`Suite`]. A [`Suite`] missing
    /// here is never entered.
    ///
    /// [`Suite`]: crate::Suite
    children: HashMap<SuiteId, Vec<Child>>,

    /// Whether any exclusivity marker was found.
    exclusive: bool,

    /// Number of scheduled tests.
    tests: usize,
}

impl Plan {
    /// Resolves the [`Plan`] of the given [`Tree`].
    #[must_use]
    pub fn resolve(tree: &Tree, grep: Option<&Grep>) -> Self {
        let mut resolver = Resolver {
            tree,
            has_only: HashMap::new(),
            children: HashMap::new(),
        };

        let root = tree.root();
        let exclusive = resolver.has_only(root);
        if exclusive {
            tracing::debug!("exclusive markers found, filtering the tree");
            _ = resolver.filter_only(root);
        }

        let mut plan = Self { children: HashMap::new(), exclusive, tests: 0 };
        _ = plan.prune(tree, root, &resolver.children, grep);
        plan
    }

    /// Keeps the scheduled children of the given [`Suite`], and returns
    /// whether it has any test to run.
    ///
    /// [`Suite`]: crate::Suite
    fn prune(
        &mut self,
        tree: &Tree,
        id: SuiteId,
        filtered: &HashMap<SuiteId, Vec<Child>>,
        grep: Option<&Grep>,
    ) -> bool {
        let children =
            filtered.get(&id).map_or(tree.suite(id).children(), Vec::as_slice);

        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            let keep = match *child {
                Child::Test(t) => {
                    let keep =
                        grep.map_or(true, |g| g.is_kept(&tree.full_title(t)));
                    self.tests += usize::from(keep);
                    keep
                }
                Child::Suite(s) => self.prune(tree, s, filtered, grep),
            };
            if keep {
                kept.push(*child);
            }
        }

        let keep = !kept.is_empty();
        if keep {
            _ = self.children.insert(id, kept);
        }
        keep
    }

    /// Indicates whether the given [`Suite`] is entered at all.
    ///
    /// [`Suite`]: crate::Suite
    #[must_use]
    pub fn is_scheduled(&self, suite: SuiteId) -> bool {
        self.children.contains_key(&suite)
    }

    /// Scheduled children of the given [`Suite`] in declaration order.
    ///
    /// [`Suite`]: crate::Suite
    #[must_use]
    pub fn children(&self, suite: SuiteId) -> &[Child] {
        self.children.get(&suite).map_or(&[], Vec::as_slice)
    }

    /// Scheduled tests in the subtree of the given [`Suite`], depth-first.
    ///
    /// [`Suite`]: crate::Suite
    #[must_use]
    pub fn subtree_tests(&self, suite: SuiteId) -> Vec<RunnableId> {
        let mut out = Vec::new();
        self.collect_tests(suite, &mut out);
        out
    }

    fn collect_tests(&self, suite: SuiteId, out: &mut Vec<RunnableId>) {
        for child in self.children(suite) {
            match *child {
                Child::Test(t) => out.push(t),
                Child::Suite(s) => self.collect_tests(s, out),
            }
        }
    }

    /// Indicates whether the [`Tree`] contained any exclusivity marker.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Number of scheduled tests.
    #[must_use]
    pub const fn tests_len(&self) -> usize {
        self.tests
    }
}

/// Single-pass evaluation of the exclusivity markers.
struct Resolver<'t> {
    /// Declared [`Tree`].
    tree: &'t Tree,

    /// Memoized "has exclusive descendants" answers.
    has_only: HashMap<SuiteId, bool>,

    /// Children left by the exclusivity filter.
    children: HashMap<SuiteId, Vec<Child>>,
}

impl Resolver<'_> {
    /// Indicates whether the given [`Suite`] has an exclusive test or child
    /// suite anywhere below it. Evaluated once per [`Suite`].
    ///
    /// [`Suite`]: crate::Suite
    fn has_only(&mut self, id: SuiteId) -> bool {
        if let Some(memo) = self.has_only.get(&id) {
            return *memo;
        }

        let tree = self.tree;
        let suite = tree.suite(id);
        let has = suite.tests().any(|t| tree.runnable(t).is_exclusive())
            || suite.suites().any(|s| tree.suite(s).is_exclusive())
            || suite.suites().any(|s| self.has_only(s));

        _ = self.has_only.insert(id, has);
        has
    }

    /// Narrows the given [`Suite`] down to its exclusive content, and returns
    /// whether anything is left to run in it.
    ///
    /// Exclusive tests win over everything else in their [`Suite`]. Otherwise
    /// exclusive child suites are kept (narrowed only if they nest markers
    /// themselves), and other child suites survive only if they have
    /// exclusive descendants.
    ///
    /// [`Suite`]: crate::Suite
    fn filter_only(&mut self, id: SuiteId) -> bool {
        if let Some(done) = self.children.get(&id) {
            return !done.is_empty();
        }

        let tree = self.tree;
        let suite = tree.suite(id);

        let only_tests = suite
            .tests()
            .filter(|t| tree.runnable(*t).is_exclusive())
            .map(Child::Test)
            .collect::<Vec<_>>();

        let kept = if only_tests.is_empty() {
            let mut kept = Vec::new();
            for s in suite.suites() {
                let keep = if tree.suite(s).is_exclusive() {
                    if self.has_only(s) {
                        _ = self.filter_only(s);
                    }
                    true
                } else {
                    self.filter_only(s)
                };
                if keep {
                    kept.push(Child::Suite(s));
                }
            }
            kept
        } else {
            only_tests
        };

        let keep = !kept.is_empty();
        _ = self.children.insert(id, kept);
        keep
    }
}
