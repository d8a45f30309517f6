// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tools for executing a [`Tree`].
//!
//! # Order guarantees
//!
//! Exactly one runnable executes at a time. [`Suite`]s are visited
//! depth-first, their tests and child suites in declaration order. For every
//! test, before-each hooks run from the root down to its [`Suite`], and
//! after-each hooks from its [`Suite`] up to the root. [`RunEvent`]s are
//! emitted in this very order.
//!
//! [`Suite`]: crate::Suite

mod invoke;
mod retry;
mod scheduler;

use futures::channel::mpsc;

use self::scheduler::{Defaults, Scheduler};
use crate::{
    cli::Config,
    event::{Event, RunEvent},
    exclusive::Plan,
    result::RunResult,
    suite::Tree,
};

/// Executor of a [`Tree`] producing a [`RunResult`].
///
/// Must be polled inside a [`tokio`] runtime, as timeouts rely on its timer.
#[derive(Debug, Default)]
pub struct Runner {
    /// Configuration of the run.
    config: Config,

    /// Sender of [`RunEvent`]s.
    events: Option<mpsc::UnboundedSender<Event<RunEvent>>>,
}

impl Runner {
    /// Creates a new [`Runner`] with the given [`Config`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, events: None }
    }

    /// Sends [`RunEvent`]s of the run into the given channel.
    #[must_use]
    pub fn with_events(
        mut self,
        events: mpsc::UnboundedSender<Event<RunEvent>>,
    ) -> Self {
        self.events = Some(events);
        self
    }

    /// [`Config`] of this [`Runner`].
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the given [`Tree`].
    ///
    /// The [`Tree`] is consumed, so nothing can be declared once the run has
    /// started. Failures never abort the run: they are collected into the
    /// returned [`RunResult`].
    pub async fn run(self, tree: Tree) -> RunResult {
        let Self { config, events } = self;

        let plan = Plan::resolve(&tree, config.grep.as_ref());
        tracing::debug!(
            tests = plan.tests_len(),
            exclusive = plan.is_exclusive(),
            "resolved run plan",
        );

        let defaults = Defaults {
            timeout: config.timeout,
            retries: config.retries,
            bail: config.bail,
        };
        Scheduler::new(tree, plan, defaults, events).run().await
    }
}
