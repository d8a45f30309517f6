// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Retry budget of a test.

/// Retries left for a single test, consumed by its failing attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) struct RetryBudget {
    /// Zero-based number of the current attempt.
    attempt: usize,

    /// Retries not consumed yet.
    remaining: usize,
}

impl RetryBudget {
    /// Creates a [`RetryBudget`] allowing `retries` more attempts after the
    /// first one.
    pub(super) const fn new(retries: usize) -> Self {
        Self { attempt: 0, remaining: retries }
    }

    /// Zero-based number of the current attempt.
    pub(super) const fn attempt(&self) -> usize {
        self.attempt
    }

    /// Consumes one retry after a failed attempt, moving to the next one.
    ///
    /// Returns `false` once the budget is spent.
    pub(super) fn consume(&mut self) -> bool {
        let Some(remaining) = self.remaining.checked_sub(1) else {
            return false;
        };
        self.remaining = remaining;
        self.attempt += 1;
        true
    }
}
