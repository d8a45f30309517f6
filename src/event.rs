// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Key occurrences in the lifecycle of a run.
//!
//! The top-level enum here is [`RunEvent`]. Events are emitted strictly in
//! execution order, so a reporter may consume them as they arrive.

#[cfg(feature = "timestamps")]
use std::time::SystemTime;

use derive_more::with_trait::{AsRef, Deref, DerefMut};

use crate::{error::Failure, result::Stats, runnable::RunnableKind};

/// Arbitrary event, optionally paired with additional metadata.
///
/// Any metadata is added by enabling the correspondent library feature:
/// - `timestamps`: adds time of when this [`Event`] has happened.
#[derive(AsRef, Clone, Copy, Debug, Deref, DerefMut)]
#[non_exhaustive]
pub struct Event<T: ?Sized> {
    /// [`SystemTime`] when this [`Event`] has happened.
    #[cfg(feature = "timestamps")]
    pub at: SystemTime,

    /// Actual value of this [`Event`].
    #[as_ref]
    #[deref]
    #[deref_mut]
    pub value: T,
}

impl<T> Event<T> {
    /// Creates a new [`Event`] out of the given `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            #[cfg(feature = "timestamps")]
            at: SystemTime::now(),
            value,
        }
    }

    /// Unwraps the inner [`Event::value`] dropping the attached metadata.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Top-level event of a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunEvent {
    /// Scheduling has started.
    Started {
        /// Number of scheduled tests.
        tests: usize,
    },

    /// Event of a [`Suite`].
    ///
    /// [`Suite`]: crate::Suite
    Suite {
        /// Full title of the [`Suite`]. Empty for the root.
        ///
        /// [`Suite`]: crate::Suite
        full_title: String,

        /// What happened.
        event: SuiteEvent,
    },

    /// Event of a single invocation of a [`Runnable`].
    ///
    /// [`Runnable`]: crate::Runnable
    Runnable {
        /// Kind of the [`Runnable`].
        ///
        /// [`Runnable`]: crate::Runnable
        kind: RunnableKind,

        /// Full title of the [`Runnable`].
        ///
        /// [`Runnable`]: crate::Runnable
        full_title: String,

        /// Attempt number, `0` for the first one and for hooks.
        attempt: usize,

        /// What happened.
        event: RunnableEvent,
    },

    /// Test was scheduled but never invoked.
    TestNotRun {
        /// Full title of the test.
        full_title: String,
    },

    /// Test is pending and won't be invoked.
    TestPending {
        /// Full title of the test.
        full_title: String,
    },

    /// Error raised after its runnable had already completed.
    Uncaught {
        /// Full title of the runnable that started the failing operation.
        full_title: String,

        /// Captured error.
        failure: Failure,
    },

    /// Run has finished.
    Finished {
        /// Final counters.
        stats: Stats,
    },
}

/// Event specific to a [`Suite`].
///
/// [`Suite`]: crate::Suite
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SuiteEvent {
    /// [`Suite`] was entered.
    ///
    /// [`Suite`]: crate::Suite
    Started,

    /// [`Suite`] was left, after its after-all hooks.
    ///
    /// [`Suite`]: crate::Suite
    Finished,
}

/// Event specific to a [`Runnable`] invocation.
///
/// [`Runnable`]: crate::Runnable
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunnableEvent {
    /// Invocation has started.
    Started,

    /// Invocation has passed.
    Passed,

    /// Invocation emitted a skip signal.
    Skipped,

    /// Invocation has failed, and this is final.
    Failed(Failure),

    /// Invocation has failed, but another attempt follows.
    Retried(Failure),
}
