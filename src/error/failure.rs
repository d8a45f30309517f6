// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Failures a single [`Runnable`] may finish with.
//!
//! [`Runnable`]: crate::Runnable

use std::{any::Any, time::Duration};

use derive_more::with_trait::{Display, Error};

/// Reason of a [`Runnable`] being recorded as failed.
///
/// [`Runnable`]: crate::Runnable
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
#[cfg_attr(feature = "output-json", derive(serde::Serialize))]
#[cfg_attr(
    feature = "output-json",
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum Failure {
    /// Logic of the [`Runnable`] itself signalled a failure, either by
    /// returning [`Outcome::Fail`] or by panicking.
    ///
    /// [`Outcome::Fail`]: crate::Outcome::Fail
    /// [`Runnable`]: crate::Runnable
    #[display("{message}")]
    Assertion {
        /// Human-readable message.
        #[error(not(source))]
        message: String,
    },

    /// Completion of the [`Runnable`] wasn't observed in time.
    ///
    /// [`Runnable`]: crate::Runnable
    #[display(
        "Timeout of {}ms exceeded. Ensure the runnable completes in time.",
        duration.as_millis()
    )]
    Timeout {
        /// Timeout that was exceeded.
        #[error(not(source))]
        duration: Duration,
    },

    /// Error escaped the normal completion path of the [`Runnable`] and was
    /// captured by the [`Interceptor`].
    ///
    /// [`Interceptor`]: crate::Interceptor
    /// [`Runnable`]: crate::Runnable
    #[display("{message}")]
    Uncaught {
        /// Human-readable message.
        #[error(not(source))]
        message: String,
    },

    /// [`Done`] handle was dropped without signalling completion.
    ///
    /// [`Done`]: crate::Done
    #[display("`done()` was dropped without being called")]
    DoneDropped,

    /// [`Runnable`] was invoked once more after its callback had been
    /// released.
    ///
    /// [`Runnable`]: crate::Runnable
    #[display("Callback was invoked after being released")]
    Released,
}

impl Failure {
    /// Creates a new [`Failure::Assertion`].
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion { message: message.into() }
    }

    /// Creates a new [`Failure::Timeout`].
    #[must_use]
    pub const fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Creates a new [`Failure::Uncaught`].
    #[must_use]
    pub fn uncaught(message: impl Into<String>) -> Self {
        Self::Uncaught { message: message.into() }
    }

    /// Converts a [`catch_unwind()`] payload into a [`Failure::Assertion`].
    ///
    /// [`catch_unwind()`]: std::panic::catch_unwind
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::assertion(payload.to_readable_string())
    }

    /// Converts a [`catch_unwind()`] payload into a [`Failure::Uncaught`].
    ///
    /// [`catch_unwind()`]: std::panic::catch_unwind
    #[must_use]
    pub fn uncaught_from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::uncaught(payload.to_readable_string())
    }

    /// Returns the message of this [`Failure`], as reporters show it.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Indicates whether this [`Failure`] is a [`Failure::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Indicates whether this [`Failure`] is a [`Failure::Uncaught`].
    #[must_use]
    pub const fn is_uncaught(&self) -> bool {
        matches!(self, Self::Uncaught { .. })
    }
}

/// Conversion of panic payloads into readable messages.
pub trait PanicPayloadExt {
    /// Converts a panic payload into a readable string.
    fn to_readable_string(&self) -> String;
}

impl PanicPayloadExt for dyn Any + Send {
    fn to_readable_string(&self) -> String {
        if let Some(s) = self.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = self.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(f) = self.downcast_ref::<Failure>() {
            f.to_string()
        } else {
            "Unknown panic payload".to_owned()
        }
    }
}
