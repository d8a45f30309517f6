// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error handling types of the crate, organized by domain.
//!
//! # Modules
//!
//! - [`failure`] - what a single runnable may fail with
//! - [`config`] - configuration and validation errors
//! - [`declaration`] - errors declaring the suite tree through an interface

pub mod config;
pub mod declaration;
pub mod failure;

use std::io;

use derive_more::with_trait::{Display, Error as StdError, From};

pub use self::{
    config::{ConfigError, ConfigResult},
    declaration::{DeclarationError, DeclarationResult},
    failure::{Failure, PanicPayloadExt},
};

/// Top-level error of preparing a run.
///
/// Failures of runnables are never reported through this type: they are
/// recorded in a [`RunResult`] instead.
///
/// [`RunResult`]: crate::RunResult
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// Configuration or validation error.
    #[display("Configuration error: {_0}")]
    Config(ConfigError),

    /// Error declaring the suite tree.
    #[display("Declaration error: {_0}")]
    Declaration(DeclarationError),

    /// I/O error, e.g. reading an options file.
    #[display("I/O operation failed: {_0}")]
    Io(io::Error),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: Error = ConfigError::unknown_interface("nope").into();
        assert!(matches!(err, Error::Config(_)));

        let err: Error =
            DeclarationError::unknown_keyword("describe", "tdd").into();
        assert!(matches!(err, Error::Declaration(_)));
        assert_eq!(
            err.to_string(),
            "Declaration error: `describe` is not defined by the \"tdd\" \
             interface",
        );

        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
