// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration and validation error types.
//!
//! This module defines errors that can occur while parsing the argument list,
//! validating options and resolving the modules and interfaces they name.

use derive_more::with_trait::{Display, Error};

/// Configuration and validation errors.
#[derive(Debug, Display, Error)]
pub enum ConfigError {
    /// `--grep` pattern is not a valid regular expression.
    #[display("Invalid grep pattern `{pattern}`: {source}")]
    InvalidGrep {
        /// The rejected pattern.
        #[error(not(source))]
        pattern: String,

        /// Underlying [`regex`] error.
        source: regex::Error,
    },

    /// Invalid CLI argument combination or value.
    #[display("Invalid CLI arguments: {reason}")]
    InvalidCliArgs {
        /// Reason for the invalid arguments.
        #[error(not(source))]
        reason: String,
    },

    /// Interface with the requested name is not registered.
    #[display("Invalid interface \"{name}\"")]
    UnknownInterface {
        /// Requested interface name.
        #[error(not(source))]
        name: String,
    },

    /// Module passed to `--require` is not known.
    #[display("Cannot find module \"{name}\"")]
    UnknownModule {
        /// Requested module name.
        #[error(not(source))]
        name: String,
    },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Creates a new invalid grep error.
    #[must_use]
    pub fn invalid_grep(
        pattern: impl Into<String>,
        source: regex::Error,
    ) -> Self {
        Self::InvalidGrep { pattern: pattern.into(), source }
    }

    /// Creates a new invalid CLI arguments error.
    #[must_use]
    pub fn invalid_cli_args(reason: impl Into<String>) -> Self {
        Self::InvalidCliArgs { reason: reason.into() }
    }

    /// Creates a new unknown interface error.
    #[must_use]
    pub fn unknown_interface(name: impl Into<String>) -> Self {
        Self::UnknownInterface { name: name.into() }
    }

    /// Creates a new unknown module error.
    #[must_use]
    pub fn unknown_module(name: impl Into<String>) -> Self {
        Self::UnknownModule { name: name.into() }
    }
}
