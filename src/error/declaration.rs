// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors raised while declaring a suite tree through an [`Interface`].
//!
//! [`Interface`]: crate::interface::Interface

use derive_more::with_trait::{Display, Error};

/// Declaration errors.
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum DeclarationError {
    /// Keyword isn't known to the selected interface.
    #[display("`{keyword}` is not defined by the \"{interface}\" interface")]
    UnknownKeyword {
        /// The unknown keyword.
        #[error(not(source))]
        keyword: String,

        /// Name of the interface in use.
        interface: String,
    },

    /// Keyword is known, but declares a different kind of node.
    #[display("`{keyword}` cannot be used to declare {expected}")]
    KeywordMismatch {
        /// The misused keyword.
        #[error(not(source))]
        keyword: String,

        /// What the call site tried to declare.
        expected: &'static str,
    },
}

/// Result type alias for declaration operations.
pub type DeclarationResult<T> = Result<T, DeclarationError>;

impl DeclarationError {
    /// Creates a new unknown keyword error.
    #[must_use]
    pub fn unknown_keyword(
        keyword: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self::UnknownKeyword {
            keyword: keyword.into(),
            interface: interface.into(),
        }
    }

    /// Creates a new keyword mismatch error.
    #[must_use]
    pub fn keyword_mismatch(
        keyword: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::KeywordMismatch { keyword: keyword.into(), expected }
    }
}
