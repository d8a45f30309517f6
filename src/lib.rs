// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Hierarchical async test-execution engine.
//!
//! Tests are declared into a [`Tree`] of [`Suite`]s, either directly or
//! through an [`Interface`] (`bdd`, `tdd` or a custom one) via a [`Dsl`].
//! A [`Runner`] then executes the [`Tree`] one runnable at a time:
//! - hooks run around tests and suites in a deterministic order;
//! - a skip or a failure of a hook propagates to the runnables it guards;
//! - exclusive (`.only`) markers and a `--grep` filter narrow the run;
//! - failed tests are retried within their budget;
//! - errors raised outside of any await chain are attributed to the
//!   runnable that caused them, or reported once the run ends.
//!
//! Failing runnables only abort the run when bailing is configured. Either
//! way, everything is collected into a [`RunResult`], whose
//! [`RunResult::exit_code()`] is the number of failures.
//!
//! # Example
//!
//! ```rust
//! # use nestrun::{Callback, HookKind, Runner, Tree};
//! #
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut tree = Tree::new();
//! let suite = tree.add_suite(tree.root(), "cache");
//! tree.add_hook(suite, HookKind::BeforeEach, Callback::sync(|_| ()));
//! tree.add_test(suite, "stores", Callback::sync(|_| ()));
//! tree.add_test(suite, "evicts", Callback::future(|_| async {}));
//!
//! let result = Runner::default().run(tree).await;
//! assert_eq!(result.stats().passed, 2);
//! assert_eq!(result.exit_code(), 0);
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod cli;
pub mod error;
pub mod event;
pub mod exclusive;
pub(crate) mod future;
pub mod harness;
pub mod interceptor;
pub mod interface;
pub mod result;
pub mod runnable;
pub mod runner;
pub mod suite;

#[doc(inline)]
pub use self::{
    cli::{Argv, Config},
    error::{ConfigError, DeclarationError, Error, Failure, Result},
    event::{Event, RunEvent, RunnableEvent, SuiteEvent},
    exclusive::{Grep, Plan},
    harness::Harness,
    interceptor::{Interceptor, LateFailure, UncaughtHandle},
    interface::{Bdd, Dsl, Interface, Interfaces, Keyword, KeywordTable, Tdd},
    result::{
        FailureOrigin, FailureRecord, RunResult, Stats, TestRecord, Verdict,
    },
    runnable::{
        Callback, Context, Done, HookKind, Outcome, Runnable, RunnableKind,
        State,
    },
    runner::Runner,
    suite::{Child, RunnableId, Suite, SuiteId, Tree},
};
