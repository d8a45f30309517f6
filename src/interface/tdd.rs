// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `suite`/`test` declaration style.

use linked_hash_map::LinkedHashMap;
use once_cell::sync::Lazy;

use super::{Interface, Keyword};
use crate::runnable::HookKind;

/// Words of the [`Tdd`] interface.
static WORDS: Lazy<LinkedHashMap<&'static str, Keyword>> = Lazy::new(|| {
    [
        ("suite", Keyword::Suite),
        ("suite.only", Keyword::ExclusiveSuite),
        ("suite.skip", Keyword::PendingSuite),
        ("test", Keyword::Test),
        ("test.only", Keyword::ExclusiveTest),
        ("test.skip", Keyword::PendingTest),
        ("suiteSetup", Keyword::Hook(HookKind::BeforeAll)),
        ("setup", Keyword::Hook(HookKind::BeforeEach)),
        ("teardown", Keyword::Hook(HookKind::AfterEach)),
        ("suiteTeardown", Keyword::Hook(HookKind::AfterAll)),
    ]
    .into_iter()
    .collect()
});

/// [`Interface`] named `tdd`, declaring through `suite`, `test`,
/// `suiteSetup`, `setup`, `teardown` and `suiteTeardown`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tdd;

impl Interface for Tdd {
    fn name(&self) -> &str {
        "tdd"
    }

    fn keyword(&self, word: &str) -> Option<Keyword> {
        WORDS.get(word).copied()
    }
}
