// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `describe`/`it` declaration style.

use linked_hash_map::LinkedHashMap;
use once_cell::sync::Lazy;

use super::{Interface, Keyword};
use crate::runnable::HookKind;

/// Words of the [`Bdd`] interface.
static WORDS: Lazy<LinkedHashMap<&'static str, Keyword>> = Lazy::new(|| {
    [
        ("describe", Keyword::Suite),
        ("context", Keyword::Suite),
        ("describe.only", Keyword::ExclusiveSuite),
        ("context.only", Keyword::ExclusiveSuite),
        ("describe.skip", Keyword::PendingSuite),
        ("context.skip", Keyword::PendingSuite),
        ("xdescribe", Keyword::PendingSuite),
        ("xcontext", Keyword::PendingSuite),
        ("it", Keyword::Test),
        ("specify", Keyword::Test),
        ("it.only", Keyword::ExclusiveTest),
        ("specify.only", Keyword::ExclusiveTest),
        ("it.skip", Keyword::PendingTest),
        ("specify.skip", Keyword::PendingTest),
        ("xit", Keyword::PendingTest),
        ("xspecify", Keyword::PendingTest),
        ("before", Keyword::Hook(HookKind::BeforeAll)),
        ("beforeEach", Keyword::Hook(HookKind::BeforeEach)),
        ("afterEach", Keyword::Hook(HookKind::AfterEach)),
        ("after", Keyword::Hook(HookKind::AfterAll)),
    ]
    .into_iter()
    .collect()
});

/// Default [`Interface`], named `bdd`.
///
/// | Word | Declares |
/// |------|----------|
/// | `describe`, `context` | suite |
/// | `it`, `specify` | test |
/// | `before`, `beforeEach`, `afterEach`, `after` | hooks |
///
/// Every suite and test word has `.only` and `.skip` variants, and an
/// `x`-prefixed pending alias.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bdd;

impl Interface for Bdd {
    fn name(&self) -> &str {
        "bdd"
    }

    fn keyword(&self, word: &str) -> Option<Keyword> {
        WORDS.get(word).copied()
    }
}
