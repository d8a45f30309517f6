// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Declaration styles of a [`Tree`].
//!
//! An [`Interface`] maps its own words (`describe`, `suite`, `beforeEach`,
//! ...) to [`Keyword`]s. A [`Dsl`] binds the selected [`Interface`] to a
//! position in a [`Tree`] and declares through those words.

mod bdd;
mod tdd;

use std::{fmt, time::Duration};

use derive_more::with_trait::Display;
use linked_hash_map::LinkedHashMap;

pub use self::{bdd::Bdd, tdd::Tdd};
use crate::{
    error::{DeclarationError, DeclarationResult},
    runnable::{Callback, HookKind},
    suite::{RunnableId, SuiteId, Tree},
};

/// What a word of an [`Interface`] declares.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Keyword {
    /// Regular suite.
    #[display("suite")]
    Suite,

    /// Suite marked exclusive.
    #[display("exclusive suite")]
    ExclusiveSuite,

    /// Suite marked pending.
    #[display("pending suite")]
    PendingSuite,

    /// Regular test.
    #[display("test")]
    Test,

    /// Test marked exclusive.
    #[display("exclusive test")]
    ExclusiveTest,

    /// Test marked pending.
    #[display("pending test")]
    PendingTest,

    /// Hook of the given phase.
    #[display("{_0} hook")]
    Hook(HookKind),
}

/// Declaration style: a name plus a table of words.
pub trait Interface {
    /// Name selecting this [`Interface`].
    fn name(&self) -> &str;

    /// Resolves one of this [`Interface`]'s words.
    fn keyword(&self, word: &str) -> Option<Keyword>;
}

/// [`Interface`] defined at runtime, e.g. by a loaded module.
#[derive(Clone, Debug)]
pub struct KeywordTable {
    /// Name of the [`Interface`].
    name: String,

    /// Words in the order they were defined.
    words: LinkedHashMap<String, Keyword>,
}

impl KeywordTable {
    /// Creates a new empty [`KeywordTable`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), words: LinkedHashMap::new() }
    }

    /// Defines a word.
    #[must_use]
    pub fn with(mut self, word: impl Into<String>, keyword: Keyword) -> Self {
        _ = self.words.insert(word.into(), keyword);
        self
    }

    /// Defined words in order.
    pub fn words(&self) -> impl Iterator<Item = (&str, Keyword)> {
        self.words.iter().map(|(w, k)| (w.as_str(), *k))
    }
}

impl Interface for KeywordTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn keyword(&self, word: &str) -> Option<Keyword> {
        self.words.get(word).copied()
    }
}

/// Ordered registry of [`Interface`]s.
pub struct Interfaces {
    /// Registered [`Interface`]s by name.
    by_name: LinkedHashMap<String, Box<dyn Interface>>,
}

impl fmt::Debug for Interfaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.by_name.keys()).finish()
    }
}

impl Default for Interfaces {
    fn default() -> Self {
        let mut this = Self::empty();
        this.register(Bdd);
        this.register(Tdd);
        this
    }
}

impl Interfaces {
    /// Creates a registry without any built-in [`Interface`].
    #[must_use]
    pub fn empty() -> Self {
        Self { by_name: LinkedHashMap::new() }
    }

    /// Registers the given [`Interface`], replacing one with the same name.
    pub fn register(&mut self, interface: impl Interface + 'static) {
        let name = interface.name().to_owned();
        if self.by_name.insert(name.clone(), Box::new(interface)).is_some() {
            tracing::debug!(interface = %name, "replaced interface");
        }
    }

    /// Looks up an [`Interface`] by its name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Interface> {
        self.by_name.get(name).map(AsRef::as_ref)
    }

    /// Names of the registered [`Interface`]s in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

/// [`Interface`] bound to a position in a [`Tree`].
pub struct Dsl<'a> {
    /// Selected [`Interface`].
    interface: &'a dyn Interface,

    /// [`Tree`] being declared.
    tree: &'a mut Tree,

    /// Suite declarations are appended to.
    suite: SuiteId,
}

impl fmt::Debug for Dsl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dsl")
            .field("interface", &self.interface.name())
            .field("suite", &self.suite)
            .finish_non_exhaustive()
    }
}

impl<'a> Dsl<'a> {
    /// Binds the given [`Interface`] to the root of the given [`Tree`].
    pub fn new(interface: &'a dyn Interface, tree: &'a mut Tree) -> Self {
        let suite = tree.root();
        Self { interface, tree, suite }
    }

    /// Suite the declarations are appended to.
    #[must_use]
    pub const fn current(&self) -> SuiteId {
        self.suite
    }

    /// Declared [`Tree`], for direct adjustments.
    pub fn tree(&mut self) -> &mut Tree {
        self.tree
    }

    /// Sets the timeout inherited by the current suite's runnables.
    pub fn timeout(&mut self, timeout: Duration) {
        self.tree.set_suite_timeout(self.suite, timeout);
    }

    /// Sets the retries inherited by the current suite's tests.
    pub fn retries(&mut self, retries: usize) {
        self.tree.set_suite_retries(self.suite, retries);
    }

    fn resolve(&self, word: &str) -> DeclarationResult<Keyword> {
        self.interface.keyword(word).ok_or_else(|| {
            DeclarationError::unknown_keyword(word, self.interface.name())
        })
    }

    /// Declares a child suite with the given suite `word`, declaring its
    /// content with the `body`.
    ///
    /// # Errors
    ///
    /// If the `word` doesn't declare a suite, or the `body` fails.
    pub fn suite<F>(
        &mut self,
        word: &str,
        title: impl Into<String>,
        body: F,
    ) -> DeclarationResult<SuiteId>
    where
        F: FnOnce(&mut Dsl<'_>) -> DeclarationResult<()>,
    {
        let keyword = self.resolve(word)?;
        if !matches!(
            keyword,
            Keyword::Suite | Keyword::ExclusiveSuite | Keyword::PendingSuite,
        ) {
            return Err(DeclarationError::keyword_mismatch(word, "a suite"));
        }

        let id = self.tree.add_suite(self.suite, title);
        match keyword {
            Keyword::ExclusiveSuite => self.tree.mark_exclusive(id),
            Keyword::PendingSuite => self.tree.mark_pending(id),
            _ => {}
        }

        let mut nested =
            Dsl { interface: self.interface, tree: &mut *self.tree, suite: id };
        body(&mut nested)?;
        Ok(id)
    }

    /// Declares a test or a hook with the given `word`.
    ///
    /// For hooks the `title` names the hook and may be empty.
    ///
    /// # Errors
    ///
    /// If the `word` declares a suite.
    pub fn runnable(
        &mut self,
        word: &str,
        title: impl Into<String>,
        callback: Callback,
    ) -> DeclarationResult<RunnableId> {
        let suite = self.suite;
        match self.resolve(word)? {
            Keyword::Test => Ok(self.tree.add_test(suite, title, callback)),
            Keyword::ExclusiveTest => {
                let id = self.tree.add_test(suite, title, callback);
                self.tree.mark_test_exclusive(id);
                Ok(id)
            }
            Keyword::PendingTest => {
                let id = self.tree.add_test(suite, title, callback);
                self.tree.mark_test_pending(id);
                Ok(id)
            }
            Keyword::Hook(kind) => {
                Ok(self.tree.add_named_hook(suite, kind, title, callback))
            }
            Keyword::Suite
            | Keyword::ExclusiveSuite
            | Keyword::PendingSuite => Err(DeclarationError::keyword_mismatch(
                word,
                "a test or a hook",
            )),
        }
    }

    /// Declares a test without any code, which is always pending.
    ///
    /// # Errors
    ///
    /// If the `word` doesn't declare a test.
    pub fn pending(
        &mut self,
        word: &str,
        title: impl Into<String>,
    ) -> DeclarationResult<RunnableId> {
        match self.resolve(word)? {
            Keyword::Test | Keyword::ExclusiveTest | Keyword::PendingTest => {
                Ok(self.tree.add_pending_test(self.suite, title))
            }
            Keyword::Suite
            | Keyword::ExclusiveSuite
            | Keyword::PendingSuite
            | Keyword::Hook(_) => {
                Err(DeclarationError::keyword_mismatch(word, "a pending test"))
            }
        }
    }
}
