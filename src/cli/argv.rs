// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Merging of an options file into an argument list.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;

/// Path of the options file used when no `--opts` is given.
pub const DEFAULT_OPTS_PATH: &str = "test/nestrun.opts";

/// Argument list with an options file merged into it at most once.
#[derive(Clone, Debug, Default)]
pub struct Argv {
    /// Arguments, starting with the program name.
    args: Vec<String>,

    /// Whether an options file merge has already happened.
    loaded: bool,
}

impl Argv {
    /// Wraps the given arguments. The first one is the program name.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { args: args.into_iter().map(Into::into).collect(), loaded: false }
    }

    /// Wraps the arguments of the current process.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::args())
    }

    /// Path of the options file: the one after `--opts`, or
    /// [`DEFAULT_OPTS_PATH`].
    #[must_use]
    pub fn opts_path(&self) -> PathBuf {
        let mut args = self.args.iter().skip(1);
        while let Some(arg) = args.next() {
            if let Some(path) = arg.strip_prefix("--opts=") {
                return path.into();
            }
            if arg == "--opts" {
                if let Some(path) = args.next() {
                    return path.into();
                }
            }
        }
        DEFAULT_OPTS_PATH.into()
    }

    /// Merges the options file into the arguments, right after the program
    /// name, so explicitly given arguments win.
    ///
    /// Only the first call does anything, so the file's arguments never
    /// appear twice. A missing file merges nothing.
    ///
    /// Returns the number of merged arguments.
    ///
    /// # Errors
    ///
    /// If the options file exists, but cannot be read.
    pub fn merge_opts(&mut self) -> io::Result<usize> {
        if self.loaded {
            tracing::trace!("options file already merged");
            return Ok(0);
        }
        self.loaded = true;

        let path = self.opts_path();
        let merged = match read_opts(&path)? {
            Some(opts) => opts,
            None => {
                tracing::debug!(path = %path.display(), "no options file");
                return Ok(0);
            }
        };

        let at = self.args.len().min(1);
        let count = merged.len();
        drop(self.args.splice(at..at, merged));
        tracing::debug!(path = %path.display(), count, "merged options file");
        Ok(count)
    }

    /// Indicates whether an options file merge has happened.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Current arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Unwraps the current arguments.
    #[must_use]
    pub fn into_inner(self) -> Vec<String> {
        self.args
    }
}

/// Reads the options file at the given `path`, returning [`None`] if there
/// is none.
fn read_opts(path: &Path) -> io::Result<Option<Vec<String>>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(split_opts(&content))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Splits options file content into arguments.
///
/// Lines starting with `#` are comments. Arguments are separated by
/// whitespace, unless it's escaped with a backslash.
#[must_use]
pub fn split_opts(content: &str) -> Vec<String> {
    /// Comment line.
    static COMMENT: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?m)^#.*$")
            .unwrap_or_else(|_| unreachable!("valid comment regex"))
    });

    let content = COMMENT.replace_all(content, "");

    let mut args = Vec::new();
    let mut current = String::new();
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek().is_some_and(|n| n.is_whitespace()) => {
                current.extend(chars.next());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}
