// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration surface of a run.
//!
//! [`Cli`] holds the strongly typed command line options, [`Opts`] parses a
//! whole argument list into them, and [`Config`] is the validated form the
//! [`Runner`] and [`Harness`] consume. [`Argv`] merges an options file into
//! the argument list beforehand.
//!
//! [`Harness`]: crate::Harness
//! [`Runner`]: crate::Runner

mod argv;

use std::{path::PathBuf, time::Duration};

use regex::Regex;
use smart_default::SmartDefault;

pub use self::argv::{split_opts, Argv, DEFAULT_OPTS_PATH};
use crate::{
    error::{ConfigError, ConfigResult},
    exclusive::Grep,
};

/// CLI options of a run.
#[derive(Clone, Debug, Default, clap::Args)]
#[group(skip)]
pub struct Cli {
    /// Only run tests whose full title matches this regex.
    #[arg(long, short = 'g', value_name = "regex")]
    pub grep: Option<Regex>,

    /// Inverts `--grep` matches.
    #[arg(long, short = 'i', requires = "grep")]
    pub invert: bool,

    /// Number of times a failed test is retried.
    #[arg(long, value_name = "int")]
    pub retries: Option<usize>,

    /// Timeout of every hook and test. `0` disables timeouts.
    ///
    /// Either a number of milliseconds, or a human-readable duration like
    /// `1s500ms`. Supported suffixes:
    /// - `nsec`, `ns` — nanoseconds.
    /// - `usec`, `us` — microseconds.
    /// - `msec`, `ms` — milliseconds.
    /// - `seconds`, `second`, `sec`, `s` - seconds.
    /// - `minutes`, `minute`, `min`, `m` - minutes.
    #[arg(
        long,
        short = 't',
        value_name = "duration",
        value_parser = parse_timeout,
        verbatim_doc_comment
    )]
    pub timeout: Option<Duration>,

    /// Stop scheduling after the first failure.
    #[arg(long, short = 'b')]
    pub bail: bool,

    /// Declaration interface to use.
    #[arg(long, short = 'u', value_name = "name")]
    pub ui: Option<String>,

    /// Loads the given module before selecting the interface.
    #[arg(long, short = 'r', value_name = "module")]
    pub require: Vec<String>,

    /// Path of the options file.
    #[arg(long, value_name = "path")]
    pub opts: Option<PathBuf>,
}

/// Parses a timeout given either as plain milliseconds or via [`humantime`].
fn parse_timeout(s: &str) -> Result<Duration, humantime::DurationError> {
    match s.parse::<u64>() {
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(_) => humantime::parse_duration(s),
    }
}

/// Whole argument list of a run.
#[derive(Clone, Debug, Default, clap::Parser)]
#[command(
    name = "nestrun",
    about = "Run the suites, one hook at a time.",
    args_override_self = true
)]
pub struct Opts {
    /// Options of the run.
    #[command(flatten)]
    pub cli: Cli,

    /// Files to run. All the registered ones, if none is given.
    #[arg(value_name = "file")]
    pub files: Vec<String>,
}

impl Opts {
    /// Parses the given argument list, the first one being the program name.
    ///
    /// # Errors
    ///
    /// If the arguments are invalid.
    pub fn try_parse_args<I, S>(args: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        <Self as clap::Parser>::try_parse_from(args)
            .map_err(|e| ConfigError::invalid_cli_args(e.to_string()))
    }
}

/// Validated configuration of a run.
#[derive(Clone, Debug, SmartDefault)]
pub struct Config {
    /// Filter of tests by their full title.
    pub grep: Option<Grep>,

    /// Default timeout of every runnable. [`Duration::ZERO`] disables it.
    #[default(Duration::from_millis(2000))]
    pub timeout: Duration,

    /// Default retry budget of every test.
    pub retries: usize,

    /// Whether to stop scheduling after the first failure.
    pub bail: bool,

    /// Name of the declaration interface.
    #[default("bdd".to_owned())]
    pub ui: String,

    /// Modules to load before selecting the interface.
    pub requires: Vec<String>,
}

impl Config {
    /// Filters tests by the given `pattern` matched against full titles.
    ///
    /// # Errors
    ///
    /// If the `pattern` is not a valid regex.
    pub fn with_grep(
        mut self,
        pattern: &str,
        invert: bool,
    ) -> ConfigResult<Self> {
        self.grep = Some(Grep::parse(pattern, invert)?);
        Ok(self)
    }

    /// Sets the default timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the default retry budget.
    #[must_use]
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Stops scheduling after the first failure.
    #[must_use]
    pub fn bail(mut self) -> Self {
        self.bail = true;
        self
    }

    /// Selects the declaration interface.
    #[must_use]
    pub fn with_ui(mut self, ui: impl Into<String>) -> Self {
        self.ui = ui.into();
        self
    }

    /// Adds a module to load before selecting the interface.
    #[must_use]
    pub fn require(mut self, module: impl Into<String>) -> Self {
        self.requires.push(module.into());
        self
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        let def = Self::default();
        Self {
            grep: cli.grep.map(|re| Grep::new(re, cli.invert)),
            timeout: cli.timeout.unwrap_or(def.timeout),
            retries: cli.retries.unwrap_or(def.retries),
            bail: cli.bail,
            ui: cli.ui.unwrap_or(def.ui),
            requires: cli.require,
        }
    }
}
