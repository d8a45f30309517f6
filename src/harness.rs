// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Top-level entry point wiring modules, files and a [`Runner`] together.

use std::fmt;

use futures::channel::mpsc;
use linked_hash_map::LinkedHashMap;

use crate::{
    cli::{Argv, Config, Opts},
    error::{ConfigError, DeclarationResult, Result},
    event::{Event, RunEvent},
    interface::{Dsl, Interfaces},
    result::RunResult,
    runner::Runner,
    suite::Tree,
};

/// Loadable module, registering [`Interface`]s.
///
/// [`Interface`]: crate::Interface
type Module = Box<dyn Fn(&mut Interfaces)>;

/// Declaring body of a test file.
type File = Box<dyn FnOnce(&mut Dsl<'_>) -> DeclarationResult<()>>;

/// Whole run: loads the required modules, selects the interface, declares
/// the test files through it and runs the resulting [`Tree`].
///
/// # Example
///
/// ```rust
/// # use nestrun::{Callback, Harness};
/// #
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> nestrun::Result<()> {
/// let result = Harness::new()
///     .file("math", |d| {
///         d.suite("describe", "math", |d| {
///             d.runnable("it", "adds", Callback::sync(|_| {
///                 assert_eq!(1 + 1, 2);
///             }))?;
///             Ok(())
///         })?;
///         Ok(())
///     })
///     .run()
///     .await?;
///
/// assert_eq!(result.exit_code(), 0);
/// # Ok(())
/// # }
/// ```
pub struct Harness {
    /// Loadable modules by name.
    modules: LinkedHashMap<String, Module>,

    /// Test files in registration order.
    files: Vec<(String, File)>,

    /// Configuration of the run.
    config: Config,

    /// Names of the files to run. All of them, if empty.
    selected: Vec<String>,

    /// Sender of [`RunEvent`]s.
    events: Option<mpsc::UnboundedSender<Event<RunEvent>>>,
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field(
                "files",
                &self.files.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Creates a new [`Harness`] with the default [`Config`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: LinkedHashMap::new(),
            files: Vec::new(),
            config: Config::default(),
            selected: Vec::new(),
            events: None,
        }
    }

    /// Creates a new [`Harness`] configured by the given arguments, with the
    /// options file merged into them.
    ///
    /// Positional arguments select the files to run.
    ///
    /// # Errors
    ///
    /// If the options file cannot be read, or the arguments are invalid.
    pub fn from_args(mut argv: Argv) -> Result<Self> {
        _ = argv.merge_opts()?;
        let opts = Opts::try_parse_args(argv.args())?;

        Ok(Self {
            config: opts.cli.into(),
            selected: opts.files,
            ..Self::new()
        })
    }

    /// Replaces the [`Config`] of the run.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// [`Config`] of the run.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Registers a module loadable by its `name` via [`Config::require`].
    #[must_use]
    pub fn module<F>(mut self, name: impl Into<String>, load: F) -> Self
    where
        F: Fn(&mut Interfaces) + 'static,
    {
        _ = self.modules.insert(name.into(), Box::new(load));
        self
    }

    /// Registers a test file, declared into the root suite when the run
    /// starts.
    #[must_use]
    pub fn file<F>(mut self, name: impl Into<String>, declare: F) -> Self
    where
        F: FnOnce(&mut Dsl<'_>) -> DeclarationResult<()> + 'static,
    {
        self.files.push((name.into(), Box::new(declare)));
        self
    }

    /// Sends [`RunEvent`]s of the run into the given channel.
    #[must_use]
    pub fn with_events(
        mut self,
        events: mpsc::UnboundedSender<Event<RunEvent>>,
    ) -> Self {
        self.events = Some(events);
        self
    }

    /// Runs all the registered files.
    ///
    /// # Errors
    ///
    /// If a required module or the interface is unknown, or a file fails to
    /// declare. Failures of runnables are reported via [`RunResult`] only.
    pub async fn run(self) -> Result<RunResult> {
        let Self { modules, files, config, selected, events } = self;

        let mut interfaces = Interfaces::default();
        for name in &config.requires {
            let load = modules
                .get(name)
                .ok_or_else(|| ConfigError::unknown_module(name.as_str()))?;
            load(&mut interfaces);
            tracing::debug!(module = %name, "loaded module");
        }

        let ui = interfaces
            .get(&config.ui)
            .ok_or_else(|| ConfigError::unknown_interface(config.ui.as_str()))?;

        let mut tree = Tree::new();
        for (name, declare) in files {
            if !selected.is_empty() && !selected.contains(&name) {
                tracing::trace!(file = %name, "file not selected");
                continue;
            }
            let _span = tracing::debug_span!("file", %name).entered();
            declare(&mut Dsl::new(ui, &mut tree))?;
        }
        tracing::debug!(
            ui = ui.name(),
            suites = tree.suites_len(),
            tests = tree.tests_len(),
            "declared tree",
        );

        let mut runner = Runner::new(config);
        if let Some(tx) = events {
            runner = runner.with_events(tx);
        }
        Ok(runner.run(tree).await)
    }

    /// Runs all the registered files and exits the process with
    /// [`RunResult::exit_code()`].
    ///
    /// # Panics
    ///
    /// If the run couldn't be prepared.
    pub async fn run_and_exit(self) {
        match self.run().await {
            Ok(result) => std::process::exit(result.exit_code()),
            Err(e) => panic!("{e}"),
        }
    }
}
