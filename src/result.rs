// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Structured outcome of a run, consumed by reporters.

use derive_more::with_trait::Display;

use crate::{error::Failure, runnable::HookKind};

/// Final verdict of a single test.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "output-json", derive(serde::Serialize))]
#[cfg_attr(feature = "output-json", serde(rename_all = "snake_case"))]
pub enum Verdict {
    /// Passed on some attempt.
    #[display("passed")]
    Passed,

    /// Failed on its last allowed attempt.
    #[display("failed")]
    Failed,

    /// Declared pending, or skipped at runtime.
    #[display("pending")]
    Pending,

    /// Never invoked because a hook failed or the run bailed.
    #[display("not run")]
    NotRun,
}

/// Outcome of a single scheduled test.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "output-json", derive(serde::Serialize))]
pub struct TestRecord {
    /// Title of the test.
    pub title: String,

    /// Title prefixed with its suites' titles.
    pub full_title: String,

    /// Final [`Verdict`].
    pub verdict: Verdict,

    /// Number of times the test was invoked.
    pub attempts: usize,
}

/// Runnable a [`FailureRecord`] originates from.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[cfg_attr(feature = "output-json", derive(serde::Serialize))]
#[cfg_attr(feature = "output-json", serde(rename_all = "snake_case"))]
pub enum FailureOrigin {
    /// Test failed on its last allowed attempt.
    #[display("test")]
    Test,

    /// Hook of the given phase failed.
    #[display("{_0} hook")]
    Hook(HookKind),

    /// Error raised after its runnable had already completed.
    #[display("uncaught")]
    Uncaught,
}

/// Single failure of a run.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "output-json", derive(serde::Serialize))]
pub struct FailureRecord {
    /// Title of the failed runnable.
    pub title: String,

    /// Title prefixed with its suites' titles.
    pub full_title: String,

    /// Where the failure comes from.
    pub origin: FailureOrigin,

    /// What it failed with.
    pub error: Failure,
}

/// Aggregate counters of a run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "output-json", derive(serde::Serialize))]
pub struct Stats {
    /// Number of pending tests.
    pub pending: usize,

    /// Number of passed tests.
    pub passed: usize,

    /// Number of failure records.
    pub failed: usize,
}

/// Structured outcome of a run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "output-json", derive(serde::Serialize))]
pub struct RunResult {
    /// One record per scheduled test, in execution order.
    tests: Vec<TestRecord>,

    /// Failures in the order they were recorded.
    failures: Vec<FailureRecord>,
}

impl RunResult {
    /// Records the outcome of a test.
    pub(crate) fn push_test(&mut self, record: TestRecord) {
        self.tests.push(record);
    }

    /// Records a failure.
    pub(crate) fn push_failure(&mut self, record: FailureRecord) {
        self.failures.push(record);
    }

    /// Records of all the scheduled tests.
    #[must_use]
    pub fn tests(&self) -> &[TestRecord] {
        &self.tests
    }

    /// All the recorded failures.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Finds the record of a test by its full title.
    #[must_use]
    pub fn test(&self, full_title: &str) -> Option<&TestRecord> {
        self.tests.iter().find(|t| t.full_title == full_title)
    }

    /// Aggregate [`Stats`] of this run.
    #[must_use]
    pub fn stats(&self) -> Stats {
        let count = |v| self.tests.iter().filter(|t| t.verdict == v).count();
        Stats {
            pending: count(Verdict::Pending),
            passed: count(Verdict::Passed),
            failed: self.failures.len(),
        }
    }

    /// Indicates whether nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Process exit code: the number of failures, capped at `255`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(u8::try_from(self.failures.len()).unwrap_or(u8::MAX))
    }

    /// Serializes this [`RunResult`] along with its [`Stats`] into JSON.
    ///
    /// # Errors
    ///
    /// If [`serde_json`] fails to serialize.
    #[cfg(feature = "output-json")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(serde::Serialize)]
        struct Report<'r> {
            stats: Stats,
            tests: &'r [TestRecord],
            failures: Vec<FailureReport<'r>>,
            code: i32,
        }

        #[derive(serde::Serialize)]
        struct FailureReport<'r> {
            #[serde(flatten)]
            record: &'r FailureRecord,
            error_message: String,
        }

        serde_json::to_string_pretty(&Report {
            stats: self.stats(),
            tests: &self.tests,
            failures: self
                .failures
                .iter()
                .map(|record| FailureReport {
                    record,
                    error_message: record.error.message(),
                })
                .collect(),
            code: self.exit_code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test(title: &str, verdict: Verdict) -> TestRecord {
        TestRecord {
            title: title.into(),
            full_title: format!("suite {title}"),
            verdict,
            attempts: 1,
        }
    }

    fn failure(title: &str) -> FailureRecord {
        FailureRecord {
            title: title.into(),
            full_title: format!("suite {title}"),
            origin: FailureOrigin::Test,
            error: Failure::assertion("nope"),
        }
    }

    #[test]
    fn test_stats_and_exit_code() {
        let mut res = RunResult::default();
        assert!(res.is_success());
        assert_eq!(res.exit_code(), 0);

        res.push_test(test("a", Verdict::Passed));
        res.push_test(test("b", Verdict::Pending));
        res.push_test(test("c", Verdict::Failed));
        res.push_test(test("d", Verdict::NotRun));
        res.push_failure(failure("c"));
        res.push_failure(FailureRecord {
            origin: FailureOrigin::Uncaught,
            ..failure("late")
        });

        assert_eq!(res.stats(), Stats { pending: 1, passed: 1, failed: 2 });
        assert_eq!(res.exit_code(), 2);
        assert_eq!(
            res.test("suite d").map(|t| t.verdict),
            Some(Verdict::NotRun),
        );
    }

    #[test]
    fn test_exit_code_is_capped() {
        let mut res = RunResult::default();
        for i in 0..300 {
            res.push_failure(failure(&i.to_string()));
        }
        assert_eq!(res.exit_code(), 255);
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(
            FailureOrigin::Hook(HookKind::BeforeAll).to_string(),
            "before all hook",
        );
        assert_eq!(FailureOrigin::Uncaught.to_string(), "uncaught");
    }

    #[cfg(feature = "output-json")]
    #[test]
    fn test_json_report() {
        let mut res = RunResult::default();
        res.push_test(test("a", Verdict::Failed));
        res.push_failure(failure("a"));

        let json: serde_json::Value =
            serde_json::from_str(&res.to_json().unwrap()).unwrap();
        assert_eq!(json["stats"]["failed"], 1);
        assert_eq!(json["code"], 1);
        assert_eq!(json["tests"][0]["verdict"], "failed");
        assert_eq!(json["failures"][0]["origin"], "test");
        assert_eq!(json["failures"][0]["error_message"], "nope");
        assert_eq!(json["failures"][0]["error"]["kind"], "assertion");
    }

    #[cfg(feature = "output-json")]
    #[test]
    fn test_json_failure_message_is_rendered() {
        let mut res = RunResult::default();
        res.push_failure(FailureRecord {
            error: Failure::timeout(std::time::Duration::from_millis(25)),
            ..failure("slow")
        });
        res.push_failure(FailureRecord {
            origin: FailureOrigin::Uncaught,
            error: Failure::uncaught("too late"),
            ..failure("late")
        });

        let json: serde_json::Value =
            serde_json::from_str(&res.to_json().unwrap()).unwrap();
        assert_eq!(
            json["failures"][0]["error_message"],
            "Timeout of 25ms exceeded. Ensure the runnable completes in time.",
        );
        assert_eq!(json["failures"][0]["full_title"], "suite slow");
        assert_eq!(json["failures"][1]["error_message"], "too late");
        assert_eq!(json["failures"][1]["origin"], "uncaught");
    }
}
