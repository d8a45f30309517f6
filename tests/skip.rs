use std::{cell::RefCell, rc::Rc};

use nestrun::{Callback, HookKind, Outcome, Runner, Stats, Tree, Verdict};

/// How often a skipping runnable skips.
#[derive(Clone, Copy, Debug)]
enum Mode {
    Always,
    Once,
}

/// Labels of the runnables in the fixture suite, in declaration order.
const LABELS: [&str; 10] =
    ["ba0", "ba1", "be0", "be1", "t0", "t1", "ae0", "ae1", "aa0", "aa1"];

fn label(kind: HookKind, i: usize) -> String {
    let prefix = match kind {
        HookKind::BeforeAll => "ba",
        HookKind::BeforeEach => "be",
        HookKind::AfterEach => "ae",
        HookKind::AfterAll => "aa",
    };
    format!("{prefix}{i}")
}

/// Invocations and skip signals of a fixture run.
#[derive(Debug, Default)]
struct Log {
    calls: Vec<String>,
    skips: Vec<String>,
}

/// Runs a suite with two runnables of every kind, where the `skipping` ones
/// emit a skip signal.
async fn run(skipping: &[&str], mode: Mode) -> (Log, Stats) {
    let log = Rc::new(RefCell::new(Log::default()));
    let callback = |entry: String| {
        let log = Rc::clone(&log);
        let skips = skipping.contains(&entry.as_str());
        let mut skipped = false;
        Callback::sync(move |_| {
            let mut log = log.borrow_mut();
            log.calls.push(entry.clone());
            let skip = skips
                && match mode {
                    Mode::Always => true,
                    Mode::Once => !skipped,
                };
            if skip {
                skipped = true;
                log.skips.push(entry.clone());
                Outcome::Skip
            } else {
                Outcome::Continue
            }
        })
    };

    let mut tree = Tree::new();
    let suite = tree.add_suite(tree.root(), "skipping");
    for kind in HookKind::ALL {
        for i in 0..2 {
            tree.add_hook(suite, kind, callback(label(kind, i)));
        }
    }
    for i in 0..2 {
        tree.add_test(suite, format!("t{i}"), callback(format!("t{i}")));
    }

    let result = Runner::default().run(tree).await;
    assert!(result.is_success(), "skipping never fails: {result:?}");
    assert_eq!(result.tests().len(), 2);

    let log = log.replace(Log::default());
    (log, result.stats())
}

fn stats(pending: usize, passed: usize) -> Stats {
    Stats { pending, passed, failed: 0 }
}

/// Describes how every runnable of the fixture has been called.
fn report(log: &Log) -> Vec<String> {
    let words = |n: usize| match n {
        1 => "once",
        2 => "twice",
        _ => "more than twice",
    };
    let count = |entries: &[String], l: &str| {
        entries.iter().filter(|e| *e == l).count()
    };

    LABELS
        .iter()
        .map(|&l| {
            let (calls, skips) = (count(&log.calls, l), count(&log.skips, l));
            if skips > 0 {
                format!("{l}: called skip {}", words(skips))
            } else if calls == 0 {
                format!("{l}: skipped")
            } else {
                format!("{l}: run {}", words(calls))
            }
        })
        .collect()
}

#[tokio::test]
async fn both_same_phase_runnables_skipping() {
    let cases: [(&[&str], Mode, [&str; 10]); 9] = [
        (
            &["ba0", "ba1"],
            Mode::Always,
            [
                "ba0: called skip once",
                "ba1: called skip once",
                "be0: skipped",
                "be1: skipped",
                "t0: skipped",
                "t1: skipped",
                "ae0: skipped",
                "ae1: skipped",
                "aa0: run once",
                "aa1: run once",
            ],
        ),
        (
            &["ba0", "ba1"],
            Mode::Once,
            [
                "ba0: called skip once",
                "ba1: called skip once",
                "be0: skipped",
                "be1: skipped",
                "t0: skipped",
                "t1: skipped",
                "ae0: skipped",
                "ae1: skipped",
                "aa0: run once",
                "aa1: run once",
            ],
        ),
        (
            &["be0", "be1"],
            Mode::Always,
            [
                "ba0: run once",
                "ba1: run once",
                "be0: called skip twice",
                "be1: called skip twice",
                "t0: skipped",
                "t1: skipped",
                "ae0: run twice",
                "ae1: run twice",
                "aa0: run once",
                "aa1: run once",
            ],
        ),
        (
            &["be0", "be1"],
            Mode::Once,
            [
                "ba0: run once",
                "ba1: run once",
                "be0: called skip once",
                "be1: called skip once",
                "t0: skipped",
                "t1: run once",
                "ae0: run twice",
                "ae1: run twice",
                "aa0: run once",
                "aa1: run once",
            ],
        ),
        (
            &["t0", "t1"],
            Mode::Always,
            [
                "ba0: run once",
                "ba1: run once",
                "be0: run twice",
                "be1: run twice",
                "t0: called skip once",
                "t1: called skip once",
                "ae0: run twice",
                "ae1: run twice",
                "aa0: run once",
                "aa1: run once",
            ],
        ),
        (
            &["t0", "t1"],
            Mode::Once,
            [
                "ba0: run once",
                "ba1: run once",
                "be0: run twice",
                "be1: run twice",
                "t0: called skip once",
                "t1: called skip once",
                "ae0: run twice",
                "ae1: run twice",
                "aa0: run once",
                "aa1: run once",
            ],
        ),
        (
            &["ae0", "ae1"],
            Mode::Once,
            [
                "ba0: run once",
                "ba1: run once",
                "be0: run once",
                "be1: run once",
                "t0: run once",
                "t1: skipped",
                "ae0: called skip once",
                "ae1: called skip once",
                "aa0: run once",
                "aa1: run once",
            ],
        ),
        (
            &["aa0", "aa1"],
            Mode::Always,
            [
                "ba0: run once",
                "ba1: run once",
                "be0: run twice",
                "be1: run twice",
                "t0: run once",
                "t1: run once",
                "ae0: run twice",
                "ae1: run twice",
                "aa0: called skip once",
                "aa1: called skip once",
            ],
        ),
        (
            &["aa0", "aa1"],
            Mode::Once,
            [
                "ba0: run once",
                "ba1: run once",
                "be0: run twice",
                "be1: run twice",
                "t0: run once",
                "t1: run once",
                "ae0: run twice",
                "ae1: run twice",
                "aa0: called skip once",
                "aa1: called skip once",
            ],
        ),
    ];

    for (skipping, mode, expected) in cases {
        let (log, _) = run(skipping, mode).await;
        assert_eq!(report(&log), expected, "{skipping:?} {mode:?}");
    }
}

#[tokio::test]
async fn before_all_skip_skips_whole_suite() {
    for skipping in ["ba0", "ba1"] {
        for mode in [Mode::Always, Mode::Once] {
            let (log, stats) = run(&[skipping], mode).await;

            assert_eq!(
                log.calls,
                ["ba0", "ba1", "aa0", "aa1"],
                "{skipping} {mode:?}",
            );
            assert_eq!(stats, self::stats(2, 0), "{skipping} {mode:?}");
        }
    }
}

#[tokio::test]
async fn before_each_skip_always() {
    for skipping in ["be0", "be1"] {
        let (log, stats) = run(&[skipping], Mode::Always).await;
        assert_eq!(
            log.calls,
            [
                "ba0", "ba1", //
                "be0", "be1", "ae0", "ae1", //
                "be0", "be1", "ae0", "ae1", //
                "aa0", "aa1",
            ],
            "{skipping}",
        );
        assert_eq!(stats, self::stats(2, 0), "{skipping}");
    }
}

#[tokio::test]
async fn before_each_skip_once() {
    for skipping in ["be0", "be1"] {
        let (log, stats) = run(&[skipping], Mode::Once).await;
        assert_eq!(
            log.calls,
            [
                "ba0", "ba1", //
                "be0", "be1", "ae0", "ae1", //
                "be0", "be1", "t1", "ae0", "ae1", //
                "aa0", "aa1",
            ],
            "{skipping}",
        );
        assert_eq!(stats, self::stats(1, 1), "{skipping}");
    }
}

#[tokio::test]
async fn test_skip_marks_only_that_test() {
    for skipping in ["t0", "t1"] {
        let (log, stats) = run(&[skipping], Mode::Always).await;
        assert_eq!(
            log.calls,
            [
                "ba0", "ba1", //
                "be0", "be1", "t0", "ae0", "ae1", //
                "be0", "be1", "t1", "ae0", "ae1", //
                "aa0", "aa1",
            ],
        );
        assert_eq!(stats, self::stats(1, 1), "{skipping}");
    }
}

#[tokio::test]
async fn after_each_skip_skips_remaining_tests() {
    for mode in [Mode::Always, Mode::Once] {
        let (log, stats) = run(&["ae0"], mode).await;
        assert_eq!(
            log.calls,
            [
                "ba0", "ba1", //
                "be0", "be1", "t0", "ae0", "ae1", //
                "aa0", "aa1",
            ],
            "{mode:?}",
        );
        assert_eq!(stats, self::stats(1, 1), "{mode:?}");
    }
}

#[tokio::test]
async fn after_all_skip_still_runs_remaining_after_all() {
    for skipping in ["aa0", "aa1"] {
        for mode in [Mode::Always, Mode::Once] {
            let (log, stats) = run(&[skipping], mode).await;
            assert_eq!(
                log.calls,
                [
                    "ba0", "ba1", //
                    "be0", "be1", "t0", "ae0", "ae1", //
                    "be0", "be1", "t1", "ae0", "ae1", //
                    "aa0", "aa1",
                ],
                "{skipping} {mode:?}",
            );
            assert_eq!(stats, self::stats(0, 2), "{skipping} {mode:?}");
        }
    }
}

#[tokio::test]
async fn skip_does_not_leak_into_sibling_suites() {
    let mut tree = Tree::new();
    let skipped = tree.add_suite(tree.root(), "skipped");
    tree.add_hook(
        skipped,
        HookKind::BeforeAll,
        Callback::sync(|_| Outcome::Skip),
    );
    tree.add_test(skipped, "a", Callback::sync(|_| ()));
    let nested = tree.add_suite(skipped, "nested");
    tree.add_test(nested, "b", Callback::sync(|_| ()));
    let sibling = tree.add_suite(tree.root(), "sibling");
    tree.add_test(sibling, "c", Callback::sync(|_| ()));

    let result = Runner::default().run(tree).await;

    assert_eq!(result.stats(), stats(2, 1));
    assert!(result.test("sibling c").is_some());
}

#[tokio::test]
async fn after_each_skip_does_not_leak_into_sibling_suites() {
    let mut tree = Tree::new();
    let cut = tree.add_suite(tree.root(), "cut");
    tree.add_hook(cut, HookKind::AfterEach, Callback::sync(|_| Outcome::Skip));
    tree.add_test(cut, "a", Callback::sync(|_| ()));
    let nested = tree.add_suite(cut, "nested");
    tree.add_test(nested, "b", Callback::sync(|_| ()));
    let sibling = tree.add_suite(tree.root(), "sibling");
    tree.add_test(sibling, "c", Callback::sync(|_| ()));

    let result = Runner::default().run(tree).await;

    assert_eq!(result.stats(), stats(1, 2));
    assert_eq!(
        result.test("cut nested b").unwrap().verdict,
        Verdict::Pending,
    );
    assert_eq!(
        result.test("sibling c").unwrap().verdict,
        Verdict::Passed,
    );
}
