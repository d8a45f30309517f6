use std::{cell::RefCell, collections::HashMap, rc::Rc, time::Duration};

use nestrun::{
    Callback, Failure, FailureOrigin, HookKind, Outcome, Runner, Stats, Tree,
    Verdict,
};

#[tokio::test]
async fn sync_error_with_async_completion_fails_exactly_once() {
    let mut tree = Tree::new();
    let s = tree.add_suite(tree.root(), "global errors");
    tree.add_test(
        s,
        "fails exactly once when a global error is thrown synchronously and \
         done errors",
        Callback::done(|cx, done| {
            _ = cx.spawn(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                done.fail("test error");
            });
            panic!("sync error");
        }),
    );
    tree.add_test(
        s,
        "fails exactly once when a global error is thrown synchronously and \
         done completes",
        Callback::done(|cx, done| {
            _ = cx.spawn(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                done.ok();
            });
            panic!("sync error");
        }),
    );

    let result = Runner::default().run(tree).await;

    assert_eq!(result.failures().len(), 2);
    assert_eq!(
        result.failures().iter().map(|f| f.title.as_str()).collect::<Vec<_>>(),
        [
            "fails exactly once when a global error is thrown synchronously \
             and done errors",
            "fails exactly once when a global error is thrown synchronously \
             and done completes",
        ],
    );
    assert!(result
        .failures()
        .iter()
        .all(|f| f.error == Failure::assertion("sync error")));
    assert_eq!(result.exit_code(), 2);
}

#[tokio::test]
async fn late_error_does_not_rerun_tests() {
    let runs = Rc::new(RefCell::new(HashMap::<&str, usize>::new()));
    let count = |title: &'static str| {
        let runs = Rc::clone(&runs);
        move || *runs.borrow_mut().entry(title).or_default() += 1
    };

    let mut tree = Tree::new();
    let s = tree.add_suite(tree.root(), "late");
    let first = count("test 1");
    tree.add_test(
        s,
        "test 1",
        Callback::sync(move |cx| {
            first();
            _ = cx.spawn(async {
                panic!("Too bad");
            });
        }),
    );
    let second = count("test 2");
    tree.add_test(s, "test 2", Callback::sync(move |_| second()));
    let third = count("test 3");
    tree.add_test(
        s,
        "test 3",
        Callback::sync(move |_| -> Outcome {
            third();
            panic!("OUCH");
        }),
    );

    let result = Runner::default().run(tree).await;

    assert_eq!(
        *runs.borrow(),
        HashMap::from([("test 1", 1), ("test 2", 1), ("test 3", 1)]),
    );
    assert_eq!(result.tests().len(), 3);
    assert_eq!(result.test("late test 1").unwrap().verdict, Verdict::Passed);
    assert_eq!(result.test("late test 3").unwrap().verdict, Verdict::Failed);

    let late = result
        .failures()
        .iter()
        .find(|f| f.origin == FailureOrigin::Uncaught)
        .unwrap();
    assert_eq!(late.full_title, "late test 1");
    assert_eq!(late.error, Failure::uncaught("Too bad"));
    assert_eq!(result.failures().len(), 2);
}

#[tokio::test]
async fn error_in_async_before_all_window_fails_the_hook() {
    let mut tree = Tree::new();
    let s = tree.add_suite(tree.root(), "issue");
    tree.add_hook(
        s,
        HookKind::BeforeAll,
        Callback::future(|cx| {
            _ = cx.spawn(async {
                panic!("hook error");
            });
            tokio::time::sleep(Duration::from_millis(50))
        }),
    );
    tree.add_test(s, "test", Callback::sync(|_| ()));

    let result = Runner::default().run(tree).await;

    assert_eq!(result.stats(), Stats { pending: 0, passed: 0, failed: 1 });
    assert_eq!(result.test("issue test").unwrap().verdict, Verdict::NotRun);
    let failure = &result.failures()[0];
    assert_eq!(failure.origin, FailureOrigin::Hook(HookKind::BeforeAll));
    assert_eq!(failure.error, Failure::uncaught("hook error"));
    assert_eq!(result.exit_code(), 1);
}

#[tokio::test]
async fn raised_error_is_attributed_to_running_test() {
    let mut tree = Tree::new();
    tree.add_test(
        tree.root(),
        "raises",
        Callback::future(|cx| async move {
            cx.uncaught().raise("boom");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }),
    );
    tree.add_test(tree.root(), "next", Callback::sync(|_| ()));

    let result = Runner::default().run(tree).await;

    assert_eq!(result.test("raises").unwrap().verdict, Verdict::Failed);
    assert_eq!(result.test("next").unwrap().verdict, Verdict::Passed);
    assert_eq!(result.failures().len(), 1);
    assert_eq!(result.failures()[0].origin, FailureOrigin::Test);
    assert_eq!(result.failures()[0].error, Failure::uncaught("boom"));
}

#[tokio::test]
async fn stray_error_of_timed_out_runnable_is_late() {
    let mut tree = Tree::new();
    let slow = tree.add_test(
        tree.root(),
        "abandoned",
        Callback::future(|cx| {
            let handle = cx.uncaught();
            _ = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                handle.raise("stray");
            });
            futures::future::pending::<()>()
        }),
    );
    _ = tree.runnable_mut(slow).set_timeout(Duration::from_millis(10));
    tree.add_test(
        tree.root(),
        "next",
        Callback::future(|_| tokio::time::sleep(Duration::from_millis(80))),
    );

    let result = Runner::default().run(tree).await;

    assert_eq!(result.test("next").unwrap().verdict, Verdict::Passed);
    assert_eq!(
        result.failures().iter().map(|f| f.origin).collect::<Vec<_>>(),
        [FailureOrigin::Test, FailureOrigin::Uncaught],
    );
    assert!(result.failures()[0].error.is_timeout());
    assert_eq!(result.failures()[1].full_title, "abandoned");
}

#[tokio::test]
async fn separate_runs_do_not_share_captures() {
    let run = || {
        let mut tree = Tree::new();
        tree.add_test(
            tree.root(),
            "t",
            Callback::future(|cx| async move {
                cx.uncaught().raise("own");
            }),
        );
        Runner::default().run(tree)
    };

    let (a, b) = futures::join!(run(), run());

    assert_eq!(a.failures().len(), 1);
    assert_eq!(b.failures().len(), 1);
}

async fn explode(msg: &'static str) {
    panic!("{msg}");
}

#[tokio::test]
async fn panic_of_bare_task_fails_running_test() {
    let mut tree = Tree::new();
    let s = tree.add_suite(tree.root(), "bare");
    tree.add_test(
        s,
        "spawns",
        Callback::future(|_| async {
            _ = tokio::spawn(explode("escaped"));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }),
    );
    tree.add_test(s, "next", Callback::sync(|_| ()));

    let result = Runner::default().run(tree).await;

    assert_eq!(result.test("bare spawns").unwrap().verdict, Verdict::Failed);
    assert_eq!(result.test("bare next").unwrap().verdict, Verdict::Passed);
    assert_eq!(result.failures().len(), 1);
    assert_eq!(result.failures()[0].origin, FailureOrigin::Test);
    assert_eq!(result.failures()[0].error, Failure::uncaught("escaped"));
}

#[tokio::test]
async fn panic_of_bare_task_after_completion_is_late() {
    let mut tree = Tree::new();
    let s = tree.add_suite(tree.root(), "bare");
    tree.add_test(
        s,
        "returns",
        Callback::sync(|_| {
            _ = tokio::spawn(explode("after"));
        }),
    );
    tree.add_test(
        s,
        "waits",
        Callback::future(|_| tokio::time::sleep(Duration::from_millis(10))),
    );

    let result = Runner::default().run(tree).await;

    assert_eq!(result.test("bare returns").unwrap().verdict, Verdict::Passed);
    assert_eq!(result.test("bare waits").unwrap().verdict, Verdict::Passed);
    assert_eq!(result.failures().len(), 1);
    assert_eq!(result.failures()[0].origin, FailureOrigin::Uncaught);
    assert_eq!(result.failures()[0].full_title, "bare returns");
    assert_eq!(result.failures()[0].error, Failure::uncaught("after"));
}
