use std::io::Write as _;

use nestrun::{
    error::DeclarationResult, Argv, Callback, ConfigError, DeclarationError,
    Dsl, Error, Harness, Keyword, KeywordTable, Verdict,
};

fn simple_ui() -> KeywordTable {
    KeywordTable::new("simple-ui")
        .with("suite", Keyword::Suite)
        .with("test", Keyword::Test)
        .with("setup", Keyword::Hook(nestrun::HookKind::BeforeEach))
}

fn opts_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn required_module_provides_custom_interface() {
    let missing = tempfile::tempdir().unwrap();
    let opts = missing.path().join("none.opts").display().to_string();

    let result = Harness::from_args(Argv::new([
        "nestrun",
        "--opts",
        opts.as_str(),
        "--require",
        "simple-ui",
        "--ui",
        "simple-ui",
    ]))
    .unwrap()
    .module("simple-ui", |interfaces| interfaces.register(simple_ui()))
    .file("simple", |d| {
        _ = d.suite("suite", "simple", |d| {
            _ = d.runnable("setup", "", Callback::sync(|_| ()))?;
            d.runnable("test", "works", Callback::sync(|_| ())).map(drop)
        })?;
        Ok(())
    })
    .run()
    .await
    .unwrap();

    assert_eq!(result.stats().passed, 1);
    assert_eq!(result.exit_code(), 0);
}

#[tokio::test]
async fn interface_is_selected_after_modules_load() {
    let err = Harness::new()
        .with_config(nestrun::Config::default().with_ui("simple-ui"))
        .module("simple-ui", |interfaces| interfaces.register(simple_ui()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Config(ConfigError::UnknownInterface { ref name })
            if name == "simple-ui",
    ));
}

/// Declares the same shape wherever it's called from.
fn shared_helper(d: &mut Dsl<'_>, title: &str) -> DeclarationResult<()> {
    _ = d.suite("describe", title.to_owned(), |d| {
        _ = d.runnable("it", "first", Callback::sync(|_| ()))?;
        d.runnable("it", "second", Callback::sync(|_| ())).map(drop)
    })?;
    Ok(())
}

#[tokio::test]
async fn every_test_is_recorded_exactly_once() {
    let result = Harness::new()
        .file("a", |d| shared_helper(d, "a"))
        .file("b", |d| {
            shared_helper(d, "b")?;
            d.runnable("it", "own", Callback::sync(|_| ())).map(drop)
        })
        .file("c", |d| shared_helper(d, "a"))
        .run()
        .await
        .unwrap();

    assert_eq!(
        result
            .tests()
            .iter()
            .map(|t| t.full_title.as_str())
            .collect::<Vec<_>>(),
        [
            "a first", "a second", "b first", "b second", "own", "a first",
            "a second",
        ],
    );
    assert!(result.tests().iter().all(|t| t.verdict == Verdict::Passed));
}

#[tokio::test]
async fn options_file_is_merged_once() {
    let file = opts_file("# defaults\n--ui tdd\n--retries 1\n");
    let path = file.path().display().to_string();

    let harness = Harness::from_args(Argv::new([
        "nestrun",
        "--opts",
        path.as_str(),
        "--retries",
        "3",
    ]))
    .unwrap();

    assert_eq!(harness.config().ui, "tdd");
    assert_eq!(harness.config().retries, 3);

    let result = harness
        .file("tdd", |d| {
            _ = d.suite("suite", "s", |d| {
                d.runnable("test", "t", Callback::sync(|_| ())).map(drop)
            })?;
            Ok(())
        })
        .run()
        .await
        .unwrap();
    assert_eq!(result.stats().passed, 1);
}

#[tokio::test]
async fn declaration_errors_surface() {
    let err = Harness::new()
        .file("wrong", |d| {
            d.runnable("test", "tdd word", Callback::sync(|_| ())).map(drop)
        })
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Declaration(DeclarationError::UnknownKeyword { .. }),
    ));
}

#[test]
fn invalid_arguments_are_config_errors() {
    let err = Harness::from_args(Argv::new([
        "nestrun",
        "--opts",
        "does/not/exist.opts",
        "--retries",
        "many",
    ]))
    .unwrap_err();

    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidCliArgs { .. }),
    ));
}
