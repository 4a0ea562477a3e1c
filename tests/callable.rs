// tests/callable.rs

mod common;

use common::{exec, with_timeout};
use procexec::builtins;
use procexec::exec::{CALLABLE_FAILURE_EXIT_CODE, CALLABLE_UNKNOWN_EXIT_CODE};
use procexec::{Callable, ExecOptions, ExecResult, StreamSpec};
use tempfile::TempDir;

async fn run_callable(callable: Callable, opts: ExecOptions) -> ExecResult {
    with_timeout(async {
        exec()
            .exec_callable(callable, opts)
            .await
            .expect("exec")
            .into_result()
            .await
            .expect("result")
    })
    .await
}

#[tokio::test]
async fn callable_output_is_captured() {
    let out = with_timeout(
        exec().capture_callable(Callable::new("echo").args(["hello", "callable"]), ExecOptions::new()),
    )
    .await
    .expect("capture");
    assert_eq!(out, "hello callable\n");
}

#[tokio::test]
async fn callable_return_value_is_the_exit_code() {
    let result = run_callable(Callable::new("exit").arg("42"), ExecOptions::new()).await;
    assert_eq!(result.exit_code(), 42);
    assert!(result.captured_out().is_none());
    assert!(result.captured_err().is_none());
}

#[tokio::test]
async fn out_of_range_return_value_exits_with_failure_code() {
    let opts = ExecOptions::new().stderr(StreamSpec::Capture);
    let result = run_callable(Callable::new("exit").arg("256"), opts).await;

    assert_eq!(result.exit_code(), CALLABLE_FAILURE_EXIT_CODE);
    assert!(result.captured_err_str().unwrap().contains("outside 0..=255"));
}

#[tokio::test]
async fn callable_error_exits_with_failure_code() {
    let opts = ExecOptions::new().stderr(StreamSpec::Capture);
    let result = run_callable(Callable::new("fail").arg("boom"), opts).await;

    assert_eq!(result.exit_code(), CALLABLE_FAILURE_EXIT_CODE);
    assert!(result.captured_err_str().unwrap().contains("boom"));
}

#[tokio::test]
async fn callable_panic_exits_with_failure_code() {
    let opts = ExecOptions::new().stderr(StreamSpec::Null);
    let result = run_callable(Callable::new("panic"), opts).await;
    assert_eq!(result.exit_code(), CALLABLE_FAILURE_EXIT_CODE);
}

#[tokio::test]
async fn unknown_callable_exits_with_unknown_code() {
    let opts = ExecOptions::new().stderr(StreamSpec::Capture);
    let result = run_callable(Callable::new("no-such-callable"), opts).await;

    assert_eq!(result.exit_code(), CALLABLE_UNKNOWN_EXIT_CODE);
    assert!(result.captured_err_str().unwrap().contains("no-such-callable"));
}

#[tokio::test]
async fn callable_streams_are_routed_like_commands() {
    let opts = ExecOptions::new()
        .stdin(StreamSpec::string("piped through a callable"))
        .stdout(StreamSpec::Capture);
    let result = run_callable(Callable::new("cat"), opts).await;
    assert_eq!(
        result.captured_out_str().as_deref(),
        Some("piped through a callable")
    );
}

#[tokio::test]
async fn callable_sees_env_and_chdir_but_not_the_dispatch_variable() {
    let dir = TempDir::new().unwrap();
    let opts = ExecOptions::new()
        .unsetenv_others(true)
        .env("GREETING", "hi")
        .chdir(dir.path());

    let out = with_timeout(exec().capture_callable(Callable::new("env"), opts))
        .await
        .expect("capture");
    assert_eq!(out, "GREETING=hi\n");
}

#[tokio::test]
async fn callable_can_run_in_background() {
    let opts = ExecOptions::new()
        .background(true)
        .stdin(StreamSpec::Controller)
        .stdout(StreamSpec::Capture);
    let mut ctl = exec()
        .exec_callable(Callable::new("cat"), opts)
        .await
        .expect("exec")
        .into_controller()
        .expect("controller");

    {
        use tokio::io::AsyncWriteExt;
        let stdin = ctl.stdin().expect("stdin");
        stdin.write_all(b"async input").await.unwrap();
        stdin.flush().await.unwrap();
    }
    ctl.close_stream(procexec::StreamName::In).unwrap();

    let result = with_timeout(ctl.wait()).await.unwrap();
    assert_eq!(result.captured_out_str().as_deref(), Some("async input"));
}

#[test]
fn registry_invoke_maps_outcomes_to_codes() {
    let registry = builtins::registry();

    assert_eq!(registry.invoke("exit", vec!["3".into()]), 3);
    assert_eq!(registry.invoke("exit", vec!["not-a-number".into()]), CALLABLE_FAILURE_EXIT_CODE);
    assert_eq!(registry.invoke("fail", Vec::new()), CALLABLE_FAILURE_EXIT_CODE);
    assert_eq!(registry.invoke("missing", Vec::new()), CALLABLE_UNKNOWN_EXIT_CODE);
    assert_eq!(registry.invoke("exit", vec!["255".into()]), 255);
    assert_eq!(registry.invoke("exit", vec!["256".into()]), CALLABLE_FAILURE_EXIT_CODE);
    assert_eq!(registry.invoke("exit", vec!["-1".into()]), CALLABLE_FAILURE_EXIT_CODE);

    let names: Vec<&str> = registry.names().collect();
    assert_eq!(names, ["cat", "echo", "env", "exit", "fail", "panic"]);
}
