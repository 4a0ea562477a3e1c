// tests/foreground.rs

mod common;

use std::io::ErrorKind;

use common::{exec, with_timeout};
use nix::sys::resource::Resource;
use procexec::{ExecError, ExecOptions, Invocation, StreamSpec};
use tempfile::TempDir;

#[tokio::test]
async fn shell_exit_code_is_reported_not_raised() {
    let result = with_timeout(exec().exec("exit 7", ExecOptions::new()))
        .await
        .expect("exec")
        .into_result()
        .await
        .expect("result");

    assert_eq!(result.exit_code(), 7);
    assert!(!result.success());
    assert!(result.is_error());
    assert!(result.captured_out().is_none());
    assert!(result.captured_err().is_none());
}

#[tokio::test]
async fn capture_returns_stdout_text() {
    let out = with_timeout(exec().capture("echo hello", ExecOptions::new()))
        .await
        .expect("capture");
    assert_eq!(out, "hello\n");
}

#[tokio::test]
async fn argv_command_with_captured_out() {
    let result = with_timeout(
        exec().exec(vec!["echo", "hi"], ExecOptions::new().stdout(StreamSpec::Capture)),
    )
    .await
    .expect("exec")
    .into_result()
    .await
    .expect("result");

    assert_eq!(result.captured_out_str().as_deref(), Some("hi\n"));
    assert!(result.captured_err().is_none());
    assert_eq!(result.exit_code(), 0);
    assert!(result.success());
}

#[tokio::test]
async fn argv_commands_bypass_the_shell() {
    let out = with_timeout(exec().capture(vec!["printf", "%s|", "a b", "$HOME"], ExecOptions::new()))
        .await
        .expect("capture");
    assert_eq!(out, "a b|$HOME|");
}

#[tokio::test]
async fn sh_returns_exit_code() {
    let code = with_timeout(exec().sh("exit 3", ExecOptions::new()))
        .await
        .expect("sh");
    assert_eq!(code, 3);
}

#[tokio::test]
async fn signalled_child_reports_shell_style_code() {
    let result = with_timeout(exec().exec("kill -TERM $$", ExecOptions::new()))
        .await
        .expect("exec")
        .into_result()
        .await
        .expect("result");

    assert_eq!(result.signal(), Some(15));
    assert_eq!(result.exit_code(), 128 + 15);
    assert!(!result.success());
}

#[tokio::test]
async fn env_overrides_reach_the_child() {
    let opts = ExecOptions::new().env("PROCEXEC_TEST_VAR", "from-call");
    let out = with_timeout(exec().capture("echo $PROCEXEC_TEST_VAR", opts))
        .await
        .expect("capture");
    assert_eq!(out, "from-call\n");
}

#[tokio::test]
async fn env_remove_hides_an_inherited_variable() {
    let opts = ExecOptions::new().env_remove("HOME");
    let out = with_timeout(exec().capture("echo \"[${HOME:-unset}]\"", opts))
        .await
        .expect("capture");
    assert_eq!(out, "[unset]\n");
}

#[tokio::test]
async fn chdir_sets_the_working_directory() {
    let dir = TempDir::new().unwrap();
    let expected = dir.path().canonicalize().unwrap();

    let out = with_timeout(exec().capture("pwd -P", ExecOptions::new().chdir(dir.path())))
        .await
        .expect("capture");
    assert_eq!(out.trim_end(), expected.to_str().unwrap());
}

#[tokio::test]
async fn umask_applies_in_the_child() {
    let out = with_timeout(exec().capture("umask", ExecOptions::new().umask(0o027)))
        .await
        .expect("capture");
    assert_eq!(out.trim_end(), "0027");
}

#[tokio::test]
async fn rlimit_applies_in_the_child() {
    let opts = ExecOptions::new().rlimit(Resource::RLIMIT_NOFILE, 64, 64);
    let out = with_timeout(exec().capture("ulimit -n", opts))
        .await
        .expect("capture");
    assert_eq!(out.trim_end(), "64");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn argv0_renames_the_program() {
    let opts = ExecOptions::new().argv0("renamed-shell");
    let out = with_timeout(exec().capture(
        vec!["sh", "-c", "tr '\\0' ' ' < /proc/$$/cmdline"],
        opts,
    ))
    .await
    .expect("capture");
    assert!(out.starts_with("renamed-shell "), "cmdline was {out:?}");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn new_pgroup_makes_the_child_a_group_leader() {
    let opts = ExecOptions::new().new_pgroup(true);
    let out = with_timeout(exec().capture("echo $$ $(cut -d' ' -f5 /proc/$$/stat)", opts))
        .await
        .expect("capture");
    let fields: Vec<&str> = out.split_whitespace().collect();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0], fields[1]);
}

#[tokio::test]
async fn unsetenv_others_clears_the_inherited_environment() {
    let opts = ExecOptions::new()
        .unsetenv_others(true)
        .env("ONLY_VAR", "1")
        .stdout(StreamSpec::Capture);
    let result = with_timeout(exec().exec(vec!["/usr/bin/env"], opts))
        .await
        .expect("exec")
        .into_result()
        .await
        .expect("result");
    assert_eq!(result.captured_out_str().as_deref(), Some("ONLY_VAR=1\n"));
}

#[tokio::test]
async fn empty_argv_is_a_launch_error() {
    let err = exec()
        .exec(Invocation::from(Vec::<String>::new()), ExecOptions::new())
        .await
        .err()
        .expect("empty argv must fail");

    match err {
        ExecError::Launch { source, .. } => assert_eq!(source.kind(), ErrorKind::InvalidInput),
        other => panic!("expected Launch error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_program_is_a_launch_error() {
    let err = exec()
        .exec(vec!["/nonexistent/procexec-no-such-program"], ExecOptions::new())
        .await
        .err()
        .expect("missing program must fail");

    match err {
        ExecError::Launch { program, source } => {
            assert_eq!(program, "/nonexistent/procexec-no-such-program");
            assert_eq!(source.kind(), ErrorKind::NotFound);
        }
        other => panic!("expected Launch error, got {other:?}"),
    }
}

#[tokio::test]
async fn bad_chdir_is_a_launch_error() {
    let opts = ExecOptions::new().chdir("/nonexistent/procexec-no-such-dir");
    let err = exec().exec("true", opts).await.err().expect("bad chdir must fail");
    assert!(matches!(err, ExecError::Launch { .. }), "got {err:?}");
}
