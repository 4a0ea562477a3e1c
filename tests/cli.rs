// tests/cli.rs

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

fn procexec(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_procexec"))
        .args(args)
        .env_remove("PROCEXEC_CALLABLE")
        .output()
        .expect("run procexec binary")
}

#[test]
fn run_reports_child_exit_code_and_captured_output() {
    let out = procexec(&["run", "--out", "capture", "--", "sh", "-c", "echo hi; exit 3"]);
    assert_eq!(out.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "hi\n");
}

#[test]
fn run_routes_string_input() {
    let out = procexec(&["run", "--in", "string:abc", "--out", "capture", "--", "cat"]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "abc");
}

#[test]
fn run_passes_env_flags() {
    let out = procexec(&[
        "run",
        "--env",
        "PROCEXEC_CLI=yes",
        "--out",
        "capture",
        "--",
        "sh",
        "-c",
        "echo $PROCEXEC_CLI",
    ]);
    assert_eq!(String::from_utf8_lossy(&out.stdout), "yes\n");
}

#[test]
fn call_runs_a_builtin_callable() {
    let out = procexec(&["call", "exit", "5"]);
    assert_eq!(out.status.code(), Some(5));

    let out = procexec(&["call", "--out", "capture", "echo", "a", "b"]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "a b\n");
}

#[test]
fn misapplied_stream_flag_fails_before_running() {
    let out = procexec(&["run", "--in", "capture", "--", "true"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid stream spec"));
}

#[test]
fn config_file_defaults_are_applied() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[defaults]\nerr = [\"child\", \"out\"]\n").unwrap();

    let out = procexec(&[
        "--config",
        file.path().to_str().unwrap(),
        "run",
        "--out",
        "capture",
        "--",
        "sh",
        "-c",
        "echo merged >&2",
    ]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "merged\n");
}

#[test]
fn unknown_config_key_is_reported() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[defaults]\nnope = 1\n").unwrap();

    let out = procexec(&["--config", file.path().to_str().unwrap(), "run", "--", "true"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("nope"));
}

#[test]
fn background_rejects_routes_that_need_the_parent() {
    for args in [
        ["run", "--background", "--out", "capture", "--", "true"],
        ["run", "--background", "--in", "string:abc", "--", "cat"],
    ] {
        let out = procexec(&args);
        assert_eq!(out.status.code(), Some(1));
        assert!(String::from_utf8_lossy(&out.stderr).contains("--background"));
    }
}

#[test]
fn background_prints_the_pid() {
    let out = procexec(&["run", "--background", "--out", "null", "--", "true"]);
    assert_eq!(out.status.code(), Some(0));
    let pid = String::from_utf8_lossy(&out.stdout);
    assert!(pid.trim().parse::<u32>().is_ok(), "unexpected stdout: {pid:?}");
}
