// tests/options.rs

mod common;

use common::{exec, with_timeout};
use procexec::config::{ExecOptions, load_defaults, resolve};
use procexec::types::LogLevelSetting;
use procexec::{Exec, ExecError, PgroupSetting, StreamName, StreamSpec};
use procexec_test_utils::{defaults_file, toml_table};

fn expect_invalid_option(result: procexec::Result<ExecOptions>, key: &str) {
    match result {
        Err(ExecError::InvalidOption { key: got, .. }) => assert_eq!(got, key),
        Err(other) => panic!("expected InvalidOption({key}), got {other:?}"),
        Ok(opts) => panic!("expected InvalidOption({key}), got {opts:?}"),
    }
}

#[test]
fn unknown_key_is_rejected_by_name() {
    let table = toml_table("logger = \"exec\"\nbogus_key = 1").unwrap();
    expect_invalid_option(ExecOptions::from_table(&table), "bogus_key");
}

#[test]
fn set_rejects_unknown_key_without_touching_the_layer() {
    let mut opts = ExecOptions::new();
    let err = opts
        .set("stdout", &toml::Value::String("capture".into()))
        .unwrap_err();
    assert!(matches!(err, ExecError::InvalidOption { ref key, .. } if key == "stdout"));
    assert!(opts.is_background().is_none());
}

#[test]
fn ill_typed_values_are_rejected() {
    for (snippet, key) in [
        ("background = \"yes\"", "background"),
        ("log_level = \"verbose\"", "log_level"),
        ("umask = \"999\"", "umask"),
        ("pgroup = -4", "pgroup"),
        ("env = [\"A=1\"]", "env"),
        ("nonzero_status_handler = \"explode\"", "nonzero_status_handler"),
        ("rlimit_bogus = 10", "rlimit_bogus"),
        ("rlimit_nofile = [128, 64]", "rlimit_nofile"),
        ("rlimit_cpu = -1", "rlimit_cpu"),
    ] {
        let table = toml_table(snippet).unwrap();
        expect_invalid_option(ExecOptions::from_table(&table), key);
    }
}

#[test]
fn every_documented_key_is_accepted() {
    let table = toml_table(
        r#"
argv0 = "tool"
background = false
env = { A = "1", B = false }
in = "null"
out = "capture"
err = ["child", "out"]
log_cmd = "custom line"
log_level = false
logger = "exec"
nonzero_status_handler = "warn"
chdir = "/tmp"
close_others = true
new_pgroup = true
pgroup = 0
umask = "022"
unsetenv_others = false
rlimit_core = 0
rlimit_nofile = [256, "unlimited"]
"#,
    )
    .unwrap();

    let opts = ExecOptions::from_table(&table).expect("all keys valid");
    let resolved = resolve(opts, &ExecOptions::default());

    assert_eq!(resolved.behavior.log_level, LogLevelSetting::Off);
    assert_eq!(resolved.behavior.logger.as_deref(), Some("exec"));
    assert_eq!(resolved.behavior.env.get("B"), Some(&None));
    assert!(matches!(resolved.behavior.stdout, StreamSpec::Capture));
    assert!(matches!(resolved.behavior.stderr, StreamSpec::Child(StreamName::Out)));
    assert_eq!(resolved.spawn.pgroup, Some(PgroupSetting::New));
    assert_eq!(resolved.spawn.umask, Some(0o022));
    assert!(resolved.spawn.close_others);
    assert_eq!(resolved.spawn.rlimits.len(), 2);
}

#[test]
fn built_in_defaults_depend_on_background() {
    let fg = resolve(ExecOptions::new(), &ExecOptions::default());
    assert!(!fg.behavior.background);
    assert!(matches!(fg.behavior.stdin, StreamSpec::Inherit));
    assert!(matches!(fg.behavior.stdout, StreamSpec::Inherit));
    assert!(matches!(fg.behavior.stderr, StreamSpec::Inherit));
    assert_eq!(fg.behavior.log_level, LogLevelSetting::default());
    assert!(fg.spawn.pgroup.is_none());

    let bg = resolve(ExecOptions::new().background(true), &ExecOptions::default());
    assert!(bg.behavior.background);
    assert!(matches!(bg.behavior.stdin, StreamSpec::Null));
    assert!(matches!(bg.behavior.stdout, StreamSpec::Null));
    assert!(matches!(bg.behavior.stderr, StreamSpec::Null));
}

#[test]
fn call_layer_wins_over_configured_layer() {
    let configured = ExecOptions::new()
        .logger("configured")
        .background(true)
        .umask(0o077);
    let call = ExecOptions::new().logger("call").pgroup(PgroupSetting::Join(1));

    let resolved = resolve(call, &configured);
    assert_eq!(resolved.behavior.logger.as_deref(), Some("call"));
    assert!(resolved.behavior.background);
    assert_eq!(resolved.spawn.umask, Some(0o077));
    assert_eq!(resolved.spawn.pgroup, Some(PgroupSetting::Join(1)));
}

#[test]
fn explicit_pgroup_takes_precedence_over_new_pgroup() {
    let opts = ExecOptions::new()
        .new_pgroup(true)
        .pgroup(PgroupSetting::Join(42));
    let resolved = resolve(opts, &ExecOptions::default());
    assert_eq!(resolved.spawn.pgroup, Some(PgroupSetting::Join(42)));
}

#[test]
fn defaults_file_is_loaded_and_validated() {
    let file = defaults_file(
        r#"
[defaults]
err = ["child", "out"]
rlimit_nofile = 512
"#,
    );
    let opts = load_defaults(file.path()).expect("valid defaults");
    let resolved = resolve(ExecOptions::new(), &opts);
    assert!(matches!(resolved.behavior.stderr, StreamSpec::Child(StreamName::Out)));
    assert_eq!(resolved.spawn.rlimits[0].soft, 512);

    let bad_key = defaults_file("[defaults]\nnot_an_option = true\n");
    expect_invalid_option(load_defaults(bad_key.path()), "not_an_option");

    let bad_section = defaults_file("[surprise]\nx = 1\n");
    assert!(matches!(
        load_defaults(bad_section.path()),
        Err(ExecError::Toml(_))
    ));

    assert!(matches!(
        load_defaults("/nonexistent/Procexec.toml"),
        Err(ExecError::Io(_))
    ));
}

#[test]
fn bad_value_in_defaults_file_names_the_key() {
    let bad_value = defaults_file("[defaults]\nbackground = \"yes\"\n");
    expect_invalid_option(load_defaults(bad_value.path()), "background");
}

#[tokio::test]
async fn configured_defaults_apply_to_every_call() {
    let file = defaults_file(
        r#"
[defaults]
err = ["child", "out"]
env = { PROCEXEC_LAYER = "configured" }
"#,
    );
    let exec = Exec::with_defaults(load_defaults(file.path()).unwrap());

    let out = with_timeout(exec.capture("echo $PROCEXEC_LAYER >&2", ExecOptions::new()))
        .await
        .unwrap();
    assert_eq!(out, "configured\n");

    // The call layer replaces the configured environment overrides as a whole.
    let opts = ExecOptions::new().env("OTHER", "x");
    let out = with_timeout(exec.capture("echo \"[$PROCEXEC_LAYER]\"", opts))
        .await
        .unwrap();
    assert_eq!(out, "[]\n");
}

#[tokio::test]
async fn configure_defaults_overlays_existing_defaults() {
    let mut exec = exec();
    exec.configure_defaults(ExecOptions::new().env("PROCEXEC_LAYER", "first"));
    exec.configure_defaults(ExecOptions::new().stderr(StreamSpec::Child(StreamName::Out)));

    let out = with_timeout(exec.capture("echo $PROCEXEC_LAYER >&2", ExecOptions::new()))
        .await
        .unwrap();
    assert_eq!(out, "first\n");
}

#[tokio::test]
async fn error_handler_from_config_aborts_on_nonzero_status() {
    let table = toml_table("nonzero_status_handler = \"error\"").unwrap();
    let exec = Exec::with_defaults(ExecOptions::from_table(&table).unwrap());

    let err = with_timeout(exec.sh("exit 9", ExecOptions::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::StatusHandler(_)), "got {err:?}");

    let code = with_timeout(exec.sh("exit 0", ExecOptions::new()))
        .await
        .unwrap();
    assert_eq!(code, 0);
}

#[tokio::test]
async fn warn_handler_from_config_only_logs() {
    let table = toml_table("nonzero_status_handler = \"warn\"").unwrap();
    let exec = Exec::with_defaults(ExecOptions::from_table(&table).unwrap());

    let code = with_timeout(exec.sh("exit 9", ExecOptions::new()))
        .await
        .unwrap();
    assert_eq!(code, 9);
}

#[tokio::test]
async fn stream_literal_errors_surface_at_routing_time() {
    // `capture` is a valid literal; it only fails once applied to `in`.
    let table = toml_table("in = \"capture\"").unwrap();
    let opts = ExecOptions::from_table(&table).expect("literal parses");

    let err = exec().exec("true", opts).await.err().expect("routing must fail");
    assert!(matches!(err, ExecError::InvalidStreamSpec { stream: StreamName::In, .. }));
}
