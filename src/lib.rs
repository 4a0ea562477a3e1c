// src/lib.rs

//! Subprocess execution service.
//!
//! Launch commands or registered callables as child processes, route each
//! of their standard streams declaratively, then either drive the child
//! through a [`Controller`] or collect an [`ExecResult`].
//!
//! ```no_run
//! # async fn demo() -> procexec::Result<()> {
//! use procexec::{Exec, ExecOptions, StreamSpec};
//!
//! let exec = Exec::new();
//! let out = exec
//!     .capture("echo hello", ExecOptions::new().stderr(StreamSpec::Null))
//!     .await?;
//! assert_eq!(out, "hello\n");
//! # Ok(())
//! # }
//! ```

pub mod builtins;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod route;
pub mod types;

use std::io::Write;

use anyhow::Context;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command, ExecFlags};
use crate::config::{default_config_path, load_defaults};

pub use crate::config::ExecOptions;
pub use crate::errors::{ExecError, Result};
pub use crate::exec::{
    Callable, CallableRegistry, CommandSpec, Controller, ControllerState, Exec, ExecResult,
    Execution, Invocation, RedirectTarget,
};
pub use crate::route::{StreamHandle, StreamSpec};
pub use crate::types::{FileMode, PgroupSetting, StreamName};

/// High-level entry point used by `main.rs`.
///
/// Loads configured defaults, runs the requested command or callable and
/// returns the exit code the binary should report.
pub async fn run(args: CliArgs) -> anyhow::Result<i32> {
    let defaults = match &args.config {
        Some(path) => load_defaults(path)
            .with_context(|| format!("failed to load defaults from {}", path.display()))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                load_defaults(&path)
                    .with_context(|| format!("failed to load defaults from {}", path.display()))?
            } else {
                ExecOptions::default()
            }
        }
    };
    debug!(?defaults, "configured defaults");

    let exec = Exec::with_defaults(defaults);

    let (invocation, flags): (Invocation, ExecFlags) = match args.command {
        Command::Run(run) => (run.argv.into(), run.flags),
        Command::Call(call) => (Callable::new(call.name).args(call.args).into(), call.flags),
    };
    let options = options_from_flags(&flags)?;

    match exec.exec(invocation, options).await? {
        Execution::Background(controller) => {
            info!(pid = controller.pid(), "started in background");
            println!("{}", controller.pid());
            Ok(0)
        }
        Execution::Completed(result) => {
            if let Some(out) = result.captured_out() {
                std::io::stdout().lock().write_all(out)?;
            }
            if let Some(err) = result.captured_err() {
                std::io::stderr().lock().write_all(err)?;
            }
            Ok(result.exit_code())
        }
    }
}

fn options_from_flags(flags: &ExecFlags) -> anyhow::Result<ExecOptions> {
    let mut options = ExecOptions::new().background(flags.background);

    for (stream, value) in [
        (StreamName::In, &flags.stdin),
        (StreamName::Out, &flags.stdout),
        (StreamName::Err, &flags.stderr),
    ] {
        if let Some(value) = value {
            let spec = StreamSpec::parse(stream, value)?;
            // The CLI exits right after a background start, so nothing would
            // drain or feed these.
            if flags.background
                && matches!(
                    spec,
                    StreamSpec::Capture | StreamSpec::String(_) | StreamSpec::Controller
                )
            {
                anyhow::bail!(
                    "--{stream} {value} needs the process to stay attached; not allowed with --background"
                );
            }
            options = options.stream(stream, spec);
        }
    }

    for pair in &flags.env {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("--env expects KEY=VALUE, got `{pair}`"))?;
        options = options.env(key, value);
    }

    if let Some(dir) = &flags.chdir {
        options = options.chdir(dir);
    }

    Ok(options)
}
