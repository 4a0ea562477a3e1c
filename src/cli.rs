// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `procexec`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procexec",
    version,
    about = "Run commands and callables with declarative stream routing.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to a defaults file (TOML with a `[defaults]` table).
    ///
    /// If omitted, `Procexec.toml` in the current directory is used when it
    /// exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCEXEC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a command (argv, no shell) and exit with its code.
    Run(RunArgs),

    /// Run a built-in callable in a helper process and exit with its code.
    Call(CallArgs),
}

/// Stream routes and spawn settings shared by `run` and `call`.
///
/// Stream values: `close`, `null`, `inherit`, `capture`, `controller`, an
/// integer descriptor, `file:PATH[:MODE[:PERM]]`, `child:out`,
/// `string:DATA`, or a bare path.
#[derive(Debug, Clone, Args)]
pub struct ExecFlags {
    /// Route for the child's standard input.
    #[arg(long = "in", value_name = "SPEC")]
    pub stdin: Option<String>,

    /// Route for the child's standard output.
    #[arg(long = "out", value_name = "SPEC")]
    pub stdout: Option<String>,

    /// Route for the child's standard error.
    #[arg(long = "err", value_name = "SPEC")]
    pub stderr: Option<String>,

    /// Extra environment variable for the child (repeatable).
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Working directory of the child.
    #[arg(long, value_name = "DIR")]
    pub chdir: Option<PathBuf>,

    /// Start the child, print its pid and return without waiting for it.
    ///
    /// Routes that need this process to stay attached (`capture`, `string:`,
    /// `controller`) are rejected.
    #[arg(long)]
    pub background: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub flags: ExecFlags,

    /// Program and arguments.
    #[arg(last = true, required = true, value_name = "CMD")]
    pub argv: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct CallArgs {
    #[command(flatten)]
    pub flags: ExecFlags,

    /// Name of the callable.
    pub name: String,

    /// Arguments passed to the callable.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
