// src/exec/invocation.rs

use crate::exec::callable::Callable;

/// A command to run as an OS process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// Passed to `sh -c`.
    Shell(String),
    /// Program followed by its arguments; no shell involved.
    Argv(Vec<String>),
}

impl CommandSpec {
    pub fn shell(cmd: impl Into<String>) -> Self {
        CommandSpec::Shell(cmd.into())
    }

    pub fn argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::Argv(argv.into_iter().map(Into::into).collect())
    }

    /// Default text for the command log line.
    pub fn describe(&self) -> String {
        match self {
            CommandSpec::Shell(cmd) => cmd.clone(),
            CommandSpec::Argv(argv) if argv.len() == 1 => argv[0].clone(),
            CommandSpec::Argv(argv) => format!("{argv:?}"),
        }
    }
}

/// What an execution runs: a command or a registered callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Command(CommandSpec),
    Callable(Callable),
}

impl Invocation {
    /// Default text for the command log line. Callables are only logged
    /// when `log_cmd` is set explicitly.
    pub fn describe(&self) -> Option<String> {
        match self {
            Invocation::Command(cmd) => Some(cmd.describe()),
            Invocation::Callable(_) => None,
        }
    }
}

impl From<CommandSpec> for Invocation {
    fn from(cmd: CommandSpec) -> Self {
        Invocation::Command(cmd)
    }
}

impl From<Callable> for Invocation {
    fn from(callable: Callable) -> Self {
        Invocation::Callable(callable)
    }
}

impl From<&str> for Invocation {
    fn from(cmd: &str) -> Self {
        Invocation::Command(CommandSpec::shell(cmd))
    }
}

impl From<String> for Invocation {
    fn from(cmd: String) -> Self {
        Invocation::Command(CommandSpec::Shell(cmd))
    }
}

impl From<Vec<String>> for Invocation {
    fn from(argv: Vec<String>) -> Self {
        Invocation::Command(CommandSpec::Argv(argv))
    }
}

impl From<Vec<&str>> for Invocation {
    fn from(argv: Vec<&str>) -> Self {
        Invocation::Command(CommandSpec::argv(argv))
    }
}

impl<const N: usize> From<[&str; N]> for Invocation {
    fn from(argv: [&str; N]) -> Self {
        Invocation::Command(CommandSpec::argv(argv))
    }
}
