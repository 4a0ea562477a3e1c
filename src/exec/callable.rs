// src/exec/callable.rs

//! Running in-process functions as child processes.
//!
//! Instead of duplicating the running image, a callable is looked up by
//! name in a fresh helper process. The helper is normally the current
//! executable, which must call [`CallableRegistry::run_if_requested`] at the
//! top of `main`. What the child sees is exactly:
//!
//! - the callable name (via [`CALLABLE_ENV`]),
//! - its string arguments (as argv),
//! - the environment, working directory and streams set up by the launcher.
//!
//! Nothing else in the parent's memory is visible to it.

use std::collections::BTreeMap;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Environment variable naming the callable a helper process should run.
pub const CALLABLE_ENV: &str = "PROCEXEC_CALLABLE";

/// Exit code of a callable that returned an error or panicked.
pub const CALLABLE_FAILURE_EXIT_CODE: i32 = 255;

/// Exit code of a helper asked to run a name it does not know.
pub const CALLABLE_UNKNOWN_EXIT_CODE: i32 = 127;

/// Signature of a registered callable. The returned value is the child's
/// exit code.
pub type CallableFn = fn(&CallableContext) -> anyhow::Result<i32>;

/// A request to run a registered callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callable {
    pub name: String,
    pub args: Vec<String>,
}

impl Callable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// What a callable receives inside the helper process.
#[derive(Debug, Clone)]
pub struct CallableContext {
    pub name: String,
    pub args: Vec<String>,
}

/// Name → function table shared by the parent and its helper processes.
#[derive(Debug, Clone, Default)]
pub struct CallableRegistry {
    entries: BTreeMap<String, CallableFn>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, func: CallableFn) -> Self {
        self.entries.insert(name.into(), func);
        self
    }

    pub fn get(&self, name: &str) -> Option<CallableFn> {
        self.entries.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// If this process was started as a callable helper, run the requested
    /// callable and exit with its code. Returns normally otherwise.
    pub fn run_if_requested(&self) {
        let Ok(name) = std::env::var(CALLABLE_ENV) else {
            return;
        };
        // SAFETY: called at the top of `main`, before any other thread of
        // this helper exists.
        unsafe { std::env::remove_var(CALLABLE_ENV) };

        let args: Vec<String> = std::env::args().skip(1).collect();
        let code = self.invoke(&name, args);

        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        std::process::exit(code);
    }

    /// Run a callable in this process and map its outcome to an exit code.
    ///
    /// Errors and panics never escape: both become
    /// [`CALLABLE_FAILURE_EXIT_CODE`], as does a return value that is not a
    /// valid exit status.
    pub fn invoke(&self, name: &str, args: Vec<String>) -> i32 {
        let Some(func) = self.get(name) else {
            eprintln!("procexec: unknown callable `{name}`");
            return CALLABLE_UNKNOWN_EXIT_CODE;
        };

        let ctx = CallableContext {
            name: name.to_string(),
            args,
        };

        match catch_unwind(AssertUnwindSafe(|| func(&ctx))) {
            Ok(Ok(code)) if (0..=255).contains(&code) => code,
            Ok(Ok(code)) => {
                eprintln!("procexec: callable `{name}` returned {code}, outside 0..=255");
                CALLABLE_FAILURE_EXIT_CODE
            }
            Ok(Err(err)) => {
                eprintln!("procexec: callable `{name}` failed: {err:?}");
                CALLABLE_FAILURE_EXIT_CODE
            }
            // The panic hook has already reported it on stderr.
            Err(_) => CALLABLE_FAILURE_EXIT_CODE,
        }
    }
}
