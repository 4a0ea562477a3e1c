// src/config/model.rs

//! Option records.
//!
//! [`ExecOptions`] is a sparse layer: every field may be unset. Layers are
//! stacked (call → configured defaults → built-in defaults) and collapsed
//! once by [`resolve`](crate::config::resolve) into [`ResolvedOptions`],
//! which is read-only from then on.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use nix::libc::rlim_t;
use nix::sys::resource::Resource;

use crate::route::StreamSpec;
use crate::types::{LogLevelSetting, PgroupSetting, StreamName};

/// Called once per controller when the child exits with a nonzero status.
/// Returning an error aborts the caller's flow with
/// [`ExecError::StatusHandler`](crate::errors::ExecError::StatusHandler).
pub type StatusHandler = Arc<dyn Fn(&ExitStatus) -> anyhow::Result<()> + Send + Sync>;

/// One resource limit applied in the child before exec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RLimit {
    pub resource: Resource,
    pub soft: rlim_t,
    pub hard: rlim_t,
}

impl RLimit {
    /// Option key for this limit, e.g. `rlimit_nofile`.
    pub fn key(&self) -> String {
        format!("{:?}", self.resource).to_lowercase()
    }
}

#[derive(Clone, Default)]
pub struct ExecOptions {
    pub(crate) env: Option<BTreeMap<String, Option<String>>>,
    pub(crate) logger: Option<String>,
    pub(crate) log_level: Option<LogLevelSetting>,
    pub(crate) log_cmd: Option<String>,
    pub(crate) argv0: Option<String>,
    pub(crate) background: Option<bool>,
    pub(crate) stdin: Option<StreamSpec>,
    pub(crate) stdout: Option<StreamSpec>,
    pub(crate) stderr: Option<StreamSpec>,
    pub(crate) nonzero_status_handler: Option<StatusHandler>,
    pub(crate) chdir: Option<PathBuf>,
    pub(crate) close_others: Option<bool>,
    pub(crate) new_pgroup: Option<bool>,
    pub(crate) pgroup: Option<PgroupSetting>,
    pub(crate) umask: Option<u32>,
    pub(crate) unsetenv_others: Option<bool>,
    pub(crate) rlimits: BTreeMap<String, RLimit>,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), Some(value.into()));
        self
    }

    /// Remove an inherited environment variable from the child.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), None);
        self
    }

    pub fn logger(mut self, name: impl Into<String>) -> Self {
        self.logger = Some(name.into());
        self
    }

    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(LogLevelSetting::Level(level));
        self
    }

    pub fn no_log(mut self) -> Self {
        self.log_level = Some(LogLevelSetting::Off);
        self
    }

    pub fn log_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.log_cmd = Some(cmd.into());
        self
    }

    pub fn argv0(mut self, argv0: impl Into<String>) -> Self {
        self.argv0 = Some(argv0.into());
        self
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = Some(background);
        self
    }

    pub fn stdin(self, spec: impl Into<StreamSpec>) -> Self {
        self.stream(StreamName::In, spec)
    }

    pub fn stdout(self, spec: impl Into<StreamSpec>) -> Self {
        self.stream(StreamName::Out, spec)
    }

    pub fn stderr(self, spec: impl Into<StreamSpec>) -> Self {
        self.stream(StreamName::Err, spec)
    }

    pub fn stream(mut self, stream: StreamName, spec: impl Into<StreamSpec>) -> Self {
        let slot = match stream {
            StreamName::In => &mut self.stdin,
            StreamName::Out => &mut self.stdout,
            StreamName::Err => &mut self.stderr,
        };
        *slot = Some(spec.into());
        self
    }

    pub fn on_nonzero_status<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExitStatus) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.nonzero_status_handler = Some(Arc::new(handler));
        self
    }

    pub fn chdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.chdir = Some(dir.into());
        self
    }

    pub fn close_others(mut self, close: bool) -> Self {
        self.close_others = Some(close);
        self
    }

    pub fn new_pgroup(mut self, new: bool) -> Self {
        self.new_pgroup = Some(new);
        self
    }

    pub fn pgroup(mut self, pgroup: PgroupSetting) -> Self {
        self.pgroup = Some(pgroup);
        self
    }

    pub fn umask(mut self, mask: u32) -> Self {
        self.umask = Some(mask);
        self
    }

    pub fn unsetenv_others(mut self, unset: bool) -> Self {
        self.unsetenv_others = Some(unset);
        self
    }

    pub fn rlimit(mut self, resource: Resource, soft: rlim_t, hard: rlim_t) -> Self {
        let limit = RLimit {
            resource,
            soft,
            hard,
        };
        self.rlimits.insert(limit.key(), limit);
        self
    }

    pub fn is_background(&self) -> Option<bool> {
        self.background
    }

    /// Copy every field set in `other` over this layer.
    pub fn overlay(&mut self, other: ExecOptions) {
        macro_rules! take_set {
            ($($field:ident),* $(,)?) => {
                $( if other.$field.is_some() { self.$field = other.$field; } )*
            };
        }
        take_set!(
            env,
            logger,
            log_level,
            log_cmd,
            argv0,
            background,
            stdin,
            stdout,
            stderr,
            nonzero_status_handler,
            chdir,
            close_others,
            new_pgroup,
            pgroup,
            umask,
            unsetenv_others,
        );
        self.rlimits.extend(other.rlimits);
    }
}

impl fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("env", &self.env)
            .field("logger", &self.logger)
            .field("log_level", &self.log_level)
            .field("log_cmd", &self.log_cmd)
            .field("argv0", &self.argv0)
            .field("background", &self.background)
            .field("stdin", &self.stdin)
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .field(
                "nonzero_status_handler",
                &self.nonzero_status_handler.as_ref().map(|_| ".."),
            )
            .field("chdir", &self.chdir)
            .field("close_others", &self.close_others)
            .field("new_pgroup", &self.new_pgroup)
            .field("pgroup", &self.pgroup)
            .field("umask", &self.umask)
            .field("unsetenv_others", &self.unsetenv_others)
            .field("rlimits", &self.rlimits)
            .finish()
    }
}

/// Options that shape how the service treats an invocation.
#[derive(Clone)]
pub struct BehaviorOptions {
    pub env: BTreeMap<String, Option<String>>,
    pub logger: Option<String>,
    pub log_level: LogLevelSetting,
    pub log_cmd: Option<String>,
    pub argv0: Option<String>,
    pub background: bool,
    pub stdin: StreamSpec,
    pub stdout: StreamSpec,
    pub stderr: StreamSpec,
    pub nonzero_status_handler: Option<StatusHandler>,
}

/// Options applied to the OS process at creation time.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub chdir: Option<PathBuf>,
    pub close_others: bool,
    pub pgroup: Option<PgroupSetting>,
    pub umask: Option<u32>,
    pub unsetenv_others: bool,
    pub rlimits: Vec<RLimit>,
}

#[derive(Clone)]
pub struct ResolvedOptions {
    pub behavior: BehaviorOptions,
    pub spawn: SpawnOptions,
}
