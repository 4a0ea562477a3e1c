// src/exec/launcher.rs

//! Process Launcher.
//!
//! Builds a `tokio::process::Command` for either a command or a callable
//! helper, applies spawn options and the router's child bindings, and spawns
//! it. The command (and with it every child-side descriptor) is dropped as
//! soon as the spawn call returns, whether or not it succeeded.

use std::io;
use std::os::fd::RawFd;
use std::path::Path;

use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::libc::mode_t;
use nix::sys::resource::setrlimit;
use nix::sys::stat::{Mode, umask};
use nix::unistd::{SysconfVar, close, sysconf};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::config::{RLimit, ResolvedOptions};
use crate::errors::{ExecError, Result};
use crate::exec::callable::CALLABLE_ENV;
use crate::exec::invocation::{CommandSpec, Invocation};
use crate::route::ChildBindings;

/// Upper bound on descriptors swept by `close_others`.
const CLOSE_OTHERS_LIMIT: RawFd = 65_536;

pub(crate) struct Launched {
    pub child: Child,
    pub pid: u32,
}

/// Spawn `invocation` with the resolved options and stream bindings.
pub(crate) fn launch(
    invocation: &Invocation,
    options: &ResolvedOptions,
    bindings: ChildBindings,
    callable_host: &Path,
) -> Result<Launched> {
    let (program, mut cmd) = build_command(invocation, options, callable_host)?;

    let setup = ChildSetup::new(options, &bindings);

    cmd.stdin(bindings.stdin.into_stdio())
        .stdout(bindings.stdout.into_stdio())
        .stderr(bindings.stderr.into_stdio());

    if let Some(dir) = &options.spawn.chdir {
        cmd.current_dir(dir);
    }
    if let Some(pgroup) = options.spawn.pgroup {
        cmd.process_group(pgroup.pgid());
    }
    if !setup.is_empty() {
        // SAFETY: `ChildSetup::apply` only issues async-signal-safe syscalls
        // and touches no memory shared with other threads.
        unsafe {
            cmd.pre_exec(move || setup.apply());
        }
    }

    let spawned = cmd.spawn();
    drop(cmd);

    let child = spawned.map_err(|source| ExecError::Launch {
        program: program.clone(),
        source,
    })?;
    let pid = child.id().ok_or_else(|| ExecError::Launch {
        program: program.clone(),
        source: io::Error::other("process exited before its id was read"),
    })?;

    debug!(pid, program = %program, "child process started");
    Ok(Launched { child, pid })
}

fn build_command(
    invocation: &Invocation,
    options: &ResolvedOptions,
    callable_host: &Path,
) -> Result<(String, Command)> {
    let behavior = &options.behavior;

    let (program, mut cmd) = match invocation {
        Invocation::Command(CommandSpec::Shell(line)) => {
            let mut c = Command::new("sh");
            c.arg("-c").arg(line);
            ("sh".to_string(), c)
        }
        Invocation::Command(CommandSpec::Argv(argv)) => {
            let Some((program, args)) = argv.split_first() else {
                return Err(ExecError::Launch {
                    program: String::new(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
                });
            };
            let mut c = Command::new(program);
            c.args(args);
            (program.clone(), c)
        }
        Invocation::Callable(callable) => {
            // Still set means this process was started as a helper and its
            // host never dispatched; launching again would recurse.
            if std::env::var_os(CALLABLE_ENV).is_some() {
                warn!(callable = %callable.name, "{CALLABLE_ENV} already set, refusing to launch a helper");
                return Err(ExecError::Launch {
                    program: callable_host.display().to_string(),
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("{CALLABLE_ENV} is set in this process; the callable host did not dispatch it"),
                    ),
                });
            }
            let mut c = Command::new(callable_host);
            c.args(&callable.args);
            (callable_host.display().to_string(), c)
        }
    };

    if let Some(argv0) = &behavior.argv0 {
        cmd.arg0(argv0);
    }

    if options.spawn.unsetenv_others {
        cmd.env_clear();
    }
    for (key, value) in &behavior.env {
        match value {
            Some(value) => cmd.env(key, value),
            None => cmd.env_remove(key),
        };
    }
    if let Invocation::Callable(callable) = invocation {
        cmd.env(CALLABLE_ENV, &callable.name);
    }

    Ok((program, cmd))
}

/// Work done in the child between fork and exec.
struct ChildSetup {
    umask: Option<Mode>,
    rlimits: Vec<RLimit>,
    close_others_below: Option<RawFd>,
    close_fds: Vec<RawFd>,
}

impl ChildSetup {
    fn new(options: &ResolvedOptions, bindings: &ChildBindings) -> Self {
        let spawn = &options.spawn;

        let close_others_below = spawn.close_others.then(|| {
            sysconf(SysconfVar::OPEN_MAX)
                .ok()
                .flatten()
                .and_then(|max| RawFd::try_from(max).ok())
                .map_or(CLOSE_OTHERS_LIMIT, |max| max.min(CLOSE_OTHERS_LIMIT))
        });

        Self {
            umask: spawn
                .umask
                .map(|mask| Mode::from_bits_truncate(mask as mode_t)),
            rlimits: spawn.rlimits.clone(),
            close_others_below,
            close_fds: bindings.closed_fds(),
        }
    }

    fn is_empty(&self) -> bool {
        self.umask.is_none()
            && self.rlimits.is_empty()
            && self.close_others_below.is_none()
            && self.close_fds.is_empty()
    }

    fn apply(&self) -> io::Result<()> {
        if let Some(mask) = self.umask {
            umask(mask);
        }
        for limit in &self.rlimits {
            setrlimit(limit.resource, limit.soft, limit.hard)?;
        }
        if let Some(max) = self.close_others_below {
            for fd in 3..max {
                let _ = fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC));
            }
        }
        // Stdio has been wired up by now; these descriptors are the ones the
        // child must not have at all.
        for &fd in &self.close_fds {
            let _ = close(fd);
        }
        Ok(())
    }
}
