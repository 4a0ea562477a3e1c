// src/exec/controller.rs

//! Live handle to a running (or just finished) child.
//!
//! The controller owns:
//! - the parent end of every stream routed to `controller`,
//! - the join set of pump workers,
//! - the child itself, for signalling and waiting.
//!
//! Claiming a stream (`capture`, `redirect`, `close_stream`) moves its pipe
//! end out of the controller, so a stream can be claimed at most once and
//! no pipe end is ever read from two places.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::str::FromStr;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::StatusHandler;
use crate::errors::{ExecError, Result};
use crate::exec::launcher::Launched;
use crate::exec::pump::{self, ExternalReader, ExternalWriter, PipeEnd, PumpJob, PumpOutput};
use crate::exec::result::ExecResult;
use crate::route::{ControllerEndpoints, StreamHandle};
use crate::types::{DEFAULT_FILE_PERM, FileMode, StreamName};

/// Lifecycle of a controller. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Running,
    /// The child has exited; streams are being closed and pumps joined.
    Collecting,
    Completed,
}

/// Where [`Controller::redirect`] sends (or takes) the rest of a stream.
#[derive(Debug, Clone)]
pub enum RedirectTarget {
    Null,
    File {
        path: PathBuf,
        mode: Option<FileMode>,
        perm: Option<u32>,
    },
    Handle(StreamHandle),
}

impl From<&str> for RedirectTarget {
    fn from(path: &str) -> Self {
        RedirectTarget::from(PathBuf::from(path))
    }
}

impl From<&Path> for RedirectTarget {
    fn from(path: &Path) -> Self {
        RedirectTarget::from(path.to_path_buf())
    }
}

impl From<PathBuf> for RedirectTarget {
    fn from(path: PathBuf) -> Self {
        RedirectTarget::File {
            path,
            mode: None,
            perm: None,
        }
    }
}

impl From<StreamHandle> for RedirectTarget {
    fn from(handle: StreamHandle) -> Self {
        RedirectTarget::Handle(handle)
    }
}

impl From<std::fs::File> for RedirectTarget {
    fn from(file: std::fs::File) -> Self {
        RedirectTarget::Handle(StreamHandle::fd(file))
    }
}

enum Counterpart {
    Reader(ExternalReader),
    Writer(ExternalWriter),
}

pub struct Controller {
    pid: u32,
    child: Child,
    input: Option<PipeEnd>,
    output: Option<PipeEnd>,
    error: Option<PipeEnd>,
    pumps: JoinSet<PumpOutput>,
    captured_out: Option<Vec<u8>>,
    captured_err: Option<Vec<u8>>,
    status: Option<ExitStatus>,
    state: ControllerState,
    result: Option<ExecResult>,
    nonzero_status_handler: Option<StatusHandler>,
}

impl Controller {
    pub(crate) fn new(
        launched: Launched,
        endpoints: ControllerEndpoints,
        pumps: Vec<PumpJob>,
        nonzero_status_handler: Option<StatusHandler>,
    ) -> Self {
        let mut set = JoinSet::new();
        for job in pumps {
            pump::start(job, &mut set);
        }

        Self {
            pid: launched.pid,
            child: launched.child,
            input: endpoints.input,
            output: endpoints.output,
            error: endpoints.error,
            pumps: set,
            captured_out: None,
            captured_err: None,
            status: None,
            state: ControllerState::Running,
            result: None,
            nonzero_status_handler,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The child's input, if routed to the controller and not yet claimed.
    ///
    /// Writes are buffered; flush before expecting the child to see them.
    pub fn stdin(&mut self) -> Option<&mut PipeEnd> {
        self.input.as_mut()
    }

    /// The child's output, if routed to the controller and not yet claimed.
    pub fn stdout(&mut self) -> Option<&mut PipeEnd> {
        self.output.as_mut()
    }

    /// The child's error output, if routed to the controller and not yet
    /// claimed.
    pub fn stderr(&mut self) -> Option<&mut PipeEnd> {
        self.error.as_mut()
    }

    fn slot(&mut self, which: StreamName) -> &mut Option<PipeEnd> {
        match which {
            StreamName::In => &mut self.input,
            StreamName::Out => &mut self.output,
            StreamName::Err => &mut self.error,
        }
    }

    fn claim(&mut self, which: StreamName) -> Result<PipeEnd> {
        self.slot(which)
            .take()
            .ok_or(ExecError::StreamUnavailable(which))
    }

    /// Close one controller-managed stream (e.g. to send EOF on `in`).
    /// Counts as a claim.
    pub fn close_stream(&mut self, which: StreamName) -> Result<()> {
        drop(self.claim(which)?);
        debug!(pid = self.pid, stream = %which, "closed controller stream");
        Ok(())
    }

    /// Close every controller-managed stream that is still held.
    pub fn close_streams(&mut self) {
        for which in StreamName::ALL {
            if self.slot(which).take().is_some() {
                debug!(pid = self.pid, stream = %which, "closed controller stream");
            }
        }
    }

    /// Capture the rest of `out` or `err` into the result.
    pub fn capture(&mut self, which: StreamName) -> Result<&mut Self> {
        if which.is_input() {
            return Err(ExecError::StreamUnavailable(which));
        }
        let source = self.claim(which)?;
        pump::start(
            PumpJob::Capture {
                stream: which,
                source,
            },
            &mut self.pumps,
        );
        Ok(self)
    }

    pub fn capture_out(&mut self) -> Result<&mut Self> {
        self.capture(StreamName::Out)
    }

    pub fn capture_err(&mut self) -> Result<&mut Self> {
        self.capture(StreamName::Err)
    }

    /// Hand the rest of a stream to a pump that copies it to (or, for `in`,
    /// from) `target`. Returns without waiting for the copy.
    pub fn redirect(&mut self, which: StreamName, target: impl Into<RedirectTarget>) -> Result<()> {
        let counterpart = open_target(which, target.into())?;
        let end = self.claim(which)?;

        let job = match counterpart {
            Counterpart::Reader(source) => PumpJob::CopyIn { source, sink: end },
            Counterpart::Writer(sink) => PumpJob::CopyOut {
                stream: which,
                source: end,
                sink,
            },
        };
        pump::start(job, &mut self.pumps);
        Ok(())
    }

    pub fn redirect_in(&mut self, target: impl Into<RedirectTarget>) -> Result<()> {
        self.redirect(StreamName::In, target)
    }

    pub fn redirect_out(&mut self, target: impl Into<RedirectTarget>) -> Result<()> {
        self.redirect(StreamName::Out, target)
    }

    pub fn redirect_err(&mut self, target: impl Into<RedirectTarget>) -> Result<()> {
        self.redirect(StreamName::Err, target)
    }

    /// Deliver `signal` to the child.
    ///
    /// Once the exit status has been collected the pid may belong to another
    /// process, so this fails with `ESRCH` instead of signalling.
    pub fn kill(&self, signal: Signal) -> Result<()> {
        if self.status.is_some() {
            return Err(ExecError::Signal {
                pid: self.pid,
                source: Errno::ESRCH,
            });
        }
        debug!(pid = self.pid, %signal, "signalling child");
        kill(Pid::from_raw(self.pid as i32), signal).map_err(|source| ExecError::Signal {
            pid: self.pid,
            source,
        })
    }

    /// Like [`kill`](Self::kill), with the signal given by name (`"TERM"`,
    /// `"SIGTERM"`) or number (`"15"`).
    pub fn kill_named(&self, name: &str) -> Result<()> {
        let signal = parse_signal(name).ok_or(ExecError::Signal {
            pid: self.pid,
            source: Errno::EINVAL,
        })?;
        self.kill(signal)
    }

    /// Non-blocking liveness check.
    pub fn executing(&mut self) -> Result<bool> {
        if self.status.is_some() {
            return Ok(false);
        }
        match self.child.try_wait()? {
            Some(status) => {
                self.status = Some(status);
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Wait up to `timeout` (forever if `None`) for the child to finish.
    ///
    /// - On timeout returns `Ok(None)` and leaves everything untouched.
    /// - On exit: closes the remaining controller streams, joins every pump,
    ///   builds and caches the result, then runs the nonzero-status handler
    ///   (at most once per controller).
    /// - Afterwards returns the cached result.
    pub async fn result(&mut self, timeout: Option<Duration>) -> Result<Option<ExecResult>> {
        if let Some(result) = &self.result {
            return Ok(Some(result.clone()));
        }

        let Some(status) = self.wait_for_exit(timeout).await? else {
            return Ok(None);
        };

        self.state = ControllerState::Collecting;
        self.close_streams();

        while let Some(joined) = self.pumps.join_next().await {
            match joined {
                Ok(PumpOutput::Captured { stream, bytes }) => match stream {
                    StreamName::Out => self.captured_out = Some(bytes),
                    StreamName::Err => self.captured_err = Some(bytes),
                    StreamName::In => {}
                },
                Ok(PumpOutput::Copied { stream, bytes }) => {
                    debug!(pid = self.pid, stream = %stream, bytes, "pump finished");
                }
                Err(e) => warn!(pid = self.pid, error = %e, "pump worker failed"),
            }
        }

        let result = ExecResult::new(
            self.captured_out.take(),
            self.captured_err.take(),
            status,
        );
        self.result = Some(result.clone());
        self.state = ControllerState::Completed;

        info!(
            pid = self.pid,
            exit_code = result.exit_code(),
            success = result.success(),
            "child process finished"
        );

        if !status.success() {
            if let Some(handler) = self.nonzero_status_handler.take() {
                handler(&status).map_err(ExecError::StatusHandler)?;
            }
        }

        Ok(Some(result))
    }

    /// Wait for completion without a timeout.
    pub async fn wait(&mut self) -> Result<ExecResult> {
        match self.result(None).await? {
            Some(result) => Ok(result),
            None => Err(ExecError::Other(anyhow::anyhow!(
                "wait without timeout returned no result"
            ))),
        }
    }

    async fn wait_for_exit(&mut self, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }

        let status = match timeout {
            None => self.child.wait().await?,
            // `Child::wait` is cancel-safe, so an elapsed timeout loses nothing.
            Some(limit) => match tokio::time::timeout(limit, self.child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    debug!(pid = self.pid, ?limit, "child still running after timeout");
                    return Ok(None);
                }
            },
        };

        self.status = Some(status);
        Ok(Some(status))
    }
}

impl Drop for Controller {
    /// An abandoned controller leaves the child and its pumps running.
    fn drop(&mut self) {
        self.pumps.detach_all();
    }
}

fn open_target(which: StreamName, target: RedirectTarget) -> Result<Counterpart> {
    let input = which.is_input();

    let counterpart = match target {
        RedirectTarget::Null if input => {
            Counterpart::Reader(ExternalReader::Owned(Box::new(tokio::io::empty())))
        }
        RedirectTarget::Null => {
            Counterpart::Writer(ExternalWriter::Owned(Box::new(tokio::io::sink())))
        }
        RedirectTarget::File { path, mode, perm } => {
            let mode = mode.unwrap_or_else(|| FileMode::default_for(which));
            let file = mode
                .open_options(perm.unwrap_or(DEFAULT_FILE_PERM))
                .open(&path)
                .map_err(|e| {
                    ExecError::invalid_stream(which, format!("cannot open {}: {e}", path.display()))
                })?;
            owned_file(input, file)
        }
        RedirectTarget::Handle(StreamHandle::Fd(fd)) => {
            let fd = fd
                .try_clone()
                .map_err(|e| ExecError::invalid_stream(which, e.to_string()))?;
            owned_file(input, std::fs::File::from(fd))
        }
        RedirectTarget::Handle(StreamHandle::Reader(reader)) if input => {
            Counterpart::Reader(ExternalReader::Shared(reader))
        }
        RedirectTarget::Handle(StreamHandle::Writer(writer)) if !input => {
            Counterpart::Writer(ExternalWriter::Shared(writer))
        }
        RedirectTarget::Handle(_) => {
            return Err(ExecError::invalid_stream(
                which,
                "handle direction does not match the stream",
            ));
        }
    };
    Ok(counterpart)
}

fn owned_file(input: bool, file: std::fs::File) -> Counterpart {
    let file = tokio::fs::File::from_std(file);
    if input {
        Counterpart::Reader(ExternalReader::Owned(Box::new(file)))
    } else {
        Counterpart::Writer(ExternalWriter::Owned(Box::new(file)))
    }
}

fn parse_signal(name: &str) -> Option<Signal> {
    let name = name.trim();
    if let Ok(num) = name.parse::<i32>() {
        return Signal::try_from(num).ok();
    }
    let upper = name.to_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&full).ok()
}
