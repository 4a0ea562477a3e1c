// src/route/router.rs

//! Stream Router: literal → [`StreamRoute`] → concrete child binding.
//!
//! Routing happens in two passes. All three literals are validated first,
//! so a misapplied literal on `err` fails before any pipe for `in` or `out`
//! has been opened. The second pass allocates descriptors:
//!
//! - the child-side descriptor of every binding is owned by the launch and
//!   closed in the parent as soon as the spawn call returns;
//! - every parent-side pipe end is handed to exactly one owner: a pump job
//!   or the controller.

use std::io;
use std::os::fd::{AsFd, OwnedFd, RawFd};
use std::os::unix::io::FromRawFd;
use std::process::Stdio;

use nix::fcntl::{FcntlArg, fcntl};
use tracing::debug;

use crate::errors::{ExecError, Result};
use crate::exec::pump::{ExternalReader, ExternalWriter, PipeEnd, PumpJob, pipe_end};
use crate::route::{StreamHandle, StreamRoute, StreamSpec};
use crate::types::{DEFAULT_FILE_PERM, FileMode, StreamName};

const NULL_DEVICE: &str = "/dev/null";

/// Map one caller literal onto the routing intent for `stream`.
///
/// Fails with [`ExecError::InvalidStreamSpec`] when the literal cannot be
/// applied to that stream (e.g. `capture` on `in`, a string on `out`).
pub fn route_for(stream: StreamName, spec: StreamSpec) -> Result<StreamRoute> {
    let route = match spec {
        StreamSpec::Close => StreamRoute::Closed,
        StreamSpec::Null => StreamRoute::Null,
        StreamSpec::Inherit => StreamRoute::Inherit,
        StreamSpec::Controller => StreamRoute::ControllerManaged,
        StreamSpec::Capture => {
            if stream.is_input() {
                return Err(ExecError::invalid_stream(
                    stream,
                    "capture applies only to out and err",
                ));
            }
            StreamRoute::Captured
        }
        StreamSpec::Fd(fd) => {
            if fd < 0 {
                return Err(ExecError::invalid_stream(
                    stream,
                    format!("invalid descriptor {fd}"),
                ));
            }
            StreamRoute::ParentFd(fd)
        }
        StreamSpec::Path(path) => StreamRoute::File {
            path,
            mode: FileMode::default_for(stream),
            perm: DEFAULT_FILE_PERM,
        },
        StreamSpec::File { path, mode, perm } => StreamRoute::File {
            path,
            mode: mode.unwrap_or_else(|| FileMode::default_for(stream)),
            perm: perm.unwrap_or(DEFAULT_FILE_PERM),
        },
        StreamSpec::Child(target) => {
            if stream != StreamName::Err || target != StreamName::Out {
                return Err(ExecError::invalid_stream(
                    stream,
                    format!("[child, {target}] is only valid as err: [child, out]"),
                ));
            }
            StreamRoute::MergeInto(StreamName::Out)
        }
        StreamSpec::String(data) => {
            if !stream.is_input() {
                return Err(ExecError::invalid_stream(
                    stream,
                    "string input applies only to in",
                ));
            }
            StreamRoute::StringSource(data)
        }
        StreamSpec::Handle(handle) => {
            match (&handle, stream.is_input()) {
                (StreamHandle::Fd(_), _)
                | (StreamHandle::Reader(_), true)
                | (StreamHandle::Writer(_), false) => {}
                (StreamHandle::Reader(_), false) => {
                    return Err(ExecError::invalid_stream(
                        stream,
                        "a reader handle can only feed in",
                    ));
                }
                (StreamHandle::Writer(_), true) => {
                    return Err(ExecError::invalid_stream(
                        stream,
                        "a writer handle can only receive out or err",
                    ));
                }
            }
            StreamRoute::ExternalHandle(handle)
        }
    };
    Ok(route)
}

/// Concrete descriptor placement for one child stream.
#[derive(Debug)]
pub(crate) enum ChildBinding {
    Inherit,
    /// Left inherited by the spawn call, then closed in the child before exec.
    Close,
    Fd(OwnedFd),
}

impl ChildBinding {
    /// A second binding pointing at the same place, for `err: [child, out]`.
    fn duplicate(&self, stream: StreamName) -> io::Result<ChildBinding> {
        Ok(match self {
            ChildBinding::Inherit => match stream {
                StreamName::In => ChildBinding::Fd(io::stdin().as_fd().try_clone_to_owned()?),
                StreamName::Out => ChildBinding::Fd(io::stdout().as_fd().try_clone_to_owned()?),
                StreamName::Err => ChildBinding::Fd(io::stderr().as_fd().try_clone_to_owned()?),
            },
            ChildBinding::Close => ChildBinding::Close,
            ChildBinding::Fd(fd) => ChildBinding::Fd(fd.try_clone()?),
        })
    }

    pub(crate) fn into_stdio(self) -> Stdio {
        match self {
            ChildBinding::Inherit | ChildBinding::Close => Stdio::inherit(),
            ChildBinding::Fd(fd) => Stdio::from(fd),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ChildBindings {
    pub stdin: ChildBinding,
    pub stdout: ChildBinding,
    pub stderr: ChildBinding,
}

impl ChildBindings {
    /// Child descriptor numbers that must not exist after exec.
    pub(crate) fn closed_fds(&self) -> Vec<RawFd> {
        [
            (StreamName::In, &self.stdin),
            (StreamName::Out, &self.stdout),
            (StreamName::Err, &self.stderr),
        ]
        .into_iter()
        .filter(|(_, b)| matches!(b, ChildBinding::Close))
        .map(|(s, _)| s.fd())
        .collect()
    }
}

/// Parent-side pipe ends for streams routed to the controller.
#[derive(Default)]
pub(crate) struct ControllerEndpoints {
    pub input: Option<PipeEnd>,
    pub output: Option<PipeEnd>,
    pub error: Option<PipeEnd>,
}

/// Everything the launcher and the controller need from routing.
pub(crate) struct StreamPlan {
    pub bindings: ChildBindings,
    pub controller: ControllerEndpoints,
    /// Not started yet; the launcher starts them once the child exists.
    pub pumps: Vec<PumpJob>,
}

/// Route and bind all three streams.
pub(crate) fn plan_streams(
    stdin: StreamSpec,
    stdout: StreamSpec,
    stderr: StreamSpec,
) -> Result<StreamPlan> {
    let in_route = route_for(StreamName::In, stdin)?;
    let out_route = route_for(StreamName::Out, stdout)?;
    let err_route = route_for(StreamName::Err, stderr)?;

    debug!(
        stdin = in_route.kind(),
        stdout = out_route.kind(),
        stderr = err_route.kind(),
        "routing child streams"
    );

    let mut builder = PlanBuilder::default();
    let stdin = builder.bind(StreamName::In, in_route)?;
    let stdout = builder.bind(StreamName::Out, out_route)?;
    let stderr = match err_route {
        StreamRoute::MergeInto(target) => stdout
            .duplicate(target)
            .map_err(|e| ExecError::invalid_stream(StreamName::Err, e.to_string()))?,
        route => builder.bind(StreamName::Err, route)?,
    };

    Ok(StreamPlan {
        bindings: ChildBindings {
            stdin,
            stdout,
            stderr,
        },
        controller: builder.controller,
        pumps: builder.pumps,
    })
}

#[derive(Default)]
struct PlanBuilder {
    controller: ControllerEndpoints,
    pumps: Vec<PumpJob>,
}

impl PlanBuilder {
    fn bind(&mut self, stream: StreamName, route: StreamRoute) -> Result<ChildBinding> {
        let binding = match route {
            StreamRoute::Closed => ChildBinding::Close,
            StreamRoute::Inherit => ChildBinding::Inherit,
            StreamRoute::Null => {
                let mode = FileMode::default_for(stream);
                let file = mode
                    .open_options(DEFAULT_FILE_PERM)
                    .open(NULL_DEVICE)
                    .map_err(|e| ExecError::invalid_stream(stream, e.to_string()))?;
                ChildBinding::Fd(file.into())
            }
            StreamRoute::ParentFd(fd) => ChildBinding::Fd(dup_parent_fd(stream, fd)?),
            StreamRoute::File { path, mode, perm } => {
                let file = mode.open_options(perm).open(&path).map_err(|e| {
                    ExecError::invalid_stream(stream, format!("cannot open {}: {e}", path.display()))
                })?;
                ChildBinding::Fd(file.into())
            }
            StreamRoute::ExternalHandle(StreamHandle::Fd(fd)) => ChildBinding::Fd(
                fd.try_clone()
                    .map_err(|e| ExecError::invalid_stream(stream, e.to_string()))?,
            ),
            StreamRoute::ExternalHandle(StreamHandle::Reader(reader)) => {
                let (child, parent) = pipe_for(stream)?;
                self.pumps.push(PumpJob::CopyIn {
                    source: ExternalReader::Shared(reader),
                    sink: parent,
                });
                ChildBinding::Fd(child)
            }
            StreamRoute::ExternalHandle(StreamHandle::Writer(writer)) => {
                let (child, parent) = pipe_for(stream)?;
                self.pumps.push(PumpJob::CopyOut {
                    stream,
                    source: parent,
                    sink: ExternalWriter::Shared(writer),
                });
                ChildBinding::Fd(child)
            }
            StreamRoute::StringSource(data) => {
                let (child, parent) = pipe_for(stream)?;
                self.pumps.push(PumpJob::Feed { data, sink: parent });
                ChildBinding::Fd(child)
            }
            StreamRoute::Captured => {
                let (child, parent) = pipe_for(stream)?;
                self.pumps.push(PumpJob::Capture {
                    stream,
                    source: parent,
                });
                ChildBinding::Fd(child)
            }
            StreamRoute::ControllerManaged => {
                let (child, parent) = pipe_for(stream)?;
                let slot = match stream {
                    StreamName::In => &mut self.controller.input,
                    StreamName::Out => &mut self.controller.output,
                    StreamName::Err => &mut self.controller.error,
                };
                *slot = Some(parent);
                ChildBinding::Fd(child)
            }
            StreamRoute::MergeInto(target) => {
                return Err(ExecError::invalid_stream(
                    stream,
                    format!("cannot merge {stream} into {target}"),
                ));
            }
        };
        Ok(binding)
    }
}

/// Allocate a pipe oriented for `stream`: returns (child end, parent end).
///
/// Both ends are close-on-exec, so a concurrently spawned sibling never
/// inherits them and EOF arrives as soon as the intended child exits.
fn pipe_for(stream: StreamName) -> Result<(OwnedFd, PipeEnd)> {
    let (reader, writer) = io::pipe()?;
    let (child, parent): (OwnedFd, OwnedFd) = if stream.is_input() {
        (reader.into(), writer.into())
    } else {
        (writer.into(), reader.into())
    };
    Ok((child, pipe_end(parent)))
}

fn dup_parent_fd(stream: StreamName, fd: RawFd) -> Result<OwnedFd> {
    let dup = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(3)).map_err(|e| {
        ExecError::invalid_stream(stream, format!("descriptor {fd} is not usable: {e}"))
    })?;
    // SAFETY: `dup` is a freshly created descriptor that nothing else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(dup) })
}
