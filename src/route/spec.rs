// src/route/spec.rs

//! Caller-facing stream literals.
//!
//! A [`StreamSpec`] is what a caller writes for `in`, `out` or `err`. It is
//! only checked against the stream it is applied to when the router turns it
//! into a [`StreamRoute`](super::StreamRoute).

use std::fmt;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use crate::errors::{ExecError, Result};
use crate::types::{FileMode, StreamName};

pub type SharedReader = Arc<Mutex<Box<dyn AsyncRead + Send + Unpin>>>;
pub type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// A native stream handle supplied by the caller.
///
/// - `Fd` handles have a real descriptor and are handed to the child
///   directly (the descriptor is duplicated per launch).
/// - `Reader` / `Writer` handles have no descriptor; a pump copies bytes
///   between them and a pipe. Writers are shut down once the copy ends.
#[derive(Clone)]
pub enum StreamHandle {
    Fd(Arc<OwnedFd>),
    Reader(SharedReader),
    Writer(SharedWriter),
}

impl StreamHandle {
    pub fn fd(fd: impl Into<OwnedFd>) -> Self {
        StreamHandle::Fd(Arc::new(fd.into()))
    }

    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        StreamHandle::Reader(Arc::new(Mutex::new(Box::new(reader))))
    }

    pub fn writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        StreamHandle::Writer(Arc::new(Mutex::new(Box::new(writer))))
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamHandle::Fd(fd) => f.debug_tuple("Fd").field(fd).finish(),
            StreamHandle::Reader(_) => f.write_str("Reader(..)"),
            StreamHandle::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// Literal accepted for one of the `in` / `out` / `err` options.
#[derive(Debug, Clone)]
pub enum StreamSpec {
    Close,
    Null,
    Inherit,
    Capture,
    Controller,
    /// Inherit a specific descriptor of the parent.
    Fd(i32),
    /// Open a file with the stream's default mode.
    Path(PathBuf),
    File {
        path: PathBuf,
        mode: Option<FileMode>,
        perm: Option<u32>,
    },
    /// `[child, out]`: point this stream at another stream of the child.
    Child(StreamName),
    /// `[string, data]`: feed fixed bytes to the child.
    String(Vec<u8>),
    Handle(StreamHandle),
}

impl StreamSpec {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        StreamSpec::Path(path.into())
    }

    pub fn file_with(path: impl Into<PathBuf>, mode: FileMode, perm: Option<u32>) -> Self {
        StreamSpec::File {
            path: path.into(),
            mode: Some(mode),
            perm,
        }
    }

    pub fn string(data: impl Into<Vec<u8>>) -> Self {
        StreamSpec::String(data.into())
    }

    /// Parse the keyed-configuration encoding of a stream literal.
    ///
    /// Accepted forms: a bare tag, an integer descriptor, a path string, or
    /// an array (`[file, path, mode?, perm?]`, `[child, out|err]`,
    /// `[string, data]`, `[path, mode?, perm?]`).
    pub fn from_value(stream: StreamName, value: &toml::Value) -> Result<Self> {
        match value {
            toml::Value::String(s) => Ok(tag_or_path(s)),
            toml::Value::Integer(fd) => parse_fd(stream, *fd),
            toml::Value::Array(items) => parse_array(stream, items),
            other => Err(ExecError::invalid_stream(
                stream,
                format!("unsupported value {other}"),
            )),
        }
    }

    /// Parse the compact command-line encoding of a stream literal.
    ///
    /// Same vocabulary as [`from_value`](Self::from_value), written as
    /// `file:PATH[:MODE[:PERM]]`, `child:out`, `string:DATA`, an integer,
    /// a tag, or a bare path.
    pub fn parse(stream: StreamName, s: &str) -> Result<Self> {
        if let Ok(fd) = s.parse::<i64>() {
            return parse_fd(stream, fd);
        }
        if let Some(rest) = s.strip_prefix("file:") {
            return Ok(parse_file_suffix(rest));
        }
        if let Some(rest) = s.strip_prefix("child:") {
            let target = rest
                .parse::<StreamName>()
                .map_err(|e| ExecError::invalid_stream(stream, e))?;
            return Ok(StreamSpec::Child(target));
        }
        if let Some(rest) = s.strip_prefix("string:") {
            return Ok(StreamSpec::String(rest.as_bytes().to_vec()));
        }
        Ok(tag_or_path(s))
    }
}

impl From<StreamHandle> for StreamSpec {
    fn from(handle: StreamHandle) -> Self {
        StreamSpec::Handle(handle)
    }
}

impl From<std::fs::File> for StreamSpec {
    fn from(file: std::fs::File) -> Self {
        StreamSpec::Handle(StreamHandle::fd(file))
    }
}

fn tag_or_path(s: &str) -> StreamSpec {
    match s {
        "close" => StreamSpec::Close,
        "null" => StreamSpec::Null,
        "inherit" => StreamSpec::Inherit,
        "capture" => StreamSpec::Capture,
        "controller" => StreamSpec::Controller,
        path => StreamSpec::Path(PathBuf::from(path)),
    }
}

fn parse_fd(stream: StreamName, fd: i64) -> Result<StreamSpec> {
    i32::try_from(fd)
        .ok()
        .filter(|fd| *fd >= 0)
        .map(StreamSpec::Fd)
        .ok_or_else(|| ExecError::invalid_stream(stream, format!("invalid descriptor {fd}")))
}

fn parse_array(stream: StreamName, items: &[toml::Value]) -> Result<StreamSpec> {
    let Some(toml::Value::String(head)) = items.first() else {
        return Err(ExecError::invalid_stream(
            stream,
            "array form must start with a string",
        ));
    };
    let rest = &items[1..];

    match head.as_str() {
        "file" => {
            let Some(toml::Value::String(path)) = rest.first() else {
                return Err(ExecError::invalid_stream(stream, "[file, ..] needs a path"));
            };
            file_from_parts(stream, path, &rest[1..])
        }
        "child" => match rest {
            [toml::Value::String(target)] => target
                .parse::<StreamName>()
                .map(StreamSpec::Child)
                .map_err(|e| ExecError::invalid_stream(stream, e)),
            _ => Err(ExecError::invalid_stream(
                stream,
                "[child, ..] takes exactly one stream name",
            )),
        },
        "string" => match rest {
            [toml::Value::String(data)] => Ok(StreamSpec::String(data.as_bytes().to_vec())),
            _ => Err(ExecError::invalid_stream(
                stream,
                "[string, ..] takes exactly one string",
            )),
        },
        "close" | "null" | "inherit" | "capture" | "controller" => Err(ExecError::invalid_stream(
            stream,
            format!("`{head}` takes no arguments"),
        )),
        path => file_from_parts(stream, path, rest),
    }
}

fn file_from_parts(stream: StreamName, path: &str, extra: &[toml::Value]) -> Result<StreamSpec> {
    if extra.len() > 2 {
        return Err(ExecError::invalid_stream(stream, "too many file arguments"));
    }

    let mode = match extra.first() {
        None => None,
        Some(toml::Value::String(m)) => Some(
            m.parse::<FileMode>()
                .map_err(|e| ExecError::invalid_stream(stream, e))?,
        ),
        Some(other) => {
            return Err(ExecError::invalid_stream(
                stream,
                format!("file mode must be a string, got {other}"),
            ));
        }
    };

    let perm = match extra.get(1) {
        None => None,
        Some(toml::Value::Integer(p)) => Some(
            u32::try_from(*p)
                .map_err(|_| ExecError::invalid_stream(stream, format!("invalid permission {p}")))?,
        ),
        Some(toml::Value::String(p)) => Some(
            parse_octal(p)
                .ok_or_else(|| ExecError::invalid_stream(stream, format!("invalid permission {p}")))?,
        ),
        Some(other) => {
            return Err(ExecError::invalid_stream(
                stream,
                format!("file permission must be an integer, got {other}"),
            ));
        }
    };

    Ok(StreamSpec::File {
        path: PathBuf::from(path),
        mode,
        perm,
    })
}

/// `file:PATH[:MODE[:PERM]]`; the path itself may contain colons.
fn parse_file_suffix(rest: &str) -> StreamSpec {
    let parts: Vec<&str> = rest.rsplitn(3, ':').collect();

    if let [perm, mode, path] = parts.as_slice() {
        if let (Ok(mode), Some(perm)) = (mode.parse::<FileMode>(), parse_octal(perm)) {
            return StreamSpec::file_with(*path, mode, Some(perm));
        }
    }

    if let Some((path, mode)) = rest.rsplit_once(':') {
        if let Ok(mode) = mode.parse::<FileMode>() {
            return StreamSpec::file_with(path, mode, None);
        }
    }

    StreamSpec::Path(PathBuf::from(rest))
}

pub(crate) fn parse_octal(s: &str) -> Option<u32> {
    let s = s.trim();
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u32::from_str_radix(digits, 8).ok()
}
