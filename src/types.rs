// src/types.rs

use std::fmt;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::str::FromStr;

use serde::Deserialize;

/// One of the three standard streams of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    In,
    Out,
    Err,
}

impl StreamName {
    pub const ALL: [StreamName; 3] = [StreamName::In, StreamName::Out, StreamName::Err];

    /// The descriptor number the stream occupies in the child.
    pub fn fd(self) -> i32 {
        match self {
            StreamName::In => 0,
            StreamName::Out => 1,
            StreamName::Err => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamName::In => "in",
            StreamName::Out => "out",
            StreamName::Err => "err",
        }
    }

    /// `in` is written by the parent; `out` and `err` are read by it.
    pub fn is_input(self) -> bool {
        self == StreamName::In
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, <Self as FromStr>::Err> {
        match s.trim().to_lowercase().as_str() {
            "in" | "stdin" => Ok(StreamName::In),
            "out" | "stdout" => Ok(StreamName::Out),
            "err" | "stderr" => Ok(StreamName::Err),
            other => Err(format!(
                "invalid stream name: {other} (expected \"in\", \"out\" or \"err\")"
            )),
        }
    }
}

/// `fopen`-style open mode for file routes and redirects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
    Append,
    ReadWrite,
    ReadWriteTruncate,
    ReadAppend,
}

impl FileMode {
    /// Mode used when a path is given without one.
    pub fn default_for(stream: StreamName) -> Self {
        if stream.is_input() {
            FileMode::Read
        } else {
            FileMode::Write
        }
    }

    pub fn open_options(self, perm: u32) -> OpenOptions {
        let mut opts = OpenOptions::new();
        match self {
            FileMode::Read => {
                opts.read(true);
            }
            FileMode::Write => {
                opts.write(true).create(true).truncate(true);
            }
            FileMode::Append => {
                opts.append(true).create(true);
            }
            FileMode::ReadWrite => {
                opts.read(true).write(true);
            }
            FileMode::ReadWriteTruncate => {
                opts.read(true).write(true).create(true).truncate(true);
            }
            FileMode::ReadAppend => {
                opts.read(true).append(true).create(true);
            }
        }
        opts.mode(perm);
        opts
    }
}

impl FromStr for FileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "r" => Ok(FileMode::Read),
            "w" => Ok(FileMode::Write),
            "a" => Ok(FileMode::Append),
            "r+" => Ok(FileMode::ReadWrite),
            "w+" => Ok(FileMode::ReadWriteTruncate),
            "a+" => Ok(FileMode::ReadAppend),
            other => Err(format!(
                "invalid file mode: {other} (expected r, w, a, r+, w+ or a+)"
            )),
        }
    }
}

/// Default permission bits for files created by a route.
pub const DEFAULT_FILE_PERM: u32 = 0o644;

/// Process-group placement for a spawned child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgroupSetting {
    /// Start a new group led by the child.
    New,
    /// Join an existing group.
    Join(i32),
}

impl PgroupSetting {
    pub fn pgid(self) -> i32 {
        match self {
            PgroupSetting::New => 0,
            PgroupSetting::Join(pgid) => pgid,
        }
    }
}

/// Level at which the command line is logged, or `Off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevelSetting {
    Off,
    Level(tracing::Level),
}

impl Default for LogLevelSetting {
    fn default() -> Self {
        LogLevelSetting::Level(tracing::Level::INFO)
    }
}
