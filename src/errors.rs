// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::types::StreamName;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("invalid option `{key}`: {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("invalid stream spec for `{stream}`: {reason}")]
    InvalidStreamSpec { stream: StreamName, reason: String },

    #[error("stream `{0}` not available")]
    StreamUnavailable(StreamName),

    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::Error,
    },

    #[error("nonzero status handler failed: {0}")]
    StatusHandler(#[source] anyhow::Error),

    #[error("controller callback failed: {0}")]
    Callback(#[source] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecError {
    pub(crate) fn invalid_option(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ExecError::InvalidOption {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_stream(stream: StreamName, reason: impl Into<String>) -> Self {
        ExecError::InvalidStreamSpec {
            stream,
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ExecError>;
