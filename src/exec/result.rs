// src/exec/result.rs

use std::process::ExitStatus;
use std::os::unix::process::ExitStatusExt;

/// Terminal snapshot of a finished execution.
///
/// Captured buffers are present only for streams that were captured, either
/// by route or through the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    captured_out: Option<Vec<u8>>,
    captured_err: Option<Vec<u8>>,
    status: ExitStatus,
}

impl ExecResult {
    pub(crate) fn new(
        captured_out: Option<Vec<u8>>,
        captured_err: Option<Vec<u8>>,
        status: ExitStatus,
    ) -> Self {
        Self {
            captured_out,
            captured_err,
            status,
        }
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }

    /// Numeric exit code. A child killed by a signal reports `128 + signo`,
    /// as a shell would.
    pub fn exit_code(&self) -> i32 {
        match (self.status.code(), self.status.signal()) {
            (Some(code), _) => code,
            (None, Some(sig)) => 128 + sig,
            (None, None) => -1,
        }
    }

    /// Signal that terminated the child, if any.
    pub fn signal(&self) -> Option<i32> {
        self.status.signal()
    }

    pub fn success(&self) -> bool {
        self.exit_code() == 0
    }

    pub fn is_error(&self) -> bool {
        !self.success()
    }

    pub fn captured_out(&self) -> Option<&[u8]> {
        self.captured_out.as_deref()
    }

    pub fn captured_err(&self) -> Option<&[u8]> {
        self.captured_err.as_deref()
    }

    pub fn captured_out_str(&self) -> Option<String> {
        self.captured_out
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn captured_err_str(&self) -> Option<String> {
        self.captured_err
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}
