// src/exec/pump.rs

//! Pump workers: single-direction byte copies between a parent-side pipe
//! end and a buffer, a fixed string, or an external handle.
//!
//! Every worker owns its pipe end outright and drops it when the copy ends
//! (EOF or error), which is what lets the child observe EOF on its side.
//! Workers run as tasks in the controller's [`JoinSet`]; the only value that
//! flows back is a [`PumpOutput`], so captures need no shared state.

use std::os::fd::OwnedFd;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::route::{SharedReader, SharedWriter};
use crate::types::StreamName;

/// Parent-side end of a pipe connected to the child.
pub type PipeEnd = File;

pub(crate) fn pipe_end(fd: OwnedFd) -> PipeEnd {
    File::from_std(std::fs::File::from(fd))
}

/// Something outside the child that a pump reads from.
pub(crate) enum ExternalReader {
    Owned(Box<dyn AsyncRead + Send + Unpin>),
    Shared(SharedReader),
}

/// Something outside the child that a pump writes into.
pub(crate) enum ExternalWriter {
    Owned(Box<dyn AsyncWrite + Send + Unpin>),
    Shared(SharedWriter),
}

pub(crate) enum PumpJob {
    /// Drain a child output stream into memory.
    Capture { stream: StreamName, source: PipeEnd },
    /// Write fixed bytes into the child's input, then close it.
    Feed { data: Vec<u8>, sink: PipeEnd },
    /// Copy an external reader into the child's input.
    CopyIn { source: ExternalReader, sink: PipeEnd },
    /// Copy a child output stream into an external writer.
    CopyOut {
        stream: StreamName,
        source: PipeEnd,
        sink: ExternalWriter,
    },
}

#[derive(Debug)]
pub(crate) enum PumpOutput {
    Captured { stream: StreamName, bytes: Vec<u8> },
    Copied { stream: StreamName, bytes: u64 },
}

impl PumpJob {
    fn stream(&self) -> StreamName {
        match self {
            PumpJob::Capture { stream, .. } | PumpJob::CopyOut { stream, .. } => *stream,
            PumpJob::Feed { .. } | PumpJob::CopyIn { .. } => StreamName::In,
        }
    }
}

/// Start a worker for `job` in `pumps`.
pub(crate) fn start(job: PumpJob, pumps: &mut JoinSet<PumpOutput>) {
    debug!(stream = %job.stream(), "starting pump worker");
    pumps.spawn(run(job));
}

async fn run(job: PumpJob) -> PumpOutput {
    match job {
        PumpJob::Capture { stream, mut source } => {
            let mut bytes = Vec::new();
            // `read_to_end` keeps whatever arrived before an error.
            if let Err(e) = source.read_to_end(&mut bytes).await {
                warn!(stream = %stream, error = %e, "capture ended with an error");
            }
            debug!(stream = %stream, len = bytes.len(), "capture finished");
            PumpOutput::Captured { stream, bytes }
        }

        PumpJob::Feed { data, mut sink } => {
            let written = match write_and_flush(&mut sink, &data).await {
                Ok(()) => data.len() as u64,
                Err(e) => {
                    debug!(error = %e, "child stopped reading string input");
                    0
                }
            };
            PumpOutput::Copied {
                stream: StreamName::In,
                bytes: written,
            }
        }

        PumpJob::CopyIn { source, mut sink } => {
            let copied = match source {
                ExternalReader::Owned(mut reader) => copy_into(&mut reader, &mut sink).await,
                ExternalReader::Shared(shared) => {
                    let mut reader = shared.lock().await;
                    copy_into(&mut *reader, &mut sink).await
                }
            };
            PumpOutput::Copied {
                stream: StreamName::In,
                bytes: copied,
            }
        }

        PumpJob::CopyOut {
            stream,
            mut source,
            sink,
        } => {
            let copied = match sink {
                ExternalWriter::Owned(mut writer) => {
                    let n = copy_into(&mut source, &mut writer).await;
                    close_writer(&mut writer).await;
                    n
                }
                ExternalWriter::Shared(shared) => {
                    let mut writer = shared.lock().await;
                    let n = copy_into(&mut source, &mut *writer).await;
                    close_writer(&mut *writer).await;
                    n
                }
            };
            PumpOutput::Copied {
                stream,
                bytes: copied,
            }
        }
    }
}

async fn write_and_flush<W>(sink: &mut W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    sink.write_all(data).await?;
    sink.flush().await
}

async fn copy_into<R, W>(reader: &mut R, writer: &mut W) -> u64
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let copied = tokio::io::copy(reader, writer).await;
    let flushed = writer.flush().await;
    match (copied, flushed) {
        (Ok(n), Ok(())) => n,
        (Ok(n), Err(e)) => {
            debug!(error = %e, "flush after copy failed");
            n
        }
        (Err(e), _) => {
            debug!(error = %e, "pump copy ended with an error");
            0
        }
    }
}

async fn close_writer<W>(writer: &mut W)
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "shutting down external writer failed");
    }
}
