//! In-memory stream handles for routing tests.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

/// An `AsyncWrite` whose contents stay readable after the writer has been
/// handed to a child route or a redirect.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
    shut_down: Arc<Mutex<bool>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().expect("buffer lock poisoned").clone()
    }

    pub fn contents_str(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    /// Whether the pump shut the writer down after copying.
    pub fn is_shut_down(&self) -> bool {
        *self.shut_down.lock().expect("buffer lock poisoned")
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.bytes
            .lock()
            .expect("buffer lock poisoned")
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        *self.shut_down.lock().expect("buffer lock poisoned") = true;
        Poll::Ready(Ok(()))
    }
}
