//! Streaming substitution: an in-memory producer/consumer byte pipe.
//!
//! A modification that wants to replace a response body with content that is
//! still being generated calls [`stream_body`] with a fill task. The consumer
//! end comes back immediately and the fill task runs on its own tokio task.
//!
//! ```text
//!   fill task ──write──▶ [ 1 chunk ] ──next_chunk──▶ response writer
//!        ▲                                               │
//!        └──────── StreamClosed when the reader drops ───┘
//! ```
//!
//! The channel holds one chunk, so a producer can be at most one chunk ahead
//! of its consumer. A fill task that fails (returns `Err` or panics) leaves a
//! [`BodyError::Producer`] as the final item, so the consumer can tell a
//! truncated document from a short one.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use bytes::Bytes;
use futures_util::FutureExt;
use tokio::sync::mpsc;

use crate::error::{BodyError, StreamClosed};
use crate::http::body::Body;

/// Chunks buffered between producer and consumer.
const PIPE_CAPACITY: usize = 1;

type Item = Result<Bytes, BodyError>;

/// Write end of a streaming pair.
///
/// Dropping it signals end-of-stream to the reader.
#[derive(Debug)]
pub struct BodyWriter {
    tx: mpsc::Sender<Item>,
}

impl BodyWriter {
    /// Sends one chunk, waiting while the previous one is still unread.
    ///
    /// Fails with [`StreamClosed`] as soon as the reader has been dropped.
    /// Empty chunks are skipped.
    pub async fn write(&mut self, chunk: impl Into<Bytes>) -> Result<(), StreamClosed> {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return if self.tx.is_closed() {
                Err(StreamClosed)
            } else {
                Ok(())
            };
        }
        self.tx.send(Ok(chunk)).await.map_err(|_| StreamClosed)
    }

    /// Terminates the stream with an error marker.
    pub async fn fail(self, error: BodyError) {
        let _ = self.tx.send(Err(error)).await;
    }

    /// True once the reader has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the reader has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Read end of a streaming pair.
///
/// Dropping it cancels the producer: its next write returns [`StreamClosed`].
#[derive(Debug)]
pub struct BodyStream {
    rx: mpsc::Receiver<Item>,
}

impl BodyStream {
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, BodyError>> {
        self.rx.recv().await
    }
}

/// Creates a connected writer/reader pair.
pub fn pipe() -> (BodyWriter, BodyStream) {
    let (tx, rx) = mpsc::channel(PIPE_CAPACITY);
    (BodyWriter { tx }, BodyStream { rx })
}

/// Spawns `fill` and returns the body it produces.
///
/// The returned body is readable right away, before `fill` has run. When
/// `fill` returns `Ok` the stream ends cleanly. When it returns `Err` or
/// panics, the consumer receives a [`BodyError::Producer`] as its last
/// item. If the consumer drops the body first, the fill task sees
/// [`StreamClosed`] on its next write and is expected to return.
///
/// Must be called from within a tokio runtime.
pub fn stream_body<F, Fut>(fill: F) -> Body
where
    F: FnOnce(BodyWriter) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let (writer, reader) = pipe();
    let marker = writer.tx.clone();

    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(fill(writer)).catch_unwind().await;

        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(_)) if marker.is_closed() => {
                tracing::debug!("Body consumer went away, fill task stopped");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "fill task panicked".to_string(),
        };

        tracing::warn!(error = %error, "Streaming body producer failed");
        let _ = marker.send(Err(BodyError::Producer(error))).await;
    });

    Body::Stream(reader)
}
