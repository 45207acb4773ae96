//! Message bodies: fully buffered bytes or a lazily read stream.

use bytes::{Bytes, BytesMut};

use crate::error::BodyError;
use crate::proxy::stream::BodyStream;

/// A request or response body.
#[derive(Debug)]
pub enum Body {
    Full(Bytes),
    Stream(BodyStream),
}

impl Body {
    pub fn empty() -> Self {
        Body::Full(Bytes::new())
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// Length in bytes, if known without reading.
    pub fn known_len(&self) -> Option<usize> {
        match self {
            Body::Full(bytes) => Some(bytes.len()),
            Body::Stream(_) => None,
        }
    }

    /// Reads the next chunk.
    ///
    /// `None` means the body ended cleanly. A buffered body yields its bytes
    /// once (skipped when empty) and then ends.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, BodyError>> {
        match self {
            Body::Full(bytes) => {
                if bytes.is_empty() {
                    None
                } else {
                    Some(Ok(std::mem::take(bytes)))
                }
            }
            Body::Stream(stream) => stream.next_chunk().await,
        }
    }

    /// Drains the whole body into memory.
    pub async fn collect(self) -> Result<Bytes, BodyError> {
        match self {
            Body::Full(bytes) => Ok(bytes),
            Body::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next_chunk().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Full(Bytes::from(bytes))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::Full(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Full(Bytes::from(s))
    }
}

impl From<BodyStream> for Body {
    fn from(stream: BodyStream) -> Self {
        Body::Stream(stream)
    }
}
