//! Error types for the proxy chain
//!
//! Every error is scoped to a single chain; nothing here is fatal to the
//! process.

use std::io;

use crate::http::response::StatusCode;

/// Failure returned by a [`Modification`](crate::proxy::Modification).
///
/// Aborts the remainder of the stage it was raised in.
#[derive(Debug, thiserror::Error)]
pub enum ModificationError {
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("no response available outside the response stage")]
    NoResponse,

    #[error("content extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("template rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("failed to read body: {0}")]
    Body(#[from] BodyError),

    #[error("document larger than {0} bytes")]
    DocumentTooLarge(usize),

    #[error("{0}")]
    Other(String),
}

impl ModificationError {
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        ModificationError::InvalidHeader(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        ModificationError::Other(msg.into())
    }
}

/// Failure of the outbound round-trip to the origin.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("target URL missing host")]
    MissingHost,

    #[error("{0} timeout")]
    Timeout(&'static str),

    #[error("failed to connect to origin: {0}")]
    Connect(#[source] io::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid response from origin: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        TransportError::InvalidResponse(msg.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no readable content found")]
    NoContent,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    UnknownTemplate(String),

    #[error("template output closed: {0}")]
    Closed(#[from] StreamClosed),
}

/// Error observed on the consumer side of a body stream.
///
/// A stream that ends with one of these was truncated; a stream that simply
/// ends was complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BodyError {
    #[error("body producer failed: {0}")]
    Producer(String),

    #[error("upstream body read failed: {0}")]
    Upstream(String),
}

/// Returned by a write end once its consumer has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stream consumer closed")]
pub struct StreamClosed;

/// Failure while delivering the final response to the client.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("response body aborted: {0}")]
    Body(#[from] BodyError),
}

/// Overall result of running one chain, tagged by the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("request modification failed: {0}")]
    Request(#[source] ModificationError),

    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("response modification failed: {0}")]
    Response(#[source] ModificationError),

    #[error("response write failed: {0}")]
    Write(#[from] WriteError),

    #[error("chain already executed; chains serve exactly one request")]
    AlreadyExecuted,
}

impl ChainError {
    /// Status code a client should see for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ChainError::Transport(TransportError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// The client asked for something that cannot be mapped to an origin URL.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid target URL {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },
}
