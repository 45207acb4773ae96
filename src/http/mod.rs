//! HTTP protocol implementation.
//!
//! This module holds the HTTP/1.1 pieces of the proxy's client-facing side
//! and the request/response records the pipeline mutates.
//!
//! # Architecture
//!
//! - **`connection`**: The connection handler implementing the request-response state machine
//! - **`parser`**: Parses incoming HTTP requests from byte buffers
//! - **`headers`**: Ordered, case-insensitive header map
//! - **`request`**: Inbound and outgoing request records
//! - **`response`**: HTTP response representation
//! - **`body`**: Buffered or streamed message bodies
//! - **`writer`**: Serializes and writes HTTP responses to the client
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received
//!               ▼
//!        ┌──────────────────┐
//!        │   Proxying       │ ← Build a chain, run it, stream the response
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```

pub mod body;
pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
