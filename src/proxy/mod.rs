//! Reverse proxy pipeline
//!
//! This module implements the per-request modification pipeline and its
//! collaborators: the side-channel context, the streaming body helper and
//! the origin transport.

pub mod chain;
pub mod context;
pub mod modification;
pub mod stream;
pub mod transport;

pub use chain::ProxyChain;
pub use context::Context;
pub use modification::{Modification, ModificationRef, async_modification, modification, sequence};
pub use stream::{BodyStream, BodyWriter, pipe, stream_body};
pub use transport::{HttpTransport, Transport};
