//! Proxychain - Rewriting Reverse Proxy
//!
//! Each proxied request runs through a [`ProxyChain`](proxy::ProxyChain):
//! request modifications, the origin round-trip, then response
//! modifications that may swap the body for a live stream.

pub mod config;
pub mod error;
pub mod extract;
pub mod http;
pub mod modifiers;
pub mod proxy;
pub mod server;
pub mod template;

pub use config::Config;
pub use error::{ChainError, ModificationError};
pub use proxy::{Modification, ProxyChain};
