//! Client-facing server: accepts connections and routes requests to chains.

pub mod listener;
pub mod service;

pub use service::ProxyService;
