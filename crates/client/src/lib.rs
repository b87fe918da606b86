//! Client code for etagcache.
//!
//! This crate provides the conditional-request coordinator and the HTTP
//! transport it drives.

pub mod cache;
pub mod transport;

pub use cache::{CacheResponse, EtagCache};
pub use transport::{HttpTransport, Transport, TransportConfig, TransportResponse};

#[cfg(test)]
mod test_server;
