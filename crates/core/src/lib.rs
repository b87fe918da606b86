//! Core types and shared functionality for etagcache.
//!
//! This crate provides:
//! - Persisted etag and body stores with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{BodyStore, EtagStore, StoreDb};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
