//! SQLite-backed stores for entity tags and response bodies.
//!
//! Each store is one SQLite file in the cache directory, accessed
//! asynchronously via tokio-rusqlite. It supports:
//!
//! - Lazy creation of the directory and file on first write
//! - Single-key upserts, so writers for different keys never collide
//! - Automatic schema migrations
//! - Opt-in eviction of the least recently written entries

pub mod bodies;
pub mod connection;
pub mod entries;
pub mod etags;
pub mod migrations;

pub use crate::Error;

pub use bodies::{BODY_FILE, BodyStore};
pub use connection::StoreDb;
pub use etags::{ETAG_FILE, EtagStore};
