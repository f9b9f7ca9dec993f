//! Bramble storage layer.
//!
//! Harvested records arrive as opaque field bags tagged with a collection
//! name. The [`StorageRouter`] dispatches each batch to a
//! collection-specific SQLite upsert handler (or the generic payload
//! table), and falls back to append-only JSONL files whenever the
//! database fails — no batch is ever silently dropped, and nothing here
//! raises past the router boundary.

#![warn(clippy::all)]

pub mod connection;
pub mod error;
pub mod fields;
pub mod file;
pub mod generic;
pub mod members;
pub mod migrations;
pub mod posts;
pub mod router;
pub mod topics;

// Re-export commonly used types
pub use connection::Database;
pub use error::{Result, StoreError};
pub use file::FileStore;
pub use router::StorageRouter;
