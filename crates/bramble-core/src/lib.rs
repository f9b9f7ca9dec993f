//! Bramble core — shared configuration, record types and errors.
//!
//! Everything the other bramble crates have in common lives here: the TOML
//! configuration surface with environment overrides, the opaque `Record`
//! bag that flows from the extractors into storage, and the error types
//! shared across subsystem boundaries.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ConfigError, ConfigResult};
pub use types::{collections, FetchResult, Record, SessionState};
