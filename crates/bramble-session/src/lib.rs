//! Bramble session layer — the authenticated session lifecycle.
//!
//! This crate owns everything between "we have a URL to fetch" and "we have
//! page content": persisted cookie credentials, the anti-bot challenge
//! detector and solvers, the HTTP and browser transports, and the
//! `SessionManager` login state machine that ties them together.
//!
//! The manager never panics or propagates errors to the crawl layer: a
//! fetch either yields a [`bramble_core::FetchResult`] or `None`, and a
//! degraded (unauthenticated) session stays usable — callers simply see
//! fetch failures downstream.

pub mod challenge;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod snapshot;
pub mod transport;

pub use challenge::SolverClient;
pub use credentials::{CredentialSet, CredentialStore};
pub use error::{Result, SessionError};
pub use manager::SessionManager;
pub use snapshot::SessionSnapshot;
pub use transport::{BrowserTransport, HttpTransport, Transport};
