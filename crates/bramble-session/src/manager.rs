//! The session manager: one owned object holding the live transport and
//! the login state machine.
//!
//! Lifecycle: `start` loads persisted credentials into the transport,
//! `ensure_authenticated` probes and (if needed) runs the login flow,
//! `fetch` delegates to the transport with a single bounded
//! refresh-and-retry on 403, and `close` persists credentials and releases
//! transport resources. `fetch` and `close` never propagate errors — a
//! degraded session keeps running and callers see `None` results instead.

use crate::challenge;
use crate::credentials::{CredentialSet, CredentialStore};
use crate::snapshot::SessionSnapshot;
use crate::transport::{BrowserTransport, HttpTransport, Transport};
use crate::error::Result;
use bramble_browser::{BrowserEngine, LaunchProfile};
use bramble_core::config::AppConfig;
use bramble_core::{FetchResult, SessionState};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Textual indicators that a page belongs to a signed-in session. Any two
/// together count as authenticated; one alone does not (single keywords
/// show up in unrelated page chrome).
const STRICT_INDICATORS: &[&str] = &["logout", "user control panel", "my messages"];

/// Broader indicator set used while watching the login flow complete.
const LOGIN_INDICATORS: &[&str] = &[
    "logout",
    "log out",
    "profile",
    "my messages",
    "user control panel",
    "welcome back",
];

/// Markers of a rendered login form. A login form on the probe page
/// overrides every weaker signal.
const LOGIN_FORM_MARKERS: &[&str] = &["name=\"username\"", "name=\"password\""];

/// Strict authenticated-probe assessment of page content.
///
/// Requires two independent strong signals: the logout control together
/// with the account-control-panel marker, or at least two of the strict
/// textual indicators. A visible login form short-circuits to false.
#[must_use]
pub fn assess_authenticated(content: &str) -> bool {
    let lowered = content.to_lowercase();

    if LOGIN_FORM_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return false;
    }

    let has_logout_control = lowered.contains("mode=logout");
    let has_panel_marker = lowered.contains("ucp.php?mode=profile");
    if has_logout_control && has_panel_marker {
        return true;
    }

    let indicator_count = STRICT_INDICATORS
        .iter()
        .filter(|indicator| lowered.contains(*indicator))
        .count();
    indicator_count >= 2
}

fn login_completed(content: &str) -> bool {
    let lowered = content.to_lowercase();
    LOGIN_INDICATORS
        .iter()
        .any(|indicator| lowered.contains(indicator))
}

/// Owns the single live transport handle and the login state machine.
pub struct SessionManager {
    transport: Box<dyn Transport>,
    store: CredentialStore,
    snapshot_path: PathBuf,
    base_url: Url,
    domain: String,
    login_poll: Duration,
    login_timeout: Duration,
    state: SessionState,
}

impl SessionManager {
    /// Start a session over an already-built transport.
    ///
    /// Loads the persisted credential set (snapshot file first, then the
    /// credential store) into the transport.
    pub async fn start(transport: Box<dyn Transport>, config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.site.base_url)?;
        let store = CredentialStore::new(&config.credentials.env_path)
            .with_key(config.credentials.env_key.clone());

        let mut manager = Self {
            transport,
            store,
            snapshot_path: config.credentials.snapshot_path.clone(),
            base_url,
            domain: config.site.domain.clone(),
            login_poll: Duration::from_secs(config.login.poll_interval_secs),
            login_timeout: Duration::from_secs(config.login.timeout_secs),
            state: SessionState::Unauthenticated,
        };

        let mut credentials = manager.store.load(&manager.domain);
        if let Some(snapshot) = SessionSnapshot::load(&manager.snapshot_path) {
            credentials.merge(&snapshot.to_credentials(&manager.domain));
        }

        if credentials.is_empty() {
            tracing::debug!("No persisted credentials to load");
        } else {
            tracing::info!("Loaded {} persisted cookies", credentials.len());
            manager.transport.apply_credentials(&credentials).await;
        }

        Ok(manager)
    }

    /// Start a session over the plain-HTTP transport.
    pub async fn start_http(config: &AppConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Self::start(Box::new(transport), config).await
    }

    /// Start a session over the browser transport.
    pub async fn start_browser(config: &AppConfig) -> Result<Self> {
        let profile = LaunchProfile {
            user_agent: config.http.user_agent.clone(),
            window_width: config.browser.window_width,
            window_height: config.browser.window_height,
            headless: config.browser.headless,
            navigation_timeout_secs: config.browser.navigation_timeout_secs,
        };
        let engine = BrowserEngine::launch(profile).await?;
        let transport = BrowserTransport::new(engine, config);
        Self::start(Box::new(transport), config).await
    }

    /// Current derived session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Confirm the session can reach protected pages, logging in if not.
    ///
    /// Without `force`, a strict probe of the landing page decides; with
    /// it, the login flow always runs. Returns false when the session
    /// remains unauthenticated — it stays usable, but callers must expect
    /// degraded results.
    pub async fn ensure_authenticated(&mut self, force: bool) -> bool {
        if !force {
            let probe_url = self.resolve("index.php");
            match self.transport.fetch(&probe_url).await {
                Some(result) if challenge::detected(&result.content) => {
                    tracing::warn!("Probe page is challenge-gated");
                    self.state = SessionState::Challenged;
                }
                Some(result) if !result.is_success() => {
                    tracing::warn!("Probe returned HTTP {}", result.status);
                    self.state = SessionState::Unauthenticated;
                }
                Some(result) => {
                    if assess_authenticated(&result.content) {
                        tracing::info!("Already authenticated");
                        self.state = SessionState::Authenticated;
                        return true;
                    }
                    tracing::info!("Probe shows no authenticated session");
                    self.state = SessionState::Unauthenticated;
                }
                None => {
                    tracing::warn!("Login probe fetch failed");
                    self.state = SessionState::Unauthenticated;
                }
            }
        }

        self.perform_login().await
    }

    /// Fetch a URL through the transport.
    ///
    /// A single 403 triggers one challenge solve keyed to the failing URL
    /// (edge rules can differ per route) and exactly one retry with
    /// retries disabled. Returns `None` on total failure; never panics or
    /// propagates errors.
    pub async fn fetch(&mut self, url: &str) -> Option<FetchResult> {
        let result = self.transport.fetch(url).await?;
        if result.status != 403 {
            return Some(result);
        }

        tracing::warn!("HTTP 403 for {}, attempting credential refresh", url);
        self.state = SessionState::Challenged;

        let Some(refreshed) = self.transport.refresh_credentials(url).await else {
            tracing::warn!("Credential refresh failed for {}", url);
            return None;
        };

        self.transport.apply_credentials(&refreshed).await;
        self.persist_if_changed().await;

        // One retry only; a persistently blocking edge must not loop
        self.transport.fetch_once(url).await
    }

    /// Persist credentials and the session snapshot, then release the
    /// transport. Safe to call on any path out of a run.
    pub async fn close(&mut self) {
        self.persist_if_changed().await;

        let active = self.transport.credentials().await;
        if !active.is_empty() {
            if let Err(e) = SessionSnapshot::from_credentials(&active).save(&self.snapshot_path) {
                tracing::warn!("Failed to write session snapshot: {}", e);
            }
        }

        self.transport.shutdown().await;
        self.state = SessionState::Unauthenticated;
        tracing::info!("Session closed");
    }

    /// Resolve a site-relative path against the base URL.
    #[must_use]
    pub fn resolve(&self, path: &str) -> String {
        self.base_url
            .join(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base_url, path))
    }

    async fn perform_login(&mut self) -> bool {
        let login_url = self.resolve("ucp.php?mode=login");
        tracing::info!("Starting login flow at {}", login_url);

        match self.transport.fetch(&login_url).await {
            Some(page) if challenge::detected(&page.content) => {
                self.state = SessionState::Challenged;
                if let Some(refreshed) = self.transport.refresh_credentials(&login_url).await {
                    self.transport.apply_credentials(&refreshed).await;
                    self.persist_if_changed().await;
                } else {
                    tracing::warn!("Login page challenge did not clear");
                }
            }
            Some(_) => {}
            None => {
                tracing::warn!("Could not load the login page");
                self.state = SessionState::Unauthenticated;
                return false;
            }
        }

        // Block until the operator (or a delegated flow) finishes logging
        // in, bounded by the login timeout.
        let mut waited = Duration::ZERO;
        while waited < self.login_timeout {
            if let Some(current) = self.transport.current_content().await {
                if login_completed(&current.content) {
                    tracing::info!("Login completed after {:?}", waited);
                    self.state = SessionState::Authenticated;
                    self.persist_if_changed().await;
                    return true;
                }
            }

            tracing::debug!(
                "Waiting for login completion ({:?}/{:?})",
                waited,
                self.login_timeout
            );
            tokio::time::sleep(self.login_poll).await;
            waited += self.login_poll;
        }

        tracing::warn!("Login did not complete within {:?}", self.login_timeout);
        self.state = SessionState::Unauthenticated;
        false
    }

    async fn persist_if_changed(&mut self) {
        let active = self.transport.credentials().await;
        if active.is_empty() {
            return;
        }

        let persisted = self.store.load(&self.domain);
        if persisted.differs(&active) {
            tracing::info!("Detected cookie changes, persisting");
            if let Err(e) = self.store.save(&active) {
                tracing::warn!("Failed to persist credentials: {}", e);
            }
        }
    }
}
