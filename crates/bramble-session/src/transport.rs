//! Transports: how a URL becomes page content.
//!
//! Two implementations sit behind the [`Transport`] trait. `HttpTransport`
//! is the lightweight path — a reqwest client with retry/backoff and an
//! explicit cookie header, delegating challenges to the external solver.
//! `BrowserTransport` drives the live browser and waits challenges out on
//! the page itself. Cookies are carried in a [`CredentialSet`] rather than
//! an opaque jar so the session layer can diff and persist them.

use crate::challenge::{self, ChallengeWait, SolverClient};
use crate::credentials::CredentialSet;
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use bramble_browser::BrowserEngine;
use bramble_core::config::AppConfig;
use bramble_core::FetchResult;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, SET_COOKIE};
use std::time::Duration;

/// Statuses the HTTP transport retries with backoff.
const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// A transport turns URLs into fetched pages and owns the active
/// credential state for its client.
#[async_trait]
pub trait Transport: Send {
    /// Fetch a URL under the configured retry policy.
    async fn fetch(&mut self, url: &str) -> Option<FetchResult>;

    /// Fetch a URL with retries disabled (used for the single post-solve
    /// retry).
    async fn fetch_once(&mut self, url: &str) -> Option<FetchResult>;

    /// Attempt to clear the challenge guarding the given URL and return
    /// the refreshed credential set.
    async fn refresh_credentials(&mut self, url: &str) -> Option<CredentialSet>;

    /// Snapshot of the credentials the transport is currently sending.
    async fn credentials(&self) -> CredentialSet;

    /// Merge a credential set into the active client state.
    async fn apply_credentials(&mut self, credentials: &CredentialSet);

    /// Re-read whatever the transport currently considers "the page"
    /// without forcing a navigation. The browser reads the live DOM; the
    /// HTTP path re-fetches the landing page.
    async fn current_content(&mut self) -> Option<FetchResult>;

    /// Release transport resources.
    async fn shutdown(&mut self);
}

/// Parse the `name=value` head of a Set-Cookie header.
fn set_cookie_pair(header: &str) -> Option<(String, String)> {
    let head = header.split(';').next()?.trim();
    let (name, value) = head.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Plain-HTTP transport with browser-like identity headers.
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: CredentialSet,
    solver: Option<SolverClient>,
    landing_url: String,
    retries: u32,
    backoff: Duration,
}

impl HttpTransport {
    /// Build the transport from configuration; persisted credentials are
    /// injected by the session manager afterwards.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Ok(referer) = HeaderValue::from_str(&config.site.base_url) {
            headers.insert(REFERER, referer);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.http.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()
            .map_err(|e| SessionError::Http(e.to_string()))?;

        Ok(Self {
            client,
            credentials: CredentialSet::new(config.site.domain.clone()),
            solver: SolverClient::from_config(&config.challenge),
            landing_url: config.site.base_url.clone(),
            retries: config.http.retries,
            backoff: Duration::from_millis(config.http.backoff_ms),
        })
    }

    async fn try_fetch(&mut self, url: &str) -> std::result::Result<FetchResult, reqwest::Error> {
        let mut request = self.client.get(url);
        if !self.credentials.is_empty() {
            request = request.header(COOKIE, self.credentials.to_cookie_string());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        // Keep the active credential view current with every response
        for value in response.headers().get_all(SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                if let Some((name, cookie_value)) = set_cookie_pair(raw) {
                    self.credentials.insert(name, cookie_value);
                }
            }
        }

        let content = response.text().await?;
        Ok(FetchResult {
            content,
            status,
            final_url,
        })
    }

    async fn fetch_with_policy(&mut self, url: &str, retries: u32) -> Option<FetchResult> {
        let mut attempt = 0u32;

        loop {
            match self.try_fetch(url).await {
                Ok(result) => {
                    if RETRY_STATUSES.contains(&result.status) && attempt < retries {
                        attempt += 1;
                        let delay = self.backoff * 2u32.saturating_pow(attempt - 1);
                        tracing::warn!(
                            "HTTP {} for {} (attempt {}/{}), retrying in {:?}",
                            result.status,
                            url,
                            attempt,
                            retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Some(result);
                }
                Err(e) => {
                    if attempt < retries {
                        attempt += 1;
                        let delay = self.backoff * 2u32.saturating_pow(attempt - 1);
                        tracing::warn!(
                            "Request failed for {} (attempt {}/{}): {}, retrying in {:?}",
                            url,
                            attempt,
                            retries,
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    tracing::error!("Request failed for {} after {} attempts: {}", url, attempt + 1, e);
                    return None;
                }
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&mut self, url: &str) -> Option<FetchResult> {
        let retries = self.retries;
        self.fetch_with_policy(url, retries).await
    }

    async fn fetch_once(&mut self, url: &str) -> Option<FetchResult> {
        self.fetch_with_policy(url, 0).await
    }

    async fn refresh_credentials(&mut self, url: &str) -> Option<CredentialSet> {
        let domain = self.credentials.domain().to_string();
        match &self.solver {
            Some(solver) => solver.solve(url, &domain).await,
            None => {
                tracing::warn!("No challenge solver configured; cannot refresh credentials");
                None
            }
        }
    }

    async fn credentials(&self) -> CredentialSet {
        self.credentials.clone()
    }

    async fn apply_credentials(&mut self, credentials: &CredentialSet) {
        self.credentials.merge(credentials);
    }

    async fn current_content(&mut self) -> Option<FetchResult> {
        let landing = self.landing_url.clone();
        self.fetch_with_policy(&landing, 0).await
    }

    async fn shutdown(&mut self) {}
}

/// Browser-automation transport.
///
/// Navigations resolve challenges inline by waiting them out on the live
/// page; successful navigations report status 200 since CDP does not
/// surface the document status cheaply.
pub struct BrowserTransport {
    engine: Option<BrowserEngine>,
    domain: String,
    wait: ChallengeWait,
}

impl BrowserTransport {
    /// Wrap a launched engine.
    #[must_use]
    pub fn new(engine: BrowserEngine, config: &AppConfig) -> Self {
        Self {
            engine: Some(engine),
            domain: config.site.domain.clone(),
            wait: ChallengeWait::from_config(&config.challenge),
        }
    }

    fn engine(&self) -> Option<&BrowserEngine> {
        if self.engine.is_none() {
            tracing::error!("Browser transport used after shutdown");
        }
        self.engine.as_ref()
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    async fn fetch(&mut self, url: &str) -> Option<FetchResult> {
        let wait = self.wait;
        let engine = self.engine()?;

        let final_url = match engine.goto(url).await {
            Ok(final_url) => final_url,
            Err(e) => {
                tracing::error!("Navigation to {} failed: {}", url, e);
                return None;
            }
        };

        // Give late challenge redirects a moment to land
        tokio::time::sleep(wait.settle).await;

        let mut content = engine.content().await.ok()?;
        if challenge::detected(&content) {
            tracing::info!("Challenge detected for {}, waiting it out", url);
            if wait.wait_for_clear(engine).await {
                content = engine.content().await.ok()?;
            }
        }

        let final_url = engine.current_url().await.unwrap_or(final_url);
        Some(FetchResult {
            content,
            status: 200,
            final_url,
        })
    }

    async fn fetch_once(&mut self, url: &str) -> Option<FetchResult> {
        self.fetch(url).await
    }

    async fn refresh_credentials(&mut self, url: &str) -> Option<CredentialSet> {
        let wait = self.wait;
        let domain = self.domain.clone();
        let engine = self.engine()?;

        if let Err(e) = engine.goto(url).await {
            tracing::error!("Navigation to {} failed during refresh: {}", url, e);
            return None;
        }

        let content = engine.content().await.ok()?;
        if challenge::detected(&content) && !wait.wait_for_clear(engine).await {
            return None;
        }

        let mut credentials = CredentialSet::new(domain);
        for (name, value) in engine.cookies().await.ok()? {
            credentials.insert(name, value);
        }
        Some(credentials)
    }

    async fn credentials(&self) -> CredentialSet {
        let mut credentials = CredentialSet::new(self.domain.clone());
        if let Some(engine) = self.engine.as_ref() {
            match engine.cookies().await {
                Ok(cookies) => {
                    for (name, value) in cookies {
                        credentials.insert(name, value);
                    }
                }
                Err(e) => tracing::warn!("Failed to export browser cookies: {}", e),
            }
        }
        credentials
    }

    async fn apply_credentials(&mut self, credentials: &CredentialSet) {
        let domain = self.domain.clone();
        if let Some(engine) = self.engine() {
            if let Err(e) = engine.set_cookies(&credentials.pairs(), &domain).await {
                tracing::warn!("Failed to import cookies into browser: {}", e);
            }
        }
    }

    async fn current_content(&mut self) -> Option<FetchResult> {
        let engine = self.engine()?;
        let content = engine.content().await.ok()?;
        let final_url = engine.current_url().await.unwrap_or_default();
        Some(FetchResult {
            content,
            status: 200,
            final_url,
        })
    }

    async fn shutdown(&mut self) {
        if let Some(engine) = self.engine.take() {
            if let Err(e) = engine.close().await {
                tracing::warn!("Browser shutdown reported: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cookie_pair() {
        assert_eq!(
            set_cookie_pair("cf_clearance=tok123; Path=/; HttpOnly; Secure"),
            Some(("cf_clearance".to_string(), "tok123".to_string()))
        );
        assert_eq!(
            set_cookie_pair("plain=value"),
            Some(("plain".to_string(), "value".to_string()))
        );
        assert_eq!(set_cookie_pair("malformed"), None);
        assert_eq!(set_cookie_pair("=orphan; Path=/"), None);
    }

    #[test]
    fn test_http_transport_builds_from_defaults() {
        let config = AppConfig::default();
        let transport = HttpTransport::new(&config).expect("build http transport");
        assert!(transport.credentials.is_empty());
        assert_eq!(transport.retries, config.http.retries);
    }

    #[tokio::test]
    async fn test_http_transport_credentials_roundtrip() {
        let config = AppConfig::default();
        let mut transport = HttpTransport::new(&config).expect("build http transport");

        let refreshed = CredentialSet::from_cookie_string("sid=abc; uid=42", "forum.example.com");
        transport.apply_credentials(&refreshed).await;

        let active = transport.credentials().await;
        assert!(!active.differs(&refreshed));
    }

    #[tokio::test]
    async fn test_http_refresh_without_solver_is_none() {
        let config = AppConfig::default();
        let mut transport = HttpTransport::new(&config).expect("build http transport");
        assert!(transport
            .refresh_credentials("https://forum.example.com/blocked")
            .await
            .is_none());
    }
}
