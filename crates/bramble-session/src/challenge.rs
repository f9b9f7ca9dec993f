//! Anti-bot challenge detection and solving.
//!
//! Detection is a case-insensitive substring match against the fixed
//! interstitial marker set. Two solving paths exist: the browser transport
//! waits the challenge out by polling the live page, and the HTTP
//! transport delegates to an external solver service that impersonates a
//! full browser and hands back the resulting cookie jar.

use crate::credentials::CredentialSet;
use bramble_browser::BrowserEngine;
use bramble_core::config::ChallengeConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Phrases that identify an interstitial page.
pub const CHALLENGE_MARKERS: &[&str] = &[
    "checking your browser",
    "just a moment",
    "cf-challenge",
    "challenge-platform",
    "verifying you are human",
    "please wait",
];

/// True when the content contains any interstitial marker.
#[must_use]
pub fn detected(content: &str) -> bool {
    let lowered = content.to_lowercase();
    CHALLENGE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Poll-wait policy for clearing a challenge in the live browser.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeWait {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub settle: Duration,
}

impl ChallengeWait {
    #[must_use]
    pub fn from_config(config: &ChallengeConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            settle: Duration::from_secs(config.settle_secs),
        }
    }

    /// Re-read the live page until the interstitial clears or the bounded
    /// timeout elapses. Returns true once the page shows real content.
    pub async fn wait_for_clear(&self, engine: &BrowserEngine) -> bool {
        let mut waited = Duration::ZERO;

        while waited < self.timeout {
            tokio::time::sleep(self.poll_interval).await;
            waited += self.poll_interval;

            let content = match engine.content().await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Failed to read page during challenge wait: {}", e);
                    continue;
                }
            };

            if !detected(&content) {
                tracing::info!("Challenge cleared after {:?}", waited);
                tokio::time::sleep(self.settle).await;
                return true;
            }

            tracing::debug!("Still waiting out challenge ({:?}/{:?})", waited, self.timeout);
        }

        tracing::warn!("Challenge did not clear within {:?}", self.timeout);
        false
    }
}

#[derive(Serialize)]
struct SolveRequest<'a> {
    url: &'a str,
    browser: &'a str,
    platform: &'a str,
    max_timeout_ms: u64,
}

#[derive(Deserialize)]
struct SolveResponse {
    status: String,
    #[serde(default)]
    cookies: Vec<SolveCookie>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct SolveCookie {
    name: String,
    value: String,
}

/// Client for an external challenge-solving service.
///
/// The service runs a real browser signature on our behalf and returns the
/// cookie jar that clears the edge. This path must never raise past its
/// boundary: every failure mode becomes `None` with a logged reason.
pub struct SolverClient {
    http: reqwest::Client,
    endpoint: String,
    browser: String,
    platform: String,
    max_timeout: Duration,
}

impl SolverClient {
    /// Build a solver client from configuration.
    ///
    /// Returns `None` when no solver endpoint is configured.
    #[must_use]
    pub fn from_config(config: &ChallengeConfig) -> Option<Self> {
        if config.solver_url.trim().is_empty() {
            return None;
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.solver_timeout_secs + 10))
            .build()
            .ok()?;

        Some(Self {
            http,
            endpoint: config.solver_url.clone(),
            browser: config.solver_browser.clone(),
            platform: config.solver_platform.clone(),
            max_timeout: Duration::from_secs(config.solver_timeout_secs),
        })
    }

    /// Ask the solver to clear the challenge guarding `url`.
    ///
    /// Returns the refreshed cookie set on success, `None` on any failure.
    pub async fn solve(&self, url: &str, domain: &str) -> Option<CredentialSet> {
        tracing::info!("Attempting solver-assisted clear for {}", url);

        let request = SolveRequest {
            url,
            browser: &self.browser,
            platform: &self.platform,
            max_timeout_ms: self.max_timeout.as_millis() as u64,
        };

        let response = match self.http.post(&self.endpoint).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Solver request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("Solver returned HTTP {}", response.status());
            return None;
        }

        let body: SolveResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Solver response not understood: {}", e);
                return None;
            }
        };

        if body.status != "ok" {
            tracing::warn!(
                "Solver reported failure: {}",
                body.message.unwrap_or_else(|| body.status.clone())
            );
            return None;
        }

        let mut credentials = CredentialSet::new(domain);
        for cookie in body.cookies {
            credentials.insert(cookie.name, cookie.value);
        }

        if credentials.is_empty() {
            tracing::warn!("Solver succeeded but returned no cookies");
            return None;
        }

        tracing::info!("Solver obtained {} cookies", credentials.len());
        Some(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_known_markers() {
        assert!(detected(
            "<title>Just a moment...</title><div>checking your browser</div>"
        ));
        assert!(detected("loading challenge-platform scripts"));
        assert!(detected("VERIFYING YOU ARE HUMAN"));
    }

    #[test]
    fn test_detection_is_case_insensitive() {
        assert!(detected("Checking Your Browser before accessing"));
    }

    #[test]
    fn test_ignores_ordinary_content() {
        assert!(!detected(
            "<html><body><div class=\"post\">hello world</div></body></html>"
        ));
    }

    #[test]
    fn test_solver_disabled_without_endpoint() {
        let config = ChallengeConfig::default();
        assert!(config.solver_url.is_empty());
        assert!(SolverClient::from_config(&config).is_none());
    }

    #[test]
    fn test_solver_enabled_with_endpoint() {
        let config = ChallengeConfig {
            solver_url: "http://localhost:8191/v1".to_string(),
            ..ChallengeConfig::default()
        };
        assert!(SolverClient::from_config(&config).is_some());
    }

    #[test]
    fn test_wait_from_config() {
        let wait = ChallengeWait::from_config(&ChallengeConfig::default());
        assert_eq!(wait.poll_interval, Duration::from_secs(3));
        assert_eq!(wait.timeout, Duration::from_secs(120));
    }
}
