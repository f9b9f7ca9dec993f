//! Configuration management for bramble.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/bramble/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Target site settings
    pub site: SiteConfig,
    /// Storage backend settings
    pub storage: StorageConfig,
    /// Plain-HTTP transport settings
    pub http: HttpConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Challenge handling settings
    pub challenge: ChallengeConfig,
    /// Login flow settings
    pub login: LoginConfig,
    /// Crawl pacing and pagination settings
    pub crawl: CrawlConfig,
    /// Credential persistence settings
    pub credentials: CredentialsConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if the config directory cannot be determined, or the
    /// file exists but cannot be read or parsed.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `BRAMBLE_BASE_URL`: Override the target site base URL
    /// - `BRAMBLE_HEADLESS`: Override browser headless mode (true/false)
    /// - `BRAMBLE_OUTPUT_MODE`: Override storage mode (file/database)
    /// - `BRAMBLE_DATABASE_URL`: Override the database connection string
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("BRAMBLE_BASE_URL") {
            if !val.is_empty() {
                tracing::debug!("Override site.base_url from env: {}", val);
                config.site.base_url = val;
            }
        }

        if let Ok(val) = std::env::var("BRAMBLE_HEADLESS") {
            if let Ok(headless) = val.parse() {
                tracing::debug!("Override browser.headless from env: {}", headless);
                config.browser.headless = headless;
            }
        }

        if let Ok(val) = std::env::var("BRAMBLE_OUTPUT_MODE") {
            match val.as_str() {
                "file" => config.storage.mode = OutputMode::File,
                "database" => config.storage.mode = OutputMode::Database,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "storage.mode".to_string(),
                        reason: format!("expected 'file' or 'database', got '{other}'"),
                    })
                }
            }
        }

        if let Ok(val) = std::env::var("BRAMBLE_DATABASE_URL") {
            if !val.is_empty() {
                config.storage.database_url = val;
            }
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/bramble/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "bramble", "bramble").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/bramble`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "bramble", "bramble").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Target site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL of the forum, with trailing slash
    pub base_url: String,
    /// Host the credential cookies belong to
    pub domain: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://forum.example.com/".to_string(),
            domain: "forum.example.com".to_string(),
        }
    }
}

/// Where harvested records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Append JSONL files per collection
    File,
    /// SQLite database with per-collection upsert handlers
    Database,
}

/// Storage backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Primary output mode; file storage always remains as fallback
    pub mode: OutputMode,
    /// SQLite connection string used when mode = "database"
    pub database_url: String,
    /// Directory for JSONL output files
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::File,
            database_url: "sqlite://bramble.db".to_string(),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Plain-HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User agent sent on every request
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retry attempts for transient statuses (429/5xx)
    pub retries: u32,
    /// Base backoff delay in milliseconds, doubled per attempt
    pub backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            timeout_secs: 30,
            retries: 5,
            backoff_ms: 600,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1366,
            window_height: 768,
            navigation_timeout_secs: 30,
        }
    }
}

/// Challenge handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    /// Seconds between live-page re-reads while waiting out a challenge
    pub poll_interval_secs: u64,
    /// Ceiling on the total challenge wait
    pub timeout_secs: u64,
    /// Extra settle delay after the interstitial clears
    pub settle_secs: u64,
    /// External solver service endpoint for the plain-HTTP path; empty
    /// disables the solver
    pub solver_url: String,
    /// Browser signature the solver should impersonate
    pub solver_browser: String,
    /// Platform signature the solver should impersonate
    pub solver_platform: String,
    /// Ceiling the solver is given per solve, in seconds
    pub solver_timeout_secs: u64,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            timeout_secs: 120,
            settle_secs: 2,
            solver_url: String::new(),
            solver_browser: "chrome".to_string(),
            solver_platform: "linux".to_string(),
            solver_timeout_secs: 60,
        }
    }
}

/// Login flow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Seconds between login-completion checks
    pub poll_interval_secs: u64,
    /// Ceiling on the total login wait
    pub timeout_secs: u64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            timeout_secs: 300,
        }
    }
}

/// Crawl pacing and pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Delay between page requests in milliseconds
    pub delay_ms: u64,
    /// Topics shown per forum listing page
    pub topic_page_size: u64,
    /// Posts shown per thread print-view page
    pub post_page_step: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            topic_page_size: 30,
            post_page_step: 10,
        }
    }
}

/// Credential persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Dotenv-style file holding the serialized cookie string
    pub env_path: PathBuf,
    /// Key the cookie string is stored under
    pub env_key: String,
    /// Session snapshot (cookie list) written on close
    pub snapshot_path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_path: PathBuf::from(".env"),
            env_key: "BRAMBLE_COOKIES".to_string(),
            snapshot_path: PathBuf::from("session.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.storage.mode, OutputMode::File);
        assert_eq!(config.http.retries, 5);
        assert_eq!(config.challenge.poll_interval_secs, 3);
        assert_eq!(config.login.timeout_secs, 300);
        assert!(config.browser.headless);
        assert!(config.challenge.solver_url.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[site]"));
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[challenge]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.site.base_url, config.site.base_url);
    }

    #[test]
    fn test_partial_config() {
        // Partial TOML configs fall back to defaults per section
        let toml_str = r#"
[site]
base_url = "https://boards.example.net/"

[crawl]
delay_ms = 250
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.site.base_url, "https://boards.example.net/");
        assert_eq!(config.crawl.delay_ms, 250);
        // These should be defaults
        assert_eq!(config.crawl.topic_page_size, 30);
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_config_file_roundtrip() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.site.base_url = "https://boards.example.net/".to_string();
        config.crawl.delay_ms = 500;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded_contents = fs::read_to_string(&config_path).expect("read config file");
        let loaded: AppConfig = toml::from_str(&loaded_contents).expect("parse loaded config");

        assert_eq!(loaded.site.base_url, "https://boards.example.net/");
        assert_eq!(loaded.crawl.delay_ms, 500);
    }

    #[test]
    fn test_output_mode_parsing() {
        let config: AppConfig =
            toml::from_str("[storage]\nmode = \"database\"\n").expect("parse storage mode");
        assert_eq!(config.storage.mode, OutputMode::Database);
    }
}
