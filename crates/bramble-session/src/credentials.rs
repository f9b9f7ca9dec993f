//! Cookie credentials and their persistence.
//!
//! A [`CredentialSet`] is the cookie state the target site uses to
//! recognize an authenticated client. It round-trips through a single
//! delimited string (`name=value; name2=value2`) stored under one key in a
//! dotenv-style file; [`CredentialStore`] rewrites that file in place so
//! unrelated keys survive every save.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SessionError};

/// Environment key the serialized cookie string is stored under.
pub const DEFAULT_ENV_KEY: &str = "BRAMBLE_COOKIES";

/// A set of cookies for one target domain.
///
/// Keys are unique; values are opaque. Ordering is normalized so equality
/// and serialization are independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    domain: String,
    values: BTreeMap<String, String>,
}

impl CredentialSet {
    /// Empty credential set for a domain.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            values: BTreeMap::new(),
        }
    }

    /// Parse a `name=value; name2=value2` string. Fragments without an
    /// equals sign are skipped; empty values are preserved.
    #[must_use]
    pub fn from_cookie_string(raw: &str, domain: impl Into<String>) -> Self {
        let mut set = Self::new(domain);
        for part in raw.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some((name, value)) = part.split_once('=') else {
                continue;
            };
            set.values
                .insert(name.trim().to_string(), value.trim().to_string());
        }
        set
    }

    /// Serialize to the `name=value; name2=value2` form.
    #[must_use]
    pub fn to_cookie_string(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Domain these cookies belong to.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Insert or replace a cookie.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Number of cookies held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no cookies are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Name/value pairs in normalized order.
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect()
    }

    /// Merge another set into this one; the other set's values win.
    pub fn merge(&mut self, other: &CredentialSet) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// True when the two sets do not carry identical cookies.
    ///
    /// False exactly when key sets match and every value matches; the
    /// domain is identity metadata and does not participate.
    #[must_use]
    pub fn differs(&self, other: &CredentialSet) -> bool {
        self.values != other.values
    }
}

/// Persists the serialized cookie string in a dotenv-style file.
///
/// Saves are read-merge-write: the file is re-read at save time and only
/// the credential line is replaced, so keys edited externally between runs
/// are preserved. A successful save also updates the process environment,
/// letting later loads in the same run observe the new value without
/// touching the file again.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    key: String,
}

impl CredentialStore {
    /// Store backed by the given dotenv-style file, using the default key.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: DEFAULT_ENV_KEY.to_string(),
        }
    }

    /// Override the key the cookie string is stored under.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Load the persisted credentials for a domain.
    ///
    /// The process environment takes precedence over the backing file (a
    /// save earlier in the run updates the environment). A missing key in
    /// both yields an empty set.
    #[must_use]
    pub fn load(&self, domain: &str) -> CredentialSet {
        if let Ok(raw) = std::env::var(&self.key) {
            return CredentialSet::from_cookie_string(&raw, domain);
        }

        match self.read_file_value() {
            Some(raw) => CredentialSet::from_cookie_string(&raw, domain),
            None => CredentialSet::new(domain),
        }
    }

    /// Persist a credential set, preserving unrelated keys in the file.
    pub fn save(&self, credentials: &CredentialSet) -> Result<()> {
        let serialized = credentials.to_cookie_string();
        let line = format!("{}={}", self.key, serialized);

        let contents = if self.path.exists() {
            let existing = fs::read_to_string(&self.path)?;
            let mut lines: Vec<String> = Vec::new();
            let mut replaced = false;
            for existing_line in existing.lines() {
                if key_of(existing_line) == Some(self.key.as_str()) && !replaced {
                    lines.push(line.clone());
                    replaced = true;
                } else {
                    lines.push(existing_line.to_string());
                }
            }
            if !replaced {
                lines.push(line.clone());
            }
            let mut out = lines.join("\n");
            out.push('\n');
            out
        } else {
            format!("{line}\n")
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, contents).map_err(|e| {
            SessionError::Credentials(format!("failed to write {}: {e}", self.path.display()))
        })?;

        std::env::set_var(&self.key, &serialized);
        tracing::info!(
            "Persisted {} cookies to {}",
            credentials.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file_value(&self) -> Option<String> {
        let contents = fs::read_to_string(&self.path).ok()?;
        for line in contents.lines() {
            if key_of(line) == Some(self.key.as_str()) {
                let (_, value) = line.split_once('=')?;
                return Some(value.trim().to_string());
            }
        }
        None
    }
}

fn key_of(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    trimmed.split_once('=').map(|(key, _)| key.trim())
}
