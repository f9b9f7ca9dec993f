//! Session snapshot file.
//!
//! A structured cookie snapshot written on every session close and read on
//! the next start. Two shapes are accepted on load — a bare array of
//! cookie objects, or an object wrapping a `cookies` array — because older
//! runs wrote the bare form. Unrecognized shapes are treated as absent.

use crate::credentials::CredentialSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One cookie as persisted in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// The cookie snapshot written at session close.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    pub cookies: Vec<SnapshotCookie>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotShape {
    Wrapped { cookies: Vec<SnapshotCookie> },
    Bare(Vec<SnapshotCookie>),
}

impl SessionSnapshot {
    /// Build a snapshot from the active credential set.
    #[must_use]
    pub fn from_credentials(credentials: &CredentialSet) -> Self {
        let domain = credentials.domain().to_string();
        Self {
            cookies: credentials
                .pairs()
                .into_iter()
                .map(|(name, value)| SnapshotCookie {
                    name,
                    value,
                    domain: Some(domain.clone()),
                    path: Some("/".to_string()),
                })
                .collect(),
        }
    }

    /// Convert the snapshot back into a credential set for a domain.
    #[must_use]
    pub fn to_credentials(&self, domain: &str) -> CredentialSet {
        let mut set = CredentialSet::new(domain);
        for cookie in &self.cookies {
            set.insert(cookie.name.clone(), cookie.value.clone());
        }
        set
    }

    /// Load a snapshot from disk.
    ///
    /// Returns `None` when the file is missing or its shape is not
    /// recognized — either way the session starts fresh.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let contents = fs::read_to_string(path).ok()?;

        match serde_json::from_str::<SnapshotShape>(&contents) {
            Ok(SnapshotShape::Wrapped { cookies }) | Ok(SnapshotShape::Bare(cookies)) => {
                tracing::info!(
                    "Loaded session snapshot ({} cookies) from {}",
                    cookies.len(),
                    path.display()
                );
                Some(Self { cookies })
            }
            Err(e) => {
                tracing::warn!(
                    "Session snapshot at {} not recognized ({}), starting fresh",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Write the snapshot to disk in the wrapped shape.
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        tracing::info!("Session snapshot saved to {}", path.display());
        Ok(())
    }
}
