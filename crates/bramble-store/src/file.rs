//! Append-only JSONL file backend.
//!
//! One file per collection, one JSON object per line. Writes are
//! append-only so interleaved runs never clobber each other — there is no
//! read-modify-write anywhere in this module.

use crate::error::Result;
use bramble_core::Record;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// JSONL file store rooted at an output directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    output_dir: PathBuf,
}

impl FileStore {
    /// Store writing `<collection>.jsonl` files under `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Path the given collection is appended to.
    #[must_use]
    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.output_dir.join(format!("{collection}.jsonl"))
    }

    /// Append a batch of records, one JSON object per line.
    ///
    /// Records that fail to serialize are skipped with a warning; the rest
    /// of the batch still lands.
    ///
    /// # Errors
    /// Returns an I/O error if the directory or file cannot be written.
    pub fn append(&self, collection: &str, records: &[Record]) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;

        let path = self.collection_path(collection);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut written = 0usize;
        for record in records {
            match serde_json::to_string(record) {
                Ok(line) => {
                    writeln!(file, "{line}")?;
                    written += 1;
                }
                Err(e) => tracing::warn!("Skipping unserializable record: {}", e),
            }
        }

        tracing::debug!("Wrote {} rows to {}", written, path.display());
        Ok(())
    }

    /// Root output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
