//! Content hashing and the processed-file ledger.
//!
//! [`hash_file`] streams a file through SHA-256. [`FileLedger`] is the
//! persisted `file name → hash` map used to skip files that have not changed
//! since they were last ingested.
//!
//! The ledger is keyed by basename only, so two files with the same name in
//! different directories would share one entry; the ingest loop refuses the
//! second one. It is loaded once when opened and
//! written back in full after every change. There is no locking: only one
//! process may ingest into a ledger at a time.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// SHA-256 of the file's full byte stream, as lowercase hex.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)
        .with_context(|| format!("hashing {}", path.display()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// [`hash_file`] on a blocking thread, for use inside async pipelines.
pub async fn hash_file_async(path: &Path) -> Result<String> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || hash_file(&owned))
        .await
        .with_context(|| format!("hashing task for {} failed", path.display()))?
}

/// The basename the ledger (and the vector store) identify a file by.
pub fn file_key(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Persisted map of file name to the hash it was last processed with.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileLedger {
    /// Load the ledger at `path`.
    ///
    /// A missing file is an empty ledger. An unreadable or corrupt file is
    /// logged and also treated as empty, so affected files are reprocessed.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ledger is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ledger yet");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read ledger, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored hash for a file name.
    pub fn get(&self, file_name: &str) -> Option<&str> {
        self.entries.get(file_name).map(String::as_str)
    }

    /// True iff the ledger holds `digest` for this file's name.
    pub fn is_processed(&self, file_path: &Path, digest: &str) -> bool {
        file_key(file_path)
            .and_then(|key| self.entries.get(&key).map(|stored| stored == digest))
            .unwrap_or(false)
    }

    /// Record `digest` for this file and persist immediately.
    ///
    /// The in-memory entry is updated even if the save fails.
    pub fn mark_processed(&mut self, file_path: &Path, digest: &str) -> Result<()> {
        let key = file_key(file_path)
            .with_context(|| format!("{} has no file name", file_path.display()))?;
        if self.entries.get(&key).map(String::as_str) == Some(digest) {
            return Ok(());
        }
        self.entries.insert(key, digest.to_string());
        self.save()
    }

    /// Drop the entry for `file_name`. Returns whether one existed.
    pub fn forget(&mut self, file_name: &str) -> Result<bool> {
        if self.entries.remove(file_name).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Write the full map, creating the parent directory if needed.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;

        // Write-then-rename so a crash never leaves a truncated ledger.
        let tmp = self.path.with_extension("json.tmp");
        let mut file =
            File::create(&tmp).with_context(|| format!("writing {}", tmp.display()))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "ledger saved");
        Ok(())
    }
}
