//! Content-addressed cache of reconciliation results.
//!
//! Keys hash the reference bytes, the source bytes and the ingestion mode;
//! identical inputs always map to the same entry. Nothing is invalidated
//! implicitly: callers drop entries with `invalidate` or `clear`. A disk
//! entry that cannot be read is dropped and treated as a miss.

use log::{debug, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use super::{ExclusionEntry, Reconciliation};
use crate::error::Result;
use crate::ingest::IngestWarning;

/// SHA-256 identity of one reconciliation input triple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute(reference: &[u8], source: &[u8], mode: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [reference, source, mode.as_bytes()] {
            // Length prefix keeps ("ab", "c") and ("a", "bc") apart
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exclusion data persisted next to the accepted table
#[derive(Debug, Serialize, Deserialize)]
struct CachedLog {
    records_in: usize,
    files_read: usize,
    exclusions: Vec<ExclusionEntry>,
    warnings: Vec<IngestWarning>,
}

/// In-memory cache with an optional on-disk mirror
#[derive(Debug, Default)]
pub struct ReconcileCache {
    entries: HashMap<CacheKey, Reconciliation>,
    dir: Option<PathBuf>,
}

impl ReconcileCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Cache that also persists entries under `dir`
    pub fn with_dir(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            entries: HashMap::new(),
            dir: Some(dir.to_path_buf()),
        })
    }

    fn table_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{}.parquet", key)))
    }

    fn log_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{}.json", key)))
    }

    fn load_from_disk(&self, key: &CacheKey) -> Result<Option<Reconciliation>> {
        let (Some(table_path), Some(log_path)) = (self.table_path(key), self.log_path(key)) else {
            return Ok(None);
        };
        if !table_path.exists() || !log_path.exists() {
            return Ok(None);
        }

        let accepted = ParquetReader::new(File::open(&table_path)?).finish()?;
        let log: CachedLog = serde_json::from_slice(&fs::read(&log_path)?)?;

        Ok(Some(Reconciliation {
            accepted,
            exclusions: log.exclusions,
            warnings: log.warnings,
            records_in: log.records_in,
            files_read: log.files_read,
        }))
    }

    fn save_to_disk(&self, key: &CacheKey, value: &Reconciliation) -> Result<()> {
        let (Some(table_path), Some(log_path)) = (self.table_path(key), self.log_path(key)) else {
            return Ok(());
        };

        ParquetWriter::new(File::create(&table_path)?)
            .with_compression(ParquetCompression::Zstd(None))
            .finish(&mut value.accepted.clone())?;

        let log = CachedLog {
            records_in: value.records_in,
            files_read: value.files_read,
            exclusions: value.exclusions.clone(),
            warnings: value.warnings.clone(),
        };
        fs::write(&log_path, serde_json::to_vec(&log)?)?;
        Ok(())
    }

    /// Look up an entry, consulting the disk mirror on a memory miss
    pub fn get(&mut self, key: &CacheKey) -> Result<Option<Reconciliation>> {
        if let Some(hit) = self.entries.get(key) {
            return Ok(Some(hit.clone()));
        }
        match self.load_from_disk(key) {
            Ok(Some(loaded)) => {
                debug!("Cache entry {} loaded from disk", key);
                self.entries.insert(key.clone(), loaded.clone());
                Ok(Some(loaded))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                self.invalidate(key)?;
                Ok(None)
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, value: Reconciliation) -> Result<()> {
        self.save_to_disk(&key, &value)?;
        self.entries.insert(key, value);
        Ok(())
    }

    /// Return the cached value or compute and store it. The flag reports a hit.
    pub fn get_or_insert_with<F>(&mut self, key: CacheKey, compute: F) -> Result<(Reconciliation, bool)>
    where
        F: FnOnce() -> Result<Reconciliation>,
    {
        if let Some(hit) = self.get(&key)? {
            info!("Reusing cached reconciliation {}", &key.as_str()[..12]);
            return Ok((hit, true));
        }
        let value = compute()?;
        self.insert(key, value.clone())?;
        Ok((value, false))
    }

    /// Drop one entry from memory and disk. Returns whether anything was removed.
    pub fn invalidate(&mut self, key: &CacheKey) -> Result<bool> {
        let mut removed = self.entries.remove(key).is_some();
        for path in [self.table_path(key), self.log_path(key)].into_iter().flatten() {
            if path.exists() {
                fs::remove_file(&path)?;
                removed = true;
            }
        }
        Ok(removed)
    }

    /// Drop every entry, including cache files left by earlier runs
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if is_cache_file(&path) {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_cache_file(path: &Path) -> bool {
    let stem_is_key = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit()));
    let ext_matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "parquet" || e == "json");
    stem_is_key && ext_matches
}
