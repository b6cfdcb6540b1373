//! Durable per-collection snapshots
//!
//! Each collection persists as one JSON file under the collections
//! directory, rewritten in full after every mutation. Writes go to a
//! temporary file first and are renamed into place, so a crash mid-flush
//! leaves the previous durable state intact.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::Record;

/// Everything needed to rebuild one collection after a restart
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub name: String,
    pub dimension: Option<usize>,
    pub records: Vec<Record>,
}

/// File-backed snapshot storage, one durable unit per collection name
pub struct SnapshotStore {
    base_path: PathBuf,
}

impl SnapshotStore {
    /// Create a new snapshot store rooted at the configured data directory
    pub fn new(config: &Config) -> Result<Self> {
        let base_path = config.collections_dir();
        fs::create_dir_all(&base_path)?;

        // a crash between write and rename can leave a temp file behind
        for entry in fs::read_dir(&base_path)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "tmp").unwrap_or(false) {
                tracing::warn!(?path, "removing stale temp snapshot");
                fs::remove_file(&path)?;
            }
        }

        Ok(Self { base_path })
    }

    fn snapshot_path(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", name))
    }

    /// Load one collection's snapshot, or None if nothing was persisted yet
    pub fn load(&self, name: &str) -> Result<Option<CollectionSnapshot>> {
        let path = self.snapshot_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(snapshot))
    }

    /// Load every persisted collection, used once at startup
    pub fn load_all(&self) -> Result<Vec<CollectionSnapshot>> {
        let mut snapshots = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let file = File::open(&path)?;
                let snapshot: CollectionSnapshot = serde_json::from_reader(BufReader::new(file))?;
                snapshots.push(snapshot);
            }
        }

        Ok(snapshots)
    }

    /// Write the full current record set for a collection
    ///
    /// Atomic from the caller's perspective: the snapshot is written to a
    /// temporary file and renamed over the old one.
    pub fn flush(&self, name: &str, dimension: Option<usize>, records: &[Record]) -> Result<()> {
        let snapshot = CollectionSnapshot {
            name: name.to_string(),
            dimension,
            records: records.to_vec(),
        };

        let path = self.snapshot_path(name);
        let tmp_path = self.base_path.join(format!("{}.json.tmp", name));

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &snapshot)?;
        // flush and sync before the rename; a buffered write error must
        // surface here, not vanish when the writer drops
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp_path, &path)?;

        Ok(())
    }

    /// Delete a collection's snapshot file
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.snapshot_path(name);
        if !path.exists() {
            return Err(Error::collection_not_found(name));
        }
        fs::remove_file(&path)?;
        Ok(())
    }
}
