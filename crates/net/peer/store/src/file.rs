//! JSON file-based blacklist store with atomic writes.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::debug;

use super::{BlacklistStore, BlacklistStoreError, NetPeerId};

/// JSON file store. Loaded to memory on startup; every change is written through.
#[derive(Debug)]
pub struct FileBlacklistStore<Id: NetPeerId> {
    path: PathBuf,
    peers: RwLock<HashSet<Id>>,
}

impl<Id: NetPeerId> FileBlacklistStore<Id> {
    /// Load existing file or create empty store.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, BlacklistStoreError> {
        let path = path.into();
        let peers = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            HashSet::new()
        };

        debug!(path = %path.display(), count = peers.len(), "loaded blacklist");

        Ok(Self {
            path,
            peers: RwLock::new(peers),
        })
    }

    /// Create store, making parent directories if needed.
    pub fn new_with_create_dir(path: impl Into<PathBuf>) -> Result<Self, BlacklistStoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::new(path)
    }

    fn load_from_file(path: &Path) -> Result<HashSet<Id>, BlacklistStoreError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let ids: Vec<Id> = serde_json::from_reader(reader)
            .map_err(|e| BlacklistStoreError::Serialization(e.to_string()))?;

        Ok(ids.into_iter().collect())
    }

    fn save_to_file(&self, peers: &HashSet<Id>) -> Result<(), BlacklistStoreError> {
        let ids: Vec<&Id> = peers.iter().collect();

        // Write to temp file first, then rename (atomic)
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &ids)
                .map_err(|e| BlacklistStoreError::Serialization(e.to_string()))?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<Id: NetPeerId> BlacklistStore<Id> for FileBlacklistStore<Id> {
    fn is_blacklisted(&self, id: &Id) -> Result<bool, BlacklistStoreError> {
        Ok(self.peers.read().contains(id))
    }

    fn add(&self, id: &Id) -> Result<(), BlacklistStoreError> {
        let mut peers = self.peers.write();
        if !peers.insert(id.clone()) {
            return Ok(());
        }
        // Keep memory and disk in step: undo the insert if the write fails.
        if let Err(e) = self.save_to_file(&peers) {
            peers.remove(id);
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, id: &Id) -> Result<(), BlacklistStoreError> {
        let mut peers = self.peers.write();
        if !peers.remove(id) {
            return Ok(());
        }
        if let Err(e) = self.save_to_file(&peers) {
            peers.insert(id.clone());
            return Err(e);
        }
        Ok(())
    }

    fn blacklisted(&self) -> Result<Vec<Id>, BlacklistStoreError> {
        Ok(self.peers.read().iter().cloned().collect())
    }
}
