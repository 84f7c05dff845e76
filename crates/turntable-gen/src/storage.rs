//! Artifact storage
//!
//! Persisted views are addressed by a relative location such as
//! `{job_id}/views/90.png`. Only a write operation is required of a store.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use turntable_core::{Result, TurntableError};

/// Default root directory for on-disk artifacts
pub const DEFAULT_STORAGE_ROOT: &str = "assets_storage";

/// A place generated artifacts can be written to
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` at `location` and return where they ended up
    fn put(&self, location: &str, bytes: &[u8]) -> Result<String>;
}

/// Relative location of one persisted view
pub fn view_location(job_id: &str, angle: u16, extension: &str) -> String {
    format!("{}/views/{}.{}", job_id, angle, extension)
}

/// File-system store rooted at a directory
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, location: &str) -> Result<PathBuf> {
        let relative = Path::new(location);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || location.is_empty() {
            return Err(TurntableError::StorageError(format!(
                "Refusing to write outside the storage root: {}",
                location
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, location: &str, bytes: &[u8]) -> Result<String> {
        let path = self.resolve(location)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(path.to_string_lossy().to_string())
    }
}

/// In-memory store, for tests and dry runs
#[derive(Default)]
pub struct MemoryArtifactStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &str) -> Option<Vec<u8>> {
        self.entries.lock().ok()?.get(location).cloned()
    }

    pub fn locations(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, location: &str, bytes: &[u8]) -> Result<String> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TurntableError::StorageError("memory store poisoned".to_string()))?;
        entries.insert(location.to_string(), bytes.to_vec());
        Ok(location.to_string())
    }
}
