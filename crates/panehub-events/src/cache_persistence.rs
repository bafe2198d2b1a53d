//! File-backed persistence for the derived cache file
//! (`{workspaceId}.cache.json`), mirroring `panehub_store`'s
//! write-then-rename `Persistor` shape for the canonical workspace file.
//! Kept as its own file because the cache serializes independently of the
//! canonical store per §6's external interfaces.

use crate::cache::DerivedCache;
use panehub_ids::WorkspaceId;
use std::io;
use std::path::{Path, PathBuf};

pub trait CachePersistor: Send + Sync {
    fn load_cache(&self, workspace_id: WorkspaceId) -> io::Result<DerivedCache>;
    fn save_cache(&self, workspace_id: WorkspaceId, cache: &DerivedCache) -> io::Result<()>;
}

pub struct FileSystemCachePersistor {
    root: PathBuf,
}

impl FileSystemCachePersistor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn cache_path(&self, workspace_id: WorkspaceId) -> PathBuf {
        self.root.join(format!("{workspace_id}.cache.json"))
    }

    fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, path)
    }
}

impl CachePersistor for FileSystemCachePersistor {
    fn load_cache(&self, workspace_id: WorkspaceId) -> io::Result<DerivedCache> {
        let path = self.cache_path(workspace_id);
        if !path.exists() {
            return Ok(DerivedCache::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&raw) {
            Ok(cache) => Ok(cache),
            Err(err) => {
                log::warn!(target: "panehub_events", "cache file {path:?} failed to parse ({err}); starting from an empty cache");
                Ok(DerivedCache::default())
            }
        }
    }

    fn save_cache(&self, workspace_id: WorkspaceId, cache: &DerivedCache) -> io::Result<()> {
        let path = self.cache_path(workspace_id);
        let json = serde_json::to_string_pretty(cache)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Self::atomic_write(&path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panehub_ids::IdAllocator;

    #[test]
    fn round_trips_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let persistor = FileSystemCachePersistor::new(dir.path());
        let id: WorkspaceId = IdAllocator::new().allocate();
        persistor.save_cache(id, &DerivedCache::default()).unwrap();
        let loaded = persistor.load_cache(id).unwrap();
        assert_eq!(loaded, DerivedCache::default());
    }

    #[test]
    fn missing_cache_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let persistor = FileSystemCachePersistor::new(dir.path());
        let id: WorkspaceId = IdAllocator::new().allocate();
        assert_eq!(persistor.load_cache(id).unwrap(), DerivedCache::default());
    }

    #[test]
    fn malformed_cache_file_recovers_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let persistor = FileSystemCachePersistor::new(dir.path());
        let id: WorkspaceId = IdAllocator::new().allocate();
        std::fs::write(dir.path().join(format!("{id}.cache.json")), "not json").unwrap();
        assert_eq!(persistor.load_cache(id).unwrap(), DerivedCache::default());
    }
}
