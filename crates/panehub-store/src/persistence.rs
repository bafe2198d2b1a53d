//! File-backed persistence: atomic write-then-rename, schema migration, and
//! malformed-file recovery, against an injected root directory rather than
//! a hard-coded platform config path.

use crate::error::{StoreError, StoreResult};
use crate::model::{migrate_workspace, WorkspaceData, CURRENT_SCHEMA_VERSION};
use panehub_ids::WorkspaceId;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Loads and saves the canonical workspace file. Hosts/tests inject the
/// root path rather than the core resolving `dirs::config_dir()` itself —
/// the "singleton to explicit dependency" redesign applied to persistence.
pub trait Persistor: Send + Sync {
    fn load_workspace(&self, workspace_id: WorkspaceId) -> StoreResult<WorkspaceData>;
    fn save_workspace(&self, data: &WorkspaceData) -> StoreResult<()>;
}

/// Plain-filesystem `Persistor`. One JSON file per workspace id under
/// `root`, written via `<path>.tmp` + `rename` so a crash mid-write never
/// corrupts the previous good file.
pub struct FileSystemPersistor {
    root: PathBuf,
}

impl FileSystemPersistor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Convenience constructor using `dirs::config_dir()`-based resolution,
    /// for hosts that want the platform default instead of an explicit
    /// root.
    pub fn with_default_root(app_name: &str) -> StoreResult<Self> {
        let base = dirs::config_dir().ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no platform config directory",
            ))
        })?;
        Ok(Self::new(base.join(app_name)))
    }

    fn workspace_path(&self, workspace_id: WorkspaceId) -> PathBuf {
        self.root.join(format!("{workspace_id}.workspace.json"))
    }

    fn atomic_write(path: &Path, contents: &str) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl Persistor for FileSystemPersistor {
    fn load_workspace(&self, workspace_id: WorkspaceId) -> StoreResult<WorkspaceData> {
        let path = self.workspace_path(workspace_id);
        if !path.exists() {
            return Ok(WorkspaceData::empty(workspace_id));
        }
        let raw = std::fs::read_to_string(&path)?;
        let data = match serde_json::from_str::<WorkspaceData>(&raw) {
            Ok(data) => data,
            Err(parse_err) => {
                log::warn!(
                    target: "panehub_store",
                    "workspace file {path:?} failed direct parse ({parse_err}); attempting field recovery"
                );
                recover_workspace_from_json(&raw, workspace_id)?
            }
        };
        Ok(migrate_workspace(data))
    }

    fn save_workspace(&self, data: &WorkspaceData) -> StoreResult<()> {
        let path = self.workspace_path(data.workspace_id);
        let json = serde_json::to_string_pretty(data)?;
        Self::atomic_write(&path, &json)
    }
}

/// Field-by-field recovery over a generic JSON value, mirroring
/// `recover_settings_from_json`: rather than discarding a whole file
/// because one field is malformed, pull out every field independently and
/// log which ones were dropped.
fn recover_workspace_from_json(raw: &str, workspace_id: WorkspaceId) -> StoreResult<WorkspaceData> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let mut data = WorkspaceData::empty(workspace_id);

    if let Some(v) = value.get("schemaVersion").and_then(|v| v.as_u64()) {
        data.schema_version = v as u32;
    } else {
        log::warn!(target: "panehub_store", "dropping malformed schemaVersion field");
    }

    match value.get("repos").cloned().map(serde_json::from_value) {
        Some(Ok(repos)) => data.repos = repos,
        Some(Err(e)) => log::warn!(target: "panehub_store", "dropping malformed repos field: {e}"),
        None => {}
    }

    match value.get("tabs").cloned().map(serde_json::from_value) {
        Some(Ok(tabs)) => data.tabs = tabs,
        Some(Err(e)) => log::warn!(target: "panehub_store", "dropping malformed tabs field: {e}"),
        None => {}
    }

    match value.get("panes").cloned().map(serde_json::from_value) {
        Some(Ok(panes)) => data.panes = panes,
        Some(Err(e)) => log::warn!(target: "panehub_store", "dropping malformed panes field: {e}"),
        None => {}
    }

    if let Some(active) = value.get("activeTabId") {
        match serde_json::from_value(active.clone()) {
            Ok(id) => data.active_tab_id = id,
            Err(e) => log::warn!(target: "panehub_store", "dropping malformed activeTabId field: {e}"),
        }
    }

    data.schema_version = data.schema_version.min(CURRENT_SCHEMA_VERSION);
    Ok(data)
}

/// Debounces flushes of a `WorkspaceStore`: a `tick()` only performs a save
/// once `debounce` has elapsed since the store was last marked dirty.
/// `flush_now` bypasses the debounce for shutdown, so an unconditional
/// flush on exit never waits out the debounce window.
pub struct PersistenceDriver {
    persistor: Box<dyn Persistor>,
    debounce: Duration,
    dirty_since: Option<Instant>,
}

impl PersistenceDriver {
    pub fn new(persistor: Box<dyn Persistor>) -> Self {
        Self { persistor, debounce: Duration::from_millis(500), dirty_since: None }
    }

    pub fn with_debounce(persistor: Box<dyn Persistor>, debounce: Duration) -> Self {
        Self { persistor, debounce, dirty_since: None }
    }

    pub fn notify_dirty(&mut self) {
        if self.dirty_since.is_none() {
            self.dirty_since = Some(Instant::now());
        }
    }

    /// Called on every debounce-interval tick. Flushes and returns `true`
    /// if `data` was dirty and the debounce window has elapsed.
    pub fn tick(&mut self, data: &WorkspaceData, dirty: bool) -> StoreResult<bool> {
        if !dirty {
            self.dirty_since = None;
            return Ok(false);
        }
        let elapsed = self.dirty_since.map(|t| t.elapsed()).unwrap_or(self.debounce);
        if elapsed < self.debounce {
            return Ok(false);
        }
        self.persistor.save_workspace(data)?;
        self.dirty_since = None;
        Ok(true)
    }

    /// Bypasses the debounce window unconditionally; used at shutdown.
    pub fn flush_now(&mut self, data: &WorkspaceData) -> StoreResult<()> {
        self.persistor.save_workspace(data)?;
        self.dirty_since = None;
        Ok(())
    }

    pub fn load(&self, workspace_id: WorkspaceId) -> StoreResult<WorkspaceData> {
        self.persistor.load_workspace(workspace_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panehub_ids::IdAllocator;

    #[test]
    fn round_trips_empty_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let persistor = FileSystemPersistor::new(dir.path());
        let alloc = IdAllocator::new();
        let id = alloc.allocate();
        let data = WorkspaceData::empty(id);
        persistor.save_workspace(&data).unwrap();
        let loaded = persistor.load_workspace(id).unwrap();
        assert_eq!(loaded.workspace_id, id);
        assert_eq!(loaded.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn missing_file_yields_empty_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let persistor = FileSystemPersistor::new(dir.path());
        let alloc = IdAllocator::new();
        let id = alloc.allocate();
        let loaded = persistor.load_workspace(id).unwrap();
        assert!(loaded.tabs.is_empty());
    }

    #[test]
    fn recovers_partially_malformed_file() {
        let alloc = IdAllocator::new();
        let id = alloc.allocate();
        let raw = format!(
            r#"{{"schemaVersion": 1, "workspaceId": "{id}", "repos": "not-an-array", "tabs": [], "panes": {{}}, "activeTabId": null}}"#
        );
        let recovered = recover_workspace_from_json(&raw, id).unwrap();
        assert!(recovered.repos.is_empty());
        assert!(recovered.tabs.is_empty());
    }

    #[test]
    fn recovery_clamps_a_schema_version_from_the_future() {
        let alloc = IdAllocator::new();
        let id = alloc.allocate();
        let raw = format!(
            r#"{{"schemaVersion": {}, "workspaceId": "{id}", "repos": [], "tabs": [], "panes": {{}}, "activeTabId": null}}"#,
            CURRENT_SCHEMA_VERSION + 1
        );
        let recovered = recover_workspace_from_json(&raw, id).unwrap();
        assert_eq!(recovered.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn atomic_write_leaves_previous_file_on_rename() {
        let dir = tempfile::tempdir().unwrap();
        let persistor = FileSystemPersistor::new(dir.path());
        let alloc = IdAllocator::new();
        let id = alloc.allocate();
        let data = WorkspaceData::empty(id);
        persistor.save_workspace(&data).unwrap();
        let path = persistor.workspace_path(id);
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
