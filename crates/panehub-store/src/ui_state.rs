//! The UI file (`{workspaceId}.ui.json`): sidebar expansion state, checkout
//! colors, and filter text. Serializes independently of the canonical
//! workspace and derived cache files, per §6's three-file split — nothing
//! here participates in invariants 1-8, so it lives behind its own
//! `Persistor`-shaped trait rather than folded into `WorkspaceData`.

use crate::error::StoreResult;
use panehub_ids::WorkspaceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    #[serde(default)]
    pub expanded_groups: Vec<String>,
    #[serde(default)]
    pub checkout_colors: HashMap<String, String>,
    #[serde(default)]
    pub filter_text: String,
    #[serde(default)]
    pub is_filter_visible: bool,
}

pub trait UiStatePersistor: Send + Sync {
    fn load_ui_state(&self, workspace_id: WorkspaceId) -> StoreResult<UiState>;
    fn save_ui_state(&self, workspace_id: WorkspaceId, state: &UiState) -> StoreResult<()>;
}

pub struct FileSystemUiStatePersistor {
    root: PathBuf,
}

impl FileSystemUiStatePersistor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn ui_path(&self, workspace_id: WorkspaceId) -> PathBuf {
        self.root.join(format!("{workspace_id}.ui.json"))
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

impl UiStatePersistor for FileSystemUiStatePersistor {
    fn load_ui_state(&self, workspace_id: WorkspaceId) -> StoreResult<UiState> {
        let path = self.ui_path(workspace_id);
        if !path.exists() {
            return Ok(UiState::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(state),
            Err(err) => {
                log::warn!(target: "panehub_store", "ui file {path:?} failed to parse ({err}); starting from defaults");
                Ok(UiState::default())
            }
        }
    }

    fn save_ui_state(&self, workspace_id: WorkspaceId, state: &UiState) -> StoreResult<()> {
        let path = self.ui_path(workspace_id);
        let json = serde_json::to_string_pretty(state)?;
        Self::atomic_write(&path, &json)
    }
}
