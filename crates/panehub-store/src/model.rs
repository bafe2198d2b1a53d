//! Persisted data model: repos, worktrees, panes, tabs, arrangements,
//! drawers, and close snapshots. Mirrors the shape of the persisted
//! workspace file described by the external interfaces.

use panehub_ids::{ArrangementId, PaneId, RepoId, TabId, WorktreeId};
use panehub_layout::Layout;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worktree {
    pub id: WorktreeId,
    pub name: String,
    pub path: String,
    pub branch: Option<String>,
    pub status: Option<String>,
    pub is_main_worktree: bool,
    pub stable_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repo {
    pub id: RepoId,
    pub name: String,
    pub repo_path: String,
    pub stable_key: String,
    pub worktrees: Vec<Worktree>,
    pub availability: Availability,
}

impl Repo {
    pub fn worktree(&self, id: WorktreeId) -> Option<&Worktree> {
        self.worktrees.iter().find(|w| w.id == id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    Persistent,
    Ephemeral,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Residency {
    Active,
    Backgrounded,
}

/// Tagged content a pane hosts. Opaque `state` blobs are host-defined JSON
/// the core never interprets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PaneContent {
    Terminal,
    Webview { state: serde_json::Value },
    CodeViewer { state: serde_json::Value },
    BridgePanel { state: serde_json::Value },
    Unsupported,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneMetadata {
    pub title: String,
    #[serde(default)]
    pub facets: Vec<String>,
    pub cwd: Option<String>,
    pub worktree_id: Option<WorktreeId>,
    pub repo_id: Option<RepoId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drawer {
    pub layout: Layout,
    pub minimized_pane_ids: Vec<PaneId>,
    pub active_drawer_pane_id: Option<PaneId>,
}

impl Drawer {
    pub fn empty() -> Self {
        Self { layout: Layout::empty(), minimized_pane_ids: Vec::new(), active_drawer_pane_id: None }
    }

    pub fn visible_pane_ids(&self) -> Vec<PaneId> {
        self.layout
            .visible_pane_ids()
            .into_iter()
            .filter(|id| !self.minimized_pane_ids.contains(id))
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pane {
    pub id: PaneId,
    pub content: PaneContent,
    pub provider: String,
    pub lifetime: Lifetime,
    pub residency: Residency,
    pub parent_pane_id: Option<PaneId>,
    pub is_drawer_child: bool,
    pub drawer: Option<Drawer>,
    pub metadata: PaneMetadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arrangement {
    pub id: ArrangementId,
    pub name: String,
    pub is_default: bool,
    pub layout: Layout,
    pub minimized_pane_ids: Vec<PaneId>,
}

impl Arrangement {
    pub fn visible_pane_ids(&self) -> Vec<PaneId> {
        self.layout
            .visible_pane_ids()
            .into_iter()
            .filter(|id| !self.minimized_pane_ids.contains(id))
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub arrangements: Vec<Arrangement>,
    pub active_arrangement_id: ArrangementId,
    pub active_pane_id: Option<PaneId>,
    pub zoomed_pane_id: Option<PaneId>,
}

impl Tab {
    pub fn active_arrangement(&self) -> Option<&Arrangement> {
        self.arrangements.iter().find(|a| a.id == self.active_arrangement_id)
    }

    pub fn active_arrangement_mut(&mut self) -> Option<&mut Arrangement> {
        let id = self.active_arrangement_id;
        self.arrangements.iter_mut().find(|a| a.id == id)
    }

    pub fn arrangement_mut(&mut self, id: ArrangementId) -> Option<&mut Arrangement> {
        self.arrangements.iter_mut().find(|a| a.id == id)
    }

    /// Union of pane ids across every arrangement's layout.
    pub fn pane_ids(&self) -> Vec<PaneId> {
        let mut out = Vec::new();
        for arrangement in &self.arrangements {
            for id in arrangement.layout.visible_pane_ids() {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ReinsertHint {
    pub direction: panehub_layout::SplitDirection,
    pub position: panehub_layout::InsertPosition,
}

#[derive(Clone, Debug)]
pub enum CloseSnapshot {
    TabClose { tab: Tab, panes: Vec<Pane> },
    PaneClose {
        tab_id: TabId,
        pane: Pane,
        drawer_child_panes: Vec<Pane>,
        anchor_pane_id: Option<PaneId>,
        reinsert_hint: Option<ReinsertHint>,
    },
}

impl CloseSnapshot {
    /// The pane ids this snapshot owns, in restore order (pane first, then
    /// drawer children), used by undo-GC reachability checks.
    pub fn owned_pane_ids(&self) -> Vec<PaneId> {
        match self {
            CloseSnapshot::TabClose { panes, .. } => panes.iter().map(|p| p.id).collect(),
            CloseSnapshot::PaneClose { pane, drawer_child_panes, .. } => {
                let mut out = vec![pane.id];
                out.extend(drawer_child_panes.iter().map(|p| p.id));
                out
            }
        }
    }
}

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// The serializable payload of a workspace; everything `WorkspaceStore`
/// keeps that isn't runtime-only bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceData {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub workspace_id: panehub_ids::WorkspaceId,
    #[serde(default)]
    pub repos: Vec<Repo>,
    #[serde(default)]
    pub tabs: Vec<Tab>,
    pub active_tab_id: Option<TabId>,
    #[serde(default)]
    pub panes: HashMap<PaneId, Pane>,
}

fn default_schema_version() -> u32 {
    0
}

impl WorkspaceData {
    pub fn empty(workspace_id: panehub_ids::WorkspaceId) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            workspace_id,
            repos: Vec::new(),
            tabs: Vec::new(),
            active_tab_id: None,
            panes: HashMap::new(),
        }
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn tab_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    pub fn repo_mut(&mut self, id: RepoId) -> Option<&mut Repo> {
        self.repos.iter_mut().find(|r| r.id == id)
    }

    /// Which tab, if any, currently has `pane_id` placed in a layout.
    pub fn tab_owning_pane(&self, pane_id: PaneId) -> Option<TabId> {
        self.tabs.iter().find(|t| t.pane_ids().contains(&pane_id)).map(|t| t.id)
    }
}

/// Applies the `migrate_settings`-style upgrade pass so files written by an
/// older binary still load. Version 0 denotes pre-versioning files.
pub fn migrate_workspace(mut data: WorkspaceData) -> WorkspaceData {
    if data.schema_version == 0 {
        log::info!(target: "panehub_store", "migrating workspace {} from schema 0 to 1", data.workspace_id);
        data.schema_version = 1;
    }
    data
}
