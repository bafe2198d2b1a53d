//! Single-writer canonical state: a persisted payload plus non-persisted
//! runtime bookkeeping (dirty flag, view revision counter), mutated only
//! through named, path-based methods rather than direct field access.

use crate::error::{StoreError, StoreResult};
use crate::model::{
    Arrangement, Availability, CloseSnapshot, Drawer, Lifetime, Pane, PaneContent, PaneMetadata, ReinsertHint,
    Residency, Tab, WorkspaceData,
};
use panehub_ids::{ArrangementId, IdAllocator, PaneId, RepoId, TabId, WorktreeId};
use panehub_layout::{InsertPosition, Layout, SplitDirection};

/// Owns `WorkspaceData` plus non-persisted bookkeeping: the dirty flag, the
/// monotonic view-revision counter, and the pre-persist hook the
/// coordinator uses to sync ephemeral view state back into pane models
/// before a flush.
pub struct WorkspaceStore {
    data: WorkspaceData,
    dirty: bool,
    view_revision: u64,
    id_allocator: IdAllocator,
    pre_persist_hook: Option<Box<dyn FnMut(&mut WorkspaceData) + Send>>,
}

impl WorkspaceStore {
    pub fn new(data: WorkspaceData, id_allocator: IdAllocator) -> Self {
        Self { data, dirty: false, view_revision: 0, id_allocator, pre_persist_hook: None }
    }

    pub fn data(&self) -> &WorkspaceData {
        &self.data
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn view_revision(&self) -> u64 {
        self.view_revision
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn set_pre_persist_hook(&mut self, hook: Box<dyn FnMut(&mut WorkspaceData) + Send>) {
        self.pre_persist_hook = Some(hook);
    }

    /// Runs the pre-persist hook, if any, possibly dirtying the store —
    /// this is why an unconditional flush is still needed at shutdown even
    /// when `dirty == false`.
    pub fn run_pre_persist_hook(&mut self) {
        if let Some(hook) = self.pre_persist_hook.as_mut() {
            hook(&mut self.data);
            self.dirty = true;
        }
    }

    fn touch(&mut self) {
        self.dirty = true;
    }

    fn touch_shape(&mut self) {
        self.dirty = true;
        self.view_revision += 1;
    }

    // ---- panes -----------------------------------------------------

    pub fn create_pane(
        &mut self,
        content: PaneContent,
        provider: impl Into<String>,
        lifetime: Lifetime,
        residency: Residency,
        metadata: PaneMetadata,
    ) -> Pane {
        let pane = Pane {
            id: self.id_allocator.allocate(),
            content,
            provider: provider.into(),
            lifetime,
            residency,
            parent_pane_id: None,
            is_drawer_child: false,
            drawer: None,
            metadata,
        };
        self.data.panes.insert(pane.id, pane.clone());
        self.touch();
        pane
    }

    pub fn pane(&self, id: PaneId) -> Option<&Pane> {
        self.data.panes.get(&id)
    }

    /// True if `pane_id` appears in any tab's layout (including drawers).
    pub fn pane_is_referenced(&self, pane_id: PaneId) -> bool {
        for tab in &self.data.tabs {
            if tab.pane_ids().contains(&pane_id) {
                return true;
            }
        }
        for pane in self.data.panes.values() {
            if let Some(drawer) = &pane.drawer {
                if drawer.layout.contains(pane_id) {
                    return true;
                }
            }
        }
        false
    }

    /// Re-anchors `tab_id`'s `activePaneId`/`zoomedPaneId` after a mutation
    /// may have removed the pane either pointed at, or switched which
    /// arrangement is active. `activePaneId` falls back to the first
    /// visible leaf of the (possibly new) active arrangement, or `None`.
    /// `zoomedPaneId` is re-synced from the active arrangement's own zoom
    /// state (each `Layout` tracks its own zoomed leaf; `Tab.zoomedPaneId`
    /// mirrors whichever arrangement is currently active, matching the
    /// spec's wire schema), then cleared if that pane isn't visible. No-op
    /// if `tab_id` doesn't resolve or has no active arrangement. Called
    /// after every store operation that can remove a pane from, or change,
    /// a tab's active arrangement, so invariants §3-{4,5} never observe an
    /// intermediate dangling state.
    fn reconcile_active_pointers(&mut self, tab_id: TabId) {
        let WorkspaceData { tabs, panes, .. } = &mut self.data;
        let Some(tab) = tabs.iter_mut().find(|t| t.id == tab_id) else { return };
        let Some(arrangement) = tab.arrangements.iter().find(|a| a.id == tab.active_arrangement_id) else { return };
        // Invariant 4 talks about the layout's leaves (minimized panes are
        // still leaves); invariant 5 talks about the *visible* (non-
        // minimized) set. Use each where the spec does.
        let leaves = arrangement.layout.visible_pane_ids();
        let visible = arrangement.visible_pane_ids();
        let zoomed = arrangement.layout.zoomed();

        let active_is_reachable = tab.active_pane_id.is_some_and(|p| {
            leaves.contains(&p)
                || panes
                    .get(&p)
                    .is_some_and(|pane| pane.is_drawer_child && pane.parent_pane_id.is_some_and(|parent| leaves.contains(&parent)))
        });
        if !active_is_reachable {
            tab.active_pane_id = visible.first().copied().or_else(|| leaves.first().copied());
        }

        tab.zoomed_pane_id = zoomed.filter(|z| visible.contains(z));
    }

    // ---- repos / worktrees --------------------------------------------

    /// Flips a repo's `availability` without touching any pane that
    /// references it. Panes keep their `repoId`/`worktreeId` metadata even
    /// once `Unavailable`, so closing their owning tab still produces a
    /// coherent undo snapshot; only `purge_orphaned_pane` or undo-stack GC
    /// physically deletes a pane tied to a gone worktree.
    pub fn mark_repo_availability(&mut self, repo_id: RepoId, availability: Availability) -> StoreResult<()> {
        let repo = self.data.repo_mut(repo_id).ok_or(StoreError::RepoNotFound(repo_id))?;
        repo.availability = availability;
        self.touch();
        Ok(())
    }

    pub fn upsert_worktree(&mut self, repo_id: RepoId, worktree: crate::model::Worktree) -> StoreResult<()> {
        let repo = self.data.repo_mut(repo_id).ok_or(StoreError::RepoNotFound(repo_id))?;
        match repo.worktrees.iter_mut().find(|w| w.id == worktree.id) {
            Some(existing) => *existing = worktree,
            None => repo.worktrees.push(worktree),
        }
        self.touch();
        Ok(())
    }

    /// Drops a worktree record entirely. Callers are expected to have
    /// already marked the owning repo (or the worktree's panes) in a way
    /// that reflects the removal; the store does not cascade into panes.
    pub fn remove_worktree(&mut self, repo_id: RepoId, worktree_id: WorktreeId) -> StoreResult<()> {
        let repo = self.data.repo_mut(repo_id).ok_or(StoreError::RepoNotFound(repo_id))?;
        repo.worktrees.retain(|w| w.id != worktree_id);
        self.touch();
        Ok(())
    }

    pub fn append_repo(&mut self, repo: crate::model::Repo) {
        self.data.repos.push(repo);
        self.touch();
    }

    // ---- tabs --------------------------------------------------------

    pub fn append_tab(&mut self, tab: Tab) {
        self.data.tabs.push(tab);
        self.touch_shape();
    }

    pub fn remove_tab(&mut self, tab_id: TabId) -> StoreResult<Tab> {
        let idx = self.data.tabs.iter().position(|t| t.id == tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let tab = self.data.tabs.remove(idx);
        if self.data.active_tab_id == Some(tab_id) {
            self.data.active_tab_id = self.data.tabs.first().map(|t| t.id);
        }
        self.touch_shape();
        Ok(tab)
    }

    pub fn move_tab(&mut self, from_id: TabId, to_index: usize) -> StoreResult<()> {
        let idx = self.data.tabs.iter().position(|t| t.id == from_id).ok_or(StoreError::TabNotFound(from_id))?;
        let tab = self.data.tabs.remove(idx);
        let clamped = to_index.min(self.data.tabs.len());
        self.data.tabs.insert(clamped, tab);
        self.touch_shape();
        Ok(())
    }

    pub fn move_tab_by_delta(&mut self, tab_id: TabId, delta: i64) -> StoreResult<()> {
        let idx = self.data.tabs.iter().position(|t| t.id == tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let new_idx = (idx as i64 + delta).clamp(0, self.data.tabs.len() as i64 - 1) as usize;
        self.move_tab(tab_id, new_idx)
    }

    pub fn set_active_tab(&mut self, tab_id: TabId) -> StoreResult<()> {
        if self.data.tab(tab_id).is_none() {
            return Err(StoreError::TabNotFound(tab_id));
        }
        self.data.active_tab_id = Some(tab_id);
        self.touch();
        Ok(())
    }

    pub fn set_active_pane(&mut self, tab_id: TabId, pane_id: Option<PaneId>) -> StoreResult<()> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        tab.active_pane_id = pane_id;
        self.touch();
        Ok(())
    }

    pub fn set_active_drawer_pane(&mut self, parent_pane_id: PaneId, drawer_pane_id: Option<PaneId>) -> StoreResult<()> {
        let pane = self.data.panes.get_mut(&parent_pane_id).ok_or(StoreError::PaneNotFound(parent_pane_id))?;
        let drawer = pane.drawer.as_mut().ok_or(StoreError::PreconditionFailed("pane has no drawer"))?;
        drawer.active_drawer_pane_id = drawer_pane_id;
        self.touch();
        Ok(())
    }

    /// Opens an empty drawer on `parent_pane_id` if it has none, or closes
    /// (drops) an existing empty drawer. A drawer with children cannot be
    /// toggled closed this way — remove its children first.
    pub fn toggle_drawer(&mut self, parent_pane_id: PaneId) -> StoreResult<()> {
        let pane = self.data.panes.get_mut(&parent_pane_id).ok_or(StoreError::PaneNotFound(parent_pane_id))?;
        match &pane.drawer {
            None => pane.drawer = Some(Drawer::empty()),
            Some(drawer) if drawer.layout.is_empty() => pane.drawer = None,
            Some(_) => return Err(StoreError::PreconditionFailed("drawer still has children")),
        }
        self.touch_shape();
        Ok(())
    }

    /// Places `pane_id` (already in the store, unplaced) as the first
    /// child of `parent_pane_id`'s drawer, opening the drawer if needed.
    pub fn add_drawer_pane(&mut self, parent_pane_id: PaneId, pane_id: PaneId) -> StoreResult<()> {
        if !self.data.panes.contains_key(&pane_id) {
            return Err(StoreError::PaneNotFound(pane_id));
        }
        if self.pane_is_referenced(pane_id) {
            return Err(StoreError::PaneAlreadyPlaced(pane_id));
        }
        let pane = self.data.panes.get_mut(&parent_pane_id).ok_or(StoreError::PaneNotFound(parent_pane_id))?;
        let drawer = pane.drawer.get_or_insert_with(Drawer::empty);
        if !drawer.layout.is_empty() {
            return Err(StoreError::PreconditionFailed("drawer already has children; use insert_drawer_pane"));
        }
        drawer.layout = Layout::single(pane_id);
        drawer.active_drawer_pane_id = Some(pane_id);
        let child = self.data.panes.get_mut(&pane_id).unwrap();
        child.parent_pane_id = Some(parent_pane_id);
        child.is_drawer_child = true;
        self.touch_shape();
        Ok(())
    }

    pub fn insert_drawer_pane(
        &mut self,
        parent_pane_id: PaneId,
        pane_id: PaneId,
        at: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    ) -> StoreResult<()> {
        if self.pane_is_referenced(pane_id) {
            return Err(StoreError::PaneAlreadyPlaced(pane_id));
        }
        let allocator = self.id_allocator;
        let pane = self.data.panes.get_mut(&parent_pane_id).ok_or(StoreError::PaneNotFound(parent_pane_id))?;
        let drawer = pane.drawer.as_mut().ok_or(StoreError::PreconditionFailed("pane has no drawer"))?;
        if !drawer.layout.contains(at) {
            return Err(StoreError::PreconditionFailed("target pane is not a leaf of the drawer layout"));
        }
        drawer.layout = drawer.layout.insert(&allocator, pane_id, at, direction, position);
        let child = self.data.panes.get_mut(&pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
        child.parent_pane_id = Some(parent_pane_id);
        child.is_drawer_child = true;
        self.touch_shape();
        Ok(())
    }

    /// Removes `pane_id` from its parent's drawer layout. The pane record
    /// itself is left in the store; callers (the coordinator) decide
    /// whether to tear it down or reparent it.
    pub fn remove_drawer_pane(&mut self, parent_pane_id: PaneId, pane_id: PaneId) -> StoreResult<()> {
        let pane = self.data.panes.get_mut(&parent_pane_id).ok_or(StoreError::PaneNotFound(parent_pane_id))?;
        let drawer = pane.drawer.as_mut().ok_or(StoreError::PreconditionFailed("pane has no drawer"))?;
        if !drawer.layout.contains(pane_id) {
            return Err(StoreError::PaneNotFound(pane_id));
        }
        let (new_layout, _) = drawer.layout.remove(pane_id);
        drawer.layout = new_layout;
        drawer.minimized_pane_ids.retain(|id| *id != pane_id);
        if drawer.active_drawer_pane_id == Some(pane_id) {
            drawer.active_drawer_pane_id = drawer.layout.visible_pane_ids().first().copied();
        }
        if let Some(child) = self.data.panes.get_mut(&pane_id) {
            child.parent_pane_id = None;
            child.is_drawer_child = false;
        }
        if let Some(tab_id) = self.data.tab_owning_pane(parent_pane_id) {
            self.reconcile_active_pointers(tab_id);
        }
        self.touch_shape();
        Ok(())
    }

    pub fn move_drawer_pane(
        &mut self,
        parent_pane_id: PaneId,
        pane_id: PaneId,
        at: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    ) -> StoreResult<()> {
        self.remove_drawer_pane(parent_pane_id, pane_id)?;
        self.insert_drawer_pane(parent_pane_id, pane_id, at, direction, position)
    }

    pub fn resize_drawer_pane(&mut self, parent_pane_id: PaneId, split_id: panehub_ids::SplitId, ratio: f32) -> StoreResult<()> {
        let pane = self.data.panes.get_mut(&parent_pane_id).ok_or(StoreError::PaneNotFound(parent_pane_id))?;
        let drawer = pane.drawer.as_mut().ok_or(StoreError::PreconditionFailed("pane has no drawer"))?;
        drawer.layout = drawer.layout.resize(split_id, ratio);
        self.touch();
        Ok(())
    }

    pub fn equalize_drawer_panes(&mut self, parent_pane_id: PaneId) -> StoreResult<()> {
        let pane = self.data.panes.get_mut(&parent_pane_id).ok_or(StoreError::PaneNotFound(parent_pane_id))?;
        let drawer = pane.drawer.as_mut().ok_or(StoreError::PreconditionFailed("pane has no drawer"))?;
        drawer.layout = drawer.layout.equalize();
        self.touch();
        Ok(())
    }

    // ---- layout mutation ----------------------------------------------

    pub fn insert_pane(
        &mut self,
        pane_id: PaneId,
        in_tab: TabId,
        at: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    ) -> StoreResult<()> {
        if self.pane_is_referenced(pane_id) {
            return Err(StoreError::PaneAlreadyPlaced(pane_id));
        }
        if !self.data.panes.contains_key(&pane_id) {
            return Err(StoreError::PaneNotFound(pane_id));
        }
        let allocator = self.id_allocator;
        let tab = self.data.tab_mut(in_tab).ok_or(StoreError::TabNotFound(in_tab))?;
        let arrangement = tab.active_arrangement_mut().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
        if !arrangement.layout.contains(at) {
            return Err(StoreError::PreconditionFailed("target pane is not a leaf of the active layout"));
        }
        arrangement.layout = arrangement.layout.insert(&allocator, pane_id, at, direction, position);
        self.touch_shape();
        Ok(())
    }

    /// Removes `pane_id` from its tab's layout, creating a new single-pane
    /// tab for it, appended to the tab order.
    pub fn extract_pane(&mut self, pane_id: PaneId, from_tab: TabId) -> StoreResult<TabId> {
        let tab = self.data.tab_mut(from_tab).ok_or(StoreError::TabNotFound(from_tab))?;
        let arrangement = tab.active_arrangement_mut().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
        if !arrangement.layout.contains(pane_id) {
            return Err(StoreError::PaneNotFound(pane_id));
        }
        let (new_layout, _empty) = arrangement.layout.remove(pane_id);
        arrangement.layout = new_layout;
        arrangement.minimized_pane_ids.retain(|id| *id != pane_id);

        let arrangement_id: ArrangementId = self.id_allocator.allocate();
        let new_tab = Tab {
            id: self.id_allocator.allocate(),
            arrangements: vec![Arrangement {
                id: arrangement_id,
                name: "Default".to_string(),
                is_default: true,
                layout: Layout::single(pane_id),
                minimized_pane_ids: Vec::new(),
            }],
            active_arrangement_id: arrangement_id,
            active_pane_id: Some(pane_id),
            zoomed_pane_id: None,
        };
        let new_tab_id = new_tab.id;
        self.data.tabs.push(new_tab);
        self.reconcile_active_pointers(from_tab);
        self.touch_shape();
        Ok(new_tab_id)
    }

    /// Splits a multi-pane tab into N single-pane tabs preserving order.
    /// No-op (returns empty) on single-pane tabs.
    pub fn break_up_tab(&mut self, tab_id: TabId) -> StoreResult<Vec<TabId>> {
        let pane_ids = {
            let tab = self.data.tab(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
            let arrangement = tab.active_arrangement().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
            arrangement.layout.visible_pane_ids()
        };
        if pane_ids.len() <= 1 {
            return Ok(Vec::new());
        }
        let mut new_ids = Vec::new();
        for pane_id in &pane_ids[1..] {
            new_ids.push(self.extract_pane(*pane_id, tab_id)?);
        }
        Ok(new_ids)
    }

    /// Moves every pane from `source_id` — across *all* of its
    /// arrangements, not just the active one — into `into_target`'s layout
    /// at `target_pane`, then removes the now-empty source tab. Panes that
    /// only lived in a non-active arrangement must still migrate, or
    /// `remove_tab` (which doesn't cascade-delete pane records) would leave
    /// them stranded in the store, referenced by nothing and ineligible
    /// for `purge_orphaned_pane` since they're never backgrounded.
    pub fn merge_tab(
        &mut self,
        source_id: TabId,
        into_target: TabId,
        at: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    ) -> StoreResult<()> {
        let pane_ids = {
            let source = self.data.tab(source_id).ok_or(StoreError::TabNotFound(source_id))?;
            source.pane_ids()
        };
        {
            let source = self.data.tab_mut(source_id).ok_or(StoreError::TabNotFound(source_id))?;
            for arrangement in &mut source.arrangements {
                arrangement.layout = Layout::empty();
            }
        }
        let mut anchor = at;
        for pane_id in pane_ids {
            self.insert_pane(pane_id, into_target, anchor, direction, position)?;
            anchor = pane_id;
        }
        self.remove_tab(source_id)?;
        Ok(())
    }

    pub fn resize_pane(&mut self, tab_id: TabId, split_id: panehub_ids::SplitId, ratio: f32) -> StoreResult<()> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let arrangement = tab.active_arrangement_mut().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
        arrangement.layout = arrangement.layout.resize(split_id, ratio);
        self.touch();
        Ok(())
    }

    pub fn equalize_panes(&mut self, tab_id: TabId) -> StoreResult<()> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let arrangement = tab.active_arrangement_mut().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
        arrangement.layout = arrangement.layout.equalize();
        self.touch();
        Ok(())
    }

    pub fn toggle_split_zoom(&mut self, tab_id: TabId, pane_id: PaneId) -> StoreResult<()> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let arrangement = tab.active_arrangement_mut().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
        arrangement.layout = arrangement.layout.toggle_zoom(pane_id);
        tab.zoomed_pane_id = tab.active_arrangement().and_then(|a| a.layout.zoomed());
        self.touch();
        Ok(())
    }

    pub fn resize_pane_by_delta(&mut self, tab_id: TabId, pane_id: PaneId, direction: SplitDirection, amount: f32) -> StoreResult<()> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let arrangement = tab.active_arrangement_mut().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
        arrangement.layout = arrangement.layout.resize_by_delta(pane_id, direction, amount);
        self.touch();
        Ok(())
    }

    /// Removes `pane_id` from `tab_id`'s active layout and deletes its
    /// (and its drawer children's, if any) pane records. Called by the
    /// coordinator after it has snapshotted the close and torn down the
    /// live view; the store itself never snapshots for undo.
    pub fn commit_pane_close(&mut self, tab_id: TabId, pane_id: PaneId) -> StoreResult<()> {
        let drawer_child_ids: Vec<PaneId> = self
            .data
            .panes
            .get(&pane_id)
            .and_then(|p| p.drawer.as_ref())
            .map(|d| d.layout.visible_pane_ids())
            .unwrap_or_default();
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let arrangement = tab.active_arrangement_mut().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
        let (new_layout, _) = arrangement.layout.remove(pane_id);
        arrangement.layout = new_layout;
        arrangement.minimized_pane_ids.retain(|id| *id != pane_id);
        self.data.panes.remove(&pane_id);
        for child_id in drawer_child_ids {
            self.data.panes.remove(&child_id);
        }
        self.reconcile_active_pointers(tab_id);
        self.touch_shape();
        Ok(())
    }

    // ---- minimize / expand ---------------------------------------------

    pub fn minimize_pane(&mut self, tab_id: TabId, pane_id: PaneId) -> StoreResult<bool> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let arrangement = tab.active_arrangement_mut().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
        if arrangement.minimized_pane_ids.contains(&pane_id) {
            return Ok(false);
        }
        arrangement.minimized_pane_ids.push(pane_id);
        self.touch();
        Ok(true)
    }

    pub fn expand_pane(&mut self, tab_id: TabId, pane_id: PaneId) -> StoreResult<bool> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let arrangement = tab.active_arrangement_mut().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
        let before = arrangement.minimized_pane_ids.len();
        arrangement.minimized_pane_ids.retain(|id| *id != pane_id);
        let changed = arrangement.minimized_pane_ids.len() != before;
        if changed {
            self.touch();
        }
        Ok(changed)
    }

    pub fn minimize_drawer_pane(&mut self, parent_pane_id: PaneId, pane_id: PaneId) -> StoreResult<bool> {
        let pane = self.data.panes.get_mut(&parent_pane_id).ok_or(StoreError::PaneNotFound(parent_pane_id))?;
        let drawer = pane.drawer.as_mut().ok_or(StoreError::PreconditionFailed("pane has no drawer"))?;
        if drawer.minimized_pane_ids.contains(&pane_id) {
            return Ok(false);
        }
        drawer.minimized_pane_ids.push(pane_id);
        self.touch();
        Ok(true)
    }

    pub fn expand_drawer_pane(&mut self, parent_pane_id: PaneId, pane_id: PaneId) -> StoreResult<bool> {
        let pane = self.data.panes.get_mut(&parent_pane_id).ok_or(StoreError::PaneNotFound(parent_pane_id))?;
        let drawer = pane.drawer.as_mut().ok_or(StoreError::PreconditionFailed("pane has no drawer"))?;
        let before = drawer.minimized_pane_ids.len();
        drawer.minimized_pane_ids.retain(|id| *id != pane_id);
        let changed = drawer.minimized_pane_ids.len() != before;
        if changed {
            self.touch();
        }
        Ok(changed)
    }

    // ---- arrangements ---------------------------------------------------

    /// Atomically sets `activeArrangementId`; clears `minimizedPaneIds` on
    /// the new arrangement since minimization is per-switch-session.
    pub fn switch_arrangement(&mut self, tab_id: TabId, to: ArrangementId) -> StoreResult<()> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        if tab.arrangement_mut(to).is_none() {
            return Err(StoreError::ArrangementNotFound(to, tab_id));
        }
        tab.active_arrangement_id = to;
        if let Some(arrangement) = tab.arrangement_mut(to) {
            arrangement.minimized_pane_ids.clear();
        }
        self.reconcile_active_pointers(tab_id);
        self.touch_shape();
        Ok(())
    }

    /// Snapshots the current layout restricted to `pane_ids`; those panes
    /// remain owned by the tab.
    pub fn create_arrangement(
        &mut self,
        tab_id: TabId,
        name: impl Into<String>,
        pane_ids: &[PaneId],
    ) -> StoreResult<ArrangementId> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let source = tab.active_arrangement().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
        let mut layout = Layout::empty();
        for pane_id in pane_ids {
            layout = if layout.is_empty() {
                Layout::single(*pane_id)
            } else {
                let anchor = layout.visible_pane_ids().last().copied().unwrap();
                layout.insert(&self.id_allocator, *pane_id, anchor, SplitDirection::Vertical, InsertPosition::After)
            };
        }
        let _ = source;
        let id: ArrangementId = self.id_allocator.allocate();
        tab.arrangements.push(Arrangement {
            id,
            name: name.into(),
            is_default: false,
            layout,
            minimized_pane_ids: Vec::new(),
        });
        self.touch_shape();
        Ok(id)
    }

    pub fn remove_arrangement(&mut self, tab_id: TabId, arrangement_id: ArrangementId) -> StoreResult<()> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        if tab.arrangements.len() <= 1 {
            return Err(StoreError::PreconditionFailed("cannot remove the only arrangement"));
        }
        let idx = tab
            .arrangements
            .iter()
            .position(|a| a.id == arrangement_id)
            .ok_or(StoreError::ArrangementNotFound(arrangement_id, tab_id))?;
        tab.arrangements.remove(idx);
        if tab.active_arrangement_id == arrangement_id {
            tab.active_arrangement_id = tab.arrangements[0].id;
        }
        self.reconcile_active_pointers(tab_id);
        self.touch_shape();
        Ok(())
    }

    pub fn rename_arrangement(&mut self, tab_id: TabId, arrangement_id: ArrangementId, name: impl Into<String>) -> StoreResult<()> {
        let tab = self.data.tab_mut(tab_id).ok_or(StoreError::TabNotFound(tab_id))?;
        let arrangement = tab.arrangement_mut(arrangement_id).ok_or(StoreError::ArrangementNotFound(arrangement_id, tab_id))?;
        arrangement.name = name.into();
        self.touch();
        Ok(())
    }

    // ---- residency -------------------------------------------------------

    pub fn background_pane(&mut self, pane_id: PaneId) -> StoreResult<()> {
        if let Some(tab_id) = self.data.tab_owning_pane(pane_id) {
            let tab = self.data.tab_mut(tab_id).unwrap();
            if let Some(arrangement) = tab.active_arrangement_mut() {
                let (new_layout, _) = arrangement.layout.remove(pane_id);
                arrangement.layout = new_layout;
                arrangement.minimized_pane_ids.retain(|id| *id != pane_id);
            }
            self.reconcile_active_pointers(tab_id);
        }
        let pane = self.data.panes.get_mut(&pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
        pane.residency = Residency::Backgrounded;
        self.touch_shape();
        Ok(())
    }

    pub fn reactivate_pane(
        &mut self,
        pane_id: PaneId,
        in_tab: TabId,
        at: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    ) -> StoreResult<()> {
        {
            let pane = self.data.panes.get(&pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
            if pane.residency == Residency::Active {
                return Err(StoreError::PreconditionFailed("pane is already active"));
            }
        }
        self.insert_pane(pane_id, in_tab, at, direction, position)?;
        let pane = self.data.panes.get_mut(&pane_id).unwrap();
        pane.residency = Residency::Active;
        self.touch_shape();
        Ok(())
    }

    pub fn purge_orphaned_pane(&mut self, pane_id: PaneId) -> StoreResult<()> {
        let pane = self.data.panes.get(&pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
        if pane.residency != Residency::Backgrounded {
            return Err(StoreError::PreconditionFailed("pane must be backgrounded to purge"));
        }
        if self.pane_is_referenced(pane_id) {
            return Err(StoreError::PreconditionFailed("pane is still referenced"));
        }
        self.data.panes.remove(&pane_id);
        self.touch_shape();
        Ok(())
    }

    /// Unconditionally removes a pane record, regardless of residency.
    /// Used for two coordinator-owned cleanups that don't fit
    /// `purgeOrphanedPane`'s "must be backgrounded" precondition: rolling
    /// back a pane whose view/surface creation failed before it was ever
    /// placed, and hard-deleting a pane owned by an undo entry evicted
    /// from the bounded close-undo stack.
    pub fn discard_pane_record(&mut self, pane_id: PaneId) -> StoreResult<()> {
        if self.pane_is_referenced(pane_id) {
            return Err(StoreError::PreconditionFailed("pane is still referenced"));
        }
        self.data.panes.remove(&pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
        self.touch_shape();
        Ok(())
    }

    // ---- close / restore snapshots --------------------------------------

    /// Captures the full tab including every arrangement and every
    /// referenced pane, then removes it from the store.
    pub fn snapshot_for_close(&mut self, tab_id: TabId) -> StoreResult<CloseSnapshot> {
        let tab = self.data.tab(tab_id).ok_or(StoreError::TabNotFound(tab_id))?.clone();
        let mut panes = Vec::new();
        for pane_id in tab.pane_ids() {
            if let Some(pane) = self.data.panes.get(&pane_id) {
                panes.push(pane.clone());
                if let Some(drawer) = &pane.drawer {
                    for child_id in drawer.layout.visible_pane_ids() {
                        if let Some(child) = self.data.panes.get(&child_id) {
                            panes.push(child.clone());
                        }
                    }
                }
            }
        }
        Ok(CloseSnapshot::TabClose { tab, panes })
    }

    /// Captures the closing pane, its drawer children, and an anchor +
    /// reinsert hint identifying where in the former parent split it sat.
    pub fn snapshot_for_pane_close(&mut self, pane_id: PaneId, in_tab: TabId) -> StoreResult<CloseSnapshot> {
        let pane = self.data.panes.get(&pane_id).ok_or(StoreError::PaneNotFound(pane_id))?.clone();
        let mut drawer_child_panes = Vec::new();
        if let Some(drawer) = &pane.drawer {
            for child_id in drawer.layout.visible_pane_ids() {
                if let Some(child) = self.data.panes.get(&child_id) {
                    drawer_child_panes.push(child.clone());
                }
            }
        }
        let (anchor_pane_id, reinsert_hint) = {
            let tab = self.data.tab(in_tab).ok_or(StoreError::TabNotFound(in_tab))?;
            let arrangement = tab.active_arrangement().ok_or(StoreError::PreconditionFailed("tab has no arrangement"))?;
            find_sibling_anchor(arrangement.layout.root(), pane_id)
        };
        Ok(CloseSnapshot::PaneClose { tab_id: in_tab, pane, drawer_child_panes, anchor_pane_id, reinsert_hint })
    }

    /// Re-injects a `TabClose` snapshot, restoring identity bit-for-bit.
    pub fn restore_tab_close(&mut self, tab: Tab, panes: Vec<Pane>) {
        for pane in panes {
            self.data.panes.insert(pane.id, pane);
        }
        self.data.tabs.push(tab.clone());
        self.data.active_tab_id = Some(tab.id);
        self.touch_shape();
    }

    /// Re-injects a `PaneClose` snapshot: restores pane records and
    /// reinserts the pane into its former tab's layout using the anchor +
    /// reinsert hint if both are still valid, else appends a floating tab.
    pub fn restore_pane_close(
        &mut self,
        tab_id: TabId,
        pane: Pane,
        drawer_child_panes: Vec<Pane>,
        anchor_pane_id: Option<PaneId>,
        reinsert_hint: Option<ReinsertHint>,
    ) -> StoreResult<()> {
        let pane_id = pane.id;
        self.data.panes.insert(pane.id, pane);
        for child in drawer_child_panes {
            self.data.panes.insert(child.id, child);
        }
        match (anchor_pane_id, reinsert_hint) {
            (Some(anchor), Some(hint)) if self.data.tab(tab_id).is_some() => {
                let anchor_present = self
                    .data
                    .tab(tab_id)
                    .and_then(|t| t.active_arrangement())
                    .map(|a| a.layout.contains(anchor))
                    .unwrap_or(false);
                if anchor_present {
                    self.insert_pane(pane_id, tab_id, anchor, hint.direction, hint.position)?;
                } else {
                    self.append_floating_tab(pane_id);
                }
            }
            _ => {
                self.append_floating_tab(pane_id);
            }
        }
        Ok(())
    }

    fn append_floating_tab(&mut self, pane_id: PaneId) {
        let arrangement_id: ArrangementId = self.id_allocator.allocate();
        let tab = Tab {
            id: self.id_allocator.allocate(),
            arrangements: vec![Arrangement {
                id: arrangement_id,
                name: "Default".to_string(),
                is_default: true,
                layout: Layout::single(pane_id),
                minimized_pane_ids: Vec::new(),
            }],
            active_arrangement_id: arrangement_id,
            active_pane_id: Some(pane_id),
            zoomed_pane_id: None,
        };
        self.data.active_tab_id = Some(tab.id);
        self.data.tabs.push(tab);
        self.touch_shape();
    }

    // ---- pane metadata ----------------------------------------------------

    pub fn update_pane_cwd(&mut self, pane_id: PaneId, cwd: impl Into<String>) -> StoreResult<()> {
        let pane = self.data.panes.get_mut(&pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
        pane.metadata.cwd = Some(cwd.into());
        self.touch();
        Ok(())
    }

    pub fn update_pane_title(&mut self, pane_id: PaneId, title: impl Into<String>) -> StoreResult<()> {
        let pane = self.data.panes.get_mut(&pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
        pane.metadata.title = title.into();
        self.touch();
        Ok(())
    }

    /// Non-dirtying: used when a runtime reports its own saved scroll/tab
    /// state back, which must not itself trigger another persist cycle.
    pub fn sync_pane_webview_state(&mut self, pane_id: PaneId, state: serde_json::Value) -> StoreResult<()> {
        let pane = self.data.panes.get_mut(&pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
        if let PaneContent::Webview { state: s } = &mut pane.content {
            *s = state;
        }
        Ok(())
    }

    /// Dirtying: used when the user (not a runtime sync) changes webview
    /// state.
    pub fn update_pane_webview_state(&mut self, pane_id: PaneId, state: serde_json::Value) -> StoreResult<()> {
        self.sync_pane_webview_state(pane_id, state)?;
        self.touch();
        Ok(())
    }
}

/// Finds the immediate sibling of `pane_id` within the layout and the hint
/// needed to reinsert a pane at that exact split position.
fn find_sibling_anchor(
    node: Option<&panehub_layout::LayoutNode>,
    target: PaneId,
) -> (Option<PaneId>, Option<ReinsertHint>) {
    use panehub_layout::LayoutNode;
    fn visit(node: &LayoutNode, target: PaneId) -> Option<(PaneId, ReinsertHint)> {
        match node {
            LayoutNode::Leaf { .. } => None,
            LayoutNode::Split { direction, left, right, .. } => {
                if matches!(**left, LayoutNode::Leaf { pane_id } if pane_id == target) {
                    return first_leaf(right)
                        .map(|anchor| (anchor, ReinsertHint { direction: *direction, position: InsertPosition::Before }));
                }
                if matches!(**right, LayoutNode::Leaf { pane_id } if pane_id == target) {
                    return first_leaf(left)
                        .map(|anchor| (anchor, ReinsertHint { direction: *direction, position: InsertPosition::After }));
                }
                visit(left, target).or_else(|| visit(right, target))
            }
        }
    }
    fn first_leaf(node: &panehub_layout::LayoutNode) -> Option<PaneId> {
        match node {
            panehub_layout::LayoutNode::Leaf { pane_id } => Some(*pane_id),
            panehub_layout::LayoutNode::Split { left, .. } => first_leaf(left),
        }
    }
    match node {
        None => (None, None),
        Some(root) => match visit(root, target) {
            Some((anchor, hint)) => (Some(anchor), Some(hint)),
            None => (None, None),
        },
    }
}
