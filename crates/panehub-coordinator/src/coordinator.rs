//! `PaneCoordinator`: the single-threaded orchestrator that executes a
//! validated `PaneAction` against the store, reconciles the view/surface/
//! runtime layers, and owns the close-undo stack. Every other crate in
//! this workspace is a collaborator this type drives.
//!
//! UI-origin, drag-drop, and runtime-origin actions all flow through the
//! same `execute` pipeline, including structural changes a runtime
//! requests of itself (a new split, closing its own tab).

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::undo::CloseUndoStack;
use crate::view_factory::ViewFactory;
use panehub_actions::{ActionValidator, PaneAction, PaneSource, RepairKind, WorkspaceSnapshot};
use panehub_ids::{CorrelationId, PaneId, SplitId, TabId};
use panehub_layout::{InsertPosition, SplitDirection};
use panehub_runtime::{DispatchTarget, Runtime, RuntimeCommand, RuntimeError, RuntimeEvent, RuntimeRegistry};
use panehub_store::{CloseSnapshot, Lifetime, Pane, PaneContent, PaneMetadata, Residency, StoreError, WorkspaceStore};
use panehub_surfaces::{DetachReason, SurfaceConfig, SurfaceError, SurfaceMetadata, SurfacePolicy};
use panehub_views::ViewRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// An undo entry is either a store-level close snapshot (tab or
/// tab-anchored pane close) or a drawer-child close, which doesn't fit
/// `CloseSnapshot::PaneClose`'s tab-layout reinsert hint.
enum UndoEntry {
    Store(CloseSnapshot),
    DrawerPaneClose { parent_pane_id: PaneId, pane: Pane },
}

impl UndoEntry {
    fn owned_pane_ids(&self) -> Vec<PaneId> {
        match self {
            UndoEntry::Store(snapshot) => snapshot.owned_pane_ids(),
            UndoEntry::DrawerPaneClose { pane, .. } => vec![pane.id],
        }
    }
}

pub struct PaneCoordinator {
    store: WorkspaceStore,
    views: ViewRegistry,
    surfaces: SurfacePolicy,
    runtimes: RuntimeRegistry,
    view_factory: Box<dyn ViewFactory>,
    undo_stack: CloseUndoStack<UndoEntry>,
    pane_surfaces: HashMap<PaneId, panehub_ids::SurfaceId>,
    is_management_mode_active: bool,
}

impl PaneCoordinator {
    pub fn new(store: WorkspaceStore, view_factory: Box<dyn ViewFactory>, surfaces: SurfacePolicy) -> Self {
        Self {
            store,
            views: ViewRegistry::new(),
            surfaces,
            runtimes: RuntimeRegistry::new(),
            view_factory,
            undo_stack: CloseUndoStack::new(),
            pane_surfaces: HashMap::new(),
            is_management_mode_active: false,
        }
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut WorkspaceStore {
        &mut self.store
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    pub fn surfaces_mut(&mut self) -> &mut SurfacePolicy {
        &mut self.surfaces
    }

    pub fn runtimes_mut(&mut self) -> &mut RuntimeRegistry {
        &mut self.runtimes
    }

    pub fn undo_stack_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn set_management_mode_active(&mut self, active: bool) {
        self.is_management_mode_active = active;
    }

    // ---- the execute pipeline -------------------------------------------

    /// Validates `action` against the current store state, then executes
    /// it. A rejected action leaves the store untouched.
    pub fn execute(&mut self, action: PaneAction) -> CoordinatorResult<()> {
        {
            let snapshot = WorkspaceSnapshot::new(self.store.data(), self.is_management_mode_active);
            ActionValidator::new().validate(&action, &snapshot)?;
        }
        match action {
            PaneAction::SelectTab { tab_id } => Ok(self.store.set_active_tab(tab_id)?),
            PaneAction::CloseTab { tab_id } => self.close_tab(tab_id),
            PaneAction::BreakUpTab { tab_id } => {
                self.store.break_up_tab(tab_id)?;
                Ok(())
            }
            PaneAction::ClosePane { tab_id, pane_id } => self.close_pane(tab_id, pane_id),
            PaneAction::ExtractPaneToTab { tab_id, pane_id } => {
                self.store.extract_pane(pane_id, tab_id)?;
                Ok(())
            }
            PaneAction::FocusPane { tab_id, pane_id } => Ok(self.store.set_active_pane(tab_id, Some(pane_id))?),
            PaneAction::InsertPane { source, target_tab, target_pane, direction, position } => {
                self.insert_pane(source, target_tab, target_pane, direction, position)
            }
            PaneAction::ResizePane { tab_id, split_id, ratio } => self.resize_pane(tab_id, split_id, ratio),
            PaneAction::EqualizePanes { tab_id } => self.equalize_panes(tab_id),
            PaneAction::ToggleSplitZoom { tab_id, pane_id } => self.toggle_zoom(tab_id, pane_id),
            PaneAction::MoveTab { tab_id, to_index } => Ok(self.store.move_tab(tab_id, to_index)?),
            PaneAction::MinimizePane { tab_id, pane_id } => self.minimize_pane(tab_id, pane_id),
            PaneAction::ExpandPane { tab_id, pane_id } => self.expand_pane(tab_id, pane_id),
            PaneAction::ResizePaneByDelta { tab_id, pane_id, direction, amount } => {
                self.resize_pane_by_delta(tab_id, pane_id, direction, amount)
            }
            PaneAction::MergeTab { source_tab, target_tab, target_pane, direction, position } => {
                Ok(self.store.merge_tab(source_tab, target_tab, target_pane, direction, position)?)
            }
            PaneAction::CreateArrangement { tab_id, name, pane_ids } => {
                self.store.create_arrangement(tab_id, name, &pane_ids)?;
                Ok(())
            }
            PaneAction::RemoveArrangement { tab_id, arrangement_id } => {
                Ok(self.store.remove_arrangement(tab_id, arrangement_id)?)
            }
            PaneAction::SwitchArrangement { tab_id, arrangement_id } => self.switch_arrangement(tab_id, arrangement_id),
            PaneAction::RenameArrangement { tab_id, arrangement_id, name } => {
                Ok(self.store.rename_arrangement(tab_id, arrangement_id, name)?)
            }
            PaneAction::BackgroundPane { tab_id, pane_id } => self.background_pane(tab_id, pane_id),
            PaneAction::ReactivatePane { pane_id, target_tab, target_pane, direction, position } => {
                self.reactivate_pane(pane_id, target_tab, target_pane, direction, position)
            }
            PaneAction::PurgeOrphanedPane { pane_id } => {
                self.views.unregister(pane_id);
                if let Some(surface_id) = self.pane_surfaces.remove(&pane_id) {
                    self.surfaces.destroy(surface_id);
                }
                Ok(self.store.purge_orphaned_pane(pane_id)?)
            }
            PaneAction::AddDrawerPane { parent_pane_id, source } => self.add_drawer_pane(parent_pane_id, source),
            PaneAction::RemoveDrawerPane { parent_pane_id, pane_id } => self.remove_drawer_pane(parent_pane_id, pane_id),
            PaneAction::ToggleDrawer { parent_pane_id } => Ok(self.store.toggle_drawer(parent_pane_id)?),
            PaneAction::SetActiveDrawerPane { parent_pane_id, pane_id } => {
                Ok(self.store.set_active_drawer_pane(parent_pane_id, pane_id)?)
            }
            PaneAction::ResizeDrawerPane { parent_pane_id, split_id, ratio } => {
                Ok(self.store.resize_drawer_pane(parent_pane_id, split_id, ratio)?)
            }
            PaneAction::EqualizeDrawerPanes { parent_pane_id } => Ok(self.store.equalize_drawer_panes(parent_pane_id)?),
            PaneAction::MinimizeDrawerPane { parent_pane_id, pane_id } => {
                self.store.minimize_drawer_pane(parent_pane_id, pane_id)?;
                Ok(())
            }
            PaneAction::ExpandDrawerPane { parent_pane_id, pane_id } => {
                self.store.expand_drawer_pane(parent_pane_id, pane_id)?;
                Ok(())
            }
            PaneAction::InsertDrawerPane { parent_pane_id, pane_id, at, direction, position } => {
                Ok(self.store.insert_drawer_pane(parent_pane_id, pane_id, at, direction, position)?)
            }
            PaneAction::MoveDrawerPane { parent_pane_id, pane_id, at, direction, position } => {
                Ok(self.store.move_drawer_pane(parent_pane_id, pane_id, at, direction, position)?)
            }
            PaneAction::ExpireUndoEntry => {
                unreachable!("ActionValidator rejects ExpireUndoEntry before execute is reached")
            }
            PaneAction::Repair { kind, pane_id } => self.repair(kind, pane_id),
        }
    }

    // ---- pane creation with rollback ------------------------------------

    /// Creates a view (and, for terminal content, a surface) for
    /// `pane_id`. Never mutates layout placement — callers insert into the
    /// layout only after this succeeds, per §5's failure-atomic sequence.
    fn attach_pane_view(&mut self, pane_id: PaneId) -> CoordinatorResult<()> {
        let pane = self.store.pane(pane_id).cloned().ok_or(StoreError::PaneNotFound(pane_id))?;
        if matches!(pane.content, PaneContent::Terminal) {
            let config = SurfaceConfig { cwd: pane.metadata.cwd.clone().unwrap_or_default(), shell: None };
            let metadata = SurfaceMetadata { pane_id, title: pane.metadata.title.clone() };
            let surface = self.surfaces.create_surface(config, metadata).map_err(|e| {
                log::warn!(target: "panehub_coordinator", "surface creation failed for pane {pane_id}: {e}");
                e
            })?;
            self.surfaces.attach(surface.id, pane_id);
            self.pane_surfaces.insert(pane_id, surface.id);
        }
        let view = self
            .view_factory
            .create_view(pane_id, &pane.content, &pane.metadata)
            .map_err(|e| SurfaceError::BackendFailure(e.to_string()))?;
        self.views.register(view);
        Ok(())
    }

    /// Tears down a pane's view and requests a surface detach. Does not
    /// touch the store's layout or pane record.
    fn teardown_pane_view(&mut self, pane_id: PaneId, reason: DetachReason) {
        self.views.unregister(pane_id);
        match reason {
            DetachReason::Close => {
                if let Some(surface_id) = self.pane_surfaces.remove(&pane_id) {
                    self.surfaces.detach(surface_id, DetachReason::Close);
                }
            }
            DetachReason::Hide | DetachReason::Move => {
                if let Some(surface_id) = self.pane_surfaces.get(&pane_id).copied() {
                    self.surfaces.detach(surface_id, reason);
                }
            }
        }
    }

    /// Creates a fresh pane from `source`, attaches its view, and rolls
    /// the pane record back out of the store if the view/surface creation
    /// fails. Existing/backgrounded sources reuse their existing pane
    /// record; `Backgrounded` additionally recreates the view that was
    /// torn down when the pane was backgrounded.
    fn materialize_source(&mut self, source: PaneSource) -> CoordinatorResult<PaneId> {
        match source {
            PaneSource::New { content, provider, lifetime } => {
                let pane = self.store.create_pane(content, provider, lifetime, Residency::Active, PaneMetadata::default());
                if let Err(err) = self.attach_pane_view(pane.id) {
                    log::warn!(target: "panehub_coordinator", "rolling back pane {} after view creation failure", pane.id);
                    let _ = self.store.discard_pane_record(pane.id);
                    return Err(err);
                }
                Ok(pane.id)
            }
            PaneSource::Existing { pane_id } => Ok(pane_id),
            PaneSource::Backgrounded { pane_id } => {
                self.attach_pane_view(pane_id)?;
                Ok(pane_id)
            }
        }
    }

    fn insert_pane(
        &mut self,
        source: PaneSource,
        target_tab: TabId,
        target_pane: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    ) -> CoordinatorResult<()> {
        let is_reactivation = matches!(source, PaneSource::Backgrounded { .. });
        let pane_id = self.materialize_source(source)?;
        let result = if is_reactivation {
            self.store.reactivate_pane(pane_id, target_tab, target_pane, direction, position)
        } else {
            self.store.insert_pane(pane_id, target_tab, target_pane, direction, position)
        };
        if let Err(err) = result {
            self.teardown_pane_view(pane_id, DetachReason::Close);
            if !is_reactivation {
                let _ = self.store.discard_pane_record(pane_id);
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn reactivate_pane(
        &mut self,
        pane_id: PaneId,
        target_tab: TabId,
        target_pane: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    ) -> CoordinatorResult<()> {
        self.attach_pane_view(pane_id)?;
        if let Err(err) = self.store.reactivate_pane(pane_id, target_tab, target_pane, direction, position) {
            self.teardown_pane_view(pane_id, DetachReason::Close);
            return Err(err.into());
        }
        Ok(())
    }

    fn background_pane(&mut self, tab_id: TabId, pane_id: PaneId) -> CoordinatorResult<()> {
        let _ = tab_id;
        self.teardown_pane_view(pane_id, DetachReason::Hide);
        Ok(self.store.background_pane(pane_id)?)
    }

    // ---- drawer operations -----------------------------------------------

    fn add_drawer_pane(&mut self, parent_pane_id: PaneId, source: PaneSource) -> CoordinatorResult<()> {
        let pane_id = self.materialize_source(source)?;
        if let Err(err) = self.store.add_drawer_pane(parent_pane_id, pane_id) {
            self.teardown_pane_view(pane_id, DetachReason::Close);
            let _ = self.store.discard_pane_record(pane_id);
            return Err(err.into());
        }
        Ok(())
    }

    fn remove_drawer_pane(&mut self, parent_pane_id: PaneId, pane_id: PaneId) -> CoordinatorResult<()> {
        let pane = self.store.pane(pane_id).cloned().ok_or(StoreError::PaneNotFound(pane_id))?;
        self.teardown_pane_view(pane_id, DetachReason::Close);
        self.store.remove_drawer_pane(parent_pane_id, pane_id)?;
        self.push_undo(UndoEntry::DrawerPaneClose { parent_pane_id, pane });
        Ok(())
    }

    // ---- resize / zoom / minimize ----------------------------------------

    fn resize_pane(&mut self, tab_id: TabId, split_id: SplitId, ratio: f32) -> CoordinatorResult<()> {
        Ok(self.store.resize_pane(tab_id, split_id, ratio)?)
    }

    fn equalize_panes(&mut self, tab_id: TabId) -> CoordinatorResult<()> {
        Ok(self.store.equalize_panes(tab_id)?)
    }

    fn toggle_zoom(&mut self, tab_id: TabId, pane_id: PaneId) -> CoordinatorResult<()> {
        Ok(self.store.toggle_split_zoom(tab_id, pane_id)?)
    }

    fn resize_pane_by_delta(
        &mut self,
        tab_id: TabId,
        pane_id: PaneId,
        direction: SplitDirection,
        amount: f32,
    ) -> CoordinatorResult<()> {
        Ok(self.store.resize_pane_by_delta(tab_id, pane_id, direction, amount)?)
    }

    /// Minimizing/expanding/switching an arrangement can change which
    /// panes are rendered without changing which panes are *placed*; the
    /// coordinator reconciles the view layer by diffing the visible set
    /// before and after, per §4.6 step 3.
    fn minimize_pane(&mut self, tab_id: TabId, pane_id: PaneId) -> CoordinatorResult<()> {
        self.with_visible_diff(tab_id, |store| store.minimize_pane(tab_id, pane_id))
    }

    fn expand_pane(&mut self, tab_id: TabId, pane_id: PaneId) -> CoordinatorResult<()> {
        self.with_visible_diff(tab_id, |store| store.expand_pane(tab_id, pane_id))
    }

    fn switch_arrangement(&mut self, tab_id: TabId, arrangement_id: panehub_ids::ArrangementId) -> CoordinatorResult<()> {
        self.with_visible_diff(tab_id, |store| store.switch_arrangement(tab_id, arrangement_id))
    }

    fn with_visible_diff<F, T>(&mut self, tab_id: TabId, f: F) -> CoordinatorResult<()>
    where
        F: FnOnce(&mut WorkspaceStore) -> Result<T, StoreError>,
    {
        let previous_visible: HashSet<PaneId> = self
            .store
            .data()
            .tab(tab_id)
            .and_then(|t| t.active_arrangement())
            .map(|a| a.visible_pane_ids().into_iter().collect())
            .unwrap_or_default();

        f(&mut self.store)?;

        let new_visible: HashSet<PaneId> = self
            .store
            .data()
            .tab(tab_id)
            .and_then(|t| t.active_arrangement())
            .map(|a| a.visible_pane_ids().into_iter().collect())
            .unwrap_or_default();

        for pane_id in previous_visible.difference(&new_visible) {
            if let Some(surface_id) = self.pane_surfaces.get(pane_id).copied() {
                self.surfaces.detach(surface_id, DetachReason::Hide);
            }
        }
        for pane_id in new_visible.difference(&previous_visible) {
            if let Some(surface_id) = self.pane_surfaces.get(pane_id).copied() {
                self.surfaces.attach(surface_id, *pane_id);
            }
        }
        Ok(())
    }

    // ---- close with undo --------------------------------------------------

    /// Closes `tab_id`: syncs live view state, snapshots the whole tab,
    /// tears down every view in it, removes it from the store, then GCs
    /// the undo stack.
    fn close_tab(&mut self, tab_id: TabId) -> CoordinatorResult<()> {
        self.store.run_pre_persist_hook();
        let snapshot = self.store.snapshot_for_close(tab_id)?;
        let owned = snapshot.owned_pane_ids();
        for pane_id in &owned {
            self.teardown_pane_view(*pane_id, DetachReason::Close);
        }
        self.store.remove_tab(tab_id)?;
        self.push_undo(UndoEntry::Store(snapshot));
        Ok(())
    }

    /// Closes `pane_id` within `tab_id`. A pane that is the last one in
    /// its tab escalates to `close_tab` so the undo stack gets exactly one
    /// entry, not two. `pane_id` is always a leaf of the tab's active
    /// layout here — `ActionValidator` never lets a drawer child reach
    /// `ClosePane`; those go through `RemoveDrawerPane` instead.
    fn close_pane(&mut self, tab_id: TabId, pane_id: PaneId) -> CoordinatorResult<()> {
        let is_last_pane = self
            .store
            .data()
            .tab(tab_id)
            .and_then(|t| t.active_arrangement())
            .map(|a| a.visible_pane_ids().len() <= 1)
            .unwrap_or(false);
        if is_last_pane {
            return self.close_tab(tab_id);
        }

        let snapshot = self.store.snapshot_for_pane_close(pane_id, tab_id)?;
        self.teardown_pane_view(pane_id, DetachReason::Close);
        if let CloseSnapshot::PaneClose { drawer_child_panes, .. } = &snapshot {
            for child in drawer_child_panes {
                self.teardown_pane_view(child.id, DetachReason::Close);
            }
        }
        self.store.commit_pane_close(tab_id, pane_id)?;
        self.push_undo(UndoEntry::Store(snapshot));
        Ok(())
    }

    fn push_undo(&mut self, entry: UndoEntry) {
        if let Some(evicted) = self.undo_stack.push(entry) {
            self.destroy_evicted(evicted);
        }
    }

    /// Destroys every pane an evicted undo entry owned that isn't
    /// reachable from any live tab, and any surface still tracked for it.
    fn destroy_evicted(&mut self, entry: UndoEntry) {
        for pane_id in entry.owned_pane_ids() {
            if let Some(surface_id) = self.pane_surfaces.remove(&pane_id) {
                self.surfaces.destroy(surface_id);
            }
            if !self.store.pane_is_referenced(pane_id) {
                let _ = self.store.discard_pane_record(pane_id);
            }
        }
    }

    /// Pops the top undo entry and restores it. Entries whose home tab
    /// (or, for a drawer child, whose parent pane) is already gone are
    /// discarded and the next entry is tried. A silent no-op if the stack
    /// is empty.
    pub fn undo_close(&mut self) -> CoordinatorResult<()> {
        loop {
            let entry = match self.undo_stack.pop() {
                Some(e) => e,
                None => return Ok(()),
            };
            match entry {
                UndoEntry::Store(CloseSnapshot::TabClose { tab, panes }) => {
                    let tab_id = tab.id;
                    self.store.restore_tab_close(tab.clone(), panes.clone());
                    for pane in panes.iter().rev() {
                        self.restore_owned_pane(pane.id);
                    }
                    self.finish_restore(tab_id);
                    return Ok(());
                }
                UndoEntry::Store(CloseSnapshot::PaneClose { tab_id, pane, drawer_child_panes, anchor_pane_id, reinsert_hint }) => {
                    if self.store.data().tab(tab_id).is_none() {
                        log::warn!(target: "panehub_coordinator", "discarding pane-undo entry: tab {tab_id} is gone");
                        continue;
                    }
                    self.store.restore_pane_close(tab_id, pane.clone(), drawer_child_panes.clone(), anchor_pane_id, reinsert_hint)?;
                    for child in drawer_child_panes.iter().rev() {
                        self.restore_owned_pane(child.id);
                    }
                    self.restore_owned_pane(pane.id);
                    self.finish_restore(tab_id);
                    return Ok(());
                }
                UndoEntry::DrawerPaneClose { parent_pane_id, pane } => {
                    let parent = match self.store.pane(parent_pane_id) {
                        Some(p) => p,
                        None => {
                            log::warn!(
                                target: "panehub_coordinator",
                                "discarding drawer-child-undo entry: parent pane {parent_pane_id} is gone"
                            );
                            continue;
                        }
                    };
                    let pane_id = pane.id;
                    let existing_sibling = parent.drawer.as_ref().and_then(|d| d.layout.visible_pane_ids().first().copied());
                    let restored = match existing_sibling {
                        Some(sibling) => self.store.insert_drawer_pane(
                            parent_pane_id,
                            pane_id,
                            sibling,
                            SplitDirection::Horizontal,
                            InsertPosition::After,
                        ),
                        None => self.store.add_drawer_pane(parent_pane_id, pane_id),
                    };
                    if let Err(err) = restored {
                        log::warn!(target: "panehub_coordinator", "drawer-child restore for pane {pane_id} failed: {err}");
                        continue;
                    }
                    self.restore_owned_pane(pane_id);
                    return Ok(());
                }
            }
        }
    }

    /// Recreates a view (and, for terminals, re-attaches the matching
    /// surface popped off the surface-undo stack) for a just-restored
    /// pane. Reverse restore order matches the surface-undo stack's push
    /// order (§4.6 "Undo close").
    fn restore_owned_pane(&mut self, pane_id: PaneId) {
        let pane = match self.store.pane(pane_id).cloned() {
            Some(p) => p,
            None => return,
        };
        if matches!(pane.content, PaneContent::Terminal) {
            if let Some(managed) = self.surfaces.undo_close() {
                if managed.metadata.pane_id == pane_id {
                    self.pane_surfaces.insert(pane_id, managed.id);
                    self.surfaces.attach(managed.id, pane_id);
                    match self.view_factory.create_view(pane_id, &pane.content, &pane.metadata) {
                        Ok(view) => {
                            self.views.register(view);
                            return;
                        }
                        Err(_) => {
                            self.remove_failed_restored_pane(pane_id);
                            return;
                        }
                    }
                } else {
                    self.surfaces.requeue_undo(managed);
                }
            }
        }
        if self.attach_pane_view(pane_id).is_err() {
            self.remove_failed_restored_pane(pane_id);
        }
    }

    fn remove_failed_restored_pane(&mut self, pane_id: PaneId) {
        log::warn!(target: "panehub_coordinator", "giving up restoring view for pane {pane_id}; removing it");
        if self.store.pane(pane_id).map(|p| p.residency) == Some(Residency::Active) {
            let _ = self.store.background_pane(pane_id);
        }
        let _ = self.store.purge_orphaned_pane(pane_id);
    }

    /// After a restore, falls back to another non-empty arrangement (or
    /// removes the tab entirely) if the active one ended up empty because
    /// a restored pane's view couldn't be recreated; then sets the
    /// restored tab active.
    fn finish_restore(&mut self, tab_id: TabId) {
        let empty = self
            .store
            .data()
            .tab(tab_id)
            .and_then(|t| t.active_arrangement())
            .map(|a| a.layout.is_empty())
            .unwrap_or(true);
        if empty {
            let fallback = self
                .store
                .data()
                .tab(tab_id)
                .and_then(|t| t.arrangements.iter().find(|a| !a.layout.is_empty()).map(|a| a.id));
            match fallback {
                Some(arrangement_id) => {
                    let _ = self.store.switch_arrangement(tab_id, arrangement_id);
                }
                None => {
                    let _ = self.store.remove_tab(tab_id);
                    return;
                }
            }
        }
        let _ = self.store.set_active_tab(tab_id);
    }

    // ---- repair ------------------------------------------------------------

    fn repair(&mut self, kind: RepairKind, pane_id: Option<PaneId>) -> CoordinatorResult<()> {
        let pane_id = pane_id.ok_or_else(|| StoreError::PreconditionFailed("repair requires a target pane"))?;
        match kind {
            RepairKind::RecreateSurface | RepairKind::CreateMissingView => {
                self.teardown_pane_view(pane_id, DetachReason::Close);
                self.attach_pane_view(pane_id)?;
                Ok(())
            }
        }
    }

    // ---- runtime routing -----------------------------------------------

    pub fn register_runtime(&mut self, runtime: Arc<dyn Runtime>) {
        self.runtimes.register(runtime);
    }

    pub fn unregister_runtime(&mut self, pane_id: PaneId) {
        self.runtimes.unregister(pane_id);
    }

    pub async fn dispatch_runtime_command(
        &self,
        command: RuntimeCommand,
        target: DispatchTarget,
        active_pane: Option<PaneId>,
        correlation_id: CorrelationId,
    ) -> Result<(), RuntimeError> {
        self.runtimes.dispatch_runtime_command(command, target, active_pane, correlation_id).await
    }

    /// Maps a runtime-emitted structural event onto a `PaneAction` and
    /// re-enters `execute`, so runtime-origin and UI-origin actions flow
    /// through the identical validation/side-effect pipeline. Non-
    /// structural events (title/cwd changes) are applied directly to the
    /// store instead.
    pub fn handle_runtime_event(&mut self, pane_id: PaneId, event: RuntimeEvent) -> CoordinatorResult<()> {
        match event {
            RuntimeEvent::TitleChanged { title } => Ok(self.store.update_pane_title(pane_id, title)?),
            RuntimeEvent::CwdChanged { cwd } => Ok(self.store.update_pane_cwd(pane_id, cwd)?),
            RuntimeEvent::NewSplitRequested { direction } => {
                let tab_id = self.store.data().tab_owning_pane(pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
                self.execute(PaneAction::InsertPane {
                    source: PaneSource::New {
                        content: PaneContent::Terminal,
                        provider: "pty".to_string(),
                        lifetime: Lifetime::Persistent,
                    },
                    target_tab: tab_id,
                    target_pane: pane_id,
                    direction,
                    position: InsertPosition::After,
                })
            }
            RuntimeEvent::CloseTabRequested => {
                let tab_id = self.store.data().tab_owning_pane(pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
                self.execute(PaneAction::CloseTab { tab_id })
            }
            RuntimeEvent::GotoTabRequested { index } => {
                let tab_id = self.store.data().tabs.get(index).map(|t| t.id).ok_or(StoreError::PreconditionFailed("tab index out of range"))?;
                self.execute(PaneAction::SelectTab { tab_id })
            }
            RuntimeEvent::ResizeSplitRequested { split_id, ratio } => {
                let tab_id = self.store.data().tab_owning_pane(pane_id).ok_or(StoreError::PaneNotFound(pane_id))?;
                self.execute(PaneAction::ResizePane { tab_id, split_id, ratio })
            }
        }
    }

    /// Drains surface-reported CWD changes and folds them into the store.
    /// Called from the host's event loop; never suspends.
    pub fn drain_surface_cwd_changes(&mut self, changes: &mut tokio::sync::mpsc::UnboundedReceiver<(PaneId, String)>) {
        while let Ok((pane_id, cwd)) = changes.try_recv() {
            let _ = self.store.update_pane_cwd(pane_id, cwd);
        }
    }

    // ---- boot-time view hydration ----------------------------------------

    /// Creates a view (and surface, for terminal content) for a pane that
    /// is already placed in the store — used at boot to hydrate views for
    /// panes loaded from the persisted workspace file, which arrive with
    /// no view/surface of their own. Unlike `attach_pane_view` calls made
    /// mid-session, a hydration failure does not roll the pane record
    /// back out of the store: the pane keeps its place in the layout and
    /// is left view-less until a `Repair::CreateMissingView` recovers it,
    /// since removing it here would silently reshape a tab the user saved
    /// intentionally.
    pub fn hydrate_pane_view(&mut self, pane_id: PaneId) -> CoordinatorResult<()> {
        self.attach_pane_view(pane_id)
    }

    /// The panes `BootSequencer` needs a live view for when restoring
    /// `tab_id`: every visible (non-minimized) leaf of its *active*
    /// arrangement, plus the visible drawer children of those leaves.
    /// Panes in other arrangements, or minimized, stay view-less until an
    /// arrangement switch or expand reveals them — mirroring how
    /// `switch_arrangement` only attaches newly-revealed panes rather
    /// than eagerly hydrating every arrangement at once.
    pub fn tab_boot_pane_ids(&self, tab_id: TabId) -> Vec<PaneId> {
        let Some(tab) = self.store.data().tab(tab_id) else { return Vec::new() };
        let Some(arrangement) = tab.active_arrangement() else { return Vec::new() };
        let mut ids = Vec::new();
        for pane_id in arrangement.visible_pane_ids() {
            ids.push(pane_id);
            if let Some(pane) = self.store.pane(pane_id) {
                if let Some(drawer) = &pane.drawer {
                    ids.extend(drawer.visible_pane_ids());
                }
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_factory::ViewCreationError;
    use panehub_actions::RepairKind;
    use panehub_ids::IdAllocator;
    use panehub_layout::Layout;
    use panehub_store::{Arrangement, Tab, WorkspaceData};
    use panehub_views::{PaneView, PaneViewKind};

    struct TestView {
        pane_id: PaneId,
        torn_down: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl PaneView for TestView {
        fn pane_id(&self) -> PaneId {
            self.pane_id
        }
        fn kind(&self) -> PaneViewKind {
            PaneViewKind::Terminal
        }
        fn surface_id_if_terminal(&self) -> Option<panehub_ids::SurfaceId> {
            None
        }
        fn teardown(&mut self) {
            self.torn_down.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    struct TestViewFactory {
        fail_for: std::sync::Mutex<HashSet<PaneId>>,
        torn_down: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl TestViewFactory {
        fn new() -> Self {
            Self { fail_for: std::sync::Mutex::new(HashSet::new()), torn_down: Arc::new(std::sync::atomic::AtomicUsize::new(0)) }
        }
        fn fail_next_for(&self, pane_id: PaneId) {
            self.fail_for.lock().unwrap().insert(pane_id);
        }
    }

    impl ViewFactory for TestViewFactory {
        fn create_view(
            &self,
            pane_id: PaneId,
            _content: &PaneContent,
            _metadata: &PaneMetadata,
        ) -> Result<Box<dyn PaneView>, ViewCreationError> {
            if self.fail_for.lock().unwrap().remove(&pane_id) {
                return Err(ViewCreationError::Failed { pane_id, reason: "injected".into() });
            }
            Ok(Box::new(TestView { pane_id, torn_down: self.torn_down.clone() }))
        }
    }

    struct TestBackend;
    impl panehub_surfaces::SurfaceBackend for TestBackend {
        fn create(
            &self,
            _config: &panehub_surfaces::SurfaceConfig,
            _metadata: &panehub_surfaces::SurfaceMetadata,
        ) -> panehub_surfaces::SurfaceResult<panehub_surfaces::OpaqueHandle> {
            Ok(Arc::new(()))
        }
        fn destroy(&self, _handle: &panehub_surfaces::OpaqueHandle) {}
        fn set_focused(&self, _handle: &panehub_surfaces::OpaqueHandle, _focused: bool) {}
    }

    /// Fails the next `create_surface` call exactly once, then succeeds.
    struct FailOnceBackend {
        fail_next: std::sync::atomic::AtomicBool,
    }

    impl panehub_surfaces::SurfaceBackend for FailOnceBackend {
        fn create(
            &self,
            _config: &panehub_surfaces::SurfaceConfig,
            _metadata: &panehub_surfaces::SurfaceMetadata,
        ) -> panehub_surfaces::SurfaceResult<panehub_surfaces::OpaqueHandle> {
            if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Err(panehub_surfaces::SurfaceError::BackendFailure("injected".into()));
            }
            Ok(Arc::new(()))
        }
        fn destroy(&self, _handle: &panehub_surfaces::OpaqueHandle) {}
        fn set_focused(&self, _handle: &panehub_surfaces::OpaqueHandle, _focused: bool) {}
    }

    fn one_pane_coordinator() -> (PaneCoordinator, TabId, PaneId) {
        let alloc = IdAllocator::new();
        let workspace_id = alloc.allocate();
        let mut store = WorkspaceStore::new(WorkspaceData::empty(workspace_id), IdAllocator::new());
        let pane = store.create_pane(PaneContent::Terminal, "pty", Lifetime::Persistent, Residency::Active, PaneMetadata::default());
        let arrangement_id = alloc.allocate();
        let tab_id: TabId = alloc.allocate();
        store.append_tab(Tab {
            id: tab_id,
            arrangements: vec![Arrangement {
                id: arrangement_id,
                name: "Default".into(),
                is_default: true,
                layout: Layout::single(pane.id),
                minimized_pane_ids: Vec::new(),
            }],
            active_arrangement_id: arrangement_id,
            active_pane_id: Some(pane.id),
            zoomed_pane_id: None,
        });
        store.set_active_tab(tab_id).unwrap();
        let coordinator = PaneCoordinator::new(store, Box::new(TestViewFactory::new()), SurfacePolicy::new(Box::new(TestBackend)));
        (coordinator, tab_id, pane.id)
    }

    #[test]
    fn insert_pane_splits_and_registers_a_view() {
        let (mut coordinator, tab_id, pane_id) = one_pane_coordinator();
        let action = PaneAction::InsertPane {
            source: PaneSource::New { content: PaneContent::Terminal, provider: "pty".into(), lifetime: Lifetime::Persistent },
            target_tab: tab_id,
            target_pane: pane_id,
            direction: SplitDirection::Vertical,
            position: InsertPosition::After,
        };
        coordinator.execute(action).unwrap();
        let arrangement = coordinator.store().data().tab(tab_id).unwrap().active_arrangement().unwrap();
        assert_eq!(arrangement.layout.visible_pane_ids().len(), 2);
        assert_eq!(coordinator.views().len(), 2);
    }

    #[test]
    fn close_pane_then_undo_restores_it_with_a_fresh_view() {
        let (mut coordinator, tab_id, pane_id) = one_pane_coordinator();
        coordinator
            .execute(PaneAction::InsertPane {
                source: PaneSource::New { content: PaneContent::Terminal, provider: "pty".into(), lifetime: Lifetime::Persistent },
                target_tab: tab_id,
                target_pane: pane_id,
                direction: SplitDirection::Vertical,
                position: InsertPosition::After,
            })
            .unwrap();
        let second_pane_id = *coordinator
            .store()
            .data()
            .tab(tab_id)
            .unwrap()
            .active_arrangement()
            .unwrap()
            .visible_pane_ids()
            .iter()
            .find(|id| **id != pane_id)
            .unwrap();

        coordinator.execute(PaneAction::ClosePane { tab_id, pane_id: second_pane_id }).unwrap();
        assert_eq!(coordinator.undo_stack_len(), 1);
        assert!(!coordinator.views().contains(second_pane_id));

        coordinator.undo_close().unwrap();
        assert_eq!(coordinator.undo_stack_len(), 0);
        assert!(coordinator.views().contains(second_pane_id));
        let arrangement = coordinator.store().data().tab(tab_id).unwrap().active_arrangement().unwrap();
        assert_eq!(arrangement.layout.visible_pane_ids().len(), 2);
    }

    #[test]
    fn closing_the_last_pane_of_a_tab_escalates_to_close_tab() {
        let (mut coordinator, tab_id, pane_id) = one_pane_coordinator();
        coordinator.execute(PaneAction::ClosePane { tab_id, pane_id }).unwrap();
        assert!(coordinator.store().data().tab(tab_id).is_none());
        assert_eq!(coordinator.undo_stack_len(), 1);

        coordinator.undo_close().unwrap();
        assert!(coordinator.store().data().tab(tab_id).is_some());
        assert!(coordinator.views().contains(pane_id));
    }

    #[test]
    fn undo_stack_is_lifo_across_two_closes() {
        let (mut coordinator, tab_id, pane_id) = one_pane_coordinator();
        coordinator
            .execute(PaneAction::InsertPane {
                source: PaneSource::New { content: PaneContent::Terminal, provider: "pty".into(), lifetime: Lifetime::Persistent },
                target_tab: tab_id,
                target_pane: pane_id,
                direction: SplitDirection::Vertical,
                position: InsertPosition::After,
            })
            .unwrap();
        coordinator
            .execute(PaneAction::InsertPane {
                source: PaneSource::New { content: PaneContent::Terminal, provider: "pty".into(), lifetime: Lifetime::Persistent },
                target_tab: tab_id,
                target_pane: pane_id,
                direction: SplitDirection::Horizontal,
                position: InsertPosition::After,
            })
            .unwrap();
        let visible = coordinator.store().data().tab(tab_id).unwrap().active_arrangement().unwrap().visible_pane_ids();
        assert_eq!(visible.len(), 3);
        let second = visible[1];
        let third = visible[2];

        coordinator.execute(PaneAction::ClosePane { tab_id, pane_id: second }).unwrap();
        coordinator.execute(PaneAction::ClosePane { tab_id, pane_id: third }).unwrap();
        assert_eq!(coordinator.undo_stack_len(), 2);

        // LIFO: the most recently closed pane (`third`) comes back first.
        coordinator.undo_close().unwrap();
        assert!(coordinator.views().contains(third));
        assert!(!coordinator.views().contains(second));

        coordinator.undo_close().unwrap();
        assert!(coordinator.views().contains(second));
        assert_eq!(coordinator.undo_stack_len(), 0);
    }

    #[test]
    fn background_then_reactivate_round_trips_the_view() {
        let (mut coordinator, tab_id, pane_id) = one_pane_coordinator();
        coordinator
            .execute(PaneAction::InsertPane {
                source: PaneSource::New { content: PaneContent::Terminal, provider: "pty".into(), lifetime: Lifetime::Persistent },
                target_tab: tab_id,
                target_pane: pane_id,
                direction: SplitDirection::Vertical,
                position: InsertPosition::After,
            })
            .unwrap();
        let second_pane_id = *coordinator
            .store()
            .data()
            .tab(tab_id)
            .unwrap()
            .active_arrangement()
            .unwrap()
            .visible_pane_ids()
            .iter()
            .find(|id| **id != pane_id)
            .unwrap();

        coordinator.execute(PaneAction::BackgroundPane { tab_id, pane_id: second_pane_id }).unwrap();
        assert!(!coordinator.views().contains(second_pane_id));
        let arrangement = coordinator.store().data().tab(tab_id).unwrap().active_arrangement().unwrap();
        assert_eq!(arrangement.layout.visible_pane_ids().len(), 1);

        coordinator
            .execute(PaneAction::InsertPane {
                source: PaneSource::Backgrounded { pane_id: second_pane_id },
                target_tab: tab_id,
                target_pane: pane_id,
                direction: SplitDirection::Vertical,
                position: InsertPosition::After,
            })
            .unwrap();
        assert!(coordinator.views().contains(second_pane_id));
    }

    #[test]
    fn drawer_pane_add_remove_undo_round_trips() {
        let (mut coordinator, _tab_id, pane_id) = one_pane_coordinator();
        coordinator
            .execute(PaneAction::AddDrawerPane {
                parent_pane_id: pane_id,
                source: PaneSource::New { content: PaneContent::Terminal, provider: "pty".into(), lifetime: Lifetime::Persistent },
            })
            .unwrap();
        let drawer_pane_id = *coordinator.store().pane(pane_id).unwrap().drawer.as_ref().unwrap().visible_pane_ids().first().unwrap();
        assert!(coordinator.views().contains(drawer_pane_id));

        coordinator.execute(PaneAction::RemoveDrawerPane { parent_pane_id: pane_id, pane_id: drawer_pane_id }).unwrap();
        assert!(!coordinator.views().contains(drawer_pane_id));
        assert_eq!(coordinator.undo_stack_len(), 1);

        coordinator.undo_close().unwrap();
        assert!(coordinator.views().contains(drawer_pane_id));
        assert_eq!(coordinator.undo_stack_len(), 0);
    }

    #[test]
    fn repair_create_missing_view_recreates_a_torn_down_view() {
        let (mut coordinator, _tab_id, pane_id) = one_pane_coordinator();
        coordinator.execute(PaneAction::Repair { kind: RepairKind::CreateMissingView, pane_id: Some(pane_id) }).unwrap();
        assert!(coordinator.views().contains(pane_id));
    }

    #[test]
    fn surface_create_failure_rolls_back_the_pane_record() {
        let (mut coordinator, tab_id, pane_id) = one_pane_coordinator();
        coordinator.surfaces = SurfacePolicy::new(Box::new(FailOnceBackend { fail_next: std::sync::atomic::AtomicBool::new(true) }));
        let panes_before = coordinator.store().data().panes.len();

        let result = coordinator.execute(PaneAction::InsertPane {
            source: PaneSource::New { content: PaneContent::Terminal, provider: "pty".into(), lifetime: Lifetime::Persistent },
            target_tab: tab_id,
            target_pane: pane_id,
            direction: SplitDirection::Vertical,
            position: InsertPosition::After,
        });

        assert!(result.is_err());
        assert_eq!(coordinator.store().data().panes.len(), panes_before);
        let arrangement = coordinator.store().data().tab(tab_id).unwrap().active_arrangement().unwrap();
        assert_eq!(arrangement.layout.visible_pane_ids(), vec![pane_id]);
    }

    #[test]
    fn expire_undo_entry_is_rejected_before_execute() {
        let (mut coordinator, _tab_id, _pane_id) = one_pane_coordinator();
        let result = coordinator.execute(PaneAction::ExpireUndoEntry);
        assert!(result.is_err());
    }
}
