//! `ActionResolver`: a pure function mapping a `Command` (or a drag-drop
//! payload) plus a read-only `WorkspaceSnapshot` to a candidate
//! `PaneAction`, or `None` when the command doesn't apply. Never touches
//! the store, never logs, never fails — a command that doesn't resolve is
//! simply inapplicable in the current state (e.g. `focusPaneLeft` with no
//! left neighbor).

use crate::action::{PaneAction, PaneSource};
use crate::command::{Command, DropPayload, DropZone};
use panehub_ids::{PaneId, TabId};
use panehub_layout::{InsertPosition, SplitDirection};
use panehub_store::{Lifetime, PaneContent, Residency, Tab, WorkspaceData};

/// A read-only borrow of the store's current state, plus UI-mode context
/// the resolver needs but the store doesn't own.
pub struct WorkspaceSnapshot<'a> {
    data: &'a WorkspaceData,
    pub is_management_mode_active: bool,
}

impl<'a> WorkspaceSnapshot<'a> {
    pub fn new(data: &'a WorkspaceData, is_management_mode_active: bool) -> Self {
        Self { data, is_management_mode_active }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.data.tabs
    }

    pub fn active_tab_id(&self) -> Option<TabId> {
        self.data.active_tab_id
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.data.tab(id)
    }

    /// The residency of `pane_id`, or `None` if no such pane exists.
    pub fn pane_residency(&self, pane_id: PaneId) -> Option<Residency> {
        self.data.panes.get(&pane_id).map(|p| p.residency)
    }

    fn tab_index(&self, id: TabId) -> Option<usize> {
        self.data.tabs.iter().position(|t| t.id == id)
    }
}

fn default_terminal_source() -> PaneSource {
    PaneSource::New { content: PaneContent::Terminal, provider: "pty".to_string(), lifetime: Lifetime::Persistent }
}

pub struct ActionResolver;

impl ActionResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, command: &Command, state: &WorkspaceSnapshot) -> Option<PaneAction> {
        match command {
            Command::CloseTab { tab_id } => Some(PaneAction::CloseTab { tab_id: *tab_id }),
            Command::NextTab => self.select_adjacent_tab(state, 1),
            Command::PreviousTab => self.select_adjacent_tab(state, -1),
            Command::BreakUpTab { tab_id } => Some(PaneAction::BreakUpTab { tab_id: *tab_id }),
            Command::MergeTab { source_tab, target_tab, target_pane, direction } => Some(PaneAction::MergeTab {
                source_tab: *source_tab,
                target_tab: *target_tab,
                target_pane: *target_pane,
                direction: *direction,
                position: InsertPosition::After,
            }),
            Command::ClosePane { tab_id, pane_id } => Some(PaneAction::ClosePane { tab_id: *tab_id, pane_id: *pane_id }),
            Command::ExtractPaneToTab { tab_id, pane_id } => {
                Some(PaneAction::ExtractPaneToTab { tab_id: *tab_id, pane_id: *pane_id })
            }
            Command::FocusPaneDirection { tab_id, pane_id, direction } => {
                let tab = state.tab(*tab_id)?;
                let arrangement = tab.active_arrangement()?;
                let neighbor = arrangement.layout.focus_neighbor(*pane_id, *direction)?;
                Some(PaneAction::FocusPane { tab_id: *tab_id, pane_id: neighbor })
            }
            Command::SplitDirection { tab_id, pane_id, direction } => Some(PaneAction::InsertPane {
                source: default_terminal_source(),
                target_tab: *tab_id,
                target_pane: *pane_id,
                direction: *direction,
                position: InsertPosition::After,
            }),
            Command::ResizePane { tab_id, split_id, ratio } => {
                Some(PaneAction::ResizePane { tab_id: *tab_id, split_id: *split_id, ratio: *ratio })
            }
            Command::ResizePaneByDelta { tab_id, pane_id, direction, amount } => Some(PaneAction::ResizePaneByDelta {
                tab_id: *tab_id,
                pane_id: *pane_id,
                direction: *direction,
                amount: *amount,
            }),
            Command::EqualizePanes { tab_id } => Some(PaneAction::EqualizePanes { tab_id: *tab_id }),
            Command::ToggleSplitZoom { tab_id, pane_id } => {
                Some(PaneAction::ToggleSplitZoom { tab_id: *tab_id, pane_id: *pane_id })
            }
            Command::MoveTab { tab_id, to_index } => Some(PaneAction::MoveTab { tab_id: *tab_id, to_index: *to_index }),
            Command::MoveTabByDelta { tab_id, delta } => {
                let idx = state.tab_index(*tab_id)? as i64;
                let len = state.tabs().len() as i64;
                if len == 0 {
                    return None;
                }
                let new_idx = (idx + delta).clamp(0, len - 1) as usize;
                Some(PaneAction::MoveTab { tab_id: *tab_id, to_index: new_idx })
            }
            Command::MinimizePane { tab_id, pane_id } => Some(PaneAction::MinimizePane { tab_id: *tab_id, pane_id: *pane_id }),
            Command::ExpandPane { tab_id, pane_id } => Some(PaneAction::ExpandPane { tab_id: *tab_id, pane_id: *pane_id }),
            Command::CreateArrangement { tab_id, name, pane_ids } => Some(PaneAction::CreateArrangement {
                tab_id: *tab_id,
                name: name.clone(),
                pane_ids: pane_ids.clone(),
            }),
            Command::RemoveArrangement { tab_id, arrangement_id } => {
                Some(PaneAction::RemoveArrangement { tab_id: *tab_id, arrangement_id: *arrangement_id })
            }
            Command::SwitchArrangement { tab_id, arrangement_id } => {
                Some(PaneAction::SwitchArrangement { tab_id: *tab_id, arrangement_id: *arrangement_id })
            }
            Command::RenameArrangement { tab_id, arrangement_id, name } => Some(PaneAction::RenameArrangement {
                tab_id: *tab_id,
                arrangement_id: *arrangement_id,
                name: name.clone(),
            }),
            Command::BackgroundPane { tab_id, pane_id } => {
                Some(PaneAction::BackgroundPane { tab_id: *tab_id, pane_id: *pane_id })
            }
            Command::ReactivatePane { pane_id, target_tab, target_pane, direction } => Some(PaneAction::ReactivatePane {
                pane_id: *pane_id,
                target_tab: *target_tab,
                target_pane: *target_pane,
                direction: *direction,
                position: InsertPosition::After,
            }),
            Command::PurgeOrphanedPane { pane_id } => Some(PaneAction::PurgeOrphanedPane { pane_id: *pane_id }),
            Command::ToggleDrawer { parent_pane_id } => Some(PaneAction::ToggleDrawer { parent_pane_id: *parent_pane_id }),
            Command::AddDrawerPane { parent_pane_id } => Some(PaneAction::AddDrawerPane {
                parent_pane_id: *parent_pane_id,
                source: default_terminal_source(),
            }),
            Command::SetActiveDrawerPane { parent_pane_id, pane_id } => {
                Some(PaneAction::SetActiveDrawerPane { parent_pane_id: *parent_pane_id, pane_id: *pane_id })
            }
            Command::MinimizeDrawerPane { parent_pane_id, pane_id } => {
                Some(PaneAction::MinimizeDrawerPane { parent_pane_id: *parent_pane_id, pane_id: *pane_id })
            }
            Command::ExpandDrawerPane { parent_pane_id, pane_id } => {
                Some(PaneAction::ExpandDrawerPane { parent_pane_id: *parent_pane_id, pane_id: *pane_id })
            }
            Command::RemoveDrawerPane { parent_pane_id, pane_id } => {
                Some(PaneAction::RemoveDrawerPane { parent_pane_id: *parent_pane_id, pane_id: *pane_id })
            }
        }
    }

    /// Drag-drop resolution: `payload` landed on `destination_pane_id`
    /// within `destination_tab_id`'s `zone`.
    pub fn resolve_drop(
        &self,
        payload: &DropPayload,
        destination_pane_id: PaneId,
        destination_tab_id: TabId,
        zone: DropZone,
        state: &WorkspaceSnapshot,
    ) -> Option<PaneAction> {
        state.tab(destination_tab_id)?;
        let (direction, position) = match zone {
            DropZone::Top => (SplitDirection::Horizontal, InsertPosition::Before),
            DropZone::Bottom => (SplitDirection::Horizontal, InsertPosition::After),
            DropZone::Left => (SplitDirection::Vertical, InsertPosition::Before),
            DropZone::Right => (SplitDirection::Vertical, InsertPosition::After),
            DropZone::Center => (SplitDirection::Vertical, InsertPosition::After),
        };
        match payload {
            DropPayload::Pane { pane_id, source_tab } => {
                if *pane_id == destination_pane_id {
                    return None;
                }
                let source = PaneSource::Existing { pane_id: *pane_id };
                match source_tab {
                    Some(tab_id) if *tab_id == destination_tab_id => Some(PaneAction::InsertPane {
                        source,
                        target_tab: destination_tab_id,
                        target_pane: destination_pane_id,
                        direction,
                        position,
                    }),
                    _ => Some(PaneAction::InsertPane {
                        source,
                        target_tab: destination_tab_id,
                        target_pane: destination_pane_id,
                        direction,
                        position,
                    }),
                }
            }
            DropPayload::DrawerChild { parent_pane_id, pane_id } => Some(PaneAction::InsertPane {
                source: PaneSource::Existing { pane_id: *pane_id },
                target_tab: destination_tab_id,
                target_pane: destination_pane_id,
                direction,
                position,
            })
            .filter(|_| *parent_pane_id != destination_pane_id),
        }
    }

    fn select_adjacent_tab(&self, state: &WorkspaceSnapshot, delta: i64) -> Option<PaneAction> {
        let tabs = state.tabs();
        if tabs.is_empty() {
            return None;
        }
        let active = state.active_tab_id()?;
        let idx = state.tab_index(active)? as i64;
        let len = tabs.len() as i64;
        let new_idx = ((idx + delta) % len + len) % len;
        let tab_id = tabs[new_idx as usize].id;
        Some(PaneAction::SelectTab { tab_id })
    }
}

impl Default for ActionResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panehub_ids::IdAllocator;
    use panehub_layout::Layout;
    use panehub_store::{Arrangement, Residency};

    fn snapshot_with_one_tab() -> (WorkspaceData, TabId, PaneId) {
        let alloc = IdAllocator::new();
        let workspace_id = alloc.allocate();
        let mut data = WorkspaceData::empty(workspace_id);
        let pane_id: PaneId = alloc.allocate();
        let arrangement_id = alloc.allocate();
        let tab_id: TabId = alloc.allocate();
        data.panes.insert(
            pane_id,
            panehub_store::Pane {
                id: pane_id,
                content: PaneContent::Terminal,
                provider: "pty".into(),
                lifetime: Lifetime::Persistent,
                residency: Residency::Active,
                parent_pane_id: None,
                is_drawer_child: false,
                drawer: None,
                metadata: Default::default(),
            },
        );
        data.tabs.push(Tab {
            id: tab_id,
            arrangements: vec![Arrangement {
                id: arrangement_id,
                name: "Default".into(),
                is_default: true,
                layout: Layout::single(pane_id),
                minimized_pane_ids: Vec::new(),
            }],
            active_arrangement_id: arrangement_id,
            active_pane_id: Some(pane_id),
            zoomed_pane_id: None,
        });
        data.active_tab_id = Some(tab_id);
        (data, tab_id, pane_id)
    }

    #[test]
    fn close_tab_resolves_directly() {
        let (data, tab_id, _) = snapshot_with_one_tab();
        let snapshot = WorkspaceSnapshot::new(&data, false);
        let resolver = ActionResolver::new();
        let action = resolver.resolve(&Command::CloseTab { tab_id }, &snapshot);
        assert_eq!(action, Some(PaneAction::CloseTab { tab_id }));
    }

    #[test]
    fn focus_pane_left_with_no_neighbor_resolves_to_none() {
        let (data, tab_id, pane_id) = snapshot_with_one_tab();
        let snapshot = WorkspaceSnapshot::new(&data, false);
        let resolver = ActionResolver::new();
        let action = resolver.resolve(
            &Command::FocusPaneDirection { tab_id, pane_id, direction: panehub_layout::Direction4::Left },
            &snapshot,
        );
        assert_eq!(action, None);
    }

    #[test]
    fn next_tab_wraps_around() {
        let (data, tab_id, _) = snapshot_with_one_tab();
        let snapshot = WorkspaceSnapshot::new(&data, false);
        let resolver = ActionResolver::new();
        let action = resolver.resolve(&Command::NextTab, &snapshot);
        assert_eq!(action, Some(PaneAction::SelectTab { tab_id }));
    }
}
