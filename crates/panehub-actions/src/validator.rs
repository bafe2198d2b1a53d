//! `ActionValidator`: pure `(action, state) -> accept/reject` check. Never
//! mutates anything; a rejected action leaves the store untouched because
//! the coordinator only calls store methods after validation passes.

use crate::action::{PaneAction, PaneSource};
use crate::error::ActionError;
use crate::resolver::WorkspaceSnapshot;
use panehub_store::Residency;

pub struct ActionValidator;

impl ActionValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, action: &PaneAction, state: &WorkspaceSnapshot) -> Result<(), ActionError> {
        match action {
            PaneAction::ClosePane { tab_id, pane_id } => {
                let tab = state.tab(*tab_id).ok_or(ActionError::TabNotFound(*tab_id))?;
                let arrangement = tab
                    .active_arrangement()
                    .ok_or(ActionError::PreconditionFailed("tab has no active arrangement"))?;
                if !arrangement.layout.contains(*pane_id) {
                    return Err(ActionError::InvalidPayload(format!("pane {pane_id} is not in tab {tab_id}'s layout")));
                }
                if arrangement.layout.visible_pane_ids().len() <= 1 {
                    return Err(ActionError::PreconditionFailed(
                        "closing the last non-drawer pane of a tab must escalate to closeTab",
                    ));
                }
                Ok(())
            }

            PaneAction::CloseTab { tab_id } => {
                state.tab(*tab_id).ok_or(ActionError::TabNotFound(*tab_id))?;
                Ok(())
            }

            PaneAction::InsertPane { source, target_tab, target_pane, .. } => {
                let tab = state.tab(*target_tab).ok_or(ActionError::TabNotFound(*target_tab))?;
                let arrangement = tab
                    .active_arrangement()
                    .ok_or(ActionError::PreconditionFailed("tab has no active arrangement"))?;
                if !arrangement.layout.contains(*target_pane) {
                    return Err(ActionError::InvalidPayload(format!(
                        "target pane {target_pane} is not a leaf of tab {target_tab}'s active layout"
                    )));
                }
                match source {
                    PaneSource::Existing { pane_id } => {
                        if pane_id == target_pane {
                            return Err(ActionError::PreconditionFailed(
                                "cannot split a pane into itself",
                            ));
                        }
                    }
                    PaneSource::Backgrounded { pane_id } => {
                        match state.pane_residency(*pane_id) {
                            Some(Residency::Backgrounded) => {}
                            Some(Residency::Active) => {
                                return Err(ActionError::PreconditionFailed(
                                    "pane is already active",
                                ));
                            }
                            None => {
                                return Err(ActionError::InvalidPayload(format!(
                                    "pane {pane_id} not found"
                                )));
                            }
                        }
                    }
                    PaneSource::New { .. } => {}
                }
                Ok(())
            }

            PaneAction::ReactivatePane { pane_id, target_tab, .. } => {
                state.tab(*target_tab).ok_or(ActionError::TabNotFound(*target_tab))?;
                match state.pane_residency(*pane_id) {
                    Some(Residency::Backgrounded) => Ok(()),
                    Some(Residency::Active) => Err(ActionError::PreconditionFailed("pane is already active")),
                    None => Err(ActionError::InvalidPayload(format!("pane {pane_id} not found"))),
                }
            }

            PaneAction::RemoveArrangement { tab_id, arrangement_id } => {
                let tab = state.tab(*tab_id).ok_or(ActionError::TabNotFound(*tab_id))?;
                if tab.arrangements.len() <= 1 {
                    return Err(ActionError::PreconditionFailed("cannot remove the only arrangement"));
                }
                if !tab.arrangements.iter().any(|a| a.id == *arrangement_id) {
                    return Err(ActionError::ArrangementNotFound(*arrangement_id, *tab_id));
                }
                Ok(())
            }

            PaneAction::SwitchArrangement { tab_id, arrangement_id } => {
                let tab = state.tab(*tab_id).ok_or(ActionError::TabNotFound(*tab_id))?;
                if !tab.arrangements.iter().any(|a| a.id == *arrangement_id) {
                    return Err(ActionError::ArrangementNotFound(*arrangement_id, *tab_id));
                }
                Ok(())
            }

            PaneAction::ExpireUndoEntry => Err(ActionError::PreconditionFailed(
                "superseded by bounded-stack GC; expireUndoEntry is never executed",
            )),

            PaneAction::SelectTab { tab_id }
            | PaneAction::BreakUpTab { tab_id }
            | PaneAction::EqualizePanes { tab_id }
            | PaneAction::MoveTab { tab_id, .. } => {
                state.tab(*tab_id).ok_or(ActionError::TabNotFound(*tab_id))?;
                Ok(())
            }

            PaneAction::ExtractPaneToTab { tab_id, pane_id }
            | PaneAction::FocusPane { tab_id, pane_id }
            | PaneAction::ResizePaneByDelta { tab_id, pane_id, .. }
            | PaneAction::ToggleSplitZoom { tab_id, pane_id }
            | PaneAction::MinimizePane { tab_id, pane_id }
            | PaneAction::ExpandPane { tab_id, pane_id }
            | PaneAction::BackgroundPane { tab_id, pane_id } => {
                let tab = state.tab(*tab_id).ok_or(ActionError::TabNotFound(*tab_id))?;
                let arrangement = tab
                    .active_arrangement()
                    .ok_or(ActionError::PreconditionFailed("tab has no active arrangement"))?;
                if !arrangement.layout.contains(*pane_id) {
                    return Err(ActionError::InvalidPayload(format!("pane {pane_id} is not in tab {tab_id}'s layout")));
                }
                Ok(())
            }

            PaneAction::ResizePane { tab_id, .. } => {
                state.tab(*tab_id).ok_or(ActionError::TabNotFound(*tab_id))?;
                Ok(())
            }

            PaneAction::MergeTab { source_tab, target_tab, .. } => {
                state.tab(*source_tab).ok_or(ActionError::TabNotFound(*source_tab))?;
                state.tab(*target_tab).ok_or(ActionError::TabNotFound(*target_tab))?;
                if source_tab == target_tab {
                    return Err(ActionError::PreconditionFailed("cannot merge a tab into itself"));
                }
                Ok(())
            }

            PaneAction::CreateArrangement { tab_id, .. } | PaneAction::RenameArrangement { tab_id, .. } => {
                state.tab(*tab_id).ok_or(ActionError::TabNotFound(*tab_id))?;
                Ok(())
            }

            PaneAction::PurgeOrphanedPane { .. } => Ok(()),

            // Drawer operations and repair actions are validated by the
            // coordinator against the owning pane's drawer directly (the
            // store's own precondition checks cover them); the resolver
            // never emits one against a tab that doesn't exist.
            PaneAction::AddDrawerPane { .. }
            | PaneAction::RemoveDrawerPane { .. }
            | PaneAction::ToggleDrawer { .. }
            | PaneAction::SetActiveDrawerPane { .. }
            | PaneAction::ResizeDrawerPane { .. }
            | PaneAction::EqualizeDrawerPanes { .. }
            | PaneAction::MinimizeDrawerPane { .. }
            | PaneAction::ExpandDrawerPane { .. }
            | PaneAction::InsertDrawerPane { .. }
            | PaneAction::MoveDrawerPane { .. }
            | PaneAction::Repair { .. } => Ok(()),
        }
    }
}

impl Default for ActionValidator {
    fn default() -> Self {
        Self::new()
    }
}
