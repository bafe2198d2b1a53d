//! The two shapes a structural command arrives in: a named `Command`
//! (keyboard/menu invocation) or a drag-drop payload. `ActionResolver`
//! turns either into a `PaneAction`.

use panehub_ids::{ArrangementId, PaneId, SplitId, TabId};
use panehub_layout::{Direction4, SplitDirection};

/// A keyboard- or menu-originated command, named the way the command
/// palette / keybinding table would name it. Each variant carries just
/// enough context for the resolver to locate its target within the
/// current snapshot.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CloseTab { tab_id: TabId },
    NextTab,
    PreviousTab,
    BreakUpTab { tab_id: TabId },
    MergeTab { source_tab: TabId, target_tab: TabId, target_pane: PaneId, direction: SplitDirection },
    ClosePane { tab_id: TabId, pane_id: PaneId },
    ExtractPaneToTab { tab_id: TabId, pane_id: PaneId },
    FocusPaneDirection { tab_id: TabId, pane_id: PaneId, direction: Direction4 },
    SplitDirection { tab_id: TabId, pane_id: PaneId, direction: SplitDirection },
    ResizePane { tab_id: TabId, split_id: SplitId, ratio: f32 },
    ResizePaneByDelta { tab_id: TabId, pane_id: PaneId, direction: SplitDirection, amount: f32 },
    EqualizePanes { tab_id: TabId },
    ToggleSplitZoom { tab_id: TabId, pane_id: PaneId },
    MoveTab { tab_id: TabId, to_index: usize },
    MoveTabByDelta { tab_id: TabId, delta: i64 },
    MinimizePane { tab_id: TabId, pane_id: PaneId },
    ExpandPane { tab_id: TabId, pane_id: PaneId },
    CreateArrangement { tab_id: TabId, name: String, pane_ids: Vec<PaneId> },
    RemoveArrangement { tab_id: TabId, arrangement_id: ArrangementId },
    SwitchArrangement { tab_id: TabId, arrangement_id: ArrangementId },
    RenameArrangement { tab_id: TabId, arrangement_id: ArrangementId, name: String },
    BackgroundPane { tab_id: TabId, pane_id: PaneId },
    ReactivatePane { pane_id: PaneId, target_tab: TabId, target_pane: PaneId, direction: SplitDirection },
    PurgeOrphanedPane { pane_id: PaneId },
    ToggleDrawer { parent_pane_id: PaneId },
    AddDrawerPane { parent_pane_id: PaneId },
    SetActiveDrawerPane { parent_pane_id: PaneId, pane_id: Option<PaneId> },
    MinimizeDrawerPane { parent_pane_id: PaneId, pane_id: PaneId },
    ExpandDrawerPane { parent_pane_id: PaneId, pane_id: PaneId },
    RemoveDrawerPane { parent_pane_id: PaneId, pane_id: PaneId },
}

/// Which part of a drop target was entered, i.e. the quadrant the drag
/// finished over. `Center` means "replace the tab's active arrangement
/// slot" rather than splitting it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropZone {
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

/// What's being dropped: an existing pane being relocated, or a
/// drawer-child pane being promoted/moved.
#[derive(Clone, Debug, PartialEq)]
pub enum DropPayload {
    Pane { pane_id: PaneId, source_tab: Option<TabId> },
    DrawerChild { parent_pane_id: PaneId, pane_id: PaneId },
}
