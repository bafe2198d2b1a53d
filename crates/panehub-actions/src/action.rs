//! The closed `PaneAction` sum type: every structural change the
//! coordinator can execute, plus the `PaneSource` variants that describe
//! where a newly-placed pane's content comes from.

use panehub_ids::{ArrangementId, PaneId, SplitId, TabId};
use panehub_layout::{InsertPosition, SplitDirection};
use panehub_store::{Lifetime, PaneContent};

/// Where the pane content for an insert/drawer-add action comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum PaneSource {
    /// Brand-new pane; the store will mint a fresh id.
    New { content: PaneContent, provider: String, lifetime: Lifetime },
    /// A pane already in the store but not placed anywhere (e.g. extracted).
    Existing { pane_id: PaneId },
    /// A backgrounded pane being reactivated.
    Backgrounded { pane_id: PaneId },
}

/// Explicit user-recovery actions available through the command surface
/// after a failed restore or a missing view, per §7's `ViewNotFound` /
/// `SurfaceMismatch` handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepairKind {
    RecreateSurface,
    CreateMissingView,
}

/// Every structural change `PaneCoordinator::execute` can perform. Produced
/// by `ActionResolver` from a `Command` or drag-drop payload, checked by
/// `ActionValidator`, and executed against the store/view/surface/runtime
/// layers.
#[derive(Clone, Debug, PartialEq)]
pub enum PaneAction {
    SelectTab { tab_id: TabId },
    CloseTab { tab_id: TabId },
    BreakUpTab { tab_id: TabId },
    ClosePane { tab_id: TabId, pane_id: PaneId },
    ExtractPaneToTab { tab_id: TabId, pane_id: PaneId },
    FocusPane { tab_id: TabId, pane_id: PaneId },
    InsertPane {
        source: PaneSource,
        target_tab: TabId,
        target_pane: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    },
    ResizePane { tab_id: TabId, split_id: SplitId, ratio: f32 },
    EqualizePanes { tab_id: TabId },
    ToggleSplitZoom { tab_id: TabId, pane_id: PaneId },
    MoveTab { tab_id: TabId, to_index: usize },
    MinimizePane { tab_id: TabId, pane_id: PaneId },
    ExpandPane { tab_id: TabId, pane_id: PaneId },
    ResizePaneByDelta { tab_id: TabId, pane_id: PaneId, direction: SplitDirection, amount: f32 },
    MergeTab {
        source_tab: TabId,
        target_tab: TabId,
        target_pane: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    },
    CreateArrangement { tab_id: TabId, name: String, pane_ids: Vec<PaneId> },
    RemoveArrangement { tab_id: TabId, arrangement_id: ArrangementId },
    SwitchArrangement { tab_id: TabId, arrangement_id: ArrangementId },
    RenameArrangement { tab_id: TabId, arrangement_id: ArrangementId, name: String },
    BackgroundPane { tab_id: TabId, pane_id: PaneId },
    ReactivatePane {
        pane_id: PaneId,
        target_tab: TabId,
        target_pane: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    },
    PurgeOrphanedPane { pane_id: PaneId },
    AddDrawerPane { parent_pane_id: PaneId, source: PaneSource },
    RemoveDrawerPane { parent_pane_id: PaneId, pane_id: PaneId },
    ToggleDrawer { parent_pane_id: PaneId },
    SetActiveDrawerPane { parent_pane_id: PaneId, pane_id: Option<PaneId> },
    ResizeDrawerPane { parent_pane_id: PaneId, split_id: SplitId, ratio: f32 },
    EqualizeDrawerPanes { parent_pane_id: PaneId },
    MinimizeDrawerPane { parent_pane_id: PaneId, pane_id: PaneId },
    ExpandDrawerPane { parent_pane_id: PaneId, pane_id: PaneId },
    InsertDrawerPane {
        parent_pane_id: PaneId,
        pane_id: PaneId,
        at: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    },
    MoveDrawerPane {
        parent_pane_id: PaneId,
        pane_id: PaneId,
        at: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    },
    /// Stub variant required for the closed sum type; always rejected by
    /// the validator with `PreconditionFailed` ("superseded by bounded-
    /// stack GC") per the open-question resolution in the design notes.
    ExpireUndoEntry,
    Repair { kind: RepairKind, pane_id: Option<PaneId> },
}
