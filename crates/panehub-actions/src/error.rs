//! The §7 failure taxonomy for action resolution, validation, and runtime
//! command dispatch, as one `thiserror`-derived enum so call sites match
//! exhaustively instead of string-matching.

use panehub_ids::{ArrangementId, PaneId, TabId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("malformed or unresolvable action input: {0}")]
    InvalidPayload(String),

    #[error("action would violate an invariant: {0}")]
    PreconditionFailed(&'static str),

    #[error("no runtime registered for pane {0}")]
    BackendUnavailable(PaneId),

    #[error("runtime for pane {0} is not ready")]
    RuntimeNotReady(PaneId),

    #[error("runtime for pane {0} lacks the capability required for this command")]
    UnsupportedCommand(PaneId),

    #[error("surface creation failed: {0}")]
    SurfaceCreateFailed(String),

    #[error("view for pane {0} could not be found")]
    ViewNotFound(PaneId),

    #[error("popped surface did not match expected pane {expected}")]
    SurfaceMismatch { expected: PaneId },

    #[error("close of tab {0} completed but no undo snapshot could be created")]
    SnapshotUnavailable(TabId),

    #[error("tab {0} not found")]
    TabNotFound(TabId),

    #[error("arrangement {0} not found in tab {1}")]
    ArrangementNotFound(ArrangementId, TabId),
}

pub type ActionResult<T> = Result<T, ActionError>;
