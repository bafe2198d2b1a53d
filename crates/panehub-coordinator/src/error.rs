//! `CoordinatorError` collects the §7 failure taxonomy that crosses crate
//! boundaries into one enum, via `#[from]` on each collaborator's own
//! error type, so `PaneCoordinator::execute` callers match exhaustively
//! instead of string-matching across four different error enums.

use panehub_actions::ActionError;
use panehub_ids::PaneId;
use panehub_runtime::RuntimeError;
use panehub_store::StoreError;
use panehub_surfaces::SurfaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("close of tab proceeded but no undo snapshot could be created")]
    SnapshotUnavailable,

    #[error("view for pane {0} could not be restored")]
    ViewRestoreFailed(PaneId),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
