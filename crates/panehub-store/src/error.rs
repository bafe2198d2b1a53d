use panehub_ids::{PaneId, RepoId, TabId};
use thiserror::Error;

/// Failure taxonomy for `WorkspaceStore` mutations and persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pane {0} not found in store")]
    PaneNotFound(PaneId),
    #[error("tab {0} not found in store")]
    TabNotFound(TabId),
    #[error("repo {0} not found in store")]
    RepoNotFound(RepoId),
    #[error("arrangement {0} not found in tab {1}")]
    ArrangementNotFound(panehub_ids::ArrangementId, TabId),
    #[error("pane {0} is already placed in a tab")]
    PaneAlreadyPlaced(PaneId),
    #[error("precondition failed: {0}")]
    PreconditionFailed(&'static str),
    #[error("io error persisting workspace: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed workspace file: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
