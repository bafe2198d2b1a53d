//! Canonical workspace state: the single-writer store, its data model, and
//! file-backed persistence.

mod error;
mod model;
mod persistence;
mod store;
mod ui_state;

pub use error::{StoreError, StoreResult};
pub use model::{
    Arrangement, Availability, CloseSnapshot, Drawer, Lifetime, Pane, PaneContent, PaneMetadata, ReinsertHint,
    Repo, Residency, Tab, WorkspaceData, Worktree, CURRENT_SCHEMA_VERSION,
};
pub use persistence::{FileSystemPersistor, PersistenceDriver, Persistor};
pub use store::WorkspaceStore;
pub use ui_state::{FileSystemUiStatePersistor, UiState, UiStatePersistor};
