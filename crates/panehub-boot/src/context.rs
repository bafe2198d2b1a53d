//! Shared state threaded through the ten boot steps. Each step fills in
//! the piece of the context its number owns; later steps read what
//! earlier ones produced. Fields are `Option` until their owning step
//! runs so a step reached out of order fails loudly instead of reading
//! stale defaults.

use crate::env::BootEnv;
use panehub_coordinator::{PaneCoordinator, ViewFactory};
use panehub_events::{CachePersistor, CacheCoordinator, DerivedCache, EventBus, FilesystemSource, ForgeRefreshRequest, ForgeSource, GitStatusSource, ScopeChange};
use panehub_ids::WorkspaceId;
use panehub_store::{FileSystemPersistor, PersistenceDriver, UiState, WorkspaceData};
use panehub_surfaces::SurfaceBackend;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

pub struct BootContext {
    pub workspace_id: WorkspaceId,
    pub env: BootEnv,

    pub(crate) persistence: PersistenceDriver,
    pub(crate) cache_persistor: Option<Box<dyn CachePersistor>>,
    pub workspace_data: Option<WorkspaceData>,
    pub ui_state: Option<UiState>,
    pub(crate) loaded_cache: Option<DerivedCache>,

    pub(crate) view_factory: Option<Box<dyn ViewFactory>>,
    pub(crate) surface_backend: Option<Box<dyn SurfaceBackend>>,

    pub(crate) filesystem: Arc<dyn FilesystemSource>,
    pub(crate) forge: Arc<dyn ForgeSource>,
    pub(crate) git_status: Arc<dyn GitStatusSource>,

    pub bus: Option<Arc<EventBus>>,
    pub coordinator: Option<PaneCoordinator>,
    pub cache_coordinator: Option<CacheCoordinator>,

    pub(crate) scope_rx: Option<mpsc::UnboundedReceiver<ScopeChange>>,
    pub(crate) forge_rx: Option<mpsc::UnboundedReceiver<ForgeRefreshRequest>>,
    pub(crate) git_shutdown_tx: Option<watch::Sender<bool>>,

    pub ready: bool,
}

impl BootContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspace_id: WorkspaceId,
        env: BootEnv,
        persistence: PersistenceDriver,
        cache_persistor: Option<Box<dyn CachePersistor>>,
        view_factory: Box<dyn ViewFactory>,
        surface_backend: Box<dyn SurfaceBackend>,
        filesystem: Arc<dyn FilesystemSource>,
        forge: Arc<dyn ForgeSource>,
        git_status: Arc<dyn GitStatusSource>,
    ) -> Self {
        Self {
            workspace_id,
            env,
            persistence,
            cache_persistor,
            workspace_data: None,
            ui_state: None,
            loaded_cache: None,
            view_factory: Some(view_factory),
            surface_backend: Some(surface_backend),
            filesystem,
            forge,
            git_status,
            bus: None,
            coordinator: None,
            cache_coordinator: None,
            scope_rx: None,
            forge_rx: None,
            git_shutdown_tx: None,
            ready: false,
        }
    }

    /// Everything a host needs to run its own event loop after boot:
    /// the filesystem/forge/git collaborators, the channels the cache
    /// coordinator emits scope-change/forge-refresh requests on, and the
    /// shutdown handle for the git projector task the host spawns.
    /// Each piece is taken exactly once — the host owns them from here
    /// on, matching the "coordinator is the sole mutator that crosses
    /// boundaries" ownership rule.
    pub fn take_collaborators(&mut self) -> BootCollaborators {
        BootCollaborators {
            filesystem: self.filesystem.clone(),
            forge: self.forge.clone(),
            git_status: self.git_status.clone(),
            bus: self.bus.clone(),
            scope_rx: self.scope_rx.take(),
            forge_rx: self.forge_rx.take(),
            git_shutdown_tx: self.git_shutdown_tx.take(),
        }
    }

    pub fn coordinator_mut(&mut self) -> Option<&mut PaneCoordinator> {
        self.coordinator.as_mut()
    }

    pub fn cache_coordinator_mut(&mut self) -> Option<&mut CacheCoordinator> {
        self.cache_coordinator.as_mut()
    }
}

/// External-collaborator handles and channels a host pulls out of the
/// context once boot completes, to run its own event loop.
pub struct BootCollaborators {
    pub filesystem: Arc<dyn FilesystemSource>,
    pub forge: Arc<dyn ForgeSource>,
    pub git_status: Arc<dyn GitStatusSource>,
    pub bus: Option<Arc<EventBus>>,
    pub scope_rx: Option<mpsc::UnboundedReceiver<ScopeChange>>,
    pub forge_rx: Option<mpsc::UnboundedReceiver<ForgeRefreshRequest>>,
    pub git_shutdown_tx: Option<watch::Sender<bool>>,
}

/// Re-exported so hosts wiring `PersistenceDriver::new` don't need a
/// direct `panehub-store` dependency just for the default persistor.
pub type DefaultPersistor = FileSystemPersistor;
