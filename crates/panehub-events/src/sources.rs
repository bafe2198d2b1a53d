//! Traits for the filesystem and forge collaborators. Wiring a real
//! `git2`/forge-API-backed implementation is a host concern; these trait
//! boundaries plus the in-memory test doubles below are what make
//! `CacheCoordinator` independently testable.

use crate::cache::{ForgeRefreshRequest, ScopeChange};
use crate::envelope::{SystemEnvelope, WorktreeEnvelope};
use async_trait::async_trait;
use panehub_ids::WorktreeId;
use std::sync::Mutex;

/// §6's inbound collaborator interface: the filesystem/git discovery
/// actor the core drives but never implements. `register`/`unregister`
/// scope which worktree roots are watched; `set_activity` and
/// `set_active_pane_worktree` let the actor prioritize the worktree the
/// user is actually looking at over background ones.
#[async_trait]
pub trait FilesystemSource: Send + Sync {
    /// Emits the repo/worktree topology known at boot (step 9's "initial
    /// topology sync").
    async fn initial_topology(&self) -> Vec<SystemEnvelope>;

    /// Applies a forge-registration scope change requested by the cache
    /// coordinator on `originChanged`.
    async fn apply_scope_change(&self, change: ScopeChange);

    /// Starts watching `root_path` for `worktree_id`. Called once per
    /// worktree known at boot (step 9) and again whenever the store
    /// discovers a worktree mid-session.
    async fn register(&self, worktree_id: WorktreeId, root_path: String);

    /// Stops watching a worktree removed from the store.
    async fn unregister(&self, worktree_id: WorktreeId);

    /// Hints whether `worktree_id` has a pane open anywhere in the app,
    /// so the actor can deprioritize polling for worktrees with no
    /// visible pane.
    async fn set_activity(&self, worktree_id: WorktreeId, is_active_in_app: bool);

    /// The worktree backing the currently active pane, if any — the
    /// actor's highest-priority watch target.
    async fn set_active_pane_worktree(&self, worktree_id: Option<WorktreeId>);
}

#[async_trait]
pub trait ForgeSource: Send + Sync {
    async fn refresh(&self, request: ForgeRefreshRequest) -> WorktreeEnvelope;
}

/// In-memory `FilesystemSource` fixture: returns a canned topology and
/// records every scope change and registration call it is asked to make,
/// for assertions.
#[derive(Default)]
pub struct InMemoryFilesystemSource {
    topology: Vec<SystemEnvelope>,
    applied: Mutex<Vec<ScopeChange>>,
    registered: Mutex<Vec<WorktreeId>>,
    active_pane_worktree: Mutex<Option<WorktreeId>>,
}

impl InMemoryFilesystemSource {
    pub fn new(topology: Vec<SystemEnvelope>) -> Self {
        Self { topology, applied: Mutex::new(Vec::new()), registered: Mutex::new(Vec::new()), active_pane_worktree: Mutex::new(None) }
    }

    pub fn applied_scope_changes(&self) -> Vec<ScopeChange> {
        self.applied.lock().expect("lock poisoned").clone()
    }

    pub fn registered_worktrees(&self) -> Vec<WorktreeId> {
        self.registered.lock().expect("lock poisoned").clone()
    }

    pub fn active_pane_worktree(&self) -> Option<WorktreeId> {
        *self.active_pane_worktree.lock().expect("lock poisoned")
    }
}

#[async_trait]
impl FilesystemSource for InMemoryFilesystemSource {
    async fn initial_topology(&self) -> Vec<SystemEnvelope> {
        self.topology.clone()
    }

    async fn apply_scope_change(&self, change: ScopeChange) {
        self.applied.lock().expect("lock poisoned").push(change);
    }

    async fn register(&self, worktree_id: WorktreeId, _root_path: String) {
        self.registered.lock().expect("lock poisoned").push(worktree_id);
    }

    async fn unregister(&self, worktree_id: WorktreeId) {
        self.registered.lock().expect("lock poisoned").retain(|id| *id != worktree_id);
    }

    async fn set_activity(&self, _worktree_id: WorktreeId, _is_active_in_app: bool) {}

    async fn set_active_pane_worktree(&self, worktree_id: Option<WorktreeId>) {
        *self.active_pane_worktree.lock().expect("lock poisoned") = worktree_id;
    }
}

/// In-memory `ForgeSource` fixture: answers refresh requests from a fixed
/// canned response regardless of the request, which is enough to exercise
/// the request/response wiring in tests.
pub struct InMemoryForgeSource {
    response: WorktreeEnvelope,
}

impl InMemoryForgeSource {
    pub fn new(response: WorktreeEnvelope) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ForgeSource for InMemoryForgeSource {
    async fn refresh(&self, _request: ForgeRefreshRequest) -> WorktreeEnvelope {
        self.response.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panehub_ids::IdAllocator;

    #[tokio::test]
    async fn filesystem_source_records_applied_scope_changes() {
        let source = InMemoryFilesystemSource::new(Vec::new());
        let alloc = IdAllocator::new();
        source.apply_scope_change(ScopeChange::RegisterForgeRepo(alloc.allocate())).await;
        assert_eq!(source.applied_scope_changes().len(), 1);
    }

    #[tokio::test]
    async fn filesystem_source_tracks_registered_worktrees() {
        let source = InMemoryFilesystemSource::new(Vec::new());
        let alloc = IdAllocator::new();
        let worktree_id: WorktreeId = alloc.allocate();
        source.register(worktree_id, "/repo/wt".into()).await;
        assert_eq!(source.registered_worktrees(), vec![worktree_id]);
        source.unregister(worktree_id).await;
        assert!(source.registered_worktrees().is_empty());
    }

    #[tokio::test]
    async fn forge_source_returns_canned_response() {
        let alloc = IdAllocator::new();
        let worktree_id = alloc.allocate();
        let source = InMemoryForgeSource::new(WorktreeEnvelope::Forge {
            worktree_id,
            pull_request_count: 3,
            notification_count: 1,
        });
        let response = source
            .refresh(ForgeRefreshRequest { worktree_id, correlation_id: alloc.allocate() })
            .await;
        assert_eq!(
            response,
            WorktreeEnvelope::Forge { worktree_id, pull_request_count: 3, notification_count: 1 }
        );
    }
}
