//! The derived enrichment cache and the coordinator that keeps it, and the
//! canonical store's repo/worktree topology, in sync with `system.topology`
//! and `worktree.*` envelopes.

use crate::envelope::{SystemEnvelope, WorktreeEnvelope};
use panehub_ids::{CorrelationId, RepoId, WorktreeId};
use panehub_store::{Availability, StoreResult, WorkspaceStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Injected so `source_revision`/`last_rebuilt_at` bookkeeping is
/// deterministic in tests instead of reading the wall clock inline.
pub trait EpochClock: Send + Sync {
    fn now_millis(&self) -> u64;
}

pub struct SystemEpochClock;

impl EpochClock for SystemEpochClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoEnrichment {
    pub origin: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorktreeEnrichment {
    pub branch: Option<String>,
    pub lines_added: usize,
    pub lines_removed: usize,
}

/// Mirrors the `{workspaceId}.cache.json` file (§6 external interfaces).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedCache {
    pub repo_enrichment_by_repo_id: HashMap<RepoId, RepoEnrichment>,
    pub worktree_enrichment_by_worktree_id: HashMap<WorktreeId, WorktreeEnrichment>,
    pub pull_request_count_by_worktree_id: HashMap<WorktreeId, u32>,
    pub notification_count_by_worktree_id: HashMap<WorktreeId, u32>,
    pub source_revision: u64,
    pub last_rebuilt_at: Option<u64>,
}

/// Request the filesystem pipeline register or unregister a repo with the
/// forge source, emitted on `originChanged`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeChange {
    RegisterForgeRepo(RepoId),
    UnregisterForgeRepo(RepoId),
}

/// Requests a forge refresh, carrying the correlation id of the event that
/// triggered it so the eventual response can be traced back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForgeRefreshRequest {
    pub worktree_id: WorktreeId,
    pub correlation_id: CorrelationId,
}

/// Consumes topology and enrichment envelopes, mirrors topology changes
/// into the canonical store, and maintains the derived cache. Never holds
/// the store itself — callers own it and pass it in per call, matching
/// the "coordinator is the sole mutator that crosses boundaries" ownership
/// rule the orchestration layer follows.
pub struct CacheCoordinator {
    cache: DerivedCache,
    clock: Box<dyn EpochClock>,
    scope_tx: mpsc::UnboundedSender<ScopeChange>,
    forge_tx: mpsc::UnboundedSender<ForgeRefreshRequest>,
}

impl CacheCoordinator {
    pub fn new(
        clock: Box<dyn EpochClock>,
        scope_tx: mpsc::UnboundedSender<ScopeChange>,
        forge_tx: mpsc::UnboundedSender<ForgeRefreshRequest>,
    ) -> Self {
        Self { cache: DerivedCache::default(), clock, scope_tx, forge_tx }
    }

    /// Resumes from a previously persisted cache file (boot step 2).
    pub fn with_cache(
        cache: DerivedCache,
        clock: Box<dyn EpochClock>,
        scope_tx: mpsc::UnboundedSender<ScopeChange>,
        forge_tx: mpsc::UnboundedSender<ForgeRefreshRequest>,
    ) -> Self {
        Self { cache, clock, scope_tx, forge_tx }
    }

    pub fn cache(&self) -> &DerivedCache {
        &self.cache
    }

    /// `addRepo` / `reconcileDiscoveredWorktrees` / `markRepoUnavailable`.
    pub fn handle_system(&mut self, store: &mut WorkspaceStore, payload: SystemEnvelope) -> StoreResult<()> {
        match payload {
            SystemEnvelope::RepoDiscovered(repo) => {
                let repo_id = repo.id;
                store.append_repo(repo);
                self.cache.repo_enrichment_by_repo_id.entry(repo_id).or_default();
            }
            SystemEnvelope::RepoRemoved(repo_id) => {
                store.mark_repo_availability(repo_id, Availability::Unavailable)?;
            }
            SystemEnvelope::WorktreeRegistered { repo_id, worktree } => {
                let worktree_id = worktree.id;
                store.upsert_worktree(repo_id, worktree)?;
                self.cache.worktree_enrichment_by_worktree_id.entry(worktree_id).or_default();
            }
            SystemEnvelope::WorktreeUnregistered { repo_id, worktree_id } => {
                store.remove_worktree(repo_id, worktree_id)?;
                self.cache.worktree_enrichment_by_worktree_id.remove(&worktree_id);
                self.cache.pull_request_count_by_worktree_id.remove(&worktree_id);
                self.cache.notification_count_by_worktree_id.remove(&worktree_id);
            }
        }
        self.bump_revision();
        Ok(())
    }

    /// Populates the derived cache and, on `originChanged`/`branchChanged`,
    /// requests a scope change or forge refresh back through the channels
    /// supplied at construction.
    pub fn handle_worktree(&mut self, correlation_id: CorrelationId, payload: WorktreeEnvelope) {
        match payload {
            WorktreeEnvelope::GitWorkingDirectory { worktree_id, branch, lines_added, lines_removed } => {
                let entry = self.cache.worktree_enrichment_by_worktree_id.entry(worktree_id).or_default();
                entry.branch = branch;
                entry.lines_added = lines_added;
                entry.lines_removed = lines_removed;
            }
            WorktreeEnvelope::Forge { worktree_id, pull_request_count, notification_count } => {
                self.cache.pull_request_count_by_worktree_id.insert(worktree_id, pull_request_count);
                self.cache.notification_count_by_worktree_id.insert(worktree_id, notification_count);
            }
            WorktreeEnvelope::OriginChanged { repo_id, worktree_id: _, origin } => {
                let registering = origin.is_some();
                self.cache.repo_enrichment_by_repo_id.entry(repo_id).or_default().origin = origin;
                let change = if registering {
                    ScopeChange::RegisterForgeRepo(repo_id)
                } else {
                    ScopeChange::UnregisterForgeRepo(repo_id)
                };
                let _ = self.scope_tx.send(change);
            }
            WorktreeEnvelope::BranchChanged { worktree_id, branch } => {
                self.cache.worktree_enrichment_by_worktree_id.entry(worktree_id).or_default().branch = branch;
                let _ = self.forge_tx.send(ForgeRefreshRequest { worktree_id, correlation_id });
            }
        }
        self.bump_revision();
    }

    fn bump_revision(&mut self) {
        self.cache.source_revision += 1;
        self.cache.last_rebuilt_at = Some(self.clock.now_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panehub_ids::IdAllocator;
    use panehub_store::{Repo, WorkspaceData};

    struct FixedClock(u64);
    impl EpochClock for FixedClock {
        fn now_millis(&self) -> u64 {
            self.0
        }
    }

    fn new_store() -> WorkspaceStore {
        WorkspaceStore::new(WorkspaceData::empty(IdAllocator::new().allocate()), IdAllocator::new())
    }

    fn coordinator() -> (CacheCoordinator, mpsc::UnboundedReceiver<ScopeChange>, mpsc::UnboundedReceiver<ForgeRefreshRequest>) {
        let (scope_tx, scope_rx) = mpsc::unbounded_channel();
        let (forge_tx, forge_rx) = mpsc::unbounded_channel();
        (CacheCoordinator::new(Box::new(FixedClock(42)), scope_tx, forge_tx), scope_rx, forge_rx)
    }

    #[test]
    fn repo_discovered_mirrors_into_store_and_cache() {
        let (mut coordinator, _scope_rx, _forge_rx) = coordinator();
        let mut store = new_store();
        let alloc = IdAllocator::new();
        let repo = Repo {
            id: alloc.allocate(),
            name: "demo".into(),
            repo_path: "/demo".into(),
            stable_key: "demo".into(),
            worktrees: Vec::new(),
            availability: Availability::Available,
        };
        let repo_id = repo.id;

        coordinator.handle_system(&mut store, SystemEnvelope::RepoDiscovered(repo)).unwrap();

        assert!(store.data().repos.iter().any(|r| r.id == repo_id));
        assert!(coordinator.cache().repo_enrichment_by_repo_id.contains_key(&repo_id));
        assert_eq!(coordinator.cache().source_revision, 1);
        assert_eq!(coordinator.cache().last_rebuilt_at, Some(42));
    }

    #[test]
    fn repo_removed_marks_unavailable_without_deleting() {
        let (mut coordinator, _scope_rx, _forge_rx) = coordinator();
        let mut store = new_store();
        let alloc = IdAllocator::new();
        let repo = Repo {
            id: alloc.allocate(),
            name: "demo".into(),
            repo_path: "/demo".into(),
            stable_key: "demo".into(),
            worktrees: Vec::new(),
            availability: Availability::Available,
        };
        let repo_id = repo.id;
        coordinator.handle_system(&mut store, SystemEnvelope::RepoDiscovered(repo)).unwrap();

        coordinator.handle_system(&mut store, SystemEnvelope::RepoRemoved(repo_id)).unwrap();

        let repo = store.data().repos.iter().find(|r| r.id == repo_id).unwrap();
        assert_eq!(repo.availability, Availability::Unavailable);
    }

    #[test]
    fn origin_changed_emits_scope_change() {
        let (mut coordinator, mut scope_rx, _forge_rx) = coordinator();
        let alloc = IdAllocator::new();
        let repo_id = alloc.allocate();
        let worktree_id = alloc.allocate();
        let correlation_id = alloc.allocate();

        coordinator.handle_worktree(
            correlation_id,
            WorktreeEnvelope::OriginChanged { repo_id, worktree_id, origin: Some("git@example.com".into()) },
        );

        assert_eq!(scope_rx.try_recv().unwrap(), ScopeChange::RegisterForgeRepo(repo_id));
        assert_eq!(coordinator.cache().repo_enrichment_by_repo_id[&repo_id].origin.as_deref(), Some("git@example.com"));
    }

    #[test]
    fn branch_changed_requests_forge_refresh_with_triggering_correlation() {
        let (mut coordinator, _scope_rx, mut forge_rx) = coordinator();
        let alloc = IdAllocator::new();
        let worktree_id = alloc.allocate();
        let correlation_id = alloc.allocate();

        coordinator.handle_worktree(correlation_id, WorktreeEnvelope::BranchChanged { worktree_id, branch: Some("main".into()) });

        let request = forge_rx.try_recv().unwrap();
        assert_eq!(request.worktree_id, worktree_id);
        assert_eq!(request.correlation_id, correlation_id);
    }
}
