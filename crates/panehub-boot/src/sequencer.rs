//! Drives the ten-step boot recipe in order, then restores pane views in
//! stages. Each step's completion is a structured trace line
//! (`log::info!(target: "panehub_boot", ...)`), matching spec's
//! "each step records a structured trace line."

use crate::context::BootContext;
use crate::restore::{restore_all_views, run_with_orphan_cleanup_timeout, CleanupOutcome, RestoreReport};
use crate::steps::{default_recipe, BootStep};
use std::future::Future;

pub struct BootSequencer {
    steps: Vec<Box<dyn BootStep>>,
}

/// What boot produced: the hydrated coordinator and cache coordinator
/// live inside `ctx`; this is just the summary a host logs or surfaces
/// in a diagnostics panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootOutcome {
    pub steps_completed: usize,
    pub restore: RestoreReport,
    pub orphan_cleanup: CleanupOutcome,
}

impl Default for BootSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl BootSequencer {
    pub fn new() -> Self {
        Self { steps: default_recipe() }
    }

    /// Builds a sequencer from a custom recipe, for hosts/tests that want
    /// to substitute or reorder steps.
    pub fn with_steps(steps: Vec<Box<dyn BootStep>>) -> Self {
        Self { steps }
    }

    /// Runs every step in order, aborting on the first failure (a boot
    /// step failing is not recoverable — the host should surface the
    /// error and decline to present a broken workspace). `orphan_cleanup`
    /// runs concurrently with the recipe, racing the 30-second timeout
    /// described in §5; once the recipe signals ready, pane views are
    /// restored in stages.
    pub async fn run<F>(mut self, ctx: &mut BootContext, orphan_cleanup: F) -> anyhow::Result<BootOutcome>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cleanup_handle = tokio::spawn(run_with_orphan_cleanup_timeout(orphan_cleanup));

        let mut steps_completed = 0;
        for (index, step) in self.steps.iter_mut().enumerate() {
            log::info!(target: "panehub_boot", "step {}/{} starting: {}", index + 1, self.steps.len(), step.name());
            step.run(ctx).await.map_err(|err| {
                log::error!(target: "panehub_boot", "step {}/{} ({}) failed: {err}", index + 1, self.steps.len(), step.name());
                err
            })?;
            log::info!(target: "panehub_boot", "step {}/{} complete: {}", index + 1, self.steps.len(), step.name());
            steps_completed += 1;
        }

        let restore = if let Some(coordinator) = ctx.coordinator.as_mut() {
            restore_all_views(coordinator).await
        } else {
            RestoreReport::default()
        };
        log::info!(
            target: "panehub_boot",
            "restored {} tabs, {} panes hydrated, {} failed",
            restore.tabs_restored, restore.panes_hydrated, restore.panes_failed
        );

        let orphan_cleanup = cleanup_handle.await.unwrap_or(CleanupOutcome::TimedOut);

        Ok(BootOutcome { steps_completed, restore, orphan_cleanup })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::BootEnv;
    use panehub_coordinator::{ViewCreationError, ViewFactory};
    use panehub_events::{InMemoryFilesystemSource, InMemoryForgeSource, WorktreeEnvelope};
    use panehub_ids::IdAllocator;
    use panehub_store::{FileSystemPersistor, PersistenceDriver, PaneContent, PaneMetadata};
    use panehub_surfaces::{OpaqueHandle, SurfaceBackend, SurfaceConfig, SurfaceMetadata, SurfaceResult};
    use panehub_views::{PaneView, PaneViewKind};
    use std::sync::Arc;

    struct NoopView(panehub_ids::PaneId);
    impl PaneView for NoopView {
        fn pane_id(&self) -> panehub_ids::PaneId {
            self.0
        }
        fn kind(&self) -> PaneViewKind {
            PaneViewKind::Terminal
        }
        fn surface_id_if_terminal(&self) -> Option<panehub_ids::SurfaceId> {
            None
        }
        fn teardown(&mut self) {}
    }

    struct NoopViewFactory;
    impl ViewFactory for NoopViewFactory {
        fn create_view(
            &self,
            pane_id: panehub_ids::PaneId,
            _content: &PaneContent,
            _metadata: &PaneMetadata,
        ) -> Result<Box<dyn PaneView>, ViewCreationError> {
            Ok(Box::new(NoopView(pane_id)))
        }
    }

    struct NoopSurfaceBackend;
    impl SurfaceBackend for NoopSurfaceBackend {
        fn create(&self, _config: &SurfaceConfig, _metadata: &SurfaceMetadata) -> SurfaceResult<OpaqueHandle> {
            Ok(Arc::new(()))
        }
        fn destroy(&self, _handle: &OpaqueHandle) {}
        fn set_focused(&self, _handle: &OpaqueHandle, _focused: bool) {}
    }

    struct NoGitStatus;
    #[async_trait::async_trait]
    impl panehub_events::GitStatusSource for NoGitStatus {
        async fn status(&self, _worktree_id: panehub_ids::WorktreeId, _path: &str) -> Option<panehub_events::GitStatusSample> {
            None
        }
    }

    fn test_context(root: &std::path::Path) -> BootContext {
        let alloc = IdAllocator::new();
        let workspace_id = alloc.allocate();
        let persistence = PersistenceDriver::new(Box::new(FileSystemPersistor::new(root)));
        BootContext::new(
            workspace_id,
            BootEnv::from_vars(|_| None),
            persistence,
            None,
            Box::new(NoopViewFactory),
            Box::new(NoopSurfaceBackend),
            Arc::new(InMemoryFilesystemSource::new(Vec::new())),
            Arc::new(InMemoryForgeSource::new(WorktreeEnvelope::Forge {
                worktree_id: alloc.allocate(),
                pull_request_count: 0,
                notification_count: 0,
            })),
            Arc::new(NoGitStatus),
        )
    }

    #[tokio::test]
    async fn runs_all_ten_steps_and_signals_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        let sequencer = BootSequencer::new();

        let outcome = sequencer.run(&mut ctx, crate::restore::no_orphan_cleanup()).await.unwrap();

        assert_eq!(outcome.steps_completed, 10);
        assert!(ctx.ready);
        assert!(ctx.coordinator.is_some());
        assert_eq!(outcome.orphan_cleanup, CleanupOutcome::Completed);
    }

    #[tokio::test]
    async fn restores_the_active_tabs_pane_view_on_boot() {
        use panehub_ids::{ArrangementId, TabId};
        use panehub_layout::Layout;
        use panehub_store::{Arrangement, FileSystemPersistor, Lifetime, Persistor, Residency, Tab, WorkspaceData, WorkspaceStore};

        let dir = tempfile::tempdir().unwrap();
        let alloc = IdAllocator::new();
        let workspace_id = alloc.allocate();

        // Seed a one-tab, one-pane workspace file, as if written by a
        // previous session.
        let mut store = WorkspaceStore::new(WorkspaceData::empty(workspace_id), IdAllocator::new());
        let pane = store.create_pane(PaneContent::Terminal, "pty", Lifetime::Persistent, Residency::Active, PaneMetadata::default());
        let arrangement_id: ArrangementId = alloc.allocate();
        let tab_id: TabId = alloc.allocate();
        store.append_tab(Tab {
            id: tab_id,
            arrangements: vec![Arrangement {
                id: arrangement_id,
                name: "Default".into(),
                is_default: true,
                layout: Layout::single(pane.id),
                minimized_pane_ids: Vec::new(),
            }],
            active_arrangement_id: arrangement_id,
            active_pane_id: Some(pane.id),
            zoomed_pane_id: None,
        });
        store.set_active_tab(tab_id).unwrap();
        FileSystemPersistor::new(dir.path()).save_workspace(store.data()).unwrap();

        let persistence = PersistenceDriver::new(Box::new(FileSystemPersistor::new(dir.path())));
        let mut ctx = BootContext::new(
            workspace_id,
            BootEnv::from_vars(|_| None),
            persistence,
            None,
            Box::new(NoopViewFactory),
            Box::new(NoopSurfaceBackend),
            Arc::new(InMemoryFilesystemSource::new(Vec::new())),
            Arc::new(InMemoryForgeSource::new(WorktreeEnvelope::Forge {
                worktree_id: alloc.allocate(),
                pull_request_count: 0,
                notification_count: 0,
            })),
            Arc::new(NoGitStatus),
        );

        let outcome = BootSequencer::new().run(&mut ctx, crate::restore::no_orphan_cleanup()).await.unwrap();

        assert_eq!(outcome.restore.tabs_restored, 1);
        assert_eq!(outcome.restore.panes_hydrated, 1);
        assert_eq!(outcome.restore.panes_failed, 0);
        assert!(ctx.coordinator_mut().unwrap().views().contains(pane.id));
    }
}
