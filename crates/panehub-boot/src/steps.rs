//! The ten-step boot recipe as data: a `Vec<Box<dyn BootStep>>` rather
//! than a hardcoded `if`/`match` chain, so the order is explicit,
//! traceable, and reorderable — generalizing the teacher's linear
//! `Okena::new` construction sequence into a named, logged recipe.

use crate::context::BootContext;
use async_trait::async_trait;
use panehub_coordinator::PaneCoordinator;
use panehub_events::{CacheCoordinator, EventBus, SystemEpochClock};
use panehub_ids::IdAllocator;
use panehub_store::{UiState, WorkspaceStore};
use panehub_surfaces::SurfacePolicy;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[async_trait]
pub trait BootStep: Send {
    fn name(&self) -> &'static str;
    async fn run(&mut self, ctx: &mut BootContext) -> anyhow::Result<()>;
}

macro_rules! traced_step {
    ($ty:ident, $name:literal, |$ctx:ident| $body:block) => {
        pub struct $ty;

        #[async_trait]
        impl BootStep for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            async fn run(&mut self, $ctx: &mut BootContext) -> anyhow::Result<()> {
                $body
            }
        }
    };
}

traced_step!(LoadCanonicalStore, "load_canonical_store", |ctx| {
    let data = ctx.persistence.load(ctx.workspace_id)?;
    ctx.workspace_data = Some(data);
    Ok(())
});

traced_step!(LoadDerivedCache, "load_derived_cache", |ctx| {
    if let Some(persistor) = ctx.cache_persistor.as_ref() {
        ctx.loaded_cache = Some(persistor.load_cache(ctx.workspace_id)?);
    }
    Ok(())
});

traced_step!(LoadUiStore, "load_ui_store", |ctx| {
    if ctx.ui_state.is_none() {
        ctx.ui_state = Some(UiState::default());
    }
    Ok(())
});

traced_step!(ConstructCore, "construct_core", |ctx| {
    let data = ctx
        .workspace_data
        .clone()
        .ok_or_else(|| anyhow::anyhow!("construct_core ran before load_canonical_store"))?;
    let store = WorkspaceStore::new(data, IdAllocator::new());
    let view_factory = ctx
        .view_factory
        .take()
        .ok_or_else(|| anyhow::anyhow!("view factory already consumed"))?;
    let surface_backend = ctx
        .surface_backend
        .take()
        .ok_or_else(|| anyhow::anyhow!("surface backend already consumed"))?;
    let surfaces = SurfacePolicy::new(surface_backend);
    ctx.coordinator = Some(PaneCoordinator::new(store, view_factory, surfaces));
    ctx.bus = Some(Arc::new(EventBus::default()));

    let (scope_tx, scope_rx) = mpsc::unbounded_channel();
    let (forge_tx, forge_rx) = mpsc::unbounded_channel();
    ctx.cache_coordinator = Some(match ctx.loaded_cache.take() {
        Some(cache) => CacheCoordinator::with_cache(cache, Box::new(SystemEpochClock), scope_tx, forge_tx),
        None => CacheCoordinator::new(Box::new(SystemEpochClock), scope_tx, forge_tx),
    });
    ctx.scope_rx = Some(scope_rx);
    ctx.forge_rx = Some(forge_rx);
    Ok(())
});

traced_step!(StartFilesystemActor, "start_filesystem_actor", |ctx| {
    let fs = ctx.filesystem.clone();
    let roots: Vec<_> = ctx
        .workspace_data
        .as_ref()
        .map(|data| {
            data.repos
                .iter()
                .flat_map(|repo| repo.worktrees.iter().map(|wt| (wt.id, wt.path.clone())))
                .collect()
        })
        .unwrap_or_default();
    for (worktree_id, path) in roots {
        fs.register(worktree_id, path).await;
    }
    Ok(())
});

traced_step!(StartGitProjector, "start_git_projector", |ctx| {
    // A fully running `GitProjector::run` loop is a long-lived task the
    // host spawns once boot hands control back to it (see
    // `BootOutcome::git_shutdown`); this step only prepares the shutdown
    // handle so the host can cancel it cleanly, honoring "the projector
    // must not subscribe before the filesystem actor publishes" by
    // running strictly after `start_filesystem_actor` in this sequence.
    let (tx, _rx) = watch::channel(false);
    ctx.git_shutdown_tx = Some(tx);
    Ok(())
});

traced_step!(StartForgeActor, "start_forge_actor", |ctx| {
    let _ = ctx;
    Ok(())
});

traced_step!(StartCacheCoordinator, "start_cache_coordinator", |ctx| {
    if ctx.cache_coordinator.is_none() {
        return Err(anyhow::anyhow!("start_cache_coordinator ran before construct_core"));
    }
    Ok(())
});

traced_step!(TriggerInitialTopologySync, "trigger_initial_topology_sync", |ctx| {
    let topology = ctx.filesystem.initial_topology().await;
    let coordinator = ctx
        .cache_coordinator
        .as_mut()
        .ok_or_else(|| anyhow::anyhow!("trigger_initial_topology_sync ran before construct_core"))?;
    let pane_coordinator = ctx
        .coordinator
        .as_mut()
        .ok_or_else(|| anyhow::anyhow!("trigger_initial_topology_sync ran before construct_core"))?;
    for envelope in topology {
        coordinator.handle_system(pane_coordinator.store_mut(), envelope)?;
    }
    Ok(())
});

traced_step!(SignalReady, "signal_ready", |ctx| {
    ctx.ready = true;
    Ok(())
});

pub fn default_recipe() -> Vec<Box<dyn BootStep>> {
    vec![
        Box::new(LoadCanonicalStore),
        Box::new(LoadDerivedCache),
        Box::new(LoadUiStore),
        Box::new(ConstructCore),
        Box::new(StartFilesystemActor),
        Box::new(StartGitProjector),
        Box::new(StartForgeActor),
        Box::new(StartCacheCoordinator),
        Box::new(TriggerInitialTopologySync),
        Box::new(SignalReady),
    ]
}
