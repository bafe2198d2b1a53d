//! Post-recipe pane-view restoration and orphan-session cleanup.
//!
//! After the ten-step recipe completes, the coordinator restores panes in
//! stages: the active tab's views are hydrated synchronously so first
//! paint is fast, then remaining tabs are hydrated in chunks with a
//! scheduling yield between chunks (§5's "restoreAllViews yields after
//! each pair of background-tab pane restorations").

use panehub_coordinator::PaneCoordinator;
use panehub_ids::TabId;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// How many background tabs' panes are hydrated before yielding back to
/// the executor.
const CHUNK_SIZE: usize = 2;

/// Orphan PTY/session cleanup races against this timeout; whichever
/// completes first cancels the other, so a hung cleanup never blocks
/// first paint indefinitely.
const ORPHAN_CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreReport {
    pub tabs_restored: usize,
    pub panes_hydrated: usize,
    pub panes_failed: usize,
}

/// Hydrates views for every tab's panes: the active tab first (so the
/// first frame the user sees is fully populated), then the remaining
/// tabs in order, `CHUNK_SIZE` at a time, yielding to the executor
/// between chunks. A pane whose view fails to hydrate is logged and
/// skipped — it stays placed in its layout, view-less, until a `Repair`
/// action recovers it; restoration itself is never aborted by one
/// failed pane.
pub async fn restore_all_views(coordinator: &mut PaneCoordinator) -> RestoreReport {
    let mut report = RestoreReport::default();
    let tab_ids: Vec<TabId> = coordinator.store().data().tabs.iter().map(|t| t.id).collect();
    let active_tab_id = coordinator.store().data().active_tab_id;

    if let Some(active) = active_tab_id {
        hydrate_tab(coordinator, active, &mut report);
    }

    let background_tabs: Vec<TabId> = tab_ids.into_iter().filter(|id| Some(*id) != active_tab_id).collect();
    for chunk in background_tabs.chunks(CHUNK_SIZE) {
        for tab_id in chunk {
            hydrate_tab(coordinator, *tab_id, &mut report);
        }
        tokio::task::yield_now().await;
    }

    report
}

fn hydrate_tab(coordinator: &mut PaneCoordinator, tab_id: TabId, report: &mut RestoreReport) {
    report.tabs_restored += 1;
    for pane_id in coordinator.tab_boot_pane_ids(tab_id) {
        match coordinator.hydrate_pane_view(pane_id) {
            Ok(()) => report.panes_hydrated += 1,
            Err(err) => {
                log::warn!(target: "panehub_boot", "pane {pane_id} in tab {tab_id} failed to hydrate a view: {err}");
                report.panes_failed += 1;
            }
        }
    }
}

/// Runs `cleanup` against a 30-second timeout; whichever finishes first
/// cancels the other. Orphan sessions left behind by a crashed previous
/// run are best-effort — a cleanup that hangs must never delay boot.
pub async fn run_with_orphan_cleanup_timeout<F>(cleanup: F) -> CleanupOutcome
where
    F: Future<Output = ()> + Send,
{
    let cleanup: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(cleanup);
    match tokio::time::timeout(ORPHAN_CLEANUP_TIMEOUT, cleanup).await {
        Ok(()) => CleanupOutcome::Completed,
        Err(_) => CleanupOutcome::TimedOut,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Completed,
    TimedOut,
}

/// A no-op used when a host has no orphan sessions to reclaim (e.g. a
/// fresh install, or a platform with no persistent PTY backend).
pub async fn no_orphan_cleanup() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn orphan_cleanup_completing_quickly_reports_completed() {
        let outcome = run_with_orphan_cleanup_timeout(async {}).await;
        assert_eq!(outcome, CleanupOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn orphan_cleanup_hanging_past_timeout_is_cancelled() {
        let outcome = run_with_orphan_cleanup_timeout(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        })
        .await;
        assert_eq!(outcome, CleanupOutcome::TimedOut);
    }
}
