//! The git projector: polls each tracked worktree's status on an interval
//! and publishes `worktree.gitWorkingDirectory` envelopes onto the bus.
//!
//! Shaped after a centralized poll loop over visible worktrees, comparing
//! against the previously observed status and only publishing on change
//! (so idle worktrees produce no bus traffic).

use crate::bus::EventBus;
use crate::envelope::{EnvelopeSource, RuntimeEnvelope, WorktreeEnvelope};
use async_trait::async_trait;
use panehub_ids::{CorrelationId, IdAllocator, WorktreeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GitStatusSample {
    pub branch: Option<String>,
    pub lines_added: usize,
    pub lines_removed: usize,
}

#[async_trait]
pub trait GitStatusSource: Send + Sync {
    async fn status(&self, worktree_id: WorktreeId, path: &str) -> Option<GitStatusSample>;
}

pub struct GitProjector {
    source: Arc<dyn GitStatusSource>,
    bus: Arc<EventBus>,
    interval: Duration,
    id_allocator: IdAllocator,
}

impl GitProjector {
    pub fn new(source: Arc<dyn GitStatusSource>, bus: Arc<EventBus>, interval: Duration) -> Self {
        Self { source, bus, interval, id_allocator: IdAllocator::new() }
    }

    /// Polls `worktrees` until `shutdown` reports `true`. Each tick fetches
    /// every worktree's status (concurrently would be a host optimization;
    /// here sequentially, matching the scale of a single developer's open
    /// repos) and publishes only the ones that changed since last tick.
    pub async fn run(&self, worktrees: Vec<(WorktreeId, String)>, mut shutdown: watch::Receiver<bool>) {
        let mut last: HashMap<WorktreeId, GitStatusSample> = HashMap::new();
        loop {
            for (worktree_id, path) in &worktrees {
                let Some(sample) = self.source.status(*worktree_id, path).await else {
                    continue;
                };
                if last.get(worktree_id) == Some(&sample) {
                    continue;
                }
                last.insert(*worktree_id, sample.clone());
                let correlation_id: CorrelationId = self.id_allocator.allocate();
                self.bus.publish(RuntimeEnvelope::Worktree {
                    correlation_id,
                    source: EnvelopeSource::Git,
                    payload: WorktreeEnvelope::GitWorkingDirectory {
                        worktree_id: *worktree_id,
                        branch: sample.branch,
                        lines_added: sample.lines_added,
                        lines_removed: sample.lines_removed,
                    },
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedStatusSource(Mutex<HashMap<WorktreeId, GitStatusSample>>);

    #[async_trait]
    impl GitStatusSource for FixedStatusSource {
        async fn status(&self, worktree_id: WorktreeId, _path: &str) -> Option<GitStatusSample> {
            self.0.lock().expect("lock poisoned").get(&worktree_id).cloned()
        }
    }

    #[tokio::test]
    async fn publishes_only_on_change_then_stops_on_shutdown() {
        let alloc = IdAllocator::new();
        let worktree_id: WorktreeId = alloc.allocate();
        let mut statuses = HashMap::new();
        statuses.insert(
            worktree_id,
            GitStatusSample { branch: Some("main".into()), lines_added: 1, lines_removed: 0 },
        );
        let source = Arc::new(FixedStatusSource(Mutex::new(statuses)));
        let bus = Arc::new(EventBus::default());
        let mut subscriber = bus.subscribe();
        let projector = GitProjector::new(source, bus, Duration::from_millis(5));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn({
            let worktrees = vec![(worktree_id, "/repo".to_string())];
            async move { projector.run(worktrees, shutdown_rx).await }
        });

        let envelope = tokio::time::timeout(Duration::from_secs(1), subscriber.recv())
            .await
            .expect("timed out waiting for envelope")
            .unwrap();
        assert!(matches!(envelope, RuntimeEnvelope::Worktree { payload: WorktreeEnvelope::GitWorkingDirectory { .. }, .. }));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.expect("projector did not stop").unwrap();
    }
}
