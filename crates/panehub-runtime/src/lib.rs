//! Per-pane runtime registration and command dispatch.
//!
//! A "runtime" is the behavior backend that interprets input/resize/
//! navigation commands for a pane and emits events back (title changes,
//! split requests, …). The registry never talks to a concrete runtime
//! kind directly — it only sees the `Runtime` trait object, with calls
//! crossing an async boundary because a runtime is an external
//! collaborator process/task.

use async_trait::async_trait;
use panehub_ids::{CommandId, CorrelationId, IdAllocator, PaneId, WorktreeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Input,
    Resize,
    Navigation,
    DiffLoad,
    Lifecycle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeLifecycle {
    Initializing,
    Ready,
    Terminated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeMetadata {
    pub label: String,
    pub worktree_id: Option<WorktreeId>,
}

/// A command sent down to a runtime. Each variant declares the
/// capability a runtime must advertise to accept it.
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeCommand {
    Input { bytes: Vec<u8> },
    Resize { cols: u16, rows: u16 },
    Navigate { path: String },
    LoadDiff { worktree_id: WorktreeId, path: String },
    Shutdown,
}

impl RuntimeCommand {
    pub fn required_capability(&self) -> Capability {
        match self {
            RuntimeCommand::Input { .. } => Capability::Input,
            RuntimeCommand::Resize { .. } => Capability::Resize,
            RuntimeCommand::Navigate { .. } => Capability::Navigation,
            RuntimeCommand::LoadDiff { .. } => Capability::DiffLoad,
            RuntimeCommand::Shutdown => Capability::Lifecycle,
        }
    }
}

/// An event a runtime reports unprompted (title changes, requests to
/// restructure the tab it lives in, …). The coordinator re-enters its
/// own `PaneAction` pipeline for the structural ones (§4.6).
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeEvent {
    TitleChanged { title: String },
    CwdChanged { cwd: String },
    NewSplitRequested { direction: panehub_layout::SplitDirection },
    CloseTabRequested,
    GotoTabRequested { index: usize },
    ResizeSplitRequested { split_id: panehub_ids::SplitId, ratio: f32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandEnvelope {
    pub command_id: CommandId,
    pub correlation_id: CorrelationId,
    pub timestamp_ms: u64,
    pub pane_id: PaneId,
    pub command: RuntimeCommand,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventEnvelope {
    pub pane_id: PaneId,
    pub correlation_id: Option<CorrelationId>,
    pub timestamp_ms: u64,
    pub event: RuntimeEvent,
}

#[async_trait]
pub trait Runtime: Send + Sync {
    fn pane_id(&self) -> PaneId;
    fn lifecycle(&self) -> RuntimeLifecycle;
    fn metadata(&self) -> RuntimeMetadata;
    fn capabilities(&self) -> &HashSet<Capability>;
    async fn handle_command(&self, envelope: CommandEnvelope) -> Result<(), RuntimeError>;
    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EventEnvelope>;
}

/// Monotonic time source for envelope timestamps, injected the same way
/// `panehub_surfaces::Clock` is — so dispatch tests don't depend on wall
/// clock behavior.
pub trait MonotonicClock: Send + Sync {
    fn now_millis(&self) -> u64;
}

pub struct SystemMonotonicClock {
    start: std::time::Instant,
}

impl SystemMonotonicClock {
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

impl Default for SystemMonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemMonotonicClock {
    fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("no runtime registered for pane {0}")]
    BackendUnavailable(PaneId),
    #[error("runtime for pane {0} is not ready")]
    RuntimeNotReady(PaneId),
    #[error("runtime for pane {pane_id} lacks capability {required:?}")]
    UnsupportedCommand { pane_id: PaneId, required: Capability },
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

/// Which pane a dispatched command targets. `ActivePane` defers
/// resolution to whatever the caller currently considers active —
/// the registry itself holds no notion of "active".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchTarget {
    Pane(PaneId),
    ActivePane,
}

/// Registers at most one runtime per pane and carries out the six-step
/// dispatch check from spec §4.7 before handing a command to it.
pub struct RuntimeRegistry {
    runtimes: HashMap<PaneId, Arc<dyn Runtime>>,
    id_allocator: IdAllocator,
    clock: Box<dyn MonotonicClock>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemMonotonicClock::new()))
    }

    pub fn with_clock(clock: Box<dyn MonotonicClock>) -> Self {
        Self { runtimes: HashMap::new(), id_allocator: IdAllocator::new(), clock }
    }

    pub fn register(&mut self, runtime: Arc<dyn Runtime>) {
        let pane_id = runtime.pane_id();
        log::info!(target: "panehub_runtime", "registered runtime for pane {pane_id}");
        self.runtimes.insert(pane_id, runtime);
    }

    /// Cancels the caller's subscription task (the caller owns that
    /// task handle) before this returns the runtime's removal.
    pub fn unregister(&mut self, pane_id: PaneId) -> Option<Arc<dyn Runtime>> {
        log::info!(target: "panehub_runtime", "unregistered runtime for pane {pane_id}");
        self.runtimes.remove(&pane_id)
    }

    pub fn get(&self, pane_id: PaneId) -> Option<&Arc<dyn Runtime>> {
        self.runtimes.get(&pane_id)
    }

    pub fn contains(&self, pane_id: PaneId) -> bool {
        self.runtimes.contains_key(&pane_id)
    }

    pub async fn dispatch_runtime_command(
        &self,
        command: RuntimeCommand,
        target: DispatchTarget,
        active_pane: Option<PaneId>,
        correlation_id: CorrelationId,
    ) -> Result<(), RuntimeError> {
        let pane_id = match target {
            DispatchTarget::Pane(id) => id,
            DispatchTarget::ActivePane => {
                active_pane.ok_or_else(|| RuntimeError::InvalidPayload("no active pane to target".into()))?
            }
        };

        let runtime = self.runtimes.get(&pane_id).ok_or(RuntimeError::BackendUnavailable(pane_id))?;

        if runtime.lifecycle() != RuntimeLifecycle::Ready {
            return Err(RuntimeError::RuntimeNotReady(pane_id));
        }

        let required = command.required_capability();
        if !runtime.capabilities().contains(&required) {
            return Err(RuntimeError::UnsupportedCommand { pane_id, required });
        }

        if let RuntimeCommand::LoadDiff { worktree_id, .. } = &command {
            let metadata = runtime.metadata();
            if metadata.worktree_id != Some(*worktree_id) {
                return Err(RuntimeError::InvalidPayload(format!(
                    "diff-load worktree {worktree_id} does not match runtime's worktree"
                )));
            }
        }

        let envelope = CommandEnvelope {
            command_id: self.id_allocator.allocate(),
            correlation_id,
            timestamp_ms: self.clock.now_millis(),
            pane_id,
            command,
        };

        runtime.handle_command(envelope).await
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    struct FakeRuntime {
        pane_id: PaneId,
        lifecycle: Mutex<RuntimeLifecycle>,
        capabilities: HashSet<Capability>,
        worktree_id: Option<WorktreeId>,
        tx: broadcast::Sender<EventEnvelope>,
        fail_next: Mutex<bool>,
    }

    impl FakeRuntime {
        fn new(pane_id: PaneId, capabilities: HashSet<Capability>) -> Arc<Self> {
            let (tx, _rx) = broadcast::channel(16);
            Arc::new(Self {
                pane_id,
                lifecycle: Mutex::new(RuntimeLifecycle::Ready),
                capabilities,
                worktree_id: None,
                tx,
                fail_next: Mutex::new(false),
            })
        }
    }

    #[async_trait]
    impl Runtime for FakeRuntime {
        fn pane_id(&self) -> PaneId {
            self.pane_id
        }
        fn lifecycle(&self) -> RuntimeLifecycle {
            *self.lifecycle.lock().unwrap()
        }
        fn metadata(&self) -> RuntimeMetadata {
            RuntimeMetadata { label: "fake".into(), worktree_id: self.worktree_id }
        }
        fn capabilities(&self) -> &HashSet<Capability> {
            &self.capabilities
        }
        async fn handle_command(&self, _envelope: CommandEnvelope) -> Result<(), RuntimeError> {
            if std::mem::replace(&mut *self.fail_next.lock().unwrap(), false) {
                return Err(RuntimeError::ExecutionFailed("injected".into()));
            }
            Ok(())
        }
        fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
            self.tx.subscribe()
        }
    }

    fn pane_id() -> PaneId {
        IdAllocator::new().allocate()
    }

    fn correlation_id() -> CorrelationId {
        IdAllocator::new().allocate()
    }

    #[tokio::test]
    async fn dispatch_to_missing_pane_is_backend_unavailable() {
        let registry = RuntimeRegistry::new();
        let pid = pane_id();
        let result = registry
            .dispatch_runtime_command(
                RuntimeCommand::Input { bytes: vec![1] },
                DispatchTarget::Pane(pid),
                None,
                correlation_id(),
            )
            .await;
        assert!(matches!(result, Err(RuntimeError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn dispatch_without_capability_is_unsupported() {
        let mut registry = RuntimeRegistry::new();
        let pid = pane_id();
        registry.register(FakeRuntime::new(pid, HashSet::from([Capability::Input])));
        let result = registry
            .dispatch_runtime_command(
                RuntimeCommand::Resize { cols: 80, rows: 24 },
                DispatchTarget::Pane(pid),
                None,
                correlation_id(),
            )
            .await;
        assert!(matches!(result, Err(RuntimeError::UnsupportedCommand { .. })));
    }

    #[tokio::test]
    async fn dispatch_to_not_ready_runtime_fails() {
        let mut registry = RuntimeRegistry::new();
        let pid = pane_id();
        let runtime = FakeRuntime::new(pid, HashSet::from([Capability::Input]));
        *runtime.lifecycle.lock().unwrap() = RuntimeLifecycle::Initializing;
        registry.register(runtime);
        let result = registry
            .dispatch_runtime_command(
                RuntimeCommand::Input { bytes: vec![1] },
                DispatchTarget::Pane(pid),
                None,
                correlation_id(),
            )
            .await;
        assert!(matches!(result, Err(RuntimeError::RuntimeNotReady(_))));
    }

    #[tokio::test]
    async fn dispatch_active_pane_with_no_active_is_invalid_payload() {
        let registry = RuntimeRegistry::new();
        let result = registry
            .dispatch_runtime_command(
                RuntimeCommand::Input { bytes: vec![1] },
                DispatchTarget::ActivePane,
                None,
                correlation_id(),
            )
            .await;
        assert!(matches!(result, Err(RuntimeError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn successful_dispatch_reaches_runtime() {
        let mut registry = RuntimeRegistry::new();
        let pid = pane_id();
        registry.register(FakeRuntime::new(pid, HashSet::from([Capability::Input])));
        let result = registry
            .dispatch_runtime_command(
                RuntimeCommand::Input { bytes: vec![1, 2, 3] },
                DispatchTarget::Pane(pid),
                None,
                correlation_id(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn diff_load_worktree_mismatch_is_invalid_payload() {
        let mut registry = RuntimeRegistry::new();
        let pid = pane_id();
        registry.register(FakeRuntime::new(pid, HashSet::from([Capability::DiffLoad])));
        let result = registry
            .dispatch_runtime_command(
                RuntimeCommand::LoadDiff { worktree_id: IdAllocator::new().allocate(), path: "a.rs".into() },
                DispatchTarget::Pane(pid),
                None,
                correlation_id(),
            )
            .await;
        assert!(matches!(result, Err(RuntimeError::InvalidPayload(_))));
    }
}
