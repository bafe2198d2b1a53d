//! Terminal surface lifecycle, independent of the renderer's internals.
//!
//! The core never spawns a PTY directly; it delegates to an injected
//! `SurfaceBackend` trait object. `Clock` is injected the same way so TTL
//! expiry can be driven deterministically in tests instead of calling
//! `Instant::now()` inline.

use panehub_ids::{IdAllocator, PaneId, SurfaceId};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// An opaque handle to a live surface. The core never interprets its
/// contents; hosts downcast it to their concrete renderer/PTY type.
pub type OpaqueHandle = Arc<dyn Any + Send + Sync>;

/// Host-supplied spawn configuration. Left intentionally thin — the PTY
/// backend is an external collaborator (§1's explicit out-of-scope list).
#[derive(Clone, Debug, Default)]
pub struct SurfaceConfig {
    pub cwd: String,
    pub shell: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SurfaceMetadata {
    pub pane_id: PaneId,
    pub title: String,
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface backend failed to create surface: {0}")]
    BackendFailure(String),
    #[error("surface {0} not found")]
    NotFound(SurfaceId),
    #[error("surface {0} is already attached")]
    AlreadyAttached(SurfaceId),
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Why a surface is being detached. `Hide` keeps it alive for reattach;
/// `Close` pushes it onto the undo-close stack; `Move` is neutral (the
/// surface is about to be reattached elsewhere in the same operation).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetachReason {
    Hide,
    Close,
    Move,
}

/// The host-implemented lifecycle for a concrete surface kind (terminal
/// PTY, embedded webview process, …). One backend per `SurfacePolicy`.
pub trait SurfaceBackend: Send + Sync {
    fn create(&self, config: &SurfaceConfig, metadata: &SurfaceMetadata) -> SurfaceResult<OpaqueHandle>;
    fn destroy(&self, handle: &OpaqueHandle);
    fn set_focused(&self, handle: &OpaqueHandle, focused: bool);
}

/// Injected time source so TTL-based undo expiry is deterministic in
/// tests, rather than calling platform/clock APIs inline.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Clone)]
pub struct ManagedSurface {
    pub id: SurfaceId,
    pub handle: OpaqueHandle,
    pub metadata: SurfaceMetadata,
}

struct AttachedEntry {
    surface: ManagedSurface,
    pane_id: Option<PaneId>,
}

struct ClosedEntry {
    surface: ManagedSurface,
    closed_at: Instant,
}

const DEFAULT_UNDO_TTL: Duration = Duration::from_secs(5 * 60);

/// Lifecycle policy for terminal surfaces: create/attach/detach/destroy,
/// a single focused surface at a time, and a TTL-bounded undo-close
/// stack (LIFO) that the coordinator drains in its own close-undo path.
pub struct SurfacePolicy {
    backend: Box<dyn SurfaceBackend>,
    clock: Box<dyn Clock>,
    id_allocator: IdAllocator,
    live: HashMap<SurfaceId, AttachedEntry>,
    undo_stack: Vec<ClosedEntry>,
    focused: Option<SurfaceId>,
    undo_ttl: Duration,
    cwd_tx: tokio::sync::mpsc::UnboundedSender<(PaneId, String)>,
    cwd_rx: Option<tokio::sync::mpsc::UnboundedReceiver<(PaneId, String)>>,
}

impl SurfacePolicy {
    pub fn new(backend: Box<dyn SurfaceBackend>) -> Self {
        Self::with_clock_and_ttl(backend, Box::new(SystemClock), DEFAULT_UNDO_TTL)
    }

    pub fn with_clock_and_ttl(backend: Box<dyn SurfaceBackend>, clock: Box<dyn Clock>, undo_ttl: Duration) -> Self {
        let (cwd_tx, cwd_rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            backend,
            clock,
            id_allocator: IdAllocator::new(),
            live: HashMap::new(),
            undo_stack: Vec::new(),
            focused: None,
            undo_ttl,
            cwd_tx,
            cwd_rx: Some(cwd_rx),
        }
    }

    pub fn create_surface(&mut self, config: SurfaceConfig, metadata: SurfaceMetadata) -> SurfaceResult<ManagedSurface> {
        let handle = self.backend.create(&config, &metadata).map_err(|e| {
            log::warn!(target: "panehub_surfaces", "surface creation failed for pane {}: {e}", metadata.pane_id);
            e
        })?;
        let id: SurfaceId = self.id_allocator.allocate();
        let surface = ManagedSurface { id, handle, metadata };
        self.live.insert(id, AttachedEntry { surface: surface.clone(), pane_id: None });
        Ok(surface)
    }

    /// Marks the surface as active against `pane_id` and returns its
    /// handle for display. `None` if the surface isn't known.
    pub fn attach(&mut self, surface_id: SurfaceId, to: PaneId) -> Option<OpaqueHandle> {
        let entry = self.live.get_mut(&surface_id)?;
        entry.pane_id = Some(to);
        Some(entry.surface.handle.clone())
    }

    pub fn detach(&mut self, surface_id: SurfaceId, reason: DetachReason) {
        match reason {
            DetachReason::Hide | DetachReason::Move => {
                if let Some(entry) = self.live.get_mut(&surface_id) {
                    entry.pane_id = None;
                }
            }
            DetachReason::Close => {
                if let Some(entry) = self.live.remove(&surface_id) {
                    if self.focused == Some(surface_id) {
                        self.focused = None;
                    }
                    self.undo_stack.push(ClosedEntry { surface: entry.surface, closed_at: self.clock.now() });
                }
            }
        }
    }

    /// Pops the most recently closed surface if it is still within its
    /// TTL. Surfaces older than the TTL are destroyed and skipped.
    pub fn undo_close(&mut self) -> Option<ManagedSurface> {
        loop {
            let top = self.undo_stack.pop()?;
            let age = self.clock.now().saturating_duration_since(top.closed_at);
            if age > self.undo_ttl {
                log::info!(
                    target: "panehub_surfaces",
                    "surface {} aged out of undo stack ({:?} > {:?}); destroying",
                    top.surface.id, age, self.undo_ttl
                );
                self.backend.destroy(&top.surface.handle);
                continue;
            }
            return Some(top.surface);
        }
    }

    /// If a consumer popped a surface but the metadata didn't match what
    /// it expected, it puts the surface back on top rather than losing it.
    pub fn requeue_undo(&mut self, surface: ManagedSurface) {
        self.undo_stack.push(ClosedEntry { surface, closed_at: self.clock.now() });
    }

    pub fn destroy(&mut self, surface_id: SurfaceId) {
        if let Some(entry) = self.live.remove(&surface_id) {
            if self.focused == Some(surface_id) {
                self.focused = None;
            }
            self.backend.destroy(&entry.surface.handle);
            return;
        }
        if let Some(idx) = self.undo_stack.iter().position(|e| e.surface.id == surface_id) {
            let entry = self.undo_stack.remove(idx);
            self.backend.destroy(&entry.surface.handle);
        }
    }

    /// Exactly one (or zero) surface is focused; all others are
    /// unfocused, applied as a single batch.
    pub fn sync_focus(&mut self, active_surface_id: Option<SurfaceId>) {
        if self.focused == active_surface_id {
            return;
        }
        if let Some(prev) = self.focused {
            if let Some(entry) = self.live.get(&prev) {
                self.backend.set_focused(&entry.surface.handle, false);
            }
        }
        if let Some(next) = active_surface_id {
            if let Some(entry) = self.live.get(&next) {
                self.backend.set_focused(&entry.surface.handle, true);
            }
        }
        self.focused = active_surface_id;
    }

    pub fn contains(&self, surface_id: SurfaceId) -> bool {
        self.live.contains_key(&surface_id)
    }

    pub fn undo_stack_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Takes ownership of the CWD-change receiver. Can only be taken
    /// once; subsequent calls return `None`.
    pub fn take_cwd_receiver(&mut self) -> Option<tokio::sync::mpsc::UnboundedReceiver<(PaneId, String)>> {
        self.cwd_rx.take()
    }

    /// Called by the host backend when the PTY reports a CWD change.
    pub fn notify_cwd_change(&self, pane_id: PaneId, cwd: String) {
        let _ = self.cwd_tx.send((pane_id, cwd));
    }
}
