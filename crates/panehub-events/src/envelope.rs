//! Envelope shapes carried by the bus. `System` and `Worktree` envelopes
//! originate from the filesystem/git/forge actors; `Pane` envelopes are
//! re-exported runtime events (`panehub_runtime::EventEnvelope` already
//! carries its own correlation id and pane id, so it is wrapped as-is
//! rather than re-wrapped).

use panehub_ids::{CorrelationId, RepoId, WorktreeId};
use panehub_runtime::EventEnvelope;
use panehub_store::{Repo, Worktree};

/// Which actor produced an envelope, for logging and debugging — never
/// branched on for correctness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeSource {
    Filesystem,
    Git,
    Forge,
    Runtime,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SystemEnvelope {
    RepoDiscovered(Repo),
    RepoRemoved(RepoId),
    WorktreeRegistered { repo_id: RepoId, worktree: Worktree },
    WorktreeUnregistered { repo_id: RepoId, worktree_id: WorktreeId },
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorktreeEnvelope {
    GitWorkingDirectory { worktree_id: WorktreeId, branch: Option<String>, lines_added: usize, lines_removed: usize },
    Forge { worktree_id: WorktreeId, pull_request_count: u32, notification_count: u32 },
    OriginChanged { repo_id: RepoId, worktree_id: WorktreeId, origin: Option<String> },
    BranchChanged { worktree_id: WorktreeId, branch: Option<String> },
}

/// The typed sum the bus fans out. Each variant carries its own
/// correlation id, except `Pane`, which reuses `EventEnvelope`'s.
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeEnvelope {
    System { correlation_id: CorrelationId, source: EnvelopeSource, payload: SystemEnvelope },
    Worktree { correlation_id: CorrelationId, source: EnvelopeSource, payload: WorktreeEnvelope },
    Pane(EventEnvelope),
}

impl RuntimeEnvelope {
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            RuntimeEnvelope::System { correlation_id, .. } => Some(*correlation_id),
            RuntimeEnvelope::Worktree { correlation_id, .. } => Some(*correlation_id),
            RuntimeEnvelope::Pane(envelope) => envelope.correlation_id,
        }
    }
}
