//! The event bus and cache coordinator: typed fan-out of topology and
//! enrichment envelopes from the filesystem/git/forge actors and pane
//! runtimes, and the derived repo/worktree enrichment cache fed by them.

mod bus;
mod cache;
mod cache_persistence;
mod envelope;
mod git_projector;
mod sources;

pub use bus::{EventBus, DEFAULT_CAPACITY};
pub use cache::{CacheCoordinator, DerivedCache, EpochClock, ForgeRefreshRequest, RepoEnrichment, ScopeChange, SystemEpochClock, WorktreeEnrichment};
pub use cache_persistence::{CachePersistor, FileSystemCachePersistor};
pub use envelope::{EnvelopeSource, RuntimeEnvelope, SystemEnvelope, WorktreeEnvelope};
pub use git_projector::{GitProjector, GitStatusSample, GitStatusSource};
pub use sources::{FilesystemSource, ForgeSource, InMemoryFilesystemSource, InMemoryForgeSource};
