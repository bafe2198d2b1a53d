//! `BootSequencer`: runs the ten-step boot recipe described by the pane
//! orchestration core's system overview, then restores pane views in
//! stages. Generalizes the teacher's linear, hand-written construction
//! sequence into an explicit, traceable, reorderable recipe.

mod context;
mod env;
mod restore;
mod sequencer;
mod steps;

pub use context::{BootCollaborators, BootContext};
pub use env::{BootEnv, RESOURCE_DIR_VAR};
pub use restore::{no_orphan_cleanup, run_with_orphan_cleanup_timeout, CleanupOutcome, RestoreReport};
pub use sequencer::{BootOutcome, BootSequencer};
pub use steps::{default_recipe, BootStep};
