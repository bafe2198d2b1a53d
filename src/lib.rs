//! `panehub` ties the pane orchestration core's crates together under one
//! name: identifiers, layout, the canonical store, the action pipeline,
//! surfaces, views, runtimes, the event bus, the coordinator, and boot
//! sequencing. A host embeds this crate, supplies its own
//! `SurfaceBackend`/`ViewFactory`/`FilesystemSource`/`ForgeSource`/
//! `GitStatusSource`/`Runtime` implementations, and drives everything
//! else through [`boot`] and [`coordinator`].
//!
//! Rendering, shell process management, network I/O, and UI styling are
//! a host's concern, not this crate's — it only decides what the
//! workspace looks like and whose job it is to make it so.

pub mod ids {
    pub use panehub_ids::*;
}

pub mod layout {
    pub use panehub_layout::*;
}

pub mod store {
    pub use panehub_store::*;
}

pub mod actions {
    pub use panehub_actions::*;
}

pub mod surfaces {
    pub use panehub_surfaces::*;
}

pub mod views {
    pub use panehub_views::*;
}

pub mod runtime {
    pub use panehub_runtime::*;
}

pub mod events {
    pub use panehub_events::*;
}

pub mod coordinator {
    pub use panehub_coordinator::*;
}

pub mod boot {
    pub use panehub_boot::*;
}

pub use coordinator::PaneCoordinator;
pub use boot::{BootContext, BootOutcome, BootSequencer};
