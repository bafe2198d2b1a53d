//! Command resolution and validation: pure functions over an immutable
//! `WorkspaceSnapshot`, so they can be property-tested without a live
//! store. Split into resolve/validate stages so the same `PaneAction`
//! pipeline runs for keyboard, menu, drag-drop, and runtime-originated
//! commands alike.

mod action;
mod command;
mod error;
mod resolver;
mod validator;

pub use action::{PaneAction, PaneSource, RepairKind};
pub use command::{Command, DropPayload, DropZone};
pub use error::ActionError;
pub use resolver::{ActionResolver, WorkspaceSnapshot};
pub use validator::ActionValidator;
