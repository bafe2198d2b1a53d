//! The content-type dispatcher the coordinator uses to create a view for
//! a newly-placed pane. Kept as a trait object so the coordinator has no
//! knowledge of concrete terminal/webview/code-viewer/bridge-panel
//! implementations — it only ever calls through this trait.

use panehub_ids::PaneId;
use panehub_store::{PaneContent, PaneMetadata};
use panehub_views::PaneView;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewCreationError {
    #[error("view creation failed for pane {pane_id}: {reason}")]
    Failed { pane_id: PaneId, reason: String },
}

pub trait ViewFactory: Send {
    fn create_view(
        &self,
        pane_id: PaneId,
        content: &PaneContent,
        metadata: &PaneMetadata,
    ) -> Result<Box<dyn PaneView>, ViewCreationError>;
}
