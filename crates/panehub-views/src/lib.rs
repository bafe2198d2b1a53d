//! The bijection between pane ids and their rendered view handles.
//!
//! Pane views are a tagged capability trait object (`PaneViewKind` + a
//! small interface) rather than a class hierarchy, so adding a new view
//! kind is a new enum variant and impl, not a new subclass.

use panehub_ids::{PaneId, SurfaceId};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaneViewKind {
    Terminal,
    Webview,
    CodeViewer,
    BridgePanel,
}

/// The capability interface every concrete view implements. Hosts provide
/// the concrete renderer; the core only ever touches this trait object.
pub trait PaneView: Send {
    fn pane_id(&self) -> PaneId;
    fn kind(&self) -> PaneViewKind;
    fn surface_id_if_terminal(&self) -> Option<SurfaceId>;
    /// Tears down any host-side resources. Called exactly once, before the
    /// view is dropped from the registry.
    fn teardown(&mut self);
}

/// A bijection `paneId -> Box<dyn PaneView>` with a monotonic epoch bumped
/// on every mutation, so consumers can skip a rebuild when their
/// `(Tab, epoch)` pair is unchanged.
#[derive(Default)]
pub struct ViewRegistry {
    views: HashMap<PaneId, Box<dyn PaneView>>,
    epoch: u64,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self { views: HashMap::new(), epoch: 0 }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Registers `view` for its own `pane_id()`. Replacing an existing view
    /// tears down the old one first.
    pub fn register(&mut self, view: Box<dyn PaneView>) {
        let pane_id = view.pane_id();
        if let Some(mut existing) = self.views.remove(&pane_id) {
            existing.teardown();
        }
        self.views.insert(pane_id, view);
        self.epoch += 1;
    }

    pub fn unregister(&mut self, pane_id: PaneId) {
        if let Some(mut view) = self.views.remove(&pane_id) {
            view.teardown();
            self.epoch += 1;
        } else {
            log::warn!(target: "panehub_views", "unregister called for pane {pane_id} with no registered view");
        }
    }

    pub fn view(&self, pane_id: PaneId) -> Option<&dyn PaneView> {
        self.views.get(&pane_id).map(|v| v.as_ref())
    }

    pub fn terminal_view(&self, pane_id: PaneId) -> Option<&dyn PaneView> {
        self.view(pane_id).filter(|v| v.kind() == PaneViewKind::Terminal)
    }

    pub fn all_webview_views(&self) -> impl Iterator<Item = &dyn PaneView> {
        self.views.values().map(|v| v.as_ref()).filter(|v| v.kind() == PaneViewKind::Webview)
    }

    pub fn contains(&self, pane_id: PaneId) -> bool {
        self.views.contains_key(&pane_id)
    }

    /// Every pane id currently holding a registered view, for invariant
    /// checks and diagnostics (no particular order).
    pub fn pane_ids(&self) -> impl Iterator<Item = PaneId> + '_ {
        self.views.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestView {
        pane_id: PaneId,
        kind: PaneViewKind,
        torn_down: bool,
    }

    impl PaneView for TestView {
        fn pane_id(&self) -> PaneId {
            self.pane_id
        }
        fn kind(&self) -> PaneViewKind {
            self.kind
        }
        fn surface_id_if_terminal(&self) -> Option<SurfaceId> {
            None
        }
        fn teardown(&mut self) {
            self.torn_down = true;
        }
    }

    fn pane_id() -> PaneId {
        panehub_ids::IdAllocator::new().allocate()
    }

    #[test]
    fn register_bumps_epoch() {
        let mut registry = ViewRegistry::new();
        let id = pane_id();
        let before = registry.epoch();
        registry.register(Box::new(TestView { pane_id: id, kind: PaneViewKind::Terminal, torn_down: false }));
        assert_eq!(registry.epoch(), before + 1);
        assert!(registry.contains(id));
    }

    #[test]
    fn unregister_tears_down_and_removes() {
        let mut registry = ViewRegistry::new();
        let id = pane_id();
        registry.register(Box::new(TestView { pane_id: id, kind: PaneViewKind::Terminal, torn_down: false }));
        registry.unregister(id);
        assert!(!registry.contains(id));
    }

    #[test]
    fn replacing_a_view_tears_down_the_old_one() {
        let mut registry = ViewRegistry::new();
        let id = pane_id();
        registry.register(Box::new(TestView { pane_id: id, kind: PaneViewKind::Terminal, torn_down: false }));
        registry.register(Box::new(TestView { pane_id: id, kind: PaneViewKind::CodeViewer, torn_down: false }));
        assert_eq!(registry.view(id).unwrap().kind(), PaneViewKind::CodeViewer);
    }

    #[test]
    fn terminal_view_filters_by_kind() {
        let mut registry = ViewRegistry::new();
        let id = pane_id();
        registry.register(Box::new(TestView { pane_id: id, kind: PaneViewKind::Webview, torn_down: false }));
        assert!(registry.terminal_view(id).is_none());
    }
}
