//! Persistent binary split tree over pane leaves.
//!
//! Every operation takes `&self` and returns a new `Layout`; the receiver
//! is left untouched. Invalid inputs (missing pane, missing split) never
//! panic — they return the layout unchanged, per the "no operation ever
//! raises" rule.

use panehub_ids::{IdAllocator, PaneId, SplitId};
use serde::{Deserialize, Serialize};

pub const MIN_RATIO: f32 = 0.05;
pub const MAX_RATIO: f32 = 0.95;

/// Orientation of a split. `Vertical` divides the pane side-by-side (splits
/// width, producing a left and a right child); `Horizontal` stacks the
/// pane top-to-bottom (splits height, producing a top and a bottom child).
/// This matches the common terminal-multiplexer convention (tmux's
/// `split-window -h`/`-v`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

/// Where a newly inserted pane lands relative to its split sibling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// Screen-relative direction used for geometric neighbor focus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction4 {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Branch {
    Left,
    Right,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LayoutNode {
    Leaf { pane_id: PaneId },
    Split {
        split_id: SplitId,
        direction: SplitDirection,
        ratio: f32,
        left: Box<LayoutNode>,
        right: Box<LayoutNode>,
    },
}

impl LayoutNode {
    fn leaf(pane_id: PaneId) -> Self {
        LayoutNode::Leaf { pane_id }
    }

    fn collect_leaves(&self, out: &mut Vec<PaneId>) {
        match self {
            LayoutNode::Leaf { pane_id } => out.push(*pane_id),
            LayoutNode::Split { left, right, .. } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }

    fn contains(&self, target: PaneId) -> bool {
        match self {
            LayoutNode::Leaf { pane_id } => *pane_id == target,
            LayoutNode::Split { left, right, .. } => left.contains(target) || right.contains(target),
        }
    }
}

/// A persistent binary split tree plus the tab-level zoom sentinel.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    root: Option<LayoutNode>,
    zoomed: Option<PaneId>,
}

impl Layout {
    pub fn empty() -> Self {
        Self { root: None, zoomed: None }
    }

    pub fn single(pane_id: PaneId) -> Self {
        Self { root: Some(LayoutNode::leaf(pane_id)), zoomed: None }
    }

    pub fn root(&self) -> Option<&LayoutNode> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn contains(&self, pane_id: PaneId) -> bool {
        self.root.as_ref().is_some_and(|n| n.contains(pane_id))
    }

    /// All leaf pane ids, i.e. the layout's visible-pane set.
    pub fn visible_pane_ids(&self) -> Vec<PaneId> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.collect_leaves(&mut out);
        }
        out
    }

    pub fn zoomed(&self) -> Option<PaneId> {
        self.zoomed
    }

    /// Split the leaf at `target` into an internal node, placing `pane_id`
    /// before or after it. Ratio starts at 0.5. No-op if `target` isn't a
    /// leaf of this layout.
    pub fn insert(
        &self,
        allocator: &IdAllocator,
        pane_id: PaneId,
        at: PaneId,
        direction: SplitDirection,
        position: InsertPosition,
    ) -> Layout {
        let Some(root) = &self.root else {
            return self.clone();
        };
        if !root.contains(at) {
            return self.clone();
        }
        let split_id: SplitId = allocator.allocate();
        let new_root = insert_rec(root, at, pane_id, direction, position, split_id);
        Layout { root: Some(new_root), zoomed: self.zoomed }
    }

    /// Removes `pane_id`, collapsing its parent split into the sibling
    /// subtree. Returns the new layout and whether it is now empty.
    pub fn remove(&self, pane_id: PaneId) -> (Layout, bool) {
        let Some(root) = &self.root else {
            return (self.clone(), true);
        };
        match remove_rec(root, pane_id) {
            RemoveOutcome::NotFound => (self.clone(), false),
            RemoveOutcome::Vanished => {
                let zoomed = if self.zoomed == Some(pane_id) { None } else { self.zoomed };
                (Layout { root: None, zoomed }, true)
            }
            RemoveOutcome::Survived(new_root) => {
                let zoomed = if self.zoomed == Some(pane_id) { None } else { self.zoomed };
                (Layout { root: Some(new_root), zoomed }, false)
            }
        }
    }

    /// Clamps `split_id`'s ratio to `[0.05, 0.95]`. No-op if not found.
    pub fn resize(&self, split_id: SplitId, ratio: f32) -> Layout {
        let Some(root) = &self.root else {
            return self.clone();
        };
        let clamped = ratio.clamp(MIN_RATIO, MAX_RATIO);
        Layout { root: Some(resize_rec(root, split_id, clamped)), zoomed: self.zoomed }
    }

    /// Sets every internal ratio to `left_leaf_count / total_leaf_count`,
    /// giving every leaf an equal share of its ancestor splits.
    pub fn equalize(&self) -> Layout {
        let Some(root) = &self.root else {
            return self.clone();
        };
        let (new_root, _) = equalize_rec(root);
        Layout { root: Some(new_root), zoomed: self.zoomed }
    }

    /// Sets or clears the zoomed-pane sentinel. No-op if `pane_id` is not a
    /// leaf of this layout.
    pub fn toggle_zoom(&self, pane_id: PaneId) -> Layout {
        if !self.contains(pane_id) {
            return self.clone();
        }
        let zoomed = if self.zoomed == Some(pane_id) { None } else { Some(pane_id) };
        Layout { root: self.root.clone(), zoomed }
    }

    /// Walks from `pane_id`'s leaf toward the root, finds the nearest
    /// ancestor split whose direction matches `axis`, and shifts its ratio
    /// by `amount / 100`, clamped. No-op if no such ancestor exists.
    pub fn resize_by_delta(&self, pane_id: PaneId, axis: SplitDirection, amount: f32) -> Layout {
        let Some(root) = &self.root else {
            return self.clone();
        };
        let Some(path) = find_path(root, pane_id) else {
            return self.clone();
        };
        // Nearest-first: path is root->leaf, so scan from the end.
        let target_split = path
            .iter()
            .rev()
            .find(|step| step.direction == axis)
            .map(|step| step.split_id);
        match target_split {
            Some(split_id) => self.resize_with_delta(split_id, amount),
            None => self.clone(),
        }
    }

    fn resize_with_delta(&self, split_id: SplitId, amount: f32) -> Layout {
        let Some(root) = &self.root else {
            return self.clone();
        };
        Layout {
            root: Some(resize_delta_rec(root, split_id, amount / 100.0)),
            zoomed: self.zoomed,
        }
    }

    /// Finds the geometric neighbor of `pane_id` in `direction` by
    /// unfolding the tree into unit-square rectangles and choosing the
    /// leaf with the most shared edge, tie-broken by the earlier
    /// (top-left, i.e. smallest `(y, x)`) rectangle origin.
    pub fn focus_neighbor(&self, pane_id: PaneId, direction: Direction4) -> Option<PaneId> {
        let root = self.root.as_ref()?;
        let rects = unfold(root, Rect { x: 0.0, y: 0.0, w: 1.0, h: 1.0 });
        let source = rects.iter().find(|(id, _)| *id == pane_id)?.1;
        const EPS: f64 = 1e-6;

        let mut best: Option<(PaneId, f64, f64, f64)> = None; // (id, overlap, y, x)
        for (id, rect) in &rects {
            if *id == pane_id {
                continue;
            }
            let touches = match direction {
                Direction4::Right => (rect.x - (source.x + source.w)).abs() < EPS,
                Direction4::Left => ((rect.x + rect.w) - source.x).abs() < EPS,
                Direction4::Down => (rect.y - (source.y + source.h)).abs() < EPS,
                Direction4::Up => ((rect.y + rect.h) - source.y).abs() < EPS,
            };
            if !touches {
                continue;
            }
            let overlap = match direction {
                Direction4::Right | Direction4::Left => {
                    (source.y + source.h).min(rect.y + rect.h) - source.y.max(rect.y)
                }
                Direction4::Up | Direction4::Down => {
                    (source.x + source.w).min(rect.x + rect.w) - source.x.max(rect.x)
                }
            };
            if overlap <= 0.0 {
                continue;
            }
            let better = match &best {
                None => true,
                Some((_, best_overlap, best_y, best_x)) => {
                    if overlap > *best_overlap + EPS {
                        true
                    } else if (overlap - *best_overlap).abs() <= EPS {
                        (rect.y, rect.x) < (*best_y, *best_x)
                    } else {
                        false
                    }
                }
            };
            if better {
                best = Some((*id, overlap, rect.y, rect.x));
            }
        }
        best.map(|(id, ..)| id)
    }
}

enum RemoveOutcome {
    NotFound,
    Vanished,
    Survived(LayoutNode),
}

fn remove_rec(node: &LayoutNode, target: PaneId) -> RemoveOutcome {
    match node {
        LayoutNode::Leaf { pane_id } => {
            if *pane_id == target {
                RemoveOutcome::Vanished
            } else {
                RemoveOutcome::NotFound
            }
        }
        LayoutNode::Split { split_id, direction, ratio, left, right } => {
            match remove_rec(left, target) {
                RemoveOutcome::Vanished => return RemoveOutcome::Survived((**right).clone()),
                RemoveOutcome::Survived(new_left) => {
                    return RemoveOutcome::Survived(LayoutNode::Split {
                        split_id: *split_id,
                        direction: *direction,
                        ratio: *ratio,
                        left: Box::new(new_left),
                        right: right.clone(),
                    });
                }
                RemoveOutcome::NotFound => {}
            }
            match remove_rec(right, target) {
                RemoveOutcome::Vanished => RemoveOutcome::Survived((**left).clone()),
                RemoveOutcome::Survived(new_right) => RemoveOutcome::Survived(LayoutNode::Split {
                    split_id: *split_id,
                    direction: *direction,
                    ratio: *ratio,
                    left: left.clone(),
                    right: Box::new(new_right),
                }),
                RemoveOutcome::NotFound => RemoveOutcome::NotFound,
            }
        }
    }
}

fn insert_rec(
    node: &LayoutNode,
    target: PaneId,
    new_pane: PaneId,
    direction: SplitDirection,
    position: InsertPosition,
    split_id: SplitId,
) -> LayoutNode {
    match node {
        LayoutNode::Leaf { pane_id } if *pane_id == target => {
            let old = LayoutNode::leaf(*pane_id);
            let new_leaf = LayoutNode::leaf(new_pane);
            let (left, right) = match position {
                InsertPosition::Before => (new_leaf, old),
                InsertPosition::After => (old, new_leaf),
            };
            LayoutNode::Split {
                split_id,
                direction,
                ratio: 0.5,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        LayoutNode::Leaf { .. } => node.clone(),
        LayoutNode::Split { split_id: sid, direction: dir, ratio, left, right } => {
            if left.contains(target) {
                LayoutNode::Split {
                    split_id: *sid,
                    direction: *dir,
                    ratio: *ratio,
                    left: Box::new(insert_rec(left, target, new_pane, direction, position, split_id)),
                    right: right.clone(),
                }
            } else if right.contains(target) {
                LayoutNode::Split {
                    split_id: *sid,
                    direction: *dir,
                    ratio: *ratio,
                    left: left.clone(),
                    right: Box::new(insert_rec(right, target, new_pane, direction, position, split_id)),
                }
            } else {
                node.clone()
            }
        }
    }
}

fn resize_rec(node: &LayoutNode, target: SplitId, ratio: f32) -> LayoutNode {
    match node {
        LayoutNode::Leaf { .. } => node.clone(),
        LayoutNode::Split { split_id, direction, ratio: r, left, right } => {
            if *split_id == target {
                LayoutNode::Split {
                    split_id: *split_id,
                    direction: *direction,
                    ratio,
                    left: left.clone(),
                    right: right.clone(),
                }
            } else {
                LayoutNode::Split {
                    split_id: *split_id,
                    direction: *direction,
                    ratio: *r,
                    left: Box::new(resize_rec(left, target, ratio)),
                    right: Box::new(resize_rec(right, target, ratio)),
                }
            }
        }
    }
}

fn resize_delta_rec(node: &LayoutNode, target: SplitId, delta: f32) -> LayoutNode {
    match node {
        LayoutNode::Leaf { .. } => node.clone(),
        LayoutNode::Split { split_id, direction, ratio, left, right } => {
            if *split_id == target {
                LayoutNode::Split {
                    split_id: *split_id,
                    direction: *direction,
                    ratio: (*ratio + delta).clamp(MIN_RATIO, MAX_RATIO),
                    left: left.clone(),
                    right: right.clone(),
                }
            } else {
                LayoutNode::Split {
                    split_id: *split_id,
                    direction: *direction,
                    ratio: *ratio,
                    left: Box::new(resize_delta_rec(left, target, delta)),
                    right: Box::new(resize_delta_rec(right, target, delta)),
                }
            }
        }
    }
}

fn equalize_rec(node: &LayoutNode) -> (LayoutNode, usize) {
    match node {
        LayoutNode::Leaf { pane_id } => (LayoutNode::leaf(*pane_id), 1),
        LayoutNode::Split { split_id, direction, left, right, .. } => {
            let (new_left, left_count) = equalize_rec(left);
            let (new_right, right_count) = equalize_rec(right);
            let ratio = left_count as f32 / (left_count + right_count) as f32;
            (
                LayoutNode::Split {
                    split_id: *split_id,
                    direction: *direction,
                    ratio,
                    left: Box::new(new_left),
                    right: Box::new(new_right),
                },
                left_count + right_count,
            )
        }
    }
}

struct PathStep {
    split_id: SplitId,
    direction: SplitDirection,
    #[allow(dead_code)]
    branch: Branch,
}

/// Root-to-leaf path of splits leading to `target`, or `None` if absent.
fn find_path(node: &LayoutNode, target: PaneId) -> Option<Vec<PathStep>> {
    match node {
        LayoutNode::Leaf { pane_id } => {
            if *pane_id == target {
                Some(Vec::new())
            } else {
                None
            }
        }
        LayoutNode::Split { split_id, direction, left, right, .. } => {
            if let Some(mut rest) = find_path(left, target) {
                rest.insert(0, PathStep { split_id: *split_id, direction: *direction, branch: Branch::Left });
                return Some(rest);
            }
            if let Some(mut rest) = find_path(right, target) {
                rest.insert(0, PathStep { split_id: *split_id, direction: *direction, branch: Branch::Right });
                return Some(rest);
            }
            None
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Rect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

fn unfold(node: &LayoutNode, rect: Rect) -> Vec<(PaneId, Rect)> {
    match node {
        LayoutNode::Leaf { pane_id } => vec![(*pane_id, rect)],
        LayoutNode::Split { direction, ratio, left, right, .. } => {
            let ratio = *ratio as f64;
            let (left_rect, right_rect) = match direction {
                SplitDirection::Vertical => (
                    Rect { x: rect.x, y: rect.y, w: rect.w * ratio, h: rect.h },
                    Rect { x: rect.x + rect.w * ratio, y: rect.y, w: rect.w * (1.0 - ratio), h: rect.h },
                ),
                SplitDirection::Horizontal => (
                    Rect { x: rect.x, y: rect.y, w: rect.w, h: rect.h * ratio },
                    Rect { x: rect.x, y: rect.y + rect.h * ratio, w: rect.w, h: rect.h * (1.0 - ratio) },
                ),
            };
            let mut out = unfold(left, left_rect);
            out.extend(unfold(right, right_rect));
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> IdAllocator {
        IdAllocator::new()
    }

    #[test]
    fn insert_on_single_leaf_creates_split() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let layout = Layout::single(p1);
        let layout = layout.insert(&alloc, p2, p1, SplitDirection::Vertical, InsertPosition::After);
        match layout.root().unwrap() {
            LayoutNode::Split { direction, ratio, left, right, .. } => {
                assert_eq!(*direction, SplitDirection::Vertical);
                assert!((*ratio - 0.5).abs() < f32::EPSILON);
                assert!(matches!(**left, LayoutNode::Leaf { pane_id } if pane_id == p1));
                assert!(matches!(**right, LayoutNode::Leaf { pane_id } if pane_id == p2));
            }
            _ => panic!("expected split"),
        }
    }

    #[test]
    fn insert_on_missing_target_is_noop() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let missing: PaneId = alloc.allocate();
        let layout = Layout::single(p1);
        let after = layout.insert(&alloc, p2, missing, SplitDirection::Vertical, InsertPosition::After);
        assert!(matches!(after.root().unwrap(), LayoutNode::Leaf { pane_id } if *pane_id == p1));
    }

    #[test]
    fn remove_collapses_split_to_sibling() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let layout = Layout::single(p1).insert(&alloc, p2, p1, SplitDirection::Horizontal, InsertPosition::After);
        let (layout, empty) = layout.remove(p2);
        assert!(!empty);
        assert!(matches!(layout.root().unwrap(), LayoutNode::Leaf { pane_id } if *pane_id == p1));
    }

    #[test]
    fn remove_last_leaf_is_empty() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let layout = Layout::single(p1);
        let (layout, empty) = layout.remove(p1);
        assert!(empty);
        assert!(layout.is_empty());
    }

    #[test]
    fn resize_clamps_to_bounds() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let layout = Layout::single(p1).insert(&alloc, p2, p1, SplitDirection::Vertical, InsertPosition::After);
        let split_id = match layout.root().unwrap() {
            LayoutNode::Split { split_id, .. } => *split_id,
            _ => unreachable!(),
        };
        let resized = layout.resize(split_id, 5.0);
        match resized.root().unwrap() {
            LayoutNode::Split { ratio, .. } => assert!((*ratio - MAX_RATIO).abs() < f32::EPSILON),
            _ => unreachable!(),
        }
        let resized = layout.resize(split_id, -5.0);
        match resized.root().unwrap() {
            LayoutNode::Split { ratio, .. } => assert!((*ratio - MIN_RATIO).abs() < f32::EPSILON),
            _ => unreachable!(),
        }
    }

    #[test]
    fn equalize_is_idempotent() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let p3: PaneId = alloc.allocate();
        let layout = Layout::single(p1)
            .insert(&alloc, p2, p1, SplitDirection::Vertical, InsertPosition::After)
            .insert(&alloc, p3, p2, SplitDirection::Horizontal, InsertPosition::After);
        let split_id = match layout.root().unwrap() {
            LayoutNode::Split { split_id, .. } => *split_id,
            _ => unreachable!(),
        };
        let skewed = layout.resize(split_id, 0.2);
        let once = skewed.equalize();
        let twice = once.equalize();
        fn ratios(node: &LayoutNode, out: &mut Vec<f32>) {
            if let LayoutNode::Split { ratio, left, right, .. } = node {
                out.push(*ratio);
                ratios(left, out);
                ratios(right, out);
            }
        }
        let mut a = Vec::new();
        let mut b = Vec::new();
        ratios(once.root().unwrap(), &mut a);
        ratios(twice.root().unwrap(), &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn equalize_gives_equal_leaf_shares() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let p3: PaneId = alloc.allocate();
        let layout = Layout::single(p1)
            .insert(&alloc, p2, p1, SplitDirection::Vertical, InsertPosition::After)
            .insert(&alloc, p3, p1, SplitDirection::Vertical, InsertPosition::Before);
        let equalized = layout.equalize();
        match equalized.root().unwrap() {
            LayoutNode::Split { ratio, .. } => assert!((*ratio - (1.0 / 3.0)).abs() < 1e-5),
            _ => unreachable!(),
        }
    }

    #[test]
    fn resize_by_delta_is_monotone_and_bounded() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let mut layout = Layout::single(p1).insert(&alloc, p2, p1, SplitDirection::Vertical, InsertPosition::After);
        let mut last = 0.5_f32;
        for _ in 0..50 {
            layout = layout.resize_by_delta(p1, SplitDirection::Vertical, 5.0);
            let ratio = match layout.root().unwrap() {
                LayoutNode::Split { ratio, .. } => *ratio,
                _ => unreachable!(),
            };
            assert!(ratio >= last - 1e-6);
            assert!(ratio <= MAX_RATIO);
            last = ratio;
        }
        assert!((last - MAX_RATIO).abs() < 1e-5);
    }

    #[test]
    fn resize_by_delta_ignores_mismatched_axis() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let layout = Layout::single(p1).insert(&alloc, p2, p1, SplitDirection::Vertical, InsertPosition::After);
        let unchanged = layout.resize_by_delta(p1, SplitDirection::Horizontal, 10.0);
        match unchanged.root().unwrap() {
            LayoutNode::Split { ratio, .. } => assert!((*ratio - 0.5).abs() < f32::EPSILON),
            _ => unreachable!(),
        }
    }

    #[test]
    fn focus_neighbor_round_trips() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let layout = Layout::single(p1).insert(&alloc, p2, p1, SplitDirection::Vertical, InsertPosition::After);
        let right = layout.focus_neighbor(p1, Direction4::Right);
        assert_eq!(right, Some(p2));
        let back = layout.focus_neighbor(p2, Direction4::Left);
        assert_eq!(back, Some(p1));
    }

    #[test]
    fn focus_neighbor_none_when_no_sibling_in_direction() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let layout = Layout::single(p1).insert(&alloc, p2, p1, SplitDirection::Vertical, InsertPosition::After);
        assert_eq!(layout.focus_neighbor(p1, Direction4::Left), None);
        assert_eq!(layout.focus_neighbor(p2, Direction4::Right), None);
    }

    #[test]
    fn toggle_zoom_sets_and_clears() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let layout = Layout::single(p1);
        let zoomed = layout.toggle_zoom(p1);
        assert_eq!(zoomed.zoomed(), Some(p1));
        let unzoomed = zoomed.toggle_zoom(p1);
        assert_eq!(unzoomed.zoomed(), None);
    }

    #[test]
    fn serde_round_trip() {
        let alloc = ids();
        let p1: PaneId = alloc.allocate();
        let p2: PaneId = alloc.allocate();
        let layout = Layout::single(p1).insert(&alloc, p2, p1, SplitDirection::Vertical, InsertPosition::After);
        let json = serde_json::to_string(&layout).unwrap();
        let back: Layout = serde_json::from_str(&json).unwrap();
        assert_eq!(back.visible_pane_ids(), layout.visible_pane_ids());
    }
}
