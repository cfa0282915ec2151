//! Drop-intent resolution for drag-and-drop reordering of the folder tree.
//!
//! A drag goes `Idle -> Dragging -> (Idle | Dropped)`. While dragging, every
//! pointer move maps the hovered row and the pointer's vertical position in
//! that row to a [`DropHighlight`]. On drop the highlight becomes exactly one
//! relocation in the [`FolderTree`]; on cancel nothing changes.
//!
//! All gesture state lives in an explicit [`DragSession`] value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::options::{DropOptions, InsertPosition};
use crate::payload::FolderPayload;
use crate::tree::{FolderTree, NodeId};

const UPPER_BAND: f32 = 1.0 / 3.0;
const LOWER_BAND: f32 = 2.0 / 3.0;

/// Per-row drop feedback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropHighlight {
    #[default]
    None,
    /// Drop into the hovered row.
    OnItem,
    /// Insert as previous sibling of the hovered row.
    Above,
    /// Insert as next sibling of the hovered row.
    Below,
}

impl DropHighlight {
    pub fn is_none(self) -> bool {
        self == DropHighlight::None
    }
}

/// Map a pointer position inside a row to a drop intent.
///
/// `fraction` is how far down the row the pointer is (0 = top edge, 1 =
/// bottom edge). `blocked` means the row is one of the dragged nodes or lies
/// inside one of them.
pub fn resolve_intent(fraction: f32, can_have_children: bool, blocked: bool) -> DropHighlight {
    if blocked {
        return DropHighlight::None;
    }
    let fraction = if fraction.is_nan() {
        0.5
    } else {
        fraction.clamp(0.0, 1.0)
    };

    if fraction < UPPER_BAND {
        DropHighlight::Above
    } else if fraction >= LOWER_BAND {
        DropHighlight::Below
    } else if can_have_children {
        DropHighlight::OnItem
    } else if fraction < 0.5 {
        DropHighlight::Above
    } else {
        DropHighlight::Below
    }
}

/// The row under the pointer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowHit {
    pub row: usize,
    pub node: NodeId,
    pub fraction: f32,
}

/// Row geometry supplied by the view.
pub trait RowLayout {
    /// Row index under the vertical position `y`, and the fraction of the row
    /// above `y`.
    fn row_at(&self, y: f32) -> Option<(usize, f32)>;

    fn node_for_row(&self, row: usize) -> Option<NodeId>;

    fn hit(&self, y: f32) -> Option<RowHit> {
        let (row, fraction) = self.row_at(y)?;
        Some(RowHit {
            row,
            node: self.node_for_row(row)?,
            fraction,
        })
    }
}

/// Fixed-height rows in a scrolled list.
#[derive(Clone, Copy, Debug)]
pub struct UniformRows<'a> {
    pub rows: &'a [NodeId],
    pub row_height: f32,
    /// Content offset scrolled out of view above the top edge.
    pub scroll_offset: f32,
}

impl<'a> UniformRows<'a> {
    pub fn new(rows: &'a [NodeId], row_height: f32) -> Self {
        Self {
            rows,
            row_height,
            scroll_offset: 0.0,
        }
    }

    pub fn scroll_offset(mut self, scroll_offset: f32) -> Self {
        self.scroll_offset = scroll_offset;
        self
    }
}

impl RowLayout for UniformRows<'_> {
    fn row_at(&self, y: f32) -> Option<(usize, f32)> {
        if !(self.row_height > 0.0) {
            return None;
        }
        let content_y = y + self.scroll_offset;
        if !(content_y >= 0.0) {
            return None;
        }
        let row = (content_y / self.row_height).floor() as usize;
        if row >= self.rows.len() {
            return None;
        }
        let fraction = (content_y - row as f32 * self.row_height) / self.row_height;
        Some((row, fraction))
    }

    fn node_for_row(&self, row: usize) -> Option<NodeId> {
        self.rows.get(row).copied()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging,
    Dropped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Hover {
    row: usize,
    node: NodeId,
    highlight: DropHighlight,
}

/// State of one drag gesture.
#[derive(Clone, Debug, Default)]
pub struct DragSession {
    phase: DragPhase,
    sources: Vec<NodeId>,
    hover: Option<Hover>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == DragPhase::Dragging
    }

    /// Dragged nodes in tree order.
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    pub fn is_source(&self, node: NodeId) -> bool {
        self.sources.contains(&node)
    }

    /// The current highlight, on whichever row is hovered.
    pub fn highlight(&self) -> DropHighlight {
        self.hover
            .map(|hover| hover.highlight)
            .unwrap_or_default()
    }

    pub fn hovered_node(&self) -> Option<NodeId> {
        self.hover.map(|hover| hover.node)
    }

    /// `(row, highlight)` of the hovered row, for change detection.
    pub fn hover_state(&self) -> Option<(usize, DropHighlight)> {
        self.hover.map(|hover| (hover.row, hover.highlight))
    }

    pub fn highlight_for_row(&self, row: usize) -> DropHighlight {
        match self.hover {
            Some(hover) if hover.row == row => hover.highlight,
            _ => DropHighlight::None,
        }
    }

    fn reset(&mut self, phase: DragPhase) {
        self.phase = phase;
        self.sources.clear();
        self.hover = None;
    }
}

/// Result of [`DropIntentResolver::drag_ended`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// Nothing to drop, or the drop was not accepted. Tree unchanged.
    Cancelled,
    /// The relocation was refused. Tree unchanged.
    Rejected(TreeError),
    /// `nodes` now sit under `parent`, the first of them at `index`.
    Moved {
        parent: NodeId,
        index: usize,
        nodes: Vec<NodeId>,
    },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DropIntentResolver {
    options: DropOptions,
}

impl DropIntentResolver {
    pub fn new(options: DropOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> DropOptions {
        self.options
    }

    /// Start a drag of `sources`.
    ///
    /// Unknown or detached nodes, the root and duplicates are ignored, as is
    /// any node inside another dragged node's subtree (it moves with it).
    /// Returns whether a drag is now in progress.
    pub fn drag_began<P: FolderPayload>(
        &self,
        session: &mut DragSession,
        tree: &FolderTree<P>,
        sources: impl IntoIterator<Item = NodeId>,
    ) -> bool {
        let mut picked: Vec<NodeId> = Vec::new();
        for id in sources {
            if id != tree.root() && tree.is_attached(id) && !picked.contains(&id) {
                picked.push(id);
            }
        }
        let nested: Vec<bool> = picked
            .iter()
            .map(|node| {
                picked
                    .iter()
                    .any(|other| other != node && tree.is_ancestor_or_self(*other, *node))
            })
            .collect();
        let mut picked: Vec<NodeId> = picked
            .into_iter()
            .zip(nested)
            .filter_map(|(id, nested)| (!nested).then_some(id))
            .collect();

        if picked.is_empty() {
            session.reset(DragPhase::Idle);
            return false;
        }

        let rank: HashMap<NodeId, usize> = tree
            .descendants(tree.root())
            .enumerate()
            .map(|(ix, id)| (id, ix))
            .collect();
        picked.sort_by_key(|id| rank.get(id).copied().unwrap_or(usize::MAX));

        tracing::trace!(sources = ?picked, "drag began");
        session.phase = DragPhase::Dragging;
        session.sources = picked;
        session.hover = None;
        true
    }

    /// Re-evaluate the drop intent for the row under the pointer.
    pub fn drag_moved<P: FolderPayload>(
        &self,
        session: &mut DragSession,
        tree: &FolderTree<P>,
        hit: Option<RowHit>,
    ) -> DropHighlight {
        if !session.is_dragging() {
            return DropHighlight::None;
        }
        let Some(hit) = hit.filter(|hit| tree.contains(hit.node)) else {
            session.hover = None;
            return DropHighlight::None;
        };

        let can_have_children = tree.can_have_children(hit.node);
        let blocked = session
            .sources
            .iter()
            .any(|source| tree.is_ancestor_or_self(*source, hit.node));
        let mut highlight = resolve_intent(hit.fraction, can_have_children, blocked);

        // Rows without a parent (the root, if shown) have no siblings.
        if tree.parent(hit.node).is_none()
            && matches!(highlight, DropHighlight::Above | DropHighlight::Below)
        {
            highlight = if can_have_children {
                DropHighlight::OnItem
            } else {
                DropHighlight::None
            };
        }

        let hover = Hover {
            row: hit.row,
            node: hit.node,
            highlight,
        };
        if session.hover != Some(hover) {
            tracing::trace!(row = hit.row, node = %hit.node, ?highlight, "drop intent changed");
        }
        session.hover = Some(hover);
        highlight
    }

    /// [`drag_moved`](Self::drag_moved) with the row resolved through `layout`.
    pub fn drag_moved_at<P: FolderPayload, L: RowLayout>(
        &self,
        session: &mut DragSession,
        tree: &FolderTree<P>,
        layout: &L,
        y: f32,
    ) -> DropHighlight {
        self.drag_moved(session, tree, layout.hit(y))
    }

    /// Finish the drag. Applies the current intent if `accepted`.
    pub fn drag_ended<P: FolderPayload>(
        &self,
        session: &mut DragSession,
        tree: &mut FolderTree<P>,
        accepted: bool,
    ) -> DropOutcome {
        let hover = session.hover.take();
        let sources = std::mem::take(&mut session.sources);
        let was_dragging = session.is_dragging();
        session.reset(DragPhase::Idle);

        if !was_dragging || !accepted {
            return DropOutcome::Cancelled;
        }
        let Some(hover) = hover.filter(|hover| !hover.highlight.is_none()) else {
            return DropOutcome::Cancelled;
        };
        let sources: Vec<NodeId> = sources
            .into_iter()
            .filter(|id| tree.is_attached(*id))
            .collect();
        if sources.is_empty() {
            return DropOutcome::Cancelled;
        }

        match self.apply_drop(tree, &sources, hover.node, hover.highlight) {
            Ok((parent, index)) => {
                tracing::trace!(%parent, index, nodes = ?sources, "drop applied");
                session.phase = DragPhase::Dropped;
                DropOutcome::Moved {
                    parent,
                    index,
                    nodes: sources,
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, target = %hover.node, "drop rejected");
                DropOutcome::Rejected(err)
            }
        }
    }

    /// Abort the drag without touching the tree.
    pub fn drag_cancelled(&self, session: &mut DragSession) {
        if session.is_dragging() {
            tracing::trace!("drag cancelled");
        }
        session.reset(DragPhase::Idle);
    }

    fn apply_drop<P: FolderPayload>(
        &self,
        tree: &mut FolderTree<P>,
        sources: &[NodeId],
        target: NodeId,
        highlight: DropHighlight,
    ) -> Result<(NodeId, usize), TreeError> {
        let parent = match highlight {
            DropHighlight::OnItem => target,
            DropHighlight::Above | DropHighlight::Below => tree
                .parent(target)
                .ok_or_else(|| TreeError::InvalidArgument(format!("node {target} has no siblings")))?,
            DropHighlight::None => {
                return Err(TreeError::InvalidArgument("no drop target".into()));
            }
        };

        for source in sources {
            if tree.is_ancestor_or_self(*source, target) {
                return Err(TreeError::CycleDetected {
                    node: *source,
                    parent: target,
                });
            }
            tree.check_move(*source, parent)?;
        }

        for source in sources {
            tree.detach(*source)?;
        }

        let mut index = match highlight {
            DropHighlight::Above | DropHighlight::Below => {
                let target_ix = tree
                    .index_of_child(parent, target)
                    .ok_or(TreeError::NotFound(target))?;
                if highlight == DropHighlight::Above {
                    target_ix
                } else {
                    target_ix + 1
                }
            }
            _ => match self.options.on_item_position {
                InsertPosition::Front => 0,
                InsertPosition::Append => tree.count_of_children(parent),
            },
        };
        for source in sources {
            index = tree.add_child(parent, *source, index)? + 1;
        }

        let first = tree
            .index_of_child(parent, sources[0])
            .ok_or(TreeError::NotFound(sources[0]))?;
        Ok((parent, first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::FolderInfo;

    fn tree_abcd() -> (FolderTree<FolderInfo>, [NodeId; 4]) {
        let mut tree = FolderTree::new();
        let ids = ["A", "B", "C", "D"].map(|name| {
            let id = name.as_bytes()[0] as i64;
            tree.insert_folder(NodeId::ROOT, usize::MAX, FolderInfo::feed(id, name))
                .unwrap()
        });
        (tree, ids)
    }

    fn hit(row: usize, node: NodeId, fraction: f32) -> Option<RowHit> {
        Some(RowHit {
            row,
            node,
            fraction,
        })
    }

    #[test]
    fn intent_bands() {
        assert_eq!(resolve_intent(0.0, true, false), DropHighlight::Above);
        assert_eq!(resolve_intent(0.2, false, false), DropHighlight::Above);
        assert_eq!(resolve_intent(0.5, true, false), DropHighlight::OnItem);
        assert_eq!(resolve_intent(0.4, false, false), DropHighlight::Above);
        assert_eq!(resolve_intent(0.5, false, false), DropHighlight::Below);
        assert_eq!(resolve_intent(0.6, false, false), DropHighlight::Below);
        assert_eq!(resolve_intent(0.9, true, false), DropHighlight::Below);
        assert_eq!(resolve_intent(1.7, true, false), DropHighlight::Below);
        assert_eq!(resolve_intent(-3.0, true, false), DropHighlight::Above);
        assert_eq!(resolve_intent(f32::NAN, true, false), DropHighlight::OnItem);
        for fraction in [0.0, 0.5, 1.0] {
            assert_eq!(resolve_intent(fraction, true, true), DropHighlight::None);
        }
    }

    #[test]
    fn uniform_rows_map_pointer_to_row_and_fraction() {
        let rows = [NodeId(1), NodeId(2), NodeId(3)];
        let layout = UniformRows::new(&rows, 20.0).scroll_offset(10.0);

        assert_eq!(layout.row_at(0.0), Some((0, 0.5)));
        assert_eq!(layout.row_at(15.0), Some((1, 0.25)));
        assert_eq!(layout.row_at(50.0), None);
        assert_eq!(layout.row_at(-11.0), None);
        assert_eq!(layout.hit(15.0).map(|hit| hit.node), Some(NodeId(2)));
        assert_eq!(UniformRows::new(&rows, 0.0).row_at(5.0), None);
    }

    #[test]
    fn drag_without_sources_stays_idle() {
        let (tree, _) = tree_abcd();
        let resolver = DropIntentResolver::default();
        let mut session = DragSession::new();
        assert!(!resolver.drag_began(&mut session, &tree, [NodeId::ROOT, NodeId(999)]));
        assert_eq!(session.phase(), DragPhase::Idle);
        assert_eq!(
            resolver.drag_moved(&mut session, &tree, hit(0, NodeId(65), 0.1)),
            DropHighlight::None
        );
    }

    #[test]
    fn sources_are_normalized_to_tree_order() {
        let mut tree = FolderTree::new();
        let g = tree
            .insert_folder(NodeId::ROOT, usize::MAX, FolderInfo::group(1, "G"))
            .unwrap();
        let b = tree
            .insert_folder(g, usize::MAX, FolderInfo::feed(2, "B"))
            .unwrap();
        let a = tree
            .insert_folder(NodeId::ROOT, usize::MAX, FolderInfo::feed(3, "A"))
            .unwrap();

        let resolver = DropIntentResolver::default();
        let mut session = DragSession::new();
        assert!(resolver.drag_began(&mut session, &tree, [a, b, g, a]));
        assert_eq!(session.sources(), &[g, a]);
    }

    #[test]
    fn highlight_is_per_row_and_cleared_when_leaving_rows() {
        let (tree, [a, b, ..]) = tree_abcd();
        let resolver = DropIntentResolver::default();
        let mut session = DragSession::new();
        resolver.drag_began(&mut session, &tree, [a]);

        assert_eq!(
            resolver.drag_moved(&mut session, &tree, hit(1, b, 0.9)),
            DropHighlight::Below
        );
        assert_eq!(session.highlight_for_row(1), DropHighlight::Below);
        assert_eq!(session.highlight_for_row(0), DropHighlight::None);

        assert_eq!(resolver.drag_moved(&mut session, &tree, None), DropHighlight::None);
        assert_eq!(session.highlight_for_row(1), DropHighlight::None);
        assert_eq!(session.hover_state(), None);
    }

    #[test]
    fn dragged_row_itself_is_never_a_target() {
        let (tree, [a, ..]) = tree_abcd();
        let resolver = DropIntentResolver::default();
        let mut session = DragSession::new();
        resolver.drag_began(&mut session, &tree, [a]);
        for fraction in [0.0, 0.5, 1.0] {
            assert_eq!(
                resolver.drag_moved(&mut session, &tree, hit(0, a, fraction)),
                DropHighlight::None
            );
        }
        assert_eq!(
            resolver.drag_ended(&mut session, &mut tree.clone(), true),
            DropOutcome::Cancelled
        );
    }

    #[test]
    fn multi_source_drop_below_keeps_relative_order() {
        let (mut tree, [a, b, c, d]) = tree_abcd();
        let resolver = DropIntentResolver::default();
        let mut session = DragSession::new();

        resolver.drag_began(&mut session, &tree, [d, b]);
        resolver.drag_moved(&mut session, &tree, hit(0, a, 0.8));
        let outcome = resolver.drag_ended(&mut session, &mut tree, true);

        assert_eq!(
            outcome,
            DropOutcome::Moved {
                parent: NodeId::ROOT,
                index: 1,
                nodes: vec![b, d],
            }
        );
        assert_eq!(tree.children(NodeId::ROOT), &[a, b, d, c]);
        assert_eq!(session.phase(), DragPhase::Dropped);
        assert_eq!(session.highlight(), DropHighlight::None);
    }

    #[test]
    fn drop_above_later_sibling() {
        let (mut tree, [a, b, c, d]) = tree_abcd();
        let resolver = DropIntentResolver::default();
        let mut session = DragSession::new();

        resolver.drag_began(&mut session, &tree, [a]);
        resolver.drag_moved(&mut session, &tree, hit(3, d, 0.1));
        resolver.drag_ended(&mut session, &mut tree, true);
        assert_eq!(tree.children(NodeId::ROOT), &[b, c, a, d]);
    }

    #[test]
    fn on_item_position_is_configurable() {
        for (position, expected) in [(InsertPosition::Front, 0), (InsertPosition::Append, 1)] {
            let mut tree = FolderTree::new();
            let g = tree
                .insert_folder(NodeId::ROOT, usize::MAX, FolderInfo::group(1, "G"))
                .unwrap();
            tree.insert_folder(g, usize::MAX, FolderInfo::feed(2, "B"))
                .unwrap();
            let a = tree
                .insert_folder(NodeId::ROOT, usize::MAX, FolderInfo::feed(3, "A"))
                .unwrap();

            let resolver = DropIntentResolver::new(DropOptions {
                on_item_position: position,
            });
            let mut session = DragSession::new();
            resolver.drag_began(&mut session, &tree, [a]);
            assert_eq!(
                resolver.drag_moved(&mut session, &tree, hit(0, g, 0.5)),
                DropHighlight::OnItem
            );
            resolver.drag_ended(&mut session, &mut tree, true);
            assert_eq!(tree.index_of_child(g, a), Some(expected));
        }
    }

    #[test]
    fn cancel_and_unaccepted_drop_leave_tree_untouched() {
        let (mut tree, [a, b, ..]) = tree_abcd();
        let resolver = DropIntentResolver::default();
        let mut session = DragSession::new();
        let revision = tree.revision();

        resolver.drag_began(&mut session, &tree, [a]);
        resolver.drag_moved(&mut session, &tree, hit(1, b, 0.9));
        resolver.drag_cancelled(&mut session);
        assert_eq!(session.phase(), DragPhase::Idle);
        assert!(session.sources().is_empty());

        resolver.drag_began(&mut session, &tree, [a]);
        resolver.drag_moved(&mut session, &tree, hit(1, b, 0.9));
        assert_eq!(
            resolver.drag_ended(&mut session, &mut tree, false),
            DropOutcome::Cancelled
        );
        assert_eq!(tree.revision(), revision);
    }

    #[test]
    fn drop_rejected_when_target_changed_after_hover() {
        let mut tree = FolderTree::new();
        let g = tree
            .construct(NodeId::ROOT, usize::MAX, None, true)
            .unwrap();
        let a = tree
            .insert_folder(NodeId::ROOT, usize::MAX, FolderInfo::feed(1, "A"))
            .unwrap();
        let resolver = DropIntentResolver::default();
        let mut session = DragSession::new();

        resolver.drag_began(&mut session, &tree, [g]);
        resolver.drag_moved(&mut session, &tree, hit(1, a, 0.9));
        // The hovered row moves into the dragged group before the drop lands.
        tree.move_node(a, g, 0).unwrap();
        let revision = tree.revision();

        let outcome = resolver.drag_ended(&mut session, &mut tree, true);
        assert_eq!(
            outcome,
            DropOutcome::Rejected(TreeError::CycleDetected { node: g, parent: a })
        );
        assert_eq!(tree.revision(), revision);
        assert_eq!(session.phase(), DragPhase::Idle);
    }

    #[test]
    fn root_row_only_accepts_drops_into_it() {
        let (tree, [a, ..]) = tree_abcd();
        let resolver = DropIntentResolver::default();
        let mut session = DragSession::new();
        resolver.drag_began(&mut session, &tree, [a]);
        assert_eq!(
            resolver.drag_moved(&mut session, &tree, hit(0, NodeId::ROOT, 0.1)),
            DropHighlight::OnItem
        );
    }
}
