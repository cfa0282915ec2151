use std::{cmp::Ordering, collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use unicase::UniCase;
use unicode_normalization::{UnicodeNormalization as _, char::is_combining_mark};

use crate::error::{Result, TreeError};
use crate::options::{NameMatch, SortMethod, TreeOptions};
use crate::payload::FolderPayload;

const ROOT_NAME: &str = "<root>";
const GROUP_NAME: &str = "<group>";

/// Stable identifier of a node.
///
/// Nodes that carry a payload use the payload's id. Structural nodes get a
/// negative id from the tree; the root is always [`NodeId::ROOT`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A structural change, recorded after every successful mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum TreeChange {
    Inserted {
        parent: NodeId,
        node: NodeId,
        index: usize,
    },
    Removed {
        parent: NodeId,
        node: NodeId,
    },
    Reordered {
        parent: NodeId,
    },
    PayloadChanged {
        node: NodeId,
    },
}

/// Borrowed view of a single node, handed to custom comparators.
#[derive(Debug)]
pub struct NodeView<'a, P> {
    pub id: NodeId,
    pub name: &'a str,
    pub payload: Option<&'a P>,
    pub can_have_children: bool,
}

#[derive(Clone, Debug)]
struct Node<P> {
    payload: Option<P>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    can_have_children: bool,
}

/// The folder hierarchy behind the navigation tree.
///
/// Nodes live in an arena keyed by [`NodeId`]; each node owns the ordered
/// list of its children and only refers back to its parent.
#[derive(Clone, Debug)]
pub struct FolderTree<P> {
    nodes: HashMap<NodeId, Node<P>>,
    options: TreeOptions,
    next_synthetic_id: i64,
    revision: u64,
    changes: Option<Vec<TreeChange>>,
}

impl<P: FolderPayload> Default for FolderTree<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: FolderPayload> FolderTree<P> {
    pub fn new() -> Self {
        Self::with_options(TreeOptions::default())
    }

    pub fn with_options(options: TreeOptions) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            NodeId::ROOT,
            Node {
                payload: None,
                parent: None,
                children: Vec::new(),
                can_have_children: true,
            },
        );
        Self {
            nodes,
            options,
            next_synthetic_id: -1,
            revision: 0,
            changes: None,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn options(&self) -> TreeOptions {
        self.options
    }

    pub fn set_name_match(&mut self, name_match: NameMatch) {
        self.options.name_match = name_match;
    }

    /// Number of live nodes, root and detached nodes included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the root has no children.
    pub fn is_empty(&self) -> bool {
        self.count_of_children(NodeId::ROOT) == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Incremented on every successful structural mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Start or stop recording [`TreeChange`]s. Off by default.
    ///
    /// While on, the log grows until the owner drains it with
    /// [`take_changes`](Self::take_changes). Turning it off discards the log.
    /// The revision counter is kept either way.
    pub fn set_change_log(&mut self, enabled: bool) {
        match (enabled, self.changes.is_some()) {
            (true, false) => self.changes = Some(Vec::new()),
            (false, true) => self.changes = None,
            _ => {}
        }
    }

    pub fn records_changes(&self) -> bool {
        self.changes.is_some()
    }

    /// Drain the changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<TreeChange> {
        self.changes.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Create a node under `parent` at `insert_index` (clamped to the child count).
    ///
    /// With a keep-arranged sort method active the index is ignored and the
    /// node goes to its sorted position instead.
    pub fn construct(
        &mut self,
        parent: NodeId,
        insert_index: usize,
        payload: Option<P>,
        can_have_children: bool,
    ) -> Result<NodeId> {
        let parent_node = self
            .nodes
            .get(&parent)
            .ok_or(TreeError::NotFound(parent))?;
        if !parent_node.can_have_children {
            tracing::debug!(%parent, "rejected insert into a node without children");
            return Err(TreeError::invalid(format!(
                "node {parent} cannot have children"
            )));
        }

        let id = match payload.as_ref() {
            Some(payload) => {
                let id = NodeId(payload.id());
                if self.contains(id) {
                    tracing::debug!(node = %id, "rejected duplicate node id");
                    return Err(TreeError::invalid(format!("node id {id} is already in use")));
                }
                id
            }
            None => self.allocate_synthetic_id(),
        };

        self.nodes.insert(
            id,
            Node {
                payload,
                parent: Some(parent),
                children: Vec::new(),
                can_have_children,
            },
        );
        let index = self.insertion_index(parent, id, insert_index);
        self.node_mut(parent).children.insert(index, id);
        self.record(TreeChange::Inserted {
            parent,
            node: id,
            index,
        });
        Ok(id)
    }

    /// [`construct`](Self::construct) with the capability taken from the payload.
    pub fn insert_folder(&mut self, parent: NodeId, insert_index: usize, payload: P) -> Result<NodeId> {
        let can_have_children = payload.is_container();
        self.construct(parent, insert_index, Some(payload), can_have_children)
    }

    /// Insert a detached node as a child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId, at_index: usize) -> Result<usize> {
        self.check_attach(parent, child)?;
        let index = self.insertion_index(parent, child, at_index);
        self.attach(parent, child, index);
        Ok(index)
    }

    /// Take `node` out of its parent's children without destroying it.
    ///
    /// Returns the former parent and index. The subtree stays intact and can be
    /// re-inserted with [`add_child`](Self::add_child).
    pub fn detach(&mut self, node: NodeId) -> Result<(NodeId, usize)> {
        if node == NodeId::ROOT {
            return Err(TreeError::invalid("the root cannot be detached"));
        }
        let parent = self
            .nodes
            .get(&node)
            .ok_or(TreeError::NotFound(node))?
            .parent
            .ok_or_else(|| TreeError::invalid(format!("node {node} is already detached")))?;
        let index = self
            .index_of_child(parent, node)
            .ok_or(TreeError::NotFound(node))?;

        self.node_mut(parent).children.remove(index);
        self.node_mut(node).parent = None;
        self.record(TreeChange::Removed { parent, node });
        Ok((parent, index))
    }

    /// Remove `child` from `parent`.
    ///
    /// With `remove_descendants` the whole subtree is discarded. Otherwise the
    /// child's own children take its place, in order, and only the child is
    /// discarded.
    pub fn remove_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        remove_descendants: bool,
    ) -> Result<()> {
        if !self.contains(parent) {
            return Err(TreeError::NotFound(parent));
        }
        let index = self
            .index_of_child(parent, child)
            .ok_or(TreeError::NotFound(child))?;

        self.node_mut(parent).children.remove(index);
        if remove_descendants {
            self.discard_subtree(child);
            self.record(TreeChange::Removed {
                parent,
                node: child,
            });
            return Ok(());
        }

        let promoted = self
            .nodes
            .remove(&child)
            .map(|node| node.children)
            .unwrap_or_default();
        for &id in &promoted {
            self.node_mut(id).parent = Some(parent);
        }
        let promoted_any = !promoted.is_empty();
        let children = &mut self.node_mut(parent).children;
        let tail = children.split_off(index);
        children.extend(promoted);
        children.extend(tail);
        self.record(TreeChange::Removed {
            parent,
            node: child,
        });

        if promoted_any {
            let method = self.options.sort_method;
            let revision = self.revision;
            if !method.is_manual() {
                self.sort_children(parent, method)?;
            }
            if self.revision == revision {
                self.record(TreeChange::Reordered { parent });
            }
        }
        Ok(())
    }

    /// Discard every child subtree of `parent`.
    pub fn remove_children(&mut self, parent: NodeId) -> Result<()> {
        let children = std::mem::take(
            &mut self
                .nodes
                .get_mut(&parent)
                .ok_or(TreeError::NotFound(parent))?
                .children,
        );
        for child in children {
            self.discard_subtree(child);
            self.record(TreeChange::Removed {
                parent,
                node: child,
            });
        }
        Ok(())
    }

    /// Re-order the direct children of `parent`. Does not recurse.
    ///
    /// While the tree is kept arranged only the active method is accepted.
    pub fn sort_children(&mut self, parent: NodeId, method: SortMethod) -> Result<()> {
        if !self.contains(parent) {
            return Err(TreeError::NotFound(parent));
        }
        if method.is_manual() {
            return Ok(());
        }
        self.check_arrangement(method)?;
        self.reorder_children(parent, |tree, a, b| tree.order(method, a, b));
        Ok(())
    }

    /// Stable sort of the direct children of `parent` with a custom comparison.
    ///
    /// Refused while the tree is kept arranged.
    pub fn sort_children_by<F>(&mut self, parent: NodeId, mut compare: F) -> Result<()>
    where
        F: FnMut(NodeView<'_, P>, NodeView<'_, P>) -> Ordering,
    {
        if !self.contains(parent) {
            return Err(TreeError::NotFound(parent));
        }
        if !self.options.sort_method.is_manual() {
            return Err(TreeError::invalid(
                "custom ordering needs the manual sort method",
            ));
        }
        self.reorder_children(parent, |tree, a, b| {
            match (tree.view(a), tree.view(b)) {
                (Some(a), Some(b)) => compare(a, b),
                _ => Ordering::Equal,
            }
        });
        Ok(())
    }

    /// Sort every level of the subtree rooted at `node`.
    pub fn sort_subtree(&mut self, node: NodeId, method: SortMethod) -> Result<()> {
        if !self.contains(node) {
            return Err(TreeError::NotFound(node));
        }
        if !method.is_manual() {
            self.check_arrangement(method)?;
        }
        let containers: Vec<NodeId> = self
            .descendants(node)
            .filter(|id| self.count_of_children(*id) > 1)
            .collect();
        for id in containers {
            self.sort_children(id, method)?;
        }
        Ok(())
    }

    pub fn sort_method(&self) -> SortMethod {
        self.options.sort_method
    }

    /// Switch the tree-wide "keep arranged" ordering.
    ///
    /// A sorting method re-sorts every level right away, detached subtrees
    /// included. [`SortMethod::Manual`] keeps the current order as the new
    /// manual order.
    pub fn set_sort_method(&mut self, method: SortMethod) {
        self.options.sort_method = method;
        if method.is_manual() {
            return;
        }
        let mut containers: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.children.len() > 1)
            .map(|(id, _)| *id)
            .collect();
        containers.sort();
        for id in containers {
            self.reorder_children(id, |tree, a, b| tree.order(method, a, b));
        }
    }

    /// First child of `parent` whose name matches, per the tree's [`NameMatch`].
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let name_match = self.options.name_match;
        self.children(parent)
            .iter()
            .copied()
            .find(|child| match name_match {
                NameMatch::Exact => self.name(*child) == Some(name),
                NameMatch::IgnoreCase => self
                    .name(*child)
                    .is_some_and(|child_name| UniCase::new(child_name) == UniCase::new(name)),
            })
    }

    pub fn child_by_index(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).get(index).copied()
    }

    pub fn index_of_child(&self, parent: NodeId, node: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|child| *child == node)
    }

    /// The node with `id` inside the subtree rooted at `node`, `node` included.
    pub fn node_from_id(&self, node: NodeId, id: NodeId) -> Option<NodeId> {
        (self.contains(node) && self.is_ancestor_or_self(node, id)).then_some(id)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|node| node.parent)
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).first().copied()
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_of_child(parent, node)?;
        self.child_by_index(parent, index + 1)
    }

    /// Children of `node` in order; empty for unknown nodes.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(&node)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn count_of_children(&self, node: NodeId) -> usize {
        self.children(node).len()
    }

    pub fn can_have_children(&self, node: NodeId) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|node| node.can_have_children)
    }

    pub fn payload(&self, node: NodeId) -> Option<&P> {
        self.nodes.get(&node)?.payload.as_ref()
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        let entry = self.nodes.get(&node)?;
        Some(match entry.payload.as_ref() {
            Some(payload) => payload.name(),
            None if node == NodeId::ROOT => ROOT_NAME,
            None => GROUP_NAME,
        })
    }

    pub fn view(&self, node: NodeId) -> Option<NodeView<'_, P>> {
        let entry = self.nodes.get(&node)?;
        Some(NodeView {
            id: node,
            name: self.name(node)?,
            payload: entry.payload.as_ref(),
            can_have_children: entry.can_have_children,
        })
    }

    /// Number of ancestors between `node` and the top of its tree.
    pub fn depth(&self, node: NodeId) -> Option<usize> {
        if !self.contains(node) {
            return None;
        }
        let mut depth = 0;
        let mut current = self.parent(node);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        Some(depth)
    }

    /// Whether `ancestor` is `node` or lies on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.contains(node).then_some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether `node` is reachable from the root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.is_ancestor_or_self(NodeId::ROOT, node)
    }

    /// Depth-first, pre-order walk of the subtree rooted at `node`, `node` first.
    pub fn descendants(&self, node: NodeId) -> Descendants<'_, P> {
        Descendants {
            tree: self,
            stack: if self.contains(node) {
                vec![node]
            } else {
                Vec::new()
            },
        }
    }

    /// Case-insensitive, accent-aware comparison of two node names.
    ///
    /// Base letters decide first, so `Élan` sorts with the `e`s. Names that
    /// differ only in accents then order unaccented first. Names that differ
    /// only in case compare `Equal`, so stable sorts keep insertion order.
    pub fn compare_by_name(&self, a: NodeId, b: NodeId) -> Ordering {
        let a = self.name(a).unwrap_or_default();
        let b = self.name(b).unwrap_or_default();
        base_letters(a)
            .cmp(base_letters(b))
            .then_with(|| UniCase::new(a).cmp(&UniCase::new(b)))
    }

    /// Move `node` (with its subtree) under `new_parent` at `index`.
    ///
    /// `index` refers to the child list after `node` has been taken out of its
    /// old position. Everything is validated before anything changes.
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId, index: usize) -> Result<usize> {
        self.check_move(node, new_parent)?;
        if self.parent(node).is_some() {
            self.detach(node)?;
        }
        self.add_child(new_parent, node, index)
    }

    /// Check that [`move_node`](Self::move_node) would succeed, without changing anything.
    pub fn check_move(&self, node: NodeId, new_parent: NodeId) -> Result<()> {
        if !self.contains(node) {
            return Err(TreeError::NotFound(node));
        }
        if node == NodeId::ROOT {
            return Err(TreeError::invalid("the root cannot be moved"));
        }
        if !self.contains(new_parent) {
            return Err(TreeError::NotFound(new_parent));
        }
        if !self.can_have_children(new_parent) {
            return Err(TreeError::invalid(format!(
                "node {new_parent} cannot have children"
            )));
        }
        if self.is_ancestor_or_self(node, new_parent) {
            return Err(TreeError::CycleDetected {
                node,
                parent: new_parent,
            });
        }
        Ok(())
    }

    /// Swap the payload handle of `node`. The payload must keep the node's id.
    pub fn set_payload(&mut self, node: NodeId, payload: P) -> Result<()> {
        if !self.contains(node) {
            return Err(TreeError::NotFound(node));
        }
        if payload.id() != node.get() {
            return Err(TreeError::invalid(format!(
                "payload id {} does not match node {node}",
                payload.id()
            )));
        }
        self.node_mut(node).payload = Some(payload);
        self.record(TreeChange::PayloadChanged { node });

        let method = self.options.sort_method;
        if let Some(parent) = self.parent(node)
            && !method.is_manual()
        {
            self.sort_children(parent, method)?;
        }
        Ok(())
    }

    /// Index right after `predecessor` among the children of `parent`, or 0.
    pub fn index_after(&self, parent: NodeId, predecessor: Option<NodeId>) -> Result<usize> {
        if !self.contains(parent) {
            return Err(TreeError::NotFound(parent));
        }
        match predecessor {
            None => Ok(0),
            Some(predecessor) => self
                .index_of_child(parent, predecessor)
                .map(|index| index + 1)
                .ok_or(TreeError::NotFound(predecessor)),
        }
    }

    /// Indented outline of the subtree under `node`, one name per line.
    pub fn outline(&self, node: NodeId) -> String {
        let base = self.depth(node).unwrap_or_default();
        let mut out = String::new();
        for id in self.descendants(node).skip(1) {
            let depth = self.depth(id).unwrap_or_default() - base - 1;
            out.push_str(&"  ".repeat(depth));
            out.push_str(self.name(id).unwrap_or_default());
            out.push('\n');
        }
        out
    }

    fn check_arrangement(&self, method: SortMethod) -> Result<()> {
        let active = self.options.sort_method;
        if active.is_manual() || active == method {
            return Ok(());
        }
        tracing::debug!(?method, ?active, "rejected sort against the kept arrangement");
        Err(TreeError::invalid(format!(
            "tree is kept arranged by {active:?}, cannot sort by {method:?}"
        )))
    }

    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self.nodes.get(&parent).ok_or(TreeError::NotFound(parent))?;
        let child_node = self.nodes.get(&child).ok_or(TreeError::NotFound(child))?;
        if !parent_node.can_have_children {
            tracing::debug!(%parent, %child, "rejected insert into a node without children");
            return Err(TreeError::invalid(format!(
                "node {parent} cannot have children"
            )));
        }
        if self.is_ancestor_or_self(child, parent) {
            tracing::debug!(%parent, %child, "rejected insert that would create a cycle");
            return Err(TreeError::CycleDetected {
                node: child,
                parent,
            });
        }
        if child == NodeId::ROOT {
            return Err(TreeError::invalid("the root cannot be given a parent"));
        }
        if let Some(current) = child_node.parent {
            return Err(TreeError::AlreadyParented {
                node: child,
                parent: current,
            });
        }
        Ok(())
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, index: usize) {
        self.node_mut(parent).children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        self.record(TreeChange::Inserted {
            parent,
            node: child,
            index,
        });
    }

    fn insertion_index(&self, parent: NodeId, child: NodeId, requested: usize) -> usize {
        let children = self.children(parent);
        match self.options.sort_method {
            SortMethod::Manual => requested.min(children.len()),
            method => children
                .iter()
                .filter(|id| **id != child)
                .take_while(|id| self.order(method, **id, child) != Ordering::Greater)
                .count(),
        }
    }

    fn order(&self, method: SortMethod, a: NodeId, b: NodeId) -> Ordering {
        match method {
            SortMethod::Manual => Ordering::Equal,
            SortMethod::ByNameAscending => self.compare_by_name(a, b),
            SortMethod::ByNameDescending => self.compare_by_name(b, a),
        }
    }

    fn reorder_children<F>(&mut self, parent: NodeId, mut compare: F)
    where
        F: FnMut(&Self, NodeId, NodeId) -> Ordering,
    {
        let Some(node) = self.nodes.get_mut(&parent) else {
            return;
        };
        let mut children = std::mem::take(&mut node.children);
        let before = children.clone();
        children.sort_by(|a, b| compare(self, *a, *b));
        let changed = children != before;
        self.node_mut(parent).children = children;
        if changed {
            self.record(TreeChange::Reordered { parent });
        }
    }

    fn discard_subtree(&mut self, node: NodeId) {
        let doomed: Vec<NodeId> = self.descendants(node).collect();
        for id in doomed {
            self.nodes.remove(&id);
        }
    }

    fn allocate_synthetic_id(&mut self) -> NodeId {
        loop {
            let id = NodeId(self.next_synthetic_id);
            self.next_synthetic_id -= 1;
            if !self.contains(id) {
                return id;
            }
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<P> {
        self.nodes
            .get_mut(&id)
            .unwrap_or_else(|| panic!("node {id} checked before mutation"))
    }

    fn record(&mut self, change: TreeChange) {
        self.revision += 1;
        tracing::trace!(?change, revision = self.revision, "tree changed");
        if let Some(changes) = self.changes.as_mut() {
            changes.push(change);
        }
    }
}

/// Decomposed, lower-cased letters of `name` with combining marks removed.
fn base_letters(name: &str) -> impl Iterator<Item = char> + '_ {
    name.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

/// Iterator returned by [`FolderTree::descendants`].
pub struct Descendants<'a, P> {
    tree: &'a FolderTree<P>,
    stack: Vec<NodeId>,
}

impl<P: FolderPayload> Iterator for Descendants<'_, P> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}
