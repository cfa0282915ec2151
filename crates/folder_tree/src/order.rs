use serde::{Deserialize, Serialize};

use crate::payload::FolderPayload;
use crate::tree::{FolderTree, NodeId};

/// Placement of one folder, in the linked form a folder store keeps on disk:
/// every folder remembers its parent, its first child and its next sibling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderLinks {
    pub id: NodeId,
    pub parent: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_child: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_sibling: Option<NodeId>,
}

/// Links for the direct children of `parent`, in order.
///
/// This is what needs saving after a level has been reordered.
pub fn sibling_links<P: FolderPayload>(tree: &FolderTree<P>, parent: NodeId) -> Vec<FolderLinks> {
    tree.children(parent)
        .iter()
        .map(|id| links_for(tree, parent, *id))
        .collect()
}

/// Links for every folder reachable from the root, in depth-first order.
pub fn manual_order<P: FolderPayload>(tree: &FolderTree<P>) -> Vec<FolderLinks> {
    tree.descendants(tree.root())
        .skip(1)
        .filter_map(|id| Some(links_for(tree, tree.parent(id)?, id)))
        .collect()
}

/// The root's first child, which a store keeps next to the folder links.
pub fn first_root_child<P: FolderPayload>(tree: &FolderTree<P>) -> Option<NodeId> {
    tree.first_child(tree.root())
}

fn links_for<P: FolderPayload>(tree: &FolderTree<P>, parent: NodeId, id: NodeId) -> FolderLinks {
    FolderLinks {
        id,
        parent,
        first_child: tree.first_child(id),
        next_sibling: tree.next_sibling(id),
    }
}
