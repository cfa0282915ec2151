//! Folder hierarchy for a feed reader's navigation tree, plus the drag-and-drop
//! logic that reorders it.

mod drop_intent;
mod error;
mod options;
mod order;
mod payload;
mod tree;

pub use drop_intent::{
    DragPhase, DragSession, DropHighlight, DropIntentResolver, DropOutcome, RowHit, RowLayout,
    UniformRows, resolve_intent,
};
pub use error::{Result, TreeError};
pub use options::{DropOptions, InsertPosition, NameMatch, SortMethod, TreeOptions};
pub use order::{FolderLinks, first_root_child, manual_order, sibling_links};
pub use payload::{FolderInfo, FolderPayload};
pub use tree::{Descendants, FolderTree, NodeId, NodeView, TreeChange};
