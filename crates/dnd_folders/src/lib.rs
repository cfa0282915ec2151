//! gpui view over a [`folder_tree::FolderTree`] with drag-and-drop reordering.

mod tree;

pub use tree::{DndFolderEntry, DndFolderRowState, DndFolders, DndFoldersState, dnd_folders};
