use serde::{Deserialize, Serialize};

/// How a child sequence is ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMethod {
    /// Keep the user's order. Sorting with this method is a no-op.
    #[default]
    Manual,
    ByNameAscending,
    ByNameDescending,
}

impl SortMethod {
    pub fn is_manual(self) -> bool {
        self == SortMethod::Manual
    }
}

/// How [`FolderTree::child_by_name`](crate::FolderTree::child_by_name) compares names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatch {
    #[default]
    Exact,
    IgnoreCase,
}

/// Where an `OnItem` drop places the dragged nodes inside the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPosition {
    Front,
    #[default]
    Append,
}

/// Tree-wide preferences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    /// Active "keep arranged" ordering. Anything but [`SortMethod::Manual`]
    /// keeps every level sorted and places inserts at their sorted position.
    pub sort_method: SortMethod,
    pub name_match: NameMatch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropOptions {
    pub on_item_position: InsertPosition,
}
