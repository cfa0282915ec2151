use std::{rc::Rc, sync::Arc};

/// The view of an externally-owned folder that the tree needs.
///
/// Feeds, groups and smart folders all implement this one interface; the tree
/// never mutates the folder, it only places it.
pub trait FolderPayload {
    /// Stable identifier. Becomes the id of the node that carries the payload.
    fn id(&self) -> i64;

    /// Display name, used for name lookups and sorting.
    fn name(&self) -> &str;

    /// Whether the folder may contain other folders (groups do, feeds don't).
    fn is_container(&self) -> bool;
}

impl<T: FolderPayload + ?Sized> FolderPayload for Rc<T> {
    fn id(&self) -> i64 {
        (**self).id()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_container(&self) -> bool {
        (**self).is_container()
    }
}

impl<T: FolderPayload + ?Sized> FolderPayload for Arc<T> {
    fn id(&self) -> i64 {
        (**self).id()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_container(&self) -> bool {
        (**self).is_container()
    }
}

impl<T: FolderPayload + ?Sized> FolderPayload for &T {
    fn id(&self) -> i64 {
        (**self).id()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_container(&self) -> bool {
        (**self).is_container()
    }
}

/// A plain folder record, handy for tests and demos.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderInfo {
    pub id: i64,
    pub name: String,
    pub container: bool,
}

impl FolderInfo {
    pub fn feed(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            container: false,
        }
    }

    pub fn group(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            container: true,
        }
    }
}

impl FolderPayload for FolderInfo {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_container(&self) -> bool {
        self.container
    }
}
