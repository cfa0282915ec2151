use crate::tree::NodeId;

/// Errors returned by structural tree operations.
///
/// Every failing operation leaves the tree exactly as it was.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Bad index, unknown node, duplicate id or a capability violation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Inserting `node` under `parent` would make `node` its own ancestor.
    #[error("moving node {node} under {parent} would create a cycle")]
    CycleDetected { node: NodeId, parent: NodeId },
    /// `node` is already in the child sequence of `parent`.
    #[error("node {node} already has parent {parent}")]
    AlreadyParented { node: NodeId, parent: NodeId },
    #[error("node {0} not found")]
    NotFound(NodeId),
}

impl TreeError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        TreeError::InvalidArgument(message.into())
    }
}

pub type Result<T, E = TreeError> = std::result::Result<T, E>;
