//! Virtual file tree port (driven/secondary port)
//!
//! The tree is the local, in-process hierarchy of nodes that remote
//! resources are materialized as. Nodes are addressed by [`NodeId`] handles
//! which stay stable across renames and moves; a handle stops being valid
//! once its node (or an ancestor) is deleted.
//!
//! ## Design Notes
//!
//! - The trait is synchronous. Tree mutations are cheap in-memory
//!   operations; callers that need them ordered run them inside the
//!   exclusive mutation context provided by the attributes layer.
//! - Uses `anyhow::Result`; the attributes layer maps failures on handles
//!   that are no longer valid to a stale-handle error.

use crate::domain::newtypes::NodeId;

/// Port trait for the virtual file tree
pub trait IFileTree: Send + Sync {
    /// Handle of the tree root
    fn root(&self) -> NodeId;

    /// Whether `node` still exists in the tree
    fn is_valid(&self, node: NodeId) -> bool;

    /// Looks up a direct child by name
    fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId>;

    /// Direct children of `node` (empty for files and unknown handles)
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Creates a child node
    ///
    /// Fails if `parent` is invalid, is not a directory, or already has a
    /// child named `name`.
    fn create_node(&self, parent: NodeId, name: &str, is_directory: bool)
        -> anyhow::Result<NodeId>;

    fn rename(&self, node: NodeId, new_name: &str) -> anyhow::Result<()>;

    fn move_node(&self, node: NodeId, new_parent: NodeId) -> anyhow::Result<()>;

    /// Deletes `node` and its whole subtree
    fn delete(&self, node: NodeId) -> anyhow::Result<()>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn name(&self, node: NodeId) -> Option<String>;

    /// Slash-joined path from the root, e.g. `/host/Data Sets/VOL1/HLQ.DATA`
    fn path(&self, node: NodeId) -> Option<String>;

    fn is_directory(&self, node: NodeId) -> bool;

    fn set_directory(&self, node: NodeId, is_directory: bool) -> anyhow::Result<()>;

    fn is_writable(&self, node: NodeId) -> bool;

    fn set_writable(&self, node: NodeId, writable: bool) -> anyhow::Result<()>;

    /// Current local content of a file node
    fn read_bytes(&self, node: NodeId) -> anyhow::Result<Vec<u8>>;

    /// Replaces the local content of a file node
    fn write_bytes(&self, node: NodeId, bytes: &[u8]) -> anyhow::Result<()>;
}
