//! In-memory virtual file tree.
//!
//! Nodes live in a single handle-indexed table guarded by a `parking_lot`
//! lock; each directory keeps a name index of its children so lookups by
//! `(parent, name)` do not scan the table. Handles are allocated from a
//! monotonically increasing counter and never reused, so a handle that was
//! deleted can never alias a newer node.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use mfsync_core::domain::NodeId;
use mfsync_core::ports::IFileTree;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::VfsError;

/// Handle of the root node
pub const ROOT_NODE: NodeId = NodeId::new(1);

#[derive(Debug, Clone)]
struct TreeNode {
    name: String,
    parent: Option<NodeId>,
    is_directory: bool,
    writable: bool,
    children: BTreeMap<String, NodeId>,
    content: Vec<u8>,
}

impl TreeNode {
    fn new(name: &str, parent: Option<NodeId>, is_directory: bool) -> Self {
        Self {
            name: name.to_string(),
            parent,
            is_directory,
            writable: true,
            children: BTreeMap::new(),
            content: Vec::new(),
        }
    }
}

/// Handle-addressed in-memory tree implementing [`IFileTree`].
pub struct MemoryFileTree {
    nodes: RwLock<HashMap<NodeId, TreeNode>>,
    next_id: AtomicU64,
}

impl MemoryFileTree {
    /// Creates a tree holding only the root directory.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_NODE, TreeNode::new("", None, true));
        Self {
            nodes: RwLock::new(nodes),
            next_id: AtomicU64::new(ROOT_NODE.get() + 1),
        }
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        // The root is always present.
        false
    }

    /// Resolves a slash-separated path from the root.
    pub fn lookup_path(&self, path: &str) -> Option<NodeId> {
        let nodes = self.nodes.read();
        let mut current = ROOT_NODE;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = *nodes.get(&current)?.children.get(segment)?;
        }
        Some(current)
    }

    fn allocate(&self) -> NodeId {
        NodeId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for MemoryFileTree {
    fn default() -> Self {
        Self::new()
    }
}

fn node<'a>(nodes: &'a HashMap<NodeId, TreeNode>, id: NodeId) -> Result<&'a TreeNode, VfsError> {
    nodes.get(&id).ok_or(VfsError::StaleHandle(id))
}

fn node_mut(
    nodes: &mut HashMap<NodeId, TreeNode>,
    id: NodeId,
) -> Result<&mut TreeNode, VfsError> {
    nodes.get_mut(&id).ok_or(VfsError::StaleHandle(id))
}

fn is_ancestor(nodes: &HashMap<NodeId, TreeNode>, ancestor: NodeId, of: NodeId) -> bool {
    let mut current = Some(of);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        current = nodes.get(&id).and_then(|n| n.parent);
    }
    false
}

impl IFileTree for MemoryFileTree {
    fn root(&self) -> NodeId {
        ROOT_NODE
    }

    fn is_valid(&self, node: NodeId) -> bool {
        self.nodes.read().contains_key(&node)
    }

    fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes.read().get(&parent)?.children.get(name).copied()
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .read()
            .get(&node)
            .map(|n| n.children.values().copied().collect())
            .unwrap_or_default()
    }

    fn create_node(&self, parent: NodeId, name: &str, is_directory: bool) -> Result<NodeId> {
        let mut nodes = self.nodes.write();
        let parent_node = node(&nodes, parent)?;
        if !parent_node.is_directory {
            return Err(VfsError::NotADirectory(parent).into());
        }
        if parent_node.children.contains_key(name) {
            return Err(VfsError::AlreadyExists {
                parent,
                name: name.to_string(),
            }
            .into());
        }

        let id = self.allocate();
        nodes.insert(id, TreeNode::new(name, Some(parent), is_directory));
        node_mut(&mut nodes, parent)?
            .children
            .insert(name.to_string(), id);
        trace!(node = %id, parent = %parent, name, is_directory, "Node created");
        Ok(id)
    }

    fn rename(&self, id: NodeId, new_name: &str) -> Result<()> {
        let mut nodes = self.nodes.write();
        let current = node(&nodes, id)?;
        let parent = current.parent.ok_or(VfsError::RootNode)?;
        let old_name = current.name.clone();
        if old_name == new_name {
            return Ok(());
        }
        let siblings = &node(&nodes, parent)?.children;
        if siblings.contains_key(new_name) {
            return Err(VfsError::AlreadyExists {
                parent,
                name: new_name.to_string(),
            }
            .into());
        }

        let parent_node = node_mut(&mut nodes, parent)?;
        parent_node.children.remove(&old_name);
        parent_node.children.insert(new_name.to_string(), id);
        node_mut(&mut nodes, id)?.name = new_name.to_string();
        trace!(node = %id, from = %old_name, to = new_name, "Node renamed");
        Ok(())
    }

    fn move_node(&self, id: NodeId, new_parent: NodeId) -> Result<()> {
        let mut nodes = self.nodes.write();
        let current = node(&nodes, id)?;
        let old_parent = current.parent.ok_or(VfsError::RootNode)?;
        let name = current.name.clone();
        if old_parent == new_parent {
            return Ok(());
        }
        let target = node(&nodes, new_parent)?;
        if !target.is_directory {
            return Err(VfsError::NotADirectory(new_parent).into());
        }
        if target.children.contains_key(&name) {
            return Err(VfsError::AlreadyExists {
                parent: new_parent,
                name,
            }
            .into());
        }
        if is_ancestor(&nodes, id, new_parent) {
            return Err(VfsError::InvalidMove {
                node: id,
                target: new_parent,
            }
            .into());
        }

        node_mut(&mut nodes, old_parent)?.children.remove(&name);
        node_mut(&mut nodes, new_parent)?
            .children
            .insert(name.clone(), id);
        node_mut(&mut nodes, id)?.parent = Some(new_parent);
        trace!(node = %id, from = %old_parent, to = %new_parent, "Node moved");
        Ok(())
    }

    fn delete(&self, id: NodeId) -> Result<()> {
        let mut nodes = self.nodes.write();
        let current = node(&nodes, id)?;
        let parent = current.parent.ok_or(VfsError::RootNode)?;
        let name = current.name.clone();
        node_mut(&mut nodes, parent)?.children.remove(&name);

        let mut pending = vec![id];
        let mut removed = 0usize;
        while let Some(next) = pending.pop() {
            if let Some(entry) = nodes.remove(&next) {
                pending.extend(entry.children.values().copied());
                removed += 1;
            }
        }
        trace!(node = %id, removed, "Subtree deleted");
        Ok(())
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.read().get(&id)?.parent
    }

    fn name(&self, id: NodeId) -> Option<String> {
        self.nodes.read().get(&id).map(|n| n.name.clone())
    }

    fn path(&self, id: NodeId) -> Option<String> {
        let nodes = self.nodes.read();
        let mut names = Vec::new();
        let mut current = nodes.get(&id)?;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            current = nodes.get(&parent)?;
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    fn is_directory(&self, id: NodeId) -> bool {
        self.nodes.read().get(&id).is_some_and(|n| n.is_directory)
    }

    fn set_directory(&self, id: NodeId, is_directory: bool) -> Result<()> {
        let mut nodes = self.nodes.write();
        let entry = node_mut(&mut nodes, id)?;
        if !is_directory && !entry.children.is_empty() {
            return Err(VfsError::IsADirectory(id).into());
        }
        entry.is_directory = is_directory;
        Ok(())
    }

    fn is_writable(&self, id: NodeId) -> bool {
        self.nodes.read().get(&id).is_some_and(|n| n.writable)
    }

    fn set_writable(&self, id: NodeId, writable: bool) -> Result<()> {
        node_mut(&mut self.nodes.write(), id)?.writable = writable;
        Ok(())
    }

    fn read_bytes(&self, id: NodeId) -> Result<Vec<u8>> {
        let nodes = self.nodes.read();
        let entry = node(&nodes, id)?;
        if entry.is_directory {
            return Err(VfsError::IsADirectory(id).into());
        }
        Ok(entry.content.clone())
    }

    fn write_bytes(&self, id: NodeId, bytes: &[u8]) -> Result<()> {
        let mut nodes = self.nodes.write();
        let entry = node_mut(&mut nodes, id)?;
        if entry.is_directory {
            return Err(VfsError::IsADirectory(id).into());
        }
        entry.content = bytes.to_vec();
        Ok(())
    }
}
