//! Attributes service: remote descriptors ↔ virtual file handles.
//!
//! Keeps a bidirectional mapping between descriptor uniqueness keys and
//! tree handles, materializes descriptors as tree nodes by walking their path
//! chains, and moves/renames nodes when a descriptor's identity-affecting
//! fields change.
//!
//! ## Locking
//!
//! One `parking_lot::RwLock` guards both maps. Lookups take the read lock;
//! `get_or_create`, `update` and `clear` hold the write lock for their whole
//! lookup-mutate sequence, including the tree mutations it implies. No
//! remote call ever happens under this lock. Events are published after the
//! lock is released.

use std::collections::HashMap;
use std::sync::Arc;

use mfsync_core::domain::{DescriptorKey, NodeId, PathAnchor, PathChain, RemoteDescriptor};
use mfsync_core::events::{AttributesEvent, EventBus};
use mfsync_core::ports::IFileTree;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::VfsError;

/// Result type for attributes operations
pub type Result<T> = std::result::Result<T, VfsError>;

#[derive(Default)]
struct AttributeMaps {
    by_key: HashMap<DescriptorKey, NodeId>,
    by_handle: HashMap<NodeId, RemoteDescriptor>,
}

impl AttributeMaps {
    fn insert(&mut self, handle: NodeId, descriptor: RemoteDescriptor) {
        self.by_key.insert(descriptor.unique_key(), handle);
        self.by_handle.insert(handle, descriptor);
    }

    fn remove(&mut self, handle: NodeId) -> Option<RemoteDescriptor> {
        let descriptor = self.by_handle.remove(&handle)?;
        let key = descriptor.unique_key();
        if self.by_key.get(&key) == Some(&handle) {
            self.by_key.remove(&key);
        }
        Some(descriptor)
    }
}

/// Bidirectional descriptor/handle registry over one file tree
pub struct AttributesService {
    tree: Arc<dyn IFileTree>,
    events: EventBus,
    maps: RwLock<AttributeMaps>,
}

impl AttributesService {
    pub fn new(tree: Arc<dyn IFileTree>, events: EventBus) -> Self {
        Self {
            tree,
            events,
            maps: RwLock::new(AttributeMaps::default()),
        }
    }

    /// The tree this service materializes into
    pub fn tree(&self) -> &Arc<dyn IFileTree> {
        &self.tree
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Looks up the handle of a descriptor by its uniqueness key
    pub fn get(&self, descriptor: &RemoteDescriptor) -> Option<NodeId> {
        self.get_by_key(&descriptor.unique_key())
    }

    pub fn get_by_key(&self, key: &DescriptorKey) -> Option<NodeId> {
        let handle = *self.maps.read().by_key.get(key)?;
        self.tree.is_valid(handle).then_some(handle)
    }

    /// Reverse lookup: the descriptor currently attached to `handle`
    pub fn get_attributes(&self, handle: NodeId) -> Option<RemoteDescriptor> {
        self.maps.read().by_handle.get(&handle).cloned()
    }

    /// Whether `handle` is registered and its node still exists
    pub fn is_valid(&self, handle: NodeId) -> bool {
        self.maps.read().by_handle.contains_key(&handle) && self.tree.is_valid(handle)
    }

    /// All registered handles
    pub fn handles(&self) -> Vec<NodeId> {
        self.maps.read().by_handle.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.maps.read().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.read().by_handle.is_empty()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Returns the handle for `descriptor`, creating or updating it
    ///
    /// A registered, valid handle gets the merged descriptor (new fields win,
    /// requesters unioned) and is moved/renamed if its path changed;
    /// otherwise the descriptor's path chain is materialized. Emits exactly
    /// one `Created` or `Updated` event.
    pub fn get_or_create(&self, descriptor: RemoteDescriptor) -> Result<NodeId> {
        let key = descriptor.unique_key();
        let mut maps = self.maps.write();

        let existing = maps
            .by_key
            .get(&key)
            .copied()
            .filter(|handle| self.tree.is_valid(*handle));

        let (handle, event) = match existing {
            Some(handle) => {
                let old = maps
                    .by_handle
                    .get(&handle)
                    .cloned()
                    .ok_or(VfsError::NotRegistered(handle))?;
                let merged = old.merge(&descriptor)?;
                self.reassign(handle, &old, &merged)?;
                maps.insert(handle, merged.clone());
                trace!(handle = %handle, key = %key, "Descriptor merged");
                (
                    handle,
                    AttributesEvent::Updated {
                        handle,
                        old,
                        new: merged,
                    },
                )
            }
            None => {
                if let Some(stale) = maps.by_key.get(&key).copied() {
                    debug!(handle = %stale, key = %key, "Dropping mapping of deleted node");
                    maps.remove(stale);
                }
                let handle = self.materialize(&descriptor, &maps)?;
                maps.insert(handle, descriptor.clone());
                debug!(handle = %handle, key = %key, "Descriptor registered");
                (handle, AttributesEvent::Created { handle, descriptor })
            }
        };

        drop(maps);
        self.events.publish_attributes(event);
        Ok(handle)
    }

    /// Replaces the descriptor of `handle` without a fresh fetch
    ///
    /// Renames/moves the node when name, parent, volume or path changed and
    /// emits `Updated`.
    ///
    /// # Errors
    ///
    /// `NotRegistered` if the handle has no descriptor, `StaleHandle` if its
    /// node was deleted out of band.
    pub fn update(&self, handle: NodeId, descriptor: RemoteDescriptor) -> Result<()> {
        let mut maps = self.maps.write();
        let old = maps
            .by_handle
            .get(&handle)
            .cloned()
            .ok_or(VfsError::NotRegistered(handle))?;
        if !self.tree.is_valid(handle) {
            return Err(VfsError::StaleHandle(handle));
        }

        self.reassign(handle, &old, &descriptor)?;
        maps.remove(handle);
        maps.insert(handle, descriptor.clone());
        trace!(handle = %handle, "Descriptor updated");

        drop(maps);
        self.events.publish_attributes(AttributesEvent::Updated {
            handle,
            old,
            new: descriptor,
        });
        Ok(())
    }

    /// Unregisters `handle` and deletes its node
    ///
    /// Registered descriptors below the node are unregistered as well; every
    /// removed descriptor gets its own `Deleted` event, descendants first.
    /// A node that is already gone from the tree is only unregistered.
    pub fn clear(&self, handle: NodeId) -> Result<()> {
        let mut maps = self.maps.write();
        if !maps.by_handle.contains_key(&handle) {
            return Err(VfsError::NotRegistered(handle));
        }

        let mut removed = Vec::new();
        if self.tree.is_valid(handle) {
            for descendant in self.descendants(handle) {
                if let Some(descriptor) = maps.remove(descendant) {
                    removed.push((descendant, descriptor));
                }
            }
            self.tree.delete(handle)?;
        }
        if let Some(descriptor) = maps.remove(handle) {
            removed.push((handle, descriptor));
        }
        debug!(handle = %handle, removed = removed.len(), "Handle cleared");

        drop(maps);
        for (handle, descriptor) in removed {
            self.events
                .publish_attributes(AttributesEvent::Deleted { handle, descriptor });
        }
        Ok(())
    }

    // ========================================================================
    // Path handling
    // ========================================================================

    /// All nodes strictly below `handle`, deepest first
    fn descendants(&self, handle: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut pending = self.tree.children(handle);
        while let Some(next) = pending.pop() {
            pending.extend(self.tree.children(next));
            order.push(next);
        }
        order.reverse();
        order
    }

    /// Walks the parent segments of `chain`, creating missing folders
    fn ensure_parents(&self, chain: &PathChain) -> Result<NodeId> {
        let mut current = match chain.anchor {
            PathAnchor::Root => self.tree.root(),
            PathAnchor::Node(anchor) => {
                if !self.tree.is_valid(anchor) {
                    return Err(VfsError::StaleHandle(anchor));
                }
                anchor
            }
        };
        for segment in chain.parent_segments() {
            current = match self.tree.find_child(current, segment.name.as_str()) {
                Some(child) if self.tree.is_directory(child) => child,
                Some(child) => return Err(VfsError::NotADirectory(child)),
                None => self
                    .tree
                    .create_node(current, segment.name.as_str(), true)?,
            };
        }
        Ok(current)
    }

    /// Creates (or adopts) the node of a descriptor that has no mapping
    ///
    /// A node already sitting at the target position is adopted when no
    /// other descriptor owns it, e.g. a folder created earlier as an
    /// intermediate segment of a deeper path.
    fn materialize(&self, descriptor: &RemoteDescriptor, maps: &AttributeMaps) -> Result<NodeId> {
        let chain = descriptor.path_chain()?;
        let leaf = match chain.leaf() {
            Some(leaf) => leaf,
            None => return self.ensure_parents(&chain),
        };
        let parent = self.ensure_parents(&chain)?;

        let handle = match self.tree.find_child(parent, leaf.name.as_str()) {
            Some(existing) if !maps.by_handle.contains_key(&existing) => {
                if self.tree.is_directory(existing) != leaf.is_directory {
                    self.tree.set_directory(existing, leaf.is_directory)?;
                }
                existing
            }
            Some(_) => {
                return Err(VfsError::AlreadyExists {
                    parent,
                    name: leaf.name.as_str().to_string(),
                })
            }
            None => self
                .tree
                .create_node(parent, leaf.name.as_str(), leaf.is_directory)?,
        };
        self.tree.set_writable(handle, descriptor.is_writable())?;
        Ok(handle)
    }

    /// Brings the node of `handle` in line with `new`
    fn reassign(&self, handle: NodeId, old: &RemoteDescriptor, new: &RemoteDescriptor) -> Result<()> {
        let old_chain = old.path_chain()?;
        let new_chain = new.path_chain()?;

        if new_chain.parent_differs(&old_chain) {
            let parent = self.ensure_parents(&new_chain)?;
            if self.tree.parent(handle) != Some(parent) {
                debug!(
                    handle = %handle,
                    to = %new_chain.display_path(),
                    "Moving node to new parent"
                );
                self.tree.move_node(handle, parent)?;
            }
        }

        if let Some(leaf) = new_chain.leaf() {
            if self.tree.name(handle).as_deref() != Some(leaf.name.as_str()) {
                debug!(handle = %handle, name = %leaf.name.as_str(), "Renaming node");
                self.tree.rename(handle, leaf.name.as_str())?;
            }
            if self.tree.is_directory(handle) != leaf.is_directory {
                self.tree.set_directory(handle, leaf.is_directory)?;
            }
        }

        self.tree.set_writable(handle, new.is_writable())?;
        Ok(())
    }
}
