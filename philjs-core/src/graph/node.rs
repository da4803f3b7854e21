//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

/// Unique identifier for a node in the dependency graph.
///
/// Signals, memos, effects and signal listeners all get one. Two handles
/// refer to the same reactive value exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source node (signal). These are the roots of the graph.
    /// They have no dependencies, only dependents.
    Source,

    /// A derived node (memo). These have dependencies and may have dependents.
    /// They cache their computed value.
    Derived,

    /// An effect node. These are leaves of the graph.
    /// They have dependencies but no dependents (they produce side effects, not values).
    Effect,
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The node's value is up-to-date.
    Clean,

    /// The node might need to recompute. One of its dependencies changed,
    /// but we have not yet verified if the actual input values are different.
    MaybeDirty,

    /// The node definitely needs to recompute. Its inputs have changed.
    Dirty,
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    /// Unique identifier for this node.
    id: NodeId,

    /// What kind of node this is.
    kind: NodeKind,

    /// Current dirty state.
    dirty: DirtyState,

    /// Bumped every time the node's observable value changes.
    version: u64,

    /// Nodes that this node depends on, with the version observed at the
    /// last run.
    dependencies: HashMap<NodeId, u64>,

    /// Nodes that depend on this node, in subscription order.
    dependents: IndexSet<NodeId>,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self::with_id(NodeId::new(), kind)
    }

    /// Create a node for an id allocated elsewhere.
    pub fn with_id(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            dirty: match kind {
                NodeKind::Source => DirtyState::Clean,
                NodeKind::Derived => DirtyState::Dirty, // Start dirty to ensure first computation
                NodeKind::Effect => DirtyState::Dirty,
            },
            version: 0,
            dependencies: HashMap::new(),
            dependents: IndexSet::new(),
        }
    }

    /// Create a new source (signal) node.
    pub fn source() -> Self {
        Self::new(NodeKind::Source)
    }

    /// Create a new derived (memo) node.
    pub fn derived() -> Self {
        Self::new(NodeKind::Derived)
    }

    /// Create a new effect node.
    pub fn effect() -> Self {
        Self::new(NodeKind::Effect)
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Get the current dirty state.
    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    /// Check if the node needs any processing.
    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    /// Mark the node as clean.
    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    /// Mark the node as maybe dirty. Never downgrades a dirty node.
    pub fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    /// Mark the node as definitely dirty.
    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    /// Current version of the node's value.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Record that the node's value changed.
    pub fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// Get the dependencies of this node with their observed versions.
    pub fn dependencies(&self) -> &HashMap<NodeId, u64> {
        &self.dependencies
    }

    /// Get the dependents of this node.
    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    /// Add a dependency, remembering the version that was read.
    pub fn add_dependency(&mut self, node_id: NodeId, observed: u64) {
        self.dependencies.insert(node_id, observed);
    }

    /// Remove a dependency.
    pub fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.remove(&node_id);
    }

    /// Add a dependent.
    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    /// Remove a dependent.
    pub fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }
}
