//! Update Scheduler
//!
//! The scheduler determines the order in which dirty nodes should be updated.
//! It ensures that dependencies are always updated before their dependents.
//!
//! # Algorithm
//!
//! We use a topological sort to process nodes in dependency order:
//!
//! 1. When a source node changes, its version is bumped and its direct
//!    dependents are marked "dirty"
//! 2. Propagate "maybe dirty" to their dependents, recursively
//! 3. Collect all maybe-dirty and dirty nodes
//! 4. Sort them topologically (dependencies before dependents)
//! 5. The runtime then processes each node in order:
//!    - For "maybe dirty" nodes: check if any input version actually moved
//!    - For "dirty" nodes: recompute
//!
//! This "push-pull" approach minimizes unnecessary recomputation.

use std::collections::{HashMap, HashSet, VecDeque};

use super::node::{DirtyState, Node, NodeId, NodeKind};

/// The update scheduler manages the dependency graph and coordinates updates.
#[derive(Debug)]
pub struct UpdateScheduler {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node.
    pub fn remove_node(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.remove(&node_id) {
            for dep_id in node.dependencies().keys() {
                if let Some(dep) = self.nodes.get_mut(dep_id) {
                    dep.remove_dependent(node_id);
                }
            }

            for dependent_id in node.dependents() {
                if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                    dependent.remove_dependency(node_id);
                }
            }
        }
    }

    /// Get a reference to a node.
    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable reference to a node.
    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Add a dependency edge: `dependent` depends on `dependency`, having
    /// observed version `observed` of it.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId, observed: u64) {
        if !self.nodes.contains_key(&dependency) || !self.nodes.contains_key(&dependent) {
            return;
        }
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency, observed);
        }
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.remove_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.remove_dependency(dependency);
        }
    }

    /// Replace every incoming edge of `dependent` with the given set.
    ///
    /// Called after a computation re-ran and collected a fresh dependency
    /// list.
    pub fn replace_dependencies<I>(&mut self, dependent: NodeId, dependencies: I)
    where
        I: IntoIterator<Item = (NodeId, u64)>,
    {
        let old: Vec<NodeId> = match self.nodes.get(&dependent) {
            Some(node) => node.dependencies().keys().copied().collect(),
            None => return,
        };
        for dependency in old {
            self.remove_edge(dependency, dependent);
        }
        for (dependency, observed) in dependencies {
            if dependency != dependent {
                self.add_edge(dependency, dependent, observed);
            }
        }
    }

    /// Mark a source node as changed and propagate dirty flags.
    ///
    /// Returns the set of node IDs that need to be processed, in
    /// topological order.
    pub fn mark_changed(&mut self, source_id: NodeId) -> Vec<NodeId> {
        let mut to_process = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        let direct: Vec<NodeId> = match self.nodes.get_mut(&source_id) {
            Some(source) => {
                source.bump_version();
                source.dependents().iter().copied().collect()
            }
            None => return to_process,
        };

        for dependent_id in &direct {
            if let Some(node) = self.nodes.get_mut(dependent_id) {
                node.mark_dirty();
            }
            queue.push_back(*dependent_id);
        }

        // BFS to propagate maybe-dirty status
        while let Some(node_id) = queue.pop_front() {
            if !visited.insert(node_id) {
                continue;
            }

            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.mark_maybe_dirty();
                to_process.push(node_id);

                for dependent_id in node.dependents() {
                    queue.push_back(*dependent_id);
                }
            }
        }

        // Sort topologically so dependencies are processed first
        self.topological_sort(to_process)
    }

    /// Perform a topological sort of the given nodes.
    ///
    /// Returns nodes in order such that dependencies come before dependents.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        // Calculate in-degrees (only counting edges within the node set)
        for &node_id in &nodes {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .keys()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(*dependent_id);
                        }
                    }
                }
            }
        }

        result
    }

    /// Kind of a node, if it is still in the graph.
    pub fn kind(&self, node_id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&node_id).map(Node::kind)
    }

    /// Dirty state of a node. Unknown nodes report clean.
    pub fn dirty_state(&self, node_id: NodeId) -> DirtyState {
        self.nodes
            .get(&node_id)
            .map(Node::dirty_state)
            .unwrap_or(DirtyState::Clean)
    }

    /// Mark a node clean after it has been brought up to date.
    pub fn mark_clean(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.mark_clean();
        }
    }

    /// Current version of a node. Unknown nodes report zero.
    pub fn version(&self, node_id: NodeId) -> u64 {
        self.nodes.get(&node_id).map(Node::version).unwrap_or(0)
    }

    /// Bump the version of a node whose value changed during recomputation.
    pub fn bump_version(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.bump_version();
        }
    }

    /// Dependencies of a node together with the version it last observed.
    pub fn observed_dependencies(&self, node_id: NodeId) -> Vec<(NodeId, u64)> {
        self.nodes
            .get(&node_id)
            .map(|node| {
                node.dependencies()
                    .iter()
                    .map(|(id, version)| (*id, *version))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Dependencies whose current version differs from the one `node_id`
    /// observed.
    pub fn stale(&self, node_id: NodeId) -> Vec<NodeId> {
        self.observed_dependencies(node_id)
            .into_iter()
            .filter(|(id, seen)| self.version(*id) != *seen)
            .map(|(id, _)| id)
            .collect()
    }

    /// Check whether a node is registered.
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}
