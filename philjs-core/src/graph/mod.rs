//! Dependency Graph
//!
//! This module implements the computational dependency graph that tracks
//! relationships between reactive values and computations.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent reactive values (signals) or computations (memos, effects)
//! - Edges represent dependencies: if A depends on B, there is an edge from B to A
//!
//! When a signal changes, we traverse the graph to find all affected nodes
//! and mark them as dirty. The reactive runtime then determines which dirty
//! nodes actually need to recompute.
//!
//! Every edge remembers the version of the dependency that the dependent saw
//! on its last run. Comparing it with the dependency's current version is how
//! a "maybe dirty" node decides whether it really has to re-run.

mod node;
mod scheduler;

pub use node::{DirtyState, Node, NodeId, NodeKind};
pub use scheduler::UpdateScheduler;
