//! GraphEngine - topology store for the layout.
//!
//! The GraphEngine keeps node-particles and edge-springs in petgraph's
//! StableGraph, whose indices act as stable arena handles. The external
//! string identifiers map to those handles, and a node's incident edges are
//! simply its adjacency in the graph, so no particle ever holds a reference
//! to a spring or the other way around.

use std::collections::HashMap;

use glam::DVec3;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use super::edge::{EdgeId, EdgeSpring};
use super::node::{NodeId, NodeParticle};

/// A spring as seen during force accumulation.
#[derive(Debug, Clone, Copy)]
pub struct SpringRef<'a> {
    pub a: NodeIndex,
    pub b: NodeIndex,
    pub spring: &'a EdgeSpring,
}

/// Outcome of an edge insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    /// A new spring was registered on both endpoints.
    Added(EdgeIndex),
    /// A spring with the same id existed; it was removed from its former
    /// endpoints before the new one was registered.
    Replaced(EdgeIndex),
    /// One or both endpoints are unknown; nothing was created.
    MissingEndpoint,
}

/// The topology store.
///
/// This struct manages:
/// - Particles and springs via petgraph
/// - ID mapping between external identifiers and internal indices
pub struct GraphEngine {
    /// The underlying graph. Undirected: a spring pulls both ends alike.
    graph: StableUnGraph<NodeParticle, EdgeSpring>,

    /// Map from NodeId to petgraph NodeIndex
    node_id_to_index: HashMap<NodeId, NodeIndex>,

    /// Map from EdgeId to petgraph EdgeIndex
    edge_id_to_index: HashMap<EdgeId, EdgeIndex>,
}

impl GraphEngine {
    /// Create a new empty graph engine.
    pub fn new() -> Self {
        Self {
            graph: StableUnGraph::default(),
            node_id_to_index: HashMap::new(),
            edge_id_to_index: HashMap::new(),
        }
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Add a node-particle at the given position.
    ///
    /// Returns None if a node with this id is already live.
    pub fn add_node(&mut self, id: NodeId, position: DVec3) -> Option<NodeIndex> {
        if self.node_id_to_index.contains_key(&id) {
            tracing::warn!(node = %id, "node already exists, ignoring");
            return None;
        }

        let index = self.graph.add_node(NodeParticle::new(id.clone(), position));
        self.node_id_to_index.insert(id, index);
        Some(index)
    }

    /// Remove a node and every spring incident to it.
    ///
    /// Returns the removed particle's former handle and record, and the ids
    /// of the springs that went with it.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<(NodeIndex, NodeParticle, Vec<EdgeId>)> {
        let index = self.node_id_to_index.remove(id)?;

        let incident: Vec<EdgeIndex> = self.graph.edges(index).map(|e| e.id()).collect();
        let mut removed = Vec::with_capacity(incident.len());
        for edge_index in incident {
            if let Some(spring) = self.graph.remove_edge(edge_index) {
                self.edge_id_to_index.remove(&spring.id);
                removed.push(spring.id);
            }
        }

        let particle = self.graph.remove_node(index)?;
        Some((index, particle, removed))
    }

    /// Get the number of node-particles.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Resolve a node id to its handle.
    pub fn node_index(&self, id: &NodeId) -> Option<NodeIndex> {
        self.node_id_to_index.get(id).copied()
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeParticle> {
        self.node_index(id).and_then(|index| self.graph.node_weight(index))
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut NodeParticle> {
        let index = self.node_index(id)?;
        self.graph.node_weight_mut(index)
    }

    pub fn particle(&self, index: NodeIndex) -> Option<&NodeParticle> {
        self.graph.node_weight(index)
    }

    pub fn particle_mut(&mut self, index: NodeIndex) -> Option<&mut NodeParticle> {
        self.graph.node_weight_mut(index)
    }

    /// Handles of every live particle.
    pub fn node_indices(&self) -> Vec<NodeIndex> {
        self.graph.node_indices().collect()
    }

    /// Iterate live particles with their handles.
    pub fn particles(&self) -> impl Iterator<Item = (NodeIndex, &NodeParticle)> + '_ {
        self.graph.node_indices().map(move |index| (index, &self.graph[index]))
    }

    /// Number of springs registered on a particle.
    pub fn degree(&self, index: NodeIndex) -> usize {
        self.graph.edges(index).count()
    }

    /// Ids of the springs registered on a node.
    pub fn incident_edges(&self, id: &NodeId) -> Vec<EdgeId> {
        self.node_index(id)
            .map(|index| {
                self.graph
                    .edges(index)
                    .map(|e| e.weight().id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    // =========================================================================
    // Edge Operations
    // =========================================================================

    /// Add a spring between two nodes.
    ///
    /// Both endpoints must be live. Reusing the id of a live spring removes
    /// that spring from its former endpoints first.
    pub fn add_edge(&mut self, id: EdgeId, from: &NodeId, to: &NodeId) -> EdgeInsert {
        let (Some(a), Some(b)) = (self.node_index(from), self.node_index(to)) else {
            return EdgeInsert::MissingEndpoint;
        };

        let replaced = match self.edge_id_to_index.remove(&id) {
            Some(old) => {
                self.graph.remove_edge(old);
                true
            }
            None => false,
        };

        let index = self.graph.add_edge(a, b, EdgeSpring::new(id.clone()));
        self.edge_id_to_index.insert(id, index);

        if replaced {
            EdgeInsert::Replaced(index)
        } else {
            EdgeInsert::Added(index)
        }
    }

    /// Remove a spring, deregistering it from both endpoints.
    pub fn remove_edge(&mut self, id: &EdgeId) -> bool {
        match self.edge_id_to_index.remove(id) {
            Some(index) => self.graph.remove_edge(index).is_some(),
            None => false,
        }
    }

    /// Get the number of springs.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&EdgeSpring> {
        let index = self.edge_id_to_index.get(id)?;
        self.graph.edge_weight(*index)
    }

    pub fn edge_mut(&mut self, id: &EdgeId) -> Option<&mut EdgeSpring> {
        let index = *self.edge_id_to_index.get(id)?;
        self.graph.edge_weight_mut(index)
    }

    /// Iterate every spring with its endpoints.
    pub fn springs(&self) -> impl Iterator<Item = SpringRef<'_>> + '_ {
        self.graph.edge_references().map(|e| SpringRef {
            a: e.source(),
            b: e.target(),
            spring: e.weight(),
        })
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Axis-aligned bounding box of all particle positions.
    pub fn get_bounds(&self) -> Option<(DVec3, DVec3)> {
        let mut positions = self.graph.node_indices().map(|i| self.graph[i].position);
        let first = positions.next()?;
        Some(positions.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    /// Drop all particles and springs.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.node_id_to_index.clear();
        self.edge_id_to_index.clear();
    }
}

impl Default for GraphEngine {
    fn default() -> Self {
        Self::new()
    }
}
