//! Graph data structures and operations.
//!
//! This module provides the topology of the laid-out graph using petgraph's
//! StableGraph for stable node/edge handles. Particles and springs live in
//! the graph's arenas; adjacency is the graph's own edge lists.

mod edge;
mod engine;
mod node;

pub use edge::{EdgeId, EdgeSpring};
pub use engine::{EdgeInsert, GraphEngine, SpringRef};
pub use node::{NodeId, NodeParticle};
