//! Node identifier and the node-particle record.
//!
//! Every node of the laid-out graph is simulated as a point mass:
//! - A stable identifier chosen by the event source
//! - Position in layout space (z stays 0 in 2D)
//! - Displacement accumulated during the current step
//! - Weight (repulsion strength multiplier)
//! - Frozen flag (accumulates force but never moves)

use std::fmt;

use glam::DVec3;

/// Stable node identifier.
///
/// Identifiers are owned by the graph-mutation source; the engine only
/// looks them up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new NodeId.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl From<&str> for NodeId {
    #[inline]
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for NodeId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A simulated point mass standing for one graph node.
#[derive(Debug, Clone)]
pub struct NodeParticle {
    pub id: NodeId,
    pub position: DVec3,
    /// Displacement accumulated for the step in progress.
    pub displacement: DVec3,
    weight: f64,
    pub frozen: bool,
}

impl NodeParticle {
    /// Weight used when none was set or the attribute was cleared.
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    pub fn new(id: NodeId, position: DVec3) -> Self {
        Self {
            id,
            position,
            displacement: DVec3::ZERO,
            weight: Self::DEFAULT_WEIGHT,
            frozen: false,
        }
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Set the repulsion weight.
    ///
    /// Weights must stay strictly positive; anything else is rejected and
    /// the previous weight kept. Returns whether the weight changed.
    pub fn set_weight(&mut self, weight: f64) -> bool {
        if weight > 0.0 && weight.is_finite() {
            self.weight = weight;
            true
        } else {
            tracing::warn!(node = %self.id, weight, "ignoring non-positive node weight");
            false
        }
    }
}
