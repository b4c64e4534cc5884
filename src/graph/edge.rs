//! Edge identifier and the edge-spring record.
//!
//! Edges are springs between two node-particles. Each edge has:
//! - A stable identifier chosen by the event source
//! - Weight (multiplier of the ideal spring length)
//! - Ignored flag (kept in the graph, excluded from forces)
//!
//! Endpoints are not stored here: they are the endpoints of the spring's
//! slot in the topology graph.

use std::fmt;

/// Stable edge identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Create a new EdgeId.
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

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge({})", self.0)
    }
}

impl From<&str> for EdgeId {
    #[inline]
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for EdgeId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A spring pulling two node-particles toward their ideal separation.
#[derive(Debug, Clone)]
pub struct EdgeSpring {
    pub id: EdgeId,
    weight: f64,
    pub ignored: bool,
}

impl EdgeSpring {
    /// Weight used when none was set or the attribute was cleared.
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    pub fn new(id: EdgeId) -> Self {
        Self {
            id,
            weight: Self::DEFAULT_WEIGHT,
            ignored: false,
        }
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Set the rest-length multiplier. Non-positive values are rejected.
    pub fn set_weight(&mut self, weight: f64) -> bool {
        if weight > 0.0 && weight.is_finite() {
            self.weight = weight;
            true
        } else {
            tracing::warn!(edge = %self.id, weight, "ignoring non-positive edge weight");
            false
        }
    }

    /// Separation at which this spring is at rest.
    #[inline]
    pub fn ideal_length(&self, unit: f64) -> f64 {
        unit * self.weight
    }
}
