//! SpringBox Layout - WASM Module
//!
//! An incremental force-directed layout for dynamic graphs. Nodes repel
//! each other, edges act as springs, and the layout reports how stable it
//! has become so callers know when to stop stepping. It is compiled to
//! WebAssembly and exposes a JavaScript-friendly API via wasm-bindgen, and
//! is equally usable as a plain Rust library.
//!
//! # Architecture
//!
//! - `graph`: node-particles and edge-springs in petgraph's StableGraph
//! - `spatial`: Barnes-Hut quadtree/octree for approximate repulsion
//! - `layout`: the SpringBox engine, its settings, events and statistics

use js_sys::Float64Array;
use wasm_bindgen::prelude::*;

pub mod error;
pub mod graph;
pub mod layout;
pub mod spatial;

pub use error::{Error, Result};
pub use graph::{EdgeId, NodeId};
pub use layout::{AttributeTarget, AttributeValue, GraphEvent, Quality, SimulationConfig, SpringBox};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Decode an attribute value sent by JavaScript. `null` and `undefined`
/// mean the attribute was removed.
fn decode_attribute(name: &str, value: JsValue) -> Result<Option<AttributeValue>> {
    serde_wasm_bindgen::from_value(value).map_err(|err| Error::Attribute {
        name: name.to_owned(),
        reason: err.to_string(),
    })
}

fn to_js_error(err: Error) -> JsError {
    JsError::new(&err.to_string())
}

/// Main entry point for the layout.
///
/// This struct wraps the internal SpringBox and provides the public API
/// exposed to JavaScript.
#[wasm_bindgen]
pub struct SpringBoxWasm {
    layout: SpringBox,
}

#[wasm_bindgen]
impl SpringBoxWasm {
    /// Create a 2D layout with default settings.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            layout: SpringBox::default(),
        }
    }

    /// Create a 3D layout with default settings.
    #[wasm_bindgen(js_name = new3d)]
    pub fn new_3d() -> Self {
        Self {
            layout: SpringBox::new(SimulationConfig::three_d()),
        }
    }

    /// Create a layout from a settings object. Missing fields take their
    /// defaults.
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config: JsValue) -> std::result::Result<SpringBoxWasm, JsError> {
        let config: SimulationConfig =
            serde_wasm_bindgen::from_value(config).map_err(|err| JsError::new(&err.to_string()))?;
        Ok(Self {
            layout: SpringBox::new(config),
        })
    }

    #[wasm_bindgen(js_name = layoutAlgorithmName)]
    pub fn layout_algorithm_name(&self) -> String {
        self.layout.layout_algorithm_name().to_owned()
    }

    // =========================================================================
    // Graph Mutations
    // =========================================================================

    /// Add a node at a random position near the origin.
    ///
    /// Returns false if the id is already used.
    #[wasm_bindgen(js_name = addNode)]
    pub fn add_node(&mut self, id: &str) -> bool {
        self.layout.add_node(id)
    }

    #[wasm_bindgen(js_name = removeNode)]
    pub fn remove_node(&mut self, id: &str) -> bool {
        self.layout.remove_node(&NodeId::from(id))
    }

    /// Add a spring between two existing nodes.
    ///
    /// Returns false, without adding anything, if an endpoint is unknown.
    #[wasm_bindgen(js_name = addEdge)]
    pub fn add_edge(&mut self, id: &str, from: &str, to: &str) -> bool {
        self.layout.add_edge(id, from, to)
    }

    #[wasm_bindgen(js_name = removeEdge)]
    pub fn remove_edge(&mut self, id: &str) -> bool {
        self.layout.remove_edge(&EdgeId::from(id))
    }

    /// Clear all nodes and edges.
    pub fn clear(&mut self) {
        self.layout.clear();
    }

    /// Displace a node and restart stabilization.
    #[wasm_bindgen(js_name = moveNode)]
    pub fn move_node(&mut self, id: &str, dx: f64, dy: f64, dz: f64) -> bool {
        self.layout.move_node(&NodeId::from(id), dx, dy, dz)
    }

    #[wasm_bindgen(js_name = setNodePosition)]
    pub fn set_node_position(&mut self, id: &str, x: f64, y: f64, z: f64) -> bool {
        self.layout
            .set_node_position(&NodeId::from(id), glam::DVec3::new(x, y, z))
    }

    /// Pin a node in place, or release it.
    #[wasm_bindgen(js_name = freezeNode)]
    pub fn freeze_node(&mut self, id: &str, frozen: bool) -> bool {
        self.layout.freeze_node(&NodeId::from(id), frozen)
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Set or, with `null`, remove a graph attribute such as `layout.force`.
    #[wasm_bindgen(js_name = setGraphAttribute)]
    pub fn set_graph_attribute(&mut self, name: &str, value: JsValue) -> std::result::Result<(), JsError> {
        self.set_attribute(AttributeTarget::Graph, name, value)
    }

    /// Set or, with `null`, remove a node attribute such as `layout.weight`.
    #[wasm_bindgen(js_name = setNodeAttribute)]
    pub fn set_node_attribute(&mut self, id: &str, name: &str, value: JsValue) -> std::result::Result<(), JsError> {
        self.set_attribute(AttributeTarget::Node(NodeId::from(id)), name, value)
    }

    /// Set or, with `null`, remove an edge attribute such as `layout.ignored`.
    #[wasm_bindgen(js_name = setEdgeAttribute)]
    pub fn set_edge_attribute(&mut self, id: &str, name: &str, value: JsValue) -> std::result::Result<(), JsError> {
        self.set_attribute(AttributeTarget::Edge(EdgeId::from(id)), name, value)
    }

    fn set_attribute(
        &mut self,
        target: AttributeTarget,
        name: &str,
        value: JsValue,
    ) -> std::result::Result<(), JsError> {
        match decode_attribute(name, value).map_err(to_js_error)? {
            Some(value) => self.layout.attribute_added(target, name, value),
            None => self.layout.attribute_removed(target, name),
        }
        Ok(())
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    /// Run one simulation step.
    pub fn compute(&mut self) {
        self.layout.compute();
    }

    /// Run up to `max_steps` steps, stopping early once stable.
    ///
    /// Returns the number of steps run.
    #[wasm_bindgen(js_name = computeUntilStable)]
    pub fn compute_until_stable(&mut self, max_steps: u32) -> u32 {
        let mut steps = 0;
        while steps < max_steps && !self.layout.is_stable() {
            self.layout.compute();
            steps += 1;
        }
        steps
    }

    /// Restart stabilization without changing the graph.
    pub fn shake(&mut self) {
        self.layout.shake();
    }

    #[wasm_bindgen(js_name = getStabilization)]
    pub fn stabilization(&self) -> f64 {
        self.layout.stabilization()
    }

    #[wasm_bindgen(js_name = getStabilizationLimit)]
    pub fn stabilization_limit(&self) -> f64 {
        self.layout.stabilization_limit()
    }

    #[wasm_bindgen(js_name = setStabilizationLimit)]
    pub fn set_stabilization_limit(&mut self, value: f64) {
        self.layout.set_stabilization_limit(value);
    }

    #[wasm_bindgen(js_name = isStable)]
    pub fn is_stable(&self) -> bool {
        self.layout.is_stable()
    }

    #[wasm_bindgen(js_name = getSteps)]
    pub fn steps(&self) -> f64 {
        self.layout.steps() as f64
    }

    #[wasm_bindgen(js_name = getNodeMovedCount)]
    pub fn node_moved_count(&self) -> u32 {
        self.layout.node_moved_count() as u32
    }

    // =========================================================================
    // Settings
    // =========================================================================

    #[wasm_bindgen(js_name = getForce)]
    pub fn force(&self) -> f64 {
        self.layout.force()
    }

    #[wasm_bindgen(js_name = setForce)]
    pub fn set_force(&mut self, value: f64) {
        self.layout.set_force(value);
    }

    #[wasm_bindgen(js_name = getQuality)]
    pub fn quality(&self) -> u8 {
        self.layout.quality().level()
    }

    /// Select a quality level from 0 (fastest) to 4 (exact).
    #[wasm_bindgen(js_name = setQuality)]
    pub fn set_quality(&mut self, level: i32) -> std::result::Result<(), JsError> {
        self.layout.set_quality(level.into()).map_err(to_js_error)
    }

    // =========================================================================
    // Positions
    // =========================================================================

    /// Returns [x, y, z] of the lowest bounding-box corner.
    #[wasm_bindgen(js_name = getLowPoint)]
    pub fn low_point(&self) -> Vec<f64> {
        self.layout.low_point().to_array().to_vec()
    }

    /// Returns [x, y, z] of the highest bounding-box corner.
    #[wasm_bindgen(js_name = getHiPoint)]
    pub fn hi_point(&self) -> Vec<f64> {
        self.layout.hi_point().to_array().to_vec()
    }

    /// Returns [x, y, z], or None for an unknown node.
    #[wasm_bindgen(js_name = getNodePosition)]
    pub fn node_position(&self, id: &str) -> Option<Vec<f64>> {
        self.layout
            .node_position(&NodeId::from(id))
            .map(|p| p.to_array().to_vec())
    }

    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> u32 {
        self.layout.node_count() as u32
    }

    #[wasm_bindgen(js_name = edgeCount)]
    pub fn edge_count(&self) -> u32 {
        self.layout.edge_count() as u32
    }

    /// Node ids, in the order used by `getPositions`.
    #[wasm_bindgen(js_name = getNodeIds)]
    pub fn node_ids(&self) -> Vec<String> {
        self.layout.positions().map(|(id, _)| id.as_str().to_owned()).collect()
    }

    /// All positions as [x0, y0, z0, x1, y1, z1, ...] in `getNodeIds` order.
    #[wasm_bindgen(js_name = getPositions)]
    pub fn positions(&self) -> Float64Array {
        Float64Array::from(&self.flat_positions()[..])
    }
}

impl SpringBoxWasm {
    fn flat_positions(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.layout.node_count() * 3);
        for (_, p) in self.layout.positions() {
            flat.extend_from_slice(&p.to_array());
        }
        flat
    }
}

impl Default for SpringBoxWasm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Drive the exported API the way a page would, without JS types.
    #[test]
    fn test_wasm_facade_pipeline() {
        let mut wasm = SpringBoxWasm::new();
        assert_eq!(wasm.layout_algorithm_name(), "SpringBox");

        for id in ["a", "b", "c", "d"] {
            assert!(wasm.add_node(id));
        }
        assert!(wasm.add_edge("ab", "a", "b"));
        assert!(wasm.add_edge("bc", "b", "c"));
        assert!(!wasm.add_edge("dx", "d", "missing"));
        assert_eq!(wasm.edge_count(), 2);

        for _ in 0..10 {
            wasm.compute();
        }
        assert_eq!(wasm.steps(), 10.0);

        let flat = wasm.flat_positions();
        assert_eq!(flat.len(), 4 * 3);
        assert!(flat.iter().all(|v| v.is_finite()));
        assert_eq!(wasm.node_ids().len(), 4);

        let lo = wasm.low_point();
        let hi = wasm.hi_point();
        for p in flat.chunks(3) {
            assert!(p[0] >= lo[0] && p[0] <= hi[0]);
            assert!(p[1] >= lo[1] && p[1] <= hi[1]);
            assert_eq!(p[2], 0.0);
        }
    }

    #[test]
    fn test_wasm_facade_settings() {
        let mut wasm = SpringBoxWasm::new();
        assert_eq!(wasm.quality(), 1);
        assert!(wasm.set_quality(3).is_ok());
        assert_eq!(wasm.quality(), 3);

        wasm.set_force(5.0);
        assert_eq!(wasm.force(), 1.0);

        assert!(wasm.node_position("ghost").is_none());
        wasm.add_node("a");
        assert!(wasm.set_node_position("a", 1.0, 2.0, 3.0));
        assert_eq!(wasm.node_position("a"), Some(vec![1.0, 2.0, 0.0]));
    }

    #[test]
    fn test_compute_until_stable_stops() {
        let mut wasm = SpringBoxWasm::new();
        wasm.add_node("a");
        wasm.add_node("b");
        wasm.add_edge("ab", "a", "b");
        wasm.set_stabilization_limit(0.5);

        let steps = wasm.compute_until_stable(2000);
        assert!(steps >= 256);
        assert!(steps < 2000);
        assert!(wasm.is_stable());
    }

    #[test]
    fn test_three_d_facade() {
        let mut wasm = SpringBoxWasm::new_3d();
        wasm.add_node("a");
        assert!(wasm.set_node_position("a", 1.0, 2.0, 3.0));
        assert_eq!(wasm.node_position("a"), Some(vec![1.0, 2.0, 3.0]));
    }
}
