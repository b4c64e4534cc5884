//! SpringBox - incremental spring-box force layout.
//!
//! Nodes repel each other like charged particles and edges pull their
//! endpoints toward an ideal separation like springs. Each call to
//! [`SpringBox::compute`] advances the simulation by one step:
//!
//! 1. Take the diagonal of the previous bounding box as the step's area.
//! 2. Reset displacements and step statistics.
//! 3. Accumulate repulsion for every non-frozen particle from the n-tree:
//!    exact inside the view zone, through cell barycenters beyond it.
//! 4. Accumulate spring attraction for every non-ignored edge.
//! 5. Scale displacements by the global force and move the particles,
//!    never by more than half the area.
//! 6. Rebuild the n-tree and the bounding box from the new positions.
//! 7. Commit the step's energy and announce moved particles.
//!
//! The engine is single-threaded: callers serialize mutations and steps.

use glam::DVec3;
use petgraph::stable_graph::NodeIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::attribute::{AttributeValue, EdgeAttribute, GraphAttribute, NodeAttribute};
use super::config::{MIN_FORCE, Quality, SimulationConfig};
use super::energy::Energies;
use super::event::{AttributeTarget, GraphEvent, LayoutListener, SubscriberId, Subscribers};
use super::stats::{StatsWriter, StepStats};
use crate::error::Result;
use crate::graph::{EdgeId, EdgeInsert, EdgeSpring, GraphEngine, NodeId, NodeParticle};
use crate::spatial::{Admission, Dimension, NTree, RepulsionLaw};

/// A spring stretched by one unit pulls with `SPRING_GAIN * attraction`.
const SPRING_GAIN: f64 = 10.0;

/// Steps back of the energy difference written to the statistics file.
const STATS_ENERGY_LOOKBACK: usize = 30;

/// The force-directed layout engine.
pub struct SpringBox {
    config: SimulationConfig,
    graph: GraphEngine,
    tree: NTree,
    energies: Energies,
    rng: StdRng,
    subscribers: Subscribers,
    stats_out: Option<StatsWriter>,
    /// Radius of exact repulsion, None for exact everywhere.
    view_zone: Option<f64>,
    bounds: Option<(DVec3, DVec3)>,
    time: u64,
    /// Steps since the energy history was last reset or the topology changed.
    steps_since_reset: usize,
    last_step: StepStats,
}

impl SpringBox {
    /// Create an empty layout. Out-of-range settings are clamped.
    pub fn new(config: SimulationConfig) -> Self {
        let config = config.normalized();
        let dimension = if config.is_3d {
            Dimension::Three
        } else {
            Dimension::Two
        };
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut energies = Energies::new(config.energy_buffer);
        energies.randomize(&mut rng);

        Self {
            view_zone: config.quality.view_zone(config.k),
            tree: NTree::new(dimension, config.nodes_per_cell),
            graph: GraphEngine::new(),
            energies,
            rng,
            subscribers: Subscribers::new(),
            stats_out: None,
            bounds: None,
            time: 0,
            steps_since_reset: 0,
            last_step: StepStats::default(),
            config,
        }
    }

    pub fn layout_algorithm_name(&self) -> &'static str {
        "SpringBox"
    }

    // =========================================================================
    // Graph Representation
    // =========================================================================

    /// Add a node-particle at a random position within one unit length of
    /// the origin. Returns false if the id is already live.
    pub fn add_node(&mut self, id: impl Into<NodeId>) -> bool {
        let position = self.random_position();
        let Some(handle) = self.graph.add_node(id.into(), position) else {
            return false;
        };

        self.tree.insert(handle, position, NodeParticle::DEFAULT_WEIGHT);
        self.expand_bounds(position);
        self.topology_changed();
        true
    }

    /// Remove a node-particle and every spring attached to it.
    pub fn remove_node(&mut self, id: &NodeId) -> bool {
        let Some((handle, _, springs)) = self.graph.remove_node(id) else {
            return false;
        };

        self.tree.remove(handle);
        if self.graph.node_count() == 0 {
            self.bounds = None;
        }
        debug!(node = %id, springs = springs.len(), "removed node");
        self.topology_changed();
        true
    }

    /// Add a spring between two live nodes.
    ///
    /// An unknown endpoint makes this a logged no-op. Reusing the id of a
    /// live spring replaces it, deregistering it from its former endpoints.
    pub fn add_edge(&mut self, id: impl Into<EdgeId>, from: impl Into<NodeId>, to: impl Into<NodeId>) -> bool {
        let (id, from, to) = (id.into(), from.into(), to.into());

        match self.graph.add_edge(id.clone(), &from, &to) {
            EdgeInsert::MissingEndpoint => {
                warn!(edge = %id, from = %from, to = %to, "edge endpoint missing, edge ignored");
                return false;
            }
            EdgeInsert::Replaced(_) => {
                warn!(edge = %id, "edge already exists, replacing it");
            }
            EdgeInsert::Added(_) => {}
        }

        self.choose_node_position(&from, &to);
        self.topology_changed();
        true
    }

    /// Remove a spring from the layout and from both endpoints.
    pub fn remove_edge(&mut self, id: &EdgeId) -> bool {
        let removed = self.graph.remove_edge(id);
        if removed {
            self.topology_changed();
        }
        removed
    }

    /// A fresh leaf attached to an established node starts on top of it
    /// instead of snapping in from afar.
    fn choose_node_position(&mut self, from: &NodeId, to: &NodeId) {
        let (Some(a), Some(b)) = (self.graph.node_index(from), self.graph.node_index(to)) else {
            return;
        };
        if a == b {
            return;
        }

        let (degree_a, degree_b) = (self.graph.degree(a), self.graph.degree(b));
        if degree_a == 1 && degree_b > 1 {
            self.relocate_onto(a, b);
        } else if degree_b == 1 && degree_a > 1 {
            self.relocate_onto(b, a);
        }
    }

    fn relocate_onto(&mut self, leaf: NodeIndex, anchor: NodeIndex) {
        let Some(position) = self.graph.particle(anchor).map(|p| p.position) else {
            return;
        };
        if let Some(particle) = self.graph.particle_mut(leaf) {
            particle.position = position;
            let weight = particle.weight();
            self.tree.insert(leaf, position, weight);
        }
    }

    pub fn set_node_weight(&mut self, id: &NodeId, weight: f64) -> bool {
        let Some(handle) = self.graph.node_index(id) else {
            return false;
        };
        let Some(particle) = self.graph.particle_mut(handle) else {
            return false;
        };
        if !particle.set_weight(weight) {
            return false;
        }

        let position = particle.position;
        self.tree.insert(handle, position, weight);
        true
    }

    pub fn set_edge_weight(&mut self, id: &EdgeId, weight: f64) -> bool {
        self.graph.edge_mut(id).is_some_and(|spring| spring.set_weight(weight))
    }

    /// Exclude a spring from force computation, or include it again.
    pub fn ignore_edge(&mut self, id: &EdgeId, on: bool) -> bool {
        match self.graph.edge_mut(id) {
            Some(spring) => {
                spring.ignored = on;
                true
            }
            None => false,
        }
    }

    /// A frozen particle still feels forces but never moves.
    pub fn freeze_node(&mut self, id: &NodeId, on: bool) -> bool {
        match self.graph.node_mut(id) {
            Some(particle) => {
                particle.frozen = on;
                true
            }
            None => false,
        }
    }

    /// Displace a node by an external amount and restart stabilization.
    pub fn move_node(&mut self, id: &NodeId, dx: f64, dy: f64, dz: f64) -> bool {
        let dz = if self.config.is_3d { dz } else { 0.0 };
        let Some(position) = self.graph.node(id).map(|p| p.position + DVec3::new(dx, dy, dz)) else {
            return false;
        };
        self.reposition(id, position)
    }

    /// Place a node at an absolute position and restart stabilization.
    pub fn set_node_position(&mut self, id: &NodeId, position: DVec3) -> bool {
        let mut position = position;
        if !self.config.is_3d {
            position.z = 0.0;
        }
        self.reposition(id, position)
    }

    fn reposition(&mut self, id: &NodeId, position: DVec3) -> bool {
        let Some(handle) = self.graph.node_index(id) else {
            return false;
        };
        let Some(particle) = self.graph.particle_mut(handle) else {
            return false;
        };

        particle.position = position;
        let weight = particle.weight();
        self.tree.insert(handle, position, weight);
        self.expand_bounds(position);
        self.reset_energies();
        true
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    /// Advance the simulation by one step.
    pub fn compute(&mut self) {
        let area = self.bounds.map(|(lo, hi)| lo.distance(hi)).unwrap_or(0.0);
        let mut stats = StepStats {
            step: self.time,
            area,
            ..StepStats::default()
        };

        let handles = self.graph.node_indices();
        for &handle in &handles {
            if let Some(particle) = self.graph.particle_mut(handle) {
                particle.displacement = DVec3::ZERO;
            }
        }

        self.accumulate_repulsion(&handles, &mut stats);
        self.accumulate_attraction();
        let moved = self.apply_displacements(&handles, area, &mut stats);

        self.tree.rebuild_from(
            self.graph
                .particles()
                .map(|(handle, p)| (handle, p.position, p.weight())),
        );
        self.bounds = self.graph.get_bounds();

        stats.energy = self.energies.pending();
        self.energies.commit();
        self.steps_since_reset += 1;
        self.write_stats(&stats);

        for (id, position) in moved {
            self.subscribers.emit(&GraphEvent::NodeMoved { id, position });
        }

        self.time += 1;
        self.last_step = stats;
    }

    fn admission(&self) -> Admission {
        match self.view_zone {
            None => Admission::Exhaustive,
            Some(view_zone) => Admission::BarnesHut {
                view_zone,
                theta: self.config.theta,
            },
        }
    }

    fn accumulate_repulsion(&mut self, handles: &[NodeIndex], stats: &mut StepStats) {
        let admission = self.admission();
        let law = RepulsionLaw {
            unit: self.config.k,
            strength: self.config.repulsion,
        };

        for &handle in handles {
            if self.graph.particle(handle).is_none_or(|p| p.frozen) {
                continue;
            }
            let repulsion = self.tree.repulsion(handle, admission, law);
            stats.interactions += repulsion.interactions;
            self.energies.accumulate(repulsion.energy);
            if let Some(particle) = self.graph.particle_mut(handle) {
                particle.displacement += repulsion.displacement;
            }
        }
    }

    fn accumulate_attraction(&mut self) {
        let k = self.config.k;
        let attraction = self.config.attraction;

        let pulls: Vec<(NodeIndex, NodeIndex, DVec3, f64)> = self
            .graph
            .springs()
            .filter(|s| !s.spring.ignored)
            .filter_map(|s| {
                let delta = self.graph.particle(s.b)?.position - self.graph.particle(s.a)?.position;
                let length = delta.length();
                if length <= 0.0 {
                    return None;
                }
                let factor = attraction * (length - s.spring.ideal_length(k));
                Some((s.a, s.b, delta / length * factor * SPRING_GAIN, factor.abs()))
            })
            .collect();

        for (a, b, pull, magnitude) in pulls {
            if let Some(particle) = self.graph.particle_mut(a) {
                particle.displacement += pull;
            }
            if let Some(particle) = self.graph.particle_mut(b) {
                particle.displacement -= pull;
            }
            self.energies.accumulate(2.0 * magnitude);
        }
    }

    /// Move every non-frozen particle. Returns the moves to announce.
    fn apply_displacements(&mut self, handles: &[NodeIndex], area: f64, stats: &mut StepStats) -> Vec<(NodeId, DVec3)> {
        let force = self.config.force;
        let max_length = area / 2.0;
        let is_3d = self.config.is_3d;
        let every = self.config.move_events_every.max(1);
        let announce = self.time % every == 0 && !self.subscribers.is_empty();

        let mut moved = Vec::new();
        stats.max_move_length = 0.0;
        for &handle in handles {
            let Some(particle) = self.graph.particle_mut(handle) else {
                continue;
            };
            if particle.frozen {
                continue;
            }

            let mut displacement = particle.displacement * force;
            if !is_3d {
                displacement.z = 0.0;
            }
            let mut length = displacement.length();
            if length > max_length {
                displacement *= max_length / length;
                length = max_length;
            }
            if length <= 0.0 {
                continue;
            }

            particle.position += displacement;
            stats.node_move_count += 1;
            stats.avg_move_length += length;
            stats.max_move_length = stats.max_move_length.max(length);
            if announce {
                moved.push((particle.id.clone(), particle.position));
            }
        }
        if stats.node_move_count > 0 {
            stats.avg_move_length /= stats.node_move_count as f64;
        }
        moved
    }

    fn write_stats(&mut self, stats: &StepStats) {
        if !self.config.output_stats {
            return;
        }
        let stabilization = self.stabilization();
        let energy_diff = self.energies.energy() - self.energies.value_at(STATS_ENERGY_LOOKBACK);

        let path = &self.config.stats_path;
        self.stats_out
            .get_or_insert_with(|| StatsWriter::new(path.clone()))
            .record(stabilization, energy_diff, stats);
    }

    /// Drop every particle and spring and restart stabilization.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.tree.clear();
        self.bounds = None;
        self.last_step = StepStats::default();
        self.reset_energies();
    }

    /// Restart stabilization without touching the graph.
    pub fn shake(&mut self) {
        self.reset_energies();
    }

    fn reset_energies(&mut self) {
        self.energies.randomize(&mut self.rng);
        self.steps_since_reset = 0;
    }

    fn topology_changed(&mut self) {
        self.steps_since_reset = 0;
    }

    fn random_position(&mut self) -> DVec3 {
        let k = self.config.k;
        let mut coordinate = || self.rng.r#gen::<f64>() * 2.0 * k - k;
        let (x, y) = (coordinate(), coordinate());
        let z = if self.config.is_3d { coordinate() } else { 0.0 };
        DVec3::new(x, y, z)
    }

    fn expand_bounds(&mut self, p: DVec3) {
        self.bounds = Some(match self.bounds {
            None => (p, p),
            Some((lo, hi)) => (lo.min(p), hi.max(p)),
        });
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn force(&self) -> f64 {
        self.config.force
    }

    /// Set the global displacement scale, clamped to [0.01, 1].
    pub fn set_force(&mut self, value: f64) {
        self.config.force = value.clamp(MIN_FORCE, 1.0);
    }

    pub fn quality(&self) -> Quality {
        self.config.quality
    }

    /// Select a quality level 0..=4. Invalid levels are logged and leave
    /// the current setting untouched.
    pub fn set_quality(&mut self, level: i64) -> Result<()> {
        let quality = Quality::try_from(level).inspect_err(|err| warn!(%err, "quality unchanged"))?;
        self.config.quality = quality;
        self.view_zone = quality.view_zone(self.config.k);
        debug!(quality = level, view_zone = ?self.view_zone, "quality set");
        Ok(())
    }

    /// Radius of exact repulsion, None when the whole graph is exact.
    pub fn view_zone(&self) -> Option<f64> {
        self.view_zone
    }

    /// Override the view zone with a fraction in [0, 1] of the unit length.
    pub fn set_exact_zone(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.view_zone = Some(fraction * self.config.k);
        info!(exact_zone = fraction, "view zone overridden");
    }

    pub fn stabilization_limit(&self) -> f64 {
        self.config.stabilization_limit
    }

    pub fn set_stabilization_limit(&mut self, value: f64) {
        self.config.stabilization_limit = value.clamp(0.0, 1.0);
    }

    pub fn set_output_stats(&mut self, on: bool) {
        self.config.output_stats = on;
        info!(output_stats = on, path = %self.config.stats_path.display(), "layout statistics output");
    }

    /// Whether the statistics output failed and was turned off for good.
    pub fn stats_output_failed(&self) -> bool {
        self.stats_out.as_ref().is_some_and(StatsWriter::is_disabled)
    }

    pub fn set_move_events_every(&mut self, every: u64) {
        self.config.move_events_every = every.max(1);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of completed steps.
    pub fn steps(&self) -> u64 {
        self.time
    }

    /// 0 until a full energy history has been recorded since the last
    /// change, then the energy-based stabilization estimate.
    pub fn stabilization(&self) -> f64 {
        if self.steps_since_reset < self.energies.buffer_size() {
            return 0.0;
        }
        self.energies.stabilization()
    }

    pub fn is_stable(&self) -> bool {
        let stabilization = self.stabilization();
        stabilization > 0.0 && stabilization >= self.config.stabilization_limit
    }

    /// The last committed energy.
    pub fn energy(&self) -> f64 {
        self.energies.energy()
    }

    pub fn low_point(&self) -> DVec3 {
        self.bounds.map(|(lo, _)| lo).unwrap_or(DVec3::ZERO)
    }

    pub fn hi_point(&self) -> DVec3 {
        self.bounds.map(|(_, hi)| hi).unwrap_or(DVec3::ZERO)
    }

    pub fn last_step_stats(&self) -> &StepStats {
        &self.last_step
    }

    pub fn node_moved_count(&self) -> usize {
        self.last_step.node_move_count
    }

    /// Repulsion interactions evaluated during the last step.
    pub fn interaction_count(&self) -> usize {
        self.last_step.interactions
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_position(&self, id: &NodeId) -> Option<DVec3> {
        self.graph.node(id).map(|p| p.position)
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeParticle> {
        self.graph.node(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&EdgeSpring> {
        self.graph.edge(id)
    }

    pub fn incident_edges(&self, id: &NodeId) -> Vec<EdgeId> {
        self.graph.incident_edges(id)
    }

    /// Iterate node ids with their current positions.
    pub fn positions(&self) -> impl Iterator<Item = (&NodeId, DVec3)> + '_ {
        self.graph.particles().map(|(_, p)| (&p.id, p.position))
    }

    pub fn spatial_index(&self) -> &NTree {
        &self.tree
    }

    // =========================================================================
    // Event Consumption
    // =========================================================================

    pub fn subscribe(&mut self, listener: impl LayoutListener + 'static) -> SubscriberId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Apply a graph mutation, then forward it unchanged to subscribers.
    pub fn handle_event(&mut self, event: GraphEvent) {
        match &event {
            GraphEvent::NodeAdded { id } => {
                self.add_node(id.clone());
            }
            GraphEvent::NodeRemoved { id } => {
                self.remove_node(id);
            }
            GraphEvent::EdgeAdded { id, from, to, .. } => {
                self.add_edge(id.clone(), from.clone(), to.clone());
            }
            GraphEvent::EdgeRemoved { id } => {
                self.remove_edge(id);
            }
            GraphEvent::GraphCleared => self.clear(),
            GraphEvent::AttributeAdded { target, name, value } => {
                self.apply_attribute(target, name, Some(value));
            }
            GraphEvent::AttributeChanged { target, name, new, .. } => {
                self.apply_attribute(target, name, Some(new));
            }
            GraphEvent::AttributeRemoved { target, name } => {
                self.apply_attribute(target, name, None);
            }
            GraphEvent::StepBegins { .. } | GraphEvent::NodeMoved { .. } => {}
        }
        self.subscribers.emit(&event);
    }

    fn apply_attribute(&mut self, target: &AttributeTarget, name: &str, value: Option<&AttributeValue>) {
        match target {
            AttributeTarget::Graph => self.apply_graph_attribute(name, value),
            AttributeTarget::Node(id) => {
                if let Some(NodeAttribute::Weight(weight)) = NodeAttribute::parse(name, value) {
                    self.set_node_weight(id, weight.unwrap_or(NodeParticle::DEFAULT_WEIGHT));
                    self.reset_energies();
                }
            }
            AttributeTarget::Edge(id) => match EdgeAttribute::parse(name, value) {
                Some(EdgeAttribute::Weight(weight)) => {
                    self.set_edge_weight(id, weight.unwrap_or(EdgeSpring::DEFAULT_WEIGHT));
                    self.reset_energies();
                }
                Some(EdgeAttribute::Ignored(on)) => {
                    self.ignore_edge(id, on);
                    self.reset_energies();
                }
                None => {}
            },
        }
    }

    fn apply_graph_attribute(&mut self, name: &str, value: Option<&AttributeValue>) {
        let Some(attribute) = GraphAttribute::parse(name, value) else {
            return;
        };

        match attribute {
            GraphAttribute::Force(force) => {
                self.set_force(force);
                self.reset_energies();
            }
            GraphAttribute::Quality(level) => {
                let level = Quality::clamped(level).level() as i64;
                if self.set_quality(level).is_ok() {
                    info!(quality = level, "layout quality");
                }
                self.reset_energies();
            }
            GraphAttribute::ExactZone(fraction) => {
                self.set_exact_zone(fraction);
                self.reset_energies();
            }
            GraphAttribute::OutputStats(on) => self.set_output_stats(on),
            GraphAttribute::StabilizationLimit(limit) => {
                self.set_stabilization_limit(limit);
                self.reset_energies();
            }
        }
    }

    pub fn node_added(&mut self, id: impl Into<NodeId>) {
        self.handle_event(GraphEvent::NodeAdded { id: id.into() });
    }

    pub fn node_removed(&mut self, id: impl Into<NodeId>) {
        self.handle_event(GraphEvent::NodeRemoved { id: id.into() });
    }

    pub fn edge_added(&mut self, id: impl Into<EdgeId>, from: impl Into<NodeId>, to: impl Into<NodeId>, directed: bool) {
        self.handle_event(GraphEvent::EdgeAdded {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            directed,
        });
    }

    pub fn edge_removed(&mut self, id: impl Into<EdgeId>) {
        self.handle_event(GraphEvent::EdgeRemoved { id: id.into() });
    }

    pub fn graph_cleared(&mut self) {
        self.handle_event(GraphEvent::GraphCleared);
    }

    pub fn step_begins(&mut self, step: f64) {
        self.handle_event(GraphEvent::StepBegins { step });
    }

    pub fn attribute_added(&mut self, target: AttributeTarget, name: &str, value: AttributeValue) {
        self.handle_event(GraphEvent::AttributeAdded {
            target,
            name: name.to_owned(),
            value,
        });
    }

    pub fn attribute_changed(
        &mut self,
        target: AttributeTarget,
        name: &str,
        old: Option<AttributeValue>,
        new: AttributeValue,
    ) {
        self.handle_event(GraphEvent::AttributeChanged {
            target,
            name: name.to_owned(),
            old,
            new,
        });
    }

    pub fn attribute_removed(&mut self, target: AttributeTarget, name: &str) {
        self.handle_event(GraphEvent::AttributeRemoved {
            target,
            name: name.to_owned(),
        });
    }
}

impl Default for SpringBox {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn layout_with(nodes: &[&str]) -> SpringBox {
        let mut layout = SpringBox::default();
        for n in nodes {
            layout.add_node(*n);
        }
        layout
    }

    /// 50 particles on a 10 x 5 grid with spacing 5.
    fn grid_layout(quality: i64) -> SpringBox {
        let mut layout = SpringBox::default();
        layout.set_quality(quality).unwrap();
        for i in 0..50 {
            let name = format!("n{i}");
            layout.add_node(name.as_str());
            let position = DVec3::new((i % 10) as f64 * 5.0, (i / 10) as f64 * 5.0, 0.0);
            layout.set_node_position(&id(&name), position);
        }
        layout
    }

    #[test]
    fn test_add_and_remove_nodes() {
        let mut layout = layout_with(&["a", "b"]);
        assert!(!layout.add_node("a"));
        assert_eq!(layout.node_count(), 2);

        let p = layout.node_position(&id("a")).unwrap();
        assert!(p.x.abs() <= 1.0 && p.y.abs() <= 1.0);
        assert_eq!(p.z, 0.0);

        assert!(layout.remove_node(&id("a")));
        assert!(!layout.remove_node(&id("a")));
        assert_eq!(layout.node_count(), 1);
    }

    #[test]
    fn test_spatial_index_tracks_live_particles() {
        let mut layout = SpringBox::default();
        for i in 0..40 {
            layout.add_node(format!("n{i}"));
            if i % 3 == 0 {
                layout.remove_node(&NodeId::new(format!("n{}", i / 2)));
            }
            assert_eq!(layout.spatial_index().len(), layout.node_count());
            if i % 7 == 0 {
                layout.compute();
                assert_eq!(layout.spatial_index().len(), layout.node_count());
            }
        }
        layout.clear();
        assert_eq!(layout.spatial_index().len(), 0);
    }

    #[test]
    fn test_edge_with_missing_endpoint_is_ignored() {
        let mut layout = layout_with(&["a"]);

        assert!(!layout.add_edge("e", "a", "ghost"));
        assert!(!layout.add_edge("e", "ghost", "a"));
        assert!(!layout.add_edge("e", "ghost", "phantom"));
        assert_eq!(layout.edge_count(), 0);
        assert!(layout.incident_edges(&id("a")).is_empty());
    }

    #[test]
    fn test_remove_node_removes_incident_edges() {
        let mut layout = layout_with(&["a", "b", "c"]);
        layout.add_edge("ab", "a", "b");
        layout.add_edge("bc", "b", "c");

        layout.remove_node(&id("b"));
        assert_eq!(layout.edge_count(), 0);
        assert!(layout.edge(&EdgeId::from("ab")).is_none());
        assert!(layout.incident_edges(&id("a")).is_empty());
        assert!(layout.incident_edges(&id("c")).is_empty());
        layout.compute();
    }

    #[test]
    fn test_duplicate_edge_id_leaves_no_stale_registration() {
        let mut layout = layout_with(&["A", "B", "C", "D"]);
        layout.add_edge("e1", "A", "B");
        assert!(layout.add_edge("e1", "C", "D"));

        assert!(layout.incident_edges(&id("A")).is_empty());
        assert!(layout.incident_edges(&id("B")).is_empty());
        assert_eq!(layout.incident_edges(&id("C")), vec![EdgeId::from("e1")]);
        assert_eq!(layout.incident_edges(&id("D")), vec![EdgeId::from("e1")]);
        assert_eq!(layout.edge_count(), 1);
    }

    #[test]
    fn test_new_leaf_is_placed_on_its_anchor() {
        let mut layout = layout_with(&["A", "B", "C", "D"]);
        layout.add_edge("bc", "B", "C");
        layout.add_edge("bd", "B", "D");
        let b = layout.node_position(&id("B")).unwrap();
        assert_ne!(layout.node_position(&id("A")).unwrap(), b);

        layout.add_edge("ab", "A", "B");
        assert_eq!(layout.node_position(&id("A")).unwrap(), b);
        assert_eq!(layout.node_position(&id("B")).unwrap(), b);
    }

    #[test]
    fn test_leaf_placement_is_symmetric() {
        let mut layout = layout_with(&["A", "B", "C", "D"]);
        layout.add_edge("bc", "B", "C");
        layout.add_edge("bd", "B", "D");
        let b = layout.node_position(&id("B")).unwrap();

        layout.add_edge("ba", "B", "A");
        assert_eq!(layout.node_position(&id("A")).unwrap(), b);
    }

    #[test]
    fn test_spring_pulls_stretched_pair_together() {
        let mut layout = layout_with(&["a", "b"]);
        layout.add_edge("ab", "a", "b");
        layout.set_quality(4).unwrap();
        layout.set_force(1.0);
        layout.set_node_position(&id("a"), DVec3::ZERO);
        layout.set_node_position(&id("b"), DVec3::new(2.0, 0.0, 0.0));

        layout.compute();

        let a = layout.node_position(&id("a")).unwrap();
        let b = layout.node_position(&id("b")).unwrap();
        assert!(a.distance(b) < 2.0 - 1e-6, "separation {}", a.distance(b));
    }

    #[test]
    fn test_unconnected_pair_repels() {
        let mut layout = layout_with(&["a", "b"]);
        layout.set_quality(4).unwrap();
        layout.set_node_position(&id("a"), DVec3::ZERO);
        layout.set_node_position(&id("b"), DVec3::new(0.5, 0.0, 0.0));

        layout.compute();

        let a = layout.node_position(&id("a")).unwrap();
        let b = layout.node_position(&id("b")).unwrap();
        assert!(a.distance(b) > 0.5);
    }

    #[test]
    fn test_ignored_edge_exerts_no_force() {
        let mut layout = layout_with(&["a", "b"]);
        layout.add_edge("ab", "a", "b");
        layout.ignore_edge(&EdgeId::from("ab"), true);
        layout.set_quality(4).unwrap();
        layout.set_node_position(&id("a"), DVec3::ZERO);
        layout.set_node_position(&id("b"), DVec3::new(4.0, 0.0, 0.0));

        layout.compute();

        let a = layout.node_position(&id("a")).unwrap();
        let b = layout.node_position(&id("b")).unwrap();
        assert!(a.distance(b) > 4.0, "only repulsion should remain");
        assert_eq!(layout.edge_count(), 1);
    }

    #[test]
    fn test_frozen_node_does_not_move() {
        let mut layout = layout_with(&["a", "b"]);
        layout.add_edge("ab", "a", "b");
        layout.set_node_position(&id("a"), DVec3::ZERO);
        layout.set_node_position(&id("b"), DVec3::new(3.0, 0.0, 0.0));
        layout.freeze_node(&id("a"), true);

        for _ in 0..5 {
            layout.compute();
        }

        assert_eq!(layout.node_position(&id("a")).unwrap(), DVec3::ZERO);
        assert!(layout.node_position(&id("b")).unwrap().x < 3.0);
    }

    #[test]
    fn test_exact_quality_touches_every_other_particle() {
        let mut layout = grid_layout(4);
        layout.compute();

        assert_eq!(layout.interaction_count(), 50 * 49);
    }

    #[test]
    fn test_approximate_qualities_touch_fewer_particles() {
        for quality in 0..=3 {
            let mut layout = grid_layout(quality);
            layout.compute();

            let average = layout.last_step_stats().interactions as f64 / 50.0;
            assert!(average < 49.0, "quality {quality}: {average} interactions per particle");
        }
    }

    #[test]
    fn test_stabilization_zero_before_full_history() {
        let mut layout = layout_with(&["a", "b", "c"]);
        layout.add_edge("ab", "a", "b");
        layout.add_edge("bc", "b", "c");

        for step in 0..256 {
            assert_eq!(layout.stabilization(), 0.0, "step {step}");
            layout.compute();
        }
        assert!(layout.stabilization() > 0.0);
        assert!(layout.stabilization() <= 1.0);
    }

    #[test]
    fn test_clear_restarts_stabilization() {
        let mut layout = layout_with(&["a", "b"]);
        for _ in 0..300 {
            layout.compute();
        }
        assert!(layout.stabilization() > 0.0);

        layout.clear();
        for _ in 0..10 {
            assert_eq!(layout.stabilization(), 0.0);
        }
        assert_eq!(layout.node_count(), 0);
        assert_eq!(layout.edge_count(), 0);

        layout.add_node("a");
        layout.add_node("b");
        for step in 0..256 {
            assert_eq!(layout.stabilization(), 0.0, "step {step} after clear");
            layout.compute();
        }
        assert!(layout.stabilization() > 0.0);
    }

    #[test]
    fn test_new_clamps_config() {
        let layout = SpringBox::new(SimulationConfig {
            force: 5.0,
            stabilization_limit: 3.0,
            move_events_every: 0,
            ..SimulationConfig::default()
        });

        assert_eq!(layout.force(), 1.0);
        assert_eq!(layout.stabilization_limit(), 1.0);
    }

    #[test]
    fn test_out_of_range_force_does_not_amplify_moves() {
        let run = |force: f64| {
            let mut layout = SpringBox::new(SimulationConfig {
                force,
                ..SimulationConfig::default()
            });
            layout.add_node("a");
            layout.add_node("b");
            layout.set_node_position(&id("a"), DVec3::ZERO);
            layout.set_node_position(&id("b"), DVec3::new(0.5, 0.0, 0.0));
            layout.compute();
            layout.last_step_stats().max_move_length
        };

        assert_eq!(run(5.0), run(1.0));
    }

    #[test]
    fn test_parameter_change_restarts_stabilization() {
        let mut layout = layout_with(&["a", "b"]);
        for _ in 0..300 {
            layout.compute();
        }
        assert!(layout.stabilization() > 0.0);

        layout.attribute_changed(AttributeTarget::Graph, "force", None, 0.5.into());
        assert_eq!(layout.stabilization(), 0.0);
        assert_eq!(layout.force(), 0.5);

        for _ in 0..256 {
            layout.compute();
        }
        assert!(layout.stabilization() > 0.0);

        layout.add_node("c");
        assert_eq!(layout.stabilization(), 0.0);
    }

    #[test]
    fn test_move_node_restarts_stabilization() {
        let mut layout = layout_with(&["a"]);
        for _ in 0..300 {
            layout.compute();
        }
        let before = layout.node_position(&id("a")).unwrap();

        assert!(layout.move_node(&id("a"), 1.0, 2.0, 3.0));
        assert_eq!(layout.node_position(&id("a")).unwrap(), before + DVec3::new(1.0, 2.0, 0.0));
        assert_eq!(layout.stabilization(), 0.0);
        assert!(!layout.move_node(&id("ghost"), 1.0, 0.0, 0.0));
    }

    #[test]
    fn test_quality_validation() {
        let mut layout = SpringBox::default();
        assert!(layout.set_quality(7).is_err());
        assert_eq!(layout.quality().level(), 1);
        assert_eq!(layout.view_zone(), Some(2.0));

        layout.attribute_added(AttributeTarget::Graph, "layout.quality", 9.0.into());
        assert_eq!(layout.quality(), Quality::EXACT);
        assert_eq!(layout.view_zone(), None);
    }

    #[test]
    fn test_graph_attributes() {
        let mut layout = SpringBox::default();

        layout.attribute_added(AttributeTarget::Graph, "force", 0.0.into());
        assert_eq!(layout.force(), 0.01);

        layout.attribute_added(AttributeTarget::Graph, "stabilization-limit", 1.5.into());
        assert_eq!(layout.stabilization_limit(), 1.0);

        layout.attribute_added(AttributeTarget::Graph, "exact-zone", 0.25.into());
        assert_eq!(layout.view_zone(), Some(0.25));

        layout.attribute_added(AttributeTarget::Graph, "exact-zone", 3.0.into());
        assert_eq!(layout.view_zone(), Some(1.0));
    }

    #[test]
    fn test_node_and_edge_attributes() {
        let mut layout = layout_with(&["a", "b"]);
        layout.add_edge("ab", "a", "b");
        let edge = EdgeId::from("ab");

        layout.attribute_added(AttributeTarget::Node(id("a")), "weight", 3.0.into());
        assert_eq!(layout.node(&id("a")).unwrap().weight(), 3.0);
        layout.attribute_removed(AttributeTarget::Node(id("a")), "weight");
        assert_eq!(layout.node(&id("a")).unwrap().weight(), 1.0);

        layout.attribute_added(AttributeTarget::Edge(edge.clone()), "weight", 2.0.into());
        assert_eq!(layout.edge(&edge).unwrap().weight(), 2.0);
        layout.attribute_added(AttributeTarget::Edge(edge.clone()), "ignored", true.into());
        assert!(layout.edge(&edge).unwrap().ignored);
        layout.attribute_removed(AttributeTarget::Edge(edge.clone()), "ignored");
        assert!(!layout.edge(&edge).unwrap().ignored);
        assert_eq!(layout.stabilization(), 0.0);
    }

    #[test]
    fn test_events_are_applied_then_forwarded() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut layout = SpringBox::default();
        layout.subscribe(move |event: &GraphEvent| sink.borrow_mut().push(event.clone()));

        layout.node_added("a");
        layout.node_added("b");
        layout.edge_added("ab", "a", "b", true);
        layout.edge_added("ax", "a", "ghost", false);
        layout.step_begins(1.0);

        assert_eq!(layout.edge_count(), 1);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[0], GraphEvent::NodeAdded { id: id("a") });
        assert_eq!(
            seen[3],
            GraphEvent::EdgeAdded {
                id: "ax".into(),
                from: id("a"),
                to: id("ghost"),
                directed: false,
            }
        );
        assert_eq!(seen[4], GraphEvent::StepBegins { step: 1.0 });
    }

    #[test]
    fn test_moved_events_are_throttled() {
        let moves = Rc::new(RefCell::new(0usize));
        let counter = Rc::clone(&moves);
        let mut layout = layout_with(&["a", "b"]);
        layout.set_move_events_every(3);
        layout.subscribe(move |event: &GraphEvent| {
            if let GraphEvent::NodeMoved { .. } = event {
                *counter.borrow_mut() += 1;
            }
        });

        let mut per_step = Vec::new();
        for _ in 0..6 {
            let before = *moves.borrow();
            layout.compute();
            per_step.push(*moves.borrow() - before);
        }

        assert!(per_step[0] > 0);
        assert_eq!(per_step[1], 0);
        assert_eq!(per_step[2], 0);
        assert!(per_step[3] > 0);
        assert_eq!(per_step[4], 0);
        assert_eq!(per_step[5], 0);
    }

    #[test]
    fn test_moved_event_carries_new_position() {
        let last = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&last);
        let mut layout = layout_with(&["a", "b"]);
        layout.subscribe(move |event: &GraphEvent| {
            if let GraphEvent::NodeMoved { id, position } = event {
                if id.as_str() == "a" {
                    *sink.borrow_mut() = Some(*position);
                }
            }
        });

        layout.compute();
        assert_eq!(*last.borrow(), layout.node_position(&id("a")));
    }

    #[test]
    fn test_bounds_follow_particles() {
        let mut layout = layout_with(&["a", "b"]);
        layout.set_node_position(&id("a"), DVec3::new(-3.0, 1.0, 0.0));
        layout.set_node_position(&id("b"), DVec3::new(4.0, -2.0, 0.0));
        layout.compute();

        let lo = layout.low_point();
        let hi = layout.hi_point();
        for (_, p) in layout.positions() {
            assert!(p.cmpge(lo).all() && p.cmple(hi).all());
        }
        assert!(lo.x < 0.0 && hi.x > 0.0);
    }

    #[test]
    fn test_three_d_layout_uses_z() {
        let mut layout = SpringBox::new(SimulationConfig::three_d());
        for i in 0..20 {
            layout.add_node(format!("n{i}"));
        }
        for _ in 0..5 {
            layout.compute();
        }
        assert!(layout.positions().any(|(_, p)| p.z != 0.0));
    }

    #[test]
    fn test_stats_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("springBox.dat");
        let config = SimulationConfig {
            output_stats: true,
            stats_path: path.clone(),
            ..SimulationConfig::default()
        };
        let mut layout = SpringBox::new(config);
        layout.add_node("a");
        layout.add_node("b");

        for _ in 0..3 {
            layout.compute();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(!layout.stats_output_failed());
    }

    #[test]
    fn test_stats_failure_does_not_stop_simulation() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulationConfig {
            stats_path: dir.path().join("no-such-dir").join("springBox.dat"),
            ..SimulationConfig::default()
        };
        let mut layout = SpringBox::new(config);
        layout.add_node("a");
        layout.add_node("b");
        layout.attribute_added(AttributeTarget::Graph, "output-stats", true.into());

        layout.compute();
        layout.compute();

        assert!(layout.stats_output_failed());
        assert_eq!(layout.steps(), 2);
    }

    #[test]
    fn test_same_seed_same_layout() {
        let run = || {
            let mut layout = layout_with(&["a", "b", "c"]);
            layout.add_edge("ab", "a", "b");
            for _ in 0..10 {
                layout.compute();
            }
            layout.node_position(&id("c")).unwrap()
        };
        assert_eq!(run(), run());
    }
}
