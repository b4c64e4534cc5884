//! Simulation parameters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::energy::Energies;
use crate::error::{Error, Result};

/// Discrete trade-off between speed and accuracy of the repulsion.
///
/// Levels 0 to 3 compute repulsion exactly within a view zone of 1, 2, 5
/// and 10 unit lengths and approximate beyond it. Level 4 is exact
/// everywhere and costs O(n²) per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quality(u8);

impl Quality {
    pub const FASTEST: Quality = Quality(0);
    pub const EXACT: Quality = Quality(4);

    /// The closest valid level.
    pub fn clamped(level: i64) -> Self {
        Quality(level.clamp(0, 4) as u8)
    }

    #[inline]
    pub fn level(self) -> u8 {
        self.0
    }

    /// Exact-repulsion radius for this level, None when everything is exact.
    pub fn view_zone(self, unit: f64) -> Option<f64> {
        match self.0 {
            0 => Some(unit),
            1 => Some(2.0 * unit),
            2 => Some(5.0 * unit),
            3 => Some(10.0 * unit),
            _ => None,
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality(1)
    }
}

impl TryFrom<i64> for Quality {
    type Error = Error;

    fn try_from(level: i64) -> Result<Self> {
        if (0..=4).contains(&level) {
            Ok(Quality(level as u8))
        } else {
            Err(Error::InvalidQuality(level))
        }
    }
}

impl From<Quality> for i64 {
    fn from(quality: Quality) -> Self {
        quality.0 as i64
    }
}

/// Smallest global force; the largest is 1.
pub const MIN_FORCE: f64 = 0.01;

/// Parameters of a [`SpringBox`](super::SpringBox), fixed at construction
/// unless changed through the engine's setters or layout attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Lay out in 3D (octree) instead of 2D (quadtree, z = 0).
    pub is_3d: bool,
    /// Seed of the generator used for initial positions and energy noise.
    pub seed: u64,
    /// Particles a spatial cell holds before it subdivides.
    pub nodes_per_cell: usize,
    /// Number of steps remembered by the energy history.
    pub energy_buffer: usize,
    /// Barnes-Hut admissibility threshold (cell width / distance).
    pub theta: f64,
    /// Unit length: the ideal length of a spring of weight 1.
    pub k: f64,
    /// Spring attraction constant.
    pub attraction: f64,
    /// Repulsion constant.
    pub repulsion: f64,
    /// Global displacement scale in [0.01, 1].
    pub force: f64,
    pub quality: Quality,
    /// Stabilization above which the layout counts as stable.
    pub stabilization_limit: f64,
    /// Emit particle-moved events only every N steps.
    pub move_events_every: u64,
    /// Append per-step statistics to `stats_path`.
    pub output_stats: bool,
    pub stats_path: PathBuf,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            is_3d: false,
            seed: 0x5eed_b0c5,
            nodes_per_cell: 10,
            energy_buffer: Energies::DEFAULT_BUFFER,
            theta: 0.7,
            k: 1.0,
            attraction: 0.06,
            repulsion: 0.024,
            force: 1.0,
            quality: Quality::default(),
            stabilization_limit: 0.9,
            move_events_every: 1,
            output_stats: false,
            stats_path: PathBuf::from("springBox.dat"),
        }
    }
}

impl SimulationConfig {
    /// Default configuration for a 3D layout.
    pub fn three_d() -> Self {
        Self {
            is_3d: true,
            ..Self::default()
        }
    }

    /// Bring every field into its valid range.
    pub fn normalized(mut self) -> Self {
        self.force = self.force.clamp(MIN_FORCE, 1.0);
        self.stabilization_limit = self.stabilization_limit.clamp(0.0, 1.0);
        self.move_events_every = self.move_events_every.max(1);
        self.energy_buffer = self.energy_buffer.max(1);
        self.nodes_per_cell = self.nodes_per_cell.max(1);
        self
    }
}
