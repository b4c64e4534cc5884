//! History of the layout's total energy.
//!
//! Each step accumulates the magnitudes of every force it computes, then
//! commits the total into a circular buffer. The layout is considered
//! stable once the latest total no longer differs from the values of
//! roughly 200 steps ago.

use rand::Rng;

/// Look-back offsets sampled by [`Energies::stabilization`].
const STABILIZATION_RANGE: [usize; 3] = [200, 190, 180];

/// Circular history of per-step energies.
#[derive(Debug, Clone)]
pub struct Energies {
    /// Energy of the step in progress.
    energy: f64,
    /// Last committed energy.
    last_energy: f64,
    history: Vec<f64>,
    /// Slot of the last committed value.
    cursor: usize,
}

impl Energies {
    /// Default number of remembered steps.
    pub const DEFAULT_BUFFER: usize = 256;

    /// Create a history remembering `buffer` steps (at least one).
    pub fn new(buffer: usize) -> Self {
        Self {
            energy: 0.0,
            last_energy: 0.0,
            history: vec![0.0; buffer.max(1)],
            cursor: 0,
        }
    }

    /// Number of steps remembered.
    pub fn buffer_size(&self) -> usize {
        self.history.len()
    }

    /// The last committed energy.
    pub fn energy(&self) -> f64 {
        self.last_energy
    }

    /// Energy accumulated so far for the step in progress.
    pub fn pending(&self) -> f64 {
        self.energy
    }

    /// Add to the energy of the step in progress.
    #[inline]
    pub fn accumulate(&mut self, value: f64) {
        self.energy += value;
    }

    /// Push the step's energy into the history, overwriting the oldest
    /// value, and start a new step at zero.
    pub fn commit(&mut self) {
        self.cursor = (self.cursor + 1) % self.history.len();
        self.history[self.cursor] = self.energy;
        self.last_energy = self.energy;
        self.energy = 0.0;
    }

    /// The value committed `steps_back` steps ago, clamped to the oldest one
    /// still remembered. `value_at(0)` is the latest committed value.
    pub fn value_at(&self, steps_back: usize) -> f64 {
        let len = self.history.len();
        let steps_back = steps_back.min(len - 1);
        self.history[(self.cursor + len - steps_back) % len]
    }

    /// Reciprocal of the distance between the latest energy and the mean of
    /// three samples ~200 steps back, the distance being floored at 1.
    ///
    /// The result lies in (0, 1] and reaches 1 as soon as the energy varies
    /// by less than one unit; it is a heuristic, not a normalized measure.
    pub fn stabilization(&self) -> f64 {
        let previous = STABILIZATION_RANGE
            .iter()
            .map(|&back| self.value_at(back))
            .sum::<f64>()
            / STABILIZATION_RANGE.len() as f64;
        let diff = (self.last_energy - previous).abs().max(1.0);

        1.0 / diff
    }

    /// Fill the history with noise in [-1000, 1000) so that stabilization
    /// has to be measured again from scratch.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for value in &mut self.history {
            *value = rng.gen_range(-1000.0..1000.0);
        }
    }
}

impl Default for Energies {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BUFFER)
    }
}
