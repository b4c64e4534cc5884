//! Per-step statistics and their optional file output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Measurements of one simulation step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    pub step: u64,
    /// Particles whose position changed.
    pub node_move_count: usize,
    pub max_move_length: f64,
    pub avg_move_length: f64,
    /// Diagonal of the bounding box at the start of the step.
    pub area: f64,
    /// Total energy committed for the step.
    pub energy: f64,
    /// Particle/particle and particle/barycenter interactions evaluated.
    pub interactions: usize,
}

const HEADER: &str = "# stabilization nodeMoveCount energy energyDiff maxMoveLength avgLength area";

/// Appends one line per step to a statistics file.
///
/// The file is opened on first use. Any I/O failure is logged once and
/// disables the writer for the rest of its life.
pub struct StatsWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    disabled: bool,
}

impl StatsWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            out: None,
            disabled: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Write one row. Failures never propagate.
    pub fn record(&mut self, stabilization: f64, energy_diff: f64, stats: &StepStats) {
        if self.disabled {
            return;
        }
        if let Err(err) = self.write_row(stabilization, energy_diff, stats) {
            tracing::warn!(error = %err, "disabling layout statistics output");
            self.disabled = true;
            self.out = None;
        }
    }

    fn write_row(&mut self, stabilization: f64, energy_diff: f64, stats: &StepStats) -> Result<()> {
        let path = self.path.clone();
        let to_error = |source: std::io::Error| Error::StatsOutput {
            path: path.clone(),
            source,
        };

        if self.out.is_none() {
            let mut out = BufWriter::new(File::create(&self.path).map_err(to_error)?);
            writeln!(out, "{HEADER}").map_err(to_error)?;
            self.out = Some(out);
        }

        if let Some(out) = self.out.as_mut() {
            writeln!(
                out,
                "{:.6} {} {:.6} {:.6} {:.6} {:.6} {:.6}",
                stabilization,
                stats.node_move_count,
                stats.energy,
                energy_diff,
                stats.max_move_length,
                stats.avg_move_length,
                stats.area
            )
            .map_err(to_error)?;
            out.flush().map_err(to_error)?;
        }
        Ok(())
    }
}
