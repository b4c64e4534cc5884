//! Error type for the layout engine.
//!
//! Graph mutations never fail: a mutation that references something absent
//! is logged and ignored. Only explicit configuration requests and the
//! statistics output surface errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by configuration requests and statistics output.
#[derive(Error, Debug)]
pub enum Error {
    /// Quality levels run from 0 (fastest) to 4 (exact).
    #[error("invalid quality level {0}, expected 0..=4")]
    InvalidQuality(i64),

    /// The statistics file could not be opened or written.
    #[error("cannot write layout statistics to {path}: {source}")]
    StatsOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An attribute value coming from the host could not be decoded.
    #[error("cannot decode value of attribute `{name}`: {reason}")]
    Attribute { name: String, reason: String },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
