//! Error types of a processing run.

use std::path::PathBuf;

/// Failures that abort a run.
///
/// Unreadable tokens are not errors: they are skipped one by one while locating samples.
#[derive(Debug, thiserror::Error)]
pub enum RocError {
    /// The measurement file could not be opened or read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path of the measurement file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The measurement file is not valid CSV.
    #[error("malformed measurement table: {0}")]
    Csv(#[from] csv::Error),

    /// The declared sag unit is neither inches nor millimeters.
    #[error("sag unit `{0}` not recognized, expected `in` or `mm`")]
    UnknownSagUnit(String),

    /// The raster needs at least one pixel per axis.
    #[error("raster pixel count must be positive")]
    InvalidPixelCount,

    /// A polar table has more rows than configured ring radii.
    #[error("{rows} measurement rings in the table but only {radii} ring radii configured")]
    MissingRingRadius {
        /// Number of rows in the table.
        rows: usize,
        /// Number of configured ring radii.
        radii: usize,
    },

    /// Any other configuration value out of its domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type of this crate.
pub type RocResult<T> = Result<T, RocError>;
