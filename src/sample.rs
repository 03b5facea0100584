//! Placement of raw readings on the raster.
//!
//! A measurement table is a list of rows of string tokens. How rows and token positions map to
//! physical gauge positions depends on the layout of the measurement:
//! - [`GridLayout`]: one row, one token per tile of a square tiling, in row-major order.
//! - [`PolarLayout`]: one row per ring, tokens evenly spaced in angle around the ring.
//!
//! Both implement [`SampleLocator`], which is all the rest of the pipeline needs to know.

use std::fmt::Debug;

use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{Rotation2, Vector2};

use crate::error::{RocError, RocResult};
use crate::raster::RasterGrid;
use crate::smooth::SurfaceSmoother;
use crate::{Float, lit};

/// A reading placed on the raster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample<F: Float> {
    /// Gauge position in raster units.
    pub position: Vector2<F>,
    /// Sag reading in the declared sag unit.
    pub sag: F,
}

impl<F: Float> Sample<F> {
    /// Create a new sample.
    pub fn new(position: Vector2<F>, sag: F) -> Self {
        Self { position, sag }
    }
}

/// Structural position of a token in the measurement table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasurementIndex {
    /// Row-major tile number.
    Tile(usize),
    /// Angular slot on a ring.
    Ring {
        /// Ring number, i.e. the row of the table.
        ring: usize,
        /// Angular slot among the kept readings of the ring.
        slot: usize,
        /// Number of kept readings of the ring.
        slots: usize,
    },
}

/// One token of the measurement table with its structural index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawMeasurement<'a> {
    /// Where the token sits in the layout.
    pub index: MeasurementIndex,
    /// The unparsed reading.
    pub token: &'a str,
}

/// Which tokens the instrument uses for "no reading".
///
/// The gauge software writes `0` or leaves the cell empty for skipped placements,
/// so by default a genuine zero sag cannot be told apart from a missing reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SentinelPolicy {
    /// Empty tokens and the literal token `0` are missing readings.
    #[default]
    ZeroOrEmpty,
    /// Only empty tokens are missing, `0` is a real reading.
    EmptyOnly,
}

impl SentinelPolicy {
    /// Whether `token` marks a missing reading.
    pub fn is_sentinel(&self, token: &str) -> bool {
        let token = token.trim();
        match self {
            SentinelPolicy::ZeroOrEmpty => token.is_empty() || token == "0",
            SentinelPolicy::EmptyOnly => token.is_empty(),
        }
    }
}

/// Parse a sag token.
///
/// Returns `None` for anything that is not a finite decimal number.
pub fn parse_sag<F: Float>(token: &str) -> Option<F> {
    let value: f64 = token.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    F::from_f64(value)
}

/// Samples located from a table, with the number of readings that could not be used.
#[derive(Clone, Debug, PartialEq)]
pub struct Located<F: Float> {
    /// Samples in table order.
    pub samples: Vec<Sample<F>>,
    /// Non-sentinel tokens that failed to parse or had no position.
    pub skipped: usize,
}

/// Generalizes over measurement layouts.
///
/// A layout knows where a token of the table was measured and in which coordinate space the
/// raster lives. Everything else in the pipeline is shared.
pub trait SampleLocator<F: Float>: Clone + Debug + Send + Sync {
    /// Enumerate all tokens of the table that are not sentinels.
    fn measurements<'a>(
        &self,
        rows: &'a [Vec<String>],
        policy: SentinelPolicy,
    ) -> RocResult<Vec<RawMeasurement<'a>>>;

    /// Raster position of a structural index.
    ///
    /// `None` if the index does not exist in this layout.
    fn position(&self, index: MeasurementIndex) -> Option<Vector2<F>>;

    /// Build the raster for a mirror of `object_diameter` at the given resolution.
    fn raster(&self, object_diameter: F, pixels: usize) -> RocResult<RasterGrid<F>>;

    /// Factor from physical lengths to raster units.
    fn length_scale(&self) -> F;

    /// Center of the mirror in raster units.
    fn mirror_center(&self) -> Vector2<F>;

    /// Resolution used when none is configured.
    fn default_pixels(&self) -> usize;

    /// Mirror diameter used when none is configured.
    fn default_object_diameter(&self) -> F;

    /// Smoothing used when none is configured.
    fn default_smoother(&self) -> SurfaceSmoother<F>;

    /// Check the layout parameters.
    fn validate(&self) -> RocResult<()> {
        Ok(())
    }

    /// Place one raw measurement.
    ///
    /// Returns `None` if the token is not a number; such readings are skipped.
    fn locate(&self, measurement: &RawMeasurement<'_>) -> Option<Sample<F>> {
        let sag = parse_sag(measurement.token)?;
        let position = self.position(measurement.index)?;
        Some(Sample::new(position, sag))
    }

    /// Place every reading of a table, skipping sentinels and unreadable tokens.
    fn locate_rows(&self, rows: &[Vec<String>], policy: SentinelPolicy) -> RocResult<Located<F>> {
        let measurements = self.measurements(rows, policy)?;
        let samples = measurements
            .iter()
            .filter_map(|m| {
                let sample = self.locate(m);
                if sample.is_none() {
                    debug!("Skipping unreadable reading {:?} at {:?}.", m.token, m.index);
                }
                sample
            })
            .collect_vec();
        let skipped = measurements.len() - samples.len();

        info!(
            "Located {} samples, skipped {} unreadable readings.",
            samples.len(),
            skipped
        );
        Ok(Located { samples, skipped })
    }
}

/// Readings taken on the tiles of a square tiling.
///
/// Coordinates are in tile units: tile `i` sits at `(i mod W, floor(i / W))`.
#[derive(Clone, Debug, PartialEq)]
pub struct GridLayout<F: Float> {
    /// Edge length of one tile, in physical units.
    pub tile_size: F,
    /// Number of tiles per side `W`.
    pub tiling_count: usize,
    /// Mirror center in tile units.
    pub mirror_center: Vector2<F>,
}

impl<F: Float> GridLayout<F> {
    /// Create a new instance. The mirror is centered on the tiling.
    pub fn new(tile_size: F, tiling_count: usize) -> Self {
        let half = lit::<F>(tiling_count as f64) / lit(2.);
        Self {
            tile_size,
            tiling_count,
            mirror_center: Vector2::new(half, half),
        }
    }

    /// Set the mirror center, in tile units.
    pub fn with_mirror_center(mut self, center: Vector2<F>) -> Self {
        self.mirror_center = center;
        self
    }
}

impl<F: Float> Default for GridLayout<F> {
    fn default() -> Self {
        Self::new(lit(3.), 10)
    }
}

impl<F: Float> SampleLocator<F> for GridLayout<F> {
    fn measurements<'a>(
        &self,
        rows: &'a [Vec<String>],
        policy: SentinelPolicy,
    ) -> RocResult<Vec<RawMeasurement<'a>>> {
        let Some(row) = rows.first() else {
            warn!("Empty measurement table.");
            return Ok(Vec::new());
        };
        if rows.len() > 1 {
            debug!("Grid tables hold a single row, ignoring {} more.", rows.len() - 1);
        }

        let tiles = self.tiling_count * self.tiling_count;
        if row.len() > tiles {
            warn!(
                "{} readings for a {}x{} tiling, ignoring the last {}.",
                row.len(),
                self.tiling_count,
                self.tiling_count,
                row.len() - tiles
            );
        }

        Ok(row
            .iter()
            .take(tiles)
            .enumerate()
            .filter(|(_, token)| !policy.is_sentinel(token))
            .map(|(i, token)| RawMeasurement {
                index: MeasurementIndex::Tile(i),
                token: token.as_str(),
            })
            .collect_vec())
    }

    fn position(&self, index: MeasurementIndex) -> Option<Vector2<F>> {
        let MeasurementIndex::Tile(i) = index else {
            return None;
        };
        let width = self.tiling_count;
        if i >= width * width {
            return None;
        }
        Some(Vector2::new(
            lit((i % width) as f64),
            lit((i / width) as f64),
        ))
    }

    fn raster(&self, _object_diameter: F, pixels: usize) -> RocResult<RasterGrid<F>> {
        RasterGrid::tiles(self.tiling_count, pixels)
    }

    fn length_scale(&self) -> F {
        F::one() / self.tile_size
    }

    fn mirror_center(&self) -> Vector2<F> {
        self.mirror_center
    }

    fn default_pixels(&self) -> usize {
        10
    }

    fn default_object_diameter(&self) -> F {
        lit(28.)
    }

    fn default_smoother(&self) -> SurfaceSmoother<F> {
        SurfaceSmoother::new(lit(3.), 3)
    }

    fn validate(&self) -> RocResult<()> {
        if !(self.tile_size.is_finite() && self.tile_size > F::zero()) {
            return Err(RocError::InvalidParameter(format!(
                "tile size must be positive, got {:?}",
                self.tile_size
            )));
        }
        if self.tiling_count == 0 {
            return Err(RocError::InvalidParameter(
                "tiling needs at least one tile".to_string(),
            ));
        }
        Ok(())
    }
}

/// Readings taken at evenly spaced angles on concentric rings.
///
/// Coordinates are physical and centered on the mirror.
#[derive(Clone, Debug, PartialEq)]
pub struct PolarLayout<F: Float> {
    /// Radius of each ring, one per table row.
    pub ring_radii: Vec<F>,
    /// Fraction of the mirror diameter added around the raster.
    pub overfill: F,
}

impl<F: Float> PolarLayout<F> {
    /// Create a new instance from the ring radii, in table row order.
    pub fn new(ring_radii: Vec<F>) -> Self {
        Self {
            ring_radii,
            overfill: F::zero(),
        }
    }

    /// Enlarge the raster beyond the mirror by a fraction of its diameter.
    pub fn with_overfill(mut self, overfill: F) -> Self {
        self.overfill = overfill;
        self
    }
}

impl<F: Float> Default for PolarLayout<F> {
    fn default() -> Self {
        Self::new(vec![lit(11.875), lit(8.5), lit(5.25), lit(2.)])
    }
}

impl<F: Float> SampleLocator<F> for PolarLayout<F> {
    fn measurements<'a>(
        &self,
        rows: &'a [Vec<String>],
        policy: SentinelPolicy,
    ) -> RocResult<Vec<RawMeasurement<'a>>> {
        if rows.len() > self.ring_radii.len() {
            return Err(RocError::MissingRingRadius {
                rows: rows.len(),
                radii: self.ring_radii.len(),
            });
        }

        // Angular slots are assigned after dropping sentinels, so unmeasured placements do not
        // leave gaps. Unparseable tokens keep their slot.
        let measurements = rows
            .iter()
            .enumerate()
            .flat_map(|(ring, row)| {
                let kept = row
                    .iter()
                    .filter(|token| !policy.is_sentinel(token))
                    .collect_vec();
                let slots = kept.len();
                kept.into_iter()
                    .enumerate()
                    .map(move |(slot, token)| RawMeasurement {
                        index: MeasurementIndex::Ring { ring, slot, slots },
                        token: token.as_str(),
                    })
            })
            .collect_vec();
        Ok(measurements)
    }

    fn position(&self, index: MeasurementIndex) -> Option<Vector2<F>> {
        let MeasurementIndex::Ring { ring, slot, slots } = index else {
            return None;
        };
        if slot >= slots {
            return None;
        }
        let radius = *self.ring_radii.get(ring)?;
        let theta = F::two_pi() * lit(slot as f64) / lit(slots as f64);
        Some(Rotation2::new(theta) * Vector2::new(radius, F::zero()))
    }

    fn raster(&self, object_diameter: F, pixels: usize) -> RocResult<RasterGrid<F>> {
        let half_extent = object_diameter / lit(2.) * (F::one() + self.overfill / lit(2.));
        let pixels = lit::<F>(pixels as f64) * (F::one() + self.overfill);
        let pixels = num_traits::ToPrimitive::to_usize(&pixels.floor()).unwrap_or(0);
        RasterGrid::symmetric(half_extent, pixels)
    }

    fn length_scale(&self) -> F {
        F::one()
    }

    fn mirror_center(&self) -> Vector2<F> {
        Vector2::zeros()
    }

    fn default_pixels(&self) -> usize {
        256
    }

    fn default_object_diameter(&self) -> F {
        lit(32.)
    }

    fn default_smoother(&self) -> SurfaceSmoother<F> {
        SurfaceSmoother::new(lit(7.), 7)
    }

    fn validate(&self) -> RocResult<()> {
        if let Some(radius) = self
            .ring_radii
            .iter()
            .find(|r| !(r.is_finite() && **r >= F::zero()))
        {
            return Err(RocError::InvalidParameter(format!(
                "ring radius must be non-negative, got {radius:?}"
            )));
        }
        if !(self.overfill.is_finite() && self.overfill >= F::zero()) {
            return Err(RocError::InvalidParameter(format!(
                "overfill must be non-negative, got {:?}",
                self.overfill
            )));
        }
        Ok(())
    }
}
