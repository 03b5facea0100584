//! Scattering of readings over the gauge footprint.
//!
//! The gauge touches the surface on a small circle, not a point, so one reading says something
//! about every raster cell under that circle. Each reading is added to all cells whose center is
//! closer than the footprint radius to the gauge position. Cells covered by several footprints
//! get the unweighted mean of all readings covering them.

use log::debug;
use ndarray::{Array2, ArrayView2, Zip};

use crate::raster::RasterGrid;
use crate::sample::Sample;
use crate::{Float, lit};

/// Per-cell running mean of the readings covering each cell.
#[derive(Clone, Debug, PartialEq)]
pub struct FootprintAccumulator<F: Float> {
    mean: Array2<F>,
    count: Array2<usize>,
}

impl<F: Float> FootprintAccumulator<F> {
    /// An accumulator without contributions.
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            mean: Array2::zeros(shape),
            count: Array2::zeros(shape),
        }
    }

    /// Add `sample` to every cell of `grid` strictly within `radius` of its position.
    ///
    /// Returns the number of cells touched.
    pub fn scatter(&mut self, grid: &RasterGrid<F>, sample: &Sample<F>, radius: F) -> usize {
        let radius_sq = radius * radius;
        let (rows, cols) = grid.window(&sample.position, radius);
        let mut touched = 0;

        for i in rows {
            for j in cols.clone() {
                let offset = grid.cell_center(i, j) - sample.position;
                if offset.norm_squared() < radius_sq {
                    let n = self.count[[i, j]] + 1;
                    let mean = &mut self.mean[[i, j]];
                    *mean += (sample.sag - *mean) / lit(n as f64);
                    self.count[[i, j]] = n;
                    touched += 1;
                }
            }
        }
        touched
    }

    /// Combine the contributions of two accumulators over the same raster.
    pub fn merge(mut self, other: Self) -> Self {
        Zip::from(&mut self.mean)
            .and(&mut self.count)
            .and(&other.mean)
            .and(&other.count)
            .for_each(|mean, count, &other_mean, &other_count| {
                if other_count == 0 {
                    return;
                }
                let total = *count + other_count;
                *mean += (other_mean - *mean) * lit(other_count as f64) / lit(total as f64);
                *count = total;
            });
        self
    }

    /// Number of readings covering each cell.
    pub fn counts(&self) -> ArrayView2<'_, usize> {
        self.count.view()
    }

    /// Number of cells covered by at least one footprint.
    pub fn covered(&self) -> usize {
        self.count.iter().filter(|&&n| n > 0).count()
    }

    /// Freeze into a sag field: the mean of each cell, or missing for uncovered cells.
    pub fn resolve(self) -> Array2<F> {
        let mut field = self.mean;
        Zip::from(&mut field)
            .and(&self.count)
            .for_each(|value, &count| {
                if count == 0 {
                    *value = F::missing();
                }
            });
        field
    }
}

/// Scatter all samples onto `grid` and resolve the mean sag of every cell.
pub fn accumulate<F: Float>(grid: &RasterGrid<F>, samples: &[Sample<F>], radius: F) -> Array2<F> {
    let mut accumulator = FootprintAccumulator::new(grid.shape());
    for sample in samples {
        let touched = accumulator.scatter(grid, sample, radius);
        if touched == 0 {
            debug!("Footprint at {:?} covers no raster cell.", sample.position);
        }
    }
    debug!(
        "{} of {} cells covered by {} footprints.",
        accumulator.covered(),
        accumulator.count.len(),
        samples.len()
    );
    accumulator.resolve()
}

#[cfg(feature = "parallel")]
pub use parallel::*;

#[cfg(feature = "parallel")]
mod parallel {
    use super::*;
    use rayon::prelude::*;

    /// Scatter all samples onto `grid` in parallel and resolve the mean sag of every cell.
    ///
    /// Every worker scatters into its own accumulator, which are merged at the end.
    /// Also see [`accumulate`] for more details.
    pub fn accumulate_par<F: Float>(
        grid: &RasterGrid<F>,
        samples: &[Sample<F>],
        radius: F,
    ) -> Array2<F> {
        let shape = grid.shape();
        let accumulator = samples
            .par_iter()
            .fold(
                || FootprintAccumulator::new(shape),
                |mut acc, sample| {
                    acc.scatter(grid, sample, radius);
                    acc
                },
            )
            .reduce(|| FootprintAccumulator::new(shape), FootprintAccumulator::merge);
        debug!(
            "{} of {} cells covered by {} footprints.",
            accumulator.covered(),
            accumulator.count.len(),
            samples.len()
        );
        accumulator.resolve()
    }
}
