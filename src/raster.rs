//! Regular raster of cell centers the readings are scattered onto.

use std::ops::Range;

use nalgebra::Vector2;
use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{RocError, RocResult};
use crate::{Float, lit};

/// Square raster of cell centers.
///
/// Both axes share the same coordinates. Row `i` lies at `y[i]`, column `j` at `x[j]`,
/// so `field[[i, j]]` is the value at `(x[j], y[i])`.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterGrid<F: Float> {
    axis: Array1<F>,
}

impl<F: Float> RasterGrid<F> {
    /// `pixels` evenly spaced coordinates from `min` to `max`, both included.
    pub fn new(min: F, max: F, pixels: usize) -> RocResult<Self> {
        if pixels == 0 {
            return Err(RocError::InvalidPixelCount);
        }
        Ok(Self {
            axis: linspace(min, max, pixels),
        })
    }

    /// Raster centered on the origin, spanning `[-half_extent, half_extent]`.
    pub fn symmetric(half_extent: F, pixels: usize) -> RocResult<Self> {
        Self::new(-half_extent, half_extent, pixels)
    }

    /// Raster in tile units, spanning `[0, tiling_count]` with `pixels_per_tile` pixels per tile.
    pub fn tiles(tiling_count: usize, pixels_per_tile: usize) -> RocResult<Self> {
        Self::new(
            F::zero(),
            lit(tiling_count as f64),
            tiling_count * pixels_per_tile,
        )
    }

    /// Number of pixels per axis.
    pub fn len(&self) -> usize {
        self.axis.len()
    }

    /// Always `false`, a raster has at least one pixel.
    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }

    /// Shape `(rows, cols)` of every field on this raster.
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.len())
    }

    /// Column coordinates.
    pub fn x(&self) -> ArrayView1<'_, F> {
        self.axis.view()
    }

    /// Row coordinates.
    pub fn y(&self) -> ArrayView1<'_, F> {
        self.axis.view()
    }

    /// Distance between neighboring cell centers, zero for a single pixel.
    pub fn spacing(&self) -> F {
        match self.len() {
            0 | 1 => F::zero(),
            n => (self.axis[n - 1] - self.axis[0]) / lit((n - 1) as f64),
        }
    }

    /// Center of the cell at `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> Vector2<F> {
        Vector2::new(self.axis[col], self.axis[row])
    }

    /// The `(X, Y)` coordinate arrays, as `meshgrid` in NumPy.
    pub fn meshgrid(&self) -> (Array2<F>, Array2<F>) {
        let xs = Array2::from_shape_fn(self.shape(), |(_, j)| self.axis[j]);
        let ys = Array2::from_shape_fn(self.shape(), |(i, _)| self.axis[i]);
        (xs, ys)
    }

    /// Euclidean distance of every cell center from `center`.
    pub fn distance_from(&self, center: &Vector2<F>) -> Array2<F> {
        Array2::from_shape_fn(self.shape(), |(i, j)| {
            (self.cell_center(i, j) - center).norm()
        })
    }

    /// Row and column index ranges of the cells that may lie within `radius` of `center`.
    ///
    /// This is a superset of the disk, padded by one cell on each side.
    /// The exact distance test is left to the caller.
    pub fn window(&self, center: &Vector2<F>, radius: F) -> (Range<usize>, Range<usize>) {
        let cols = self.axis_window(center.x, radius);
        let rows = self.axis_window(center.y, radius);
        (rows, cols)
    }

    fn axis_window(&self, at: F, radius: F) -> Range<usize> {
        let n = self.len();
        let step = self.spacing();
        if step <= F::zero() {
            return 0..n;
        }
        let start = self.axis[0];
        let lo = ((at - radius - start) / step).floor().to_isize().unwrap_or(isize::MIN);
        let hi = ((at + radius - start) / step).ceil().to_isize().unwrap_or(isize::MAX);
        let lo = lo.saturating_sub(1).clamp(0, n as isize) as usize;
        let hi = hi.saturating_add(2).clamp(0, n as isize) as usize;
        lo..hi.max(lo)
    }
}

fn linspace<F: Float>(min: F, max: F, n: usize) -> Array1<F> {
    if n == 1 {
        return Array1::from_elem(1, min);
    }
    let step = (max - min) / lit((n - 1) as f64);
    let mut axis = Array1::from_shape_fn(n, |i| min + step * lit(i as f64));
    axis[n - 1] = max;
    axis
}
