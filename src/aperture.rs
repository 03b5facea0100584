//! Valid region of the mirror surface.

use nalgebra::Vector2;
use ndarray::Array2;

use crate::raster::RasterGrid;
use crate::{Float, lit};

/// Annular clear aperture, excluding the central obstruction and the outer edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearAperture<F: Float> {
    /// Outer diameter of the clear aperture.
    pub outer_diameter: F,
    /// Inner diameter of the clear aperture.
    pub inner_diameter: F,
}

impl<F: Float> ClearAperture<F> {
    /// Create a new instance.
    pub fn new(outer_diameter: F, inner_diameter: F) -> Self {
        Self {
            outer_diameter,
            inner_diameter,
        }
    }
}

impl<F: Float> Default for ClearAperture<F> {
    fn default() -> Self {
        Self::new(lit(30.), lit(3.))
    }
}

/// Region of the raster considered part of the optical surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ApertureShape<F: Float> {
    /// All cells closer than `radius` to `center`.
    Disk {
        /// Center, in raster units.
        center: Vector2<F>,
        /// Radius, in raster units.
        radius: F,
    },
    /// All cells closer than `outer_radius` and farther than `inner_radius` from `center`.
    Annulus {
        /// Center, in raster units.
        center: Vector2<F>,
        /// Outer radius, in raster units.
        outer_radius: F,
        /// Inner radius, in raster units.
        inner_radius: F,
    },
}

impl<F: Float> ApertureShape<F> {
    /// The full mirror disk.
    pub fn disk(center: Vector2<F>, radius: F) -> Self {
        ApertureShape::Disk { center, radius }
    }

    /// A clear aperture around `center`, with diameters scaled by `length_scale` into raster units.
    pub fn clear(center: Vector2<F>, aperture: &ClearAperture<F>, length_scale: F) -> Self {
        ApertureShape::Annulus {
            center,
            outer_radius: aperture.outer_diameter / lit(2.) * length_scale,
            inner_radius: aperture.inner_diameter / lit(2.) * length_scale,
        }
    }

    /// Whether `point` lies inside the aperture.
    pub fn contains(&self, point: &Vector2<F>) -> bool {
        match *self {
            ApertureShape::Disk { center, radius } => (point - center).norm() < radius,
            ApertureShape::Annulus {
                center,
                outer_radius,
                inner_radius,
            } => {
                let distance = (point - center).norm();
                distance < outer_radius && distance > inner_radius
            }
        }
    }

    /// Boolean mask over `grid`, `true` inside the aperture.
    pub fn mask(&self, grid: &RasterGrid<F>) -> Array2<bool> {
        Array2::from_shape_fn(grid.shape(), |(i, j)| {
            self.contains(&grid.cell_center(i, j))
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Axis;

    use super::*;

    #[test]
    fn disk_mask_is_rotation_invariant() {
        let grid = RasterGrid::<f64>::symmetric(16., 65).unwrap();
        let mask = ApertureShape::disk(Vector2::zeros(), 13.3).mask(&grid);

        // rotating by 90 degrees is a transpose followed by a flip
        let mut rotated = mask.t().to_owned();
        rotated.invert_axis(Axis(0));
        assert_eq!(rotated, mask);
        assert!(mask[[32, 32]]);
        assert!(!mask[[0, 0]]);
    }

    #[test]
    fn annulus_excludes_center_and_edge() {
        let aperture = ClearAperture::default();
        let shape = ApertureShape::clear(Vector2::<f64>::zeros(), &aperture, 1.);

        assert!(!shape.contains(&Vector2::new(0., 0.)));
        assert!(!shape.contains(&Vector2::new(1.5, 0.)));
        assert!(shape.contains(&Vector2::new(1.6, 0.)));
        assert!(shape.contains(&Vector2::new(0., -14.9)));
        assert!(!shape.contains(&Vector2::new(0., 15.)));
    }

    #[test]
    fn clear_aperture_in_tile_units() {
        let shape = ApertureShape::clear(
            Vector2::new(5., 5.),
            &ClearAperture::new(12., 6.),
            0.5,
        );
        assert_eq!(
            shape,
            ApertureShape::Annulus {
                center: Vector2::new(5., 5.),
                outer_radius: 3.,
                inner_radius: 1.5,
            }
        );
    }

    #[test]
    fn off_center_disk() {
        let grid = RasterGrid::<f64>::tiles(10, 10).unwrap();
        let mask = ApertureShape::disk(Vector2::new(5., 5.), 28. / 2. / 3.).mask(&grid);
        assert!(mask[[50, 50]]);
        assert!(!mask[[0, 0]]);
        assert!(!mask[[99, 99]]);
        assert!(!mask[[50, 99]]);
    }
}
