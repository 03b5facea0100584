#![warn(missing_docs)]

//! Radius of curvature maps from spherometer sag readings. \
//! A spherometer gives one sag value per placement. Placements follow either a square tiling
//! of the surface or a set of concentric rings. This crate scatters every reading over the
//! contact footprint of the gauge on a regular raster, averages overlapping footprints, crops to
//! the mirror aperture, smooths, and converts the sag field into a radius of curvature field.
//!
//! ## Interface
//! The central struct of this library is [`Spherometer`]. It holds the immutable configuration of
//! one run: the measurement layout, gauge and mirror dimensions, aperture, smoothing, polarity and
//! units. \
//! In most cases, it should be created with [`Spherometer::grid()`] or [`Spherometer::polar()`],
//! but for generic contexts, any [`SampleLocator`] can be passed to [`Spherometer::new()`].
//! Additional parameters are set via `Spherometer::with_*()` functions.
//!
//! Example:
//! ```rust
//! # use spherometry::{Polarity, SagUnit, Spherometer};
//! let rows = vec![
//!     vec!["0.076".to_string(); 4],
//!     vec!["0.075".to_string(), "".to_string(), "0.077".to_string()],
//! ];
//! let maps = Spherometer::<f64, _>::polar(vec![8.5, 4.0])
//!     .with_footprint_diameter(11.5)
//!     .with_object_diameter(24.)
//!     .with_pixels(64)
//!     .with_polarity(Polarity::Concave)
//!     .with_sag_unit(SagUnit::Inches)
//!     .process_rows(&rows)
//!     .unwrap();
//! assert_eq!(maps.roc.dim(), (64, 64));
//! ```
//!
//! The result is a [`SurfaceMaps`] holding the cropped sag field, the smoothed sag field, the
//! aperture mask and the radius of curvature field. Cells without a value are NaN.
//!
//! With the `parallel` feature, [`Spherometer::process_rows_par()`] scatters the readings on
//! the rayon thread pool.
//!
//! ## Parameters
//! - `footprint_diameter`: Diameter of the gauge contact circle.
//!     Sets the footprint every reading is spread over and the `D` term of the sagitta relation.
//! - `object_diameter`: Diameter of the mirror. Sets the raster extent and the default aperture.
//! - `clear_aperture`: Crop the output to an annulus instead of the full disk (polar layouts).
//! - `polarity`: Whether the gauge rests on a concave or a convex surface.
//! - `sag_unit`: Unit of the readings, inches or millimeters. Gauge dimensions are always inches.
//! - `ball_diameter`: Diameter of the contact balls of the gauge, used for the polarity correction.
//! - `smoother`: Gaussian smoothing applied to the sag field before conversion.
//! - `sentinel`: Which tokens count as "no reading".

pub mod accumulate;
pub mod aperture;
pub mod curvature;
pub mod error;
pub(crate) mod ndarray_utils;
mod pipeline;
pub mod raster;
pub mod reader;
pub mod sample;
pub mod smooth;

pub use aperture::{ApertureShape, ClearAperture};
pub use curvature::{CurvatureConverter, Polarity, SagUnit};
pub use error::{RocError, RocResult};
pub use pipeline::{Spherometer, SurfaceMaps};
pub use raster::RasterGrid;
pub use sample::{GridLayout, PolarLayout, SampleLocator, SentinelPolicy};
pub use smooth::{HolePolicy, SurfaceSmoother};

/// Scalar type of every coordinate, sag and radius in a run, usually `f32` or `f64`.
///
/// Fields mark cells without a value with NaN, see [`Float::missing`] and [`Float::is_missing`].
/// Implemented for every type with the required `nalgebra` and `num_traits` capabilities.
pub trait Float:
    Copy + Default + nalgebra::RealField + num_traits::FromPrimitive + num_traits::ToPrimitive
{
    /// Value of a cell that carries no measurement.
    fn missing() -> Self {
        Self::from_f64(f64::NAN).unwrap()
    }

    /// Whether this value marks a cell without measurement.
    #[allow(clippy::eq_op)]
    fn is_missing(self) -> bool {
        self != self
    }
}

impl<F> Float for F where
    F: Copy + Default + nalgebra::RealField + num_traits::FromPrimitive + num_traits::ToPrimitive
{
}

/// Convert a literal into the working float type.
pub(crate) fn lit<F: Float>(value: f64) -> F {
    F::from_f64(value).unwrap()
}
