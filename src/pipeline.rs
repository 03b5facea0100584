//! Main interface.

use std::path::Path;

use log::{info, warn};
use nalgebra::Vector2;
use ndarray::Array2;

use crate::accumulate::accumulate;
use crate::aperture::{ApertureShape, ClearAperture};
use crate::curvature::{CurvatureConverter, Polarity, SagUnit};
use crate::error::{RocError, RocResult};
use crate::ndarray_utils::{apply_mask, finite_abs_max, finite_mean};
use crate::raster::RasterGrid;
use crate::reader::read_rows;
use crate::sample::{GridLayout, PolarLayout, Sample, SampleLocator, SentinelPolicy};
use crate::smooth::SurfaceSmoother;
use crate::{Float, lit};

type Scatter<F> = fn(&RasterGrid<F>, &[Sample<F>], F) -> Array2<F>;

/// Results of one run, aligned cell for cell with [`raster`](SurfaceMaps::raster).
///
/// Cells without a value are NaN. Row 0 is the smallest `y` coordinate.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceMaps<F: Float> {
    /// Raster all fields live on.
    pub raster: RasterGrid<F>,
    /// Averaged sag readings, cropped to the aperture, in the declared sag unit.
    pub cropped: Array2<F>,
    /// Smoothed sag, cropped to the aperture, in the declared sag unit.
    pub smoothed: Array2<F>,
    /// Aperture mask.
    pub mask: Array2<bool>,
    /// Radius of curvature in millimeters. Infinite where the smoothed sag is zero.
    pub roc: Array2<F>,
    /// Number of readings scattered onto the raster.
    pub samples: usize,
    /// Number of readings skipped because they could not be parsed.
    pub skipped: usize,
}

impl<F: Float> SurfaceMaps<F> {
    /// Mean radius of curvature over all cells with a finite value.
    pub fn mean_roc(&self) -> Option<F> {
        finite_mean(&self.roc)
    }

    /// Number of cells with a finite radius of curvature.
    pub fn valid_cells(&self) -> usize {
        self.roc.iter().filter(|v| v.is_finite()).count()
    }

    /// Number of cells with a sag but no finite radius of curvature.
    pub fn degenerate_cells(&self) -> usize {
        self.roc
            .iter()
            .filter(|v| !v.is_missing() && !v.is_finite())
            .count()
    }

    /// Difference between the smoothed sag and `ideal_sag`.
    pub fn sag_deviation(&self, ideal_sag: F) -> Array2<F> {
        self.smoothed.mapv(|sag| sag - ideal_sag)
    }

    /// Largest absolute difference between the smoothed sag and `ideal_sag`.
    pub fn peak_deviation(&self, ideal_sag: F) -> Option<F> {
        finite_abs_max(&self.sag_deviation(ideal_sag))
    }
}

/// The central struct of this library.
///
/// Holds the configuration of a run. Use this in order to build options, then process one or
/// more measurement tables with it.
/// For more details, check the crate-level documentation.
#[derive(Clone, Debug)]
pub struct Spherometer<F: Float, L: SampleLocator<F>> {
    /// Measurement layout.
    layout: L,
    /// Gauge contact circle diameter.
    footprint_diameter: F,
    /// Mirror diameter.
    object_diameter: F,
    /// Raster resolution, interpreted by the layout.
    pixels: usize,
    /// Crop to an annulus instead of the mirror disk.
    clear_aperture: Option<ClearAperture<F>>,
    /// Side of the surface the gauge rests on.
    polarity: Polarity,
    /// Unit of the readings.
    sag_unit: SagUnit,
    /// Gauge contact ball diameter.
    ball_diameter: F,
    /// Smoothing of the sag field.
    smoother: SurfaceSmoother<F>,
    /// Tokens treated as missing readings.
    sentinel: SentinelPolicy,
}

impl<F: Float> Spherometer<F, GridLayout<F>> {
    /// Readings on a square tiling of `tiling_count` by `tiling_count` tiles of edge `tile_size`.
    /// Use `with_` functions to set parameters.
    ///
    /// The table holds one row of `tiling_count²` readings in row-major order.
    /// Pixels are counted per tile.
    pub fn grid(tile_size: F, tiling_count: usize) -> Self {
        Self::new(GridLayout::new(tile_size, tiling_count))
    }

    /// Set the mirror center, in tile units.
    pub fn with_mirror_center(mut self, center: Vector2<F>) -> Self {
        self.layout = self.layout.with_mirror_center(center);
        self
    }
}

impl<F: Float> Spherometer<F, PolarLayout<F>> {
    /// Readings on concentric rings, one table row per ring radius.
    /// Use `with_` functions to set parameters.
    ///
    /// Pixels are counted per raster axis.
    pub fn polar(ring_radii: Vec<F>) -> Self {
        Self::new(PolarLayout::new(ring_radii))
    }

    /// Enlarge the raster beyond the mirror by a fraction of its diameter.
    pub fn with_overfill(mut self, overfill: F) -> Self {
        self.layout = self.layout.with_overfill(overfill);
        self
    }
}

impl<F, L> Spherometer<F, L>
where
    F: Float,
    L: SampleLocator<F>,
{
    /// Create a new instance using the defaults of `layout`.
    /// This allows for using a generic [`SampleLocator`].
    /// For the built-in layouts, use [`grid`](Spherometer::grid()) or
    /// [`polar`](Spherometer::polar()).
    pub fn new(layout: L) -> Self {
        Self {
            footprint_diameter: lit(11.5),
            object_diameter: layout.default_object_diameter(),
            pixels: layout.default_pixels(),
            clear_aperture: None,
            polarity: Polarity::default(),
            sag_unit: SagUnit::default(),
            ball_diameter: lit(0.25),
            smoother: layout.default_smoother(),
            sentinel: SentinelPolicy::default(),
            layout,
        }
    }

    /// Set the gauge contact circle diameter, in inches.
    pub fn with_footprint_diameter(mut self, diameter: F) -> Self {
        self.footprint_diameter = diameter;
        self
    }

    /// Set the mirror diameter.
    pub fn with_object_diameter(mut self, diameter: F) -> Self {
        self.object_diameter = diameter;
        self
    }

    /// Set the raster resolution.
    pub fn with_pixels(mut self, pixels: usize) -> Self {
        self.pixels = pixels;
        self
    }

    /// Crop to the given clear aperture instead of the mirror disk.
    pub fn with_clear_aperture(mut self, aperture: ClearAperture<F>) -> Self {
        self.clear_aperture = Some(aperture);
        self
    }

    /// Crop to the default clear aperture, or back to the mirror disk.
    pub fn with_crop_clear_aperture(mut self, crop: bool) -> Self {
        self.clear_aperture = crop.then(ClearAperture::default);
        self
    }

    /// Set the side of the surface the gauge rests on.
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Set the unit of the readings.
    pub fn with_sag_unit(mut self, sag_unit: SagUnit) -> Self {
        self.sag_unit = sag_unit;
        self
    }

    /// Set the gauge contact ball diameter, in inches.
    pub fn with_ball_diameter(mut self, diameter: F) -> Self {
        self.ball_diameter = diameter;
        self
    }

    /// Set the smoothing of the sag field.
    pub fn with_smoother(mut self, smoother: SurfaceSmoother<F>) -> Self {
        self.smoother = smoother;
        self
    }

    /// Set which tokens count as missing readings.
    pub fn with_sentinel_policy(mut self, sentinel: SentinelPolicy) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// The measurement layout.
    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Footprint radius in raster units.
    pub fn footprint_radius(&self) -> F {
        self.footprint_diameter / lit(2.) * self.layout.length_scale()
    }

    /// Aperture in raster units.
    pub fn aperture(&self) -> ApertureShape<F> {
        let scale = self.layout.length_scale();
        let center = self.layout.mirror_center();
        match &self.clear_aperture {
            Some(aperture) => ApertureShape::clear(center, aperture, scale),
            None => ApertureShape::disk(center, self.object_diameter / lit(2.) * scale),
        }
    }

    /// Sag to radius of curvature conversion for this gauge.
    pub fn converter(&self) -> CurvatureConverter<F> {
        CurvatureConverter::new(self.footprint_diameter, self.polarity, self.sag_unit)
            .with_ball_diameter(self.ball_diameter)
    }

    /// Check the whole configuration.
    ///
    /// Every processing function calls this before touching any data.
    pub fn validate(&self) -> RocResult<()> {
        if self.pixels == 0 {
            return Err(RocError::InvalidPixelCount);
        }
        self.layout.validate()?;
        if !(self.object_diameter.is_finite() && self.object_diameter > F::zero()) {
            return Err(RocError::InvalidParameter(format!(
                "object diameter must be positive, got {:?}",
                self.object_diameter
            )));
        }
        if let Some(aperture) = &self.clear_aperture {
            let ClearAperture {
                outer_diameter,
                inner_diameter,
            } = *aperture;
            if !(inner_diameter >= F::zero() && outer_diameter > inner_diameter) {
                return Err(RocError::InvalidParameter(format!(
                    "clear aperture needs 0 <= inner < outer diameter, got {inner_diameter:?} and {outer_diameter:?}"
                )));
            }
        }
        self.converter().validate()?;
        self.smoother.validate()
    }

    /// Process a measurement table.
    pub fn process_rows(&self, rows: &[Vec<String>]) -> RocResult<SurfaceMaps<F>> {
        self.run(rows, accumulate)
    }

    /// Read and process a measurement file.
    pub fn process_file<P: AsRef<Path>>(&self, path: P) -> RocResult<SurfaceMaps<F>> {
        self.validate()?;
        let rows = read_rows(path)?;
        self.process_rows(&rows)
    }

    fn run(&self, rows: &[Vec<String>], scatter: Scatter<F>) -> RocResult<SurfaceMaps<F>> {
        self.validate()?;
        let raster = self.layout.raster(self.object_diameter, self.pixels)?;
        let located = self.layout.locate_rows(rows, self.sentinel)?;
        let mask = self.aperture().mask(&raster);

        info!(
            "Scattering {} samples onto a {}x{} raster.",
            located.samples.len(),
            raster.len(),
            raster.len()
        );
        let mut cropped = scatter(&raster, &located.samples, self.footprint_radius());
        apply_mask(&mut cropped, mask.view());

        info!("Smoothing sag field.");
        let mut smoothed = self.smoother.smooth(cropped.view());
        apply_mask(&mut smoothed, mask.view());

        info!("Computing radius of curvature.");
        let roc = self.converter().convert(smoothed.view());

        let maps = SurfaceMaps {
            raster,
            cropped,
            smoothed,
            mask,
            roc,
            samples: located.samples.len(),
            skipped: located.skipped,
        };
        let degenerate = maps.degenerate_cells();
        if degenerate > 0 {
            warn!(
                "{} cells have zero sag and no finite radius of curvature.",
                degenerate
            );
        }
        Ok(maps)
    }
}

#[cfg(feature = "parallel")]
mod parallel {
    use super::*;
    use crate::accumulate::accumulate_par;

    impl<F, L> Spherometer<F, L>
    where
        F: Float,
        L: SampleLocator<F>,
    {
        /// Process a measurement table, scattering the readings in parallel.
        ///
        /// Also see [`process_rows`](Spherometer::process_rows()) for more details.
        pub fn process_rows_par(&self, rows: &[Vec<String>]) -> RocResult<SurfaceMaps<F>> {
            self.run(rows, accumulate_par)
        }

        /// Read and process a measurement file, scattering the readings in parallel.
        ///
        /// Also see [`process_file`](Spherometer::process_file()) for more details.
        pub fn process_file_par<P: AsRef<Path>>(&self, path: P) -> RocResult<SurfaceMaps<F>> {
            self.validate()?;
            let rows = read_rows(path)?;
            self.process_rows_par(&rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use itertools::Itertools;

    use super::*;
    use crate::smooth::HolePolicy;

    fn row(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn reference_roc() -> f64 {
        25.4 * ((11.5f64.powi(2) / 4. + 0.076f64.powi(2)) / (2. * 0.076) + 0.125)
    }

    #[test]
    fn uniform_grid() {
        let rows = vec![row(&["0.076"; 9])];
        let maps = Spherometer::<f64, _>::grid(3., 3)
            .with_footprint_diameter(11.5)
            .with_object_diameter(28.)
            .process_rows(&rows)
            .unwrap();

        assert_eq!(maps.samples, 9);
        assert_eq!(maps.cropped.dim(), (30, 30));
        assert!(maps.mask.iter().all(|&inside| inside));
        for ((sag, smoothed), roc) in maps.cropped.iter().zip(&maps.smoothed).zip(&maps.roc) {
            assert_eq!(*sag, 0.076);
            assert_abs_diff_eq!(*smoothed, 0.076, epsilon = 1e-15);
            assert_relative_eq!(*roc, reference_roc(), max_relative = 1e-9);
        }
        assert_relative_eq!(maps.mean_roc().unwrap(), reference_roc(), max_relative = 1e-9);
        assert_eq!(maps.degenerate_cells(), 0);
        assert_eq!(maps.valid_cells(), 900);
    }

    #[test]
    fn grid_crops_to_mirror() {
        let rows = vec![row(&["0.08"; 100])];
        let maps = Spherometer::<f64, _>::grid(3., 10).process_rows(&rows).unwrap();
        let expected = ApertureShape::disk(Vector2::new(5., 5.), 14. * (1. / 3.)).mask(&maps.raster);

        assert_eq!(maps.mask, expected);
        for ((inside, sag), roc) in maps.mask.iter().zip(&maps.cropped).zip(&maps.roc) {
            assert_eq!(*inside, !sag.is_nan());
            assert_eq!(*inside, !roc.is_nan());
        }
    }

    #[test]
    fn polar_scenario() {
        let rows = vec![row(&["0.05", "0.05", "0.05", "0.05"]), row(&["", ""])];
        let spherometer = Spherometer::<f64, _>::polar(vec![5., 2.])
            .with_object_diameter(16.)
            .with_pixels(65);

        let located = spherometer
            .layout()
            .locate_rows(&rows, SentinelPolicy::default())
            .unwrap();
        let positions = located.samples.iter().map(|s| s.position).collect_vec();
        assert_eq!(positions.len(), 4);
        for (k, position) in positions.iter().enumerate() {
            let angle = std::f64::consts::FRAC_PI_2 * k as f64;
            assert_abs_diff_eq!(
                *position,
                Vector2::new(5. * angle.cos(), 5. * angle.sin()),
                epsilon = 1e-12
            );
        }

        let maps = spherometer.process_rows(&rows).unwrap();
        assert_eq!(maps.samples, 4);
        for sag in maps.cropped.iter().filter(|v| !v.is_nan()) {
            assert_eq!(*sag, 0.05);
        }
    }

    #[test]
    fn polar_overlap_is_mean_of_neighbors() {
        let rows = vec![row(&["0.04", "0.06", "0.04", "0.06"])];
        let maps = Spherometer::<f64, _>::polar(vec![5.])
            .with_footprint_diameter(8.)
            .with_object_diameter(16.)
            .with_pixels(65)
            .process_rows(&rows)
            .unwrap();

        // (2.5, 2.5) lies within the footprints at (5, 0) and (0, 5) only
        assert_eq!(maps.raster.cell_center(42, 42), Vector2::new(2.5, 2.5));
        assert_abs_diff_eq!(maps.cropped[[42, 42]], 0.05, epsilon = 1e-15);
        // (5, 0) only within its own footprint
        assert_eq!(maps.raster.cell_center(32, 52), Vector2::new(5., 0.));
        assert_eq!(maps.cropped[[32, 52]], 0.04);
        // (0, 5) only within its own footprint
        assert_eq!(maps.cropped[[52, 32]], 0.06);
    }

    #[test]
    fn clear_aperture_is_annulus() {
        let rows = vec![row(&["0.2"; 12]), row(&["0.2"; 6])];
        let maps = Spherometer::<f64, _>::polar(vec![10., 4.])
            .with_object_diameter(32.)
            .with_pixels(129)
            .with_crop_clear_aperture(true)
            .with_sag_unit(SagUnit::Millimeters)
            .process_rows(&rows)
            .unwrap();

        // center pixel sits on the origin, inside the central obstruction
        assert!(!maps.mask[[64, 64]]);
        assert!(maps.roc[[64, 64]].is_nan());
        // 14.5 from the center is within the 30 diameter clear aperture, 15.5 is not
        assert_eq!(maps.raster.cell_center(64, 122).x, 14.5);
        assert!(maps.mask[[64, 122]]);
        assert_eq!(maps.raster.cell_center(64, 126).x, 15.5);
        assert!(!maps.mask[[64, 126]]);

        let converter = CurvatureConverter::new(11.5, Polarity::Concave, SagUnit::Millimeters);
        assert_relative_eq!(
            maps.mean_roc().unwrap(),
            converter.roc(0.2),
            max_relative = 1e-9
        );
    }

    #[test]
    fn zero_readings_are_degenerate_when_kept() {
        let rows = vec![row(&["0"; 8])];
        let spherometer = Spherometer::<f64, _>::polar(vec![6.])
            .with_object_diameter(20.)
            .with_pixels(40);

        let maps = spherometer.process_rows(&rows).unwrap();
        assert_eq!(maps.samples, 0);
        assert!(maps.roc.iter().all(|v| v.is_nan()));

        let maps = spherometer
            .with_sentinel_policy(SentinelPolicy::EmptyOnly)
            .process_rows(&rows)
            .unwrap();
        assert_eq!(maps.samples, 8);
        assert!(maps.degenerate_cells() > 0);
        assert_eq!(maps.valid_cells(), 0);
        assert_eq!(maps.mean_roc(), None);
    }

    #[test]
    fn deviation_from_ideal() {
        let rows = vec![row(&["0.07", "0.08", "0.07", "0.08"])];
        let maps = Spherometer::<f64, _>::polar(vec![4.])
            .with_object_diameter(20.)
            .with_pixels(50)
            .with_smoother(SurfaceSmoother::disabled())
            .process_rows(&rows)
            .unwrap();

        let deviation = maps.sag_deviation(0.075);
        for (d, s) in deviation.iter().zip(&maps.smoothed) {
            assert_eq!(d.is_nan(), s.is_nan());
        }
        assert_abs_diff_eq!(maps.peak_deviation(0.075).unwrap(), 0.005, epsilon = 1e-12);
        assert_abs_diff_eq!(maps.peak_deviation(0.07).unwrap(), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn configuration_errors() {
        let rows = vec![row(&["0.1"])];
        assert!(matches!(
            Spherometer::<f64, _>::polar(vec![1.])
                .with_pixels(0)
                .process_rows(&rows),
            Err(RocError::InvalidPixelCount)
        ));
        assert!(matches!(
            Spherometer::<f64, _>::polar(vec![1.]).process_rows(&[row(&["0.1"]), row(&["0.1"])]),
            Err(RocError::MissingRingRadius { rows: 2, radii: 1 })
        ));
        assert!(matches!(
            Spherometer::<f64, _>::grid(3., 3)
                .with_smoother(SurfaceSmoother::new(-1., 3))
                .process_rows(&rows),
            Err(RocError::InvalidParameter(_))
        ));
        assert!(matches!(
            Spherometer::<f64, _>::polar(vec![1.])
                .with_clear_aperture(ClearAperture::new(3., 30.))
                .process_rows(&rows),
            Err(RocError::InvalidParameter(_))
        ));
        assert!(matches!(
            Spherometer::<f64, _>::grid(3., 3)
                .with_footprint_diameter(0.)
                .process_rows(&rows),
            Err(RocError::InvalidParameter(_))
        ));
    }

    #[test]
    fn propagating_holes_shrinks_smoothed_field() {
        let rows = vec![row(&["0.076"; 16])];
        let spherometer = Spherometer::<f64, _>::polar(vec![8.])
            .with_object_diameter(24.)
            .with_pixels(96);
        let normalized = spherometer.process_rows(&rows).unwrap();
        let propagated = spherometer
            .with_smoother(SurfaceSmoother::new(7., 7).with_hole_policy(HolePolicy::Propagate))
            .process_rows(&rows)
            .unwrap();

        for (a, b) in normalized.cropped.iter().zip(&propagated.cropped) {
            assert_eq!(a.is_nan(), b.is_nan());
            if !a.is_nan() {
                assert_eq!(a, b);
            }
        }
        let count = |field: &Array2<f64>| field.iter().filter(|v| !v.is_nan()).count();
        assert_eq!(count(&normalized.smoothed), count(&normalized.cropped));
        assert!(count(&propagated.smoothed) < count(&propagated.cropped));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matches_serial() {
        let rows = vec![
            row(&["0.071", "0.074", "", "0.077", "0.075", "0.072", "0.07", "0.073"]),
            row(&["0.076", "0.078", "0", "0.074", "0.075"]),
            row(&["0.08", "0.079", "0.081"]),
        ];
        let spherometer = Spherometer::<f64, _>::polar(vec![11.875, 8.5, 5.25]).with_pixels(100);
        let serial = spherometer.process_rows(&rows).unwrap();
        let parallel = spherometer.process_rows_par(&rows).unwrap();

        assert_eq!(serial.mask, parallel.mask);
        for (a, b) in serial.roc.iter().zip(&parallel.roc) {
            assert_eq!(a.is_nan(), b.is_nan());
            if !a.is_nan() {
                assert_relative_eq!(a, b, max_relative = 1e-9);
            }
        }
    }
}
