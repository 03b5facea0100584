//! Gaussian smoothing of sag fields with holes.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};

use crate::error::{RocError, RocResult};
use crate::ndarray_utils::reflect_index;
use crate::{Float, lit};

/// How cells without a value take part in the convolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HolePolicy {
    /// Holes carry no weight, every valid cell becomes the weighted mean of the valid cells
    /// under the kernel. Holes stay holes.
    #[default]
    Normalize,
    /// Plain convolution: a hole anywhere under the kernel makes the result a hole.
    Propagate,
}

/// Separable Gaussian filter with a fixed truncation radius.
///
/// Edges are handled by mirroring the field (`d c b a | a b c d | d c b a`).
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceSmoother<F: Float> {
    /// Standard deviation of the kernel, in pixels.
    pub sigma: F,
    /// Truncation radius of the kernel, in pixels.
    pub radius: usize,
    /// Treatment of cells without a value.
    pub holes: HolePolicy,
}

impl<F: Float> SurfaceSmoother<F> {
    /// Create a new instance using hole-aware normalization.
    pub fn new(sigma: F, radius: usize) -> Self {
        Self {
            sigma,
            radius,
            holes: HolePolicy::default(),
        }
    }

    /// A smoother that leaves fields untouched.
    pub fn disabled() -> Self {
        Self::new(F::zero(), 0)
    }

    /// Set the hole policy.
    pub fn with_hole_policy(mut self, holes: HolePolicy) -> Self {
        self.holes = holes;
        self
    }

    /// Check the kernel parameters.
    pub fn validate(&self) -> RocResult<()> {
        if !(self.sigma.is_finite() && self.sigma >= F::zero()) {
            return Err(RocError::InvalidParameter(format!(
                "smoothing sigma must be non-negative, got {:?}",
                self.sigma
            )));
        }
        Ok(())
    }

    /// Whether smoothing leaves every field unchanged.
    pub fn is_identity(&self) -> bool {
        self.sigma == F::zero() || self.radius == 0
    }

    /// Normalized one-dimensional kernel of length `2 * radius + 1`.
    pub fn kernel(&self) -> Array1<F> {
        if self.is_identity() {
            return Array1::ones(1);
        }
        let r = self.radius as isize;
        let mut kernel = Array1::from_iter((-r..=r).map(|t| {
            let x = lit::<F>(t as f64) / self.sigma;
            (-x * x / lit(2.)).exp()
        }));
        let sum = kernel.sum();
        kernel.mapv_inplace(|w| w / sum);
        kernel
    }

    /// Smooth `field`.
    pub fn smooth(&self, field: ArrayView2<F>) -> Array2<F> {
        if self.is_identity() {
            return field.to_owned();
        }
        let kernel = self.kernel();

        match self.holes {
            HolePolicy::Propagate => {
                let rows = convolve_axis(field, kernel.view(), Axis(0));
                convolve_axis(rows.view(), kernel.view(), Axis(1))
            }
            HolePolicy::Normalize => {
                let values = field.mapv(|v| if v.is_missing() { F::zero() } else { v });
                let weights = field.mapv(|v| if v.is_missing() { F::zero() } else { F::one() });

                let values = convolve_axis(values.view(), kernel.view(), Axis(0));
                let values = convolve_axis(values.view(), kernel.view(), Axis(1));
                let weights = convolve_axis(weights.view(), kernel.view(), Axis(0));
                let weights = convolve_axis(weights.view(), kernel.view(), Axis(1));

                let mut smoothed = values;
                Zip::from(&mut smoothed)
                    .and(&weights)
                    .and(field)
                    .for_each(|value, &weight, &original| {
                        if original.is_missing() || weight <= F::zero() {
                            *value = F::missing();
                        } else {
                            *value /= weight;
                        }
                    });
                smoothed
            }
        }
    }
}

/// Convolve every lane of `field` along `axis` with a centered kernel.
fn convolve_axis<F: Float>(field: ArrayView2<F>, kernel: ArrayView1<F>, axis: Axis) -> Array2<F> {
    let mut out = Array2::zeros(field.raw_dim());
    let radius = (kernel.len() / 2) as isize;

    let zip = Zip::from(out.lanes_mut(axis)).and(field.lanes(axis));
    let convolve_lane = |mut out: ndarray::ArrayViewMut1<F>, lane: ArrayView1<F>| {
        let len = lane.len();
        for (k, o) in out.iter_mut().enumerate() {
            *o = kernel
                .iter()
                .enumerate()
                .fold(F::zero(), |acc, (t, &w)| {
                    let source = reflect_index(k as isize + t as isize - radius, len);
                    acc + w * lane[source]
                });
        }
    };

    #[cfg(feature = "parallel")]
    zip.par_for_each(convolve_lane);
    #[cfg(not(feature = "parallel"))]
    zip.for_each(convolve_lane);

    out
}
