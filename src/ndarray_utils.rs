//! A collection of various utilities needed in this library.
//! Mostly operations on fields that use NaN for cells without a value.

use ndarray::{Array2, ArrayView2, Zip};

use crate::{Float, lit};

/// Set every cell outside `mask` to missing.
pub(crate) fn apply_mask<F: Float>(field: &mut Array2<F>, mask: ArrayView2<bool>) {
    Zip::from(field).and(mask).for_each(|value, &inside| {
        if !inside {
            *value = F::missing();
        }
    });
}

/// Mean of the finite values, `None` if there are none.
pub(crate) fn finite_mean<'a, F: Float>(values: impl IntoIterator<Item = &'a F>) -> Option<F> {
    let (sum, n) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((F::zero(), 0usize), |(sum, n), &v| (sum + v, n + 1));
    (n > 0).then(|| sum / lit(n as f64))
}

/// Largest absolute finite value, `None` if there are none.
pub(crate) fn finite_abs_max<'a, F: Float>(values: impl IntoIterator<Item = &'a F>) -> Option<F> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .map(|&v| v.abs())
        .reduce(|a, b| a.max(b))
}

/// Map a possibly out of range index into `0..len` by mirroring at the edges.
///
/// The edge sample is repeated, `d c b a | a b c d | d c b a`.
pub(crate) fn reflect_index(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let i = index.rem_euclid(period);
    if i < len {
        i as usize
    } else {
        (period - 1 - i) as usize
    }
}
