//! Conversion of sag into radius of curvature.
//!
//! A gauge whose contact circle has diameter `D` reads the sagitta `s` of the spherical cap it
//! spans, so the sphere radius is `(D² / 4 + s²) / (2 |s|)`.
//! The gauge touches the surface with balls of diameter `b`. On a concave surface the ball
//! centers sit `b / 2` above the surface, on a convex one `b / 2` below, which shifts the
//! radius accordingly.
//! Gauge dimensions are given in inches, the radius of curvature is reported in millimeters.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2};

use crate::error::{RocError, RocResult};
use crate::{Float, lit};

/// Millimeters per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Which side of the surface the gauge rests on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Polarity {
    /// The gauge rests inside a depression.
    #[default]
    Concave,
    /// The gauge rests on a dome.
    Convex,
}

impl Polarity {
    /// Sign of the ball correction.
    fn sign<F: Float>(self) -> F {
        match self {
            Polarity::Concave => F::one(),
            Polarity::Convex => -F::one(),
        }
    }
}

/// Unit of the sag readings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SagUnit {
    /// Readings in inches.
    #[default]
    Inches,
    /// Readings in millimeters.
    Millimeters,
}

impl SagUnit {
    /// Convert a sag in this unit into inches.
    pub fn to_inches<F: Float>(self, sag: F) -> F {
        match self {
            SagUnit::Inches => sag,
            SagUnit::Millimeters => sag / lit(MM_PER_INCH),
        }
    }

    /// Convert a sag in inches into this unit.
    pub fn from_inches<F: Float>(self, sag: F) -> F {
        match self {
            SagUnit::Inches => sag,
            SagUnit::Millimeters => sag * lit(MM_PER_INCH),
        }
    }
}

impl FromStr for SagUnit {
    type Err = RocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" | "inch" | "inches" => Ok(SagUnit::Inches),
            "mm" | "millimeter" | "millimeters" => Ok(SagUnit::Millimeters),
            _ => Err(RocError::UnknownSagUnit(s.to_string())),
        }
    }
}

impl fmt::Display for SagUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SagUnit::Inches => write!(f, "in"),
            SagUnit::Millimeters => write!(f, "mm"),
        }
    }
}

/// Sag to radius of curvature conversion for one gauge.
#[derive(Clone, Debug, PartialEq)]
pub struct CurvatureConverter<F: Float> {
    /// Contact circle diameter `D`, in inches.
    pub footprint_diameter: F,
    /// Contact ball diameter `b`, in inches.
    pub ball_diameter: F,
    /// Side of the surface the gauge rests on.
    pub polarity: Polarity,
    /// Unit of the sag readings.
    pub sag_unit: SagUnit,
}

impl<F: Float> CurvatureConverter<F> {
    /// Create a new instance with quarter inch balls.
    pub fn new(footprint_diameter: F, polarity: Polarity, sag_unit: SagUnit) -> Self {
        Self {
            footprint_diameter,
            ball_diameter: lit(0.25),
            polarity,
            sag_unit,
        }
    }

    /// Set the contact ball diameter, in inches.
    pub fn with_ball_diameter(mut self, ball_diameter: F) -> Self {
        self.ball_diameter = ball_diameter;
        self
    }

    fn offset(&self) -> F {
        self.polarity.sign::<F>() * self.ball_diameter / lit(2.)
    }

    /// Radius of curvature in millimeters for a sag in the configured unit.
    ///
    /// Missing sag gives a missing radius. A sag of zero describes a flat surface and gives
    /// positive infinity.
    pub fn roc(&self, sag: F) -> F {
        if sag.is_missing() {
            return F::missing();
        }
        let sag = self.sag_unit.to_inches(sag).abs();
        if sag == F::zero() {
            return lit(f64::INFINITY);
        }
        let half_chord_sq = self.footprint_diameter.powi(2) / lit(4.);
        let radius = (half_chord_sq + sag * sag) / (lit::<F>(2.) * sag);
        lit::<F>(MM_PER_INCH) * (radius + self.offset())
    }

    /// Sag magnitude, in the configured unit, that reads as `roc` millimeters.
    ///
    /// Inverse of [`roc`](Self::roc). Returns NaN if no sphere of that radius fits the gauge.
    pub fn sag(&self, roc: F) -> F {
        if roc.is_missing() {
            return F::missing();
        }
        if !roc.is_finite() {
            return F::zero();
        }
        let radius = roc / lit(MM_PER_INCH) - self.offset();
        let half_chord_sq = self.footprint_diameter.powi(2) / lit(4.);
        let discriminant = radius * radius - half_chord_sq;
        if radius <= F::zero() || discriminant < F::zero() {
            return F::missing();
        }
        // the smaller root, the cap below the chord
        let sag = half_chord_sq / (radius + discriminant.sqrt());
        self.sag_unit.from_inches(sag)
    }

    /// Convert a whole sag field.
    pub fn convert(&self, field: ArrayView2<F>) -> Array2<F> {
        field.mapv(|sag| self.roc(sag))
    }

    /// Check the gauge dimensions.
    pub fn validate(&self) -> RocResult<()> {
        if !(self.footprint_diameter.is_finite() && self.footprint_diameter > F::zero()) {
            return Err(RocError::InvalidParameter(format!(
                "footprint diameter must be positive, got {:?}",
                self.footprint_diameter
            )));
        }
        if !(self.ball_diameter.is_finite() && self.ball_diameter >= F::zero()) {
            return Err(RocError::InvalidParameter(format!(
                "ball diameter must be non-negative, got {:?}",
                self.ball_diameter
            )));
        }
        Ok(())
    }
}
