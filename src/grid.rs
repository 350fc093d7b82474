use std::f64::consts::PI;
use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Stage};
use crate::units::Length;

/// Uniform 1-D sampling symmetric about zero.
///
/// A grid of extent `L` and step `dx` holds `L/dx + 1` samples at `x_i = (i - (n - 1)/2) * dx`, in centimetres.
/// Every field and pattern carries the grid it was sampled on, and stages refuse to combine values from different grids.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingGrid {
    samples: usize,
    step_cm: f64,
}

impl SamplingGrid {
    pub fn new(extent: Length, step: Length) -> Result<Self> {
        let extent_cm = extent.positive_cm(Stage::Config, "grid extent")?;
        let step_cm = step.positive_cm(Stage::Config, "grid step")?;
        if step_cm > extent_cm {
            return Err(Error::invalid(
                Stage::Config,
                "grid step",
                step,
                "must not exceed the grid extent",
            ));
        }
        SamplingGrid::from_parts((extent_cm / step_cm).round() as usize + 1, step_cm)
    }

    pub fn from_parts(samples: usize, step_cm: f64) -> Result<Self> {
        if samples < 2 {
            return Err(Error::invalid(
                Stage::Config,
                "grid samples",
                samples,
                "a grid needs at least two samples",
            ));
        }
        if !(step_cm.is_finite() && step_cm > 0.0) {
            return Err(Error::invalid(
                Stage::Config,
                "grid step",
                step_cm,
                "must be positive and finite",
            ));
        }
        Ok(SamplingGrid { samples, step_cm })
    }

    pub fn len(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn step_cm(&self) -> f64 {
        self.step_cm
    }

    pub fn extent_cm(&self) -> f64 {
        (self.samples - 1) as f64 * self.step_cm
    }

    pub fn position(&self, i: usize) -> f64 {
        (i as f64 - (self.samples - 1) as f64 / 2.0) * self.step_cm
    }

    pub fn positions(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.samples, |i| self.position(i))
    }

    /// Spacing of the angular spatial frequency axis, in rad/cm.
    pub fn frequency_step(&self) -> f64 {
        2.0 * PI / (self.samples as f64 * self.step_cm)
    }

    /// Angular spatial frequency of each bin of a centred spectrum, DC at `len/2`.
    pub fn frequencies(&self) -> Array1<f64> {
        let dk = self.frequency_step();
        let half = (self.samples / 2) as f64;
        Array1::from_shape_fn(self.samples, |j| (j as f64 - half) * dk)
    }

    /// Rejects `other` unless it is this grid.
    pub(crate) fn ensure_same(&self, other: &SamplingGrid, stage: Stage) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(Error::mismatch(stage, "sampling grid", self, other))
        }
    }
}

impl fmt::Display for SamplingGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} samples at {} cm", self.samples, self.step_cm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_symmetric_about_zero() {
        let grid = SamplingGrid::new(Length::cm(4.0), Length::mm(0.1)).unwrap();
        assert_eq!(grid.len(), 401);
        let x = grid.positions();
        assert_eq!(x[200], 0.0);
        for i in 0..grid.len() {
            assert_eq!(x[i], -x[grid.len() - 1 - i]);
        }
        assert!((x[0] + 2.0).abs() < 1e-12);
        assert!((grid.extent_cm() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn even_grids_straddle_zero() {
        let grid = SamplingGrid::from_parts(4, 1.0).unwrap();
        assert_eq!(grid.positions().to_vec(), vec![-1.5, -0.5, 0.5, 1.5]);
    }

    #[test]
    fn frequency_axis_is_centred() {
        let grid = SamplingGrid::from_parts(8, 0.5).unwrap();
        let k = grid.frequencies();
        assert_eq!(k[4], 0.0);
        assert!((k[5] - 2.0 * PI / 4.0).abs() < 1e-12);
        assert!((k[0] + 4.0 * 2.0 * PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        assert!(SamplingGrid::new(Length::cm(1.0), Length::cm(2.0)).is_err());
        assert!(SamplingGrid::new(Length::cm(1.0), Length::cm(0.0)).is_err());
        assert!(SamplingGrid::from_parts(1, 0.1).is_err());
    }

    #[test]
    fn mismatched_grids_are_reported() {
        let a = SamplingGrid::from_parts(11, 0.1).unwrap();
        let b = SamplingGrid::from_parts(21, 0.1).unwrap();
        assert!(a.ensure_same(&a, Stage::Filter).is_ok());
        let err = a.ensure_same(&b, Stage::Ensemble).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ensemble: sampling grid mismatch, expected 11 samples at 0.1 cm but found 21 samples at 0.1 cm"
        );
    }
}
