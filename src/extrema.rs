use ndarray::{s, ArrayView1};

use crate::error::{Error, Result, Stage};

/// Indices of the local maxima and minima of a sampled curve, in increasing order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extrema {
    pub maxima: Vec<usize>,
    pub minima: Vec<usize>,
}

impl Extrema {
    pub fn len(&self) -> usize {
        self.maxima.len() + self.minima.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maxima.is_empty() && self.minima.is_empty()
    }

    /// All extrema in increasing index order.
    pub fn indices(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self.maxima.iter().chain(&self.minima).copied().collect();
        all.sort_unstable();
        all
    }
}

/// Finds the extrema of `values`, sampled every `step` cm, that are extremal within `tolerance` cm around them.
///
/// A sample is a maximum if it equals the maximum of its neighbourhood `[i - h, i + h]`, `h = round(tolerance/(2·step))`,
/// and otherwise a minimum if it equals the minimum. Plateaus are therefore reported as maxima. After an extremum the
/// search skips `h` samples ahead. Samples closer than `h` to either end have a truncated neighbourhood and are
/// never reported.
pub fn find_extrema(values: ArrayView1<f64>, step: f64, tolerance: f64) -> Result<Extrema> {
    if !(step.is_finite() && step > 0.0) {
        return Err(Error::invalid(
            Stage::Analysis,
            "extremum step",
            step,
            "must be positive and finite",
        ));
    }
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return Err(Error::invalid(
            Stage::Analysis,
            "extremum tolerance",
            tolerance,
            "must be positive and finite",
        ));
    }
    let h = ((tolerance / (2.0 * step)).round() as usize).max(1);

    let n = values.len();
    let mut extrema = Extrema::default();
    let mut i = h;
    while i + h < n {
        let window = values.slice(s![i - h..=i + h]);
        let v = values[i];
        let max = window.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
        let min = window.fold(f64::INFINITY, |m, &x| m.min(x));
        if v == max {
            extrema.maxima.push(i);
            i += h;
        } else if v == min {
            extrema.minima.push(i);
            i += h;
        } else {
            i += 1;
        }
    }
    Ok(extrema)
}
