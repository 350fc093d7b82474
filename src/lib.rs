//! Simulation and analysis of a spatial coherence experiment.
//!
//! Speckle fields are synthesized from random scatterers ([`speckle`]), low pass filtered in the spatial frequency
//! domain ([`filter`]), passed through a double slit onto a distant screen ([`slits`]), averaged over many
//! realizations ([`ensemble`]), and the averaged fringes are analyzed for their visibility ([`analysis`]).
//!
//! All lengths are tagged with their unit ([`units`]) and converted to centimetres internally.
//! Every field and pattern carries the [`SamplingGrid`] it was sampled on.

use ndarray::Array1;
use num_complex::Complex;

pub mod analysis;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod extrema;
pub mod fft;
pub mod filter;
pub mod fit;
pub mod grid;
pub mod pattern;
pub mod records;
pub mod slits;
pub mod speckle;
pub mod units;

pub use analysis::{analyze, AnalysisSettings, Envelope, VisibilityResult};
pub use config::ExperimentConfig;
pub use ensemble::{Ensemble, EnsembleAverage, Experiment, RealizationFailure};
pub use error::{Error, ErrorKind, Result, Stage};
pub use extrema::{find_extrema, Extrema};
pub use filter::{FilterKind, SpatialFilter};
pub use fit::{FitGuess, FitOptions, FitReport, FringeModel};
pub use grid::SamplingGrid;
pub use pattern::{InterferencePattern, PatternMetadata};
pub use slits::{DoubleSlit, Superposition};
pub use speckle::{synthesize, Normalization, SpeckleSource};
pub use units::{FrequencyUnit, Length, LengthUnit, SpatialFrequency};

/// Represents a complex scalar field sampled on a 1-D grid.
///
/// The square of the field is the irradiance.
#[derive(Clone, Debug)]
pub struct Field {
    pub values: Array1<Complex<f64>>,
    pub grid: SamplingGrid,
}

impl Field {
    pub fn new(values: Array1<Complex<f64>>, grid: SamplingGrid) -> Result<Self> {
        if values.len() != grid.len() {
            return Err(Error::mismatch(
                Stage::Config,
                "field length",
                grid.len(),
                values.len(),
            ));
        }
        Ok(Field { values, grid })
    }

    pub fn intensity(&self) -> Array1<f64> {
        self.values.mapv(|v| v.norm_sqr())
    }

    pub fn mean_intensity(&self) -> f64 {
        self.values.iter().fold(0.0, |sum, &v| sum + v.norm_sqr()) / self.values.len() as f64
    }
}

/// Spherical wavelet seen at transverse `offset` on a plane a distance `z` from its source, for wavenumber `k`.
///
/// The amplitude falls as `1/r`. This weighting is shared by synthesis and composition, so both stages propagate
/// light the same way. The phase drops the common `k·z` term and evaluates `r - z` as `ρ²/(r + z)`.
pub(crate) fn wavelet(k: f64, z: f64, offset: f64) -> Complex<f64> {
    let rho2 = offset * offset;
    let r = (rho2 + z * z).sqrt();
    //let theta = k * (r - z); // numerically unstable - cancellation
    let theta = k * (rho2 / (r + z)); // stable
    Complex::from_polar(1.0 / r, theta)
}
