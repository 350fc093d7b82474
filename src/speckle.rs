//! Monte-Carlo synthesis of speckle fields.
//!
//! A rough source of width `D` is modelled as `N` point scatterers with uniformly random positions and phases.
//! Each scatterer emits a spherical wavelet and the field on the observation grid, a distance `z` away,
//! is their coherent sum.

use std::f64::consts::PI;

use ndarray::{Array1, Zip};
use num_complex::Complex;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Stage};
use crate::grid::SamplingGrid;
use crate::units::Length;
use crate::{wavelet, Field};

/// Scaling applied to the sum of scatterer contributions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Divide by `N`, the Monte-Carlo mean of the contributions. Intensity falls as `1/N`.
    ScattererCount,
    /// Divide by `sqrt(N)`. A sum of random phasors then has an intensity that does not depend on `N`.
    RootScattererCount,
}

impl Default for Normalization {
    fn default() -> Self {
        Normalization::ScattererCount
    }
}

impl Normalization {
    fn factor(self, scatterers: usize) -> f64 {
        match self {
            Normalization::ScattererCount => 1.0 / scatterers as f64,
            Normalization::RootScattererCount => 1.0 / (scatterers as f64).sqrt(),
        }
    }
}

/// Parameters of the scattering source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeckleSource {
    /// Width of the illuminated source, scatterers are drawn from `[-size/2, size/2]`.
    pub source_size: Length,
    /// Distance from the source to the plane the field is sampled on.
    pub distance: Length,
    pub wavelength: Length,
    /// Coherence length of the rough surface, zero for ideal uncorrelated speckle.
    pub correlation_length: Length,
    pub scatterers: usize,
    pub normalization: Normalization,
}

struct Resolved {
    source_size: f64,
    distance: f64,
    wavenumber: f64,
    correlation_length: f64,
}

impl SpeckleSource {
    pub fn validate(&self) -> Result<()> {
        self.resolve().map(|_| ())
    }

    fn resolve(&self) -> Result<Resolved> {
        if self.scatterers == 0 {
            return Err(Error::invalid(
                Stage::Synthesis,
                "scatterer count",
                self.scatterers,
                "must be positive",
            ));
        }
        let wavelength = self.wavelength.positive_cm(Stage::Synthesis, "wavelength")?;
        Ok(Resolved {
            source_size: self.source_size.positive_cm(Stage::Synthesis, "source size")?,
            distance: self.distance.positive_cm(Stage::Synthesis, "distance")?,
            wavenumber: 2.0 * PI / wavelength,
            correlation_length: self
                .correlation_length
                .non_negative_cm(Stage::Synthesis, "correlation length")?,
        })
    }
}

/// Draws one realization of the speckle field on `grid`.
///
/// Every scatterer adds `exp(i(k(r - z) + φ)) / r` at each grid point, `r` being its distance to the point.
/// With a non-zero correlation length `ℓ` the wavelet is further weighted by `exp(-((x - s)/ℓ)²)`.
/// Each call consumes randomness from `rng`, so a seeded generator reproduces the field exactly.
pub fn synthesize<R: Rng + ?Sized>(
    source: &SpeckleSource,
    grid: &SamplingGrid,
    rng: &mut R,
) -> Result<Field> {
    let p = source.resolve()?;
    let x = grid.positions();
    let mut values = Array1::<Complex<f64>>::zeros(grid.len());

    let half_size = 0.5 * p.source_size;
    for _ in 0..source.scatterers {
        let scatterer = rng.gen_range(-half_size..=half_size);
        let emission = Complex::from_polar(1.0, rng.gen_range(-PI..=PI));

        Zip::from(&mut values).and(&x).for_each(|e, &x| {
            let offset = x - scatterer;
            let mut contribution = wavelet(p.wavenumber, p.distance, offset) * emission;
            if p.correlation_length > 0.0 {
                let u = offset / p.correlation_length;
                contribution *= (-u * u).exp();
            }
            *e += contribution;
        });
    }

    let scale = source.normalization.factor(source.scatterers);
    values.mapv_inplace(|e| e * scale);

    Field::new(values, *grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn source(scatterers: usize, normalization: Normalization) -> SpeckleSource {
        SpeckleSource {
            source_size: Length::cm(0.5),
            distance: Length::cm(15.0),
            wavelength: Length::nm(500.0),
            correlation_length: Length::zero(),
            scatterers,
            normalization,
        }
    }

    fn grid() -> SamplingGrid {
        SamplingGrid::new(Length::cm(2.0), Length::cm(0.01)).unwrap()
    }

    fn mean_intensity(source: &SpeckleSource, realizations: u64) -> f64 {
        let grid = grid();
        let total: f64 = (0..realizations)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                synthesize(source, &grid, &mut rng).unwrap().mean_intensity()
            })
            .sum();
        total / realizations as f64
    }

    #[test]
    fn field_matches_grid() {
        let grid = grid();
        let mut rng = StdRng::seed_from_u64(1);
        let field = synthesize(&source(50, Normalization::default()), &grid, &mut rng).unwrap();
        assert_eq!(field.values.len(), grid.len());
        assert_eq!(field.grid, grid);
        assert!(field.values.iter().all(|e| e.re.is_finite() && e.im.is_finite()));
    }

    #[test]
    fn seeded_generators_reproduce_fields() {
        let grid = grid();
        let source = source(200, Normalization::default());
        let a = synthesize(&source, &grid, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = synthesize(&source, &grid, &mut StdRng::seed_from_u64(9)).unwrap();
        let c = synthesize(&source, &grid, &mut StdRng::seed_from_u64(10)).unwrap();
        assert_eq!(a.values, b.values);
        assert_ne!(a.values, c.values);
    }

    #[test]
    fn mean_intensity_is_independent_of_scatterer_count() {
        let few = mean_intensity(&source(1000, Normalization::RootScattererCount), 20);
        let many = mean_intensity(&source(5000, Normalization::RootScattererCount), 20);
        assert!(
            (few - many).abs() / many < 0.1,
            "1000 scatterers: {}, 5000 scatterers: {}",
            few,
            many
        );
        // random phasor sum, <|E|²> = <1/r²> ≈ 1/z²
        let expected = 1.0 / (15.0 * 15.0);
        assert!((many - expected).abs() / expected < 0.1);
    }

    #[test]
    fn mean_normalization_scales_intensity_by_count() {
        let n = 400;
        let mean = mean_intensity(&source(n, Normalization::ScattererCount), 10);
        let root = mean_intensity(&source(n, Normalization::RootScattererCount), 10);
        assert!((mean * n as f64 - root).abs() / root < 1e-9);
    }

    #[test]
    fn correlation_length_localises_wavelets() {
        let grid = grid();
        let mut s = source(500, Normalization::RootScattererCount);
        s.correlation_length = Length::um(500.0);
        let field = synthesize(&s, &grid, &mut StdRng::seed_from_u64(3)).unwrap();
        let intensity = field.intensity();
        let centre: f64 = intensity.iter().skip(90).take(21).sum();
        // the source spans |x| <= 0.25 cm, the edges of the grid sit 15 correlation lengths away
        assert!(centre > 0.0);
        assert!(intensity[0] < 1e-30 && intensity[grid.len() - 1] < 1e-30);
    }

    #[test]
    fn invalid_sources_are_rejected() {
        let grid = grid();
        let mut rng = StdRng::seed_from_u64(0);

        let err = synthesize(&source(0, Normalization::default()), &grid, &mut rng).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let mut s = source(10, Normalization::default());
        s.distance = Length::cm(0.0);
        assert!(synthesize(&s, &grid, &mut rng).is_err());

        let mut s = source(10, Normalization::default());
        s.correlation_length = Length::um(-1.0);
        assert!(s.validate().is_err());
    }
}
