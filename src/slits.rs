//! Double slit apertures and propagation of the transmitted field to the observation screen.

use std::f64::consts::PI;

use ndarray::{Array1, Zip};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Stage};
use crate::grid::SamplingGrid;
use crate::units::Length;
use crate::{wavelet, Field};

/// How the two apertures are summed on the screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Superposition {
    /// Only the interference pattern `|E1 + E2|²`.
    Combined,
    /// The interference pattern plus the profile `|E1|² + |E2|²`, the same light without the cross term.
    Separated,
}

impl Default for Superposition {
    fn default() -> Self {
        Superposition::Separated
    }
}

/// Intensities produced on the screen by one field.
#[derive(Clone, Debug)]
pub struct Composition {
    pub intensity: Array1<f64>,
    pub profile: Option<Array1<f64>>,
}

/// Two slits of equal width centred at `±separation/2`, followed by free propagation to a screen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoubleSlit {
    /// Centre to centre distance of the slits.
    pub separation: Length,
    pub width: Length,
    /// Distance from the slits to the screen.
    pub distance: Length,
    pub wavelength: Length,
}

pub(crate) struct Resolved {
    pub separation: f64,
    pub width: f64,
    pub distance: f64,
    pub wavelength: f64,
}

impl DoubleSlit {
    pub fn validate(&self) -> Result<()> {
        self.resolve().map(|_| ())
    }

    pub(crate) fn resolve(&self) -> Result<Resolved> {
        let separation = self
            .separation
            .positive_cm(Stage::Composition, "slit separation")?;
        let width = self.width.positive_cm(Stage::Composition, "slit width")?;
        if separation <= width {
            return Err(Error::invalid(
                Stage::Composition,
                "slit separation",
                self.separation,
                "slits overlap, separation must exceed the slit width",
            ));
        }
        Ok(Resolved {
            separation,
            width,
            distance: self
                .distance
                .positive_cm(Stage::Composition, "second distance")?,
            wavelength: self.wavelength.positive_cm(Stage::Composition, "wavelength")?,
        })
    }

    /// Grid indices transmitted by each slit.
    ///
    /// A slit centred at `c` keeps the samples in `[c - w/2, c + w/2)`, so it holds `round(w/dx)` samples
    /// wherever it sits on the grid. A slit that keeps nothing is a configuration error.
    pub fn apertures(&self, grid: &SamplingGrid) -> Result<[Vec<usize>; 2]> {
        let p = self.resolve()?;
        let dx = grid.step_cm();
        let eps = 1e-9 * dx;

        let mut apertures = [Vec::new(), Vec::new()];
        for (slit, centre) in [-0.5 * p.separation, 0.5 * p.separation].iter().enumerate() {
            let lower = centre - 0.5 * p.width - eps;
            let upper = centre + 0.5 * p.width - eps;
            apertures[slit] = (0..grid.len())
                .filter(|&i| {
                    let x = grid.position(i);
                    x >= lower && x < upper
                })
                .collect();
            if apertures[slit].is_empty() {
                return Err(Error::EmptyAperture {
                    slit,
                    width: self.width,
                    separation: self.separation,
                    step_cm: dx,
                });
            }
        }
        Ok(apertures)
    }

    /// Propagates the part of `field` transmitted by the slits onto `screen`.
    ///
    /// Each transmitted sample radiates the same `1/r` spherical wavelet used by the speckle synthesis,
    /// weighted by the grid step as a quadrature of the aperture integral.
    pub fn compose(
        &self,
        field: &Field,
        screen: &SamplingGrid,
        superposition: Superposition,
    ) -> Result<Composition> {
        let p = self.resolve()?;
        let apertures = self.apertures(&field.grid)?;
        let k = 2.0 * PI / p.wavelength;
        let dx = field.grid.step_cm();
        let x_screen = screen.positions();

        let propagate = |aperture: &[usize]| {
            let mut out = Array1::<Complex<f64>>::zeros(screen.len());
            for &i in aperture {
                let source = field.values[i] * dx;
                let x_slit = field.grid.position(i);
                Zip::from(&mut out).and(&x_screen).for_each(|e, &x| {
                    *e += source * wavelet(k, p.distance, x - x_slit);
                });
            }
            out
        };

        let composition = match superposition {
            Superposition::Combined => {
                let all: Vec<usize> = apertures.iter().flatten().copied().collect();
                Composition {
                    intensity: propagate(&all).mapv(|e| e.norm_sqr()),
                    profile: None,
                }
            }
            Superposition::Separated => {
                let first = propagate(&apertures[0]);
                let second = propagate(&apertures[1]);
                let mut intensity = Array1::<f64>::zeros(screen.len());
                let mut profile = Array1::<f64>::zeros(screen.len());
                Zip::from(&mut intensity)
                    .and(&mut profile)
                    .and(&first)
                    .and(&second)
                    .for_each(|i, incoherent, a, b| {
                        *i = (a + b).norm_sqr();
                        *incoherent = a.norm_sqr() + b.norm_sqr();
                    });
                Composition {
                    intensity,
                    profile: Some(profile),
                }
            }
        };
        Ok(composition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn slits(separation: Length, width: Length) -> DoubleSlit {
        DoubleSlit {
            separation,
            width,
            distance: Length::cm(1e4),
            wavelength: Length::nm(500.0),
        }
    }

    fn source_grid() -> SamplingGrid {
        SamplingGrid::new(Length::cm(4.0), Length::cm(0.01)).unwrap()
    }

    fn screen() -> SamplingGrid {
        SamplingGrid::new(Length::cm(20.0), Length::cm(0.05)).unwrap()
    }

    fn uniform_field() -> Field {
        let grid = source_grid();
        Field::new(Array1::from_elem(grid.len(), Complex::new(1.0, 0.0)), grid).unwrap()
    }

    #[test]
    fn apertures_hold_width_over_step_samples() {
        let grid = source_grid();
        let [left, right] = slits(Length::mm(4.0), Length::mm(1.0))
            .apertures(&grid)
            .unwrap();
        assert_eq!(left.len(), 10);
        assert_eq!(right.len(), 10);
        let separation = grid.position(right[0]) - grid.position(left[0]);
        assert!((separation - 0.4).abs() < 1e-9);
    }

    #[test]
    fn slits_narrower_than_the_grid_step_are_rejected() {
        let field = uniform_field();
        // both slit windows fall between grid samples
        let err = slits(Length::mm(4.05), Length::um(10.0))
            .compose(&field, &screen(), Superposition::Separated)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        match err {
            Error::EmptyAperture { slit, .. } => assert_eq!(slit, 0),
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn slits_outside_the_grid_are_rejected() {
        let err = slits(Length::cm(10.0), Length::mm(1.0))
            .apertures(&source_grid())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyAperture { .. }));
    }

    #[test]
    fn overlapping_slits_are_rejected() {
        assert!(slits(Length::mm(1.0), Length::mm(1.0)).validate().is_err());
    }

    #[test]
    fn coherent_illumination_gives_full_contrast_fringes() {
        let field = uniform_field();
        let screen = screen();
        let Composition { intensity, profile } = slits(Length::mm(4.0), Length::mm(1.0))
            .compose(&field, &screen, Superposition::Separated)
            .unwrap();
        let profile = profile.unwrap();
        let centre = screen.len() / 2;

        // bright central fringe with twice the incoherent profile
        let ratio = intensity[centre] / profile[centre];
        assert!((ratio - 2.0).abs() < 1e-3, "{}", ratio);

        // fringe period λz/d = 1.25 cm, the first dark fringe sits half a period out
        let darkest = screen
            .positions()
            .iter()
            .enumerate()
            .filter(|(_, &x)| x >= 0.5 && x <= 0.75)
            .map(|(i, _)| intensity[i] / profile[i])
            .fold(f64::INFINITY, f64::min);
        assert!(darkest < 0.02, "{}", darkest);
    }

    #[test]
    fn combined_mode_matches_separated_intensity() {
        let field = uniform_field();
        let screen = screen();
        let slits = slits(Length::mm(4.0), Length::mm(1.0));
        let combined = slits
            .compose(&field, &screen, Superposition::Combined)
            .unwrap();
        let separated = slits
            .compose(&field, &screen, Superposition::Separated)
            .unwrap();
        assert!(combined.profile.is_none());
        for (a, b) in combined.intensity.iter().zip(separated.intensity.iter()) {
            assert!((a - b).abs() <= 1e-12 * b.abs().max(1e-30));
        }
    }
}
