//! Levenberg–Marquardt fit of the double slit fringe model.
//!
//! The averaged pattern, divided by its mean intensity `Ī`, is modelled as
//! `A · sinc²(βx) · (1 + V cos(κx))` with `β = πa/(λz)` and `κ = 2πd/(λz)` fixed by the slit geometry,
//! leaving the fringe visibility `V` and the amplitude `A` as the fitted parameters.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::slits::DoubleSlit;

/// Starting point of the fit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitGuess {
    pub visibility: f64,
    pub amplitude: f64,
}

impl Default for FitGuess {
    fn default() -> Self {
        FitGuess {
            visibility: 0.5,
            amplitude: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Relative step size below which the fit has converged.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            max_iterations: 100,
            tolerance: 1e-10,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub visibility: f64,
    pub amplitude: f64,
    pub iterations: usize,
    /// Sum of squared residuals at the solution.
    pub residual: f64,
    /// Whether the visibility landed in `[0, 1]`. Out of range values are reported as they are.
    pub in_range: bool,
}

/// Fringe model with the geometry terms resolved to `cm⁻¹`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FringeModel {
    pub beta: f64,
    pub kappa: f64,
}

impl FringeModel {
    pub fn new(slits: &DoubleSlit) -> Result<Self> {
        let p = slits.resolve()?;
        let lz = p.wavelength * p.distance;
        Ok(FringeModel {
            beta: std::f64::consts::PI * p.width / lz,
            kappa: 2.0 * std::f64::consts::PI * p.separation / lz,
        })
    }

    /// Single slit diffraction envelope `sinc²(βx)`.
    pub fn envelope(&self, x: f64) -> f64 {
        let u = self.beta * x;
        if u == 0.0 {
            1.0
        } else {
            let s = u.sin() / u;
            s * s
        }
    }

    pub fn evaluate(&self, x: f64, visibility: f64, amplitude: f64) -> f64 {
        amplitude * self.envelope(x) * (1.0 + visibility * (self.kappa * x).cos())
    }

    fn cost(&self, x: &[f64], y: &[f64], visibility: f64, amplitude: f64) -> f64 {
        x.iter()
            .zip(y)
            .map(|(&x, &y)| {
                let r = self.evaluate(x, visibility, amplitude) - y;
                r * r
            })
            .sum()
    }

    /// Fits visibility and amplitude to the points `(x, y)`, `y` already divided by the mean intensity.
    pub fn fit(
        &self,
        x: &[f64],
        y: &[f64],
        guess: FitGuess,
        options: &FitOptions,
    ) -> Result<FitReport> {
        debug_assert_eq!(x.len(), y.len());
        let mut v = guess.visibility;
        let mut a = guess.amplitude;
        let mut cost = self.cost(x, y, v, a);
        let mut lambda = 1e-3;
        let mut iterations = 0;
        if !cost.is_finite() {
            return Err(Error::FitDiverged {
                iterations,
                visibility: v,
                amplitude: a,
            });
        }

        for iteration in 1..=options.max_iterations {
            iterations = iteration;
            // normal equations JᵀJ δ = -Jᵀr
            let (mut a11, mut a12, mut a22, mut g1, mut g2) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for (&x, &y) in x.iter().zip(y) {
                let s = self.envelope(x);
                let c = (self.kappa * x).cos();
                let jv = a * s * c;
                let ja = s * (1.0 + v * c);
                let r = a * ja - y;
                a11 += jv * jv;
                a12 += jv * ja;
                a22 += ja * ja;
                g1 -= jv * r;
                g2 -= ja * r;
            }
            if a11 * a22 - a12 * a12 <= 1e-12 * a11 * a22 {
                return Err(Error::SingularFit { iteration });
            }

            loop {
                let d11 = a11 * (1.0 + lambda);
                let d22 = a22 * (1.0 + lambda);
                let det = d11 * d22 - a12 * a12;
                let dv = (g1 * d22 - g2 * a12) / det;
                let da = (g2 * d11 - g1 * a12) / det;

                let scale = v.abs() + a.abs() + options.tolerance;
                if dv.abs() + da.abs() <= options.tolerance * scale {
                    return Ok(self.report(v, a, iteration, cost));
                }

                let trial = self.cost(x, y, v + dv, a + da);
                if trial < cost {
                    v += dv;
                    a += da;
                    cost = trial;
                    lambda = (lambda * 0.1).max(1e-12);
                    break;
                }
                lambda *= 10.0;
                if !lambda.is_finite() || lambda > 1e16 {
                    // no downhill step left, the current point is the minimum
                    return Ok(self.report(v, a, iteration, cost));
                }
            }
            if !(v.is_finite() && a.is_finite()) {
                break;
            }
            debug!(iteration, visibility = v, amplitude = a, cost, "fit step");
        }

        Err(Error::FitDiverged {
            iterations,
            visibility: v,
            amplitude: a,
        })
    }

    fn report(&self, visibility: f64, amplitude: f64, iterations: usize, residual: f64) -> FitReport {
        let in_range = (0.0..=1.0).contains(&visibility);
        if !in_range {
            warn!(visibility, amplitude, "fitted visibility outside [0, 1]");
        }
        FitReport {
            visibility,
            amplitude,
            iterations,
            residual,
            in_range,
        }
    }
}
