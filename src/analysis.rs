//! Visibility of the fringes in an averaged interference pattern.
//!
//! The central window of the pattern is searched for extrema, the fringe model is fitted to them, and the pattern is
//! divided by an envelope to leave only the cosine fringes. The visibility is then `(max - min)/(max + min)` of what
//! remains.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result, Stage};
use crate::extrema::{find_extrema, Extrema};
use crate::fit::{FitGuess, FitOptions, FitReport, FringeModel};
use crate::pattern::InterferencePattern;
use crate::slits::DoubleSlit;
use crate::units::Length;

/// The curve the pattern is divided by before measuring the fringe contrast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Envelope {
    /// `A·Ī·sinc²(βx)` with the fitted amplitude.
    Fitted,
    /// `sinc²(βx)` from the slit geometry alone.
    Analytic,
    /// The pattern's own no interference profile.
    Profile,
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope::Fitted
    }
}

impl Envelope {
    fn name(self) -> &'static str {
        match self {
            Envelope::Fitted => "fitted",
            Envelope::Analytic => "analytic",
            Envelope::Profile => "profile",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Only samples with `|x| <= window` are analyzed.
    pub window: Length,
    /// Extremum tolerance, the width of the neighbourhood an extremum must dominate.
    pub tolerance: Length,
    pub envelope: Envelope,
    /// Decimal places the visibility is rounded to.
    pub precision: u32,
    pub fit: FitOptions,
    pub guess: FitGuess,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            window: Length::cm(3.0),
            tolerance: Length::cm(1.0),
            envelope: Envelope::default(),
            precision: 3,
            fit: FitOptions::default(),
            guess: FitGuess::default(),
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> Result<()> {
        self.window.positive_cm(Stage::Analysis, "analysis window")?;
        self.tolerance
            .positive_cm(Stage::Analysis, "extremum tolerance")?;
        if self.precision > 15 {
            return Err(Error::invalid(
                Stage::Analysis,
                "precision",
                self.precision,
                "at most 15 decimal places are meaningful",
            ));
        }
        if self.fit.max_iterations == 0 {
            return Err(Error::invalid(
                Stage::Analysis,
                "fit iterations",
                self.fit.max_iterations,
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisibilityResult {
    /// Visibility rounded to the configured precision.
    pub visibility: f64,
    pub raw_visibility: f64,
    /// Screen positions of the analysis window.
    pub positions: Array1<f64>,
    /// The windowed pattern divided by the envelope.
    pub normalized: Array1<f64>,
    /// Extrema of the windowed pattern, indices into `positions`.
    pub extrema: Extrema,
    pub fit: FitReport,
}

/// Measures the fringe visibility of `pattern`.
///
/// `slits` must be the geometry the pattern was produced with and `average_intensity` the mean intensity of the
/// ensemble, see [`EnsembleAverage`](crate::ensemble::EnsembleAverage).
pub fn analyze(
    pattern: &InterferencePattern,
    slits: &DoubleSlit,
    average_intensity: f64,
    settings: &AnalysisSettings,
) -> Result<VisibilityResult> {
    settings.validate()?;
    check_geometry(pattern, slits)?;
    if !(average_intensity.is_finite() && average_intensity > 0.0) {
        return Err(Error::invalid(
            Stage::Analysis,
            "average intensity",
            average_intensity,
            "must be positive and finite",
        ));
    }
    let model = FringeModel::new(slits)?;
    let window = settings.window.to_cm();
    let tolerance = settings.tolerance.to_cm();
    let dx = pattern.grid.step_cm();

    let selected: Vec<usize> = (0..pattern.grid.len())
        .filter(|&i| pattern.grid.position(i).abs() <= window + 1e-9 * dx)
        .collect();
    let positions: Array1<f64> = selected.iter().map(|&i| pattern.grid.position(i)).collect();
    let intensity: Array1<f64> = selected.iter().map(|&i| pattern.intensity[i]).collect();

    let extrema = find_extrema(intensity.view(), dx, tolerance)?;
    // a plateau only yields maxima, fringes need both
    if extrema.maxima.is_empty() || extrema.minima.is_empty() {
        return Err(Error::InsufficientExtrema {
            maxima: extrema.maxima.len(),
            minima: extrema.minima.len(),
            window_cm: window,
        });
    }
    let indices = extrema.indices();
    let x: Vec<f64> = indices.iter().map(|&i| positions[i]).collect();
    let y: Vec<f64> = indices
        .iter()
        .map(|&i| intensity[i] / average_intensity)
        .collect();
    let fit = model.fit(&x, &y, settings.guess, &settings.fit)?;
    debug!(
        maxima = extrema.maxima.len(),
        minima = extrema.minima.len(),
        visibility = fit.visibility,
        amplitude = fit.amplitude,
        iterations = fit.iterations,
        "fringe fit"
    );

    if settings.envelope == Envelope::Fitted && !(fit.amplitude > 0.0) {
        return Err(Error::NonPositiveAmplitude {
            amplitude: fit.amplitude,
        });
    }
    let envelope: Array1<f64> = match settings.envelope {
        Envelope::Fitted => positions.mapv(|x| fit.amplitude * average_intensity * model.envelope(x)),
        Envelope::Analytic => positions.mapv(|x| model.envelope(x)),
        Envelope::Profile => match &pattern.profile {
            Some(profile) => selected.iter().map(|&i| profile[i]).collect(),
            None => {
                return Err(Error::invalid(
                    Stage::Analysis,
                    "envelope",
                    "profile",
                    "the pattern carries no profile",
                ))
            }
        },
    };
    // zeros of sinc² come out of floating point as tiny positive values
    let peak = envelope.fold(0.0, |m: f64, &e| m.max(e.abs()));
    if let Some(i) = envelope
        .iter()
        .position(|&e| !(e.is_finite() && e > 1e-12 * peak))
    {
        return Err(Error::ZeroEnvelope {
            envelope: settings.envelope.name(),
            position_cm: positions[i],
        });
    }
    let normalized = &intensity / &envelope;

    let max = normalized.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    let min = normalized.fold(f64::INFINITY, |m, &v| m.min(v));
    if !(max.is_finite() && min.is_finite() && max + min > 0.0) {
        return Err(Error::DegeneratePattern { max, min });
    }
    let raw_visibility = (max - min) / (max + min);
    let scale = 10f64.powi(settings.precision as i32);
    let visibility = (raw_visibility * scale).round() / scale;
    debug!(visibility, raw_visibility, envelope = settings.envelope.name(), "visibility");

    Ok(VisibilityResult {
        visibility,
        raw_visibility,
        positions,
        normalized,
        extrema,
        fit,
    })
}

fn check_geometry(pattern: &InterferencePattern, slits: &DoubleSlit) -> Result<()> {
    let same = |a: Length, b: Length| {
        let (a, b) = (a.to_cm(), b.to_cm());
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
    };
    if !same(pattern.metadata.slit_separation, slits.separation) {
        return Err(Error::mismatch(
            Stage::Analysis,
            "slit separation",
            pattern.metadata.slit_separation,
            slits.separation,
        ));
    }
    if !same(pattern.metadata.slit_width, slits.width) {
        return Err(Error::mismatch(
            Stage::Analysis,
            "slit width",
            pattern.metadata.slit_width,
            slits.width,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::grid::SamplingGrid;
    use crate::pattern::PatternMetadata;

    fn slits() -> DoubleSlit {
        DoubleSlit {
            separation: Length::mm(4.0),
            width: Length::mm(1.0),
            distance: Length::cm(1e4),
            wavelength: Length::nm(500.0),
        }
    }

    /// A noiseless averaged pattern with known visibility, scaled to mean intensity `scale`.
    fn synthetic(visibility: f64, scale: f64) -> (InterferencePattern, f64) {
        let slits = slits();
        let model = FringeModel::new(&slits).unwrap();
        let grid = SamplingGrid::new(Length::cm(20.0), Length::cm(0.05)).unwrap();
        let intensity = grid
            .positions()
            .mapv(|x| scale * model.evaluate(x, visibility, 1.0));
        let profile = grid.positions().mapv(|x| scale * model.envelope(x));
        let metadata = PatternMetadata {
            filter: None,
            slit_separation: slits.separation,
            slit_width: slits.width,
        };
        let pattern = InterferencePattern::new(grid, intensity, Some(profile), metadata, 1).unwrap();
        let mean = pattern.mean_intensity();
        (pattern, mean)
    }

    #[test]
    fn recovers_visibility_of_a_clean_pattern() {
        for &v in &[0.9, 0.5, 0.2] {
            let (pattern, mean) = synthetic(v, 3e-7);
            let result = analyze(&pattern, &slits(), mean, &AnalysisSettings::default()).unwrap();
            // grid sampling of the fringe extremes costs a little contrast
            assert!((result.visibility - v).abs() < 0.01, "{} vs {}", result.visibility, v);
            assert!((result.fit.visibility - v).abs() < 1e-6, "{:?}", result.fit);
            assert!((result.fit.amplitude * mean - 3e-7).abs() < 1e-12);
        }
    }

    #[test]
    fn every_envelope_gives_the_same_contrast_on_a_clean_pattern() {
        let (pattern, mean) = synthetic(0.6, 1.0);
        let mut settings = AnalysisSettings::default();
        let fitted = analyze(&pattern, &slits(), mean, &settings).unwrap();
        settings.envelope = Envelope::Analytic;
        let analytic = analyze(&pattern, &slits(), mean, &settings).unwrap();
        settings.envelope = Envelope::Profile;
        let profile = analyze(&pattern, &slits(), mean, &settings).unwrap();
        assert!((fitted.raw_visibility - analytic.raw_visibility).abs() < 1e-6);
        assert!((fitted.raw_visibility - profile.raw_visibility).abs() < 1e-6);
    }

    #[test]
    fn visibility_is_rounded_to_precision() {
        let (pattern, mean) = synthetic(0.5, 1.0);
        let settings = AnalysisSettings {
            precision: 1,
            ..AnalysisSettings::default()
        };
        let result = analyze(&pattern, &slits(), mean, &settings).unwrap();
        assert_eq!(result.visibility, 0.5);
        assert!(result.raw_visibility != result.visibility);
        assert_eq!(result.positions.len(), 121);
        assert_eq!(result.normalized.len(), 121);
    }

    #[test]
    fn flat_patterns_have_no_fringes() {
        let (mut pattern, _) = synthetic(0.5, 1.0);
        pattern.intensity.fill(1.0);
        // plateaus are all maxima, so the default window finds several of those and no minimum
        let err = analyze(&pattern, &slits(), 1.0, &AnalysisSettings::default()).unwrap_err();
        assert!(
            matches!(err, Error::InsufficientExtrema { maxima: 11, minima: 0, .. }),
            "{}",
            err
        );
        assert!(!err.is_fatal());

        let settings = AnalysisSettings {
            window: Length::cm(0.4),
            ..AnalysisSettings::default()
        };
        let err = analyze(&pattern, &slits(), 1.0, &settings).unwrap_err();
        assert!(matches!(err, Error::InsufficientExtrema { maxima: 0, minima: 0, .. }));
    }

    #[test]
    fn negative_fitted_amplitude_is_reported_as_such() {
        let (mut pattern, _) = synthetic(0.5, 1.0);
        pattern.intensity.mapv_inplace(|v| -v);
        let settings = AnalysisSettings {
            guess: FitGuess {
                visibility: 0.4,
                amplitude: -1.5,
            },
            ..AnalysisSettings::default()
        };
        let err = analyze(&pattern, &slits(), 1.0, &settings).unwrap_err();
        match err {
            Error::NonPositiveAmplitude { amplitude } => assert!((amplitude + 1.0).abs() < 1e-6),
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn envelope_zero_inside_the_window_is_reported() {
        let (pattern, mean) = synthetic(0.5, 1.0);
        let settings = AnalysisSettings {
            window: Length::cm(6.0),
            envelope: Envelope::Analytic,
            ..AnalysisSettings::default()
        };
        let err = analyze(&pattern, &slits(), mean, &settings).unwrap_err();
        match err {
            Error::ZeroEnvelope { envelope, position_cm } => {
                assert_eq!(envelope, "analytic");
                assert!((position_cm.abs() - 5.0).abs() < 1e-9);
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn bad_inputs_are_rejected() {
        let (mut pattern, mean) = synthetic(0.5, 1.0);
        let err = analyze(&pattern, &slits(), 0.0, &AnalysisSettings::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let mut other = slits();
        other.separation = Length::mm(3.0);
        let err = analyze(&pattern, &other, mean, &AnalysisSettings::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);

        // the same geometry in other units is accepted
        let mut same = slits();
        same.separation = Length::um(4000.0);
        assert!(analyze(&pattern, &same, mean, &AnalysisSettings::default()).is_ok());

        pattern.profile = None;
        let settings = AnalysisSettings {
            envelope: Envelope::Profile,
            ..AnalysisSettings::default()
        };
        assert!(analyze(&pattern, &slits(), mean, &settings).is_err());
    }
}
