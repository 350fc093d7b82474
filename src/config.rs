use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisSettings;
use crate::error::Result;
use crate::filter::SpatialFilter;
use crate::grid::SamplingGrid;
use crate::slits::{DoubleSlit, Superposition};
use crate::speckle::{Normalization, SpeckleSource};
use crate::units::{Length, SpatialFrequency};

/// Extents and steps of the two sampling grids.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    pub source_extent: Length,
    pub source_step: Length,
    pub screen_extent: Length,
    pub screen_step: Length,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            source_extent: Length::cm(4.0),
            source_step: Length::cm(0.01),
            screen_extent: Length::cm(20.0),
            screen_step: Length::cm(0.05),
        }
    }
}

/// Every parameter of an experiment, as read from JSON.
///
/// Lengths are written with their unit, `{"value": 500, "unit": "nm"}`, and missing fields take the values of the
/// reference scenario: a 5 mm source 15 cm from the slits, 500 nm light, 4 mm slit separation, 1 mm slits and a screen
/// 100 m away.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub source_size: Length,
    /// Distance from the source to the slits.
    pub distance: Length,
    pub wavelength: Length,
    pub correlation_length: Length,
    pub scatterers: usize,
    pub realizations: usize,
    /// `null` leaves the field unfiltered.
    pub filter: Option<SpatialFilter>,
    /// Distance from the slits to the screen.
    pub second_distance: Length,
    pub slit_separation: Length,
    pub slit_width: Length,
    pub sampling: SamplingConfig,
    pub normalization: Normalization,
    pub superposition: Superposition,
    pub seed: u64,
    pub analysis: AnalysisSettings,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            source_size: Length::cm(0.5),
            distance: Length::cm(15.0),
            wavelength: Length::nm(500.0),
            correlation_length: Length::zero(),
            scatterers: 1000,
            realizations: 200,
            filter: Some(SpatialFilter::rectangular(SpatialFrequency::per_cm(10.0))),
            second_distance: Length::cm(1e4),
            slit_separation: Length::mm(4.0),
            slit_width: Length::mm(1.0),
            sampling: SamplingConfig::default(),
            normalization: Normalization::default(),
            superposition: Superposition::default(),
            seed: 0,
            analysis: AnalysisSettings::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn source(&self) -> SpeckleSource {
        SpeckleSource {
            source_size: self.source_size,
            distance: self.distance,
            wavelength: self.wavelength,
            correlation_length: self.correlation_length,
            scatterers: self.scatterers,
            normalization: self.normalization,
        }
    }

    pub fn slits(&self) -> DoubleSlit {
        DoubleSlit {
            separation: self.slit_separation,
            width: self.slit_width,
            distance: self.second_distance,
            wavelength: self.wavelength,
        }
    }

    pub fn source_grid(&self) -> Result<SamplingGrid> {
        SamplingGrid::new(self.sampling.source_extent, self.sampling.source_step)
    }

    pub fn screen_grid(&self) -> Result<SamplingGrid> {
        SamplingGrid::new(self.sampling.screen_extent, self.sampling.screen_step)
    }

    /// Rejects the configuration if any stage would reject its parameters.
    pub fn validate(&self) -> Result<()> {
        crate::ensemble::Experiment::from_config(self)?;
        self.analysis.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::filter::FilterKind;

    #[test]
    fn defaults_describe_the_reference_scenario() {
        let config = ExperimentConfig::default();
        config.validate().unwrap();
        assert_eq!(config.source_grid().unwrap().len(), 401);
        assert_eq!(config.screen_grid().unwrap().len(), 401);
        assert_eq!(config.slits().distance.to_cm(), 1e4);
        assert!((config.wavelength.to_cm() - 5e-5).abs() < 1e-18);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = ExperimentConfig::from_json_str(
            r#"{
                "wavelength": {"value": 633, "unit": "nm"},
                "scatterers": 250,
                "filter": {"kind": "Gaussian", "width": {"value": 0.5, "unit": "rad/mm"}},
                "sampling": {"screen_step": {"value": 1, "unit": "mm"}},
                "normalization": "root_scatterer_count"
            }"#,
        )
        .unwrap();
        assert_eq!(config.scatterers, 250);
        assert!((config.wavelength.to_cm() - 6.33e-5).abs() < 1e-18);
        let filter = config.filter.unwrap();
        assert_eq!(filter.kind, FilterKind::Gaussian);
        assert!((filter.width_rad_per_cm().unwrap() - 5.0).abs() < 1e-12);
        assert_eq!(config.sampling.screen_extent, Length::cm(20.0));
        assert_eq!(config.screen_grid().unwrap().len(), 201);
        assert_eq!(config.normalization, Normalization::RootScattererCount);
        assert_eq!(config.realizations, 200);
    }

    #[test]
    fn null_filter_means_unfiltered() {
        let config = ExperimentConfig::from_json_str(r#"{"filter": null}"#).unwrap();
        assert!(config.filter.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn json_round_trips() {
        let mut config = ExperimentConfig::default();
        config.seed = 42;
        config.slit_width = Length::um(750.0);
        let json = config.to_json_string().unwrap();
        assert_eq!(ExperimentConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn unknown_fields_and_units_are_rejected() {
        let err = ExperimentConfig::from_json_str(r#"{"scaterers": 10}"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(ExperimentConfig::from_json_str(
            r#"{"distance": {"value": 15, "unit": "inch"}}"#
        )
        .is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let config = ExperimentConfig {
            scatterers: 0,
            ..ExperimentConfig::default()
        };
        assert_eq!(
            config.validate().unwrap_err().kind(),
            ErrorKind::InvalidConfiguration
        );

        let config = ExperimentConfig {
            slit_separation: Length::mm(0.5),
            ..ExperimentConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ExperimentConfig {
            filter: Some(SpatialFilter::rectangular(SpatialFrequency::per_cm(-1.0))),
            ..ExperimentConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
