use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Stage};
use crate::filter::SpatialFilter;
use crate::grid::SamplingGrid;
use crate::slits::Composition;
use crate::units::Length;

/// How a pattern was produced, persisted alongside it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternMetadata {
    /// `None` when the field reached the slits unfiltered.
    pub filter: Option<SpatialFilter>,
    pub slit_separation: Length,
    pub slit_width: Length,
}

/// Screen intensity of one realization, or the mean over several.
#[derive(Clone, Debug, PartialEq)]
pub struct InterferencePattern {
    pub grid: SamplingGrid,
    pub intensity: Array1<f64>,
    /// Intensity without the interference term, when the slits were propagated separately.
    pub profile: Option<Array1<f64>>,
    pub metadata: PatternMetadata,
    /// Number of realizations this pattern averages.
    pub realizations: usize,
}

impl InterferencePattern {
    pub fn new(
        grid: SamplingGrid,
        intensity: Array1<f64>,
        profile: Option<Array1<f64>>,
        metadata: PatternMetadata,
        realizations: usize,
    ) -> Result<Self> {
        if realizations == 0 {
            return Err(Error::invalid(
                Stage::Ensemble,
                "realization count",
                realizations,
                "a pattern averages at least one realization",
            ));
        }
        if intensity.len() != grid.len() {
            return Err(Error::mismatch(
                Stage::Composition,
                "pattern length",
                grid.len(),
                intensity.len(),
            ));
        }
        if let Some(profile) = &profile {
            if profile.len() != grid.len() {
                return Err(Error::mismatch(
                    Stage::Composition,
                    "profile length",
                    grid.len(),
                    profile.len(),
                ));
            }
        }
        Ok(InterferencePattern {
            grid,
            intensity,
            profile,
            metadata,
            realizations,
        })
    }

    /// Wraps the output of a single composition.
    pub fn single(
        grid: SamplingGrid,
        composition: Composition,
        metadata: PatternMetadata,
    ) -> Result<Self> {
        InterferencePattern::new(
            grid,
            composition.intensity,
            composition.profile,
            metadata,
            1,
        )
    }

    pub fn positions(&self) -> Array1<f64> {
        self.grid.positions()
    }

    /// Mean intensity over the whole screen.
    pub fn mean_intensity(&self) -> f64 {
        self.intensity.sum() / self.intensity.len() as f64
    }
}
