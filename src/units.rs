//! Tagged physical quantities.
//!
//! Every length entering the engine carries its unit and is converted to centimetres at the point of use.
//! Spatial frequencies are angular (radians per unit length) and convert to radians per centimetre.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Stage};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthUnit {
    #[serde(rename = "nm")]
    Nanometre,
    #[serde(rename = "um")]
    Micrometre,
    #[serde(rename = "mm")]
    Millimetre,
    #[serde(rename = "cm")]
    Centimetre,
    #[serde(rename = "m")]
    Metre,
}

impl LengthUnit {
    /// Size of one unit in centimetres.
    pub fn in_cm(self) -> f64 {
        match self {
            LengthUnit::Nanometre => 1e-7,
            LengthUnit::Micrometre => 1e-4,
            LengthUnit::Millimetre => 1e-1,
            LengthUnit::Centimetre => 1.0,
            LengthUnit::Metre => 1e2,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Nanometre => "nm",
            LengthUnit::Micrometre => "um",
            LengthUnit::Millimetre => "mm",
            LengthUnit::Centimetre => "cm",
            LengthUnit::Metre => "m",
        }
    }
}

/// A length together with the unit it was specified in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Length { value, unit }
    }

    pub fn nm(value: f64) -> Self {
        Length::new(value, LengthUnit::Nanometre)
    }

    pub fn um(value: f64) -> Self {
        Length::new(value, LengthUnit::Micrometre)
    }

    pub fn mm(value: f64) -> Self {
        Length::new(value, LengthUnit::Millimetre)
    }

    pub fn cm(value: f64) -> Self {
        Length::new(value, LengthUnit::Centimetre)
    }

    pub fn m(value: f64) -> Self {
        Length::new(value, LengthUnit::Metre)
    }

    pub fn zero() -> Self {
        Length::cm(0.0)
    }

    /// Value in the canonical internal unit.
    pub fn to_cm(self) -> f64 {
        self.value * self.unit.in_cm()
    }

    /// Converts to centimetres, rejecting anything that is not strictly positive and finite.
    pub fn positive_cm(self, stage: Stage, parameter: &'static str) -> Result<f64> {
        let cm = self.to_cm();
        if cm.is_finite() && cm > 0.0 {
            Ok(cm)
        } else {
            Err(Error::invalid(stage, parameter, self, "must be positive and finite"))
        }
    }

    /// Converts to centimetres, rejecting negative or non-finite values.
    pub fn non_negative_cm(self, stage: Stage, parameter: &'static str) -> Result<f64> {
        let cm = self.to_cm();
        if cm.is_finite() && cm >= 0.0 {
            Ok(cm)
        } else {
            Err(Error::invalid(stage, parameter, self, "must be non-negative and finite"))
        }
    }
}

impl Default for Length {
    fn default() -> Self {
        Length::zero()
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyUnit {
    #[serde(rename = "rad/um")]
    RadPerMicrometre,
    #[serde(rename = "rad/mm")]
    RadPerMillimetre,
    #[serde(rename = "rad/cm")]
    RadPerCentimetre,
    #[serde(rename = "rad/m")]
    RadPerMetre,
}

impl FrequencyUnit {
    fn in_rad_per_cm(self) -> f64 {
        match self {
            FrequencyUnit::RadPerMicrometre => 1e4,
            FrequencyUnit::RadPerMillimetre => 1e1,
            FrequencyUnit::RadPerCentimetre => 1.0,
            FrequencyUnit::RadPerMetre => 1e-2,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            FrequencyUnit::RadPerMicrometre => "rad/um",
            FrequencyUnit::RadPerMillimetre => "rad/mm",
            FrequencyUnit::RadPerCentimetre => "rad/cm",
            FrequencyUnit::RadPerMetre => "rad/m",
        }
    }
}

/// An angular spatial frequency together with its unit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialFrequency {
    pub value: f64,
    pub unit: FrequencyUnit,
}

impl SpatialFrequency {
    pub fn new(value: f64, unit: FrequencyUnit) -> Self {
        SpatialFrequency { value, unit }
    }

    pub fn per_cm(value: f64) -> Self {
        SpatialFrequency::new(value, FrequencyUnit::RadPerCentimetre)
    }

    pub fn per_mm(value: f64) -> Self {
        SpatialFrequency::new(value, FrequencyUnit::RadPerMillimetre)
    }

    pub fn to_rad_per_cm(self) -> f64 {
        self.value * self.unit.in_rad_per_cm()
    }
}

impl fmt::Display for SpatialFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.symbol())
    }
}
