//! Spatial frequency filtering of a field.

use ndarray::Zip;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Stage};
use crate::fft::{fftc, ifftc};
use crate::units::SpatialFrequency;
use crate::Field;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    /// Passes `|k| <= width/2` unchanged and removes everything else.
    Rectangular,
    /// Weights each bin by `exp(-(k/width)²)`.
    Gaussian,
}

/// A window applied to the angular spatial frequency spectrum of a field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialFilter {
    pub kind: FilterKind,
    pub width: SpatialFrequency,
}

impl SpatialFilter {
    pub fn new(kind: FilterKind, width: SpatialFrequency) -> Self {
        SpatialFilter { kind, width }
    }

    pub fn rectangular(width: SpatialFrequency) -> Self {
        SpatialFilter::new(FilterKind::Rectangular, width)
    }

    pub fn gaussian(width: SpatialFrequency) -> Self {
        SpatialFilter::new(FilterKind::Gaussian, width)
    }

    /// Width in rad/cm, rejecting non-positive widths.
    pub fn width_rad_per_cm(&self) -> Result<f64> {
        let width = self.width.to_rad_per_cm();
        if width.is_finite() && width > 0.0 {
            Ok(width)
        } else {
            Err(Error::invalid(
                Stage::Filter,
                "filter width",
                self.width,
                "must be positive and finite",
            ))
        }
    }

    /// Transmission of the window at angular frequency `k`.
    pub fn transmission(&self, k: f64, width: f64) -> f64 {
        match self.kind {
            FilterKind::Rectangular => {
                if k.abs() <= 0.5 * width {
                    1.0
                } else {
                    0.0
                }
            }
            FilterKind::Gaussian => {
                let u = k / width;
                (-u * u).exp()
            }
        }
    }

    /// Filters `field` in the spatial frequency domain.
    ///
    /// The frequency axis is derived from the field's own grid, and the returned field lives on that same grid.
    pub fn apply(&self, mut field: Field) -> Result<Field> {
        let width = self.width_rad_per_cm()?;
        let k = field.grid.frequencies();

        fftc(field.values.view_mut());
        Zip::from(&mut field.values).and(&k).for_each(|e, &k| {
            *e *= self.transmission(k, width);
        });
        ifftc(field.values.view_mut());

        Ok(field)
    }
}
