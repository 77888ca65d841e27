//! Length units and conversions.
//!
//! The engine reports every geometric quantity in meters; users of the
//! pipeline tend to think in the ambient unit of the surrounding automation
//! layer (usually nanometers), and the vector output format works in
//! micrometers. All three meet here.

use ndarray::Array1;

/// Closed set of length units understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LengthUnit {
    /// Meters (the engine's native unit).
    Meters,
    /// Centimeters.
    Centimeters,
    /// Millimeters.
    Millimeters,
    /// Micrometers (the vector output's working unit).
    Micrometers,
    /// Nanometers (the usual ambient unit).
    #[default]
    Nanometers,
    /// Picometers.
    Picometers,
    /// Femtometers.
    Femtometers,
    /// Angstroms.
    Angstroms,
}

impl LengthUnit {
    /// Multiplier taking a value in this unit to meters.
    #[inline]
    #[must_use = "the conversion factor is returned, not applied"]
    pub const fn factor_to_meters(self) -> f64 {
        match self {
            Self::Meters => 1.0,
            Self::Centimeters => 1e-2,
            Self::Millimeters => 1e-3,
            Self::Micrometers => 1e-6,
            Self::Nanometers => 1e-9,
            Self::Picometers => 1e-12,
            Self::Femtometers => 1e-15,
            Self::Angstroms => 1e-10,
        }
    }
}

/// Convert a scalar length between units.
#[inline]
#[must_use = "the converted value is returned, not stored"]
pub fn convert_length(value: f64, from: LengthUnit, to: LengthUnit) -> f64 {
    value * from.factor_to_meters() / to.factor_to_meters()
}

/// Convert every element of a coordinate axis between units.
#[must_use = "the converted axis is returned, not stored"]
pub fn convert_axis(values: &Array1<f64>, from: LengthUnit, to: LengthUnit) -> Array1<f64> {
    let factor = from.factor_to_meters() / to.factor_to_meters();
    values * factor
}
