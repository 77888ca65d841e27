//! Raw capture data and the collaborator contracts for obtaining it.
//!
//! The pipeline never talks to the simulation engine directly. It consumes
//! two narrow interfaces provided by the surrounding automation layer:
//! [`EngineParams`] for the named-parameter protocol used while staging the
//! sampling environment, and [`FieldProbe`] for the blocking index captures
//! themselves.

use ndarray::{s, Array1, Array4};
use num_complex::Complex64;

use crate::error::EngineResult;

/// The three coordinate axes of a sampling grid, in meters.
///
/// Depending on where they come from, the positions are either mesh-node
/// positions (as sampled by the probe) or cell-center positions (midpoints of
/// consecutive nodes, produced by [`Axes::to_cell_centers`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Axes {
    /// Ordered x positions.
    pub x: Array1<f64>,
    /// Ordered y positions.
    pub y: Array1<f64>,
    /// Ordered z positions.
    pub z: Array1<f64>,
}

impl Axes {
    /// Convert mesh-node positions to cell-center positions.
    ///
    /// Each pair of consecutive node positions is averaged, so an axis of
    /// length n becomes length n−1. Axes with a single position are returned
    /// unchanged.
    #[must_use = "returns new axes; the input is not modified"]
    pub fn to_cell_centers(&self) -> Self {
        Self {
            x: centers_of(&self.x),
            y: centers_of(&self.y),
            z: centers_of(&self.z),
        }
    }
}

fn centers_of(nodes: &Array1<f64>) -> Array1<f64> {
    if nodes.len() > 1 {
        (&nodes.slice(s![..-1]) + &nodes.slice(s![1..])) / 2.0
    } else {
        nodes.clone()
    }
}

/// One probe snapshot of the complex refractive index over the sampling grid.
///
/// Each recorded polarization component is a dense `[x, y, z, frequency]`
/// tensor. A `None` axis means that component was not recorded; it is never
/// zero-filled, and downstream fusion and segmentation operate only over the
/// recorded components.
#[derive(Debug, Clone)]
pub struct RawCapture {
    /// Index sampled along the x polarization, if recorded.
    pub index_x: Option<Array4<Complex64>>,
    /// Index sampled along the y polarization, if recorded.
    pub index_y: Option<Array4<Complex64>>,
    /// Index sampled along the z polarization, if recorded.
    pub index_z: Option<Array4<Complex64>>,
    /// Mesh-node positions of the sampled grid.
    pub axes: Axes,
    /// Number of frequency samples per cell.
    pub frequency_points: usize,
}

impl RawCapture {
    /// The recorded per-axis arrays, in x, y, z order.
    #[must_use = "returns the recorded component arrays"]
    pub fn recorded_components(&self) -> Vec<&Array4<Complex64>> {
        [&self.index_x, &self.index_y, &self.index_z]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// A value in the engine's named-parameter protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Floating point parameter (lengths in meters, factors).
    Float(f64),
    /// Integer parameter (counts, levels).
    Int(i64),
    /// Boolean parameter (feature toggles).
    Bool(bool),
    /// String parameter (mode tags).
    Str(String),
}

impl ParamValue {
    /// The float payload, if this is a float parameter.
    #[inline]
    #[must_use = "the extracted value is returned, not stored"]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer payload, if this is an integer parameter.
    #[inline]
    #[must_use = "the extracted value is returned, not stored"]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The boolean payload, if this is a boolean parameter.
    #[inline]
    #[must_use = "the extracted value is returned, not stored"]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload, if this is a string parameter.
    #[inline]
    #[must_use = "the extracted value is returned, not stored"]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Named-parameter access to the external engine.
///
/// Provided by the settings-tree layer of the surrounding system. The engine
/// is authoritative over its own parameter semantics: [`EngineParams::set`]
/// returns the value the engine actually accepted, which may differ from the
/// requested one.
pub trait EngineParams {
    /// Read a parameter from a named engine object.
    fn get(&mut self, target: &str, parameter: &str) -> EngineResult<ParamValue>;

    /// Write a parameter on a named engine object, returning the accepted
    /// value.
    fn set(&mut self, target: &str, parameter: &str, value: ParamValue) -> EngineResult<ParamValue>;

    /// Names of the mesh-override regions currently present in the
    /// simulation, so the stager can disable the active ones.
    fn mesh_override_regions(&mut self) -> EngineResult<Vec<String>>;
}

/// Blocking index-field captures from the simulation engine.
///
/// Every call is a round trip to the engine and may take seconds to minutes.
/// Captures are issued strictly sequentially: an offset capture's
/// precondition is the probe movement performed by the previous call.
pub trait FieldProbe {
    /// Sample the refractive index over the configured region.
    fn capture_index_field(&mut self) -> EngineResult<RawCapture>;

    /// Move the sampling region in-plane by a sub-cell amount, in meters,
    /// relative to its current position.
    fn offset_probe(&mut self, dx: f64, dy: f64) -> EngineResult<()>;

    /// Return the sampling region to its original position.
    fn restore_probe_offset(&mut self) -> EngineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn cell_centers_average_consecutive_nodes() {
        let axes = Axes {
            x: array![0.0, 1.0, 2.0],
            y: array![0.0, 2.0],
            z: array![5.0],
        };
        let centers = axes.to_cell_centers();
        assert_eq!(centers.x, array![0.5, 1.5]);
        assert_eq!(centers.y, array![1.0]);
        assert_eq!(centers.z, array![5.0]);
    }

    #[test]
    fn recorded_components_skips_missing_axes() {
        let arr = Array4::<Complex64>::zeros((2, 2, 1, 1));
        let capture = RawCapture {
            index_x: Some(arr.clone()),
            index_y: None,
            index_z: Some(arr),
            axes: Axes {
                x: array![0.0, 1.0],
                y: array![0.0, 1.0],
                z: array![0.0],
            },
            frequency_points: 1,
        };
        assert_eq!(capture.recorded_components().len(), 2);
    }
}
