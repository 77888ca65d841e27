//! Error types for the fieldmask extraction pipeline.
//!
//! All pipeline crates share the [`FieldmaskError`] taxonomy defined here and
//! the [`Result`] alias that wraps it. Errors are never downgraded to
//! warnings; the one recoverable condition (the engine accepting a different
//! parameter value than requested) is logged by the stager and does not
//! surface as an error.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used by every public API in the fieldmask crates.
pub type Result<T> = std::result::Result<T, FieldmaskError>;

/// Result alias for the collaborator traits ([`crate::EngineParams`],
/// [`crate::FieldProbe`]).
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Error reported by the external engine collaborators.
///
/// The surrounding automation layer owns the actual transport to the engine,
/// so its failures arrive here as an opaque message with an optional source.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl EngineError {
    /// Create an engine error from a plain message.
    #[must_use = "constructing an error without returning it has no effect"]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an engine error wrapping an underlying failure.
    #[must_use = "constructing an error without returning it has no effect"]
    pub fn with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// One engine parameter that could not be written back during restore.
#[derive(Debug)]
pub struct RestoreFailure {
    /// Engine object the parameter belongs to.
    pub target: String,
    /// Parameter name.
    pub parameter: String,
    /// The engine failure.
    pub source: EngineError,
}

/// Errors that can occur in the geometry-extraction and mask pipeline.
#[derive(Debug, Error)]
pub enum FieldmaskError {
    /// Captures being fused do not share one shape. Fusion aborts before any
    /// partial result is produced.
    #[error("captures have mismatched shapes: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Shape of the first capture.
        expected: Vec<usize>,
        /// Shape of the offending capture.
        actual: Vec<usize>,
    },

    /// The fused field holds no non-free-space cells, so there is nothing to
    /// segment.
    #[error("the sampled region contains only free space")]
    EmptyRegion,

    /// A capture recorded none of the three polarization components.
    #[error("capture holds no recorded polarization components")]
    EmptyCapture,

    /// A required engine parameter could not be read or written while staging
    /// the sampling environment.
    #[error("staging failed for parameter '{parameter}' on '{target}'")]
    Staging {
        /// Engine object the parameter belongs to.
        target: String,
        /// Parameter name.
        parameter: String,
        /// The engine failure.
        #[source]
        source: EngineError,
    },

    /// One or more staged parameters could not be written back. Every entry
    /// in the undo buffer is attempted before this is reported.
    #[error("failed to restore {} staged engine parameter(s)", failures.len())]
    Restore {
        /// Each parameter that could not be restored.
        failures: Vec<RestoreFailure>,
    },

    /// The staged work failed *and* restoring the engine configuration failed
    /// afterwards. Both failures are carried so neither is swallowed.
    #[error("extraction failed ({work}); restoring the engine configuration also failed ({restore})")]
    WorkAndRestore {
        /// The failure from the capture/segmentation/export work.
        work: Box<FieldmaskError>,
        /// The failure from the subsequent restore.
        restore: Box<FieldmaskError>,
    },

    /// A capture or probe operation failed.
    #[error("engine operation failed")]
    Engine(#[from] EngineError),

    /// Writing one of the fabrication outputs failed.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// An extraction request carried an invalid configuration value.
    #[error("invalid extraction request: {reason}")]
    InvalidRequest {
        /// What was wrong with the request.
        reason: String,
    },
}

/// Errors raised by the fabrication exporters.
///
/// Raster and vector failures are independent: a rejected polygon set does
/// not invalidate an already written bitmap, and vice versa.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The output path has no usable file stem.
    #[error("invalid output path: {path}")]
    InvalidPath {
        /// The offending path.
        path: PathBuf,
    },

    /// The raster encoder rejected the image or the file could not be
    /// written.
    #[error("failed to write raster output")]
    Raster {
        /// The underlying encoder/io failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The vector writer rejected the layout or the file could not be
    /// written.
    #[error("failed to write vector output")]
    Vector {
        /// The underlying writer/io failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A connected component polygonized to fewer than three distinct
    /// vertices.
    #[error("component {component} polygonizes to a degenerate outline ({points} point(s))")]
    DegeneratePolygon {
        /// Label of the offending component.
        component: u32,
        /// Number of distinct vertices produced.
        points: usize,
    },
}
