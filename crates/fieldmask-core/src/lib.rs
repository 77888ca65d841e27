//! # Fieldmask Core - Shared Model and Contracts
//!
//! Core types for the fieldmask geometry-extraction pipeline: the raw capture
//! and labeled-model data structures, the grid transforms they share, the
//! length-unit conversions, the error taxonomy, and the two collaborator
//! traits through which the surrounding automation layer exposes the external
//! simulation engine.
//!
//! This crate performs no I/O and never talks to the engine itself; it only
//! defines what flows between the pipeline stages:
//!
//! - [`RawCapture`] — one probe snapshot of per-axis complex index tensors
//! - [`IndexModel`] — the materials → structures → layers aggregate built by
//!   the segmenter
//! - [`grid`] — node-to-cell occupancy shift and connected-component labeling
//! - [`EngineParams`] / [`FieldProbe`] — the engine collaborator contracts
//!
//! The pipeline stages themselves live in `fieldmask-pipeline`, the
//! fabrication writers in `fieldmask-export`.

pub mod capture;
pub mod error;
pub mod grid;
pub mod model;
pub mod units;

pub use capture::{Axes, EngineParams, FieldProbe, ParamValue, RawCapture};
pub use error::{
    EngineError, EngineResult, ExportError, FieldmaskError, RestoreFailure, Result,
};
pub use model::{IndexModel, Layer, Material, Structure, FREE_SPACE_INDEX};
pub use units::{convert_axis, convert_length, LengthUnit};
