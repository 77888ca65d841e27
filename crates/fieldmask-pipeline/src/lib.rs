//! # Fieldmask Pipeline - Geometry Extraction
//!
//! Turns noisy, discretized refractive-index captures from an external field
//! simulator into a clean, labeled geometric model and fabrication-ready
//! mask files.
//!
//! The stages, in dependency order:
//!
//! - [`EnvironmentStager`] — forces deterministic sampling conditions on the
//!   engine and guarantees their restoration afterwards
//! - [`MultiSampleFuser`] — fuses the baseline and the four half-pixel
//!   shifted captures into one consensus field, rejecting every cell the
//!   captures disagree on
//! - [`Segmenter`] — builds the materials → structures → layers graph
//! - [`extract_cross_section`] — the driver running the whole sequence and
//!   writing the bitmap and vector outputs via `fieldmask-export`
//!
//! ## Example
//!
//! ```no_run
//! use fieldmask_pipeline::{extract_cross_section, CrossSectionRequest};
//! # fn run<S: fieldmask_core::EngineParams + fieldmask_core::FieldProbe>(
//! #     session: &mut S,
//! # ) -> fieldmask_core::Result<()> {
//! // 250 nm pixels, 3x4 tiled outputs next to the project file.
//! let request = CrossSectionRequest::new("masks/grating", 250.0).with_tiling(3, 4);
//! let model = extract_cross_section(session, &request)?;
//! println!("extracted {} structure(s)", model.structures.len());
//! # Ok(())
//! # }
//! ```
//!
//! The pipeline is synchronous and single-threaded: every capture is a
//! blocking round trip to the engine, each one preconditioned on the probe
//! move before it. At most one extraction may run against a given engine
//! instance at a time, because the engine's configuration is mutated in
//! place while staged.

pub mod extract;
pub mod fuser;
pub mod segmenter;
pub mod stager;

pub use extract::{extract_cross_section, CrossSectionRequest};
pub use fuser::MultiSampleFuser;
pub use segmenter::{Segmenter, StructureIdCounter};
pub use stager::{EnvironmentStager, UndoBuffer, UndoEntry, DEFAULT_REGION_TARGET};

pub use fieldmask_export::PolygonStrategy;
