//! # Fieldmask Export - Fabrication Mask Outputs
//!
//! Turns one finalized 2-D cross-section mask and its coordinate axes into
//! fabrication-ready files:
//!
//! - [`write_bitmap`] — an 8-bit single-channel raster (0/255 pixels),
//!   tiled via [`tile_mask`], suffix normalized to `.bmp`
//! - [`write_vector`] — a vector layout with one polygonized base block and
//!   a top level of `rows × columns` block references, suffix normalized to
//!   `.dxf`, coordinates in micrometers
//!
//! Both writers must be fed the same mask/axes pair so the raster and vector
//! representations stay geometrically consistent; failures of one output
//! never invalidate the other. Polygonization is pluggable through
//! [`PolygonStrategy`].

pub mod bitmap;
pub mod geometry;
pub mod vector;

pub use bitmap::{tile_mask, write_bitmap};
pub use geometry::PolygonStrategy;
pub use vector::{write_vector, BASE_CELL_NAME};

pub use fieldmask_core::ExportError;
