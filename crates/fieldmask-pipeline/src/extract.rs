//! The cross-section extraction driver.
//!
//! Ties the pipeline together: stage the engine, take the baseline capture
//! plus four half-pixel-shifted captures, fuse, segment, rasterize, and
//! write both fabrication outputs — then put the engine back exactly as it
//! was, whatever happened in between.

use std::path::PathBuf;

use fieldmask_core::error::RestoreFailure;
use fieldmask_core::grid::shift_to_cells;
use fieldmask_core::{
    convert_length, EngineParams, FieldProbe, FieldmaskError, IndexModel, LengthUnit, Result,
};
use fieldmask_export::{tile_mask, write_bitmap, write_vector, PolygonStrategy};

use crate::fuser::MultiSampleFuser;
use crate::segmenter::{Segmenter, StructureIdCounter};
use crate::stager::EnvironmentStager;

/// Configuration of one cross-section extraction.
///
/// `pixel_size` is expressed in `unit`, which defaults to the ambient
/// nanometers. Both output files derive their paths from `output_stem`; the
/// writers normalize the suffixes.
#[derive(Debug, Clone)]
pub struct CrossSectionRequest {
    /// Path stem for both output files.
    pub output_stem: PathBuf,
    /// Edge length of one mask pixel, in `unit`.
    pub pixel_size: f64,
    /// Unit `pixel_size` is expressed in.
    pub unit: LengthUnit,
    /// Unit-cell repetitions along y.
    pub rows: u32,
    /// Unit-cell repetitions along x.
    pub columns: u32,
    /// Map occupied cells to black in the bitmap (the milling convention).
    pub invert_bitmap: bool,
    /// How vector components are polygonized.
    pub polygon_strategy: PolygonStrategy,
}

impl CrossSectionRequest {
    /// Request with a single unit cell, inverted bitmap, and the default
    /// polygonization, `pixel_size` in the ambient unit.
    #[must_use = "the request is created but not used"]
    pub fn new(output_stem: impl Into<PathBuf>, pixel_size: f64) -> Self {
        Self {
            output_stem: output_stem.into(),
            pixel_size,
            unit: LengthUnit::default(),
            rows: 1,
            columns: 1,
            invert_bitmap: true,
            polygon_strategy: PolygonStrategy::default(),
        }
    }

    /// Express `pixel_size` in an explicit unit.
    #[must_use = "the modified request is returned, not stored"]
    pub fn with_unit(mut self, unit: LengthUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Repeat the unit cell `rows × columns` times in the outputs.
    #[must_use = "the modified request is returned, not stored"]
    pub fn with_tiling(mut self, rows: u32, columns: u32) -> Self {
        self.rows = rows;
        self.columns = columns;
        self
    }

    /// Choose how vector components are polygonized.
    #[must_use = "the modified request is returned, not stored"]
    pub fn with_polygon_strategy(mut self, strategy: PolygonStrategy) -> Self {
        self.polygon_strategy = strategy;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.pixel_size.is_finite() && self.pixel_size > 0.0) {
            return Err(FieldmaskError::InvalidRequest {
                reason: format!("pixel size must be positive, got {}", self.pixel_size),
            });
        }
        if self.rows < 1 || self.columns < 1 {
            return Err(FieldmaskError::InvalidRequest {
                reason: format!(
                    "tiling must be at least 1x1, got {}x{}",
                    self.rows, self.columns
                ),
            });
        }
        if self.output_stem.file_stem().is_none() {
            return Err(FieldmaskError::InvalidRequest {
                reason: format!("output stem '{}' has no filename", self.output_stem.display()),
            });
        }
        Ok(())
    }
}

/// Extract the cross-section geometry and write both fabrication outputs.
///
/// Stages the engine for deterministic sampling, performs the five-capture
/// sequence (baseline plus four half-pixel diagonal shifts, strictly
/// sequential), fuses and segments the captures, and writes the bitmap and
/// the vector layout from the same cell-occupancy mask. The staged
/// configuration and the probe position are restored on every exit path;
/// when both the staged work and the cleanup fail, both errors are surfaced
/// together.
///
/// Returns the extracted [`IndexModel`].
///
/// # Errors
///
/// Any error from staging, capturing, fusion, segmentation, or export, per
/// the taxonomy in [`FieldmaskError`].
pub fn extract_cross_section<S>(session: &mut S, request: &CrossSectionRequest) -> Result<IndexModel>
where
    S: EngineParams + FieldProbe,
{
    request.validate()?;
    let pixel_m = convert_length(request.pixel_size, request.unit, LengthUnit::Meters);

    let stager = EnvironmentStager::default();
    let buffer = stager.stage(session, pixel_m)?;

    let work = capture_and_export(session, request, pixel_m);

    // Guaranteed cleanup: probe back to baseline, staged parameters written
    // back. A probe failure joins the restore failures instead of masking
    // them.
    let mut cleanup_failures: Vec<RestoreFailure> = Vec::new();
    if let Err(source) = session.restore_probe_offset() {
        cleanup_failures.push(RestoreFailure {
            target: "probe".to_string(),
            parameter: "offset".to_string(),
            source,
        });
    }
    let cleanup = match stager.restore(session, buffer) {
        Ok(()) if cleanup_failures.is_empty() => Ok(()),
        Ok(()) => Err(FieldmaskError::Restore {
            failures: cleanup_failures,
        }),
        Err(FieldmaskError::Restore { mut failures }) => {
            cleanup_failures.append(&mut failures);
            Err(FieldmaskError::Restore {
                failures: cleanup_failures,
            })
        }
        Err(other) => Err(other),
    };

    match (work, cleanup) {
        (Ok(model), Ok(())) => Ok(model),
        (Ok(_), Err(cleanup)) => Err(cleanup),
        (Err(work), Ok(())) => Err(work),
        (Err(work), Err(cleanup)) => Err(FieldmaskError::WorkAndRestore {
            work: Box::new(work),
            restore: Box::new(cleanup),
        }),
    }
}

/// The staged part of the extraction: captures, fusion, segmentation, and
/// the two file outputs.
fn capture_and_export<S>(
    session: &mut S,
    request: &CrossSectionRequest,
    pixel_m: f64,
) -> Result<IndexModel>
where
    S: EngineParams + FieldProbe,
{
    // Baseline plus four shifts landing on the half-pixel diagonals. Each
    // capture's precondition is the probe move before it, so the sequence is
    // strictly ordered.
    let half = pixel_m / 2.0;
    let moves = [
        (half, half),
        (-pixel_m, -pixel_m),
        (0.0, pixel_m),
        (pixel_m, -pixel_m),
    ];

    log::debug!("capturing baseline index field");
    let mut captures = vec![session.capture_index_field()?];
    for (index, (dx, dy)) in moves.iter().enumerate() {
        session.offset_probe(*dx, *dy)?;
        log::debug!("capturing shifted index field {}/{}", index + 1, moves.len());
        captures.push(session.capture_index_field()?);
    }

    let combined = captures
        .iter()
        .map(MultiSampleFuser::combine_axes)
        .collect::<Result<Vec<_>>>()?;
    let fused = MultiSampleFuser::fuse(&combined)?;

    let mut ids = StructureIdCounter::new();
    let model = Segmenter::segment(&fused, &captures[0].axes, &mut ids)?;

    // Both outputs come from the same node-to-cell shifted mask so raster
    // and vector stay geometrically consistent.
    let cell_mask = shift_to_cells(&model.cross_section(0));
    let tiled = tile_mask(&cell_mask, request.rows, request.columns);

    let raster = write_bitmap(&tiled, &request.output_stem, request.invert_bitmap);
    let vector = write_vector(
        &cell_mask,
        &model.axes.x,
        &model.axes.y,
        &request.output_stem,
        pixel_m,
        request.rows,
        request.columns,
        request.polygon_strategy,
    );
    match (raster, vector) {
        (Ok(_), Ok(_)) => Ok(model),
        (Err(raster), Ok(_)) => Err(raster.into()),
        (Ok(_), Err(vector)) => Err(vector.into()),
        (Err(raster), Err(vector)) => {
            // The outputs are independent; report the raster failure and
            // keep the vector one visible in the log.
            log::error!("vector export failed as well: {vector}");
            Err(raster.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_a_non_positive_pixel_size() {
        let request = CrossSectionRequest::new("out", 0.0);
        assert!(matches!(
            request.validate(),
            Err(FieldmaskError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn rejects_zero_tiling() {
        let request = CrossSectionRequest::new("out", 100.0).with_tiling(0, 2);
        assert!(matches!(
            request.validate(),
            Err(FieldmaskError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn default_request_uses_the_ambient_unit() {
        let request = CrossSectionRequest::new("out", 100.0);
        assert_eq!(request.unit, LengthUnit::Nanometers);
        assert_eq!((request.rows, request.columns), (1, 1));
        assert!(request.invert_bitmap);
    }
}
