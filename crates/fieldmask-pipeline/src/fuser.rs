//! Consensus fusion of geometrically-offset index captures.
//!
//! A probe aligned exactly to the solver's computational grid reports the
//! coarse, staircased index at each cell rather than the true sub-cell
//! geometry. Capturing the same plane shifted by half a pixel in each
//! in-plane direction and keeping only cells on which every capture agrees
//! treats disagreement as evidence of a sub-cell boundary — and reports it
//! conservatively as free space instead of guessing a value.

use ndarray::{stack, Array5, ArrayView4, Axis};
use num_complex::Complex64;

use fieldmask_core::{FieldmaskError, RawCapture, Result, FREE_SPACE_INDEX};

/// Combines per-axis index captures into consensus fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiSampleFuser;

impl MultiSampleFuser {
    /// Stack a capture's recorded per-axis arrays into one
    /// `[x, y, z, frequency, axes]` tensor.
    ///
    /// Axes that were not recorded are simply absent from the trailing
    /// dimension — they are never zero-filled, so fusion and segmentation
    /// only ever see recorded components.
    ///
    /// # Errors
    ///
    /// [`FieldmaskError::EmptyCapture`] when no component was recorded at
    /// all, [`FieldmaskError::ShapeMismatch`] when the recorded components
    /// disagree in shape.
    pub fn combine_axes(capture: &RawCapture) -> Result<Array5<Complex64>> {
        let components = capture.recorded_components();
        if components.is_empty() {
            return Err(FieldmaskError::EmptyCapture);
        }
        let expected = components[0].shape().to_vec();
        for component in &components[1..] {
            if component.shape() != expected.as_slice() {
                return Err(FieldmaskError::ShapeMismatch {
                    expected,
                    actual: component.shape().to_vec(),
                });
            }
        }
        let views: Vec<ArrayView4<'_, Complex64>> =
            components.iter().map(|c| c.view()).collect();
        stack(Axis(4), &views).map_err(|_| FieldmaskError::ShapeMismatch {
            expected: expected.clone(),
            actual: expected,
        })
    }

    /// Fuse per-axis-combined capture tensors into one consensus field.
    ///
    /// A single capture is returned unchanged. Otherwise, every cell where
    /// all captures hold the identical value keeps that value; any
    /// disagreement — on any axis, at any frequency — forces the free-space
    /// sentinel there. Consensus rejection, never averaging.
    ///
    /// # Errors
    ///
    /// [`FieldmaskError::InvalidRequest`] for an empty input and
    /// [`FieldmaskError::ShapeMismatch`] when the captures differ in shape,
    /// raised before any partial result is produced.
    pub fn fuse(fields: &[Array5<Complex64>]) -> Result<Array5<Complex64>> {
        let Some(first) = fields.first() else {
            return Err(FieldmaskError::InvalidRequest {
                reason: "no captures to fuse".to_string(),
            });
        };
        if fields.len() == 1 {
            return Ok(first.clone());
        }
        for field in &fields[1..] {
            if field.shape() != first.shape() {
                return Err(FieldmaskError::ShapeMismatch {
                    expected: first.shape().to_vec(),
                    actual: field.shape().to_vec(),
                });
            }
        }

        let mut fused = first.clone();
        for (index, value) in fused.indexed_iter_mut() {
            for field in &fields[1..] {
                if field[index] != *value {
                    *value = FREE_SPACE_INDEX;
                    break;
                }
            }
        }
        Ok(fused)
    }
}
