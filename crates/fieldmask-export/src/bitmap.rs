//! Rasterized bitmap output.
//!
//! The bitmap is the milling-side view of the cross-section mask: an 8-bit
//! single-channel image whose pixels are either 0 or 255. By default the mask
//! is inverted so that white areas correspond to material removal.

// Pixel coordinates: mask dimensions always fit in u32.
#![allow(clippy::cast_possible_truncation)]

use std::path::{Path, PathBuf};

use image::GrayImage;
use ndarray::Array2;

use fieldmask_core::ExportError;

/// Repeat a unit-cell mask across the output plane.
///
/// `columns` repeats the cell along x (the first mask axis), `rows` along y,
/// so a `(nx, ny)` mask becomes `(nx * columns, ny * rows)`.
#[must_use = "returns the tiled mask; the input is not modified"]
pub fn tile_mask(mask: &Array2<bool>, rows: u32, columns: u32) -> Array2<bool> {
    let (nx, ny) = mask.dim();
    let shape = (nx * columns as usize, ny * rows as usize);
    Array2::from_shape_fn(shape, |(i, j)| mask[(i % nx, j % ny)])
}

/// Write a boolean occupancy mask as an 8-bit grayscale bitmap.
///
/// With `invert` set (the pipeline default), occupied cells map to 0 (black)
/// and empty cells to 255 (white); without it the mapping is reversed. The
/// mask's first axis is x and its second axis y; rows are emitted with y
/// reversed so that increasing y points up in the image.
///
/// The filename is normalized to carry the `.bmp` suffix. Returns the path
/// actually written.
///
/// # Errors
///
/// [`ExportError::InvalidPath`] if the path has no file stem, and
/// [`ExportError::Raster`] if encoding or writing fails.
pub fn write_bitmap(
    mask: &Array2<bool>,
    path: &Path,
    invert: bool,
) -> Result<PathBuf, ExportError> {
    if path.file_stem().is_none() {
        return Err(ExportError::InvalidPath {
            path: path.to_path_buf(),
        });
    }
    let path = path.with_extension("bmp");

    let (nx, ny) = mask.dim();
    let image = GrayImage::from_fn(nx as u32, ny as u32, |px, py| {
        let occupied = mask[(px as usize, ny - 1 - py as usize)];
        let white = occupied != invert;
        image::Luma([if white { 255 } else { 0 }])
    });

    image.save(&path).map_err(|source| ExportError::Raster {
        source: Box::new(source),
    })?;
    log::info!("bitmap written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Array2<bool> {
        Array2::from_shape_fn((2, 2), |(i, j)| (i + j) % 2 == 0)
    }

    #[test]
    fn tiling_repeats_the_unit_cell() {
        let tiled = tile_mask(&checker(), 2, 3);
        assert_eq!(tiled.dim(), (6, 4));
        assert_eq!(tiled[(0, 0)], tiled[(2, 2)]);
        assert_eq!(tiled[(1, 0)], tiled[(5, 2)]);
    }

    #[test]
    fn bitmap_pixels_are_binary_and_inverted() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_bitmap(&checker(), &dir.path().join("mask"), true).unwrap();
        assert_eq!(written.extension().unwrap(), "bmp");

        let reread = image::open(&written).unwrap().to_luma8();
        assert_eq!(reread.dimensions(), (2, 2));
        // (0, 0) of the mask is occupied and lands in the bottom image row.
        assert_eq!(reread.get_pixel(0, 1).0[0], 0);
        assert_eq!(reread.get_pixel(1, 1).0[0], 255);
    }

    #[test]
    fn invert_false_maps_occupied_to_white() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_bitmap(&checker(), &dir.path().join("mask.bmp"), false).unwrap();
        let reread = image::open(&written).unwrap().to_luma8();
        assert_eq!(reread.get_pixel(0, 1).0[0], 255);
    }

    #[test]
    fn suffix_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_bitmap(&checker(), &dir.path().join("mask.png"), true).unwrap();
        assert_eq!(written.extension().unwrap(), "bmp");
    }
}
