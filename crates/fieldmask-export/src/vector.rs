//! Tiled vector layout output.
//!
//! The vector file mirrors the cell/reference structure of mask layout
//! formats: one base block holds the polygonized cross-section, and the
//! top level places `rows × columns` references to it, spaced by the
//! unit-cell extent and centered as a group about the origin. The container
//! is DXF with coordinates in micrometers, the format's working length unit.

// Cell indices and label counts always fit the lossy casts below.
#![allow(clippy::cast_possible_truncation)]

use std::path::{Path, PathBuf};

use dxf::entities::{Entity, EntityType, Insert, LwPolyline};
use dxf::{Block, Drawing, LwPolylineVertex, Point};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::{Array1, Array2};

use fieldmask_core::{convert_axis, convert_length, ExportError, LengthUnit};

use crate::geometry::{cell_outlines, convex_hull, corner_positions, PolygonStrategy};

/// Name of the block holding the polygonized cross-section.
pub const BASE_CELL_NAME: &str = "CROSS_SECTION";

/// Write a cross-section occupancy mask as a tiled vector layout.
///
/// `mask` is the cell-occupancy mask (first axis x, second axis y) and
/// `x`/`y` its cell-center coordinate axes in meters; both outputs of one
/// extraction must come from the same mask/axes pair so raster and vector
/// stay geometrically consistent. `pixel_size` is the cell pitch in meters.
///
/// The axes are re-centered about their own midpoint and converted to
/// micrometers. Each connected component (full 8-neighbor connectivity) is
/// polygonized with `strategy` into the base block; the top level receives
/// `rows × columns` references to that block. The filename is normalized to
/// carry the `.dxf` suffix; the path actually written is returned.
///
/// # Errors
///
/// [`ExportError::InvalidPath`] for a path without a file stem,
/// [`ExportError::DegeneratePolygon`] when a component's hull collapses below
/// three vertices, and [`ExportError::Vector`] when the file cannot be
/// written.
#[allow(clippy::too_many_arguments)]
pub fn write_vector(
    mask: &Array2<bool>,
    x: &Array1<f64>,
    y: &Array1<f64>,
    path: &Path,
    pixel_size: f64,
    rows: u32,
    columns: u32,
    strategy: PolygonStrategy,
) -> Result<PathBuf, ExportError> {
    if path.file_stem().is_none() {
        return Err(ExportError::InvalidPath {
            path: path.to_path_buf(),
        });
    }
    let path = path.with_extension("dxf");

    let x_um = recenter_um(x);
    let y_um = recenter_um(y);
    let pixel_um = convert_length(pixel_size, LengthUnit::Meters, LengthUnit::Micrometers);

    let polygons = polygonize(mask, &x_um, &y_um, pixel_um, strategy)?;
    log::debug!(
        "vector layout: {} polygon(s), {}x{} tiling",
        polygons.len(),
        rows,
        columns
    );

    let mut drawing = Drawing::new();
    // LwPolyline block entities and the $INSUNITS micron unit are only emitted
    // by the DXF writer at R2000 or later; the default version drops both.
    drawing.header.version = dxf::enums::AcadVersion::R2000;
    drawing.header.default_drawing_units = dxf::enums::Units::Microns;

    let mut base = Block::default();
    base.name = BASE_CELL_NAME.to_string();
    for polygon in &polygons {
        base.entities
            .push(Entity::new(EntityType::LwPolyline(closed_polyline(polygon))));
    }
    drawing.add_block(base);

    // Unit-cell extent: center span plus one pitch, i.e. the full physical
    // footprint of the tile, matching the raster tiling period.
    let unit_x = span_of(&x_um) + pixel_um;
    let unit_y = span_of(&y_um) + pixel_um;
    let start_x = -(unit_x * f64::from(columns) - unit_x) / 2.0;
    let start_y = -(unit_y * f64::from(rows) - unit_y) / 2.0;
    for row in 0..rows {
        for column in 0..columns {
            let mut reference = Insert::default();
            reference.name = BASE_CELL_NAME.to_string();
            reference.location = Point::new(
                start_x + f64::from(column) * unit_x,
                start_y + f64::from(row) * unit_y,
                0.0,
            );
            drawing.add_entity(Entity::new(EntityType::Insert(reference)));
        }
    }

    drawing
        .save_file(&path)
        .map_err(|source| ExportError::Vector {
            source: Box::new(source),
        })?;
    log::info!("vector layout written to {}", path.display());
    Ok(path)
}

/// Re-center an axis about its midpoint and convert meters to micrometers.
fn recenter_um(axis: &Array1<f64>) -> Array1<f64> {
    let centered = if axis.is_empty() {
        axis.clone()
    } else {
        let midpoint = axis[0] + (axis[axis.len() - 1] - axis[0]) / 2.0;
        axis - midpoint
    };
    convert_axis(&centered, LengthUnit::Meters, LengthUnit::Micrometers)
}

#[inline]
fn span_of(axis: &Array1<f64>) -> f64 {
    if axis.is_empty() {
        0.0
    } else {
        axis[axis.len() - 1] - axis[0]
    }
}

/// Label the mask and polygonize every component with the given strategy.
fn polygonize(
    mask: &Array2<bool>,
    x_um: &Array1<f64>,
    y_um: &Array1<f64>,
    pixel_um: f64,
    strategy: PolygonStrategy,
) -> Result<Vec<Vec<(f64, f64)>>, ExportError> {
    let (nx, ny) = mask.dim();
    let occupancy = GrayImage::from_fn(nx as u32, ny as u32, |px, py| {
        Luma([if mask[(px as usize, py as usize)] { 255 } else { 0 }])
    });
    let labeled = connected_components(&occupancy, Connectivity::Eight, Luma([0u8]));

    let component_count = labeled.pixels().map(|p| p.0[0]).max().unwrap_or(0);
    let mut components: Vec<Vec<(usize, usize)>> = vec![Vec::new(); component_count as usize];
    for (px, py, pixel) in labeled.enumerate_pixels() {
        let label = pixel.0[0];
        if label > 0 {
            components[label as usize - 1].push((px as usize, py as usize));
        }
    }

    let mut polygons = Vec::new();
    for (index, cells) in components.iter().enumerate() {
        let component = index as u32 + 1;
        match strategy {
            PolygonStrategy::ConvexHull => {
                let centers: Vec<(f64, f64)> =
                    cells.iter().map(|&(i, j)| (x_um[i], y_um[j])).collect();
                let hull = convex_hull(&centers);
                if hull.len() < 3 {
                    return Err(ExportError::DegeneratePolygon {
                        component,
                        points: hull.len(),
                    });
                }
                polygons.push(hull);
            }
            PolygonStrategy::CellOutline => {
                let corner_x = corner_positions(x_um, pixel_um / 2.0);
                let corner_y = corner_positions(y_um, pixel_um / 2.0);
                polygons.extend(cell_outlines(cells, &corner_x, &corner_y));
            }
        }
    }
    Ok(polygons)
}

fn closed_polyline(polygon: &[(f64, f64)]) -> LwPolyline {
    let mut polyline = LwPolyline::default();
    // Bit 1 marks the polyline closed.
    polyline.flags = 1;
    for &(px, py) in polygon {
        polyline.vertices.push(LwPolylineVertex {
            x: px,
            y: py,
            ..Default::default()
        });
    }
    polyline
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_islands() -> (Array2<bool>, Array1<f64>, Array1<f64>) {
        // 4x4 cells: a 2x2 block in one corner and a single cell in the
        // opposite corner.
        let mut mask = Array2::from_elem((4, 4), false);
        for (i, j) in [(0, 0), (0, 1), (1, 0), (1, 1), (3, 3)] {
            mask[(i, j)] = true;
        }
        let x = array![0.5e-6, 1.5e-6, 2.5e-6, 3.5e-6];
        let y = array![0.5e-6, 1.5e-6, 2.5e-6, 3.5e-6];
        (mask, x, y)
    }

    #[test]
    fn writes_expected_reference_count() {
        let (mask, x, y) = two_islands();
        let dir = tempfile::tempdir().unwrap();
        let written = write_vector(
            &mask,
            &x,
            &y,
            &dir.path().join("layout"),
            1e-6,
            2,
            3,
            PolygonStrategy::CellOutline,
        )
        .unwrap();
        assert_eq!(written.extension().unwrap(), "dxf");

        let reread = Drawing::load_file(&written).unwrap();
        let inserts = reread
            .entities()
            .filter(|e| matches!(e.specific, EntityType::Insert(_)))
            .count();
        assert_eq!(inserts, 6);
    }

    #[test]
    fn base_block_holds_one_polygon_per_component() {
        let (mask, x, y) = two_islands();
        let dir = tempfile::tempdir().unwrap();
        let written = write_vector(
            &mask,
            &x,
            &y,
            &dir.path().join("layout"),
            1e-6,
            1,
            1,
            PolygonStrategy::CellOutline,
        )
        .unwrap();

        let reread = Drawing::load_file(&written).unwrap();
        let base = reread
            .blocks()
            .find(|b| b.name == BASE_CELL_NAME)
            .expect("base block present");
        assert_eq!(base.entities.len(), 2);
    }

    #[test]
    fn references_are_spaced_by_the_unit_cell_extent() {
        let (mask, x, y) = two_islands();
        let dir = tempfile::tempdir().unwrap();
        let written = write_vector(
            &mask,
            &x,
            &y,
            &dir.path().join("layout"),
            1e-6,
            1,
            2,
            PolygonStrategy::CellOutline,
        )
        .unwrap();

        let reread = Drawing::load_file(&written).unwrap();
        let mut xs: Vec<f64> = reread
            .entities()
            .filter_map(|e| match &e.specific {
                EntityType::Insert(insert) => Some(insert.location.x),
                _ => None,
            })
            .collect();
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(xs.len(), 2);
        // Center span 3 um + 1 um pitch = 4 um unit cell, centered about 0.
        assert!((xs[1] - xs[0] - 4.0).abs() < 1e-9);
        assert!((xs[0] + xs[1]).abs() < 1e-9);
    }

    #[test]
    fn single_cell_component_rejects_hull_polygonization() {
        let mut mask = Array2::from_elem((3, 3), false);
        mask[(1, 1)] = true;
        let x = array![0.5e-6, 1.5e-6, 2.5e-6];
        let y = array![0.5e-6, 1.5e-6, 2.5e-6];
        let dir = tempfile::tempdir().unwrap();
        let result = write_vector(
            &mask,
            &x,
            &y,
            &dir.path().join("layout"),
            1e-6,
            1,
            1,
            PolygonStrategy::ConvexHull,
        );
        assert!(matches!(
            result,
            Err(ExportError::DegeneratePolygon { points: 1, .. })
        ));
    }

    #[test]
    fn hull_strategy_emits_convex_outline() {
        let (mask, x, y) = two_islands();
        // Drop the single-cell island so the hull is well-formed.
        let mut mask = mask;
        mask[(3, 3)] = false;
        let dir = tempfile::tempdir().unwrap();
        let written = write_vector(
            &mask,
            &x,
            &y,
            &dir.path().join("layout"),
            1e-6,
            1,
            1,
            PolygonStrategy::ConvexHull,
        )
        .unwrap();
        let reread = Drawing::load_file(&written).unwrap();
        let base = reread.blocks().find(|b| b.name == BASE_CELL_NAME).unwrap();
        assert_eq!(base.entities.len(), 1);
        match &base.entities[0].specific {
            EntityType::LwPolyline(polyline) => assert_eq!(polyline.vertices.len(), 4),
            other => panic!("expected a polyline, got {other:?}"),
        }
    }
}
