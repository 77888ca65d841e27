//! Segmentation of a fused index field into materials, structures, and
//! layers.
//!
//! Materials are the distinct complex index vectors found among the
//! non-free-space cells; structures are the connected components of each
//! material mask under full corner adjacency; layers group a material's
//! structures by their vertical extent. Structure ids come from an explicit
//! [`StructureIdCounter`] so they stay globally unique across one
//! segmentation call without any process-wide state.

use std::collections::HashMap;

use ndarray::{Array3, Array5, Zip};
use num_complex::Complex64;

use fieldmask_core::grid::label_components;
use fieldmask_core::{
    Axes, FieldmaskError, IndexModel, Layer, Material, Result, Structure, FREE_SPACE_INDEX,
};

/// Allocator for globally unique structure ids.
///
/// Monotonic uniqueness across one whole segmentation call is its only
/// contract; ids start at 1 and never reset between materials.
#[derive(Debug, Default)]
pub struct StructureIdCounter {
    last: u32,
}

impl StructureIdCounter {
    /// Create a counter whose first allocated id is 1.
    #[must_use = "the counter is created but not used"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    #[inline]
    pub fn allocate(&mut self) -> u32 {
        self.last += 1;
        self.last
    }
}

/// Builds the material → structure → layer graph from one fused field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Segmenter;

impl Segmenter {
    /// Segment a fused `[x, y, z, frequency, axes]` field sampled at
    /// `node_axes` into an [`IndexModel`] over cell-center coordinates.
    ///
    /// # Errors
    ///
    /// [`FieldmaskError::EmptyRegion`] when every cell is free space.
    pub fn segment(
        fused: &Array5<Complex64>,
        node_axes: &Axes,
        ids: &mut StructureIdCounter,
    ) -> Result<IndexModel> {
        let (nx, ny, nz, nf, na) = fused.dim();
        let grid = (nx, ny, nz);

        let materials = find_materials(fused, grid, nf, na)?;
        log::debug!("segmentation found {} material(s)", materials.len());

        let mut structures = Vec::new();
        for material in &materials {
            let (labels, count) = label_components(&material.mask);
            for label in 1..=count {
                structures.push(Structure {
                    id: ids.allocate(),
                    material_id: material.id,
                    layer_id: Structure::UNASSIGNED_LAYER,
                    mask: labels.mapv(|l| l == label),
                });
            }
        }
        log::debug!("segmentation found {} structure(s)", structures.len());

        let layers = group_layers(&materials, &mut structures, grid);
        log::debug!("segmentation found {} layer(s)", layers.len());

        let mut mask = Array3::from_elem(grid, false);
        for material in &materials {
            Zip::from(&mut mask)
                .and(&material.mask)
                .for_each(|cell, &occupied| *cell = *cell || occupied);
        }

        Ok(IndexModel {
            axes: node_axes.to_cell_centers(),
            mask,
            materials,
            structures,
            layers,
        })
    }
}

/// One material per distinct complex vector among the non-free-space cells,
/// numbered in order of first encounter over a row-major scan.
fn find_materials(
    fused: &Array5<Complex64>,
    grid: (usize, usize, usize),
    nf: usize,
    na: usize,
) -> Result<Vec<Material>> {
    let (nx, ny, nz) = grid;
    let mut slots: HashMap<Vec<u64>, usize> = HashMap::new();
    let mut masks: Vec<Array3<bool>> = Vec::new();

    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                if is_free_space(fused, (x, y, z), nf, na) {
                    continue;
                }
                let key = vector_key(fused, (x, y, z), nf, na);
                let slot = *slots.entry(key).or_insert_with(|| {
                    masks.push(Array3::from_elem(grid, false));
                    masks.len() - 1
                });
                masks[slot][(x, y, z)] = true;
            }
        }
    }

    if masks.is_empty() {
        return Err(FieldmaskError::EmptyRegion);
    }
    Ok(masks
        .into_iter()
        .enumerate()
        .map(|(index, mask)| Material {
            id: index as u32 + 1,
            mask,
        })
        .collect())
}

/// A cell is free space iff it matches the sentinel on every recorded axis
/// at every frequency sample.
fn is_free_space(
    fused: &Array5<Complex64>,
    (x, y, z): (usize, usize, usize),
    nf: usize,
    na: usize,
) -> bool {
    (0..nf).all(|f| (0..na).all(|a| fused[(x, y, z, f, a)] == FREE_SPACE_INDEX))
}

/// Bit-exact identity key of a cell's full complex vector. Zeros are
/// normalized so -0.0 and 0.0 compare equal.
fn vector_key(
    fused: &Array5<Complex64>,
    (x, y, z): (usize, usize, usize),
    nf: usize,
    na: usize,
) -> Vec<u64> {
    let normalize = |v: f64| if v == 0.0 { 0.0f64 } else { v }.to_bits();
    let mut key = Vec::with_capacity(nf * na * 2);
    for f in 0..nf {
        for a in 0..na {
            let value = fused[(x, y, z, f, a)];
            key.push(normalize(value.re));
            key.push(normalize(value.im));
        }
    }
    key
}

/// Group each material's structures by vertical extent.
///
/// Two structures land in the same layer iff they share the material and
/// both z bounds. Layer ids are assigned per material, starting at 1, in
/// the order distinct extents are first seen; member structures get their
/// `layer_id` rewritten in place.
fn group_layers(
    materials: &[Material],
    structures: &mut [Structure],
    grid: (usize, usize, usize),
) -> Vec<Layer> {
    let mut layers: Vec<Layer> = Vec::new();
    for material in materials {
        let mut extent_slots: Vec<((usize, usize), usize)> = Vec::new();
        let mut next_id = 0u32;
        for structure in structures
            .iter_mut()
            .filter(|s| s.material_id == material.id)
        {
            let extent = structure
                .z_extent()
                .expect("labeled structure masks are never empty");
            let slot = match extent_slots.iter().find(|(seen, _)| *seen == extent) {
                Some(&(_, slot)) => slot,
                None => {
                    next_id += 1;
                    layers.push(Layer {
                        id: next_id,
                        material_id: material.id,
                        mask: Array3::from_elem(grid, false),
                    });
                    extent_slots.push((extent, layers.len() - 1));
                    layers.len() - 1
                }
            };
            let layer = &mut layers[slot];
            Zip::from(&mut layer.mask)
                .and(&structure.mask)
                .for_each(|cell, &occupied| *cell = *cell || occupied);
            structure.layer_id = layer.id;
        }
    }
    layers
}
