//! The labeled geometric model extracted from a fused index field.
//!
//! The hierarchy is materials → structures → layers, all defined as boolean
//! masks over one sampling grid. [`IndexModel`] is the aggregate root: it
//! exclusively owns the three lists, and the children reference each other by
//! id only, never by object reference.

use ndarray::{Array2, Array3, Axis};
use num_complex::Complex64;

/// The refractive index of free space: 1 + 0i on every axis at every
/// frequency sample. A cell is free space if and only if its combined
/// three-axis vector equals this value everywhere.
pub const FREE_SPACE_INDEX: Complex64 = Complex64::new(1.0, 0.0);

/// One distinct material in the sampled region.
///
/// Materials are identified by the distinct complex index vector found at
/// their cells and form a strict partition of all non-free-space cells: no
/// cell belongs to two materials, and every non-free-space cell belongs to
/// exactly one.
#[derive(Debug, Clone)]
pub struct Material {
    /// Material id, numbered 1..K in order of first encounter.
    pub id: u32,
    /// Cells occupied by this material.
    pub mask: Array3<bool>,
}

/// One connected component of a material.
///
/// Within one material's mask, structures are the maximal connected
/// components under full corner adjacency. Ids come from a single counter
/// spanning all materials, so they are globally unique.
#[derive(Debug, Clone)]
pub struct Structure {
    /// Globally unique structure id.
    pub id: u32,
    /// Id of the material this structure is made of.
    pub material_id: u32,
    /// Id of the layer this structure was grouped into. Starts at the
    /// [`Structure::UNASSIGNED_LAYER`] placeholder and is reassigned during
    /// layer grouping.
    pub layer_id: u32,
    /// Cells occupied by this structure.
    pub mask: Array3<bool>,
}

impl Structure {
    /// Placeholder `layer_id` before layer grouping has run.
    pub const UNASSIGNED_LAYER: u32 = 0;

    /// Vertical extent of this structure as `(min, max)` z cell indices.
    ///
    /// Returns `None` for an empty mask.
    #[must_use = "the extent is returned, not stored"]
    pub fn z_extent(&self) -> Option<(usize, usize)> {
        let mut extent: Option<(usize, usize)> = None;
        for ((_, _, z), &occupied) in self.mask.indexed_iter() {
            if occupied {
                extent = Some(match extent {
                    Some((lo, hi)) => (lo.min(z), hi.max(z)),
                    None => (z, z),
                });
            }
        }
        extent
    }
}

/// A group of structures of one material sharing one vertical extent.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Layer id, assigned per material starting at 1 in the order distinct
    /// extents are first seen.
    pub id: u32,
    /// Id of the material the member structures are made of.
    pub material_id: u32,
    /// Union of the member structures' masks.
    pub mask: Array3<bool>,
}

/// The extracted geometric model of one sampled region.
///
/// Built fresh per extraction request from one fused field and immutable once
/// returned. Persistence is a collaborator concern; this core never stores
/// the model anywhere.
#[derive(Debug, Clone)]
pub struct IndexModel {
    /// Cell-center coordinate axes of the model grid, in meters.
    pub axes: crate::capture::Axes,
    /// Overall occupancy: the union of all material masks.
    pub mask: Array3<bool>,
    /// All materials, ordered by id.
    pub materials: Vec<Material>,
    /// All structures, ordered by id.
    pub structures: Vec<Structure>,
    /// All layers, grouped per material.
    pub layers: Vec<Layer>,
}

impl IndexModel {
    /// The occupancy cross-section at one z cell index.
    #[must_use = "the cross-section is returned, not stored"]
    pub fn cross_section(&self, z_index: usize) -> Array2<bool> {
        self.mask.index_axis(Axis(2), z_index).to_owned()
    }

    /// Look up a material by id.
    #[must_use = "the lookup result is returned, not stored"]
    pub fn material(&self, id: u32) -> Option<&Material> {
        self.materials.iter().find(|m| m.id == id)
    }

    /// All structures belonging to one material, in id order.
    #[must_use = "the lookup result is returned, not stored"]
    pub fn structures_of(&self, material_id: u32) -> Vec<&Structure> {
        self.structures
            .iter()
            .filter(|s| s.material_id == material_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn z_extent_spans_occupied_cells() {
        let mut mask = Array3::from_elem((1, 1, 6), false);
        mask[(0, 0, 2)] = true;
        mask[(0, 0, 5)] = true;
        let structure = Structure {
            id: 1,
            material_id: 1,
            layer_id: Structure::UNASSIGNED_LAYER,
            mask,
        };
        assert_eq!(structure.z_extent(), Some((2, 5)));
    }

    #[test]
    fn z_extent_of_empty_mask_is_none() {
        let structure = Structure {
            id: 1,
            material_id: 1,
            layer_id: Structure::UNASSIGNED_LAYER,
            mask: Array3::from_elem((2, 2, 2), false),
        };
        assert_eq!(structure.z_extent(), None);
    }
}
