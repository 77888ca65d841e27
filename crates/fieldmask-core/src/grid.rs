//! Boolean-mask transforms over the sampling grid.
//!
//! Two operations live here: the node-to-cell occupancy shift used when
//! preparing a cross-section for fabrication export, and the full-adjacency
//! connected-component labeling used by the segmenter. Both operate on plain
//! `ndarray` masks.

use ndarray::{Array2, Array3};

/// Convert a mask sampled at grid-node intersections into a mask of cell
/// occupancy.
///
/// A cell is occupied if any of its four bounding nodes is occupied, so this
/// is a dilation rather than an interpolation: nodes sitting exactly on a
/// region boundary never produce false gaps. An input of shape `(n, m)`
/// yields `(n−1, m−1)`.
///
/// This transform is specific to the 2-D export path. The 3-D model mask is
/// built against cell-center coordinates directly and never goes through it.
#[must_use = "returns the cell-occupancy mask; the input is not modified"]
pub fn shift_to_cells(node_mask: &Array2<bool>) -> Array2<bool> {
    let (n, m) = node_mask.dim();
    let shape = (n.saturating_sub(1), m.saturating_sub(1));
    Array2::from_shape_fn(shape, |(i, j)| {
        node_mask[(i, j)]
            || node_mask[(i + 1, j)]
            || node_mask[(i, j + 1)]
            || node_mask[(i + 1, j + 1)]
    })
}

/// Label the connected components of a 3-D mask under full 26-neighbor
/// connectivity (corner, edge, and face adjacency).
///
/// Returns the label array (0 = background, components numbered from 1) and
/// the component count. Grids with a singleton z axis degenerate to the 2-D
/// 8-connectivity case.
// Iterative flood fill; recursion would overflow on large solid regions.
#[must_use = "returns the label array and component count"]
pub fn label_components(mask: &Array3<bool>) -> (Array3<u32>, u32) {
    let dim = mask.dim();
    let mut labels = Array3::<u32>::zeros(dim);
    let mut current = 0u32;
    let mut pending: Vec<(usize, usize, usize)> = Vec::new();

    for ((x, y, z), &occupied) in mask.indexed_iter() {
        if !occupied || labels[(x, y, z)] != 0 {
            continue;
        }
        current += 1;
        labels[(x, y, z)] = current;
        pending.push((x, y, z));

        while let Some((cx, cy, cz)) = pending.pop() {
            for nx in neighbor_range(cx, dim.0) {
                for ny in neighbor_range(cy, dim.1) {
                    for nz in neighbor_range(cz, dim.2) {
                        if (nx, ny, nz) == (cx, cy, cz) {
                            continue;
                        }
                        if mask[(nx, ny, nz)] && labels[(nx, ny, nz)] == 0 {
                            labels[(nx, ny, nz)] = current;
                            pending.push((nx, ny, nz));
                        }
                    }
                }
            }
        }
    }

    (labels, current)
}

#[inline]
fn neighbor_range(index: usize, len: usize) -> std::ops::RangeInclusive<usize> {
    index.saturating_sub(1)..=(index + 1).min(len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn shift_reduces_each_axis_by_one() {
        let nodes = Array2::from_elem((4, 3), false);
        assert_eq!(shift_to_cells(&nodes).dim(), (3, 2));
    }

    #[test]
    fn any_bounding_node_occupies_the_cell() {
        // A single occupied node lights up every cell it bounds.
        let nodes = array![
            [false, false, false],
            [false, true, false],
            [false, false, false],
        ];
        let cells = shift_to_cells(&nodes);
        assert_eq!(cells, array![[true, true], [true, true]]);
    }

    #[test]
    fn unoccupied_nodes_leave_cells_empty() {
        let mut nodes = Array2::from_elem((3, 3), false);
        nodes[(0, 0)] = true;
        let cells = shift_to_cells(&nodes);
        assert_eq!(
            cells,
            array![[true, false], [false, false]]
        );
    }

    #[test]
    fn diagonally_touching_blocks_form_one_component() {
        // Two 2x2 blocks meeting only at a corner: full connectivity must
        // merge them into a single component.
        let mut mask = Array3::from_elem((4, 4, 1), false);
        for (x, y) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            mask[(x, y, 0)] = true;
        }
        for (x, y) in [(2, 2), (2, 3), (3, 2), (3, 3)] {
            mask[(x, y, 0)] = true;
        }
        let (_, count) = label_components(&mask);
        assert_eq!(count, 1);
    }

    #[test]
    fn separated_blocks_form_two_components() {
        let mut mask = Array3::from_elem((5, 5, 1), false);
        mask[(0, 0, 0)] = true;
        mask[(4, 4, 0)] = true;
        let (labels, count) = label_components(&mask);
        assert_eq!(count, 2);
        assert_ne!(labels[(0, 0, 0)], labels[(4, 4, 0)]);
        assert_eq!(labels[(2, 2, 0)], 0);
    }

    #[test]
    fn corner_adjacency_in_three_dimensions() {
        // Two cells sharing only a cube corner still connect.
        let mut mask = Array3::from_elem((2, 2, 2), false);
        mask[(0, 0, 0)] = true;
        mask[(1, 1, 1)] = true;
        let (_, count) = label_components(&mask);
        assert_eq!(count, 1);
    }
}
