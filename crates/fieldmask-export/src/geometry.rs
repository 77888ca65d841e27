//! Polygonization of labeled mask components.
//!
//! A connected component of the cross-section mask has to become one or more
//! simple polygons before it can be written to the vector layout. Two
//! strategies are available: the convex hull of the component's cell centers
//! (fast, but concave and ring-shaped components are approximated by their
//! hull), and an exact rectilinear trace of the component's cell boundary.

use std::collections::BTreeMap;

use ndarray::Array1;

/// How a connected component is turned into polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolygonStrategy {
    /// Convex hull of the component's cell-center coordinates. One polygon
    /// per component; concave or multiply-connected components are
    /// approximated by their hull.
    #[default]
    ConvexHull,
    /// Exact rectilinear outline of the component's cells. Concave outlines
    /// are preserved and ring-shaped components produce one loop per
    /// boundary.
    CellOutline,
}

/// Convex hull of a point set via Andrew's monotone chain, counter-clockwise,
/// without a repeated closing point. Collinear points are dropped.
#[must_use = "returns the hull vertices"]
pub(crate) fn convex_hull(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut sorted: Vec<(f64, f64)> = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Positions of the grid-line corners bounding a run of cell centers.
///
/// For `n` centers this yields `n + 1` corner positions: interior corners are
/// midpoints of neighboring centers, the outermost ones extrapolate by half
/// the nearest step (or by `fallback_half_step` for a single-cell axis).
#[must_use = "returns the corner positions"]
pub(crate) fn corner_positions(centers: &Array1<f64>, fallback_half_step: f64) -> Vec<f64> {
    let n = centers.len();
    let mut corners = Vec::with_capacity(n + 1);
    if n == 0 {
        return corners;
    }
    let first_half = if n > 1 {
        (centers[1] - centers[0]) / 2.0
    } else {
        fallback_half_step
    };
    let last_half = if n > 1 {
        (centers[n - 1] - centers[n - 2]) / 2.0
    } else {
        fallback_half_step
    };
    corners.push(centers[0] - first_half);
    for i in 1..n {
        corners.push((centers[i - 1] + centers[i]) / 2.0);
    }
    corners.push(centers[n - 1] + last_half);
    corners
}

/// Trace the exact rectilinear boundary of a set of cells.
///
/// Cells are `(ix, iy)` indices into the corner grids. Each closed boundary
/// loop becomes one polygon; outer boundaries come out counter-clockwise and
/// hole boundaries clockwise, both in corner coordinates mapped through
/// `corner_x`/`corner_y`.
#[must_use = "returns the boundary polygons"]
pub(crate) fn cell_outlines(
    cells: &[(usize, usize)],
    corner_x: &[f64],
    corner_y: &[f64],
) -> Vec<Vec<(f64, f64)>> {
    let occupied: std::collections::HashSet<(usize, usize)> = cells.iter().copied().collect();

    // Directed boundary edges between corner-lattice points, interior kept on
    // the left. BTreeMap gives a deterministic walk order.
    let mut outgoing: BTreeMap<(usize, usize), Vec<(usize, usize)>> = BTreeMap::new();
    let mut push = |from: (usize, usize), to: (usize, usize)| {
        outgoing.entry(from).or_default().push(to);
    };
    for &(i, j) in cells {
        if j == 0 || !occupied.contains(&(i, j - 1)) {
            push((i, j), (i + 1, j));
        }
        if !occupied.contains(&(i + 1, j)) {
            push((i + 1, j), (i + 1, j + 1));
        }
        if !occupied.contains(&(i, j + 1)) {
            push((i + 1, j + 1), (i, j + 1));
        }
        if i == 0 || !occupied.contains(&(i - 1, j)) {
            push((i, j + 1), (i, j));
        }
    }

    let mut loops = Vec::new();
    while let Some((&start, _)) = outgoing.iter().find(|(_, ends)| !ends.is_empty()) {
        let mut corners = vec![start];
        let mut current = start;
        let mut incoming: Option<(i64, i64)> = None;

        loop {
            let ends = outgoing.get_mut(&current).expect("walk stays on boundary");
            let next = match ends.len() {
                0 => unreachable!("every boundary corner has an unused outgoing edge"),
                1 => ends.remove(0),
                // Pinch corner (diagonally touching cells): prefer the
                // sharpest left turn so each loop hugs one side.
                _ => {
                    let (din_x, din_y) = incoming.expect("pinch cannot start a loop");
                    let best = ends
                        .iter()
                        .enumerate()
                        .max_by_key(|(_, &(ex, ey))| {
                            let dout_x = ex as i64 - current.0 as i64;
                            let dout_y = ey as i64 - current.1 as i64;
                            din_x * dout_y - din_y * dout_x
                        })
                        .map(|(idx, _)| idx)
                        .expect("candidate list is non-empty");
                    ends.remove(best)
                }
            };
            incoming = Some((
                next.0 as i64 - current.0 as i64,
                next.1 as i64 - current.1 as i64,
            ));
            current = next;
            if current == start {
                break;
            }
            corners.push(current);
        }

        loops.push(
            corners
                .into_iter()
                .map(|(i, j)| (corner_x[i], corner_y[j]))
                .collect(),
        );
    }
    simplify_collinear(loops)
}

/// Drop vertices that sit on a straight run between their neighbors.
fn simplify_collinear(loops: Vec<Vec<(f64, f64)>>) -> Vec<Vec<(f64, f64)>> {
    loops
        .into_iter()
        .map(|polygon| {
            let n = polygon.len();
            polygon
                .iter()
                .enumerate()
                .filter(|&(k, &(px, py))| {
                    let (ax, ay) = polygon[(k + n - 1) % n];
                    let (bx, by) = polygon[(k + 1) % n];
                    ((px - ax) * (by - ay) - (py - ay) * (bx - ax)).abs() > f64::EPSILON
                })
                .map(|(_, &p)| p)
                .collect()
        })
        .collect()
}
