//! Strategies for property-based testing of grids, level sets and design states.
use crate::grid::StructuredGrid2d;
use crate::level_set::{CircleLevelSet, DesignState, LineLevelSet};
use ::proptest::prelude::*;
use nalgebra::{DVector, Point2};

pub fn point2() -> impl Strategy<Value = Point2<f64>> {
    // Keep coordinates moderate so that level set values stay well-scaled
    let range = -10.0..10.0;
    [range.clone(), range].prop_map(|[x, y]| Point2::new(x, y))
}

/// Grids with between `min_cells` and `max_cells` cells along each axis, positive extents and
/// an arbitrary origin.
pub fn structured_grid(min_cells: usize, max_cells: usize) -> impl Strategy<Value = StructuredGrid2d<f64>> {
    let cells = min_cells.max(1)..=max_cells.max(min_cells.max(1));
    let extent = 0.1..10.0;
    (
        [cells.clone(), cells],
        [extent.clone(), extent],
        point2(),
    )
        .prop_map(|(nxy, lxy, origin)| {
            StructuredGrid2d::new(nxy, lxy, [origin.x, origin.y])
                .expect("strategy only produces valid grids")
        })
}

/// Lines of moderate slope crossing the unit square `[0, 1]^2`.
pub fn line_level_set() -> impl Strategy<Value = LineLevelSet<f64>> {
    (-1.0..1.0, 0.1..0.9).prop_map(|(k, y_mid)| LineLevelSet {
        k,
        b: y_mid - 0.5 * k,
    })
}

/// Circles centered in the unit square, either as a disk domain or as a hole.
pub fn circle_level_set() -> impl Strategy<Value = CircleLevelSet<f64>> {
    ([0.0..1.0, 0.0..1.0], 0.1..0.6, any::<bool>()).prop_map(|([x, y], radius, flip)| CircleLevelSet {
        center: Point2::new(x, y),
        radius,
        flip,
    })
}

/// Design states with independent random vertex values in `[-1, 1]` on the given grids.
///
/// Most such fields are too irregular for stencil repair, which makes them useful for checking
/// that mesh construction either succeeds with a consistent topology or fails cleanly.
pub fn design_state(
    grids: impl Strategy<Value = StructuredGrid2d<f64>>,
) -> impl Strategy<Value = DesignState<f64>> {
    grids.prop_flat_map(|grid| {
        let n = grid.num_vertices();
        ::proptest::collection::vec(-1.0..1.0, n).prop_map(move |values| {
            DesignState::from_values(grid.clone(), DVector::from_vec(values))
                .expect("strategy produces one value per vertex")
        })
    })
}
