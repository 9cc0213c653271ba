use cutgd::grid::StructuredGrid2d;
use cutgd::level_set::{CircleLevelSet, DesignState, LevelSet, LineLevelSet};
use cutgd::mesh::stencil::{ground_stencil_vertices, PushDirection};
use cutgd::mesh::{CutMesh, GalerkinMesh, GridMesh};
use cutgd::proptest::{circle_level_set, design_state, line_level_set, structured_grid};
use cutgd::{GdConfig, GdError, StencilRepair};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point2, Vector2};
use proptest::prelude::*;
use std::collections::HashSet;

fn unit_grid(cells: usize) -> StructuredGrid2d<f64> {
    StructuredGrid2d::from_extents([cells, cells], [1.0, 1.0]).unwrap()
}

/// The domain below the line `y = 0.4 x + 0.7`, which leaves out the upper left corner of the unit square.
fn sloped_line() -> LineLevelSet<f64> {
    LineLevelSet { k: 0.4, b: 0.7 }
}

/// A horizontal band of half-width `half_width` around `y = center`.
struct BandLevelSet {
    center: f64,
    half_width: f64,
}

impl LevelSet<f64> for BandLevelSet {
    fn value(&self, x: &Point2<f64>) -> f64 {
        (x.y - self.center).abs() - self.half_width
    }

    fn gradient(&self, x: &Point2<f64>) -> Vector2<f64> {
        Vector2::new(0.0, (x.y - self.center).signum())
    }
}

#[test]
fn sloped_line_cut_mesh() {
    let grid = unit_grid(5);
    let mesh = CutMesh::new(grid.clone(), &sloped_line(), &GdConfig::default()).unwrap();

    // Only the upper left cell and its exclusive corner lie outside the domain
    assert_eq!(mesh.num_elements(), 24);
    assert_eq!(mesh.num_nodes(), 35);
    assert!(!mesh.is_active_cell(grid.cell_index(0, 4)));
    assert!(!mesh.is_active_vertex(grid.vertex_index(0, 5)));
    assert!(mesh.is_active_vertex(grid.vertex_index(0, 4)));
    assert!(mesh.is_active_vertex(grid.vertex_index(1, 5)));
    assert_eq!(mesh.vertex_node(grid.vertex_index(0, 5)), None);

    // The stencils of the three cells next to the missing corner contain it and need repair
    assert_eq!(mesh.num_repaired_elements(), 3);
    for (i, j) in [(0, 3), (1, 3), (1, 4)] {
        assert_eq!(mesh.push_direction(grid.cell_index(i, j)), Some(PushDirection::NegativeY));
    }
    assert_eq!(mesh.push_direction(grid.cell_index(0, 4)), None);
}

#[test]
fn repaired_stencil_replaces_inactive_corner() {
    let grid = unit_grid(5);
    let mesh = CutMesh::new(grid.clone(), &sloped_line(), &GdConfig::default()).unwrap();

    let cell = grid.cell_index(0, 3);
    let element = mesh
        .element_to_cell()
        .iter()
        .position(|&c| c == cell)
        .unwrap();
    let vertices: Vec<_> = mesh
        .element_nodes(element)
        .iter()
        .map(|&node| mesh.node_vertex(node))
        .collect();

    let mut expected = vec![0; 16];
    ground_stencil_vertices(&grid, 4, cell, &mut expected);
    // (0, 5) is pushed four steps down to (0, 1)
    let replaced = expected
        .iter()
        .position(|&v| v == grid.vertex_index(0, 5))
        .unwrap();
    expected[replaced] = grid.vertex_index(0, 1);
    assert_eq!(vertices, expected);
}

#[test]
fn nodes_and_elements_are_sorted_by_grid_index() {
    let mesh = CutMesh::new(unit_grid(5), &sloped_line(), &GdConfig::default()).unwrap();
    assert!(mesh.node_to_vertex().windows(2).all(|w| w[0] < w[1]));
    assert!(mesh.element_to_cell().windows(2).all(|w| w[0] < w[1]));
    assert_eq!(mesh.element_to_cell()[0], 0);
}

#[test]
fn mesh_construction_is_deterministic() {
    let config = GdConfig::default();
    let a = CutMesh::new(unit_grid(10), &sloped_line(), &config).unwrap();
    let b = CutMesh::new(unit_grid(10), &sloped_line(), &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn full_domain_matches_grid_mesh() {
    let grid = unit_grid(6);
    let everywhere = LineLevelSet { k: 0.0, b: 10.0 };
    let cut = CutMesh::new(grid.clone(), &everywhere, &GdConfig::default()).unwrap();
    let full = GridMesh::new(grid.clone(), 4).unwrap();

    assert_eq!(cut.num_nodes(), grid.num_vertices());
    assert_eq!(cut.num_elements(), grid.num_cells());
    assert_eq!(cut.num_repaired_elements(), 0);
    for element in 0..cut.num_elements() {
        assert_eq!(cut.element_nodes(element), full.element_nodes(element));
    }
}

#[test]
fn from_design_agrees_with_sampled_level_set() {
    let grid = unit_grid(5);
    let config = GdConfig::default();
    let design = DesignState::from_level_set(grid.clone(), &sloped_line());
    let from_level_set = CutMesh::new(grid, &sloped_line(), &config).unwrap();
    let from_design = CutMesh::from_design(&design, &config).unwrap();

    assert_eq!(from_design.node_to_vertex(), from_level_set.node_to_vertex());
    assert_eq!(from_design.element_to_cell(), from_level_set.element_to_cell());
    for element in 0..from_design.num_elements() {
        assert_eq!(from_design.element_nodes(element), from_level_set.element_nodes(element));
    }
}

#[test]
fn consistency_with_updated_design() {
    let grid = unit_grid(5);
    let mut design = DesignState::from_level_set(grid.clone(), &sloped_line());
    let mesh = CutMesh::from_design(&design, &GdConfig::default()).unwrap();
    assert!(mesh.is_consistent_with(&design));

    // Changing values without crossing zero keeps the topology
    design.values_mut()[grid.vertex_index(3, 1)] -= 0.5;
    design.values_mut()[grid.vertex_index(0, 4)] += 0.5;
    assert!(mesh.is_consistent_with(&design));

    // Moving the missing corner inside activates the upper left cell
    design.values_mut()[grid.vertex_index(0, 5)] = -0.1;
    assert!(!mesh.is_consistent_with(&design));
}

#[test]
fn thin_band_cannot_be_repaired() {
    let grid = unit_grid(10);
    let band = BandLevelSet {
        center: 0.5,
        half_width: 0.05,
    };
    for policy in [StencilRepair::SingleStep, StencilRepair::Iterative] {
        let config = GdConfig::default().with_stencil_repair(policy);
        let result = CutMesh::new(grid.clone(), &band, &config);
        match result {
            Err(GdError::StencilRepairFailed { cell, direction, .. }) => {
                assert_eq!(cell, grid.cell_index(0, 4));
                assert_eq!(direction, Some(PushDirection::PositiveY));
            }
            other => panic!("expected stencil repair failure, got {other:?}"),
        }
    }
}

/// Horizontal stripes of outside vertices on a unit grid, with a constant upward gradient so that
/// every stencil is repaired downwards.
struct StripedLevelSet {
    cells: usize,
    outside_rows: &'static [usize],
}

impl LevelSet<f64> for StripedLevelSet {
    fn value(&self, x: &Point2<f64>) -> f64 {
        let row = (x.y * self.cells as f64).round() as usize;
        if self.outside_rows.contains(&row) {
            1.0
        } else {
            -1.0
        }
    }

    fn gradient(&self, _x: &Point2<f64>) -> Vector2<f64> {
        Vector2::new(0.0, 1.0)
    }
}

#[test]
fn iterative_repair_skips_inactive_rows() {
    // Vertex rows 8 and 12 are inactive. The stencils of the cells in row 10 span vertex rows 9 to 12,
    // and the top row must be pushed down twice.
    let grid = unit_grid(12);
    let stripes = StripedLevelSet {
        cells: 12,
        outside_rows: &[7, 8, 9, 11, 12],
    };

    let single_step = GdConfig::default().with_stencil_repair(StencilRepair::SingleStep);
    let result = CutMesh::new(grid.clone(), &stripes, &single_step);
    assert_eq!(
        result,
        Err(GdError::StencilRepairFailed {
            cell: grid.cell_index(0, 10),
            vertex: grid.vertex_index(0, 12),
            direction: Some(PushDirection::NegativeY),
        })
    );

    let iterative = GdConfig::default().with_stencil_repair(StencilRepair::Iterative);
    let mesh = CutMesh::new(grid.clone(), &stripes, &iterative).unwrap();
    assert!(!mesh.is_active_vertex(grid.vertex_index(0, 8)));
    assert!(!mesh.is_active_vertex(grid.vertex_index(0, 12)));
    // Cell rows 6, 9 and 10 have inactive vertices in their stencils
    assert_eq!(mesh.num_repaired_elements(), 36);

    let cell = grid.cell_index(0, 10);
    let element = mesh
        .element_to_cell()
        .iter()
        .position(|&c| c == cell)
        .unwrap();
    let rows: HashSet<_> = mesh
        .element_nodes(element)
        .iter()
        .map(|&node| grid.vertex_coords(mesh.node_vertex(node))[1])
        .collect();
    assert_eq!(rows, HashSet::from([4, 9, 10, 11]));
}

#[test]
fn invalid_stencil_widths_are_rejected() {
    for nodes_per_dim in [0, 1, 3, 5] {
        let config = GdConfig::default().with_nodes_per_dim(nodes_per_dim);
        let result = CutMesh::new(unit_grid(8), &sloped_line(), &config);
        assert_eq!(result, Err(GdError::InvalidStencilWidth { nodes_per_dim }));
    }
}

#[test]
fn grid_must_hold_a_full_stencil() {
    let grid = StructuredGrid2d::from_extents([2, 5], [1.0, 1.0]).unwrap();
    let result = CutMesh::new(grid, &sloped_line(), &GdConfig::default());
    assert_eq!(
        result,
        Err(GdError::GridTooSmall {
            axis: 0,
            cells: 2,
            required: 3
        })
    );

    let grid = StructuredGrid2d::from_extents([6, 4], [1.0, 1.0]).unwrap();
    let config = GdConfig::default().with_nodes_per_dim(6);
    let result = GridMesh::new(grid, config.nodes_per_dim);
    assert_eq!(
        result,
        Err(GdError::GridTooSmall {
            axis: 1,
            cells: 4,
            required: 5
        })
    );

    // Exactly Np - 1 cells suffice
    let grid = StructuredGrid2d::from_extents([3, 3], [1.0, 1.0]).unwrap();
    assert!(GridMesh::new(grid, 4).is_ok());
}

#[test]
fn grid_mesh_element_ranges() {
    let grid = unit_grid(5);
    let mesh = GridMesh::new(grid.clone(), 4).unwrap();
    assert_eq!(mesh.num_nodes(), 36);
    assert_eq!(mesh.num_elements(), 25);
    assert_eq!(mesh.nodes_per_element(), 16);

    let element = grid.cell_index(2, 2);
    let (lower, upper) = mesh.element_vertex_bounds(element);
    assert_scalar_eq!(lower.x, 0.4, comp = abs, tol = 1e-14);
    assert_scalar_eq!(upper.y, 0.6, comp = abs, tol = 1e-14);

    let (lower, upper) = mesh.element_node_bounds(element);
    assert_scalar_eq!(lower.x, 0.2, comp = abs, tol = 1e-14);
    assert_scalar_eq!(lower.y, 0.2, comp = abs, tol = 1e-14);
    assert_scalar_eq!(upper.x, 0.8, comp = abs, tol = 1e-14);
    assert_scalar_eq!(upper.y, 0.8, comp = abs, tol = 1e-14);

    // Clamped at the corner of the grid
    let (lower, upper) = mesh.element_node_bounds(grid.cell_index(0, 4));
    assert_scalar_eq!(lower.x, 0.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(lower.y, 0.4, comp = abs, tol = 1e-14);
    assert_scalar_eq!(upper.x, 0.6, comp = abs, tol = 1e-14);
    assert_scalar_eq!(upper.y, 1.0, comp = abs, tol = 1e-14);
}

/// Checks the structural invariants every successfully built cut mesh satisfies.
fn check_cut_mesh_invariants(
    mesh: &CutMesh<f64>,
    vertex_inside: impl Fn(usize) -> bool,
) -> Result<(), TestCaseError> {
    let grid = mesh.grid();

    // Node numbering is a bijection between nodes and active vertices
    for (node, &vertex) in mesh.node_to_vertex().iter().enumerate() {
        prop_assert!(mesh.is_active_vertex(vertex));
        prop_assert_eq!(mesh.vertex_node(vertex), Some(node));
    }
    let num_active_vertices = (0..grid.num_vertices())
        .filter(|&v| mesh.is_active_vertex(v))
        .count();
    prop_assert_eq!(num_active_vertices, mesh.num_nodes());

    // A cell is active exactly when one of its corners is inside
    for cell in 0..grid.num_cells() {
        let any_inside = grid.cell_vertices(cell).iter().any(|&v| vertex_inside(v));
        prop_assert_eq!(mesh.is_active_cell(cell), any_inside);
    }

    // Stencils consist of distinct nodes
    let np = mesh.nodes_per_dim();
    for element in 0..mesh.num_elements() {
        prop_assert!(mesh.is_active_cell(mesh.element_cell(element)));
        let nodes = mesh.element_nodes(element);
        prop_assert_eq!(nodes.len(), np * np);
        let distinct: HashSet<_> = nodes.iter().collect();
        prop_assert_eq!(distinct.len(), nodes.len());
        prop_assert!(nodes.iter().all(|&node| node < mesh.num_nodes()));
    }
    Ok(())
}

#[test]
fn fine_grid_disk_and_hole_are_repaired() {
    let grid = unit_grid(20);
    let center = Point2::new(0.5, 0.5);
    for policy in [StencilRepair::SingleStep, StencilRepair::Iterative] {
        let config = GdConfig::default().with_stencil_repair(policy);
        for circle in [CircleLevelSet::new(center, 0.3), CircleLevelSet::hole(center, 0.3)] {
            let mesh = CutMesh::new(grid.clone(), &circle, &config).unwrap();
            check_cut_mesh_invariants(&mesh, |v| circle.is_inside(&grid.vertex_position(v))).unwrap();
            assert!(mesh.num_repaired_elements() > 0);
            assert!(mesh.num_elements() < grid.num_cells());
        }
    }

    // The hole removes the vertices within 0.3 of the center, the disk keeps them
    let disk = CutMesh::new(grid.clone(), &CircleLevelSet::new(center, 0.3), &GdConfig::default()).unwrap();
    let hole = CutMesh::new(grid.clone(), &CircleLevelSet::hole(center, 0.3), &GdConfig::default()).unwrap();
    let middle = grid.vertex_index(10, 10);
    assert!(disk.is_active_vertex(middle));
    assert!(!hole.is_active_vertex(middle));
    assert!(!disk.is_active_vertex(grid.vertex_index(0, 0)));
    assert!(hole.is_active_vertex(grid.vertex_index(0, 0)));
}

proptest! {
    #[test]
    fn cut_meshes_from_lines_are_consistent(
        cells in 3..=12usize,
        line in line_level_set(),
        iterative in any::<bool>()
    ) {
        let grid = unit_grid(cells);
        let policy = if iterative { StencilRepair::Iterative } else { StencilRepair::SingleStep };
        let config = GdConfig::default().with_stencil_repair(policy);
        match CutMesh::new(grid.clone(), &line, &config) {
            Ok(mesh) => check_cut_mesh_invariants(&mesh, |v| line.is_inside(&grid.vertex_position(v)))?,
            Err(GdError::StencilRepairFailed { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn cut_meshes_from_circles_are_consistent(cells in 4..=12usize, circle in circle_level_set()) {
        let grid = unit_grid(cells);
        match CutMesh::new(grid.clone(), &circle, &GdConfig::default()) {
            Ok(mesh) => check_cut_mesh_invariants(&mesh, |v| circle.is_inside(&grid.vertex_position(v)))?,
            Err(GdError::StencilRepairFailed { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn cut_meshes_from_random_designs_are_consistent_or_fail_cleanly(
        design in design_state(structured_grid(3, 8)),
        nodes_per_dim in prop_oneof![Just(2usize), Just(4usize)]
    ) {
        let config = GdConfig::default().with_nodes_per_dim(nodes_per_dim);
        match CutMesh::from_design(&design, &config) {
            Ok(mesh) => {
                check_cut_mesh_invariants(&mesh, |v| design.vertex_value(v) <= 0.0)?;
                prop_assert!(mesh.is_consistent_with(&design));
            }
            Err(GdError::StencilRepairFailed { cell, .. }) => {
                prop_assert!(cell < design.grid().num_cells());
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }
}
