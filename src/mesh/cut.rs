use crate::config::GdConfig;
use crate::error::GdError;
use crate::grid::StructuredGrid2d;
use crate::level_set::{DesignState, LevelSet};
use crate::mesh::stencil::{check_grid_compatibility, ground_stencil_vertices, repair_stencil, PushDirection};
use crate::mesh::{private, GalerkinMesh};
use crate::Real;
use log::debug;

/// A Galerkin-Difference mesh restricted to the region cut out by a level set.
///
/// A cell is active if at least one of its corners has a non-positive level set value, and the
/// nodes are the corners of the active cells. Nodes are ordered by ascending vertex index and
/// elements by ascending cell index, so identical inputs always produce identical meshes.
///
/// Stencil vertices that fall outside the active region are moved along the push direction
/// of their cell, derived from the level set gradient at the cell centroid. All stencils are
/// computed and verified during construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CutMesh<T: Real> {
    grid: StructuredGrid2d<T>,
    nodes_per_dim: usize,
    active_vertices: Vec<bool>,
    active_cells: Vec<bool>,
    node_to_vertex: Vec<usize>,
    vertex_to_node: Vec<Option<usize>>,
    element_to_cell: Vec<usize>,
    push_directions: Vec<Option<PushDirection>>,
    stencils: Vec<usize>,
    num_repaired_elements: usize,
}

fn activate_cells<T: Real>(grid: &StructuredGrid2d<T>, vertex_inside: &[bool]) -> Vec<bool> {
    (0..grid.num_cells())
        .map(|cell| grid.cell_vertices(cell).iter().any(|&v| vertex_inside[v]))
        .collect()
}

impl<T: Real> CutMesh<T> {
    pub fn new(grid: StructuredGrid2d<T>, level_set: &impl LevelSet<T>, config: &GdConfig) -> Result<Self, GdError> {
        let vertex_inside: Vec<bool> = (0..grid.num_vertices())
            .map(|v| level_set.is_inside(&grid.vertex_position(v)))
            .collect();
        Self::build(grid, &vertex_inside, level_set, config)
    }

    /// Builds the mesh cut out by the current level set design.
    ///
    /// Vertices are classified by their stored level set values and push directions use the
    /// gradient of the bilinear interpolant.
    pub fn from_design(design: &DesignState<T>, config: &GdConfig) -> Result<Self, GdError> {
        let vertex_inside: Vec<bool> = design.values().iter().map(|&phi| phi <= T::zero()).collect();
        Self::build(design.grid().clone(), &vertex_inside, design, config)
    }

    fn build(
        grid: StructuredGrid2d<T>,
        vertex_inside: &[bool],
        level_set: &impl LevelSet<T>,
        config: &GdConfig,
    ) -> Result<Self, GdError> {
        let np = config.nodes_per_dim;
        check_grid_compatibility(&grid, np)?;

        let active_cells = activate_cells(&grid, vertex_inside);

        let mut active_vertices = vec![false; grid.num_vertices()];
        for cell in (0..grid.num_cells()).filter(|&c| active_cells[c]) {
            for v in grid.cell_vertices(cell) {
                active_vertices[v] = true;
            }
        }

        let node_to_vertex: Vec<usize> = (0..grid.num_vertices())
            .filter(|&v| active_vertices[v])
            .collect();
        let mut vertex_to_node = vec![None; grid.num_vertices()];
        for (node, &vertex) in node_to_vertex.iter().enumerate() {
            vertex_to_node[vertex] = Some(node);
        }

        let element_to_cell: Vec<usize> = (0..grid.num_cells())
            .filter(|&c| active_cells[c])
            .collect();

        let push_directions: Vec<_> = (0..grid.num_cells())
            .map(|cell| {
                active_cells[cell]
                    .then(|| PushDirection::from_gradient(&level_set.gradient(&grid.cell_centroid(cell))))
                    .flatten()
            })
            .collect();

        let npe = np * np;
        let mut stencils = vec![0; element_to_cell.len() * npe];
        let mut num_repaired_elements = 0;
        for (&cell, stencil) in element_to_cell.iter().zip(stencils.chunks_exact_mut(npe)) {
            ground_stencil_vertices(&grid, np, cell, stencil);
            let num_moved = repair_stencil(
                &grid,
                &active_vertices,
                cell,
                push_directions[cell],
                np,
                config.stencil_repair,
                stencil,
            )?;
            if num_moved > 0 {
                num_repaired_elements += 1;
            }
            for vertex in stencil.iter_mut() {
                // Repair only ever produces active vertices
                *vertex = vertex_to_node[*vertex].ok_or(GdError::StencilRepairFailed {
                    cell,
                    vertex: *vertex,
                    direction: push_directions[cell],
                })?;
            }
        }

        debug!(
            "Built cut mesh with {} nodes and {} elements ({} repaired stencils)",
            node_to_vertex.len(),
            element_to_cell.len(),
            num_repaired_elements
        );

        Ok(Self {
            grid,
            nodes_per_dim: np,
            active_vertices,
            active_cells,
            node_to_vertex,
            vertex_to_node,
            element_to_cell,
            push_directions,
            stencils,
            num_repaired_elements,
        })
    }

    pub fn node_to_vertex(&self) -> &[usize] {
        &self.node_to_vertex
    }

    pub fn element_to_cell(&self) -> &[usize] {
        &self.element_to_cell
    }

    pub fn vertex_node(&self, vertex: usize) -> Option<usize> {
        self.vertex_to_node[vertex]
    }

    pub fn is_active_vertex(&self, vertex: usize) -> bool {
        self.active_vertices[vertex]
    }

    pub fn is_active_cell(&self, cell: usize) -> bool {
        self.active_cells[cell]
    }

    /// Push direction of an active cell. `None` for inactive cells and vanishing gradients.
    pub fn push_direction(&self, cell: usize) -> Option<PushDirection> {
        self.push_directions[cell]
    }

    pub fn num_repaired_elements(&self) -> usize {
        self.num_repaired_elements
    }

    /// Whether the design still activates exactly the cells of this mesh.
    ///
    /// If it does, the mesh topology remains valid for the design and need not be rebuilt.
    pub fn is_consistent_with(&self, design: &DesignState<T>) -> bool {
        if design.grid() != &self.grid {
            return false;
        }
        let vertex_inside: Vec<bool> = design.values().iter().map(|&phi| phi <= T::zero()).collect();
        activate_cells(&self.grid, &vertex_inside) == self.active_cells
    }
}

impl<T: Real> private::Sealed for CutMesh<T> {}

impl<T: Real> GalerkinMesh<T> for CutMesh<T> {
    fn grid(&self) -> &StructuredGrid2d<T> {
        &self.grid
    }

    fn nodes_per_dim(&self) -> usize {
        self.nodes_per_dim
    }

    fn num_nodes(&self) -> usize {
        self.node_to_vertex.len()
    }

    fn num_elements(&self) -> usize {
        self.element_to_cell.len()
    }

    fn node_vertex(&self, node: usize) -> usize {
        self.node_to_vertex[node]
    }

    fn element_cell(&self, element: usize) -> usize {
        self.element_to_cell[element]
    }

    fn element_nodes(&self, element: usize) -> &[usize] {
        let npe = self.nodes_per_element();
        &self.stencils[npe * element..npe * (element + 1)]
    }
}
