//! Galerkin-Difference meshes over structured background grids.
//!
//! A mesh selects a subset of the background grid: its *nodes* are grid vertices carrying
//! degrees of freedom, and its *elements* are grid cells. Every element is supported by a stencil
//! of `Np_1d x Np_1d` nodes, listed x-fastest.
use crate::grid::StructuredGrid2d;
use crate::Real;
use nalgebra::Point2;

pub mod cut;
pub mod stencil;

pub use cut::CutMesh;

mod private {
    pub trait Sealed {}
}

/// Read-only capabilities shared by [`GridMesh`] and [`CutMesh`].
///
/// This trait is sealed: the two mesh kinds provided by this crate are the only implementors.
pub trait GalerkinMesh<T: Real>: private::Sealed + Sync {
    fn grid(&self) -> &StructuredGrid2d<T>;

    /// Number of stencil nodes per dimension (`Np_1d`).
    fn nodes_per_dim(&self) -> usize;

    fn num_nodes(&self) -> usize;

    fn num_elements(&self) -> usize;

    /// The grid vertex that carries the given node.
    fn node_vertex(&self, node: usize) -> usize;

    /// The background cell covered by the given element.
    fn element_cell(&self, element: usize) -> usize;

    /// The stencil of the element, as `Np_1d^2` node indices.
    fn element_nodes(&self, element: usize) -> &[usize];

    fn nodes_per_element(&self) -> usize {
        self.nodes_per_dim() * self.nodes_per_dim()
    }

    fn node_position(&self, node: usize) -> Point2<T> {
        self.grid().vertex_position(self.node_vertex(node))
    }

    /// Bounds of the background cell of the element.
    fn element_vertex_bounds(&self, element: usize) -> (Point2<T>, Point2<T>) {
        self.grid().cell_bounds(self.element_cell(element))
    }

    /// Bounding box of the stencil node positions of the element.
    fn element_node_bounds(&self, element: usize) -> (Point2<T>, Point2<T>) {
        let mut nodes = self.element_nodes(element).iter();
        let first = nodes
            .next()
            .map(|&node| self.node_position(node))
            .unwrap_or_else(Point2::origin);
        nodes.fold((first, first), |(lower, upper), &node| {
            let x = self.node_position(node);
            (lower.inf(&x), upper.sup(&x))
        })
    }
}

/// The mesh without a level set: every grid vertex is a node and every cell an element.
///
/// Used to hold fields that live on the whole background grid, such as the level set itself.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMesh<T: Real> {
    grid: StructuredGrid2d<T>,
    nodes_per_dim: usize,
    stencils: Vec<usize>,
}

impl<T: Real> GridMesh<T> {
    pub fn new(grid: StructuredGrid2d<T>, nodes_per_dim: usize) -> Result<Self, crate::GdError> {
        stencil::check_grid_compatibility(&grid, nodes_per_dim)?;
        let npe = nodes_per_dim * nodes_per_dim;
        let mut stencils = vec![0; grid.num_cells() * npe];
        for (cell, stencil) in stencils.chunks_exact_mut(npe).enumerate() {
            stencil::ground_stencil_vertices(&grid, nodes_per_dim, cell, stencil);
        }
        Ok(Self {
            grid,
            nodes_per_dim,
            stencils,
        })
    }
}

impl<T: Real> private::Sealed for GridMesh<T> {}

impl<T: Real> GalerkinMesh<T> for GridMesh<T> {
    fn grid(&self) -> &StructuredGrid2d<T> {
        &self.grid
    }

    fn nodes_per_dim(&self) -> usize {
        self.nodes_per_dim
    }

    fn num_nodes(&self) -> usize {
        self.grid.num_vertices()
    }

    fn num_elements(&self) -> usize {
        self.grid.num_cells()
    }

    fn node_vertex(&self, node: usize) -> usize {
        node
    }

    fn element_cell(&self, element: usize) -> usize {
        element
    }

    fn element_nodes(&self, element: usize) -> &[usize] {
        let npe = self.nodes_per_element();
        &self.stencils[npe * element..npe * (element + 1)]
    }
}
