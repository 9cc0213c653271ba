//! Reusable per-element scratch storage.
use crate::basis::ElementBasis;
use crate::mesh::GalerkinMesh;
use crate::quadrature::{LevelSetQuadratureTable, QuadratureTable};
use crate::Real;
use eyre::eyre;
use nalgebra::{DMatrix, DVector, Matrix2, Point2, Vector2};

/// Shape function data of one element at one reference point.
#[derive(Debug)]
pub struct BasisFunctionBuffer<T: Real> {
    element_nodes: Vec<usize>,
    values: Vec<T>,
    gradients: Vec<Vector2<T>>,
    physical_gradients: Vec<Vector2<T>>,
    hessians: Vec<Matrix2<T>>,
}

impl<T: Real> Default for BasisFunctionBuffer<T> {
    fn default() -> Self {
        Self {
            element_nodes: Vec::new(),
            values: Vec::new(),
            gradients: Vec::new(),
            physical_gradients: Vec::new(),
            hessians: Vec::new(),
        }
    }
}

impl<T: Real> BasisFunctionBuffer<T> {
    pub fn resize(&mut self, node_count: usize) {
        self.element_nodes.resize(node_count, usize::MAX);
        self.values.resize(node_count, T::zero());
        self.gradients.resize(node_count, Vector2::zeros());
        self.physical_gradients.resize(node_count, Vector2::zeros());
        self.hessians.resize(node_count, Matrix2::zeros());
    }

    /// Copies the stencil of the element and resizes the buffers to match it.
    pub fn populate_element_nodes_from_mesh(
        &mut self,
        element_index: usize,
        mesh: &impl GalerkinMesh<T>,
        basis: &(impl ?Sized + ElementBasis<T>),
    ) -> eyre::Result<()> {
        if element_index >= mesh.num_elements() {
            return Err(eyre!(
                "element index {element_index} out of bounds for mesh with {} elements",
                mesh.num_elements()
            ));
        }
        let nodes = mesh.element_nodes(element_index);
        let node_count = basis.element_node_count(element_index);
        if nodes.len() != node_count {
            return Err(eyre!(
                "basis of element {element_index} has {node_count} functions, but its stencil has {} nodes",
                nodes.len()
            ));
        }
        self.resize(node_count);
        self.element_nodes.copy_from_slice(nodes);
        Ok(())
    }

    /// Evaluates values and reference gradients. Call after
    /// [`populate_element_nodes_from_mesh`](Self::populate_element_nodes_from_mesh).
    pub fn populate_element_basis_from(
        &mut self,
        element_index: usize,
        basis: &(impl ?Sized + ElementBasis<T>),
        xi: &Point2<T>,
    ) {
        basis.populate_element_basis(element_index, xi, &mut self.values, &mut self.gradients);
    }

    pub fn populate_element_hessians_from(
        &mut self,
        element_index: usize,
        basis: &(impl ?Sized + ElementBasis<T>),
        xi: &Point2<T>,
    ) {
        basis.populate_element_hessians(element_index, xi, &mut self.hessians);
    }

    /// Maps reference gradients to physical gradients with `J^{-T}`.
    pub fn compute_physical_gradients(&mut self, inverse_jacobian_transpose: &Matrix2<T>) {
        for (physical, reference) in self.physical_gradients.iter_mut().zip(&self.gradients) {
            *physical = inverse_jacobian_transpose * reference;
        }
    }

    pub fn element_nodes(&self) -> &[usize] {
        &self.element_nodes
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn gradients(&self) -> &[Vector2<T>] {
        &self.gradients
    }

    pub fn physical_gradients(&self) -> &[Vector2<T>] {
        &self.physical_gradients
    }

    pub fn hessians(&self) -> &[Matrix2<T>] {
        &self.hessians
    }
}

/// A buffer for storing the quadrature rule of one element.
#[derive(Debug)]
pub struct QuadratureBuffer<T: Real> {
    weights: Vec<T>,
    points: Vec<Point2<T>>,
    design_dofs: Vec<usize>,
    weight_derivatives: Vec<T>,
    point_derivatives: Vec<Vector2<T>>,
}

impl<T: Real> Default for QuadratureBuffer<T> {
    fn default() -> Self {
        Self {
            weights: Vec::new(),
            points: Vec::new(),
            design_dofs: Vec::new(),
            weight_derivatives: Vec::new(),
            point_derivatives: Vec::new(),
        }
    }
}

impl<T: Real> QuadratureBuffer<T> {
    pub fn resize(&mut self, quadrature_size: usize) {
        self.points.resize(quadrature_size, Point2::origin());
        self.weights.resize(quadrature_size, T::zero());
    }

    pub fn populate_element_quadrature_from_table(
        &mut self,
        element_index: usize,
        table: &(impl ?Sized + QuadratureTable<T>),
    ) -> eyre::Result<()> {
        self.resize(table.element_quadrature_size(element_index));
        table.populate_element_quadrature(element_index, &mut self.points, &mut self.weights)
    }

    /// Populates points, weights, the design dofs of the element and the derivatives of points
    /// and weights with respect to them.
    pub fn populate_element_quadrature_derivatives_from_table(
        &mut self,
        element_index: usize,
        table: &(impl ?Sized + LevelSetQuadratureTable<T>),
    ) -> eyre::Result<()> {
        let quadrature_size = table.element_quadrature_size(element_index);
        let design_count = table.element_design_dof_count(element_index);
        self.resize(quadrature_size);
        self.design_dofs.resize(design_count, usize::MAX);
        self.weight_derivatives
            .resize(quadrature_size * design_count, T::zero());
        self.point_derivatives
            .resize(quadrature_size * design_count, Vector2::zeros());

        table.populate_element_design_dofs(element_index, &mut self.design_dofs);
        table.populate_element_quadrature_derivatives(
            element_index,
            &mut self.points,
            &mut self.weights,
            &mut self.point_derivatives,
            &mut self.weight_derivatives,
        )
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn points(&self) -> &[Point2<T>] {
        &self.points
    }

    pub fn design_dofs(&self) -> &[usize] {
        &self.design_dofs
    }

    /// Derivatives of the weight of point `q` with respect to the element design dofs.
    pub fn weight_derivatives(&self, q: usize) -> &[T] {
        let n = self.design_dofs.len();
        &self.weight_derivatives[n * q..n * (q + 1)]
    }

    /// Derivatives of point `q` with respect to the element design dofs.
    pub fn point_derivatives(&self, q: usize) -> &[Vector2<T>] {
        let n = self.design_dofs.len();
        &self.point_derivatives[n * q..n * (q + 1)]
    }
}

/// Scratch storage for assembling a single element.
///
/// One workspace is kept per thread and reused across elements and calls, so the element loops
/// allocate only when an element is larger than any element seen before.
#[derive(Debug)]
pub struct ElementWorkspace<T: Real> {
    pub basis: BasisFunctionBuffer<T>,
    pub quadrature: QuadratureBuffer<T>,
    pub node_positions: Vec<Point2<T>>,
    pub u_local: DVector<T>,
    pub v_local: DVector<T>,
    pub element_vector: DVector<T>,
    pub element_matrix: DMatrix<T>,
    /// Derivatives of the shape function values along the reference axes, `d N_i / d xi_r`.
    pub value_derivatives: [Vec<T>; 2],
    /// Derivatives of the physical shape function gradients along the reference axes.
    pub gradient_derivatives: [Vec<Vector2<T>>; 2],
}

impl<T: Real> Default for ElementWorkspace<T> {
    fn default() -> Self {
        Self {
            basis: BasisFunctionBuffer::default(),
            quadrature: QuadratureBuffer::default(),
            node_positions: Vec::new(),
            u_local: DVector::zeros(0),
            v_local: DVector::zeros(0),
            element_vector: DVector::zeros(0),
            element_matrix: DMatrix::zeros(0, 0),
            value_derivatives: [Vec::new(), Vec::new()],
            gradient_derivatives: [Vec::new(), Vec::new()],
        }
    }
}
