//! Global assembly over all elements of a mesh.
use crate::allocators::SolutionAllocator;
use crate::assembly::buffers::ElementWorkspace;
use crate::assembly::local::{add_local_to_global, ElementAssembler};
use crate::assembly::physics::Physics;
use crate::assembly::sparse::{BlockCsrMatrix, BlockMatrixSink};
use crate::basis::ElementBasis;
use crate::error::GdError;
use crate::mesh::GalerkinMesh;
use crate::quadrature::{LevelSetQuadratureTable, QuadratureTable};
use crate::Real;
use nalgebra::{DVector, DVectorView, DefaultAllocator, DimName};
use rayon::prelude::*;
use std::cell::RefCell;
use thread_local::ThreadLocal;

/// Assembles energies, residuals, Jacobians and level-set design derivatives of a physics
/// discretized on a Galerkin mesh.
///
/// Solution vectors store the `S` components of node `i` at `S * i .. S * (i + 1)`, where `S` is
/// the solution dimension of the physics.
///
/// Every entry point has a serial variant and a `par_` variant running the element loop on the
/// rayon thread pool. Parallel variants accumulate into per-thread partial results which are
/// summed once all elements are processed, so they agree with the serial variants up to
/// round-off.
#[derive(Debug)]
pub struct GalerkinAnalysis<'a, T: Real, M, B, Q, P> {
    assembler: ElementAssembler<'a, T, M, B, Q, P>,
    workspace: ThreadLocal<RefCell<ElementWorkspace<T>>>,
}

impl<'a, T, M, B, Q, P> GalerkinAnalysis<'a, T, M, B, Q, P>
where
    T: Real,
    M: GalerkinMesh<T>,
    B: ElementBasis<T>,
    Q: QuadratureTable<T>,
    P: Physics<T>,
    DefaultAllocator: SolutionAllocator<T, P::SolutionDim>,
{
    pub fn new(mesh: &'a M, basis: &'a B, quadrature: &'a Q, physics: &'a P) -> Self {
        Self {
            assembler: ElementAssembler::new(mesh, basis, quadrature, physics),
            workspace: ThreadLocal::new(),
        }
    }

    pub fn mesh(&self) -> &'a M {
        self.assembler.mesh
    }

    pub fn element_assembler(&self) -> &ElementAssembler<'a, T, M, B, Q, P> {
        &self.assembler
    }

    pub fn solution_dim(&self) -> usize {
        P::SolutionDim::dim()
    }

    /// Length of solution vectors, `S * num_nodes`.
    pub fn num_dofs(&self) -> usize {
        self.solution_dim() * self.assembler.mesh.num_nodes()
    }

    fn check_dofs(&self, what: &'static str, vector: &DVectorView<T>) -> Result<(), GdError> {
        if vector.len() != self.num_dofs() {
            return Err(GdError::DimensionMismatch {
                what,
                expected: self.num_dofs(),
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn num_elements(&self) -> usize {
        self.assembler.mesh.num_elements()
    }

    pub fn energy(&self, u: DVectorView<T>) -> eyre::Result<T> {
        self.check_dofs("solution", &u)?;
        let ws = &mut *self.workspace.get_or_default().borrow_mut();
        let mut energy = T::zero();
        for e in 0..self.num_elements() {
            energy += self.assembler.element_energy(ws, e, u)?;
        }
        Ok(energy)
    }

    pub fn par_energy(&self, u: DVectorView<T>) -> eyre::Result<T> {
        self.check_dofs("solution", &u)?;
        (0..self.num_elements())
            .into_par_iter()
            .map(|e| {
                let ws = &mut *self.workspace.get_or_default().borrow_mut();
                self.assembler.element_energy(ws, e, u)
            })
            .try_reduce(T::zero, |a, b| Ok(a + b))
    }

    pub fn residual(&self, u: DVectorView<T>) -> eyre::Result<DVector<T>> {
        self.check_dofs("solution", &u)?;
        let s = self.solution_dim();
        let ws = &mut *self.workspace.get_or_default().borrow_mut();
        let mut residual = DVector::zeros(self.num_dofs());
        for e in 0..self.num_elements() {
            self.assembler.assemble_element_residual(ws, e, u)?;
            add_local_to_global(&ws.element_vector, &mut residual, ws.basis.element_nodes(), s);
        }
        Ok(residual)
    }

    pub fn par_residual(&self, u: DVectorView<T>) -> eyre::Result<DVector<T>> {
        self.check_dofs("solution", &u)?;
        let s = self.solution_dim();
        let n = self.num_dofs();
        let partial_residuals = ThreadLocal::new();
        (0..self.num_elements())
            .into_par_iter()
            .try_for_each(|e| -> eyre::Result<()> {
                let ws = &mut *self.workspace.get_or_default().borrow_mut();
                self.assembler.assemble_element_residual(ws, e, u)?;
                let partial = &mut *partial_residuals
                    .get_or(|| RefCell::new(DVector::zeros(n)))
                    .borrow_mut();
                add_local_to_global(&ws.element_vector, partial, ws.basis.element_nodes(), s);
                Ok(())
            })?;
        Ok(sum_partial_vectors(partial_residuals, n))
    }

    /// Computes the product of the residual Jacobian at `u` with `direction`.
    pub fn jacobian_product(&self, u: DVectorView<T>, direction: DVectorView<T>) -> eyre::Result<DVector<T>> {
        self.check_dofs("solution", &u)?;
        self.check_dofs("direction", &direction)?;
        let s = self.solution_dim();
        let ws = &mut *self.workspace.get_or_default().borrow_mut();
        let mut product = DVector::zeros(self.num_dofs());
        for e in 0..self.num_elements() {
            self.assembler
                .assemble_element_jacobian_product(ws, e, u, direction)?;
            add_local_to_global(&ws.element_vector, &mut product, ws.basis.element_nodes(), s);
        }
        Ok(product)
    }

    pub fn par_jacobian_product(&self, u: DVectorView<T>, direction: DVectorView<T>) -> eyre::Result<DVector<T>> {
        self.check_dofs("solution", &u)?;
        self.check_dofs("direction", &direction)?;
        let s = self.solution_dim();
        let n = self.num_dofs();
        let partial_products = ThreadLocal::new();
        (0..self.num_elements())
            .into_par_iter()
            .try_for_each(|e| -> eyre::Result<()> {
                let ws = &mut *self.workspace.get_or_default().borrow_mut();
                self.assembler
                    .assemble_element_jacobian_product(ws, e, u, direction)?;
                let partial = &mut *partial_products
                    .get_or(|| RefCell::new(DVector::zeros(n)))
                    .borrow_mut();
                add_local_to_global(&ws.element_vector, partial, ws.basis.element_nodes(), s);
                Ok(())
            })?;
        Ok(sum_partial_vectors(partial_products, n))
    }

    /// Adds the Jacobian of the residual at `u` to `sink`, one node block at a time.
    pub fn jacobian_into(&self, u: DVectorView<T>, sink: &mut impl BlockMatrixSink<T>) -> eyre::Result<()> {
        self.check_dofs("solution", &u)?;
        let ws = &mut *self.workspace.get_or_default().borrow_mut();
        for e in 0..self.num_elements() {
            self.assembler.assemble_element_jacobian(ws, e, u)?;
            sink.add_element_matrix(ws.basis.element_nodes(), &ws.element_matrix)?;
        }
        Ok(())
    }

    /// Assembles the Jacobian of the residual at `u` into a block-sparse matrix whose pattern
    /// couples every pair of nodes sharing an element stencil.
    pub fn jacobian(&self, u: DVectorView<T>) -> eyre::Result<BlockCsrMatrix<T>> {
        let mut matrix = BlockCsrMatrix::from_mesh(self.assembler.mesh, self.solution_dim());
        self.jacobian_into(u, &mut matrix)?;
        Ok(matrix)
    }

    pub fn par_jacobian(&self, u: DVectorView<T>) -> eyre::Result<BlockCsrMatrix<T>> {
        self.check_dofs("solution", &u)?;
        let mut matrix = BlockCsrMatrix::from_mesh(self.assembler.mesh, self.solution_dim());
        let nnz = matrix.values().len();
        let partial_values = ThreadLocal::new();
        {
            let pattern = &matrix;
            (0..self.num_elements())
                .into_par_iter()
                .try_for_each(|e| -> eyre::Result<()> {
                    let ws = &mut *self.workspace.get_or_default().borrow_mut();
                    self.assembler.assemble_element_jacobian(ws, e, u)?;
                    let values = &mut *partial_values
                        .get_or(|| RefCell::new(vec![T::zero(); nnz]))
                        .borrow_mut();
                    let s = pattern.block_size();
                    let nodes = ws.basis.element_nodes();
                    for (i, &row_node) in nodes.iter().enumerate() {
                        for (j, &col_node) in nodes.iter().enumerate() {
                            let block = ws.element_matrix.view((s * i, s * j), (s, s));
                            pattern.add_block_to_values(values, row_node, col_node, block)?;
                        }
                    }
                    Ok(())
                })?;
        }
        for values in partial_values {
            matrix.add_values(&values.into_inner())?;
        }
        Ok(matrix)
    }
}

impl<'a, T, M, B, Q, P> GalerkinAnalysis<'a, T, M, B, Q, P>
where
    T: Real,
    M: GalerkinMesh<T>,
    B: ElementBasis<T>,
    Q: LevelSetQuadratureTable<T>,
    P: Physics<T>,
    DefaultAllocator: SolutionAllocator<T, P::SolutionDim>,
{
    /// Computes `d(adjoint^T R(u)) / d phi`, the derivative of the adjoint-weighted residual with
    /// respect to the level-set dofs of the quadrature table.
    ///
    /// The residual depends on the level set only through the cut-cell quadrature rules, so only
    /// the design dofs reported by the quadrature table of each element receive contributions.
    pub fn lsf_jacobian_adjoint_product(&self, u: DVectorView<T>, adjoint: DVectorView<T>) -> eyre::Result<DVector<T>> {
        self.check_dofs("solution", &u)?;
        self.check_dofs("adjoint", &adjoint)?;
        let ws = &mut *self.workspace.get_or_default().borrow_mut();
        let mut product = DVector::zeros(self.assembler.quadrature.num_design_dofs());
        for e in 0..self.num_elements() {
            self.assembler
                .assemble_element_lsf_adjoint_product(ws, e, u, adjoint)?;
            add_local_to_global(&ws.element_vector, &mut product, ws.quadrature.design_dofs(), 1);
        }
        Ok(product)
    }

    pub fn par_lsf_jacobian_adjoint_product(
        &self,
        u: DVectorView<T>,
        adjoint: DVectorView<T>,
    ) -> eyre::Result<DVector<T>> {
        self.check_dofs("solution", &u)?;
        self.check_dofs("adjoint", &adjoint)?;
        let n = self.assembler.quadrature.num_design_dofs();
        let partial_products = ThreadLocal::new();
        (0..self.num_elements())
            .into_par_iter()
            .try_for_each(|e| -> eyre::Result<()> {
                let ws = &mut *self.workspace.get_or_default().borrow_mut();
                self.assembler
                    .assemble_element_lsf_adjoint_product(ws, e, u, adjoint)?;
                let partial = &mut *partial_products
                    .get_or(|| RefCell::new(DVector::zeros(n)))
                    .borrow_mut();
                add_local_to_global(&ws.element_vector, partial, ws.quadrature.design_dofs(), 1);
                Ok(())
            })?;
        Ok(sum_partial_vectors(partial_products, n))
    }
}

fn sum_partial_vectors<T: Real>(partials: ThreadLocal<RefCell<DVector<T>>>, n: usize) -> DVector<T> {
    partials
        .into_iter()
        .fold(DVector::zeros(n), |sum, partial| sum + partial.into_inner())
}
