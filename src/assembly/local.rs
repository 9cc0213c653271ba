//! Element-level kernels.
use crate::allocators::SolutionAllocator;
use crate::assembly::buffers::{BasisFunctionBuffer, ElementWorkspace};
use crate::assembly::physics::{PointCoefficients, PointJacobian, Physics};
use crate::basis::ElementBasis;
use crate::error::GdError;
use crate::mesh::GalerkinMesh;
use crate::quadrature::{LevelSetQuadratureTable, QuadratureTable};
use crate::Real;
use itertools::izip;
use nalgebra::{DVector, DVectorView, DefaultAllocator, DimName, Matrix2, OMatrix, OVector, Point2, Vector2, U2};
use std::marker::PhantomData;

/// Gathers the degrees of freedom of the given nodes into `local`.
///
/// Global dof `s * node + a` is copied to local dof `s * i + a`, where `node = nodes[i]`.
pub fn gather_global_to_local<T: Real>(global: DVectorView<T>, local: &mut DVector<T>, nodes: &[usize], s: usize) {
    local.resize_vertically_mut(s * nodes.len(), T::zero());
    for (i, node) in nodes.iter().enumerate() {
        for a in 0..s {
            local[s * i + a] = global[s * node + a];
        }
    }
}

/// Adds the local element vector to the global vector. The inverse of [`gather_global_to_local`].
pub fn add_local_to_global<T: Real>(local: &DVector<T>, global: &mut DVector<T>, nodes: &[usize], s: usize) {
    for (i, node) in nodes.iter().enumerate() {
        for a in 0..s {
            global[s * node + a] += local[s * i + a];
        }
    }
}

/// Jacobian `J = sum_i x_i ⊗ ∇_ξ N_i` of the map from reference to physical coordinates.
pub fn reference_jacobian<T: Real>(node_positions: &[Point2<T>], reference_gradients: &[Vector2<T>]) -> Matrix2<T> {
    node_positions
        .iter()
        .zip(reference_gradients)
        .fold(Matrix2::zeros(), |j, (x, g)| j + x.coords * g.transpose())
}

/// Interpolates `u = sum_i u_i N_i`.
pub fn interpolate_value<T, S>(u_local: &DVector<T>, values: &[T]) -> OVector<T, S>
where
    T: Real,
    S: DimName,
    DefaultAllocator: SolutionAllocator<T, S>,
{
    let s = S::dim();
    let mut u = OVector::<T, S>::zeros();
    for (i, &n_i) in values.iter().enumerate() {
        u += u_local.rows_generic(s * i, S::name()) * n_i;
    }
    u
}

/// Interpolates `g = sum_i u_i ⊗ d_i`, for instance with `d_i` the physical gradients of the shape functions.
pub fn interpolate_gradient<T, S>(u_local: &DVector<T>, gradients: &[Vector2<T>]) -> OMatrix<T, S, U2>
where
    T: Real,
    S: DimName,
    DefaultAllocator: SolutionAllocator<T, S>,
{
    let s = S::dim();
    let mut g = OMatrix::<T, S, U2>::zeros();
    for (i, d_i) in gradients.iter().enumerate() {
        g += u_local.rows_generic(s * i, S::name()) * d_i.transpose();
    }
    g
}

/// Adds `c.value N_i + c.gradient ∇N_i` to the rows of every node `i` of the element vector.
pub fn add_point_coefficients<T, S>(
    element_vector: &mut DVector<T>,
    coefficients: &PointCoefficients<T, S>,
    basis: &BasisFunctionBuffer<T>,
) where
    T: Real,
    S: DimName,
    DefaultAllocator: SolutionAllocator<T, S>,
{
    let s = S::dim();
    for (i, (&n_i, grad_n_i)) in izip!(basis.values(), basis.physical_gradients()).enumerate() {
        let contribution = &coefficients.value * n_i + &coefficients.gradient * grad_n_i;
        let mut rows = element_vector.rows_mut(s * i, s);
        rows += contribution;
    }
}

/// Adds the linearized point coefficients, tested against all shape function pairs, to the element matrix.
pub fn add_point_jacobian<T, S>(element_matrix: &mut nalgebra::DMatrix<T>, jacobian: &PointJacobian<T, S>, basis: &BasisFunctionBuffer<T>)
where
    T: Real,
    S: DimName,
    DefaultAllocator: SolutionAllocator<T, S>,
{
    let s = S::dim();
    let values = basis.values();
    let gradients = basis.physical_gradients();
    for (i, (&n_i, grad_n_i)) in izip!(values, gradients).enumerate() {
        // Contraction of the test function with the coefficient linearizations
        let dvalue_du = &jacobian.value_value * n_i
            + &jacobian.gradient_value[0] * grad_n_i.x
            + &jacobian.gradient_value[1] * grad_n_i.y;
        let dvalue_dg = [0, 1].map(|l| {
            &jacobian.value_gradient[l] * n_i
                + &jacobian.gradient_gradient[0][l] * grad_n_i.x
                + &jacobian.gradient_gradient[1][l] * grad_n_i.y
        });

        for (j, (&n_j, grad_n_j)) in izip!(values, gradients).enumerate() {
            let block = &dvalue_du * n_j + &dvalue_dg[0] * grad_n_j.x + &dvalue_dg[1] * grad_n_j.y;
            let mut view = element_matrix.view_mut((s * i, s * j), (s, s));
            view += block;
        }
    }
}

/// Frobenius product `sum_a c.value[a] v[a] + sum_{a,k} c.gradient[(a, k)] g[(a, k)]`.
fn contract_coefficients<T, S>(c: &PointCoefficients<T, S>, v: &OVector<T, S>, g: &OMatrix<T, S, U2>) -> T
where
    T: Real,
    S: DimName,
    DefaultAllocator: SolutionAllocator<T, S>,
{
    c.value.dot(v) + c.gradient.dot(g)
}

/// Element-level evaluation of the weak form of a physics on a mesh.
///
/// Borrows all collaborators. Each kernel reads its inputs from and writes its outputs to
/// an [`ElementWorkspace`].
#[derive(Debug)]
pub struct ElementAssembler<'a, T, M, B, Q, P> {
    pub mesh: &'a M,
    pub basis: &'a B,
    pub quadrature: &'a Q,
    pub physics: &'a P,
    marker: PhantomData<T>,
}

impl<'a, T, M, B, Q, P> Clone for ElementAssembler<'a, T, M, B, Q, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T, M, B, Q, P> Copy for ElementAssembler<'a, T, M, B, Q, P> {}

impl<'a, T, M, B, Q, P> ElementAssembler<'a, T, M, B, Q, P> {
    pub fn new(mesh: &'a M, basis: &'a B, quadrature: &'a Q, physics: &'a P) -> Self {
        Self {
            mesh,
            basis,
            quadrature,
            physics,
            marker: PhantomData,
        }
    }
}

impl<'a, T, M, B, Q, P> ElementAssembler<'a, T, M, B, Q, P>
where
    T: Real,
    M: GalerkinMesh<T>,
    B: ElementBasis<T>,
    Q: QuadratureTable<T>,
    P: Physics<T>,
    DefaultAllocator: SolutionAllocator<T, P::SolutionDim>,
{
    pub fn solution_dim(&self) -> usize {
        P::SolutionDim::dim()
    }

    /// Loads the stencil and nodal positions of the element into the workspace and gathers
    /// the given field into `ws.u_local`.
    fn prepare_element(
        &self,
        ws: &mut ElementWorkspace<T>,
        element_index: usize,
        u: DVectorView<T>,
    ) -> eyre::Result<()> {
        ws.basis
            .populate_element_nodes_from_mesh(element_index, self.mesh, self.basis)?;
        ws.node_positions.clear();
        ws.node_positions.extend(
            ws.basis
                .element_nodes()
                .iter()
                .map(|&node| self.mesh.node_position(node)),
        );
        gather_global_to_local(u, &mut ws.u_local, ws.basis.element_nodes(), self.solution_dim());
        Ok(())
    }

    /// Evaluates the basis at `xi` and returns the Jacobian of the geometric map there.
    fn evaluate_point(
        &self,
        ws: &mut ElementWorkspace<T>,
        element_index: usize,
        xi: &Point2<T>,
    ) -> Result<Matrix2<T>, GdError> {
        ws.basis
            .populate_element_basis_from(element_index, self.basis, xi);
        let j = reference_jacobian(&ws.node_positions, ws.basis.gradients());
        let j_inv_t = j
            .try_inverse()
            .ok_or(GdError::SingularJacobian { element: element_index })?
            .transpose();
        ws.basis.compute_physical_gradients(&j_inv_t);
        Ok(j)
    }

    fn resize_element_vector(&self, ws: &mut ElementWorkspace<T>) {
        let n = self.solution_dim() * ws.basis.element_nodes().len();
        ws.element_vector.resize_vertically_mut(n, T::zero());
        ws.element_vector.fill(T::zero());
    }

    pub fn element_energy(&self, ws: &mut ElementWorkspace<T>, element_index: usize, u: DVectorView<T>) -> eyre::Result<T> {
        self.prepare_element(ws, element_index, u)?;
        ws.quadrature
            .populate_element_quadrature_from_table(element_index, self.quadrature)?;

        let mut energy = T::zero();
        for q in 0..ws.quadrature.weights().len() {
            let (w, xi) = (ws.quadrature.weights()[q], ws.quadrature.points()[q]);
            let j = self.evaluate_point(ws, element_index, &xi)?;
            let u_q = interpolate_value::<T, P::SolutionDim>(&ws.u_local, ws.basis.values());
            let g_q = interpolate_gradient::<T, P::SolutionDim>(&ws.u_local, ws.basis.physical_gradients());
            energy += self.physics.energy(w, &j, &u_q, &g_q);
        }
        Ok(energy)
    }

    /// Computes the element residual into `ws.element_vector`.
    pub fn assemble_element_residual(
        &self,
        ws: &mut ElementWorkspace<T>,
        element_index: usize,
        u: DVectorView<T>,
    ) -> eyre::Result<()> {
        self.prepare_element(ws, element_index, u)?;
        ws.quadrature
            .populate_element_quadrature_from_table(element_index, self.quadrature)?;
        self.resize_element_vector(ws);

        for q in 0..ws.quadrature.weights().len() {
            let (w, xi) = (ws.quadrature.weights()[q], ws.quadrature.points()[q]);
            let j = self.evaluate_point(ws, element_index, &xi)?;
            let u_q = interpolate_value::<T, P::SolutionDim>(&ws.u_local, ws.basis.values());
            let g_q = interpolate_gradient::<T, P::SolutionDim>(&ws.u_local, ws.basis.physical_gradients());
            let coefficients = self.physics.residual(w, &j, &u_q, &g_q);
            add_point_coefficients(&mut ws.element_vector, &coefficients, &ws.basis);
        }
        Ok(())
    }

    /// Computes the element Jacobian-vector product into `ws.element_vector`.
    pub fn assemble_element_jacobian_product(
        &self,
        ws: &mut ElementWorkspace<T>,
        element_index: usize,
        u: DVectorView<T>,
        direction: DVectorView<T>,
    ) -> eyre::Result<()> {
        self.prepare_element(ws, element_index, u)?;
        gather_global_to_local(direction, &mut ws.v_local, ws.basis.element_nodes(), self.solution_dim());
        ws.quadrature
            .populate_element_quadrature_from_table(element_index, self.quadrature)?;
        self.resize_element_vector(ws);

        for q in 0..ws.quadrature.weights().len() {
            let (w, xi) = (ws.quadrature.weights()[q], ws.quadrature.points()[q]);
            let j = self.evaluate_point(ws, element_index, &xi)?;
            let u_q = interpolate_value::<T, P::SolutionDim>(&ws.u_local, ws.basis.values());
            let g_q = interpolate_gradient::<T, P::SolutionDim>(&ws.u_local, ws.basis.physical_gradients());
            let du_q = interpolate_value::<T, P::SolutionDim>(&ws.v_local, ws.basis.values());
            let dg_q = interpolate_gradient::<T, P::SolutionDim>(&ws.v_local, ws.basis.physical_gradients());
            let coefficients = self
                .physics
                .jacobian_product(w, &j, &u_q, &g_q, &du_q, &dg_q);
            add_point_coefficients(&mut ws.element_vector, &coefficients, &ws.basis);
        }
        Ok(())
    }

    /// Computes the dense element Jacobian into `ws.element_matrix`.
    pub fn assemble_element_jacobian(
        &self,
        ws: &mut ElementWorkspace<T>,
        element_index: usize,
        u: DVectorView<T>,
    ) -> eyre::Result<()> {
        self.prepare_element(ws, element_index, u)?;
        ws.quadrature
            .populate_element_quadrature_from_table(element_index, self.quadrature)?;
        let n = self.solution_dim() * ws.basis.element_nodes().len();
        ws.element_matrix.resize_mut(n, n, T::zero());
        ws.element_matrix.fill(T::zero());

        for q in 0..ws.quadrature.weights().len() {
            let (w, xi) = (ws.quadrature.weights()[q], ws.quadrature.points()[q]);
            let j = self.evaluate_point(ws, element_index, &xi)?;
            let u_q = interpolate_value::<T, P::SolutionDim>(&ws.u_local, ws.basis.values());
            let g_q = interpolate_gradient::<T, P::SolutionDim>(&ws.u_local, ws.basis.physical_gradients());
            let jacobian = self.physics.jacobian(w, &j, &u_q, &g_q);
            add_point_jacobian(&mut ws.element_matrix, &jacobian, &ws.basis);
        }
        Ok(())
    }
}

impl<'a, T, M, B, Q, P> ElementAssembler<'a, T, M, B, Q, P>
where
    T: Real,
    M: GalerkinMesh<T>,
    B: ElementBasis<T>,
    Q: LevelSetQuadratureTable<T>,
    P: Physics<T>,
    DefaultAllocator: SolutionAllocator<T, P::SolutionDim>,
{
    /// Computes the derivative of `adjoint^T r_e` with respect to the design dofs the quadrature
    /// rule of the element depends on.
    ///
    /// The result is written to `ws.element_vector`, ordered like `ws.quadrature.design_dofs()`.
    /// Since `adjoint^T r_e = sum_q w_q a(xi_q)` with `a = c_value . psi + c_gradient : ∇psi`, the
    /// derivative with respect to design dof `k` is
    /// `sum_q dw_q/dk a(xi_q) + w_q ∇_ξ a(xi_q) . dxi_q/dk`. The reference gradient of `a` is formed
    /// from the linearized coefficients along the reference directions and the shape function
    /// Hessians, assuming a geometric map with constant Jacobian.
    pub fn assemble_element_lsf_adjoint_product(
        &self,
        ws: &mut ElementWorkspace<T>,
        element_index: usize,
        u: DVectorView<T>,
        adjoint: DVectorView<T>,
    ) -> eyre::Result<()> {
        self.prepare_element(ws, element_index, u)?;
        gather_global_to_local(adjoint, &mut ws.v_local, ws.basis.element_nodes(), self.solution_dim());
        ws.quadrature
            .populate_element_quadrature_derivatives_from_table(element_index, self.quadrature)?;
        let num_design = ws.quadrature.design_dofs().len();
        ws.element_vector.resize_vertically_mut(num_design, T::zero());
        ws.element_vector.fill(T::zero());

        for q in 0..ws.quadrature.weights().len() {
            let (w, xi) = (ws.quadrature.weights()[q], ws.quadrature.points()[q]);
            let j = self.evaluate_point(ws, element_index, &xi)?;
            ws.basis
                .populate_element_hessians_from(element_index, self.basis, &xi);
            let j_inv_t = j
                .try_inverse()
                .ok_or(GdError::SingularJacobian { element: element_index })?
                .transpose();

            // Reference derivatives of the physical shape function gradients: J^{-T} H_i e_r
            for r in 0..2 {
                let d_gradient = &mut ws.gradient_derivatives[r];
                d_gradient.clear();
                d_gradient.extend(ws.basis.hessians().iter().map(|h| j_inv_t * h.column(r)));
                let d_value = &mut ws.value_derivatives[r];
                d_value.clear();
                d_value.extend(ws.basis.gradients().iter().map(|g| g[r]));
            }

            let u_q = interpolate_value::<T, P::SolutionDim>(&ws.u_local, ws.basis.values());
            let g_q = interpolate_gradient::<T, P::SolutionDim>(&ws.u_local, ws.basis.physical_gradients());
            let psi_q = interpolate_value::<T, P::SolutionDim>(&ws.v_local, ws.basis.values());
            let psi_g_q = interpolate_gradient::<T, P::SolutionDim>(&ws.v_local, ws.basis.physical_gradients());

            let coefficients = self.physics.residual(T::one(), &j, &u_q, &g_q);
            let a = contract_coefficients(&coefficients, &psi_q, &psi_g_q);

            let mut grad_a = Vector2::zeros();
            for r in 0..2 {
                let (d_values, d_gradients) = (&ws.value_derivatives[r], &ws.gradient_derivatives[r]);
                let du_r = interpolate_value::<T, P::SolutionDim>(&ws.u_local, d_values);
                let dg_r = interpolate_gradient::<T, P::SolutionDim>(&ws.u_local, d_gradients);
                let dpsi_r = interpolate_value::<T, P::SolutionDim>(&ws.v_local, d_values);
                let dpsi_g_r = interpolate_gradient::<T, P::SolutionDim>(&ws.v_local, d_gradients);
                let d_coefficients = self
                    .physics
                    .jacobian_product(T::one(), &j, &u_q, &g_q, &du_r, &dg_r);
                grad_a[r] = contract_coefficients(&d_coefficients, &psi_q, &psi_g_q)
                    + contract_coefficients(&coefficients, &dpsi_r, &dpsi_g_r);
            }

            let dw = ws.quadrature.weight_derivatives(q);
            let dxi = ws.quadrature.point_derivatives(q);
            for (k, (&dw_k, dxi_k)) in izip!(dw, dxi).enumerate() {
                ws.element_vector[k] += dw_k * a + w * grad_a.dot(dxi_k);
            }
        }
        Ok(())
    }
}
