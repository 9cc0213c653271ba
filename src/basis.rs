//! Shape functions of Galerkin-Difference elements.
use crate::config::GdConfig;
use crate::error::GdError;
use crate::linalg::{direct_inverse, MatrixNorm};
use crate::mesh::GalerkinMesh;
use crate::Real;
use log::{debug, warn};
use nalgebra::{DMatrix, Matrix2, Point2, Vector2};
use numeric_literals::replace_float_literals;

/// Shape functions of the element stencils of a mesh.
///
/// Reference coordinates `xi` lie in `[-1, 1]^2` over the background cell of the element. Shape
/// functions are ordered like the nodes returned by [`GalerkinMesh::element_nodes`].
pub trait ElementBasis<T: Real>: Sync {
    fn element_node_count(&self, element_index: usize) -> usize;

    /// Evaluates shape function values and reference gradients at `xi`.
    fn populate_element_basis(
        &self,
        element_index: usize,
        xi: &Point2<T>,
        values: &mut [T],
        gradients: &mut [Vector2<T>],
    );

    /// Evaluates the reference Hessians of the shape functions at `xi`.
    fn populate_element_hessians(&self, element_index: usize, xi: &Point2<T>, hessians: &mut [Matrix2<T>]);
}

/// Reference coordinates of a physical point with respect to the background cell of an element.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn element_reference_coords<T: Real, M: GalerkinMesh<T>>(mesh: &M, element_index: usize, x: &Point2<T>) -> Point2<T> {
    let cell = mesh.element_cell(element_index);
    let center = mesh.grid().cell_centroid(cell);
    let half_size = mesh.grid().cell_size() * 0.5;
    Point2::from((x - center).component_div(&half_size))
}

/// `t^a` together with its first and second derivatives.
fn power_and_derivatives<T: Real>(t: T, a: usize) -> (T, T, T) {
    let coeff = |c: usize| T::from_usize(c).unwrap();
    let pow = |e: usize| t.powi(e as i32);
    match a {
        0 => (T::one(), T::zero(), T::zero()),
        1 => (t, T::one(), T::zero()),
        _ => (pow(a), coeff(a) * pow(a - 1), coeff(a * (a - 1)) * pow(a - 2)),
    }
}

/// Galerkin-Difference basis: on each element, the Lagrange basis of the tensor polynomial space
/// `Q_{Np-1}` interpolating at the stencil nodes.
///
/// Each element stores the inverse of the Vandermonde matrix `V[(k, a + Np b)] = xi_k^a eta_k^b`
/// of its stencil, evaluated in the reference coordinates of the element.
#[derive(Debug, Clone)]
pub struct GdBasis<'a, T: Real, M> {
    mesh: &'a M,
    nodes_per_dim: usize,
    coefficients: Vec<DMatrix<T>>,
}

impl<'a, T: Real, M: GalerkinMesh<T>> GdBasis<'a, T, M> {
    pub fn new(mesh: &'a M, config: &GdConfig) -> Result<Self, GdError> {
        let np = mesh.nodes_per_dim();
        let npe = mesh.nodes_per_element();
        let tolerance = T::from_f64(config.rcond_tolerance).unwrap_or_else(T::zero);

        let mut coefficients = Vec::with_capacity(mesh.num_elements());
        let mut worst_rcond: Option<T> = None;
        for element in 0..mesh.num_elements() {
            let mut vandermonde = DMatrix::zeros(npe, npe);
            for (k, &node) in mesh.element_nodes(element).iter().enumerate() {
                let xi = element_reference_coords(mesh, element, &mesh.node_position(node));
                for b in 0..np {
                    for a in 0..np {
                        vandermonde[(k, a + np * b)] = xi.x.powi(a as i32) * xi.y.powi(b as i32);
                    }
                }
            }

            let (inverse, rcond) = direct_inverse(vandermonde, Some(MatrixNorm::One))?;
            if let Some(rcond) = rcond {
                if rcond < tolerance {
                    warn!("Vandermonde matrix of element {element} is ill-conditioned (rcond = {rcond})");
                }
                worst_rcond = Some(worst_rcond.map_or(rcond, |worst| worst.min(rcond)));
            }
            coefficients.push(inverse);
        }

        if let Some(rcond) = worst_rcond {
            debug!("Built GD basis for {} elements, smallest rcond {rcond}", mesh.num_elements());
        }

        Ok(Self {
            mesh,
            nodes_per_dim: np,
            coefficients,
        })
    }

    pub fn mesh(&self) -> &'a M {
        self.mesh
    }
}

impl<'a, T: Real, M: GalerkinMesh<T>> ElementBasis<T> for GdBasis<'a, T, M> {
    fn element_node_count(&self, element_index: usize) -> usize {
        self.coefficients[element_index].ncols()
    }

    fn populate_element_basis(
        &self,
        element_index: usize,
        xi: &Point2<T>,
        values: &mut [T],
        gradients: &mut [Vector2<T>],
    ) {
        let c = &self.coefficients[element_index];
        let np = self.nodes_per_dim;
        assert_eq!(values.len(), c.ncols());
        assert_eq!(gradients.len(), c.ncols());
        values.fill(T::zero());
        gradients.fill(Vector2::zeros());

        for b in 0..np {
            let (y, dy, _) = power_and_derivatives(xi.y, b);
            for a in 0..np {
                let (x, dx, _) = power_and_derivatives(xi.x, a);
                let row = c.row(a + np * b);
                let monomial_gradient = Vector2::new(dx * y, x * dy);
                for (k, (value, gradient)) in values.iter_mut().zip(gradients.iter_mut()).enumerate() {
                    *value += row[k] * x * y;
                    *gradient += monomial_gradient * row[k];
                }
            }
        }
    }

    fn populate_element_hessians(&self, element_index: usize, xi: &Point2<T>, hessians: &mut [Matrix2<T>]) {
        let c = &self.coefficients[element_index];
        let np = self.nodes_per_dim;
        assert_eq!(hessians.len(), c.ncols());
        hessians.fill(Matrix2::zeros());

        for b in 0..np {
            let (y, dy, d2y) = power_and_derivatives(xi.y, b);
            for a in 0..np {
                let (x, dx, d2x) = power_and_derivatives(xi.x, a);
                let mixed = dx * dy;
                let monomial_hessian = Matrix2::new(d2x * y, mixed, mixed, x * d2y);
                let row = c.row(a + np * b);
                for (k, hessian) in hessians.iter_mut().enumerate() {
                    *hessian += monomial_hessian * row[k];
                }
            }
        }
    }
}
