//! Quadrature tables mapping elements to reference quadrature rules.
//!
//! Points are given in the reference square `[-1, 1]^2` of an element. Weights refer to the
//! reference square as well: they carry any cut-cell correction but not the Jacobian
//! determinant of the geometric map.
use crate::Real;
use eyre::eyre;
use nalgebra::{Point2, Vector2};

pub mod univariate;

/// Lookup table mapping elements to quadrature rules.
pub trait QuadratureTable<T: Real>: Sync {
    fn element_quadrature_size(&self, element_index: usize) -> usize;

    fn populate_element_quadrature(
        &self,
        element_index: usize,
        points: &mut [Point2<T>],
        weights: &mut [T],
    ) -> eyre::Result<()>;
}

/// A quadrature table whose rules depend on level set degrees of freedom.
///
/// The rule of an element depends on a small set of level set dofs (for instance the corner
/// values of its cell). Derivatives are stored point-major: the derivative of point `q` with
/// respect to local design dof `k` is found at index `q * n_design + k`.
pub trait LevelSetQuadratureTable<T: Real>: QuadratureTable<T> {
    /// Total number of level set degrees of freedom.
    fn num_design_dofs(&self) -> usize;

    fn element_design_dof_count(&self, element_index: usize) -> usize;

    /// Global indices of the level set dofs that the rule of the element depends on.
    fn populate_element_design_dofs(&self, element_index: usize, dofs: &mut [usize]);

    fn populate_element_quadrature_derivatives(
        &self,
        element_index: usize,
        points: &mut [Point2<T>],
        weights: &mut [T],
        point_derivatives: &mut [Vector2<T>],
        weight_derivatives: &mut [T],
    ) -> eyre::Result<()>;
}

/// Tensor product of the Gauss–Legendre rule with `points_per_dim` points on `[-1, 1]^2`.
///
/// Points are ordered x-fastest.
pub fn tensor_gauss<T: Real>(points_per_dim: usize) -> (Vec<T>, Vec<Point2<T>>) {
    let (weights_1d, points_1d) = univariate::gauss(points_per_dim);
    let convert = |x: f64| T::from_f64(x).unwrap();
    let mut weights = Vec::with_capacity(points_per_dim * points_per_dim);
    let mut points = Vec::with_capacity(points_per_dim * points_per_dim);
    for (w_y, y) in weights_1d.iter().zip(&points_1d) {
        for (w_x, x) in weights_1d.iter().zip(&points_1d) {
            weights.push(convert(w_x * w_y));
            points.push(Point2::new(convert(*x), convert(*y)));
        }
    }
    (weights, points)
}

/// The same tensor Gauss rule on every element, ignoring the level set.
///
/// Suitable for meshes without cut cells, or as a reference rule for the interior of a domain.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussQuadratureTable<T: Real> {
    num_elements: usize,
    weights: Vec<T>,
    points: Vec<Point2<T>>,
}

impl<T: Real> GaussQuadratureTable<T> {
    pub fn new(points_per_dim: usize, num_elements: usize) -> Self {
        let (weights, points) = tensor_gauss(points_per_dim);
        Self {
            num_elements,
            weights,
            points,
        }
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn points(&self) -> &[Point2<T>] {
        &self.points
    }
}

impl<T: Real> QuadratureTable<T> for GaussQuadratureTable<T> {
    fn element_quadrature_size(&self, _element_index: usize) -> usize {
        self.weights.len()
    }

    fn populate_element_quadrature(
        &self,
        element_index: usize,
        points: &mut [Point2<T>],
        weights: &mut [T],
    ) -> eyre::Result<()> {
        if element_index >= self.num_elements {
            return Err(eyre!(
                "element index {element_index} out of bounds for quadrature table with {} elements",
                self.num_elements
            ));
        }
        points.copy_from_slice(&self.points);
        weights.copy_from_slice(&self.weights);
        Ok(())
    }
}
