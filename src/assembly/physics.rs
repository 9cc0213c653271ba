//! Pointwise weak forms.
use crate::allocators::SolutionAllocator;
use crate::Real;
use nalgebra::{DefaultAllocator, DimName, Matrix2, OMatrix, OVector, U2};

/// Coefficients of a pointwise residual contribution.
///
/// Tested against a shape function `N` with physical gradient `∇N`, the contribution to the
/// residual is `value * N + gradient * ∇N`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCoefficients<T, SolutionDim>
where
    T: Real,
    SolutionDim: DimName,
    DefaultAllocator: SolutionAllocator<T, SolutionDim>,
{
    pub value: OVector<T, SolutionDim>,
    pub gradient: OMatrix<T, SolutionDim, U2>,
}

impl<T, SolutionDim> PointCoefficients<T, SolutionDim>
where
    T: Real,
    SolutionDim: DimName,
    DefaultAllocator: SolutionAllocator<T, SolutionDim>,
{
    pub fn zeros() -> Self {
        Self {
            value: OVector::<T, SolutionDim>::zeros(),
            gradient: OMatrix::<T, SolutionDim, U2>::zeros(),
        }
    }
}

/// Linearization of [`PointCoefficients`] with respect to the field value `u` and its physical
/// gradient `g`.
///
/// With `a`, `b` indexing solution components and `k`, `l` spatial directions:
/// - `value_value[(a, b)] = d value[a] / d u[b]`
/// - `value_gradient[l][(a, b)] = d value[a] / d g[(b, l)]`
/// - `gradient_value[k][(a, b)] = d gradient[(a, k)] / d u[b]`
/// - `gradient_gradient[k][l][(a, b)] = d gradient[(a, k)] / d g[(b, l)]`
#[derive(Debug, Clone, PartialEq)]
pub struct PointJacobian<T, SolutionDim>
where
    T: Real,
    SolutionDim: DimName,
    DefaultAllocator: SolutionAllocator<T, SolutionDim>,
{
    pub value_value: OMatrix<T, SolutionDim, SolutionDim>,
    pub value_gradient: [OMatrix<T, SolutionDim, SolutionDim>; 2],
    pub gradient_value: [OMatrix<T, SolutionDim, SolutionDim>; 2],
    pub gradient_gradient: [[OMatrix<T, SolutionDim, SolutionDim>; 2]; 2],
}

impl<T, SolutionDim> PointJacobian<T, SolutionDim>
where
    T: Real,
    SolutionDim: DimName,
    DefaultAllocator: SolutionAllocator<T, SolutionDim>,
{
    pub fn zeros() -> Self {
        let z = OMatrix::<T, SolutionDim, SolutionDim>::zeros;
        Self {
            value_value: z(),
            value_gradient: [z(), z()],
            gradient_value: [z(), z()],
            gradient_gradient: [[z(), z()], [z(), z()]],
        }
    }

    /// Applies the linearization to a perturbation `(du, dg)` of the value and gradient.
    pub fn apply(
        &self,
        du: &OVector<T, SolutionDim>,
        dg: &OMatrix<T, SolutionDim, U2>,
    ) -> PointCoefficients<T, SolutionDim> {
        let mut result = PointCoefficients::zeros();
        result.value = &self.value_value * du;
        for l in 0..2 {
            result.value += &self.value_gradient[l] * dg.column(l);
        }
        for k in 0..2 {
            let mut column = &self.gradient_value[k] * du;
            for l in 0..2 {
                column += &self.gradient_gradient[k][l] * dg.column(l);
            }
            result.gradient.set_column(k, &column);
        }
        result
    }
}

/// A pointwise weak form.
///
/// All methods receive the quadrature weight, the Jacobian `J` of the map from reference to
/// physical coordinates, and the field value and physical gradient at the quadrature point.
/// Contributions are integrand values multiplied by `weight * |det J|`, so they are linear in the
/// weight.
///
/// The methods must be consistent: `residual` is the derivative of `energy` with respect to the
/// field, `jacobian` and `jacobian_product` are linearizations of `residual`.
pub trait Physics<T: Real>: Sync
where
    DefaultAllocator: SolutionAllocator<T, Self::SolutionDim>,
{
    /// Number of degrees of freedom per node.
    type SolutionDim: DimName;

    fn energy(
        &self,
        weight: T,
        jacobian: &Matrix2<T>,
        value: &OVector<T, Self::SolutionDim>,
        gradient: &OMatrix<T, Self::SolutionDim, U2>,
    ) -> T;

    fn residual(
        &self,
        weight: T,
        jacobian: &Matrix2<T>,
        value: &OVector<T, Self::SolutionDim>,
        gradient: &OMatrix<T, Self::SolutionDim, U2>,
    ) -> PointCoefficients<T, Self::SolutionDim>;

    fn jacobian(
        &self,
        weight: T,
        jacobian: &Matrix2<T>,
        value: &OVector<T, Self::SolutionDim>,
        gradient: &OMatrix<T, Self::SolutionDim, U2>,
    ) -> PointJacobian<T, Self::SolutionDim>;

    /// Linearized coefficients along the direction `(direction_value, direction_gradient)`.
    ///
    /// The default implementation applies [`Physics::jacobian`].
    #[allow(clippy::too_many_arguments)]
    fn jacobian_product(
        &self,
        weight: T,
        jacobian: &Matrix2<T>,
        value: &OVector<T, Self::SolutionDim>,
        gradient: &OMatrix<T, Self::SolutionDim, U2>,
        direction_value: &OVector<T, Self::SolutionDim>,
        direction_gradient: &OMatrix<T, Self::SolutionDim, U2>,
    ) -> PointCoefficients<T, Self::SolutionDim> {
        self.jacobian(weight, jacobian, value, gradient)
            .apply(direction_value, direction_gradient)
    }
}
