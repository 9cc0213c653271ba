//! Helper traits for allocator trait bounds.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar, U2};

/// Allocator for the pointwise values, gradients and Jacobian blocks of a field with
/// `SolutionDim` components in two spatial dimensions.
pub trait SolutionAllocator<T, SolutionDim>:
    Allocator<T, SolutionDim> + Allocator<T, SolutionDim, SolutionDim> + Allocator<T, SolutionDim, U2>
where
    T: Scalar,
    SolutionDim: DimName,
{
}

impl<T, SolutionDim> SolutionAllocator<T, SolutionDim> for DefaultAllocator
where
    T: Scalar,
    SolutionDim: DimName,
    DefaultAllocator: Allocator<T, SolutionDim> + Allocator<T, SolutionDim, SolutionDim> + Allocator<T, SolutionDim, U2>,
{
}
