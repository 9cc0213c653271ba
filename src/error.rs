//! Library-wide error type.
use crate::mesh::stencil::PushDirection;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum GdError {
    /// A background grid was requested with zero cells or a non-positive extent along `axis`.
    InvalidGrid { axis: usize },
    /// The number of stencil nodes per dimension must be even and at least 2.
    InvalidStencilWidth { nodes_per_dim: usize },
    /// The grid has too few cells along `axis` to hold a full stencil.
    GridTooSmall { axis: usize, cells: usize, required: usize },
    /// Repairing the stencil of `cell` did not produce an active vertex for `vertex`.
    StencilRepairFailed {
        cell: usize,
        vertex: usize,
        direction: Option<PushDirection>,
    },
    /// A matrix norm was requested through an unsupported selector.
    UnsupportedNorm(char),
    /// A factorization broke down. `status` is the 1-based index of the first zero pivot.
    SingularMatrix { status: usize },
    /// The Jacobian of the geometric map of `element` is not invertible.
    SingularJacobian { element: usize },
    /// An input array did not have the size implied by the discretization.
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl Display for GdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGrid { axis } => {
                write!(f, "grid must have at least one cell and a positive extent along axis {axis}")
            }
            Self::InvalidStencilWidth { nodes_per_dim } => {
                write!(
                    f,
                    "number of stencil nodes per dimension must be even and at least 2, got {nodes_per_dim}"
                )
            }
            Self::GridTooSmall { axis, cells, required } => {
                write!(
                    f,
                    "too few elements ({cells}) along axis {axis}: stencil requires at least {required}"
                )
            }
            Self::StencilRepairFailed {
                cell,
                vertex,
                direction,
            } => match direction {
                Some(direction) => write!(
                    f,
                    "stencil repair of cell {cell} could not move vertex {vertex} into the active domain \
                     when pushing along {direction}"
                ),
                None => write!(
                    f,
                    "stencil of cell {cell} contains inactive vertex {vertex} \
                     but the level set gradient gives no push direction"
                ),
            },
            Self::UnsupportedNorm(selector) => write!(f, "not supported norm: '{selector}'"),
            Self::SingularMatrix { status } => {
                write!(f, "direct solve failed with exit code {status}")
            }
            Self::SingularJacobian { element } => {
                write!(f, "the geometric map of element {element} has a singular Jacobian")
            }
            Self::DimensionMismatch { what, expected, actual } => {
                write!(f, "{what} has length {actual}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for GdError {}
