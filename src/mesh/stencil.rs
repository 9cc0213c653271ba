//! Ground stencils and stencil repair.
use crate::config::StencilRepair;
use crate::error::GdError;
use crate::grid::StructuredGrid2d;
use crate::Real;
use nalgebra::Vector2;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Checks that stencils with `nodes_per_dim` nodes per axis fit into the grid.
pub fn check_grid_compatibility<T: Real>(grid: &StructuredGrid2d<T>, nodes_per_dim: usize) -> Result<(), GdError> {
    if nodes_per_dim < 2 || nodes_per_dim % 2 != 0 {
        return Err(GdError::InvalidStencilWidth { nodes_per_dim });
    }
    let required = nodes_per_dim - 1;
    for (axis, &cells) in grid.cells_per_dim().iter().enumerate() {
        if cells < required {
            return Err(GdError::GridTooSmall { axis, cells, required });
        }
    }
    Ok(())
}

/// Vertex coordinates of the lower-left corner of the ground stencil of `cell`.
///
/// The block is centered on the cell and clamped so that it stays inside the grid.
pub fn ground_stencil_origin<T: Real>(grid: &StructuredGrid2d<T>, nodes_per_dim: usize, cell: usize) -> [usize; 2] {
    let q = nodes_per_dim / 2;
    let nxy = grid.cells_per_dim();
    let eij = grid.cell_coords(cell);
    [0, 1].map(|d| eij[d].clamp(q - 1, nxy[d] - q) + 1 - q)
}

/// Writes the `nodes_per_dim^2` vertices of the ground stencil of `cell` into `vertices`, x-fastest.
///
/// # Panics
///
/// Panics if `vertices` does not have length `nodes_per_dim^2`. The grid must have been
/// checked with [`check_grid_compatibility`].
pub fn ground_stencil_vertices<T: Real>(
    grid: &StructuredGrid2d<T>,
    nodes_per_dim: usize,
    cell: usize,
    vertices: &mut [usize],
) {
    assert_eq!(vertices.len(), nodes_per_dim * nodes_per_dim);
    let [i0, j0] = ground_stencil_origin(grid, nodes_per_dim, cell);
    for (index, vertex) in vertices.iter_mut().enumerate() {
        let (i, j) = (index % nodes_per_dim, index / nodes_per_dim);
        *vertex = grid.vertex_index(i0 + i, j0 + j);
    }
}

/// Direction in which inactive stencil vertices are moved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PushDirection {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
}

impl PushDirection {
    /// Pushes along the dominant axis of the level set gradient, towards decreasing level set values.
    ///
    /// Ties are resolved in favor of the x axis. Returns `None` for a vanishing gradient.
    pub fn from_gradient<T: Real>(gradient: &Vector2<T>) -> Option<Self> {
        let (gx, gy) = (gradient.x, gradient.y);
        if gx.abs() >= gy.abs() && gx != T::zero() {
            Some(if gx > T::zero() { Self::NegativeX } else { Self::PositiveX })
        } else if gy != T::zero() {
            Some(if gy > T::zero() { Self::NegativeY } else { Self::PositiveY })
        } else {
            None
        }
    }

    pub fn axis(&self) -> usize {
        match self {
            Self::PositiveX | Self::NegativeX => 0,
            Self::PositiveY | Self::NegativeY => 1,
        }
    }

    pub fn sign(&self) -> isize {
        match self {
            Self::PositiveX | Self::PositiveY => 1,
            Self::NegativeX | Self::NegativeY => -1,
        }
    }
}

impl Display for PushDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PositiveX => "+x",
            Self::NegativeX => "-x",
            Self::PositiveY => "+y",
            Self::NegativeY => "-y",
        };
        write!(f, "{s}")
    }
}

/// Moves every inactive vertex of a stencil into the active domain.
///
/// An inactive vertex is shifted by `nodes_per_dim` grid steps along `direction`. With
/// [`StencilRepair::Iterative`] the shift is repeated until an active vertex is reached. Since all
/// shifts are multiples of the stencil width along a single axis, the repaired stencil keeps
/// `nodes_per_dim` distinct vertices on every grid line parallel to the push axis.
///
/// Returns the number of vertices that were moved.
pub fn repair_stencil<T: Real>(
    grid: &StructuredGrid2d<T>,
    active_vertices: &[bool],
    cell: usize,
    direction: Option<PushDirection>,
    nodes_per_dim: usize,
    policy: StencilRepair,
    vertices: &mut [usize],
) -> Result<usize, GdError> {
    let mut num_moved = 0;
    for vertex in vertices.iter_mut().filter(|v| !active_vertices[**v]) {
        let failure = GdError::StencilRepairFailed {
            cell,
            vertex: *vertex,
            direction,
        };
        let direction = direction.ok_or_else(|| failure.clone())?;
        let step = direction.sign() * nodes_per_dim as isize;
        let [i, j] = grid.vertex_coords(*vertex).map(|c| c as isize);
        let mut ij = [i, j];

        let repaired = loop {
            ij[direction.axis()] += step;
            match grid.try_vertex_index(ij[0], ij[1]) {
                Some(candidate) if active_vertices[candidate] => break candidate,
                Some(_) if policy == StencilRepair::Iterative => continue,
                _ => return Err(failure),
            }
        };
        *vertex = repaired;
        num_moved += 1;
    }
    Ok(num_moved)
}
