//! Axis-aligned structured background grids.
use crate::error::GdError;
use crate::Real;
use nalgebra::{Point2, Vector2};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// A structured grid of `nxy[0] x nxy[1]` rectangular cells covering `[xy0, xy0 + lxy]`.
///
/// Vertices are numbered `i + (nxy[0] + 1) * j` and cells `i + nxy[0] * j`, with `i` running along x.
/// The four vertices of a cell are listed counter-clockwise starting at the lower-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredGrid2d<T: Real> {
    nxy: [usize; 2],
    lxy: [T; 2],
    xy0: [T; 2],
}

impl<T: Real> StructuredGrid2d<T> {
    pub fn new(nxy: [usize; 2], lxy: [T; 2], xy0: [T; 2]) -> Result<Self, GdError> {
        for axis in 0..2 {
            if nxy[axis] == 0 || lxy[axis] <= T::zero() {
                return Err(GdError::InvalidGrid { axis });
            }
        }
        Ok(Self { nxy, lxy, xy0 })
    }

    /// A grid over `[0, lxy[0]] x [0, lxy[1]]`.
    pub fn from_extents(nxy: [usize; 2], lxy: [T; 2]) -> Result<Self, GdError> {
        Self::new(nxy, lxy, [T::zero(); 2])
    }

    pub fn cells_per_dim(&self) -> [usize; 2] {
        self.nxy
    }

    pub fn extents(&self) -> [T; 2] {
        self.lxy
    }

    pub fn origin(&self) -> Point2<T> {
        Point2::from(self.xy0)
    }

    pub fn num_vertices(&self) -> usize {
        (self.nxy[0] + 1) * (self.nxy[1] + 1)
    }

    pub fn num_cells(&self) -> usize {
        self.nxy[0] * self.nxy[1]
    }

    /// Returns the vertex index at the given vertex coordinates, or `None` if they lie outside the grid.
    pub fn try_vertex_index(&self, i: isize, j: isize) -> Option<usize> {
        let in_range = |c: isize, n: usize| c >= 0 && (c as usize) <= n;
        (in_range(i, self.nxy[0]) && in_range(j, self.nxy[1])).then(|| self.vertex_index(i as usize, j as usize))
    }

    pub fn vertex_index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i <= self.nxy[0] && j <= self.nxy[1]);
        i + (self.nxy[0] + 1) * j
    }

    pub fn vertex_coords(&self, vertex: usize) -> [usize; 2] {
        let n = self.nxy[0] + 1;
        [vertex % n, vertex / n]
    }

    pub fn cell_index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.nxy[0] && j < self.nxy[1]);
        i + self.nxy[0] * j
    }

    pub fn cell_coords(&self, cell: usize) -> [usize; 2] {
        [cell % self.nxy[0], cell / self.nxy[0]]
    }

    pub fn cell_vertices(&self, cell: usize) -> [usize; 4] {
        let [i, j] = self.cell_coords(cell);
        [
            self.vertex_index(i, j),
            self.vertex_index(i + 1, j),
            self.vertex_index(i + 1, j + 1),
            self.vertex_index(i, j + 1),
        ]
    }

    pub fn cell_size(&self) -> Vector2<T> {
        Vector2::new(
            self.lxy[0] / T::from_usize(self.nxy[0]).unwrap(),
            self.lxy[1] / T::from_usize(self.nxy[1]).unwrap(),
        )
    }

    pub fn vertex_position(&self, vertex: usize) -> Point2<T> {
        let [i, j] = self.vertex_coords(vertex);
        let h = self.cell_size();
        Point2::new(
            self.xy0[0] + T::from_usize(i).unwrap() * h.x,
            self.xy0[1] + T::from_usize(j).unwrap() * h.y,
        )
    }

    /// Lower-left and upper-right corners of the cell.
    pub fn cell_bounds(&self, cell: usize) -> (Point2<T>, Point2<T>) {
        let [v0, _, v2, _] = self.cell_vertices(cell);
        (self.vertex_position(v0), self.vertex_position(v2))
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn cell_centroid(&self, cell: usize) -> Point2<T> {
        let (lower, upper) = self.cell_bounds(cell);
        Point2::from((lower.coords + upper.coords) * 0.5)
    }

    /// Locates the cell containing `x`. Points outside the grid are clamped to the nearest cell.
    pub fn locate_cell(&self, x: &Point2<T>) -> usize {
        let h = self.cell_size();
        let mut ij = [0; 2];
        for axis in 0..2 {
            let t = ((x[axis] - self.xy0[axis]) / h[axis]).floor().max(T::zero());
            let t: f64 = nalgebra::try_convert(t).unwrap_or(0.0);
            ij[axis] = (t as usize).min(self.nxy[axis] - 1);
        }
        self.cell_index(ij[0], ij[1])
    }
}
