//! Level-set fields and the level-set design state.
//!
//! Throughout the crate a point `x` belongs to the analysis domain if and only if
//! the level set value at `x` is non-positive.
use crate::error::GdError;
use crate::grid::StructuredGrid2d;
use crate::mesh::GalerkinMesh;
use crate::Real;
use nalgebra::{DVector, Point2, Vector2};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// A scalar field whose non-positive region is the analysis domain.
pub trait LevelSet<T: Real> {
    fn value(&self, x: &Point2<T>) -> T;
    fn gradient(&self, x: &Point2<T>) -> Vector2<T>;

    fn is_inside(&self, x: &Point2<T>) -> bool {
        self.value(x) <= T::zero()
    }

    fn union<Other>(self, other: Other) -> LevelSetUnion<Self, Other>
    where
        Self: Sized,
        Other: Sized + LevelSet<T>,
    {
        LevelSetUnion {
            left: self,
            right: other,
        }
    }
}

impl<T: Real, L: LevelSet<T> + ?Sized> LevelSet<T> for &L {
    fn value(&self, x: &Point2<T>) -> T {
        L::value(self, x)
    }

    fn gradient(&self, x: &Point2<T>) -> Vector2<T> {
        L::gradient(self, x)
    }
}

/// The half plane `y <= k x + b`, represented by `-k x + y - b`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LineLevelSet<T> {
    pub k: T,
    pub b: T,
}

impl<T: Real> LevelSet<T> for LineLevelSet<T> {
    fn value(&self, x: &Point2<T>) -> T {
        -self.k * x.x + x.y - self.b
    }

    fn gradient(&self, _x: &Point2<T>) -> Vector2<T> {
        Vector2::new(-self.k, T::one())
    }
}

/// Squared-distance circle. The disk is the domain, or with `flip` its complement.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CircleLevelSet<T: Real> {
    pub center: Point2<T>,
    pub radius: T,
    pub flip: bool,
}

impl<T: Real> CircleLevelSet<T> {
    pub fn new(center: Point2<T>, radius: T) -> Self {
        Self {
            center,
            radius,
            flip: false,
        }
    }

    pub fn hole(center: Point2<T>, radius: T) -> Self {
        Self {
            center,
            radius,
            flip: true,
        }
    }

    fn sign(&self) -> T {
        if self.flip {
            -T::one()
        } else {
            T::one()
        }
    }
}

impl<T: Real> LevelSet<T> for CircleLevelSet<T> {
    fn value(&self, x: &Point2<T>) -> T {
        self.sign() * ((x - self.center).norm_squared() - self.radius * self.radius)
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn gradient(&self, x: &Point2<T>) -> Vector2<T> {
        (x - self.center) * (2.0 * self.sign())
    }
}

/// Union of two domains, i.e. the pointwise minimum of the two fields.
#[derive(Copy, Clone, Debug)]
pub struct LevelSetUnion<Left, Right> {
    pub left: Left,
    pub right: Right,
}

impl<T, Left, Right> LevelSet<T> for LevelSetUnion<Left, Right>
where
    T: Real,
    Left: LevelSet<T>,
    Right: LevelSet<T>,
{
    fn value(&self, x: &Point2<T>) -> T {
        self.left.value(x).min(self.right.value(x))
    }

    fn gradient(&self, x: &Point2<T>) -> Vector2<T> {
        if self.left.value(x) <= self.right.value(x) {
            self.left.gradient(x)
        } else {
            self.right.gradient(x)
        }
    }
}

/// Level-set degrees of freedom, one per background grid vertex.
///
/// This is the design variable of a level-set optimization. A [`CutMesh`](crate::mesh::CutMesh) is built
/// from a snapshot of the design state, and quadrature rules that depend on the level set borrow
/// it for the duration of an assembly. Mutation requires exclusive access, so a design update
/// can never interleave with an assembly that relies on the previous snapshot.
///
/// Deserialization checks that there is one value per grid vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "DesignStateData<T>",
    bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>")
)]
pub struct DesignState<T: Real> {
    grid: StructuredGrid2d<T>,
    values: DVector<T>,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct DesignStateData<T: Real> {
    grid: StructuredGrid2d<T>,
    values: DVector<T>,
}

impl<T: Real> TryFrom<DesignStateData<T>> for DesignState<T> {
    type Error = GdError;

    fn try_from(data: DesignStateData<T>) -> Result<Self, GdError> {
        Self::from_values(data.grid, data.values)
    }
}

impl<T: Real> DesignState<T> {
    /// Samples `level_set` at every grid vertex.
    pub fn from_level_set(grid: StructuredGrid2d<T>, level_set: &impl LevelSet<T>) -> Self {
        let values = DVector::from_iterator(
            grid.num_vertices(),
            (0..grid.num_vertices()).map(|v| level_set.value(&grid.vertex_position(v))),
        );
        Self { grid, values }
    }

    pub fn from_values(grid: StructuredGrid2d<T>, values: DVector<T>) -> Result<Self, GdError> {
        if values.len() != grid.num_vertices() {
            return Err(GdError::DimensionMismatch {
                what: "level set values",
                expected: grid.num_vertices(),
                actual: values.len(),
            });
        }
        Ok(Self { grid, values })
    }

    pub fn grid(&self) -> &StructuredGrid2d<T> {
        &self.grid
    }

    pub fn num_dofs(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &DVector<T> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut DVector<T> {
        &mut self.values
    }

    pub fn vertex_value(&self, vertex: usize) -> T {
        self.values[vertex]
    }

    /// Level set values at the nodes of `mesh`, in node order.
    pub fn node_values<M: GalerkinMesh<T>>(&self, mesh: &M) -> DVector<T> {
        DVector::from_iterator(
            mesh.num_nodes(),
            (0..mesh.num_nodes()).map(|node| self.values[mesh.node_vertex(node)]),
        )
    }

    /// Bilinear coordinates of `x` in its cell together with the corner values.
    fn cell_local(&self, x: &Point2<T>) -> (Vector2<T>, [T; 4]) {
        let cell = self.grid.locate_cell(x);
        let (lower, _) = self.grid.cell_bounds(cell);
        let h = self.grid.cell_size();
        let s = (x - lower).component_div(&h);
        let corners = self.grid.cell_vertices(cell).map(|v| self.values[v]);
        (s, corners)
    }
}

/// Bilinear interpolation of the vertex values.
impl<T: Real> LevelSet<T> for DesignState<T> {
    fn value(&self, x: &Point2<T>) -> T {
        let (s, [p0, p1, p2, p3]) = self.cell_local(x);
        let one = T::one();
        (one - s.x) * (one - s.y) * p0 + s.x * (one - s.y) * p1 + s.x * s.y * p2 + (one - s.x) * s.y * p3
    }

    fn gradient(&self, x: &Point2<T>) -> Vector2<T> {
        let (s, [p0, p1, p2, p3]) = self.cell_local(x);
        let one = T::one();
        let h = self.grid.cell_size();
        Vector2::new(
            ((one - s.y) * (p1 - p0) + s.y * (p2 - p3)) / h.x,
            ((one - s.x) * (p3 - p0) + s.x * (p2 - p1)) / h.y,
        )
    }
}
