//! Discretization parameters.
use serde::{Deserialize, Serialize};

/// Policy applied to stencil vertices that fall outside the active domain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StencilRepair {
    /// Shift once by the stencil width and require the result to be active.
    SingleStep,
    /// Keep shifting by the stencil width until an active vertex is found or the grid ends.
    Iterative,
}

impl Default for StencilRepair {
    fn default() -> Self {
        Self::Iterative
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GdConfig {
    /// Number of stencil nodes along each axis (`Np_1d`). Must be even.
    pub nodes_per_dim: usize,
    pub stencil_repair: StencilRepair,
    /// Reciprocal condition numbers of basis Vandermonde matrices below this value are reported.
    pub rcond_tolerance: f64,
}

impl Default for GdConfig {
    fn default() -> Self {
        Self {
            nodes_per_dim: 4,
            stencil_repair: StencilRepair::default(),
            rcond_tolerance: 1e-12,
        }
    }
}

impl GdConfig {
    pub fn with_nodes_per_dim(self, nodes_per_dim: usize) -> Self {
        Self { nodes_per_dim, ..self }
    }

    pub fn with_stencil_repair(self, stencil_repair: StencilRepair) -> Self {
        Self { stencil_repair, ..self }
    }

    pub fn with_rcond_tolerance(self, rcond_tolerance: f64) -> Self {
        Self { rcond_tolerance, ..self }
    }
}
