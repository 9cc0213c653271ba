//! Physics-agnostic assembly of energies, residuals, Jacobians and level-set design derivatives.
pub mod buffers;
pub mod global;
pub mod local;
pub mod physics;
pub mod sparse;

pub use global::GalerkinAnalysis;
pub use physics::{Physics, PointCoefficients, PointJacobian};
pub use sparse::{BlockCsrMatrix, BlockMatrixSink};
