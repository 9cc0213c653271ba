//! Galerkin-Difference discretization of level-set cut domains on structured grids,
//! together with a physics-agnostic assembly engine for energies, residuals, Jacobians
//! and level-set design derivatives.
use nalgebra::RealField;

pub mod allocators;
pub mod assembly;
pub mod basis;
pub mod config;
pub mod error;
pub mod grid;
pub mod level_set;
pub mod linalg;
pub mod mesh;
pub mod quadrature;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use config::{GdConfig, StencilRepair};
pub use error::GdError;

/// Scalar type used throughout the crate.
///
/// Used as a trait alias for the traits frequently needed by generic `cutgd` routines.
pub trait Real: RealField + Copy {}

impl<T> Real for T where T: RealField + Copy {}
