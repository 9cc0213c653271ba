//! Dense matrix norms and direct solvers.
//!
//! Norm selectors follow the LAPACK convention (`'M'`, `'1'`/`'O'`, `'I'`, `'F'`/`'E'`).
use crate::error::GdError;
use crate::Real;
use nalgebra::storage::Storage;
use nalgebra::{DMatrix, DVector, Dim, Matrix};
use std::convert::TryFrom;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MatrixNorm {
    /// Largest absolute entry.
    MaxAbs,
    /// Maximum absolute column sum.
    One,
    /// Maximum absolute row sum.
    Infinity,
    Frobenius,
}

impl MatrixNorm {
    pub fn selector(&self) -> char {
        match self {
            Self::MaxAbs => 'M',
            Self::One => '1',
            Self::Infinity => 'I',
            Self::Frobenius => 'F',
        }
    }
}

impl TryFrom<char> for MatrixNorm {
    type Error = GdError;

    fn try_from(selector: char) -> Result<Self, Self::Error> {
        match selector {
            'M' | 'm' => Ok(Self::MaxAbs),
            '1' | 'O' | 'o' => Ok(Self::One),
            'I' | 'i' => Ok(Self::Infinity),
            'F' | 'f' | 'E' | 'e' => Ok(Self::Frobenius),
            other => Err(GdError::UnsupportedNorm(other)),
        }
    }
}

pub fn matrix_norm<T, R, C, S>(a: &Matrix<T, R, C, S>, norm: MatrixNorm) -> T
where
    T: Real,
    R: Dim,
    C: Dim,
    S: Storage<T, R, C>,
{
    let max = |acc: T, x: T| acc.max(x);
    match norm {
        MatrixNorm::MaxAbs => a.iter().map(|x| x.abs()).fold(T::zero(), max),
        MatrixNorm::One => a
            .column_iter()
            .map(|col| col.iter().fold(T::zero(), |s, x| s + x.abs()))
            .fold(T::zero(), max),
        MatrixNorm::Infinity => a
            .row_iter()
            .map(|row| row.iter().fold(T::zero(), |s, x| s + x.abs()))
            .fold(T::zero(), max),
        MatrixNorm::Frobenius => a.iter().fold(T::zero(), |s, &x| s + x * x).sqrt(),
    }
}

fn check_square<T: Real>(a: &DMatrix<T>) -> Result<(), GdError> {
    if a.nrows() != a.ncols() {
        return Err(GdError::DimensionMismatch {
            what: "columns of square matrix",
            expected: a.nrows(),
            actual: a.ncols(),
        });
    }
    Ok(())
}

/// Computes an LU factorization with partial pivoting.
///
/// Fails with the 1-based index of the first exactly zero pivot.
fn factorize<T: Real>(a: DMatrix<T>) -> Result<nalgebra::LU<T, nalgebra::Dyn, nalgebra::Dyn>, GdError> {
    check_square(&a)?;
    let lu = a.lu();
    let zero_pivot = lu.u().diagonal().iter().position(|&u_ii| u_ii == T::zero());
    match zero_pivot {
        Some(index) => Err(GdError::SingularMatrix { status: index + 1 }),
        None => Ok(lu),
    }
}

/// Solves `A x = b`.
pub fn direct_solve<T: Real>(a: DMatrix<T>, b: &DVector<T>) -> Result<DVector<T>, GdError> {
    if a.nrows() != b.len() {
        return Err(GdError::DimensionMismatch {
            what: "right-hand side",
            expected: a.nrows(),
            actual: b.len(),
        });
    }
    let n = a.nrows();
    factorize(a)?
        .solve(b)
        .ok_or(GdError::SingularMatrix { status: n })
}

/// Inverts `A`, optionally also returning the reciprocal condition number `1 / (|A| |A^-1|)`.
///
/// The condition number is only available in the [`MatrixNorm::One`] and [`MatrixNorm::Infinity`]
/// norms. Other norms are rejected before any factorization takes place.
pub fn direct_inverse<T: Real>(a: DMatrix<T>, rcond_norm: Option<MatrixNorm>) -> Result<(DMatrix<T>, Option<T>), GdError> {
    if let Some(norm) = rcond_norm {
        if !matches!(norm, MatrixNorm::One | MatrixNorm::Infinity) {
            return Err(GdError::UnsupportedNorm(norm.selector()));
        }
    }

    let a_norm = rcond_norm.map(|norm| matrix_norm(&a, norm));
    let n = a.nrows();
    let inverse = factorize(a)?
        .try_inverse()
        .ok_or(GdError::SingularMatrix { status: n })?;

    let rcond = rcond_norm.zip(a_norm).map(|(norm, a_norm)| {
        let inv_norm = matrix_norm(&inverse, norm);
        if a_norm == T::zero() || inv_norm == T::zero() {
            T::zero()
        } else {
            T::one() / (a_norm * inv_norm)
        }
    });
    Ok((inverse, rcond))
}
