//! Finite difference helpers shared by the integration tests and benchmarks.
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, RealField};

/// Approximates the gradient of `f: R^n -> R` with central differences.
///
/// The vector `x` is used as scratch space, but its content is restored before returning.
pub fn approximate_gradient_fd<T>(mut f: impl FnMut(DVectorView<T>) -> T, x: &mut DVector<T>, h: T) -> DVector<T>
where
    T: RealField + Copy,
{
    let two = T::one() + T::one();
    let mut df = DVector::zeros(x.len());
    for i in 0..x.len() {
        let x_i = x[i];
        x[i] = x_i + h;
        let f_plus = f(x.as_view());
        x[i] = x_i - h;
        let f_minus = f(x.as_view());
        df[i] = (f_plus - f_minus) / (two * h);
        x[i] = x_i;
    }
    df
}

/// Approximates the Jacobian of `f: R^n -> R^m` with central differences.
///
/// `f` writes its output into the provided mutable vector of length `m`.
pub fn approximate_jacobian_fd<T>(
    m: usize,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: &mut DVector<T>,
    h: T,
) -> DMatrix<T>
where
    T: RealField + Copy,
{
    let two = T::one() + T::one();
    let n = x.len();
    let mut jacobian = DMatrix::zeros(m, n);
    let mut f_plus = DVector::zeros(m);
    let mut f_minus = DVector::zeros(m);
    for j in 0..n {
        let x_j = x[j];
        x[j] = x_j + h;
        f(x.as_view(), f_plus.as_view_mut());
        x[j] = x_j - h;
        f(x.as_view(), f_minus.as_view_mut());
        x[j] = x_j;

        let mut column = jacobian.column_mut(j);
        column += &f_plus;
        column -= &f_minus;
        column /= two * h;
    }
    jacobian
}

/// Approximates the directional derivative `df(x)/dx * p` of `f: R^n -> R^m` with central differences.
pub fn approximate_directional_derivative_fd<T>(
    mut f: impl FnMut(DVectorView<T>) -> DVector<T>,
    x: &DVector<T>,
    p: &DVector<T>,
    h: T,
) -> DVector<T>
where
    T: RealField + Copy,
{
    let two = T::one() + T::one();
    let x_plus = x + p * h;
    let x_minus = x - p * h;
    (f(x_plus.as_view()) - f(x_minus.as_view())) / (two * h)
}

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}
