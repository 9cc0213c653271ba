//! Quadrature rules for the one-dimensional domain `[-1, 1]`.
use std::f64::consts::PI;

/// Weights and points of a one-dimensional rule.
pub type Rule1d = (Vec<f64>, Vec<f64>);

/// Legendre polynomial `P_n` and its predecessor `P_{n-1}` at a point.
///
/// The derivative formula is singular at `|x| == 1`, so this is only suitable for the open
/// interval `(-1, 1)`.
#[derive(Debug, Default)]
struct Legendre {
    n: usize,
    x: f64,
    p_n: f64,
    p_prev: f64,
}

impl Legendre {
    fn evaluate(n: usize, x: f64) -> Self {
        // m P_m(x) = (2m - 1) x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let (mut p_n, mut p_prev) = (1.0, 0.0);
        for m in 1..=n {
            let m = m as f64;
            let p_next = ((2.0 * m - 1.0) * x * p_n - (m - 1.0) * p_prev) / m;
            p_prev = p_n;
            p_n = p_next;
        }
        Self { n, x, p_n, p_prev }
    }

    fn derivative(&self) -> f64 {
        // P_n'(x) = n (x P_n(x) - P_{n - 1}(x)) / (x^2 - 1)
        let n = self.n as f64;
        n * (self.x * self.p_n - self.p_prev) / (self.x * self.x - 1.0)
    }
}

const MAX_NEWTON_ITERATIONS: usize = 100;

/// Gauss–Legendre rule with `num_points` points on `[-1, 1]`.
///
/// The rule integrates polynomials of degree up to `2 num_points - 1` exactly. Points are returned
/// in ascending order.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule1d {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    let mut points = vec![0.0; n];
    let mut weights = vec![0.0; n];

    // Roots are symmetric, so only the upper half is computed
    for i in 0..(n + 1) / 2 {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut legendre = Legendre::evaluate(n, x);
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let dx = -legendre.p_n / legendre.derivative();
            x += dx;
            legendre = Legendre::evaluate(n, x);
            if dx.abs() <= 1e-15 {
                break;
            }
        }
        let dp = legendre.derivative();
        let w = 2.0 / ((1.0 - x * x) * dp * dp);

        points[n - 1 - i] = x;
        weights[n - 1 - i] = w;
        points[i] = -x;
        weights[i] = w;
    }

    (weights, points)
}
