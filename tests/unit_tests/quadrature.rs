use cutgd::quadrature::univariate::gauss;
use cutgd::quadrature::{tensor_gauss, GaussQuadratureTable, QuadratureTable};
use matrixcompare::assert_scalar_eq;
use nalgebra::Point2;

#[test]
fn gauss_rules_are_symmetric() {
    for n in 1..10 {
        let (weights, points) = gauss(n);
        assert_eq!(weights.len(), n);
        for i in 0..n {
            assert_scalar_eq!(points[i], -points[n - 1 - i], comp = abs, tol = 1e-15);
            assert_scalar_eq!(weights[i], weights[n - 1 - i], comp = abs, tol = 1e-14);
            assert!(weights[i] > 0.0);
        }
        assert_scalar_eq!(weights.iter().sum::<f64>(), 2.0, comp = abs, tol = 1e-13);
    }
}

#[test]
fn two_point_rule() {
    let (weights, points) = gauss(2);
    let x = 1.0 / 3.0_f64.sqrt();
    assert_scalar_eq!(points[0], -x, comp = abs, tol = 1e-15);
    assert_scalar_eq!(points[1], x, comp = abs, tol = 1e-15);
    assert_scalar_eq!(weights[0], 1.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(weights[1], 1.0, comp = abs, tol = 1e-14);
}

#[test]
fn tensor_rule_integrates_tensor_polynomials() {
    let (weights, points) = tensor_gauss::<f64>(3);
    assert_eq!(weights.len(), 9);
    // Points run x-fastest
    assert!(points[0].x < points[1].x && points[0].y == points[1].y);
    assert!(points[0].y < points[3].y);

    let integrate = |f: &dyn Fn(&Point2<f64>) -> f64| -> f64 {
        weights.iter().zip(&points).map(|(w, x)| w * f(x)).sum()
    };
    assert_scalar_eq!(integrate(&|_| 1.0), 4.0, comp = abs, tol = 1e-13);
    assert_scalar_eq!(integrate(&|x| x.x.powi(4) * x.y.powi(2)), 4.0 / 15.0, comp = abs, tol = 1e-13);
    assert_scalar_eq!(integrate(&|x| x.x.powi(5) * x.y.powi(5) + x.x * x.y), 0.0, comp = abs, tol = 1e-13);
}

#[test]
fn gauss_table_serves_every_element() {
    let table = GaussQuadratureTable::<f64>::new(2, 3);
    assert_eq!(table.element_quadrature_size(1), 4);

    let mut points = vec![Point2::origin(); 4];
    let mut weights = vec![0.0; 4];
    table
        .populate_element_quadrature(2, &mut points, &mut weights)
        .unwrap();
    assert_eq!(points.as_slice(), table.points());
    assert_eq!(weights.as_slice(), table.weights());

    assert!(table
        .populate_element_quadrature(3, &mut points, &mut weights)
        .is_err());
}

#[test]
fn gauss_tables_compare_by_value() {
    let table = GaussQuadratureTable::<f64>::new(3, 10);
    let copy = table.clone();
    assert_eq!(copy, table);
    assert_eq!(copy.weights().len(), 9);
    assert_ne!(GaussQuadratureTable::<f64>::new(3, 11), table);
    assert_ne!(GaussQuadratureTable::<f64>::new(2, 10), table);
}
