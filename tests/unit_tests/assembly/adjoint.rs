use super::{sloped_line_design, smooth_field, CutCellQuadrature, NonlinearElasticity, NonlinearPoisson};
use cutgd::assembly::{GalerkinAnalysis, Physics};
use cutgd::basis::GdBasis;
use cutgd::level_set::DesignState;
use cutgd::mesh::{CutMesh, GalerkinMesh};
use cutgd::{GdConfig, GdError};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DVector, DVectorView};
use util::approximate_gradient_fd;

/// Compares the adjoint product with central differences of `adjoint^T r(u; phi)` in the level set
/// values, keeping the mesh and basis of the unperturbed design.
fn check_adjoint_product<P>(physics: &P, design: &DesignState<f64>, mesh: &CutMesh<f64>)
where
    P: Physics<f64>,
    nalgebra::DefaultAllocator: cutgd::allocators::SolutionAllocator<f64, P::SolutionDim>,
{
    let basis = GdBasis::new(mesh, &GdConfig::default()).unwrap();
    let quadrature = CutCellQuadrature::new(design, mesh, 4);
    let analysis = GalerkinAnalysis::new(mesh, &basis, &quadrature, physics);

    let u = smooth_field(analysis.num_dofs(), 0.3);
    let psi = smooth_field(analysis.num_dofs(), -1.1);
    let product = analysis
        .lsf_jacobian_adjoint_product(u.as_view(), psi.as_view())
        .unwrap();
    assert_eq!(product.len(), design.num_dofs());

    let weighted_residual = |phi: DVectorView<f64>| {
        let perturbed = DesignState::from_values(design.grid().clone(), phi.clone_owned()).unwrap();
        let quadrature = CutCellQuadrature::new(&perturbed, mesh, 4);
        let analysis = GalerkinAnalysis::new(mesh, &basis, &quadrature, physics);
        analysis.residual(u.as_view()).unwrap().dot(&psi)
    };
    let mut phi = design.values().clone();
    let fd = approximate_gradient_fd(weighted_residual, &mut phi, 1e-6);
    assert_matrix_eq!(product, fd, comp = abs, tol = 1e-7);

    // Only corners of cut cells move quadrature points
    assert!(product.iter().any(|&d| d.abs() > 1e-6));
    let par = analysis
        .par_lsf_jacobian_adjoint_product(u.as_view(), psi.as_view())
        .unwrap();
    assert_matrix_eq!(par, product, comp = abs, tol = 1e-12);
}

#[test]
fn scalar_adjoint_product_matches_finite_differences() {
    let (design, mesh) = sloped_line_design();
    check_adjoint_product(&NonlinearPoisson { source: 0.8 }, &design, &mesh);
}

#[test]
fn vector_adjoint_product_matches_finite_differences() {
    let (design, mesh) = sloped_line_design();
    let physics = NonlinearElasticity {
        mu: 1.3,
        lambda: 0.7,
        kappa: 2.0,
    };
    check_adjoint_product(&physics, &design, &mesh);
}

#[test]
fn adjoint_product_vanishes_away_from_interface() {
    let (design, mesh) = sloped_line_design();
    let basis = GdBasis::new(&mesh, &GdConfig::default()).unwrap();
    let quadrature = CutCellQuadrature::new(&design, &mesh, 3);
    let physics = NonlinearPoisson { source: 0.5 };
    let analysis = GalerkinAnalysis::new(&mesh, &basis, &quadrature, &physics);

    let u = smooth_field(analysis.num_dofs(), 0.0);
    let psi = smooth_field(analysis.num_dofs(), 0.9);
    let product = analysis
        .lsf_jacobian_adjoint_product(u.as_view(), psi.as_view())
        .unwrap();

    // Vertices whose cells are all uncut by the line y = 0.4 x + 0.7
    let grid = design.grid();
    for [i, j] in [[0, 0], [3, 1], [5, 0], [5, 2]] {
        assert_eq!(product[grid.vertex_index(i, j)], 0.0);
    }
    // Corners of the cut cell (1, 3)
    for vertex in grid.cell_vertices(grid.cell_index(1, 3)) {
        assert!(product[vertex] != 0.0);
    }
}

#[test]
fn adjoint_of_wrong_length_is_rejected() {
    let (design, mesh) = sloped_line_design();
    let basis = GdBasis::new(&mesh, &GdConfig::default()).unwrap();
    let quadrature = CutCellQuadrature::new(&design, &mesh, 2);
    let physics = NonlinearPoisson { source: 0.0 };
    let analysis = GalerkinAnalysis::new(&mesh, &basis, &quadrature, &physics);

    let u = DVector::zeros(mesh.num_nodes());
    let psi = DVector::zeros(mesh.num_nodes() + 1);
    let err = analysis
        .par_lsf_jacobian_adjoint_product(u.as_view(), psi.as_view())
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<GdError>(),
        Some(&GdError::DimensionMismatch {
            what: "adjoint",
            expected: 35,
            actual: 36
        })
    );
}
