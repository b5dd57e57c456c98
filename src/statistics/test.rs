use super::{calc_correlation_matrix, FitStatistics, StatisticsError};
use approx::assert_relative_eq;
use assert_matches::assert_matches;
use nalgebra::{DMatrix, DVector};

// residual of fitting y = a*x with the jacobian of r = y - a*x
fn single_parameter_statistics() -> FitStatistics {
    let residual = DVector::from_vec(vec![0.1, -0.2, 0.1]);
    let jacobian = DMatrix::from_column_slice(3, 1, &[-1., -2., -3.]);
    FitStatistics::try_calculate(
        &residual,
        &jacobian,
        DVector::from_vec(vec![2.]),
        vec!["a".to_string()],
        7,
    )
    .expect("statistics must be calculated")
}

#[test]
fn statistics_of_single_parameter_fit_are_correct() {
    let statistics = single_parameter_statistics();
    assert_eq!(statistics.n_evaluations(), 7);
    assert_eq!(statistics.n_variables(), 1);
    assert_eq!(statistics.n_data(), 3);
    assert_eq!(statistics.n_free(), 2);
    assert_relative_eq!(statistics.chi2(), 0.06, epsilon = 1e-12);
    assert_relative_eq!(statistics.reduced_chi2(), 0.03, epsilon = 1e-12);
    assert_eq!(statistics.parameter("a"), Some(2.));
    assert_eq!(statistics.parameter("b"), None);

    let covariance = statistics
        .covariance_matrix()
        .expect("covariance must exist");
    assert_relative_eq!(covariance[(0, 0)], 0.03 / 14., epsilon = 1e-12);
    let standard_errors = statistics.standard_errors().unwrap();
    assert_relative_eq!(standard_errors[0], (0.03f64 / 14.).sqrt(), epsilon = 1e-12);
}

#[test]
fn confidence_radius_uses_students_t_quantile() {
    let statistics = single_parameter_statistics();
    // closed form of the t quantile for two degrees of freedom
    let p: f64 = 0.975;
    let t = (2. * p - 1.) / (2. * p * (1. - p)).sqrt();
    let radius = statistics.confidence_radius(0.95).unwrap();
    assert_relative_eq!(
        radius[0],
        t * statistics.standard_errors().unwrap()[0],
        epsilon = 1e-4
    );
}

#[test]
#[should_panic]
fn confidence_radius_panics_for_invalid_probability() {
    _ = single_parameter_statistics().confidence_radius(1.);
}

#[test]
fn singular_jacobian_gives_no_covariance() {
    let residual = DVector::from_vec(vec![0.1, -0.2, 0.1]);
    let jacobian = DMatrix::from_column_slice(3, 2, &[1., 2., 3., 1., 2., 3.]);
    let statistics = FitStatistics::try_calculate(
        &residual,
        &jacobian,
        DVector::from_vec(vec![1., 1.]),
        vec!["a".to_string(), "b".to_string()],
        1,
    )
    .unwrap();
    assert!(statistics.covariance_matrix().is_none());
    assert!(statistics.standard_errors().is_none());
    assert!(statistics.confidence_radius(0.9).is_none());
    assert!(statistics.correlation_matrix().is_none());
}

#[test]
fn reduced_chi_square_of_underdetermined_fit_divides_by_one() {
    let residual = DVector::from_vec(vec![0.5]);
    let jacobian = DMatrix::from_column_slice(1, 2, &[1., 2.]);
    let statistics = FitStatistics::try_calculate(
        &residual,
        &jacobian,
        DVector::from_vec(vec![1., 1.]),
        vec!["a".to_string(), "b".to_string()],
        1,
    )
    .unwrap();
    assert_eq!(statistics.n_free(), -1);
    assert_relative_eq!(statistics.reduced_chi2(), 0.25);
}

#[test]
fn mismatched_shapes_are_rejected() {
    let residual = DVector::from_vec(vec![0.1, -0.2, 0.1]);
    let jacobian = DMatrix::zeros(2, 1);
    assert_matches!(
        FitStatistics::try_calculate(
            &residual,
            &jacobian,
            DVector::from_vec(vec![1.]),
            vec!["a".to_string()],
            1
        ),
        Err(StatisticsError::JacobianShapeMismatch {
            shape: (2, 1),
            residuals: 3,
            parameters: 1
        })
    );
    assert_matches!(
        FitStatistics::try_calculate(
            &residual,
            &DMatrix::zeros(3, 1),
            DVector::from_vec(vec![1.]),
            vec![],
            1
        ),
        Err(StatisticsError::ParameterNameCountMismatch {
            names: 0,
            parameters: 1
        })
    );
}

#[test]
fn correlation_matrix_is_calculated_correctly_from_a_covariance_matrix() {
    let cov = DMatrix::from_row_slice(2, 2, &[2., 3., 4., 5.]);
    let corr = DMatrix::from_row_slice(
        2,
        2,
        &[1.0, 3. / f64::sqrt(10.), 4. / f64::sqrt(10.), 1.0],
    );
    assert_relative_eq!(corr, calc_correlation_matrix(&cov));
}
