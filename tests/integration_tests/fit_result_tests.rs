//! Integration tests for the results per dataset after finalization.

use approx::assert_relative_eq;
use globalfit::prelude::*;
use nalgebra::{DMatrix, DVector};
use shared_test_code::models::{decay_model, DecayMeasurement};
use shared_test_code::{add_noise, linspace};
use std::f64::consts::PI;

#[test]
fn fitted_data_and_residual_add_up_to_the_data_for_weighted_datasets() {
    let measurement = DecayMeasurement::new(linspace(0., 10., 41), linspace(400., 600., 9), &[0.4, 1.5]);
    let noisy = add_noise(&measurement.data, 0.02, 7);
    let weight = DMatrix::from_fn(noisy.nrows(), noisy.ncols(), |t, _| if t < 10 { 0.5 } else { 2. });
    let weighted = Dataset::new(
        "weighted",
        Axis::new("time", measurement.time.clone()),
        Axis::new("spectral", measurement.spectral.clone()),
        noisy.clone(),
    )
    .unwrap()
    .with_weight(weight.clone())
    .expect("weight must be valid");
    let unweighted = Dataset::new(
        "unweighted",
        Axis::new("time", measurement.time.clone()),
        Axis::new("spectral", measurement.spectral.clone()),
        noisy.clone(),
    )
    .unwrap();

    let problem = GlobalProblemBuilder::new(decay_model(2, &["weighted", "unweighted"]))
        .datasets([weighted, unweighted])
        .initial_parameters(DVector::from_vec(vec![0.3, 1.]))
        .build()
        .unwrap();
    let result = GlobalFitSolver::default().fit(problem).unwrap();
    assert!(result.was_successful());
    assert_eq!(result.datasets.len(), 2);

    for dataset in &result.datasets {
        // results have one row per point of the estimated axis
        assert_eq!(dataset.data, noisy.transpose());
        assert_relative_eq!(
            &dataset.fitted_data + &dataset.residual,
            dataset.data,
            epsilon = 1e-12
        );
        assert_eq!(dataset.estimated_axis.len(), 9);
        assert_eq!(dataset.calculated_axis.len(), 41);
        assert!(dataset.root_mean_square_error() > 0.);
    }

    let weighted = result.dataset("weighted").unwrap();
    let weighted_residual = weighted
        .weighted_residual
        .as_ref()
        .expect("weighted dataset has a weighted residual");
    assert_relative_eq!(
        *weighted_residual,
        weighted.residual.component_mul(&weight.transpose()),
        epsilon = 1e-12
    );
    assert!(result.dataset("unweighted").unwrap().weighted_residual.is_none());
}

#[test]
fn evaluating_at_the_true_parameters_reproduces_the_data() {
    let measurement = DecayMeasurement::new(linspace(0., 10., 41), linspace(400., 600., 9), &[0.4, 1.5]);
    let problem = GlobalProblemBuilder::new(decay_model(2, &["dataset1"]))
        .dataset(measurement.dataset("dataset1"))
        .initial_parameters(DVector::from_vec(vec![0.4, 1.5]))
        .build()
        .unwrap();
    let result = GlobalFitSolver::default()
        .evaluate(problem)
        .expect("evaluation must not fail");
    assert!(result.minimization_report.is_none());
    let dataset = result.dataset("dataset1").unwrap();
    assert_relative_eq!(dataset.fitted_data, measurement.data.transpose(), epsilon = 1e-10);
    assert_relative_eq!(dataset.clp, measurement.spectra, epsilon = 1e-10);
    assert_relative_eq!(dataset.root_mean_square_error(), 0., epsilon = 1e-10);
    assert!(result.dataset("dataset2").is_none());
}

#[test]
fn damped_oscillation_adds_amplitude_and_phase_to_the_result() {
    let frequency = 0.5;
    let rate = 0.3;
    let time = linspace(0., 10., 101);
    // cosine and sine amplitudes per spectral point
    let cos_amplitudes = [1., 0., 3.];
    let sin_amplitudes = [0., 2., 4.];
    let data = DMatrix::from_fn(time.len(), 3, |t, s| {
        let damping = (-rate * time[t]).exp();
        let phase = 2. * PI * frequency * time[t];
        damping * (cos_amplitudes[s] * phase.cos() + sin_amplitudes[s] * phase.sin())
    });
    let model = ModelBuilder::new(&["f", "r"])
        .estimated_axis("spectral")
        .calculated_axis("time")
        .megacomplex("oscillation", "damped-oscillation", &["f", "r"], &["osc"])
        .dataset("dataset1", &["oscillation"])
        .build()
        .unwrap();
    let problem = GlobalProblemBuilder::new(model)
        .dataset(
            Dataset::new(
                "dataset1",
                Axis::new("time", time),
                Axis::new("spectral", vec![1., 2., 3.]),
                data,
            )
            .unwrap(),
        )
        .initial_parameters(DVector::from_vec(vec![frequency, rate]))
        .build()
        .unwrap();
    let result = GlobalFitSolver::default().evaluate(problem).unwrap();
    let dataset = result.dataset("dataset1").unwrap();
    assert_eq!(
        dataset.clp_labels,
        vec!["osc_cos".to_string(), "osc_sin".to_string()]
    );

    let amplitudes = &dataset.extra["oscillation_associated_spectra"];
    let phases = &dataset.extra["oscillation_phase"];
    assert_eq!(amplitudes.shape(), (3, 1));
    assert_relative_eq!(
        amplitudes.column(0).into_owned(),
        DVector::from_vec(vec![1., 2., 5.]),
        epsilon = 1e-8
    );
    assert_relative_eq!(phases[(0, 0)], 0., epsilon = 1e-8);
    assert_relative_eq!(phases[(1, 0)], PI / 2., epsilon = 1e-8);
    assert_relative_eq!(phases[(2, 0)], 4f64.atan2(3.), epsilon = 1e-8);
}
