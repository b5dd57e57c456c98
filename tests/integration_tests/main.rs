use approx::assert_relative_eq;
use assert_matches::assert_matches;
use globalfit::dataset::DatasetError;
use globalfit::prelude::*;
use globalfit::problem::{EvaluationError, SetupError};
use nalgebra::{DMatrix, DVector};
use shared_test_code::models::{decay_model, DecayMeasurement};
use shared_test_code::{add_noise, gaussian_spectra, linspace};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod fit_result_tests;

#[test]
fn two_datasets_with_overlapping_spectral_axes_give_accurate_rates() {
    let rates = [0.5, 2.];
    let centers = [450., 520.];
    let spectral1 = linspace(400., 500., 11);
    let spectral2 = linspace(450., 550., 11);
    let time1 = linspace(0., 10., 41);
    let time2 = linspace(0., 8., 33);
    // the spectra are a property of the species, so both datasets share them
    let spectra1 = gaussian_spectra(&spectral1, &centers, 40.);
    let spectra2 = gaussian_spectra(&spectral2, &centers, 40.);
    let data1 = shared_test_code::decay_data(&time1, &rates, &spectra1);
    let data2 = shared_test_code::decay_data(&time2, &rates, &spectra2);

    let problem = GlobalProblemBuilder::new(decay_model(2, &["dataset1", "dataset2"]))
        .dataset(
            Dataset::new(
                "dataset1",
                Axis::new("time", time1),
                Axis::new("spectral", spectral1),
                data1,
            )
            .unwrap(),
        )
        .dataset(
            Dataset::new(
                "dataset2",
                Axis::new("time", time2),
                Axis::new("spectral", spectral2),
                data2,
            )
            .unwrap(),
        )
        .initial_parameters(DVector::from_vec(vec![0.3, 3.]))
        .build()
        .expect("building valid problem must succeed");

    // 450..500 are shared, everything else belongs to a single dataset
    assert_eq!(problem.grouping().len(), 16);
    assert_eq!(problem.grouping().keys().len(), 3);

    let result = GlobalFitSolver::default()
        .fit(problem)
        .expect("fit must not fail");
    assert!(result.was_successful(), "fit did not converge");
    assert_relative_eq!(result.best_parameters()[0], 0.5, epsilon = 1e-6);
    assert_relative_eq!(result.best_parameters()[1], 2., epsilon = 1e-6);
    assert_relative_eq!(result.statistics.chi2(), 0., epsilon = 1e-12);

    let dataset1 = result.dataset("dataset1").unwrap();
    let dataset2 = result.dataset("dataset2").unwrap();
    assert_relative_eq!(dataset1.clp, spectra1, epsilon = 1e-6);
    assert_relative_eq!(dataset2.clp, spectra2, epsilon = 1e-6);
}

#[test]
fn non_negative_fit_of_positive_spectra_gives_accurate_rates() {
    let measurement = DecayMeasurement::new(linspace(0., 10., 51), linspace(400., 600., 21), &[0.4, 1.5]);
    let problem = GlobalProblemBuilder::new(decay_model(2, &["dataset1"]))
        .dataset(measurement.dataset("dataset1"))
        .initial_parameters(DVector::from_vec(vec![0.3, 1.]))
        .nnls(true)
        .build()
        .expect("building valid problem must succeed");
    assert_eq!(problem.solver().kind(), LinearSolverKind::NonNegative);

    let result = GlobalFitSolver::default()
        .fit(problem)
        .expect("fit must not fail");
    assert!(result.was_successful());
    assert_relative_eq!(result.best_parameters()[0], 0.4, epsilon = 1e-6);
    assert_relative_eq!(result.best_parameters()[1], 1.5, epsilon = 1e-6);
    assert_eq!(result.unconverged_total, 0);
    let clp = &result.dataset("dataset1").unwrap().clp;
    assert!(clp.iter().all(|&c| c >= 0.));
    assert_relative_eq!(*clp, measurement.spectra, epsilon = 1e-6);
}

#[test]
fn exhausted_non_negative_solves_are_reported_but_do_not_stop_the_fit() {
    let measurement = DecayMeasurement::new(linspace(0., 10., 51), linspace(400., 600., 21), &[0.4, 1.5]);
    // both spectra are positive everywhere, so every group needs two active
    // columns and a single iteration can never finish the active set search
    let problem = GlobalProblemBuilder::new(decay_model(2, &["dataset1"]))
        .dataset(measurement.dataset("dataset1"))
        .initial_parameters(DVector::from_vec(vec![0.3, 1.]))
        .nnls(true)
        .nnls_max_iterations(1)
        .build()
        .expect("unconverged linear solves must not fail the setup");
    assert_eq!(problem.unconverged_last(), problem.grouping().len());
    assert!(problem.unconverged_total() > 0);

    let result = GlobalFitSolver::default()
        .fit(problem)
        .expect("unconverged linear solves must not fail the fit");
    assert!(result.unconverged_last > 0);
    assert!(result.unconverged_total > result.unconverged_last);
    let clp = &result.dataset("dataset1").unwrap().clp;
    assert!(clp.iter().all(|&c| c >= 0.));
}

#[test]
fn noisy_fit_gives_statistics_with_sensible_errors() {
    let measurement = DecayMeasurement::new(linspace(0., 10., 101), linspace(400., 600., 21), &[0.4, 1.5]);
    let noisy = add_noise(&measurement.data, 0.01, 42);
    let dataset = Dataset::new(
        "dataset1",
        Axis::new("time", measurement.time.clone()),
        Axis::new("spectral", measurement.spectral.clone()),
        noisy,
    )
    .unwrap();
    let problem = GlobalProblemBuilder::new(decay_model(2, &["dataset1"]))
        .dataset(dataset)
        .initial_parameters(DVector::from_vec(vec![0.3, 1.]))
        .build()
        .unwrap();
    let result = GlobalFitSolver::default().fit(problem).unwrap();
    assert!(result.was_successful());

    let statistics = &result.statistics;
    assert_eq!(statistics.n_data(), 101 * 21);
    assert_eq!(statistics.n_variables(), 2);
    // the reduced chi-square estimates the variance of the noise
    assert_relative_eq!(statistics.reduced_chi2(), 1e-4, max_relative = 0.2);

    let errors = statistics.standard_errors().expect("covariance must exist");
    let radius = statistics.confidence_radius(0.95).unwrap();
    for idx in 0..2 {
        assert!(errors[idx] > 0. && errors[idx] < 0.05);
        assert!(radius[idx] > errors[idx]);
    }
    assert!((result.best_parameters()[0] - 0.4).abs() < 5. * errors[0]);
    assert!((result.best_parameters()[1] - 1.5).abs() < 5. * errors[1]);
    let correlation = statistics.correlation_matrix().unwrap();
    assert_relative_eq!(correlation[(0, 0)], 1., epsilon = 1e-10);
}

#[test]
fn dataset_without_estimated_axis_is_rejected_at_setup() {
    let measurement = DecayMeasurement::new(linspace(0., 5., 11), linspace(400., 600., 5), &[0.4]);
    let dataset = Dataset::new(
        "dataset1",
        Axis::new("time", measurement.time.clone()),
        Axis::new("wavelength", measurement.spectral.clone()),
        measurement.data.clone(),
    )
    .unwrap();
    let result = GlobalProblemBuilder::new(decay_model(1, &["dataset1"]))
        .dataset(dataset)
        .initial_parameters(DVector::from_vec(vec![0.4]))
        .build();
    assert_eq!(
        result.unwrap_err(),
        SetupError::InvalidDatasets(vec![DatasetError::MissingAxis {
            dataset: "dataset1".to_string(),
            missing: vec!["spectral".to_string()],
        }])
    );
}

#[test]
fn exhausted_evaluations_return_the_best_result_so_far() {
    let measurement = DecayMeasurement::new(linspace(0., 10., 51), linspace(400., 600., 11), &[0.4, 1.5]);
    let problem = GlobalProblemBuilder::new(decay_model(2, &["dataset1"]))
        .dataset(measurement.dataset("dataset1"))
        .initial_parameters(DVector::from_vec(vec![0.05, 5.]))
        .max_evaluations(3)
        .build()
        .unwrap();
    let result = GlobalFitSolver::default()
        .fit(problem)
        .expect("running out of evaluations is no error");
    assert!(!result.was_successful());
    assert!(result.minimization_report.is_some());
    assert_eq!(result.datasets.len(), 1);
}

#[test]
fn callback_sees_every_evaluation() {
    let measurement = DecayMeasurement::new(linspace(0., 10., 51), linspace(400., 600., 11), &[0.4]);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_callback = Arc::clone(&calls);
    let problem = GlobalProblemBuilder::new(decay_model(1, &["dataset1"]))
        .dataset(measurement.dataset("dataset1"))
        .initial_parameters(DVector::from_vec(vec![0.3]))
        .on_evaluation(move |evaluation, parameters, chi_square| {
            let previous = calls_in_callback.fetch_add(1, Ordering::SeqCst);
            assert_eq!(evaluation, previous + 1);
            assert_eq!(parameters.len(), 1);
            assert!(chi_square >= 0.);
        })
        .build()
        .unwrap();
    let result = GlobalFitSolver::default().fit(problem).unwrap();
    // the callback also sees the evaluations during setup and after the fit
    assert!(calls.load(Ordering::SeqCst) > result.statistics.n_evaluations());
    assert!(result.statistics.n_evaluations() > 1);
}

/// a decay whose CLP label depends on whether the rate exceeds one
struct RenamingDecay;

impl Megacomplex for RenamingDecay {
    fn calculate_matrix(
        &self,
        parameters: &DVector<f64>,
        calculated_axis: &DVector<f64>,
        _estimated_axis: &DVector<f64>,
        _global_index: usize,
    ) -> Result<ClpMatrix, MegacomplexError> {
        let rate = parameters[0];
        let label = if rate > 1. { "fast" } else { "slow" };
        Ok(ClpMatrix {
            clp_labels: vec![label.to_string()],
            matrix: DMatrix::from_column_slice(
                calculated_axis.len(),
                1,
                calculated_axis.map(|t| (-rate * t).exp()).as_slice(),
            ),
        })
    }
}

#[test]
fn changing_clp_labels_during_the_fit_is_fatal() {
    let measurement = DecayMeasurement::new(linspace(0., 10., 21), linspace(400., 600., 3), &[0.2]);
    let model = ModelBuilder::new(&["k"])
        .estimated_axis("spectral")
        .calculated_axis("time")
        .megacomplex_instance("renaming", Box::new(RenamingDecay))
        .dataset("dataset1", &["renaming"])
        .build()
        .unwrap();
    let problem = GlobalProblemBuilder::new(model)
        .dataset(measurement.dataset("dataset1"))
        .initial_parameters(DVector::from_vec(vec![1.]))
        .build()
        .expect("labels are consistent at the initial parameters");
    let result = GlobalFitSolver::default().fit(problem);
    assert_matches!(
        result,
        Err(FitError::Evaluation(EvaluationError::ClpLabelsChanged { ref dataset, ref label }))
            if dataset == "dataset1" && label == "fast"
    );
}

/// a decay that gets faster towards larger coordinates of the estimated axis
struct ShiftedDecay;

impl Megacomplex for ShiftedDecay {
    fn calculate_matrix(
        &self,
        parameters: &DVector<f64>,
        calculated_axis: &DVector<f64>,
        estimated_axis: &DVector<f64>,
        global_index: usize,
    ) -> Result<ClpMatrix, MegacomplexError> {
        let rate = parameters[0] * (1. + 0.01 * estimated_axis[global_index]);
        Ok(ClpMatrix {
            clp_labels: vec!["species".to_string()],
            matrix: DMatrix::from_column_slice(
                calculated_axis.len(),
                1,
                calculated_axis.map(|t| (-rate * t).exp()).as_slice(),
            ),
        })
    }

    fn index_dependent(&self) -> bool {
        true
    }
}

#[test]
fn index_dependent_megacomplex_is_fitted_per_point_of_the_estimated_axis() {
    let time = linspace(0., 5., 26);
    let spectral = vec![0., 10., 20., 30.];
    let amplitudes = [1., 2., 3., 4.];
    let data = DMatrix::from_fn(time.len(), spectral.len(), |t, s| {
        amplitudes[s] * (-0.8 * (1. + 0.01 * spectral[s]) * time[t]).exp()
    });
    let model = ModelBuilder::new(&["k"])
        .estimated_axis("spectral")
        .calculated_axis("time")
        .megacomplex_instance("shifted", Box::new(ShiftedDecay))
        .dataset("dataset1", &["shifted"])
        .build()
        .unwrap();
    assert!(model.index_dependent(model.dataset_model("dataset1").unwrap()));

    let problem = GlobalProblemBuilder::new(model)
        .dataset(
            Dataset::new(
                "dataset1",
                Axis::new("time", time),
                Axis::new("spectral", spectral),
                data,
            )
            .unwrap(),
        )
        .initial_parameters(DVector::from_vec(vec![0.5]))
        .build()
        .unwrap();
    let result = GlobalFitSolver::default().fit(problem).unwrap();
    assert!(result.was_successful());
    assert_relative_eq!(result.best_parameters()[0], 0.8, epsilon = 1e-6);
    assert_relative_eq!(
        result.dataset("dataset1").unwrap().clp_column("species").unwrap(),
        DVector::from_vec(amplitudes.to_vec()),
        epsilon = 1e-6
    );
}
