//! This module includes helper functionality that is useful for testing across all modules

use crate::dataset::{Axis, Dataset};
use crate::model::{Model, ModelBuilder};
use nalgebra::{DMatrix, DVector};

/// evenly spaced values from `start` to `end` (inclusive)
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    assert!(count > 1, "linspace needs at least two points");
    let step = (end - start) / (count - 1) as f64;
    (0..count).map(|idx| start + idx as f64 * step).collect()
}

/// A model with one decay megacomplex and one parameter per rate. The parameters
/// are called `k1,k2,...` and the CLPs `species1,species2,...`. Every dataset in
/// `datasets` uses the decay megacomplex. The calculated axis is called `"time"`
/// and the estimated axis `"spectral"`.
pub fn decay_model(rate_count: usize, datasets: &[&str]) -> Model {
    let parameters: Vec<String> = (1..=rate_count).map(|idx| format!("k{idx}")).collect();
    let species: Vec<String> = (1..=rate_count).map(|idx| format!("species{idx}")).collect();
    datasets
        .iter()
        .fold(
            ModelBuilder::new(&parameters)
                .estimated_axis("spectral")
                .calculated_axis("time")
                .megacomplex("decay", "decay", &parameters, &species),
            |builder, dataset| builder.dataset(*dataset, &["decay"]),
        )
        .build()
        .expect("decay model must be valid")
}

/// Noise free data of a sum of decays. The amplitude of species `j` at
/// spectral index `s` is `amplitudes[(s, j)]`. The data has time rows.
pub fn decay_dataset(
    label: &str,
    time: &[f64],
    spectral: &[f64],
    rates: &[f64],
    amplitudes: &DMatrix<f64>,
) -> Dataset {
    assert_eq!(amplitudes.shape(), (spectral.len(), rates.len()));
    let time_vec = DVector::from_column_slice(time);
    let mut decays = DMatrix::zeros(time.len(), rates.len());
    for (mut column, rate) in decays.column_iter_mut().zip(rates) {
        column.copy_from(&time_vec.map(|t| (-rate * t).exp()));
    }
    Dataset::new(
        label,
        Axis::new("time", time.to_vec()),
        Axis::new("spectral", spectral.to_vec()),
        decays * amplitudes.transpose(),
    )
    .expect("synthetic dataset must be valid")
}
