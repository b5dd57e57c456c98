#![warn(missing_docs)]
//! a helper crate which carries common code used by the benchtests and the
//! integration tests.
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// models and datasets of the global fit crate that are used in several tests
pub mod models;

/// create holding `count` the elements from range [first,last] with linear spacing. (equivalent to matlabs linspace)
pub fn linspace(first: f64, last: f64, count: usize) -> Vec<f64> {
    assert!(count > 1, "linspace needs at least two elements");
    let step = (last - first) / (count - 1) as f64;
    (0..count).map(|n| first + n as f64 * step).collect()
}

/// exponential decays `exp(-k*t)` with one column per rate `k` and one row per time `t`
pub fn decay_matrix(time: &[f64], rates: &[f64]) -> DMatrix<f64> {
    DMatrix::from_fn(time.len(), rates.len(), |t, k| (-rates[k] * time[t]).exp())
}

/// Gaussian shaped spectra with one row per point of the spectral axis and one
/// column per center. All spectra have the same width and unit amplitude.
pub fn gaussian_spectra(spectral: &[f64], centers: &[f64], width: f64) -> DMatrix<f64> {
    DMatrix::from_fn(spectral.len(), centers.len(), |s, c| {
        (-((spectral[s] - centers[c]) / width).powi(2)).exp()
    })
}

/// Noise free data of a sum of decays with the given decay associated spectra
/// (one column per rate). The data has one row per time and one column per
/// point of the spectral axis.
pub fn decay_data(time: &[f64], rates: &[f64], spectra: &DMatrix<f64>) -> DMatrix<f64> {
    assert_eq!(
        spectra.ncols(),
        rates.len(),
        "need one spectrum per rate"
    );
    decay_matrix(time, rates) * spectra.transpose()
}

/// Add normally distributed noise with the given standard deviation to the data.
/// The noise is reproducible for a given seed.
pub fn add_noise(data: &DMatrix<f64>, standard_deviation: f64, seed: u64) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    data.map(|value| {
        // Box-Muller
        let u1: f64 = rng.gen_range(f64::EPSILON..1.);
        let u2: f64 = rng.gen();
        let normal = (-2. * u1.ln()).sqrt() * (2. * std::f64::consts::PI * u2).cos();
        value + standard_deviation * normal
    })
}

/// the column of a matrix as a vector
pub fn column(matrix: &DMatrix<f64>, idx: usize) -> DVector<f64> {
    matrix.column(idx).into_owned()
}
