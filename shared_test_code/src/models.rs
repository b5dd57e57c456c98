use crate::{decay_data, gaussian_spectra};
use globalfit::prelude::*;
use nalgebra::DMatrix;

/// A model with one decay megacomplex named `"decay"`. The rates are the
/// parameters `k1,k2,...` and the CLPs are called `s1,s2,...`. Every given
/// dataset uses the decay. The estimated axis is `"spectral"` and the
/// calculated axis is `"time"`.
pub fn decay_model(rate_count: usize, datasets: &[&str]) -> Model {
    let parameters: Vec<String> = (1..=rate_count).map(|idx| format!("k{idx}")).collect();
    let clp_labels: Vec<String> = (1..=rate_count).map(|idx| format!("s{idx}")).collect();
    datasets
        .iter()
        .fold(
            ModelBuilder::new(&parameters)
                .estimated_axis("spectral")
                .calculated_axis("time")
                .megacomplex("decay", "decay", &parameters, &clp_labels),
            |builder, label| builder.dataset(*label, &["decay"]),
        )
        .build()
        .expect("decay model must be valid")
}

/// A synthetic measurement of decays with Gaussian decay associated spectra.
#[derive(Debug, Clone)]
pub struct DecayMeasurement {
    /// the time axis
    pub time: Vec<f64>,
    /// the spectral axis
    pub spectral: Vec<f64>,
    /// the decay associated spectra, one column per rate
    pub spectra: DMatrix<f64>,
    /// time × spectral
    pub data: DMatrix<f64>,
}

impl DecayMeasurement {
    /// Noise free data for the given rates. The spectra are Gaussians that are
    /// evenly distributed over the spectral axis.
    pub fn new(time: Vec<f64>, spectral: Vec<f64>, rates: &[f64]) -> Self {
        let (first, last) = (spectral[0], spectral[spectral.len() - 1]);
        let spacing = (last - first) / (rates.len() + 1) as f64;
        let centers: Vec<f64> = (1..=rates.len())
            .map(|idx| first + idx as f64 * spacing)
            .collect();
        let spectra = gaussian_spectra(&spectral, &centers, 1.5 * spacing);
        let data = decay_data(&time, rates, &spectra);
        Self {
            time,
            spectral,
            spectra,
            data,
        }
    }

    /// the measurement as a dataset with time rows
    pub fn dataset(&self, label: &str) -> Dataset {
        Dataset::new(
            label,
            Axis::new("time", self.time.clone()),
            Axis::new("spectral", self.spectral.clone()),
            self.data.clone(),
        )
        .expect("synthetic dataset must be valid")
    }
}
