//! Builtin megacomplexes that are known to the default [`MegacomplexRegistry`](super::MegacomplexRegistry).
use super::{ClpMatrix, Megacomplex, MegacomplexError, MegacomplexSpec, ModelBuildError};
use crate::fit::DatasetResult;
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

/// read the parameter at `index` from the parameter vector
fn parameter(parameters: &DVector<f64>, index: usize) -> Result<f64, MegacomplexError> {
    parameters
        .get(index)
        .copied()
        .ok_or(MegacomplexError::ParameterOutOfBounds {
            index,
            len: parameters.len(),
        })
}

/// A sum of exponential decays. Each label is one decay with its own rate
/// parameter and the column for rate `k` is `exp(-k*x)` on the calculated axis.
///
/// The megacomplex takes exactly one parameter per label, in label order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecayMegacomplex {
    labels: Vec<String>,
    rates: Vec<usize>,
}

impl DecayMegacomplex {
    /// the type tag under which this megacomplex is registered
    pub const TAG: &'static str = "decay";

    /// Create a decay megacomplex. `rates` are indices into the parameter vector
    /// of the model, one per label.
    pub fn new(labels: Vec<String>, rates: Vec<usize>) -> Result<Self, String> {
        if labels.is_empty() {
            return Err("at least one decay label is required".to_string());
        }
        if labels.len() != rates.len() {
            return Err(format!(
                "{} labels require {} rate parameters, but {} were given",
                labels.len(),
                labels.len(),
                rates.len()
            ));
        }
        Ok(Self { labels, rates })
    }

    pub(crate) fn from_spec(spec: &MegacomplexSpec) -> Result<Box<dyn Megacomplex>, ModelBuildError> {
        Self::new(spec.labels.clone(), spec.parameters.clone())
            .map(|decay| Box::new(decay) as Box<dyn Megacomplex>)
            .map_err(|reason| ModelBuildError::InvalidMegacomplexSpec {
                label: spec.label.clone(),
                reason,
            })
    }
}

impl Megacomplex for DecayMegacomplex {
    fn calculate_matrix(
        &self,
        parameters: &DVector<f64>,
        calculated_axis: &DVector<f64>,
        _estimated_axis: &DVector<f64>,
        _global_index: usize,
    ) -> Result<ClpMatrix, MegacomplexError> {
        let mut matrix = DMatrix::zeros(calculated_axis.len(), self.labels.len());
        for (mut column, &rate_idx) in matrix.column_iter_mut().zip(self.rates.iter()) {
            let rate = parameter(parameters, rate_idx)?;
            column
                .iter_mut()
                .zip(calculated_axis.iter())
                .for_each(|(value, &x)| *value = (-rate * x).exp());
        }
        Ok(ClpMatrix {
            clp_labels: self.labels.clone(),
            matrix,
        })
    }
}

/// A sum of damped oscillations. Each label is one oscillation with frequency
/// `f` and damping rate `r` that contributes the two columns
/// `cos(2πf*x)*exp(-r*x)` and `sin(2πf*x)*exp(-r*x)`, labeled `{label}_cos`
/// and `{label}_sin`.
///
/// The megacomplex takes one frequency per label followed by one rate per label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DampedOscillationMegacomplex {
    labels: Vec<String>,
    frequencies: Vec<usize>,
    rates: Vec<usize>,
}

impl DampedOscillationMegacomplex {
    /// the type tag under which this megacomplex is registered
    pub const TAG: &'static str = "damped-oscillation";

    /// Create a damped oscillation megacomplex. `frequencies` and `rates` are
    /// indices into the parameter vector of the model, one of each per label.
    pub fn new(
        labels: Vec<String>,
        frequencies: Vec<usize>,
        rates: Vec<usize>,
    ) -> Result<Self, String> {
        if labels.is_empty() {
            return Err("at least one oscillation label is required".to_string());
        }
        if labels.len() != frequencies.len() || labels.len() != rates.len() {
            return Err(format!(
                "size of labels ({}), frequencies ({}) and rates ({}) does not match",
                labels.len(),
                frequencies.len(),
                rates.len()
            ));
        }
        Ok(Self {
            labels,
            frequencies,
            rates,
        })
    }

    pub(crate) fn from_spec(spec: &MegacomplexSpec) -> Result<Box<dyn Megacomplex>, ModelBuildError> {
        let count = spec.labels.len();
        if spec.parameters.len() != 2 * count {
            return Err(ModelBuildError::InvalidMegacomplexSpec {
                label: spec.label.clone(),
                reason: format!(
                    "{} oscillations require {} parameters (frequencies, then rates), but {} were given",
                    count,
                    2 * count,
                    spec.parameters.len()
                ),
            });
        }
        let (frequencies, rates) = spec.parameters.split_at(count);
        Self::new(spec.labels.clone(), frequencies.to_vec(), rates.to_vec())
            .map(|osc| Box::new(osc) as Box<dyn Megacomplex>)
            .map_err(|reason| ModelBuildError::InvalidMegacomplexSpec {
                label: spec.label.clone(),
                reason,
            })
    }

    /// the CLP labels of the sine and cosine columns of one oscillation
    fn clp_labels(label: &str) -> [String; 2] {
        [format!("{label}_cos"), format!("{label}_sin")]
    }
}

impl Megacomplex for DampedOscillationMegacomplex {
    fn calculate_matrix(
        &self,
        parameters: &DVector<f64>,
        calculated_axis: &DVector<f64>,
        _estimated_axis: &DVector<f64>,
        _global_index: usize,
    ) -> Result<ClpMatrix, MegacomplexError> {
        let mut matrix = DMatrix::zeros(calculated_axis.len(), 2 * self.labels.len());
        let mut clp_labels = Vec::with_capacity(2 * self.labels.len());
        for (idx, label) in self.labels.iter().enumerate() {
            let omega = 2. * PI * parameter(parameters, self.frequencies[idx])?;
            let rate = parameter(parameters, self.rates[idx])?;
            for (row, &x) in calculated_axis.iter().enumerate() {
                let damping = (-rate * x).exp();
                matrix[(row, 2 * idx)] = (omega * x).cos() * damping;
                matrix[(row, 2 * idx + 1)] = (omega * x).sin() * damping;
            }
            clp_labels.extend(Self::clp_labels(label));
        }
        Ok(ClpMatrix { clp_labels, matrix })
    }

    /// Adds the amplitude `sqrt(sin²+cos²)` and the phase `atan2(sin, cos)` of
    /// every oscillation as `{label}_associated_spectra` and `{label}_phase`.
    /// Both matrices have one row per point on the estimated axis and one column
    /// per oscillation.
    fn finalize_data(
        &self,
        megacomplex_label: &str,
        _parameters: &DVector<f64>,
        result: &mut DatasetResult,
    ) {
        let rows = result.clp.nrows();
        let mut amplitudes = DMatrix::zeros(rows, self.labels.len());
        let mut phases = DMatrix::zeros(rows, self.labels.len());
        for (idx, label) in self.labels.iter().enumerate() {
            let [cos_label, sin_label] = Self::clp_labels(label);
            let (Some(cos), Some(sin)) = (result.clp_column(&cos_label), result.clp_column(&sin_label))
            else {
                continue;
            };
            let mut phase: Vec<f64> = sin.iter().zip(cos.iter()).map(|(s, c)| s.atan2(*c)).collect();
            unwrap_phase(&mut phase);
            for row in 0..rows {
                amplitudes[(row, idx)] = sin[row].hypot(cos[row]);
                phases[(row, idx)] = phase[row];
            }
        }
        result.extra.insert(
            format!("{megacomplex_label}_associated_spectra"),
            amplitudes,
        );
        result
            .extra
            .insert(format!("{megacomplex_label}_phase"), phases);
    }
}

/// Remove the jumps of more than `π` between consecutive phases by adding
/// multiples of `2π`, so the phase is continuous along the estimated axis.
fn unwrap_phase(phases: &mut [f64]) {
    let mut correction = 0.;
    let mut previous = match phases.first() {
        Some(&first) => first,
        None => return,
    };
    for phase in phases.iter_mut().skip(1) {
        let jump = *phase - previous;
        previous = *phase;
        if jump.abs() >= PI {
            let mut wrapped = (jump + PI).rem_euclid(2. * PI) - PI;
            // a jump of exactly π keeps its sign
            if wrapped == -PI && jump > 0. {
                wrapped = PI;
            }
            correction += wrapped - jump;
        }
        *phase += correction;
    }
}
