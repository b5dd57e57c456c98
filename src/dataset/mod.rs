use nalgebra::{DMatrix, DVector};
use thiserror::Error as ThisError;


/// A named coordinate axis of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    /// the name of the dimension, e.g. `"time"` or `"spectral"`
    pub name: String,
    /// the coordinate values along the dimension
    pub values: DVector<f64>,
}

impl Axis {
    /// create a named axis from anything that can be turned into a vector of values
    pub fn new(name: impl Into<String>, values: impl Into<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            values: DVector::from_vec(values.into()),
        }
    }
}

/// Errors concerning a single dataset. During setup all datasets are checked
/// and one error is reported per offending dataset.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum DatasetError {
    /// the shape of the value matrix does not match the axis lengths
    #[error(
        "Data of dataset '{}' has shape {:?}, but the axes '{}' and '{}' require shape {:?}.",
        dataset,
        actual,
        rows,
        columns,
        expected
    )]
    ShapeMismatch {
        /// the dataset label
        dataset: String,
        /// name of the row axis
        rows: String,
        /// name of the column axis
        columns: String,
        /// the shape given by the axes
        expected: (usize, usize),
        /// the shape of the value matrix
        actual: (usize, usize),
    },

    /// an axis without coordinates
    #[error("Axis '{}' of dataset '{}' is empty.", axis, dataset)]
    EmptyAxis {
        /// the dataset label
        dataset: String,
        /// name of the empty axis
        axis: String,
    },

    /// both axes carry the same name
    #[error("Dataset '{}' uses the axis name '{}' twice.", dataset, axis)]
    DuplicateAxisName {
        /// the dataset label
        dataset: String,
        /// the duplicate name
        axis: String,
    },

    /// the weight matrix must have the same shape as the value matrix
    #[error(
        "Weights of dataset '{}' have shape {:?}, but the data has shape {:?}.",
        dataset,
        actual,
        expected
    )]
    WeightShapeMismatch {
        /// the dataset label
        dataset: String,
        /// shape of the value matrix
        expected: (usize, usize),
        /// shape of the weight matrix
        actual: (usize, usize),
    },

    /// weights must be finite and strictly positive, because residuals are
    /// unweighted by division after the fit
    #[error(
        "Weight {} at ({}, {}) of dataset '{}' is not finite and positive.",
        value,
        row,
        column,
        dataset
    )]
    InvalidWeight {
        /// the dataset label
        dataset: String,
        /// row of the offending element
        row: usize,
        /// column of the offending element
        column: usize,
        /// the offending value
        value: f64,
    },

    /// the dataset does not have one or both of the axes the model requires
    #[error(
        "Missing coordinates for dimension(s) {:?} in data for dataset '{}'.",
        missing,
        dataset
    )]
    MissingAxis {
        /// the dataset label
        dataset: String,
        /// the names of the missing dimensions
        missing: Vec<String>,
    },

    /// two datasets with the same label were given
    #[error("Dataset label '{}' was given more than once.", dataset)]
    DuplicateLabel {
        /// the dataset label
        dataset: String,
    },

    /// data was given for a dataset that the model does not describe
    #[error("No dataset model for dataset '{}'.", dataset)]
    NoDatasetModel {
        /// the dataset label
        dataset: String,
    },

    /// the model describes a dataset for which no data was given
    #[error("No data given for dataset '{}' of the model.", dataset)]
    MissingData {
        /// the dataset label
        dataset: String,
    },
}

/// A measured two dimensional dataset with two named axes.
///
/// The rows of the value matrix are indexed by the first axis and the columns
/// by the second axis. Which of the axes is the *estimated* (global) axis and
/// which is the *calculated* (model) axis is decided by the model; the dataset
/// is transposed during setup if necessary.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    label: String,
    rows: Axis,
    columns: Axis,
    data: DMatrix<f64>,
    weight: Option<DMatrix<f64>>,
}

impl Dataset {
    /// Create a new dataset.
    ///
    /// # Errors
    ///
    /// If the shape of `data` is not `(rows.values.len(), columns.values.len())`,
    /// if an axis is empty or if both axes have the same name.
    pub fn new(
        label: impl Into<String>,
        rows: Axis,
        columns: Axis,
        data: DMatrix<f64>,
    ) -> Result<Self, DatasetError> {
        let label = label.into();
        if rows.name == columns.name {
            return Err(DatasetError::DuplicateAxisName {
                dataset: label,
                axis: rows.name,
            });
        }
        for axis in [&rows, &columns] {
            if axis.values.is_empty() {
                return Err(DatasetError::EmptyAxis {
                    dataset: label,
                    axis: axis.name.clone(),
                });
            }
        }
        let expected = (rows.values.len(), columns.values.len());
        if data.shape() != expected {
            return Err(DatasetError::ShapeMismatch {
                dataset: label,
                rows: rows.name,
                columns: columns.name,
                expected,
                actual: data.shape(),
            });
        }
        Ok(Self {
            label,
            rows,
            columns,
            data,
            weight: None,
        })
    }

    /// Attach a weight matrix of the same shape as the data. The weighted
    /// residual is `weight * (data - model)`, so statistically meaningful weights
    /// are the inverse standard deviations of the data points.
    pub fn with_weight(self, weight: DMatrix<f64>) -> Result<Self, DatasetError> {
        if weight.shape() != self.data.shape() {
            return Err(DatasetError::WeightShapeMismatch {
                dataset: self.label,
                expected: self.data.shape(),
                actual: weight.shape(),
            });
        }
        Ok(Self {
            weight: Some(weight),
            ..self
        })
    }

    /// the label of the dataset
    pub fn label(&self) -> &str {
        &self.label
    }

    /// the axis with the given name, if the dataset has it
    pub fn axis(&self, name: &str) -> Option<&Axis> {
        [&self.rows, &self.columns]
            .into_iter()
            .find(|axis| axis.name == name)
    }

    /// the measured values
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// the weights, if any
    pub fn weight(&self) -> Option<&DMatrix<f64>> {
        self.weight.as_ref()
    }
}

/// A dataset whose axes have been resolved against the model. The data is
/// indexed `(estimated, calculated)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PreparedDataset {
    pub(crate) label: String,
    pub(crate) estimated_axis: DVector<f64>,
    pub(crate) calculated_axis: DVector<f64>,
    pub(crate) data: DMatrix<f64>,
    pub(crate) weight: Option<DMatrix<f64>>,
    /// `data ∘ weight`, derived once
    pub(crate) weighted_data: Option<DMatrix<f64>>,
}

impl PreparedDataset {
    /// Resolve the named axes of the dataset into the estimated and calculated axis.
    pub(crate) fn prepare(
        dataset: Dataset,
        estimated_axis: &str,
        calculated_axis: &str,
    ) -> Result<Self, DatasetError> {
        let missing: Vec<String> = [estimated_axis, calculated_axis]
            .into_iter()
            .filter(|name| dataset.axis(name).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(DatasetError::MissingAxis {
                dataset: dataset.label,
                missing,
            });
        }

        let Dataset {
            label,
            rows,
            columns,
            data,
            weight,
        } = dataset;

        if let Some(weight) = weight.as_ref() {
            let invalid = (0..weight.nrows())
                .flat_map(|row| (0..weight.ncols()).map(move |column| (row, column)))
                .find(|&idx| !weight[idx].is_finite() || weight[idx] <= 0.);
            if let Some((row, column)) = invalid {
                return Err(DatasetError::InvalidWeight {
                    dataset: label,
                    row,
                    column,
                    value: weight[(row, column)],
                });
            }
        }

        let (estimated, calculated, data, weight) = if rows.name == estimated_axis {
            (rows, columns, data, weight)
        } else {
            (
                columns,
                rows,
                data.transpose(),
                weight.map(|w| w.transpose()),
            )
        };
        let weighted_data = weight.as_ref().map(|w| data.component_mul(w));

        Ok(Self {
            label,
            estimated_axis: estimated.values,
            calculated_axis: calculated.values,
            data,
            weight,
            weighted_data,
        })
    }

    /// the data that enters the fit, i.e. the weighted data if the dataset
    /// carries weights and the plain data otherwise
    pub(crate) fn fit_data(&self) -> &DMatrix<f64> {
        self.weighted_data.as_ref().unwrap_or(&self.data)
    }
}
