use crate::dataset::PreparedDataset;
use crate::model::{ClpMatrix, DatasetModel, MegacomplexError, Model};
use nalgebra::{DMatrix, DVector};
use thiserror::Error as ThisError;


/// Errors that abort an evaluation of the objective. All of them are fatal for
/// the fit.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum EvaluationError {
    /// a megacomplex failed to calculate its matrix
    #[error(
        "Megacomplex '{}' failed for dataset '{}': {}",
        megacomplex,
        dataset,
        source
    )]
    Megacomplex {
        /// the dataset label
        dataset: String,
        /// the megacomplex label
        megacomplex: String,
        /// the error reported by the megacomplex
        #[source]
        source: MegacomplexError,
    },

    /// a megacomplex returned a different number of labels than matrix columns
    #[error(
        "Megacomplex '{}' of dataset '{}' returned {} CLP labels for a matrix with {} columns.",
        megacomplex,
        dataset,
        labels,
        columns
    )]
    ClpLabelCountMismatch {
        /// the dataset label
        dataset: String,
        /// the megacomplex label
        megacomplex: String,
        /// number of labels
        labels: usize,
        /// number of matrix columns
        columns: usize,
    },

    /// a megacomplex returned a matrix whose rows do not match the calculated axis
    #[error(
        "Megacomplex '{}' of dataset '{}' returned a matrix with {} rows, but the calculated axis has {} points.",
        megacomplex,
        dataset,
        rows,
        expected
    )]
    RowCountMismatch {
        /// the dataset label
        dataset: String,
        /// the megacomplex label
        megacomplex: String,
        /// number of matrix rows
        rows: usize,
        /// length of the calculated axis
        expected: usize,
    },

    /// a megacomplex returned a CLP label that it did not return during setup
    #[error(
        "CLP label '{}' of dataset '{}' was not present when the fit was set up.",
        label,
        dataset
    )]
    ClpLabelsChanged {
        /// the dataset label
        dataset: String,
        /// the new label
        label: String,
    },

    /// the weighted design matrix of a group contains values that are NaN or infinite
    #[error("The design matrix of group {} contains non-finite values.", group)]
    NonFiniteMatrix {
        /// the index of the group
        group: usize,
    },

    /// the additional residual of the model changed its length between evaluations
    #[error(
        "The additional residual has length {}, but had length {} when the fit was set up.",
        actual,
        expected
    )]
    AdditionalResidualLengthChanged {
        /// length at setup
        expected: usize,
        /// length now
        actual: usize,
    },
}

/// calculate and check the matrices of all megacomplexes of a dataset model
fn megacomplex_matrices(
    model: &Model,
    dataset_model: &DatasetModel,
    dataset: &PreparedDataset,
    parameters: &DVector<f64>,
    global_index: usize,
) -> Result<Vec<ClpMatrix>, EvaluationError> {
    model
        .megacomplexes_of(dataset_model)
        .map(|entry| {
            let clp_matrix = entry
                .megacomplex
                .calculate_matrix(
                    parameters,
                    &dataset.calculated_axis,
                    &dataset.estimated_axis,
                    global_index,
                )
                .map_err(|source| EvaluationError::Megacomplex {
                    dataset: dataset.label.clone(),
                    megacomplex: entry.label.clone(),
                    source,
                })?;
            if clp_matrix.clp_labels.len() != clp_matrix.matrix.ncols() {
                return Err(EvaluationError::ClpLabelCountMismatch {
                    dataset: dataset.label.clone(),
                    megacomplex: entry.label.clone(),
                    labels: clp_matrix.clp_labels.len(),
                    columns: clp_matrix.matrix.ncols(),
                });
            }
            if clp_matrix.matrix.nrows() != dataset.calculated_axis.len() {
                return Err(EvaluationError::RowCountMismatch {
                    dataset: dataset.label.clone(),
                    megacomplex: entry.label.clone(),
                    rows: clp_matrix.matrix.nrows(),
                    expected: dataset.calculated_axis.len(),
                });
            }
            Ok(clp_matrix)
        })
        .collect()
}

/// Determine the CLP labels of a dataset, i.e. the union of the labels of its
/// megacomplexes in first-seen order, at the first point of the estimated axis.
pub(crate) fn discover_clp_labels(
    model: &Model,
    dataset_model: &DatasetModel,
    dataset: &PreparedDataset,
    parameters: &DVector<f64>,
) -> Result<Vec<String>, EvaluationError> {
    let matrices = megacomplex_matrices(model, dataset_model, dataset, parameters, 0)?;
    let (labels, _) = clp_label_union(matrices.iter().map(|m| m.clp_labels.as_slice()));
    Ok(labels)
}

/// Calculate the design matrix of a dataset at one index of its estimated axis.
///
/// The matrix has one row per point of the calculated axis and its columns
/// follow `clp_labels`. Columns of the megacomplexes are added into the column
/// of their label, so columns that share a label are summed.
///
/// # Errors
///
/// Fatal errors if a megacomplex fails, returns inconsistent dimensions or a
/// label that is not in `clp_labels`.
pub(crate) fn dataset_matrix(
    model: &Model,
    dataset_model: &DatasetModel,
    dataset: &PreparedDataset,
    clp_labels: &[String],
    parameters: &DVector<f64>,
    global_index: usize,
) -> Result<DMatrix<f64>, EvaluationError> {
    let mut matrix = DMatrix::zeros(dataset.calculated_axis.len(), clp_labels.len());
    for clp_matrix in megacomplex_matrices(model, dataset_model, dataset, parameters, global_index)? {
        for (label, column) in clp_matrix
            .clp_labels
            .iter()
            .zip(clp_matrix.matrix.column_iter())
        {
            let idx = clp_labels.iter().position(|l| l == label).ok_or_else(|| {
                EvaluationError::ClpLabelsChanged {
                    dataset: dataset.label.clone(),
                    label: label.clone(),
                }
            })?;
            let mut target = matrix.column_mut(idx);
            target += column;
        }
    }
    Ok(matrix)
}

/// The ordered union of several label lists in first-seen order. Also returns
/// for every list the positions of its labels inside the union.
pub fn clp_label_union<'a, I>(label_lists: I) -> (Vec<String>, Vec<Vec<usize>>)
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut union: Vec<String> = Vec::new();
    let column_maps = label_lists
        .into_iter()
        .map(|labels| {
            labels
                .iter()
                .map(|label| match union.iter().position(|l| l == label) {
                    Some(idx) => idx,
                    None => {
                        union.push(label.clone());
                        union.len() - 1
                    }
                })
                .collect()
        })
        .collect();
    (union, column_maps)
}

/// Stack the matrices of the items of a group on top of each other. The columns
/// of each matrix are scattered into the union columns given by its column map,
/// all other entries of its rows are zero.
///
/// # Panics
///
/// If a column map does not have one entry per column of its matrix or points
/// outside of `ncols`.
pub fn assemble_group_matrix<'a, I>(items: I, ncols: usize) -> DMatrix<f64>
where
    I: IntoIterator<Item = (&'a DMatrix<f64>, &'a [usize])> + Clone,
{
    let nrows = items.clone().into_iter().map(|(m, _)| m.nrows()).sum();
    let mut group_matrix = DMatrix::zeros(nrows, ncols);
    let mut row_offset = 0;
    for (matrix, column_map) in items {
        assert_eq!(
            matrix.ncols(),
            column_map.len(),
            "column map must have one entry per matrix column"
        );
        for (column, &target) in matrix.column_iter().zip(column_map.iter()) {
            group_matrix
                .view_mut((row_offset, target), (matrix.nrows(), 1))
                .copy_from(&column);
        }
        row_offset += matrix.nrows();
    }
    group_matrix
}
