use crate::dataset::PreparedDataset;
use crate::grouping::Group;
use crate::matrix::clp_label_union;
use crate::util::Weights;
use nalgebra::DVector;

/// Where the rows of one item live inside its group.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ItemLayout {
    /// index of the dataset
    pub(crate) dataset: usize,
    /// index into the estimated axis of the dataset
    pub(crate) index: usize,
    /// first row of the item in the group matrix and data vector
    pub(crate) row_offset: usize,
    /// number of rows, i.e. the length of the calculated axis of the dataset
    pub(crate) nrows: usize,
    /// position of every CLP label of the dataset in the labels of the group
    pub(crate) column_map: Vec<usize>,
}

/// Everything about a group that does not depend on the nonlinear parameters.
/// This is computed once during setup.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GroupLayout {
    /// the union of the CLP labels of all items in first-seen order
    pub(crate) clp_labels: Vec<String>,
    pub(crate) items: Vec<ItemLayout>,
    /// the concatenated (weighted) data rows of the items
    pub(crate) data: DVector<f64>,
    /// the concatenated weight rows. Unit if none of the datasets is weighted.
    pub(crate) weights: Weights,
}

impl GroupLayout {
    /// Create the layout of a group.
    ///
    /// `dataset_clp_labels` holds the CLP labels per dataset. The dataset
    /// positions of the group items index into it and into `datasets`.
    pub(crate) fn new(
        group: &Group,
        datasets: &[PreparedDataset],
        dataset_clp_labels: &[Vec<String>],
    ) -> Self {
        let (clp_labels, column_maps) = clp_label_union(
            group
                .items()
                .iter()
                .map(|item| dataset_clp_labels[item.dataset].as_slice()),
        );

        let mut items = Vec::with_capacity(group.items().len());
        let mut data = Vec::new();
        let mut weights = Vec::new();
        let weighted = group
            .items()
            .iter()
            .any(|item| datasets[item.dataset].weight.is_some());

        for (item, column_map) in group.items().iter().zip(column_maps) {
            let dataset = &datasets[item.dataset];
            let nrows = dataset.calculated_axis.len();
            items.push(ItemLayout {
                dataset: item.dataset,
                index: item.index,
                row_offset: data.len(),
                nrows,
                column_map,
            });
            data.extend(dataset.fit_data().row(item.index).iter());
            if weighted {
                match dataset.weight.as_ref() {
                    Some(weight) => weights.extend(weight.row(item.index).iter()),
                    None => weights.extend(std::iter::repeat(1.).take(nrows)),
                }
            }
        }

        let weights = if weighted {
            Weights::diagonal(DVector::from_vec(weights))
        } else {
            Weights::Unit
        };
        debug_assert!(weights.is_size_correct_for_data_length(data.len()));
        Self {
            clp_labels,
            items,
            data: DVector::from_vec(data),
            weights,
        }
    }

    /// the number of rows of the group matrix
    pub(crate) fn nrows(&self) -> usize {
        self.data.len()
    }
}
