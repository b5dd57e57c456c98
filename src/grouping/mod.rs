use std::fmt;
use thiserror::Error as ThisError;


/// Errors that occur while grouping the estimated axes of the datasets.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum GroupingError {
    /// the tolerance must be finite and non-negative
    #[error("Group tolerance must be finite and non-negative, but is {0}.")]
    InvalidTolerance(f64),

    /// a coordinate of an estimated axis is NaN or infinite
    #[error(
        "Coordinate {} at index {} of dataset '{}' is not finite.",
        value,
        index,
        dataset
    )]
    NonFiniteCoordinate {
        /// the dataset label
        dataset: String,
        /// the index into the estimated axis
        index: usize,
        /// the offending value
        value: f64,
    },
}

/// The identity of a group: the labels of the datasets that contribute to it,
/// in the order in which they joined.
///
/// The key is compared as a list, so the datasets `"dataset1"` and `"dataset2"`
/// never collide with a dataset called `"dataset1dataset2"`. The [`Display`](fmt::Display)
/// implementation renders the plain concatenation of the labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(Vec<String>);

impl GroupKey {
    /// the dataset labels that make up the key
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// whether the dataset with the given label contributes to the group
    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }
}

impl<S: Into<String>> FromIterator<S> for GroupKey {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|label| f.write_str(label))
    }
}

/// One entry of a group: a point on the estimated axis of one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupItem {
    /// index into the estimated axis of the dataset
    pub index: usize,
    /// position of the dataset in the order in which the datasets were grouped
    pub dataset: usize,
}

/// A cluster of estimated-axis coordinates that are considered equal within
/// the group tolerance. Each group is one linear subproblem.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    key: GroupKey,
    anchor: f64,
    items: Vec<GroupItem>,
}

impl Group {
    /// the key of the group
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// the coordinate that opened the group
    pub fn anchor(&self) -> f64 {
        self.anchor
    }

    /// the items in dataset processing order
    pub fn items(&self) -> &[GroupItem] {
        &self.items
    }
}

/// The result of grouping the estimated axes of a collection of datasets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grouping {
    dataset_labels: Vec<String>,
    groups: Vec<Group>,
}

impl Grouping {
    /// the groups in order of creation
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// the number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// whether there are no groups at all
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// the labels of the grouped datasets. The `dataset` field of a [`GroupItem`]
    /// indexes into this slice.
    pub fn dataset_labels(&self) -> &[String] {
        &self.dataset_labels
    }

    /// The distinct keys of all groups in the order in which they first occur
    /// in the group sequence.
    pub fn keys(&self) -> Vec<&GroupKey> {
        let mut keys: Vec<&GroupKey> = Vec::new();
        for group in &self.groups {
            if !keys.contains(&&group.key) {
                keys.push(&group.key);
            }
        }
        keys
    }

    /// all groups carrying the given key, in order of creation
    pub fn groups_with_key<'a, 'k>(
        &'a self,
        key: &'k GroupKey,
    ) -> impl Iterator<Item = &'a Group> + 'k
    where
        'a: 'k,
    {
        self.groups.iter().filter(move |group| &group.key == key)
    }
}

/// Group the estimated axes of the given datasets.
///
/// The datasets are processed in the given order. Every coordinate joins the
/// first group (in order of creation) whose anchor is within `atol` of it. This
/// includes groups that the same dataset has joined before, so closely spaced
/// points of one dataset share their CLPs. If there is no such group, a new
/// group anchored at the coordinate is opened. Joining a group appends the
/// dataset label to the group key.
///
/// # Arguments
///
/// * `datasets`: pairs of dataset label and estimated axis coordinates
/// * `atol`: the absolute tolerance. With `atol == 0` only exactly equal
///   coordinates are grouped together.
///
/// # Errors
///
/// If the tolerance is negative or not finite, or if any coordinate is not finite.
pub fn group_datasets<'a, I>(datasets: I, atol: f64) -> Result<Grouping, GroupingError>
where
    I: IntoIterator<Item = (&'a str, &'a [f64])>,
{
    if !atol.is_finite() || atol < 0. {
        return Err(GroupingError::InvalidTolerance(atol));
    }

    let mut grouping = Grouping::default();
    for (dataset, (label, coordinates)) in datasets.into_iter().enumerate() {
        grouping.dataset_labels.push(label.to_string());
        for (index, &value) in coordinates.iter().enumerate() {
            if !value.is_finite() {
                return Err(GroupingError::NonFiniteCoordinate {
                    dataset: label.to_string(),
                    index,
                    value,
                });
            }
            let item = GroupItem { index, dataset };
            let existing = grouping
                .groups
                .iter_mut()
                .find(|group| (group.anchor - value).abs() <= atol);
            match existing {
                Some(group) => {
                    group.key.0.push(label.to_string());
                    group.items.push(item);
                }
                None => grouping.groups.push(Group {
                    key: GroupKey(vec![label.to_string()]),
                    anchor: value,
                    items: vec![item],
                }),
            }
        }
    }
    Ok(grouping)
}
