//! Data models for SOVA
//!
//! Defines the persisted records: features, subspaces and the batch
//! buffer used to move objects into the store.

use serde::{Deserialize, Serialize};

/// Maximum stored length of a feature name, in characters
pub const MAX_FEATURE_NAME_LEN: usize = 255;

/// A column of the dataset, natural or synthetic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    /// 1-based id, also the name of the feature's object column
    pub id: i64,
    /// Display name
    pub name: String,
    /// True for the synthetic per-subspace score columns
    pub is_outlier: bool,
    /// True for derived, non-editable columns
    pub is_virtual: bool,
    /// Observed minimum (NaN when no value has been observed)
    pub min_value: f64,
    /// Observed maximum (NaN when no value has been observed)
    pub max_value: f64,
}

/// Truncate a feature name to [`MAX_FEATURE_NAME_LEN`] characters
pub fn bounded_name(name: &str) -> String {
    match name.char_indices().nth(MAX_FEATURE_NAME_LEN) {
        Some((cut, _)) => name[..cut].to_string(),
        None => name.to_string(),
    }
}

/// A feature subset declared by an outlier detection algorithm
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subspace {
    /// Sequential id, the 1-based header line the subspace was declared on
    pub id: i64,
    /// Feature ids; the first entry is the subspace's own score feature
    pub feature_refs: Vec<i64>,
    /// Display name
    pub name: String,
}

impl Subspace {
    /// Id of the synthetic outlier-score feature
    pub fn outlier_feature(&self) -> Option<i64> {
        self.feature_refs.first().copied()
    }

    /// Ids of the natural features spanning this subspace
    pub fn natural_features(&self) -> &[i64] {
        self.feature_refs.get(1..).unwrap_or(&[])
    }

    /// Number of natural features spanning this subspace
    pub fn dimensionality(&self) -> usize {
        self.natural_features().len()
    }
}

/// A fixed-capacity buffer of object rows
///
/// Values are stored row-major in one flat vector that is cleared and
/// refilled between flushes.
#[derive(Debug, Clone)]
pub struct ObjectBatch {
    width: usize,
    capacity: usize,
    values: Vec<f64>,
}

impl ObjectBatch {
    /// Create a buffer for rows of `width` values, holding `capacity` rows
    pub fn new(width: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            width,
            capacity,
            values: Vec::with_capacity(width * capacity),
        }
    }

    /// Values per row
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of buffered rows
    pub fn len(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Append one row; extra values are dropped and missing ones become NaN
    pub fn push_row(&mut self, row: &[f64]) {
        let take = row.len().min(self.width);
        self.values.extend_from_slice(&row[..take]);
        self.values
            .extend(std::iter::repeat(f64::NAN).take(self.width - take));
    }

    /// Iterate over the buffered rows
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.width.max(1))
    }

    /// Empty the buffer, keeping its allocation
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_name() {
        assert_eq!(bounded_name("f0"), "f0");

        let long = "é".repeat(MAX_FEATURE_NAME_LEN + 10);
        let bounded = bounded_name(&long);
        assert_eq!(bounded.chars().count(), MAX_FEATURE_NAME_LEN);
    }

    #[test]
    fn test_subspace_accessors() {
        let subspace = Subspace {
            id: 1,
            feature_refs: vec![5, 1, 3],
            name: "f0, f2".to_string(),
        };

        assert_eq!(subspace.outlier_feature(), Some(5));
        assert_eq!(subspace.natural_features(), &[1, 3]);
        assert_eq!(subspace.dimensionality(), 2);
    }

    #[test]
    fn test_batch_fill_and_clear() {
        let mut batch = ObjectBatch::new(2, 2);
        assert!(batch.is_empty());

        batch.push_row(&[1.0, 2.0]);
        assert!(!batch.is_full());
        batch.push_row(&[3.0]);
        assert!(batch.is_full());

        let rows: Vec<&[f64]> = batch.rows().collect();
        assert_eq!(rows[0], &[1.0, 2.0]);
        assert_eq!(rows[1][0], 3.0);
        assert!(rows[1][1].is_nan());

        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn test_batch_truncates_wide_rows() {
        let mut batch = ObjectBatch::new(2, 4);
        batch.push_row(&[1.0, 2.0, 3.0]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.rows().next().unwrap(), &[1.0, 2.0]);
    }
}
