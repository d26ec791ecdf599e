//! Stratified k-fold assignment and train/test splitting.

use crate::{DataError, FeatureTable, Label, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Default number of folds.
pub const DEFAULT_FOLDS: usize = 5;

/// Fold id for every row of a table, in `1..=k`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FoldAssignment {
    k: usize,
    ids: Vec<usize>,
}

impl FoldAssignment {
    /// Number of folds.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Fold id per row.
    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    /// Number of rows covered.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no rows are covered.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Row indices assigned to `fold`.
    pub fn rows_in(&self, fold: usize) -> Vec<usize> {
        self.ids
            .iter()
            .enumerate()
            .filter(|(_, &id)| id == fold)
            .map(|(row, _)| row)
            .collect()
    }

    /// Rows per fold, index 0 holding fold 1.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &id in &self.ids {
            sizes[id - 1] += 1;
        }
        sizes
    }
}

/// A table split into training and held-out rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    /// Rows from every fold except the test fold.
    pub train: FeatureTable,
    /// Rows from the test fold.
    pub test: FeatureTable,
    /// The held-out fold id.
    pub test_fold: usize,
}

/// Assign each row of `table` to one of `k` folds, stratified by label.
///
/// Within each class the ids are `1, 2, .., k, 1, 2, ..` truncated to the
/// class size and then shuffled, so fold sizes within a class differ by at
/// most one. The background cycle continues where the presence cycle
/// stopped, so total fold sizes also differ by at most one.
pub fn stratified_folds(table: &FeatureTable, k: usize, seed: u64) -> Result<FoldAssignment> {
    if k < 2 {
        return Err(DataError::InvalidFoldCount(k));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut ids = vec![0; table.len()];
    let mut offset = 0;

    for label in [Label::Presence, Label::Background] {
        let rows: Vec<usize> = table
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.label == label)
            .map(|(i, _)| i)
            .collect();

        if !rows.is_empty() && rows.len() < k {
            tracing::warn!(
                ?label,
                rows = rows.len(),
                k,
                "Class has fewer rows than folds, some folds will lack it"
            );
        }

        let mut class_ids: Vec<usize> = (0..rows.len()).map(|i| (offset + i) % k + 1).collect();
        offset += rows.len();
        class_ids.shuffle(&mut rng);
        for (row, id) in rows.into_iter().zip(class_ids) {
            ids[row] = id;
        }
    }

    tracing::debug!(k, rows = ids.len(), seed, "Assigned folds");
    Ok(FoldAssignment { k, ids })
}

/// Split `table` into the rows of `test_fold` and the rest.
pub fn split(
    table: &FeatureTable,
    folds: &FoldAssignment,
    test_fold: usize,
) -> Result<TrainTestSplit> {
    if test_fold == 0 || test_fold > folds.k {
        return Err(DataError::InvalidTestFold {
            fold: test_fold,
            k: folds.k,
        });
    }
    if folds.len() != table.len() {
        return Err(DataError::FoldLengthMismatch {
            rows: table.len(),
            folds: folds.len(),
        });
    }

    let (test_rows, train_rows): (Vec<usize>, Vec<usize>) =
        (0..table.len()).partition(|&row| folds.ids[row] == test_fold);

    let split = TrainTestSplit {
        train: table.subset(&train_rows),
        test: table.subset(&test_rows),
        test_fold,
    };
    tracing::info!(
        test_fold,
        train = split.train.len(),
        test = split.test.len(),
        "Split feature table"
    );
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeatureRow;
    use sdm_raster::Coordinate;

    fn table(presence: usize, background: usize) -> FeatureTable {
        let rows = (0..presence + background)
            .map(|i| FeatureRow {
                label: if i < presence {
                    Label::Presence
                } else {
                    Label::Background
                },
                coordinate: Coordinate::new(0.0, i as f64),
                values: vec![i as f64],
            })
            .collect();
        FeatureTable::new(vec!["x".into()], rows).unwrap()
    }

    fn class_sizes(table: &FeatureTable, folds: &FoldAssignment, label: Label) -> Vec<usize> {
        let mut sizes = vec![0; folds.k()];
        for (row, &id) in table.rows().iter().zip(folds.ids()) {
            if row.label == label {
                sizes[id - 1] += 1;
            }
        }
        sizes
    }

    #[test]
    fn test_every_row_gets_a_fold() {
        let table = table(13, 47);
        let folds = stratified_folds(&table, 5, 42).unwrap();
        assert_eq!(folds.len(), 60);
        assert!(folds.ids().iter().all(|&id| (1..=5).contains(&id)));
        assert_eq!(folds.sizes().iter().sum::<usize>(), 60);
    }

    #[test]
    fn test_class_balance() {
        let table = table(13, 47);
        let folds = stratified_folds(&table, 5, 42).unwrap();
        for label in [Label::Presence, Label::Background] {
            let sizes = class_sizes(&table, &folds, label);
            let min = sizes.iter().min().unwrap();
            let max = sizes.iter().max().unwrap();
            assert!(max - min <= 1, "{:?} fold sizes {:?}", label, sizes);
        }
    }

    #[test]
    fn test_uneven_classes_give_balanced_totals() {
        // 13 presence fill folds 1-3 with three rows and folds 4-5 with two;
        // the background cycle picks up at fold 4.
        let table = table(13, 47);
        let folds = stratified_folds(&table, 5, 42).unwrap();
        assert_eq!(folds.sizes(), vec![12; 5]);
        assert_eq!(
            class_sizes(&table, &folds, Label::Presence),
            vec![3, 3, 3, 2, 2]
        );
        assert_eq!(
            class_sizes(&table, &folds, Label::Background),
            vec![9, 9, 9, 10, 10]
        );
    }

    #[test]
    fn test_even_classes_give_equal_folds() {
        let table = table(10, 50);
        let folds = stratified_folds(&table, 5, 42).unwrap();
        assert_eq!(folds.sizes(), vec![12; 5]);
        assert_eq!(class_sizes(&table, &folds, Label::Presence), vec![2; 5]);
    }

    #[test]
    fn test_deterministic() {
        let table = table(10, 50);
        let a = stratified_folds(&table, 5, 7).unwrap();
        let b = stratified_folds(&table, 5, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_fold_count() {
        let table = table(4, 4);
        assert!(matches!(
            stratified_folds(&table, 1, 0),
            Err(DataError::InvalidFoldCount(1))
        ));
    }

    #[test]
    fn test_split() {
        let table = table(10, 50);
        let folds = stratified_folds(&table, 5, 42).unwrap();
        let split = split(&table, &folds, 1).unwrap();
        assert_eq!(split.test.len(), 12);
        assert_eq!(split.train.len(), 48);
        assert_eq!(split.test.count(Label::Presence), 2);
        assert_eq!(split.train.count(Label::Presence), 8);
        assert_eq!(folds.rows_in(1).len(), 12);
    }

    #[test]
    fn test_split_invalid_fold() {
        let table = table(10, 50);
        let folds = stratified_folds(&table, 5, 42).unwrap();
        assert!(matches!(
            split(&table, &folds, 0),
            Err(DataError::InvalidTestFold { fold: 0, k: 5 })
        ));
        assert!(matches!(
            split(&table, &folds, 6),
            Err(DataError::InvalidTestFold { fold: 6, k: 5 })
        ));
        assert!(matches!(
            split(&table.subset(&[0, 1]), &folds, 1),
            Err(DataError::FoldLengthMismatch { rows: 2, folds: 60 })
        ));
    }
}
