//! Train/test split generation and fold-plan construction
//!
//! One sweep cell draws a uniformly random train/test partition of the
//! usable dataset, then partitions the train side into shuffled k-folds.
//! The fold partition is re-expressed as a per-row label vector for the
//! training stage.

use crate::error::{Result, SweepError};
use rand::seq::SliceRandom;
use rand::Rng;

/// Minimum held-out rows required for a trustworthy correlation estimate.
pub const MIN_TEST_ROWS: usize = 10;

/// Number of cross-validation folds in every fold plan.
pub const N_FOLDS: usize = 10;

/// A train/test partition of dataset row positions for one sweep cell.
#[derive(Debug, Clone)]
pub struct CellSplit {
    train: Vec<usize>,
    test: Vec<usize>,
}

impl CellSplit {
    /// Draw a random partition: shuffle `0..n_rows`, take the first
    /// `n_train` positions as train and the rest as test.
    ///
    /// Fails with `ValidationError` if `n_train > n_rows` or if fewer
    /// than `min_test` rows remain held out. Validation failures are
    /// fatal to the whole sweep.
    pub fn draw(
        rng: &mut impl Rng,
        n_rows: usize,
        n_train: usize,
        min_test: usize,
    ) -> Result<Self> {
        if n_train > n_rows {
            return Err(SweepError::ValidationError(format!(
                "sample size ({}) exceeds dataset size ({})",
                n_train, n_rows
            )));
        }

        let mut indices: Vec<usize> = (0..n_rows).collect();
        indices.shuffle(rng);

        let test = indices.split_off(n_train);
        let train = indices;

        if test.len() < min_test {
            return Err(SweepError::ValidationError(format!(
                "held-out set too small ({} rows, need {})",
                test.len(),
                min_test
            )));
        }

        Ok(Self { train, test })
    }

    pub fn train(&self) -> &[usize] {
        &self.train
    }

    pub fn test(&self) -> &[usize] {
        &self.test
    }
}

/// One fold of a k-fold partition over train-row positions.
#[derive(Debug, Clone)]
pub struct KFoldSplit {
    pub train_indices: Vec<usize>,
    pub held_out: Vec<usize>,
    pub fold_idx: usize,
}

/// Shuffled k-fold partition of `0..n_samples`.
///
/// Fold sizes differ by at most one; every position lands in exactly one
/// fold's held-out group.
pub fn k_fold(rng: &mut impl Rng, n_samples: usize, n_splits: usize) -> Result<Vec<KFoldSplit>> {
    if n_splits < 2 {
        return Err(SweepError::ValidationError(
            "n_splits must be at least 2".to_string(),
        ));
    }
    if n_samples < n_splits {
        return Err(SweepError::ValidationError(format!(
            "n_samples ({}) must be >= n_splits ({})",
            n_samples, n_splits
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(rng);

    let fold_sizes: Vec<usize> = (0..n_splits)
        .map(|i| {
            let base = n_samples / n_splits;
            let remainder = n_samples % n_splits;
            if i < remainder {
                base + 1
            } else {
                base
            }
        })
        .collect();

    let mut splits = Vec::with_capacity(n_splits);
    let mut current = 0;

    for (fold_idx, &fold_size) in fold_sizes.iter().enumerate() {
        let held_out: Vec<usize> = indices[current..current + fold_size].to_vec();
        let train_indices: Vec<usize> = indices[..current]
            .iter()
            .chain(indices[current + fold_size..].iter())
            .copied()
            .collect();

        splits.push(KFoldSplit {
            train_indices,
            held_out,
            fold_idx,
        });

        current += fold_size;
    }

    Ok(splits)
}

/// Per-row fold labels: position `i` holds the fold whose held-out group
/// contains train row `i`.
#[derive(Debug, Clone)]
pub struct FoldAssignments {
    labels: Vec<usize>,
    n_folds: usize,
}

impl FoldAssignments {
    /// Restructure a k-fold partition into a label vector.
    ///
    /// Pure and deterministic: assumes the folds' held-out groups cover
    /// `0..n_train` exactly once, which `k_fold` guarantees.
    pub fn from_folds(folds: &[KFoldSplit], n_train: usize) -> Self {
        let mut labels = vec![0usize; n_train];
        for fold in folds {
            for &row in &fold.held_out {
                debug_assert!(row < n_train);
                labels[row] = fold.fold_idx;
            }
        }
        Self {
            labels,
            n_folds: folds.len(),
        }
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Inverse of `from_folds`: rebuild the held-out groups.
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.n_folds];
        for (row, &fold) in self.labels.iter().enumerate() {
            groups[fold].push(row);
        }
        groups
    }
}
