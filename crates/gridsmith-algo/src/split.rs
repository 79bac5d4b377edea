//! Seeded train/test row splits.

use gridsmith_core::{GridError, GridResult, SplitSpec};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    /// Per-row flag, true for test rows.
    pub fn test_mask(&self, n_rows: usize) -> Vec<bool> {
        let mut mask = vec![false; n_rows];
        for &i in &self.test {
            if i < n_rows {
                mask[i] = true;
            }
        }
        mask
    }
}

/// Split `n_rows` rows: `ceil(test_ratio * n)` go to test.
///
/// With `shuffle` the rows are permuted with a seeded RNG and the first
/// `n_test` of the permutation form the test set; otherwise the last rows do.
pub fn train_test_split(
    n_rows: usize,
    test_ratio: f64,
    shuffle: bool,
    random_state: u64,
) -> GridResult<TrainTestSplit> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(GridError::Validation(format!(
            "test ratio must be in (0, 1), got {test_ratio}"
        )));
    }
    let n_test = (test_ratio * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(GridError::Validation(format!(
            "cannot split {n_rows} rows with test ratio {test_ratio}"
        )));
    }

    let mut order: Vec<usize> = (0..n_rows).collect();
    if shuffle {
        let mut rng = StdRng::seed_from_u64(random_state);
        order.shuffle(&mut rng);
        let train = order.split_off(n_test);
        Ok(TrainTestSplit { train, test: order })
    } else {
        let test = order.split_off(n_rows - n_test);
        Ok(TrainTestSplit { train: order, test })
    }
}

pub fn split_from_spec(n_rows: usize, spec: &SplitSpec, default_seed: u64) -> GridResult<TrainTestSplit> {
    train_test_split(
        n_rows,
        spec.test_ratio,
        spec.shuffle,
        spec.random_state.unwrap_or(default_seed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_round_test_up() {
        let split = train_test_split(10, 0.25, true, 42).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 7);
    }

    #[test]
    fn partition_covers_every_row_once() {
        let split = train_test_split(50, 0.2, true, 7).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_split() {
        assert_eq!(
            train_test_split(100, 0.2, true, 42).unwrap(),
            train_test_split(100, 0.2, true, 42).unwrap()
        );
        assert_ne!(
            train_test_split(100, 0.2, true, 42).unwrap(),
            train_test_split(100, 0.2, true, 43).unwrap()
        );
    }

    #[test]
    fn unshuffled_split_holds_out_the_tail() {
        let split = train_test_split(5, 0.4, false, 0).unwrap();
        assert_eq!(split.train, vec![0, 1, 2]);
        assert_eq!(split.test, vec![3, 4]);
        assert_eq!(split.test_mask(5), vec![false, false, false, true, true]);
    }

    #[test]
    fn degenerate_splits_are_rejected() {
        assert!(train_test_split(1, 0.5, true, 0).is_err());
        assert!(train_test_split(10, 1.0, true, 0).is_err());
        assert!(train_test_split(10, 0.0, true, 0).is_err());
    }
}
