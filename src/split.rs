//! Random partition of the trial summaries into train, validation and test subsets.
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::WranglingError;

/// The tolerance on the sum of the split ratios.
pub const RATIO_TOLERANCE: f64 = 1e-9;

/// The three subsets of a split.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Subset {
    Train,
    Valid,
    Test,
}

impl Subset {
    pub const ALL: [Subset; 3] = [Subset::Train, Subset::Valid, Subset::Test];

    /// Prefix of the dataset names of the subset.
    pub fn prefix(&self) -> &'static str {
        match self {
            Subset::Train => "train",
            Subset::Valid => "valid",
            Subset::Test => "test",
        }
    }
}

/// Fractions of the trials assigned to each subset.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub valid: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        SplitRatios {
            train: 0.8,
            valid: 0.1,
            test: 0.1,
        }
    }
}

impl SplitRatios {
    /// Create split ratios. Each ratio must be in [0, 1] and they must sum to one.
    pub fn build(train: f64, valid: f64, test: f64) -> Result<Self, WranglingError> {
        let ratios = SplitRatios { train, valid, test };
        ratios.validate()?;
        Ok(ratios)
    }

    pub fn validate(&self) -> Result<(), WranglingError> {
        for (name, ratio) in [("train", self.train), ("valid", self.valid), ("test", self.test)] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(WranglingError::InvalidParameter(format!(
                    "{} ratio {} is not in [0, 1]",
                    name, ratio
                )));
            }
        }
        let sum = self.train + self.valid + self.test;
        if (sum - 1.0).abs() > RATIO_TOLERANCE {
            return Err(WranglingError::InvalidParameter(format!(
                "split ratios sum to {}, expected 1",
                sum
            )));
        }
        Ok(())
    }

    /// Returns the sizes of the train, validation and test subsets for `total` items.
    ///
    /// Train and validation sizes are rounded half to even; the test subset takes the rest, so the
    /// three sizes always add up to `total`.
    pub fn sizes(&self, total: usize) -> (usize, usize, usize) {
        let train = ((self.train * total as f64).round_ties_even() as usize).min(total);
        let valid = ((self.valid * total as f64).round_ties_even() as usize).min(total - train);
        (train, valid, total - train - valid)
    }
}

/// Indices of the items in each subset, in permutation order.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    /// Randomly split the indices `0..total`.
    ///
    /// # Parameters
    /// - `total`: The number of items to split.
    /// - `ratios`: The fraction of items in each subset.
    /// - `rng`: A mutable reference to a random number generator implementing the `Rng` trait.
    ///
    /// # Returns
    /// Three disjoint index subsets covering `0..total`, taken as contiguous ranges of a random permutation.
    pub fn rand<R: Rng>(total: usize, ratios: &SplitRatios, rng: &mut R) -> Self {
        let mut permutation: Vec<usize> = (0..total).collect();
        permutation.shuffle(rng);

        let (train_size, valid_size, _) = ratios.sizes(total);
        let test = permutation.split_off(train_size + valid_size);
        let valid = permutation.split_off(train_size);

        SplitIndices {
            train: permutation,
            valid,
            test,
        }
    }

    /// Returns the indices of a subset.
    pub fn subset(&self, subset: Subset) -> &[usize] {
        match subset {
            Subset::Train => &self.train,
            Subset::Valid => &self.valid,
            Subset::Test => &self.test,
        }
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }

    /// Gather the values of a subset. Panics if an index is out of bounds for `values`.
    pub fn gather<T: Copy>(&self, subset: Subset, values: &[T]) -> Vec<T> {
        self.subset(subset).iter().map(|&i| values[i]).collect()
    }
}
