//! Consistency checks of an output file against the trial summaries of its session.
use std::path::Path;

use hdf5::File;
use itertools::Itertools;
use serde::Serialize;

use crate::error::WranglingError;
use crate::persist::{dataset_name, persisted_subsets, DatasetKind, NUM_TRIALS_ATTR};
use crate::split::Subset;

/// Outcome of a successful verification.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct VerifyReport {
    pub num_trials: usize,
    pub train: usize,
    pub valid: usize,
    /// Size of the test subset, if it was persisted.
    pub test: Option<usize>,
}

fn failed(msg: String) -> WranglingError {
    WranglingError::VerificationFailed(msg)
}

/// Check an output file against the per-trial summaries it was computed from.
///
/// Verified: all expected datasets exist, indices are `i64`, in range and disjoint across
/// subsets, data equals truth and matches the summaries at its indices, values are non-negative,
/// and the number of indexed trials is consistent with `summaries`.
pub fn verify<P: AsRef<Path>>(path: P, summaries: &[f64]) -> Result<VerifyReport, WranglingError> {
    let file = File::open(path)?;
    let names = file.member_names()?;
    let with_test = names.iter().any(|name| name.starts_with(Subset::Test.prefix()));

    let mut sizes = Vec::new();
    let mut seen: Vec<usize> = Vec::new();
    for &subset in persisted_subsets(with_test) {
        for kind in DatasetKind::ALL {
            let name = dataset_name(subset, kind);
            if !names.contains(&name) {
                return Err(failed(format!("missing dataset '{}'", name)));
            }
        }

        let inds_name = dataset_name(subset, DatasetKind::Inds);
        let inds_dataset = file.dataset(&inds_name)?;
        if !inds_dataset.dtype()?.is::<i64>() {
            return Err(failed(format!("'{}' does not hold i64 values", inds_name)));
        }
        let inds: Vec<i64> = inds_dataset.read_raw()?;
        let data: Vec<f64> = file
            .dataset(&dataset_name(subset, DatasetKind::Data))?
            .read_raw()?;
        let truth: Vec<f64> = file
            .dataset(&dataset_name(subset, DatasetKind::Truth))?
            .read_raw()?;

        if data != truth {
            return Err(failed(format!(
                "{} data and truth differ",
                subset.prefix()
            )));
        }
        if data.len() != inds.len() {
            return Err(failed(format!(
                "{} has {} values for {} indices",
                subset.prefix(),
                data.len(),
                inds.len()
            )));
        }

        for (&ind, &value) in inds.iter().zip(&data) {
            let index = usize::try_from(ind)
                .ok()
                .filter(|&i| i < summaries.len())
                .ok_or_else(|| {
                    failed(format!(
                        "{} index {} is out of range for {} trials",
                        subset.prefix(),
                        ind,
                        summaries.len()
                    ))
                })?;
            if value < 0.0 {
                return Err(failed(format!(
                    "{} value {} is negative",
                    subset.prefix(),
                    value
                )));
            }
            if summaries[index] != value {
                return Err(failed(format!(
                    "{} value {} at trial index {} should be {}",
                    subset.prefix(),
                    value,
                    index,
                    summaries[index]
                )));
            }
            seen.push(index);
        }
        sizes.push(inds.len());
    }

    if !seen.iter().all_unique() {
        return Err(failed("subsets share trial indices".to_string()));
    }
    if (with_test && seen.len() != summaries.len()) || seen.len() > summaries.len() {
        return Err(failed(format!(
            "{} indexed trials for {} trial summaries",
            seen.len(),
            summaries.len()
        )));
    }

    if let Ok(attr) = file.attr(NUM_TRIALS_ATTR) {
        let num_trials: Vec<u64> = attr.read_raw()?;
        if num_trials.first() != Some(&(summaries.len() as u64)) {
            return Err(failed(format!(
                "'{}' attribute is {:?}, expected {}",
                NUM_TRIALS_ATTR,
                num_trials,
                summaries.len()
            )));
        }
    }

    Ok(VerifyReport {
        num_trials: summaries.len(),
        train: sizes[0],
        valid: sizes[1],
        test: sizes.get(2).copied(),
    })
}
