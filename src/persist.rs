//! Persistence of the split datasets to an HDF5 file.
use std::fs;
use std::path::Path;

use hdf5::File;

use crate::error::WranglingError;
use crate::split::{SplitIndices, Subset};

/// Root attribute holding the seed of the split.
pub const SEED_ATTR: &str = "seed";
/// Root attribute holding the number of trial summaries.
pub const NUM_TRIALS_ATTR: &str = "num_trials";

/// The datasets written for each subset.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DatasetKind {
    /// Per-trial summaries of the subset (`f64`).
    Data,
    /// Indices of the subset into the summary sequence (`i64`).
    Inds,
    /// Copy of the data, used as ground truth downstream (`f64`).
    Truth,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [DatasetKind::Data, DatasetKind::Inds, DatasetKind::Truth];

    pub fn suffix(&self) -> &'static str {
        match self {
            DatasetKind::Data => "data",
            DatasetKind::Inds => "inds",
            DatasetKind::Truth => "truth",
        }
    }
}

/// Name of a dataset, e.g. `train_inds`.
pub fn dataset_name(subset: Subset, kind: DatasetKind) -> String {
    format!("{}_{}", subset.prefix(), kind.suffix())
}

static WITH_TEST: [Subset; 3] = [Subset::Train, Subset::Valid, Subset::Test];
static WITHOUT_TEST: [Subset; 2] = [Subset::Train, Subset::Valid];

/// Returns the subsets written to the output file.
pub fn persisted_subsets(persist_test: bool) -> &'static [Subset] {
    if persist_test {
        &WITH_TEST
    } else {
        &WITHOUT_TEST
    }
}

/// Everything written to an output file.
#[derive(Debug, Clone, Copy)]
pub struct SplitDatasets<'a> {
    /// One summary per trial; indices refer to this sequence.
    pub summaries: &'a [f64],
    pub indices: &'a SplitIndices,
    pub seed: u64,
    /// Whether to also write the test subset.
    pub persist_test: bool,
}

/// Write the split datasets to an HDF5 file, replacing any existing file.
/// The parent directory is created if needed.
pub fn write_splits<P: AsRef<Path>>(
    path: P,
    datasets: &SplitDatasets,
) -> Result<(), WranglingError> {
    let path = path.as_ref();
    if datasets.indices.total() != datasets.summaries.len() {
        return Err(WranglingError::InvalidParameter(format!(
            "split covers {} items but there are {} summaries",
            datasets.indices.total(),
            datasets.summaries.len()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| WranglingError::IOError(format!("{}: {}", parent.display(), e)))?;
    }

    let file = File::create(path)?;
    for &subset in persisted_subsets(datasets.persist_test) {
        let data = datasets.indices.gather(subset, datasets.summaries);
        let inds: Vec<i64> = datasets
            .indices
            .subset(subset)
            .iter()
            .map(|&i| i as i64)
            .collect();

        file.new_dataset_builder()
            .with_data(&data[..])
            .create(dataset_name(subset, DatasetKind::Data).as_str())?;
        file.new_dataset_builder()
            .with_data(&inds[..])
            .create(dataset_name(subset, DatasetKind::Inds).as_str())?;
        file.new_dataset_builder()
            .with_data(&data[..])
            .create(dataset_name(subset, DatasetKind::Truth).as_str())?;

        log::debug!("Wrote {} subset with {} trials", subset.prefix(), data.len());
    }

    file.new_attr_builder()
        .with_data(&[datasets.seed][..])
        .create(SEED_ATTR)?;
    file.new_attr_builder()
        .with_data(&[datasets.summaries.len() as u64][..])
        .create(NUM_TRIALS_ATTR)?;

    file.close()?;
    Ok(())
}
