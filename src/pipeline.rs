//! The conversion pipeline: session loading, per-trial reduction, random split and persistence.
use std::path::PathBuf;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::cell_class;
use crate::config::Config;
use crate::error::WranglingError;
use crate::mat::MatFile;
use crate::persist::{self, SplitDatasets};
use crate::session::Session;
use crate::split::SplitIndices;
use crate::trial;
use crate::verify::{self, VerifyReport};

/// Outcome of a conversion run.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct ConversionSummary {
    pub session: PathBuf,
    pub num_cells: usize,
    pub num_trials: usize,
    /// Largest per-trial summary; `None` for a session without valid trials.
    pub overall_max: Option<f64>,
    /// Cell-class diagnostic, when an annotation file is configured.
    pub cell_classes: Option<String>,
    pub seed: u64,
    pub train: usize,
    pub valid: usize,
    pub test: usize,
    pub output: PathBuf,
}

/// Resolve and load the configured session.
pub fn load_session(config: &Config) -> Result<(PathBuf, Session), WranglingError> {
    let path = config.session_path()?;
    log::info!("Loading session {}", path.display());
    let session = Session::load(&path, &config.layout)?;
    log::info!(
        "Session {}: {} cells, {} spikes, {} valid trials",
        session.name(),
        session.num_cells(),
        session.num_spikes(),
        session.num_trials()
    );
    Ok((path, session))
}

/// Run the whole conversion described by the configuration.
pub fn convert(config: &Config) -> Result<ConversionSummary, WranglingError> {
    config.validate()?;

    let (session_path, session) = load_session(config)?;

    let cell_classes = match config.cell_analysis_path() {
        Some(path) => {
            log::info!("Loading cell classes from {}", path.display());
            Some(cell_class::report(&MatFile::open(&path)?)?)
        }
        None => None,
    };

    let summaries = trial::max_spike_times(&session);
    let overall_max = trial::overall_max(&summaries);
    match overall_max {
        Some(max) => log::info!("Overall maximum time across all trials and cells: {}", max),
        None => log::warn!("Session {} has no valid trials", session.name()),
    }

    let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
    if config.seed.is_none() {
        log::info!("No seed configured, drew seed {}", seed);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let indices = SplitIndices::rand(summaries.len(), &config.ratios, &mut rng);
    log::info!(
        "Split {} trials into {} train, {} valid and {} test",
        summaries.len(),
        indices.train.len(),
        indices.valid.len(),
        indices.test.len()
    );
    if !config.persist_test && !indices.test.is_empty() {
        log::debug!("The {} test trials are not persisted", indices.test.len());
    }

    let output = config.output_path();
    persist::write_splits(
        &output,
        &SplitDatasets {
            summaries: &summaries,
            indices: &indices,
            seed,
            persist_test: config.persist_test,
        },
    )?;
    log::info!("Saved to {}", output.display());

    Ok(ConversionSummary {
        session: session_path,
        num_cells: session.num_cells(),
        num_trials: session.num_trials(),
        overall_max,
        cell_classes,
        seed,
        train: indices.train.len(),
        valid: indices.valid.len(),
        test: indices.test.len(),
        output,
    })
}

/// Check the configured output file against its session.
pub fn verify_output(config: &Config) -> Result<VerifyReport, WranglingError> {
    config.validate()?;
    let (_, session) = load_session(config)?;
    let summaries = trial::max_spike_times(&session);
    let output = config.output_path();
    log::info!("Verifying {}", output.display());
    let report = verify::verify(&output, &summaries)?;
    log::info!(
        "{} is consistent: {} train, {} valid trials",
        output.display(),
        report.train,
        report.valid
    );
    Ok(report)
}
