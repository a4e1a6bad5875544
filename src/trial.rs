//! Reduction of a session to one summary per valid trial.
use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::session::{trial_id, Session, SpikeTable};

/// Computes, for every valid trial of the session, the latest spike time over all cells.
///
/// The running maximum starts at zero: a trial without any spike (or with negative times only)
/// is summarized by 0. The output has one value per valid trial, in the order of the session.
pub fn max_spike_times(session: &Session) -> Vec<f64> {
    let wanted: HashSet<i64> = session.good_trials().iter().copied().collect();

    let maxima = session
        .cells()
        .par_iter()
        .fold(HashMap::new, |acc, table| fold_table(acc, table, &wanted))
        .reduce(HashMap::new, merge_maxima);

    session
        .good_trials()
        .iter()
        .map(|id| maxima.get(id).copied().unwrap_or(0.0).max(0.0))
        .collect()
}

fn fold_table(
    mut acc: HashMap<i64, f64>,
    table: &SpikeTable,
    wanted: &HashSet<i64>,
) -> HashMap<i64, f64> {
    for (time, trial) in table.rows() {
        let Some(id) = trial_id(trial) else {
            continue;
        };
        if wanted.contains(&id) {
            acc.entry(id)
                .and_modify(|max: &mut f64| *max = max.max(time))
                .or_insert(time);
        }
    }
    acc
}

fn merge_maxima(mut left: HashMap<i64, f64>, right: HashMap<i64, f64>) -> HashMap<i64, f64> {
    for (id, time) in right {
        left.entry(id)
            .and_modify(|max: &mut f64| *max = max.max(time))
            .or_insert(time);
    }
    left
}

/// Returns the largest per-trial summary, or `None` for a session without valid trials.
pub fn overall_max(summaries: &[f64]) -> Option<f64> {
    summaries
        .iter()
        .copied()
        .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |max| max.max(x))))
}
