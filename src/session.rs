//! Recording sessions: discovery of session files and extraction of spike tables and valid trials.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WranglingError;
use crate::mat::{MatFile, MatValue, NumericArray, StructArray};

/// Position of the spike table among the fields of a cell record, when no field name is configured.
pub const DEFAULT_SPIKE_FIELD_POSITION: usize = 1;

/// Names of the variables and fields holding the session data.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLayout {
    /// Variable with one record per recorded cell.
    pub cell_data_variable: String,
    /// Variable with the ids of the valid trials.
    pub good_trials_variable: String,
    /// Field of a cell record holding its spike table. Defaults to the second field.
    pub spike_field: Option<String>,
}

impl Default for SessionLayout {
    fn default() -> Self {
        SessionLayout {
            cell_data_variable: "cellData".to_string(),
            good_trials_variable: "goodTrials".to_string(),
            spike_field: None,
        }
    }
}

/// The spikes of one cell, as (spike time, trial id) rows.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct SpikeTable {
    times: Vec<f64>,
    trials: Vec<f64>,
}

impl SpikeTable {
    /// Create a spike table from its time and trial columns, which must have the same length.
    pub fn build(times: Vec<f64>, trials: Vec<f64>) -> Result<Self, WranglingError> {
        if times.len() != trials.len() {
            return Err(WranglingError::InvalidSession(format!(
                "{} spike times for {} trial ids",
                times.len(),
                trials.len()
            )));
        }
        Ok(SpikeTable { times, trials })
    }

    /// Create a spike table from a numeric matrix whose first two columns are the spike times and trial ids.
    /// Extra columns are ignored and an empty matrix gives an empty table.
    pub fn from_numeric(array: &NumericArray) -> Result<Self, WranglingError> {
        if array.is_empty() {
            return Ok(SpikeTable::default());
        }
        match (array.column(0), array.column(1)) {
            (Some(times), Some(trials)) => SpikeTable::build(times.to_vec(), trials.to_vec()),
            _ => Err(WranglingError::InvalidSession(format!(
                "spike table of dimensions {:?} needs two columns",
                array.dims
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn trials(&self) -> &[f64] {
        &self.trials
    }

    /// Iterate over (spike time, trial id) rows.
    pub fn rows(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.trials.iter().copied())
    }
}

/// A recording session: the spike tables of its cells and its valid trials.
#[derive(Debug, PartialEq, Clone)]
pub struct Session {
    name: String,
    cells: Vec<SpikeTable>,
    good_trials: Vec<i64>,
}

impl Session {
    pub fn new(name: impl Into<String>, cells: Vec<SpikeTable>, good_trials: Vec<i64>) -> Self {
        Session {
            name: name.into(),
            cells,
            good_trials,
        }
    }

    /// Load a session from a MAT-file. The session is named after the file stem.
    pub fn load<P: AsRef<Path>>(path: P, layout: &SessionLayout) -> Result<Self, WranglingError> {
        let path = path.as_ref();
        let mat = MatFile::open(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Session::from_mat(name, &mat, layout)
    }

    /// Extract a session from a parsed MAT-file.
    pub fn from_mat(
        name: impl Into<String>,
        mat: &MatFile,
        layout: &SessionLayout,
    ) -> Result<Self, WranglingError> {
        let cells = spike_tables(mat.require(&layout.cell_data_variable)?, layout)?;
        let good_trials = good_trials(mat.require(&layout.good_trials_variable)?)?;
        Ok(Session::new(name, cells, good_trials))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cells(&self) -> &[SpikeTable] {
        &self.cells
    }

    /// Returns the ids of the valid trials, in file order.
    pub fn good_trials(&self) -> &[i64] {
        &self.good_trials
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn num_trials(&self) -> usize {
        self.good_trials.len()
    }

    /// Total number of spikes over all cells.
    pub fn num_spikes(&self) -> usize {
        self.cells.iter().map(SpikeTable::len).sum()
    }
}

fn record_member<'a>(
    record: &'a StructArray,
    index: usize,
    layout: &SessionLayout,
) -> Result<&'a MatValue, WranglingError> {
    match &layout.spike_field {
        Some(name) => record.field(index, name).ok_or_else(|| {
            WranglingError::InvalidSession(format!(
                "cell {} has no field '{}' (fields: {})",
                index,
                name,
                record.fields.join(", ")
            ))
        }),
        None => record
            .field_at(index, DEFAULT_SPIKE_FIELD_POSITION)
            .ok_or_else(|| {
                WranglingError::InvalidSession(format!(
                    "cell {} has {} fields, the spike table is expected in the second one",
                    index,
                    record.fields.len()
                ))
            }),
    }
}

fn spike_table(member: &MatValue, cell: usize) -> Result<SpikeTable, WranglingError> {
    let array = member.as_numeric().ok_or_else(|| {
        WranglingError::InvalidSession(format!(
            "cell {}: spike table is a {} array",
            cell,
            member.kind()
        ))
    })?;
    SpikeTable::from_numeric(array).map_err(|e| match e {
        WranglingError::InvalidSession(msg) => {
            WranglingError::InvalidSession(format!("cell {}: {}", cell, msg))
        }
        other => other,
    })
}

/// Extracts one spike table per cell. Cells are either the elements of a struct array or the
/// items of a cell array (each a record, a cell, or directly a numeric table).
fn spike_tables(
    cell_data: &MatValue,
    layout: &SessionLayout,
) -> Result<Vec<SpikeTable>, WranglingError> {
    match cell_data {
        MatValue::Struct(records) => (0..records.len())
            .map(|i| spike_table(record_member(records, i, layout)?, i))
            .collect(),
        MatValue::Cell(cells) => cells
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                MatValue::Struct(record) if record.len() == 1 => {
                    spike_table(record_member(record, 0, layout)?, i)
                }
                MatValue::Cell(inner) => {
                    let member = inner.items.get(DEFAULT_SPIKE_FIELD_POSITION).ok_or_else(|| {
                        WranglingError::InvalidSession(format!(
                            "cell {} has {} items, the spike table is expected in the second one",
                            i,
                            inner.items.len()
                        ))
                    })?;
                    spike_table(member, i)
                }
                other => spike_table(other, i),
            })
            .collect(),
        other => Err(WranglingError::InvalidSession(format!(
            "cell data is a {} array, expected struct or cell",
            other.kind()
        ))),
    }
}

/// Converts a value stored as `f64` into an integer trial id. Values outside the `i64` range have
/// no id.
pub(crate) fn trial_id(value: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Extracts the valid trial ids: the first column of a matrix, or the whole of a vector.
fn good_trials(value: &MatValue) -> Result<Vec<i64>, WranglingError> {
    let array = value.as_numeric().ok_or_else(|| {
        WranglingError::InvalidSession(format!(
            "good trials are a {} array, expected numeric",
            value.kind()
        ))
    })?;

    let ids: &[f64] = if array.is_vector() {
        &array.real
    } else {
        array.column(0).unwrap_or(&[])
    };

    ids.iter()
        .map(|&id| {
            trial_id(id).ok_or_else(|| {
                WranglingError::InvalidSession(format!("good trial id {} is not an integer", id))
            })
        })
        .collect()
}

/// List the session files matching a glob pattern (e.g. `E*.mat`) in a directory, sorted by path.
pub fn discover<P: AsRef<Path>>(dir: P, pattern: &str) -> Result<Vec<PathBuf>, WranglingError> {
    let dir = dir.as_ref();
    let dir = dir.to_str().ok_or_else(|| {
        WranglingError::InvalidParameter(format!("{} is not valid UTF-8", dir.display()))
    })?;
    let full_pattern = format!("{}/{}", glob::Pattern::escape(dir), pattern);

    let mut files = glob::glob(&full_pattern)
        .map_err(|e| WranglingError::InvalidParameter(format!("{}: {}", pattern, e)))?
        .collect::<Result<Vec<PathBuf>, glob::GlobError>>()
        .map_err(|e| WranglingError::IOError(e.to_string()))?;
    files.sort();

    if files.is_empty() {
        return Err(WranglingError::SessionNotFound(format!(
            "no file matches {}",
            full_pattern
        )));
    }
    Ok(files)
}

/// Pick a session file by its index in a discovered list.
pub fn select(files: &[PathBuf], index: usize) -> Result<PathBuf, WranglingError> {
    files.get(index).cloned().ok_or_else(|| {
        WranglingError::SessionNotFound(format!(
            "index {} is out of range, {} session files found",
            index,
            files.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::mat::{CellArray, NumericClass};

    fn numeric(rows: usize, cols: usize, real: Vec<f64>) -> MatValue {
        MatValue::Numeric(NumericArray {
            class: NumericClass::Double,
            logical: false,
            dims: vec![rows, cols],
            real,
            imag: None,
        })
    }

    fn records(tables: Vec<MatValue>) -> MatValue {
        let n = tables.len();
        let values = tables
            .into_iter()
            .flat_map(|table| vec![numeric(1, 1, vec![0.0]), table])
            .collect();
        MatValue::Struct(StructArray {
            dims: vec![1, n],
            fields: vec!["id".to_string(), "spikes".to_string()],
            values,
        })
    }

    #[test]
    fn test_spike_table_from_numeric() {
        // rows: (0.5, 1), (1.5, 2)
        let table = match numeric(2, 2, vec![0.5, 1.5, 1.0, 2.0]) {
            MatValue::Numeric(array) => SpikeTable::from_numeric(&array).unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(table.rows().collect::<Vec<_>>(), vec![(0.5, 1.0), (1.5, 2.0)]);

        assert_eq!(
            SpikeTable::from_numeric(&NumericArray::empty()).unwrap(),
            SpikeTable::default()
        );

        let single_column = NumericArray {
            class: NumericClass::Double,
            logical: false,
            dims: vec![3, 1],
            real: vec![1.0, 2.0, 3.0],
            imag: None,
        };
        assert!(matches!(
            SpikeTable::from_numeric(&single_column),
            Err(WranglingError::InvalidSession(_))
        ));

        assert!(SpikeTable::build(vec![1.0], vec![]).is_err());
    }

    #[test]
    fn test_spike_tables_from_struct() {
        let cell_data = records(vec![
            numeric(1, 2, vec![0.25, 3.0]),
            numeric(0, 0, vec![]),
        ]);

        let tables = spike_tables(&cell_data, &SessionLayout::default()).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].times(), &[0.25]);
        assert_eq!(tables[0].trials(), &[3.0]);
        assert!(tables[1].is_empty());

        let layout = SessionLayout {
            spike_field: Some("spikes".to_string()),
            ..SessionLayout::default()
        };
        assert_eq!(spike_tables(&cell_data, &layout).unwrap(), tables);

        let layout = SessionLayout {
            spike_field: Some("missing".to_string()),
            ..SessionLayout::default()
        };
        assert!(matches!(
            spike_tables(&cell_data, &layout),
            Err(WranglingError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_spike_tables_from_cell() {
        let cell_data = MatValue::Cell(CellArray {
            dims: vec![1, 2],
            items: vec![
                MatValue::Cell(CellArray {
                    dims: vec![1, 2],
                    items: vec![numeric(1, 1, vec![7.0]), numeric(1, 2, vec![1.0, 4.0])],
                }),
                numeric(1, 2, vec![2.0, 4.0]),
            ],
        });
        let tables = spike_tables(&cell_data, &SessionLayout::default()).unwrap();
        assert_eq!(tables[0].times(), &[1.0]);
        assert_eq!(tables[1].times(), &[2.0]);

        assert!(matches!(
            spike_tables(&numeric(1, 1, vec![1.0]), &SessionLayout::default()),
            Err(WranglingError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_good_trials() {
        assert_eq!(
            good_trials(&numeric(3, 1, vec![4.0, 5.0, 9.0])).unwrap(),
            vec![4, 5, 9]
        );
        assert_eq!(
            good_trials(&numeric(1, 3, vec![4.0, 5.0, 9.0])).unwrap(),
            vec![4, 5, 9]
        );
        // Only the first column of a matrix holds trial ids
        assert_eq!(
            good_trials(&numeric(2, 2, vec![1.0, 2.0, 100.0, 200.0])).unwrap(),
            vec![1, 2]
        );
        assert!(matches!(
            good_trials(&numeric(2, 1, vec![1.0, 2.5])),
            Err(WranglingError::InvalidSession(_))
        ));
        assert!(matches!(
            good_trials(&numeric(2, 1, vec![1.0, 1e300])),
            Err(WranglingError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_trial_id_range() {
        assert_eq!(trial_id(7.0), Some(7));
        assert_eq!(trial_id(-3.0), Some(-3));
        assert_eq!(trial_id(i64::MIN as f64), Some(i64::MIN));
        assert_eq!(trial_id(i64::MAX as f64), None);
        assert_eq!(trial_id(1e300), None);
        assert_eq!(trial_id(-1e300), None);
        assert_eq!(trial_id(f64::INFINITY), None);
        assert_eq!(trial_id(f64::NAN), None);
        assert_eq!(trial_id(0.5), None);
    }

    #[test]
    fn test_discover_and_select() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["E02.mat", "E01.mat", "F01.mat", "E03.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let files = discover(dir.path(), "E*.mat").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["E01.mat", "E02.mat"]);

        assert_eq!(select(&files, 1).unwrap(), dir.path().join("E02.mat"));
        assert!(matches!(
            select(&files, 14),
            Err(WranglingError::SessionNotFound(_))
        ));
        assert!(matches!(
            discover(dir.path(), "G*.mat"),
            Err(WranglingError::SessionNotFound(_))
        ));
    }
}
