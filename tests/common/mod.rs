//! Writer of little-endian level 5 MAT-files, for building session fixtures.
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;

const MI_INT8: u32 = 1;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

const MX_CELL: u32 = 1;
const MX_STRUCT: u32 = 2;
const MX_CHAR: u32 = 4;
const MX_DOUBLE: u32 = 6;

const FIELD_NAME_LEN: usize = 32;

pub enum Value {
    /// A double matrix given row by row.
    Matrix(Vec<Vec<f64>>),
    Str(String),
    /// A 1xN cell array.
    Cell(Vec<Value>),
    /// A 1xN struct array, one vector of field values per element.
    Struct(Vec<&'static str>, Vec<Vec<Value>>),
}

impl Value {
    pub fn scalar(value: f64) -> Value {
        Value::Matrix(vec![vec![value]])
    }

    pub fn column(values: &[f64]) -> Value {
        Value::Matrix(values.iter().map(|&v| vec![v]).collect())
    }

    /// A spike table of (time, trial) rows.
    pub fn spikes(rows: &[(f64, f64)]) -> Value {
        Value::Matrix(rows.iter().map(|&(t, trial)| vec![t, trial]).collect())
    }
}

fn element(data_type: u32, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    if !data.is_empty() && data.len() <= 4 {
        out.extend((((data.len() as u32) << 16) | data_type).to_le_bytes());
        out.extend(data);
        out.resize(8, 0);
        return out;
    }
    out.extend(data_type.to_le_bytes());
    out.extend((data.len() as u32).to_le_bytes());
    out.extend(data);
    while out.len() % 8 != 0 {
        out.push(0);
    }
    out
}

fn header(class: u32, rows: usize, cols: usize, name: &str) -> Vec<u8> {
    let flags: Vec<u8> = [class, 0].iter().flat_map(|w| w.to_le_bytes()).collect();
    let dims: Vec<u8> = [rows as i32, cols as i32]
        .iter()
        .flat_map(|d| d.to_le_bytes())
        .collect();
    let mut out = element(MI_UINT32, &flags);
    out.extend(element(MI_INT32, &dims));
    out.extend(element(MI_INT8, name.as_bytes()));
    out
}

pub fn matrix(name: &str, value: &Value) -> Vec<u8> {
    let content = match value {
        Value::Matrix(rows) => {
            let num_rows = rows.len();
            let num_cols = rows.first().map_or(0, |r| r.len());
            let mut data = Vec::new();
            for c in 0..num_cols {
                for row in rows {
                    data.extend(row[c].to_le_bytes());
                }
            }
            let mut out = header(MX_DOUBLE, num_rows, num_cols, name);
            out.extend(element(MI_DOUBLE, &data));
            out
        }
        Value::Str(text) => {
            let data: Vec<u8> = text.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
            let mut out = header(MX_CHAR, 1, text.encode_utf16().count(), name);
            out.extend(element(MI_UINT16, &data));
            out
        }
        Value::Cell(items) => {
            let mut out = header(MX_CELL, 1, items.len(), name);
            for item in items {
                out.extend(matrix("", item));
            }
            out
        }
        Value::Struct(fields, elements) => {
            let mut out = header(MX_STRUCT, 1, elements.len(), name);
            out.extend(element(MI_INT32, &(FIELD_NAME_LEN as i32).to_le_bytes()));
            let mut names = Vec::new();
            for field in fields {
                let mut padded = field.as_bytes().to_vec();
                padded.resize(FIELD_NAME_LEN, 0);
                names.extend(padded);
            }
            out.extend(element(MI_INT8, &names));
            for values in elements {
                for value in values {
                    out.extend(matrix("", value));
                }
            }
            out
        }
    };
    element(MI_MATRIX, &content)
}

/// Write a MAT-file with the given variables, optionally compressing each of them.
pub fn write_mat(path: &Path, variables: &[(&str, Value)], compress: bool) {
    let mut bytes = format!("{:<116}", "MATLAB 5.0 MAT-file, Platform: GLNXA64").into_bytes();
    bytes.extend([0u8; 8]);
    bytes.extend(0x0100u16.to_le_bytes());
    bytes.extend(b"IM");

    for (name, value) in variables {
        let raw = matrix(name, value);
        if compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&raw).unwrap();
            let compressed = encoder.finish().unwrap();
            bytes.extend(MI_COMPRESSED.to_le_bytes());
            bytes.extend((compressed.len() as u32).to_le_bytes());
            bytes.extend(compressed);
        } else {
            bytes.extend(raw);
        }
    }
    fs::write(path, bytes).unwrap();
}

/// A session with `num_cells` cells and trials `1..=num_trials`; trial `k` of cell `c` has spikes
/// at `0.1 * c` and `k + 0.01 * c`, except trial 3 which has no spike at all.
pub fn session_variables(num_cells: usize, num_trials: usize) -> Vec<(&'static str, Value)> {
    let cells = (0..num_cells)
        .map(|c| {
            let rows: Vec<(f64, f64)> = (1..=num_trials)
                .filter(|&k| k != 3)
                .flat_map(|k| {
                    let k = k as f64;
                    let c = c as f64;
                    vec![(0.1 * c, k), (k + 0.01 * c, k)]
                })
                .collect();
            vec![
                Value::Str(format!("cell{}", c)),
                Value::spikes(&rows),
            ]
        })
        .collect();

    let trials: Vec<f64> = (1..=num_trials).map(|k| k as f64).collect();
    vec![
        ("cellData", Value::Struct(vec!["name", "spikes"], cells)),
        ("goodTrials", Value::column(&trials)),
    ]
}

/// The per-trial summaries of `session_variables`.
pub fn expected_summaries(num_cells: usize, num_trials: usize) -> Vec<f64> {
    (1..=num_trials)
        .map(|k| {
            if k == 3 || num_cells == 0 {
                0.0
            } else {
                k as f64 + 0.01 * (num_cells - 1) as f64
            }
        })
        .collect()
}

/// A cell-analysis file with the given class codes in `cells.cellstats.cellclass`.
pub fn write_cell_analysis(path: &Path, codes: &[f64]) {
    let cellclass = Value::Cell(codes.iter().map(|&c| Value::scalar(c)).collect());
    let cellstats = Value::Struct(vec!["cellclass"], vec![vec![cellclass]]);
    let cells = Value::Struct(vec!["cellstats"], vec![vec![cellstats]]);
    write_mat(path, &[("cells", cells)], false);
}
