//! Cell classes from the cell-analysis annotation file, and the per-session class diagnostic.
use std::fmt;

use crate::error::WranglingError;
use crate::mat::{MatFile, MatValue};

/// The number of known cell classes.
pub const NUM_CELL_CLASSES: usize = 9;

/// The tuning class of a recorded cell.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum CellClass {
    Untuned,
    OfferValueAPos,
    OfferValueANeg,
    OfferValueBPos,
    OfferValueBNeg,
    ChosenValuePos,
    ChosenValueNeg,
    ChosenJuiceA,
    ChosenJuiceB,
}

impl CellClass {
    pub const ALL: [CellClass; NUM_CELL_CLASSES] = [
        CellClass::Untuned,
        CellClass::OfferValueAPos,
        CellClass::OfferValueANeg,
        CellClass::OfferValueBPos,
        CellClass::OfferValueBNeg,
        CellClass::ChosenValuePos,
        CellClass::ChosenValueNeg,
        CellClass::ChosenJuiceA,
        CellClass::ChosenJuiceB,
    ];

    /// Returns the class with the given code (0, ±1, ..., ±4).
    pub fn from_code(code: i64) -> Option<Self> {
        CellClass::ALL.iter().copied().find(|class| class.code() == code)
    }

    pub fn code(&self) -> i64 {
        match self {
            CellClass::Untuned => 0,
            CellClass::OfferValueAPos => 1,
            CellClass::OfferValueANeg => -1,
            CellClass::OfferValueBPos => 2,
            CellClass::OfferValueBNeg => -2,
            CellClass::ChosenValuePos => 3,
            CellClass::ChosenValueNeg => -3,
            CellClass::ChosenJuiceA => 4,
            CellClass::ChosenJuiceB => -4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CellClass::Untuned => "untuned",
            CellClass::OfferValueAPos => "OVA+",
            CellClass::OfferValueANeg => "OVA-",
            CellClass::OfferValueBPos => "OVB+",
            CellClass::OfferValueBNeg => "OVB-",
            CellClass::ChosenValuePos => "CV+",
            CellClass::ChosenValueNeg => "CV-",
            CellClass::ChosenJuiceA => "CJA",
            CellClass::ChosenJuiceB => "CJB",
        }
    }
}

impl fmt::Display for CellClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

fn code_of(value: &MatValue) -> Result<i64, WranglingError> {
    let code = match value {
        MatValue::Numeric(array) => array.real.first().copied(),
        MatValue::Char(array) => array.text.trim().parse::<f64>().ok(),
        MatValue::Cell(cell) => {
            return match cell.items.first() {
                Some(item) => code_of(item),
                None => Err(WranglingError::InvalidSession(
                    "empty cell class entry".to_string(),
                )),
            }
        }
        _ => None,
    };
    code.filter(|c| c.fract() == 0.0)
        .map(|c| c as i64)
        .ok_or_else(|| {
            WranglingError::InvalidSession(format!(
                "cell class entry is not an integer code ({} array)",
                value.kind()
            ))
        })
}

fn first_field<'a>(value: &'a MatValue, field: &str) -> Result<&'a MatValue, WranglingError> {
    value
        .as_struct()
        .and_then(|record| record.field(0, field))
        .ok_or_else(|| {
            WranglingError::InvalidSession(format!(
                "expected a struct with a '{}' field, found a {} array",
                field,
                value.kind()
            ))
        })
}

/// Entries of the first row of a column-major array.
fn first_row<'a, T>(dims: &[usize], items: &'a [T]) -> impl Iterator<Item = &'a T> {
    let rows = dims.first().copied().unwrap_or(0).max(1);
    items.iter().step_by(rows)
}

/// Reads the class codes of a cell-analysis file (`cells.cellstats.cellclass`), one per entry of
/// its first row.
pub fn load_cell_classes(mat: &MatFile) -> Result<Vec<i64>, WranglingError> {
    let cells = mat.require("cells")?;
    let cellstats = first_field(cells, "cellstats")?;
    let cellclass = first_field(cellstats, "cellclass")?;

    match cellclass {
        MatValue::Numeric(array) => first_row(&array.dims, &array.real)
            .map(|&c| {
                if c.fract() == 0.0 {
                    Ok(c as i64)
                } else {
                    Err(WranglingError::InvalidSession(format!(
                        "cell class {} is not an integer code",
                        c
                    )))
                }
            })
            .collect(),
        MatValue::Cell(cell) => first_row(&cell.dims, &cell.items).map(code_of).collect(),
        other => code_of(other).map(|code| vec![code]),
    }
}

/// Builds the diagnostic message on the number of cell classes of a session.
pub fn diagnostic(codes: &[i64]) -> String {
    if codes.len() == NUM_CELL_CLASSES {
        "This session has all cell classes.".to_string()
    } else {
        format!("This session has {} cell classes.", codes.len())
    }
}

/// Loads the cell classes of an annotation file, logs the diagnostic and returns it.
pub fn report(mat: &MatFile) -> Result<String, WranglingError> {
    let codes = load_cell_classes(mat)?;
    for code in &codes {
        match CellClass::from_code(*code) {
            Some(class) => log::debug!("Cell class {} ({})", code, class),
            None => log::warn!("Unknown cell class code {}", code),
        }
    }
    let message = diagnostic(&codes);
    log::info!("{}", message);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mat::{CellArray, CharArray, NumericArray, NumericClass};

    fn scalar(value: f64) -> MatValue {
        MatValue::Numeric(NumericArray {
            class: NumericClass::Double,
            logical: false,
            dims: vec![1, 1],
            real: vec![value],
            imag: None,
        })
    }

    #[test]
    fn test_codes_and_labels() {
        assert_eq!(CellClass::from_code(0), Some(CellClass::Untuned));
        assert_eq!(CellClass::from_code(-2), Some(CellClass::OfferValueBNeg));
        assert_eq!(CellClass::from_code(4).unwrap().label(), "CJA");
        assert_eq!(CellClass::from_code(5), None);
        for class in CellClass::ALL {
            assert_eq!(CellClass::from_code(class.code()), Some(class));
        }
    }

    #[test]
    fn test_code_of() {
        assert_eq!(code_of(&scalar(-3.0)), Ok(-3));
        assert_eq!(
            code_of(&MatValue::Char(CharArray {
                dims: vec![1, 2],
                text: "+1".to_string()
            })),
            Ok(1)
        );
        assert_eq!(
            code_of(&MatValue::Cell(CellArray {
                dims: vec![1, 1],
                items: vec![scalar(2.0)]
            })),
            Ok(2)
        );
        assert!(code_of(&scalar(0.5)).is_err());
    }

    #[test]
    fn test_first_row() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        // 2x3, column-major
        assert_eq!(
            first_row(&[2, 3], &values).collect::<Vec<_>>(),
            vec![&1.0, &3.0, &5.0]
        );
        assert_eq!(first_row(&[1, 6], &values).count(), 6);
        assert_eq!(first_row(&[6, 1], &values).collect::<Vec<_>>(), vec![&1.0]);
        assert_eq!(first_row(&[0, 0], &[] as &[f64]).count(), 0);
    }

    #[test]
    fn test_diagnostic() {
        assert_eq!(
            diagnostic(&[0, 1, -1, 2, -2, 3, -3, 4, -4]),
            "This session has all cell classes."
        );
        assert_eq!(diagnostic(&[0, 1, 1]), "This session has 3 cell classes.");
        assert_eq!(diagnostic(&[]), "This session has 0 cell classes.");
    }
}
