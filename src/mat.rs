//! MATLAB level 5 MAT-file reading.
//!
//! Only what session files need is decoded: numeric, logical, char, cell and struct arrays,
//! with or without compression. Other array classes are kept as [`MatValue::Unsupported`].
pub mod reader;
pub mod value;

pub use reader::{Endian, MatFile};
pub use value::{CellArray, CharArray, MatValue, NumericArray, NumericClass, StructArray};
