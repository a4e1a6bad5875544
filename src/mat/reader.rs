//! Reader for MATLAB level 5 MAT-files (the format written by `save -v7` and older).
use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;

use super::value::{CellArray, CharArray, MatValue, NumericArray, NumericClass, StructArray};
use crate::error::WranglingError;

/// Length of the descriptive header preceding the data elements.
pub const HEADER_LEN: usize = 128;

// Data element types
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;
const MI_UTF16: u32 = 17;
const MI_UTF32: u32 = 18;

// Array classes with a dedicated layout
const MX_CELL: u8 = 1;
const MX_STRUCT: u8 = 2;
const MX_CHAR: u8 = 4;

const FLAG_COMPLEX: u32 = 0x0800;
const FLAG_LOGICAL: u32 = 0x0200;

/// Byte order of a MAT-file, given by the endian indicator of its header.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, b: &[u8]) -> u16 {
        let raw = [b[0], b[1]];
        match self {
            Endian::Little => u16::from_le_bytes(raw),
            Endian::Big => u16::from_be_bytes(raw),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        let raw = [b[0], b[1], b[2], b[3]];
        match self {
            Endian::Little => u32::from_le_bytes(raw),
            Endian::Big => u32::from_be_bytes(raw),
        }
    }
}

/// A parsed MAT-file: its header text and its named top-level variables.
#[derive(Debug, PartialEq, Clone)]
pub struct MatFile {
    header: String,
    version: u16,
    endian: Endian,
    variables: Vec<(String, MatValue)>,
}

impl MatFile {
    /// Read and parse the MAT-file at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WranglingError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| WranglingError::IOError(format!("{}: {}", path.display(), e)))?;
        MatFile::parse(file)
    }

    /// Parse a MAT-file from any reader. The whole content is buffered.
    pub fn parse<R: Read>(mut reader: R) -> Result<Self, WranglingError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        MatFile::from_bytes(&bytes)
    }

    /// Parse a MAT-file from its raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WranglingError> {
        if bytes.len() < HEADER_LEN {
            return Err(WranglingError::MatFormat(format!(
                "{} bytes is shorter than the {}-byte header",
                bytes.len(),
                HEADER_LEN
            )));
        }

        let header = String::from_utf8_lossy(&bytes[..116])
            .trim_end_matches(|c: char| c == ' ' || c == '\0')
            .to_string();
        if header.starts_with("MATLAB 7.3") {
            return Err(WranglingError::MatFormat(
                "MAT-file v7.3 is HDF5-based, re-save the session with `save -v7`".to_string(),
            ));
        }

        let endian = match &bytes[126..128] {
            b"IM" => Endian::Little,
            b"MI" => Endian::Big,
            other => {
                return Err(WranglingError::MatFormat(format!(
                    "unknown endian indicator {:?}",
                    other
                )))
            }
        };
        let version = endian.u16(&bytes[124..126]);

        let mut cursor = Cursor::new(&bytes[HEADER_LEN..], endian);
        let mut variables = Vec::new();
        while cursor.remaining() >= 8 {
            let element = cursor.next_element()?;
            match element.data_type {
                MI_MATRIX => variables.push(parse_matrix(element.data, endian)?),
                MI_COMPRESSED => {
                    let inflated = inflate(element.data)?;
                    let mut inner = Cursor::new(&inflated, endian);
                    let element = inner.next_element()?;
                    if element.data_type == MI_MATRIX {
                        variables.push(parse_matrix(element.data, endian)?);
                    } else {
                        log::debug!(
                            "Skipping compressed element of type {}",
                            element.data_type
                        );
                    }
                }
                other => log::debug!("Skipping top-level element of type {}", other),
            }
        }

        Ok(MatFile {
            header,
            version,
            endian,
            variables,
        })
    }

    /// Returns the descriptive text of the header.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Returns the version field of the header (0x0100 for level 5 files).
    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Returns the names of the variables, in file order.
    pub fn names(&self) -> Vec<&str> {
        self.variables.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Returns the variable with the given name, if any.
    pub fn find_by_name(&self, name: &str) -> Option<&MatValue> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Like `find_by_name`, but a missing variable is an error.
    pub fn require(&self, name: &str) -> Result<&MatValue, WranglingError> {
        self.find_by_name(name).ok_or_else(|| {
            WranglingError::MissingVariable(format!(
                "'{}' (available: {})",
                name,
                self.names().join(", ")
            ))
        })
    }
}

struct Element<'a> {
    data_type: u32,
    data: &'a [u8],
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Cursor {
            bytes,
            pos: 0,
            endian,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WranglingError> {
        if n > self.remaining() {
            return Err(WranglingError::MatFormat(format!(
                "element of {} bytes overruns its container ({} bytes left)",
                n,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, WranglingError> {
        let raw = self.take(4)?;
        Ok(self.endian.u32(raw))
    }

    /// Elements start on 8-byte boundaries, except after compressed ones.
    fn align(&mut self) {
        self.pos = ((self.pos + 7) & !7).min(self.bytes.len());
    }

    fn next_element(&mut self) -> Result<Element<'a>, WranglingError> {
        let first = self.read_u32()?;

        // Small data element: type and size packed in one word, data in the next.
        let small_len = (first >> 16) as usize;
        if small_len != 0 {
            if small_len > 4 {
                return Err(WranglingError::MatFormat(format!(
                    "small element declares {} bytes",
                    small_len
                )));
            }
            let data = self.take(4)?;
            return Ok(Element {
                data_type: first & 0xFFFF,
                data: &data[..small_len],
            });
        }

        let len = self.read_u32()? as usize;
        let data = self.take(len)?;
        if first != MI_COMPRESSED {
            self.align();
        }
        Ok(Element {
            data_type: first,
            data,
        })
    }

    fn next_matrix(&mut self) -> Result<MatValue, WranglingError> {
        let element = self.next_element()?;
        if element.data_type != MI_MATRIX {
            return Err(WranglingError::MatFormat(format!(
                "expected a matrix element, found type {}",
                element.data_type
            )));
        }
        Ok(parse_matrix(element.data, self.endian)?.1)
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, WranglingError> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut inflated)
        .map_err(|e| WranglingError::MatFormat(format!("cannot inflate element: {}", e)))?;
    Ok(inflated)
}

/// Decodes the payload of a numeric data element into `f64` values.
fn decode_numeric(
    data_type: u32,
    data: &[u8],
    endian: Endian,
) -> Result<Vec<f64>, WranglingError> {
    macro_rules! decode {
        ($t:ty) => {{
            const N: usize = std::mem::size_of::<$t>();
            if data.len() % N != 0 {
                return Err(WranglingError::MatFormat(format!(
                    "{} bytes is not a multiple of the {}-byte element size",
                    data.len(),
                    N
                )));
            }
            data.chunks_exact(N)
                .map(|chunk| {
                    let mut raw = [0u8; N];
                    raw.copy_from_slice(chunk);
                    let value = match endian {
                        Endian::Little => <$t>::from_le_bytes(raw),
                        Endian::Big => <$t>::from_be_bytes(raw),
                    };
                    value as f64
                })
                .collect::<Vec<f64>>()
        }};
    }

    let values = match data_type {
        MI_INT8 => decode!(i8),
        MI_UINT8 | MI_UTF8 => decode!(u8),
        MI_INT16 => decode!(i16),
        MI_UINT16 | MI_UTF16 => decode!(u16),
        MI_INT32 => decode!(i32),
        MI_UINT32 | MI_UTF32 => decode!(u32),
        MI_SINGLE => decode!(f32),
        MI_DOUBLE => decode!(f64),
        MI_INT64 => decode!(i64),
        MI_UINT64 => decode!(u64),
        other => {
            return Err(WranglingError::MatFormat(format!(
                "data type {} is not numeric",
                other
            )))
        }
    };
    Ok(values)
}

/// Number of elements of an array, rejecting dimensions whose product overflows.
fn num_elements(dims: &[usize]) -> Result<usize, WranglingError> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| {
            WranglingError::MatFormat(format!("array dimensions {:?} overflow", dims))
        })
}

/// Parses the content of a `miMATRIX` element into its name and value.
fn parse_matrix(data: &[u8], endian: Endian) -> Result<(String, MatValue), WranglingError> {
    // Empty cells and struct fields are written as zero-length matrices.
    if data.is_empty() {
        return Ok((String::new(), MatValue::Numeric(NumericArray::empty())));
    }

    let mut cursor = Cursor::new(data, endian);

    let flags = cursor.next_element()?;
    if flags.data_type != MI_UINT32 || flags.data.len() < 8 {
        return Err(WranglingError::MatFormat(
            "matrix does not start with array flags".to_string(),
        ));
    }
    let flags = endian.u32(flags.data);
    let class = (flags & 0xFF) as u8;

    let dims = cursor.next_element()?;
    let dims = decode_numeric(dims.data_type, dims.data, endian)?
        .into_iter()
        .map(|d| {
            if d < 0.0 {
                Err(WranglingError::MatFormat(format!("negative dimension {}", d)))
            } else {
                Ok(d as usize)
            }
        })
        .collect::<Result<Vec<usize>, WranglingError>>()?;

    let name = cursor.next_element()?;
    let name = String::from_utf8_lossy(name.data).into_owned();

    let value = match class {
        MX_CELL => parse_cell(&mut cursor, dims)?,
        MX_STRUCT => parse_struct(&mut cursor, dims)?,
        MX_CHAR => parse_char(&mut cursor, dims)?,
        code => match NumericClass::from_code(code) {
            Some(numeric_class) => parse_numeric(&mut cursor, numeric_class, dims, flags)?,
            None => {
                log::debug!("Array '{}' has unsupported class {}", name, code);
                MatValue::Unsupported(code)
            }
        },
    };

    Ok((name, value))
}

fn parse_numeric(
    cursor: &mut Cursor,
    class: NumericClass,
    dims: Vec<usize>,
    flags: u32,
) -> Result<MatValue, WranglingError> {
    let expected = num_elements(&dims)?;

    let element = cursor.next_element()?;
    let real = decode_numeric(element.data_type, element.data, cursor.endian)?;
    if real.len() != expected {
        return Err(WranglingError::MatFormat(format!(
            "numeric array of dimensions {:?} holds {} values",
            dims,
            real.len()
        )));
    }

    let imag = if flags & FLAG_COMPLEX != 0 {
        let element = cursor.next_element()?;
        Some(decode_numeric(element.data_type, element.data, cursor.endian)?)
    } else {
        None
    };

    Ok(MatValue::Numeric(NumericArray {
        class,
        logical: flags & FLAG_LOGICAL != 0,
        dims,
        real,
        imag,
    }))
}

fn parse_char(cursor: &mut Cursor, dims: Vec<usize>) -> Result<MatValue, WranglingError> {
    let element = cursor.next_element()?;
    let chars: Vec<char> = decode_numeric(element.data_type, element.data, cursor.endian)?
        .into_iter()
        .map(|code| char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();

    let rows = dims.first().copied().unwrap_or(0);
    let expected = num_elements(&dims)?;
    if chars.len() != expected {
        return Err(WranglingError::MatFormat(format!(
            "char array of dimensions {:?} holds {} characters",
            dims,
            chars.len()
        )));
    }

    // Column-major storage, rebuilt row by row
    let cols = if rows == 0 { 0 } else { expected / rows };
    let text = (0..rows)
        .map(|r| (0..cols).map(|c| chars[c * rows + r]).collect::<String>())
        .collect::<Vec<String>>()
        .join("\n");

    Ok(MatValue::Char(CharArray { dims, text }))
}

fn parse_cell(cursor: &mut Cursor, dims: Vec<usize>) -> Result<MatValue, WranglingError> {
    let items = (0..num_elements(&dims)?)
        .map(|_| cursor.next_matrix())
        .collect::<Result<Vec<MatValue>, WranglingError>>()?;
    Ok(MatValue::Cell(CellArray { dims, items }))
}

fn parse_struct(cursor: &mut Cursor, dims: Vec<usize>) -> Result<MatValue, WranglingError> {
    let name_len = cursor.next_element()?;
    let name_len = decode_numeric(name_len.data_type, name_len.data, cursor.endian)?
        .first()
        .copied()
        .unwrap_or(0.0) as usize;

    let names = cursor.next_element()?;
    let fields: Vec<String> = if name_len == 0 {
        vec![]
    } else {
        names
            .data
            .chunks(name_len)
            .map(|chunk| {
                let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
                String::from_utf8_lossy(&chunk[..end]).into_owned()
            })
            .collect()
    };

    let num_values = num_elements(&dims)?
        .checked_mul(fields.len())
        .ok_or_else(|| {
            WranglingError::MatFormat(format!(
                "struct array of dimensions {:?} with {} fields overflows",
                dims,
                fields.len()
            ))
        })?;
    let values = (0..num_values)
        .map(|_| cursor.next_matrix())
        .collect::<Result<Vec<MatValue>, WranglingError>>()?;

    Ok(MatValue::Struct(StructArray {
        dims,
        fields,
        values,
    }))
}
