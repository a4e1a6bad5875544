//! In-memory representation of MATLAB arrays.

/// The storage class of a numeric MATLAB array.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum NumericClass {
    Double,
    Single,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
}

impl NumericClass {
    /// Returns the numeric class for a MATLAB array class code, if any.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            6 => Some(NumericClass::Double),
            7 => Some(NumericClass::Single),
            8 => Some(NumericClass::Int8),
            9 => Some(NumericClass::UInt8),
            10 => Some(NumericClass::Int16),
            11 => Some(NumericClass::UInt16),
            12 => Some(NumericClass::Int32),
            13 => Some(NumericClass::UInt32),
            14 => Some(NumericClass::Int64),
            15 => Some(NumericClass::UInt64),
            _ => None,
        }
    }
}

/// A numeric (or logical) array, widened to `f64` and stored in column-major order.
#[derive(Debug, PartialEq, Clone)]
pub struct NumericArray {
    pub class: NumericClass,
    pub logical: bool,
    pub dims: Vec<usize>,
    pub real: Vec<f64>,
    pub imag: Option<Vec<f64>>,
}

impl NumericArray {
    /// An empty `0x0` double array, as stored for empty cells and struct fields.
    pub fn empty() -> Self {
        NumericArray {
            class: NumericClass::Double,
            logical: false,
            dims: vec![0, 0],
            real: vec![],
            imag: None,
        }
    }

    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }

    /// Number of rows (first dimension).
    pub fn rows(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    /// Number of columns, with all trailing dimensions folded in.
    pub fn cols(&self) -> usize {
        if self.dims.len() < 2 {
            return 1;
        }
        self.dims.iter().skip(1).product()
    }

    /// Returns the values of the given column, or `None` if out of bounds.
    pub fn column(&self, col: usize) -> Option<&[f64]> {
        let rows = self.rows();
        if col >= self.cols() {
            return None;
        }
        self.real.get(col * rows..(col + 1) * rows)
    }

    /// Returns the element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows() {
            return None;
        }
        self.column(col).and_then(|c| c.get(row).copied())
    }

    /// Whether the array has at most one non-singleton dimension.
    pub fn is_vector(&self) -> bool {
        self.dims.iter().filter(|&&d| d > 1).count() <= 1
    }
}

/// A character array. Rows of a multi-row char matrix are joined with `'\n'`.
#[derive(Debug, PartialEq, Clone)]
pub struct CharArray {
    pub dims: Vec<usize>,
    pub text: String,
}

/// A cell array, with items in column-major order.
#[derive(Debug, PartialEq, Clone)]
pub struct CellArray {
    pub dims: Vec<usize>,
    pub items: Vec<MatValue>,
}

/// A struct array. Values are stored element by element, each element holding one value per field.
#[derive(Debug, PartialEq, Clone)]
pub struct StructArray {
    pub dims: Vec<usize>,
    pub fields: Vec<String>,
    pub values: Vec<MatValue>,
}

impl StructArray {
    /// Number of struct elements.
    pub fn len(&self) -> usize {
        if self.fields.is_empty() {
            self.dims.iter().product()
        } else {
            self.values.len() / self.fields.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of a field, by name.
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Returns the value of the field at `position` for the element `index`.
    pub fn field_at(&self, index: usize, position: usize) -> Option<&MatValue> {
        if position >= self.fields.len() {
            return None;
        }
        self.values.get(index * self.fields.len() + position)
    }

    /// Returns the value of the named field for the element `index`.
    pub fn field(&self, index: usize, name: &str) -> Option<&MatValue> {
        self.field_position(name)
            .and_then(|position| self.field_at(index, position))
    }
}

/// A MATLAB array of any supported class.
#[derive(Debug, PartialEq, Clone)]
pub enum MatValue {
    Numeric(NumericArray),
    Char(CharArray),
    Cell(CellArray),
    Struct(StructArray),
    /// Sparse, object or function handle arrays, kept by class code only.
    Unsupported(u8),
}

impl MatValue {
    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            MatValue::Numeric(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<&CharArray> {
        match self {
            MatValue::Char(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&CellArray> {
        match self {
            MatValue::Cell(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructArray> {
        match self {
            MatValue::Struct(array) => Some(array),
            _ => None,
        }
    }

    /// Short name of the array class, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            MatValue::Numeric(_) => "numeric",
            MatValue::Char(_) => "char",
            MatValue::Cell(_) => "cell",
            MatValue::Struct(_) => "struct",
            MatValue::Unsupported(_) => "unsupported",
        }
    }
}
