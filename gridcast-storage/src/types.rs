//! Semantic column types and column declarations.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field};

/// Semantic type of a loaded column.
///
/// Source files may use any integer or float width; the loader casts every
/// declared column to the canonical Arrow type returned by
/// [`ColumnType::data_type`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 64-bit signed integer (identifiers, grid coordinates).
    Int64,
    /// 32-bit float scalar.
    Float32,
    /// Variable-length sequence of 32-bit floats (per-row sample lists).
    Float32List,
}

impl ColumnType {
    /// Canonical Arrow type for this semantic type.
    pub fn data_type(self) -> DataType {
        match self {
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Float32List => {
                DataType::List(Arc::new(Field::new("item", DataType::Float32, true)))
            }
        }
    }

    /// Classify an Arrow type, returning `None` for types outside the model.
    pub fn classify(data_type: &DataType) -> Option<Self> {
        match data_type {
            dt if dt.is_integer() => Some(ColumnType::Int64),
            dt if dt.is_floating() => Some(ColumnType::Float32),
            DataType::List(item) | DataType::LargeList(item)
                if item.data_type().is_floating() =>
            {
                Some(ColumnType::Float32List)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int64 => write!(f, "int64"),
            ColumnType::Float32 => write!(f, "float32"),
            ColumnType::Float32List => write!(f, "list<float32>"),
        }
    }
}

/// A column the loader must read from a source table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int64)
    }

    pub fn float32(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float32)
    }

    pub fn float32_list(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float32List)
    }

    /// Arrow field for the canonical form of this column. Always nullable.
    pub fn field(&self) -> Field {
        Field::new(&self.name, self.column_type.data_type(), true)
    }
}
