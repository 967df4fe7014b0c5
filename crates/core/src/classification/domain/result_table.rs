use std::fmt;

use thiserror::Error;

use crate::shared::bbox::BoundingBox;
use crate::shared::frame_id::FrameId;

#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    #[error("column {column} has {got} rows, expected {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        got: usize,
    },
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
    #[error("column layouts differ: {expected:?} vs {got:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },
    #[error("no such column: {0}")]
    MissingColumn(String),
}

/// One cell of a [`ResultTable`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    BBox(BoundingBox),
    Null,
}

impl Value {
    /// Numeric view of `Int` and `Float` cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bbox(&self) -> Option<BoundingBox> {
        match self {
            Value::BBox(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::BBox(b) => write!(f, "{b}"),
            Value::Null => Ok(()),
        }
    }
}

impl From<FrameId> for Value {
    fn from(id: FrameId) -> Self {
        match id {
            FrameId::Index(i) => Value::Int(i as i64),
            FrameId::Path(p) => Value::Text(p),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Value::Null, Value::Float)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<BoundingBox> for Value {
    fn from(b: BoundingBox) -> Self {
        Value::BBox(b)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Column-oriented result table.
///
/// Every column holds the same number of rows and names are unique.
/// Tables are built by stacking partial tables side by side
/// ([`hstack`](Self::hstack)) or one under another ([`vstack`](Self::vstack)).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<Column>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-row table with the given column names.
    pub fn empty<I, S>(names: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_columns(
            names
                .into_iter()
                .map(|n| Column::new(n, Vec::new()))
                .collect(),
        )
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, TableError> {
        let mut table = Self::new();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn push_column(&mut self, column: Column) -> Result<(), TableError> {
        if self.column(&column.name).is_some() {
            return Err(TableError::DuplicateColumn(column.name));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(TableError::RowCountMismatch {
                    column: column.name,
                    expected: first.len(),
                    got: column.len(),
                });
            }
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|c| c.values.get(row))
    }

    /// Cells of one row, in column order.
    pub fn row(&self, row: usize) -> Option<Vec<&Value>> {
        self.columns.iter().map(|c| c.values.get(row)).collect()
    }

    /// Appends the columns of `other` to the right.
    pub fn hstack(mut self, other: ResultTable) -> Result<Self, TableError> {
        for column in other.columns {
            self.push_column(column)?;
        }
        Ok(self)
    }

    /// Concatenates tables with identical column layouts, in order.
    pub fn vstack(tables: Vec<ResultTable>) -> Result<Self, TableError> {
        let mut iter = tables.into_iter();
        let Some(mut acc) = iter.next() else {
            return Ok(Self::new());
        };
        for table in iter {
            if acc.column_names() != table.column_names() {
                return Err(TableError::SchemaMismatch {
                    expected: acc.column_names().iter().map(|s| s.to_string()).collect(),
                    got: table.column_names().iter().map(|s| s.to_string()).collect(),
                });
            }
            for (dst, src) in acc.columns.iter_mut().zip(table.columns) {
                dst.values.extend(src.values);
            }
        }
        Ok(acc)
    }
}
