use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::classification::domain::result_table::{ResultTable, Value};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    /// Guesses the format from a file extension, defaulting to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Csv,
        }
    }
}

/// Writes the table to `output_path`, one record per row.
pub fn export_table(table: &ResultTable, output_path: &Path, format: ExportFormat) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: output_path.display().to_string(),
        source,
    };
    let file = File::create(output_path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    match format {
        ExportFormat::Csv => write_csv(table, &mut out)?,
        ExportFormat::Json => write_json(table, &mut out)?,
    }
    out.flush().map_err(io_err)?;
    log::info!(
        "Wrote {} rows to {} ({})",
        table.num_rows(),
        output_path.display(),
        format.extension()
    );
    Ok(())
}

/// Header line with the column names, then one line per row. Boxes are
/// rendered as `(x1, y1, x2, y2)` and missing values as empty fields.
pub fn write_csv<W: Write>(table: &ResultTable, writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.column_names())?;
    for row in 0..table.num_rows() {
        wtr.write_record(table.columns().iter().map(|c| c.values[row].to_string()))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Pretty-printed array of objects, keys in column order.
pub fn write_json<W: Write>(table: &ResultTable, writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, &Rows(table))?;
    Ok(())
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(s) => serializer.serialize_str(s),
            Value::BBox(b) => serializer.collect_str(b),
            Value::Null => serializer.serialize_unit(),
        }
    }
}

struct Rows<'a>(&'a ResultTable);

struct Row<'a> {
    table: &'a ResultTable,
    index: usize,
}

impl Serialize for Rows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.num_rows()))?;
        for index in 0..self.0.num_rows() {
            seq.serialize_element(&Row {
                table: self.0,
                index,
            })?;
        }
        seq.end()
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.table.num_columns()))?;
        for column in self.table.columns() {
            map.serialize_entry(&column.name, &column.values[self.index])?;
        }
        map.end()
    }
}
