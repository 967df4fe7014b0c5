use std::collections::HashMap;

use crate::classification::domain::result_table::{Column, ResultTable, TableError, Value};

pub const FACE_ID_COLUMN: &str = "faceid";
pub const AVG_SUFFIX: &str = "_avg";

/// Appends a `{col}_avg` column for each of `cols`: the mean of that column
/// over all rows sharing the row's `faceid`.
///
/// Rows are neither removed nor reordered. Rows without a face id, and
/// groups with no numeric value, get `Null`.
pub fn smooth_by_face_id(table: ResultTable, cols: &[&str]) -> Result<ResultTable, TableError> {
    let ids: Vec<Option<i64>> = table
        .column(FACE_ID_COLUMN)
        .ok_or_else(|| TableError::MissingColumn(FACE_ID_COLUMN.to_string()))?
        .values
        .iter()
        .map(Value::as_i64)
        .collect();

    let mut averaged = Vec::with_capacity(cols.len());
    for &name in cols {
        let column = table
            .column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;

        let mut sums: HashMap<i64, (f64, usize)> = HashMap::new();
        for (id, value) in ids.iter().zip(&column.values) {
            if let (Some(id), Some(v)) = (id, value.as_f64()) {
                let entry = sums.entry(*id).or_insert((0.0, 0));
                entry.0 += v;
                entry.1 += 1;
            }
        }

        let values = ids
            .iter()
            .map(|id| {
                id.and_then(|id| sums.get(&id))
                    .map_or(Value::Null, |(sum, n)| Value::Float(sum / *n as f64))
            })
            .collect();
        averaged.push(Column::new(format!("{name}{AVG_SUFFIX}"), values));
    }

    table.hstack(ResultTable::from_columns(averaged)?)
}
