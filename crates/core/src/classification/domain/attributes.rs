use crate::classification::domain::result_table::{Column, ResultTable, TableError, Value};
use crate::classification::domain::smoothing::{smooth_by_face_id, AVG_SUFFIX};

pub const SEX_DECFUNC: &str = "sex_decfunc";
pub const AGE_DECFUNC: &str = "age_decfunc";
pub const SEX_LABEL: &str = "sex_label";
pub const AGE_LABEL: &str = "age_label";

/// Columns produced for every face, in order.
pub const ATTRIBUTE_COLUMNS: [&str; 4] = [SEX_DECFUNC, AGE_DECFUNC, SEX_LABEL, AGE_LABEL];

/// `"m"` for a positive decision value, `"f"` otherwise.
pub fn sex_label(decfunc: f64) -> &'static str {
    if decfunc > 0.0 {
        "m"
    } else {
        "f"
    }
}

/// Apparent age in years; the model predicts age in decades offset by half
/// a decade.
pub fn age_label(decfunc: f64) -> f64 {
    decfunc * 10.0 - 5.0
}

/// Builds the attribute table for one batch of raw model outputs.
pub fn attribute_table(sex: &[f64], age: &[f64]) -> Result<ResultTable, TableError> {
    ResultTable::from_columns(vec![
        Column::new(SEX_DECFUNC, sex.iter().map(|&v| Value::Float(v)).collect()),
        Column::new(AGE_DECFUNC, age.iter().map(|&v| Value::Float(v)).collect()),
        Column::new(SEX_LABEL, sex.iter().map(|&v| Value::from(sex_label(v))).collect()),
        Column::new(AGE_LABEL, age.iter().map(|&v| Value::Float(age_label(v))).collect()),
    ])
}

/// Smooths both decision values per face id and derives labels from the
/// averages (`sex_label_avg`, `age_label_avg`).
pub fn average_attributes(table: ResultTable) -> Result<ResultTable, TableError> {
    let table = smooth_by_face_id(table, &[SEX_DECFUNC, AGE_DECFUNC])?;

    let sex_avg = format!("{SEX_DECFUNC}{AVG_SUFFIX}");
    let age_avg = format!("{AGE_DECFUNC}{AVG_SUFFIX}");
    let derive = |name: &str, f: &dyn Fn(f64) -> Value| -> Result<Vec<Value>, TableError> {
        let column = table
            .column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        Ok(column
            .values
            .iter()
            .map(|v| v.as_f64().map_or(Value::Null, f))
            .collect())
    };
    let sex_labels = derive(&sex_avg, &|v| Value::from(sex_label(v)))?;
    let age_labels = derive(&age_avg, &|v| Value::Float(age_label(v)))?;

    table.hstack(ResultTable::from_columns(vec![
        Column::new(format!("{SEX_LABEL}{AVG_SUFFIX}"), sex_labels),
        Column::new(format!("{AGE_LABEL}{AVG_SUFFIX}"), age_labels),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::smoothing::FACE_ID_COLUMN;
    use approx::assert_relative_eq;

    #[test]
    fn test_sex_label_threshold() {
        assert_eq!(sex_label(0.3), "m");
        assert_eq!(sex_label(0.0), "f");
        assert_eq!(sex_label(-2.0), "f");
    }

    #[test]
    fn test_age_label_from_decades() {
        assert_relative_eq!(age_label(3.5), 30.0);
        assert_relative_eq!(age_label(0.5), 0.0);
    }

    #[test]
    fn test_attribute_table_layout() {
        let t = attribute_table(&[1.0, -1.0], &[3.0, 4.0]).unwrap();
        assert_eq!(t.column_names(), ATTRIBUTE_COLUMNS.to_vec());
        assert_eq!(t.get(0, SEX_LABEL), Some(&Value::Text("m".into())));
        assert_eq!(t.get(1, SEX_LABEL), Some(&Value::Text("f".into())));
        assert_eq!(t.get(1, AGE_LABEL), Some(&Value::Float(35.0)));
    }

    #[test]
    fn test_attribute_table_length_mismatch() {
        assert!(attribute_table(&[1.0], &[]).is_err());
    }

    #[test]
    fn test_average_recomputes_labels() {
        let base = attribute_table(&[1.0, -3.0, 0.5], &[2.0, 4.0, 3.0]).unwrap();
        let ids = Column::new(
            FACE_ID_COLUMN,
            vec![Value::Int(0), Value::Int(0), Value::Int(1)],
        );
        let table = ResultTable::from_columns(vec![ids]).unwrap().hstack(base).unwrap();

        let avg = average_attributes(table).unwrap();

        assert_eq!(avg.get(0, "sex_decfunc_avg"), Some(&Value::Float(-1.0)));
        assert_eq!(avg.get(0, "sex_label_avg"), Some(&Value::Text("f".into())));
        assert_eq!(avg.get(0, "sex_label"), Some(&Value::Text("m".into())));
        assert_eq!(avg.get(1, "age_label_avg"), Some(&Value::Float(25.0)));
        assert_eq!(avg.get(2, "sex_label_avg"), Some(&Value::Text("m".into())));
        assert_eq!(avg.num_columns(), 1 + 4 + 2 + 2);
    }
}
