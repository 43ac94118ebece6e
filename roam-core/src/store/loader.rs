use std::path::Path;

use rusqlite::types::Value;

use super::schema::{value_floor, ColumnSchema, ColumnType, TableSchema};
use super::{StoreError, StoreResult};

/// One source record coerced into schema column order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SourceRow {
    pub line: u64,
    pub values: Vec<Value>,
}

pub(crate) fn read_table(table: &TableSchema, path: &Path) -> StoreResult<Vec<SourceRow>> {
    let source_error = |source: csv::Error| StoreError::SourceFile {
        table: table.table_name.clone(),
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(source_error)?;

    let headers = reader.headers().map_err(source_error)?.clone();
    let positions = table
        .columns
        .iter()
        .map(|column| {
            let position = headers.iter().position(|name| name == column.column_name);
            match position {
                Some(idx) => Ok(Some(idx)),
                None if column.accepts_null() => Ok(None),
                None => Err(StoreError::MissingColumn {
                    table: table.table_name.clone(),
                    column: column.column_name.clone(),
                }),
            }
        })
        .collect::<StoreResult<Vec<_>>>()?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(source_error)?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let mut values = Vec::with_capacity(table.columns.len());
        for (column, position) in table.columns.iter().zip(&positions) {
            let raw = position.and_then(|idx| record.get(idx)).unwrap_or("");
            let value = coerce(table, line, column, raw)?;
            check_floor(table, line, column, raw, &value)?;
            values.push(value);
        }
        rows.push(SourceRow { line, values });
    }
    Ok(rows)
}

fn coerce(table: &TableSchema, line: u64, column: &ColumnSchema, raw: &str) -> StoreResult<Value> {
    if raw.is_empty() {
        if column.accepts_null() {
            return Ok(Value::Null);
        }
        return Err(StoreError::NullValue {
            table: table.table_name.clone(),
            line,
            column: column.column_name.clone(),
        });
    }

    let mismatch = || StoreError::Coercion {
        table: table.table_name.clone(),
        line,
        column: column.column_name.clone(),
        value: raw.to_string(),
        expected: column.data_type.expected(),
    };

    match column.data_type {
        ColumnType::Integer => raw.parse::<i64>().map(Value::Integer).map_err(|_| mismatch()),
        ColumnType::Real => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Value::Real(value)),
            _ => Err(mismatch()),
        },
        ColumnType::Text => Ok(Value::Text(raw.to_string())),
    }
}

fn check_floor(
    table: &TableSchema,
    line: u64,
    column: &ColumnSchema,
    raw: &str,
    value: &Value,
) -> StoreResult<()> {
    let minimum = match value_floor(&table.table_name, &column.column_name) {
        Some(minimum) => minimum,
        None => return Ok(()),
    };
    let number = match value {
        Value::Integer(v) => *v as f64,
        Value::Real(v) => *v,
        _ => return Ok(()),
    };
    if number < minimum {
        return Err(StoreError::InvalidValue {
            table: table.table_name.clone(),
            line,
            column: column.column_name.clone(),
            value: raw.to_string(),
            minimum,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::tests::roaming_tables;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn rows_follow_schema_order_not_header_order() {
        let dir = tempfile::tempdir().unwrap();
        let tables = roaming_tables();
        let path = write(
            dir.path(),
            "plans.csv",
            "price_sgd,data_gb,duration_days,zone\n2.00,1.9,2,1\n",
        );
        let rows = read_table(&tables[1], &path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);
        assert_eq!(
            rows[0].values,
            vec![
                Value::Null,
                Value::Integer(1),
                Value::Integer(2),
                Value::Real(1.9),
                Value::Real(2.0),
            ]
        );
    }

    #[test]
    fn quoted_text_and_whitespace_are_handled() {
        let dir = tempfile::tempdir().unwrap();
        let tables = roaming_tables();
        let path = write(
            dir.path(),
            "destinations.csv",
            "country, zone\n\"Korea, Republic of\", 2\n",
        );
        let rows = read_table(&tables[0], &path).unwrap();
        assert_eq!(
            rows[0].values,
            vec![Value::Text("Korea, Republic of".into()), Value::Integer(2)]
        );
    }

    #[test]
    fn type_coercion_failure_reports_line_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let tables = roaming_tables();
        let path = write(
            dir.path(),
            "plans.csv",
            "zone,duration_days,data_gb,price_sgd\n1,1,1.0,1.5\n1,two,1.9,2.0\n",
        );
        match read_table(&tables[1], &path).unwrap_err() {
            StoreError::Coercion {
                line,
                column,
                value,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "duration_days");
                assert_eq!(value, "two");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_required_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tables = roaming_tables();
        let path = write(dir.path(), "destinations.csv", "country,zone\nMalaysia,\n");
        assert!(matches!(
            read_table(&tables[0], &path),
            Err(StoreError::NullValue { .. })
        ));
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tables = roaming_tables();
        let path = write(dir.path(), "rates.csv", "zone,rate_per_sms\n1,0.1\n");
        match read_table(&tables[2], &path).unwrap_err() {
            StoreError::MissingColumn { column, .. } => {
                assert_eq!(column, "rate_data_per_10kb")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let tables = roaming_tables();
        let err = read_table(&tables[0], &dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, StoreError::SourceFile { .. }));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tables = roaming_tables();
        let path = write(
            dir.path(),
            "plans.csv",
            "zone,duration_days,data_gb,price_sgd\n1,1,NaN,1.5\n",
        );
        assert!(matches!(
            read_table(&tables[1], &path),
            Err(StoreError::Coercion { .. })
        ));
    }

    #[test]
    fn values_below_their_floor_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tables = roaming_tables();
        let path = write(
            dir.path(),
            "plans.csv",
            "zone,duration_days,data_gb,price_sgd\n1,3,3.0,3.0\n1,0,1.0,1.0\n",
        );
        match read_table(&tables[1], &path).unwrap_err() {
            StoreError::InvalidValue {
                line,
                column,
                minimum,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "duration_days");
                assert_eq!(minimum, 1.0);
            }
            other => panic!("unexpected error: {other}"),
        }

        let path = write(
            dir.path(),
            "rates.csv",
            "zone,rate_data_per_10kb,rate_calls_outgoing_per_min,rate_calls_incoming_per_min,rate_per_sms\n1,0.01,-0.29,0.00,0.10\n",
        );
        assert!(matches!(
            read_table(&tables[2], &path),
            Err(StoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn zero_allowance_and_price_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let tables = roaming_tables();
        let path = write(
            dir.path(),
            "plans.csv",
            "zone,duration_days,data_gb,price_sgd\n1,1,0.0,0.00\n",
        );
        assert_eq!(read_table(&tables[1], &path).unwrap().len(), 1);
    }
}
