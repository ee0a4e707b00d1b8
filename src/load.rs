use crate::error::{PersistError, Result};
use crate::structs::{ColumnType, IfExists, PersistConfig, Table, Value};
use arrow_array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use csv::Writer;
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use serde::Serialize;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use std::{fs::File, path::Path, sync::Arc};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Writes the cleaned table into a SQLite database file.
///
/// The database file is created if it does not exist. The table gets one column per
/// table column and no index or primary key column.
///
/// # Arguments
/// * `table` - Cleaned table to persist
/// * `database_path` - Path of the SQLite database file
/// * `config` - Destination table name and what to do if it already exists
///
/// # Returns
/// Returns the number of rows written.
///
/// # Errors
/// Returns `PersistError::TableExists` if the table exists and `IfExists::Fail` is set,
/// or `PersistError::Sqlite` if the database cannot be opened or written.
pub fn save_data(
    table: &Table,
    database_path: &Path,
    config: &PersistConfig,
) -> std::result::Result<usize, PersistError> {
    let mut conn = Connection::open(database_path)?;
    debug!("Opened database {}", database_path.display());
    let name = quote_ident(&config.table);

    let tx = conn.transaction()?;
    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [&config.table],
        |row| row.get(0),
    )?;

    let create = match (exists, config.if_exists) {
        (true, IfExists::Fail) => return Err(PersistError::TableExists(config.table.clone())),
        (true, IfExists::Replace) => {
            debug!("Dropping existing table {}", config.table);
            tx.execute(&format!("DROP TABLE {}", name), [])?;
            true
        }
        (true, IfExists::Append) => false,
        (false, _) => true,
    };

    if create {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.kind.sql_name()))
            .collect();
        tx.execute(
            &format!("CREATE TABLE {} ({})", name, columns.join(", ")),
            [],
        )?;
    }

    {
        let column_list: Vec<String> = table.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let placeholders: Vec<String> = (1..=table.columns.len()).map(|i| format!("?{}", i)).collect();
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            name,
            column_list.join(", "),
            placeholders.join(", ")
        ))?;
        for row in &table.rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }
    }
    tx.commit()?;

    debug!("Inserted {} rows into {}", table.len(), config.table);
    Ok(table.len())
}

/// Writes the cleaned table to a CSV file. `Null` values are written as empty fields.
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_csv(table: &Table, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(table.columns.iter().map(|c| c.name.as_str()))?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }

    writer.flush()?;
    Ok(())
}

/// One table row serialized as a JSON object keyed by column name.
struct RowView<'a> {
    table: &'a Table,
    row: &'a [Value],
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.row.len()))?;
        for (column, value) in self.table.columns.iter().zip(self.row) {
            map.serialize_entry(&column.name, value)?;
        }
        map.end()
    }
}

/// Writes the cleaned table to a pretty-formatted JSON array of objects.
///
/// Object keys keep the table's column order.
pub fn write_json(table: &Table, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut ser = serde_json::Serializer::pretty(file);
    let mut seq = (&mut ser).serialize_seq(Some(table.len()))?;
    for row in &table.rows {
        seq.serialize_element(&RowView { table, row })?;
    }
    SerializeSeq::end(seq)?;
    Ok(())
}

/// Writes the cleaned table to a columnar Parquet file using Arrow format.
///
/// `Integer` columns become `Int64`, `Real` columns `Float64` and `Text` columns `Utf8`.
/// Every field is nullable.
///
/// # Errors
/// Returns error if file cannot be created, schema is invalid, or Arrow operations fail.
pub fn write_parquet(table: &Table, output_path: &Path) -> Result<()> {
    let schema = Arc::new(Schema::new(
        table
            .columns
            .iter()
            .map(|c| {
                let data_type = match c.kind {
                    ColumnType::Integer => DataType::Int64,
                    ColumnType::Real => DataType::Float64,
                    ColumnType::Text => DataType::Utf8,
                };
                Field::new(c.name.as_str(), data_type, true)
            })
            .collect::<Vec<_>>(),
    ));

    let arrays: Vec<ArrayRef> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let cells = table.rows.iter().map(|row| &row[i]);
            let array: ArrayRef = match c.kind {
                ColumnType::Integer => Arc::new(
                    cells
                        .map(|v| match v {
                            Value::Integer(n) => Some(*n),
                            _ => None,
                        })
                        .collect::<Int64Array>(),
                ),
                ColumnType::Real => Arc::new(
                    cells
                        .map(|v| match v {
                            Value::Real(n) => Some(*n),
                            Value::Integer(n) => Some(*n as f64),
                            _ => None,
                        })
                        .collect::<Float64Array>(),
                ),
                ColumnType::Text => Arc::new(
                    cells
                        .map(|v| match v {
                            Value::Null => None,
                            other => Some(other.to_string()),
                        })
                        .collect::<StringArray>(),
                ),
            };
            array
        })
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let file = File::create(output_path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Column;

    fn cleaned() -> Table {
        Table::new(
            vec![
                Column::new("id", ColumnType::Integer),
                Column::new("message", ColumnType::Text),
                Column::new("original", ColumnType::Text),
                Column::new("related", ColumnType::Integer),
            ],
            vec![
                vec![
                    Value::Integer(1),
                    Value::Text("Help".into()),
                    Value::Null,
                    Value::Integer(1),
                ],
                vec![
                    Value::Integer(2),
                    Value::Text("Water, please".into()),
                    Value::Text("De l'eau".into()),
                    Value::Integer(0),
                ],
            ],
        )
    }

    #[test]
    fn test_save_data_creates_table_without_index_column() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("DisasterResponse.db");
        let written = save_data(&cleaned(), &db, &PersistConfig::default()).unwrap();
        assert_eq!(written, 2);

        let conn = Connection::open(&db).unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info('DisasterMessages')")
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(names, vec!["id", "message", "original", "related"]);

        let original: Option<String> = conn
            .query_row(
                "SELECT original FROM DisasterMessages WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(original, None);
    }

    #[test]
    fn test_second_save_fails_with_table_exists() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("DisasterResponse.db");
        save_data(&cleaned(), &db, &PersistConfig::default()).unwrap();

        let err = save_data(&cleaned(), &db, &PersistConfig::default()).unwrap_err();
        assert!(matches!(err, PersistError::TableExists(ref t) if t == "DisasterMessages"));
    }

    #[test]
    fn test_replace_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("DisasterResponse.db");
        save_data(&cleaned(), &db, &PersistConfig::default()).unwrap();

        let append = PersistConfig {
            if_exists: IfExists::Append,
            ..PersistConfig::default()
        };
        save_data(&cleaned(), &db, &append).unwrap();
        let count = || -> i64 {
            Connection::open(&db)
                .unwrap()
                .query_row("SELECT COUNT(*) FROM DisasterMessages", [], |row| row.get(0))
                .unwrap()
        };
        assert_eq!(count(), 4);

        let replace = PersistConfig {
            if_exists: IfExists::Replace,
            ..PersistConfig::default()
        };
        save_data(&cleaned(), &db, &replace).unwrap();
        assert_eq!(count(), 2);
    }

    #[test]
    fn test_write_csv_renders_nulls_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&cleaned(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id,message,original,related");
        assert_eq!(lines[1], "1,Help,,1");
        assert_eq!(lines[2], "2,\"Water, please\",De l'eau,0");
    }

    #[test]
    fn test_write_json_keeps_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&cleaned(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let id_pos = content.find("\"id\"").unwrap();
        let related_pos = content.find("\"related\"").unwrap();
        assert!(id_pos < related_pos);

        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed[0]["original"], serde_json::Value::Null);
        assert_eq!(parsed[1]["message"], "Water, please");
        assert_eq!(parsed[1]["related"], 0);
    }

    #[test]
    fn test_write_parquet_round_trips_schema() {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        write_parquet(&cleaned(), &path).unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap()).unwrap();
        let schema = builder.schema().clone();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
        let rows: usize = builder.build().unwrap().map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 2);
    }
}
