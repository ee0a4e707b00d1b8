use arrow_schema::ArrowError;
use std::path::PathBuf;

/// Failures while reading or joining the input tables.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{table} table has no '{column}' column")]
    MissingColumn { table: String, column: String },
    #[error("{table} table contains join key {key} more than once")]
    DuplicateKey { table: String, key: String },
}

/// Failures while expanding the category column.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Column not found: {0}")]
    MissingColumn(String),
    #[error("No rows to derive the category schema from")]
    EmptyInput,
    #[error("Row {row} has no category string")]
    MissingCategories { row: usize },
    #[error("Row {row}: malformed category token '{token}'")]
    MalformedToken { row: usize, token: String },
    #[error("Row {row}: expected {expected} category tokens, found {found}")]
    TokenCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Row {row}: expected label '{expected}' at position {position}, found '{found}'")]
    LabelMismatch {
        row: usize,
        position: usize,
        expected: String,
        found: String,
    },
    #[error("Row {row}: category '{label}' has non-binary value {value}")]
    NonBinaryValue { row: usize, label: String, value: i64 },
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),
}

/// Failures while writing the relational store.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Table '{0}' already exists")]
    TableExists(String),
    #[error("SQLite Error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Load Error: {0}")]
    Load(#[from] LoadError),
    #[error("Transform Error: {0}")]
    Transform(#[from] TransformError),
    #[error("Persist Error: {0}")]
    Persist(#[from] PersistError),
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet Error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow Error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Logger Error: {0}")]
    Logger(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_errors_convert_into_pipeline_error() {
        let err: PipelineError = TransformError::EmptyInput.into();
        assert!(matches!(err, PipelineError::Transform(_)));

        let err: PipelineError = PersistError::TableExists("DisasterMessages".into()).into();
        assert!(err.to_string().contains("DisasterMessages"));
    }

    #[test]
    fn test_logger_error_keeps_message() {
        let err = PipelineError::Logger("logger already installed".into());
        assert_eq!(err.to_string(), "Logger Error: logger already installed");
    }

    #[test]
    fn test_mismatch_message_names_row_and_counts() {
        let err = TransformError::TokenCountMismatch {
            row: 3,
            expected: 36,
            found: 35,
        };
        let msg = err.to_string();
        assert!(msg.contains("Row 3"));
        assert!(msg.contains("36"));
        assert!(msg.contains("35"));
    }
}
