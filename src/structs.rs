use log::{Level, Log, Metadata, Record as LogRecord};
use serde::Serialize;
use std::hash::{Hash, Hasher};

/// Name of the relation the cleaned messages are written to.
pub const DEFAULT_TABLE: &str = "DisasterMessages";
pub const JOIN_KEY: &str = "id";
pub const CATEGORY_COLUMN: &str = "categories";
pub const TOKEN_DELIMITER: char = ';';

/// Simple logger implementation
///
/// Warnings and errors go to stderr so they stay visible when stdout is redirected.
pub struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &LogRecord) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Error | Level::Warn => eprintln!("[{}] {}", record.level(), record.args()),
            _ => println!("[{}] {}", record.level(), record.args()),
        }
    }

    fn flush(&self) {}
}

/// A single cell of a [`Table`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Parses a raw CSV field as the given column type. Empty fields become `Null`.
    pub fn parse(raw: &str, kind: ColumnType) -> Value {
        if raw.is_empty() {
            return Value::Null;
        }
        match kind {
            ColumnType::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            ColumnType::Real => raw
                .parse::<f64>()
                .map(Value::Real)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            ColumnType::Text => Value::Text(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

// Reals compare by bit pattern so rows can be hashed; inferred reals are always finite.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Integer(v) => v.hash(state),
            Value::Real(v) => v.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

/// Storage class of a column, shared by the SQLite, CSV, JSON and Parquet writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    /// Infers the narrowest type that fits every non-empty field.
    pub fn infer<'a, I>(fields: I) -> ColumnType
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen_any = false;
        let mut all_int = true;
        let mut all_real = true;
        for field in fields.into_iter().filter(|f| !f.is_empty()) {
            seen_any = true;
            if all_int && field.parse::<i64>().is_err() {
                all_int = false;
            }
            if all_real && !field.parse::<f64>().is_ok_and(f64::is_finite) {
                all_real = false;
            }
            if !all_int && !all_real {
                break;
            }
        }
        match (seen_any, all_int, all_real) {
            (false, _, _) => ColumnType::Text,
            (true, true, _) => ColumnType::Integer,
            (true, false, true) => ColumnType::Real,
            _ => ColumnType::Text,
        }
    }

    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// In-memory table handed from one pipeline stage to the next.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns the value at `row` for the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What to do with category values other than 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ValuePolicy {
    #[default]
    Reject,
    Clamp,
    PassThrough,
}

/// How to treat a join key that occurs more than once within one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DuplicateIdPolicy {
    #[default]
    Reject,
    KeepFirst,
    CrossProduct,
}

/// Behaviour when the destination table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum IfExists {
    #[default]
    Fail,
    Replace,
    Append,
}

/// Configuration for reading and joining the two inputs
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub join_key: String,
    pub duplicate_ids: DuplicateIdPolicy,
}

/// Configuration for category expansion
#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub category_column: String,
    pub delimiter: char,
    pub value_policy: ValuePolicy,
}

/// Configuration for writing the relational store
#[derive(Debug, Clone)]
pub struct PersistConfig {
    pub table: String,
    pub if_exists: IfExists,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            join_key: JOIN_KEY.to_string(),
            duplicate_ids: DuplicateIdPolicy::default(),
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            category_column: CATEGORY_COLUMN.to_string(),
            delimiter: TOKEN_DELIMITER,
            value_policy: ValuePolicy::default(),
        }
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            if_exists: IfExists::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_column_types() {
        assert_eq!(ColumnType::infer(["1", "2", ""]), ColumnType::Integer);
        assert_eq!(ColumnType::infer(["1", "2.5"]), ColumnType::Real);
        assert_eq!(ColumnType::infer(["1", "news"]), ColumnType::Text);
        assert_eq!(ColumnType::infer(["NaN"]), ColumnType::Text);
        assert_eq!(ColumnType::infer(["", ""]), ColumnType::Text);
    }

    #[test]
    fn test_parse_empty_field_is_null() {
        assert!(Value::parse("", ColumnType::Integer).is_null());
        assert_eq!(Value::parse("7", ColumnType::Integer), Value::Integer(7));
        assert_eq!(
            Value::parse("direct", ColumnType::Text),
            Value::Text("direct".into())
        );
    }

    #[test]
    fn test_real_values_hash_consistently() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(vec![Value::Real(0.5), Value::Null]);
        assert!(set.contains(&vec![Value::Real(0.5), Value::Null]));
        assert_ne!(Value::Integer(1), Value::Real(1.0));
    }

    #[test]
    fn test_table_lookup_by_column_name() {
        let table = Table::new(
            vec![
                Column::new("id", ColumnType::Integer),
                Column::new("message", ColumnType::Text),
            ],
            vec![vec![Value::Integer(1), Value::Text("Help".into())]],
        );
        assert_eq!(table.get(0, "message"), Some(&Value::Text("Help".into())));
        assert_eq!(table.get(0, "genre"), None);
        assert_eq!(table.column_names(), vec!["id", "message"]);
    }
}
