use crate::error::TransformError;
use crate::structs::{Column, ColumnType, Table, TransformConfig, Value, ValuePolicy};
use log::debug;
use std::collections::HashSet;

type TransformResult<T> = std::result::Result<T, TransformError>;

/// Expands the category column into one integer column per label and removes
/// exact duplicate rows.
///
/// # Arguments
///
/// * `table` - Joined table holding the raw category string column
/// * `config` - Category column name, token delimiter and value policy
///
/// # Returns
///
/// Returns the cleaned table: every non-category column in its original order,
/// followed by one `Integer` column per category label in token order.
///
/// # Errors
///
/// Returns `TransformError` if:
/// - The table is empty or has no category column
/// - A token is not of the form `<label>-<digit>`
/// - A row's labels differ in count or order from the first row's
/// - A value other than 0/1 is found under `ValuePolicy::Reject`
pub fn clean_data(table: Table, config: &TransformConfig) -> TransformResult<Table> {
    let expanded = expand_categories(table, config)?;
    let before = expanded.len();
    let cleaned = drop_duplicates(expanded);
    debug!("Removed {} duplicate rows", before - cleaned.len());
    Ok(cleaned)
}

/// Ordered category labels derived from a sample category string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySchema {
    labels: Vec<String>,
}

impl CategorySchema {
    /// Derives the labels from the first row's category string.
    pub fn from_first_row(raw: &str, delimiter: char) -> TransformResult<Self> {
        let labels = raw
            .split(delimiter)
            .map(|token| parse_token(token, 0).map(|(label, _)| label.to_string()))
            .collect::<TransformResult<Vec<_>>>()?;

        let mut seen = HashSet::new();
        if let Some(dup) = labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(TransformError::DuplicateColumn(dup.clone()));
        }
        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Parses one row's category string, checking it against the schema.
    pub fn parse_row(
        &self,
        row: usize,
        raw: &str,
        delimiter: char,
        policy: ValuePolicy,
    ) -> TransformResult<Vec<Value>> {
        let tokens: Vec<&str> = raw.split(delimiter).collect();
        if tokens.len() != self.labels.len() {
            return Err(TransformError::TokenCountMismatch {
                row,
                expected: self.labels.len(),
                found: tokens.len(),
            });
        }

        tokens
            .into_iter()
            .zip(&self.labels)
            .enumerate()
            .map(|(position, (token, expected))| {
                let (label, value) = parse_token(token, row)?;
                if label != expected {
                    return Err(TransformError::LabelMismatch {
                        row,
                        position,
                        expected: expected.clone(),
                        found: label.to_string(),
                    });
                }
                apply_policy(row, label, value, policy).map(Value::Integer)
            })
            .collect()
    }
}

/// Splits a `<label>-<digit>` token into its label and value.
pub fn parse_token(token: &str, row: usize) -> TransformResult<(&str, i64)> {
    let malformed = || TransformError::MalformedToken {
        row,
        token: token.to_string(),
    };
    let (label, digit) = token.rsplit_once('-').ok_or_else(malformed)?;
    let mut chars = digit.chars();
    let value = match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_digit(10).ok_or_else(malformed)?,
        _ => return Err(malformed()),
    };
    if label.is_empty() {
        return Err(malformed());
    }
    Ok((label, i64::from(value)))
}

fn apply_policy(row: usize, label: &str, value: i64, policy: ValuePolicy) -> TransformResult<i64> {
    match policy {
        ValuePolicy::Reject if value > 1 => Err(TransformError::NonBinaryValue {
            row,
            label: label.to_string(),
            value,
        }),
        ValuePolicy::Clamp => Ok(value.min(1)),
        _ => Ok(value),
    }
}

/// Replaces the category column with one integer column per label.
pub fn expand_categories(table: Table, config: &TransformConfig) -> TransformResult<Table> {
    let cat_idx = table
        .column_index(&config.category_column)
        .ok_or_else(|| TransformError::MissingColumn(config.category_column.clone()))?;
    let first = table.rows.first().ok_or(TransformError::EmptyInput)?;
    let first_raw = first[cat_idx]
        .as_str()
        .ok_or(TransformError::MissingCategories { row: 0 })?;

    let schema = CategorySchema::from_first_row(first_raw, config.delimiter)?;
    debug!(
        "Derived {} category labels: {:?}",
        schema.labels().len(),
        schema.labels()
    );

    let mut columns: Vec<Column> = table
        .columns
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != cat_idx)
        .map(|(_, c)| c.clone())
        .collect();
    for label in schema.labels() {
        if columns.iter().any(|c| &c.name == label) {
            return Err(TransformError::DuplicateColumn(label.clone()));
        }
        columns.push(Column::new(label.clone(), ColumnType::Integer));
    }

    let rows = table
        .rows
        .into_iter()
        .enumerate()
        .map(|(i, mut row)| {
            let raw = row.remove(cat_idx);
            let raw = raw
                .as_str()
                .ok_or(TransformError::MissingCategories { row: i })?;
            row.extend(schema.parse_row(i, raw, config.delimiter, config.value_policy)?);
            Ok(row)
        })
        .collect::<TransformResult<Vec<_>>>()?;

    Ok(Table::new(columns, rows))
}

/// Removes rows equal in every column to an earlier row, keeping the first occurrence.
pub fn drop_duplicates(table: Table) -> Table {
    let keep: Vec<bool> = {
        let mut seen: HashSet<&[Value]> = HashSet::with_capacity(table.len());
        table.rows.iter().map(|row| seen.insert(row.as_slice())).collect()
    };
    let rows = table
        .rows
        .into_iter()
        .zip(keep)
        .filter_map(|(row, first)| first.then_some(row))
        .collect();
    Table::new(table.columns, rows)
}
