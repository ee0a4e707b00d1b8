use crate::error::LoadError;
use crate::structs::{Column, ColumnType, DuplicateIdPolicy, LoadConfig, Table, Value};
use csv::{ReaderBuilder, StringRecord};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::{fs::File, io::Read, path::Path};

type LoadResult<T> = std::result::Result<T, LoadError>;

/// Reads both input files and joins them on the configured key.
///
/// # Arguments
/// * `messages_path` - CSV file containing the messages (left side of the join)
/// * `categories_path` - CSV file containing the raw category strings (right side)
/// * `config` - Join key and duplicate identifier policy
///
/// # Errors
/// Returns `LoadError` if either file cannot be read or parsed, if the join key
/// column is missing, or if a key repeats under `DuplicateIdPolicy::Reject`.
pub fn load_data(
    messages_path: &Path,
    categories_path: &Path,
    config: &LoadConfig,
) -> LoadResult<Table> {
    let messages = read_table(messages_path)?;
    debug!(
        "Read {} messages with columns {:?}",
        messages.len(),
        messages.column_names()
    );
    let categories = read_table(categories_path)?;
    debug!("Read {} category rows", categories.len());

    merge(&messages, &categories, config)
}

/// Reads a CSV file into a typed [`Table`], tagging failures with the file path.
pub fn read_table(path: &Path) -> LoadResult<Table> {
    let file = File::open(path).map_err(|e| LoadError::Read {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })?;
    read_csv(file).map_err(|e| match e {
        LoadError::Csv(source) => LoadError::Read {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Parses comma-separated text with a header row.
///
/// Column types are inferred from the whole column once every record has been
/// read; empty fields become `Value::Null`.
pub fn read_csv<R: Read>(reader: R) -> LoadResult<Table> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let records = reader
        .records()
        .collect::<Result<Vec<StringRecord>, csv::Error>>()?;

    let columns: Vec<Column> = headers
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let kind = ColumnType::infer(records.iter().map(|r| r.get(i).unwrap_or("")));
            Column::new(name, kind)
        })
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .enumerate()
                .map(|(i, col)| Value::parse(record.get(i).unwrap_or(""), col.kind))
                .collect()
        })
        .collect();

    Ok(Table::new(columns, rows))
}

/// Inner-joins `left` and `right` on `config.join_key`.
///
/// Output columns are every left column followed by every right column except the
/// key. Non-key names present on both sides are suffixed `_x` and `_y`. Rows follow
/// the left table's order; `Null` keys never match.
pub fn merge(left: &Table, right: &Table, config: &LoadConfig) -> LoadResult<Table> {
    let key = config.join_key.as_str();
    let left_key = key_index(left, "messages", key)?;
    let right_key = key_index(right, "categories", key)?;

    let left_rows = apply_duplicate_policy(left, left_key, "messages", config.duplicate_ids)?;
    let right_rows = apply_duplicate_policy(right, right_key, "categories", config.duplicate_ids)?;

    let right_keep: Vec<usize> = (0..right.columns.len())
        .filter(|&i| i != right_key)
        .collect();
    let columns = joined_columns(left, right, left_key, &right_keep);

    let mut lookup: HashMap<&Value, Vec<usize>> = HashMap::new();
    for &r in &right_rows {
        let value = &right.rows[r][right_key];
        if !value.is_null() {
            lookup.entry(value).or_default().push(r);
        }
    }

    let mut rows = Vec::new();
    for &l in &left_rows {
        let left_row = &left.rows[l];
        let Some(matches) = lookup.get(&left_row[left_key]) else {
            continue;
        };
        for &r in matches {
            let mut row = left_row.clone();
            row.extend(right_keep.iter().map(|&i| right.rows[r][i].clone()));
            rows.push(row);
        }
    }

    debug!(
        "Joined {} x {} rows on '{}' into {} rows",
        left.len(),
        right.len(),
        key,
        rows.len()
    );
    Ok(Table::new(columns, rows))
}

fn key_index(table: &Table, name: &str, key: &str) -> LoadResult<usize> {
    table
        .column_index(key)
        .ok_or_else(|| LoadError::MissingColumn {
            table: name.to_string(),
            column: key.to_string(),
        })
}

/// Returns the indices of the rows that take part in the join.
fn apply_duplicate_policy(
    table: &Table,
    key: usize,
    name: &str,
    policy: DuplicateIdPolicy,
) -> LoadResult<Vec<usize>> {
    if policy == DuplicateIdPolicy::CrossProduct {
        return Ok((0..table.len()).collect());
    }

    let mut seen: HashSet<&Value> = HashSet::new();
    let mut kept = Vec::with_capacity(table.len());
    for (i, row) in table.rows.iter().enumerate() {
        let value = &row[key];
        if value.is_null() || seen.insert(value) {
            kept.push(i);
            continue;
        }
        match policy {
            DuplicateIdPolicy::Reject => {
                return Err(LoadError::DuplicateKey {
                    table: name.to_string(),
                    key: value.to_string(),
                });
            }
            _ => debug!("Dropping repeated {} key {}", name, value),
        }
    }
    Ok(kept)
}

fn joined_columns(
    left: &Table,
    right: &Table,
    left_key: usize,
    right_keep: &[usize],
) -> Vec<Column> {
    let left_names: HashSet<&str> = left
        .columns
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != left_key)
        .map(|(_, c)| c.name.as_str())
        .collect();
    let right_names: HashSet<&str> = right_keep
        .iter()
        .map(|&i| right.columns[i].name.as_str())
        .collect();

    let mut columns: Vec<Column> = left
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i != left_key && right_names.contains(c.name.as_str()) {
                Column::new(format!("{}_x", c.name), c.kind)
            } else {
                c.clone()
            }
        })
        .collect();
    columns.extend(right_keep.iter().map(|&i| {
        let c = &right.columns[i];
        if left_names.contains(c.name.as_str()) {
            Column::new(format!("{}_y", c.name), c.kind)
        } else {
            c.clone()
        }
    }));
    columns
}
