//! Raw, untyped transaction tables as uploaded by clients

use crate::error::{Result, ServiceError};
use crate::sentinel::is_na_token;
use serde_json::Value;
use std::collections::HashMap;

/// A single cell before any feature transformation
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Missing,
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Classify a delimited-text cell; NA tokens become `Missing`
    pub fn from_cell(cell: &str) -> Self {
        if is_na_token(cell) {
            RawValue::Missing
        } else {
            RawValue::Text(cell.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }

    /// Numeric reading of the cell, `None` when missing or not a finite number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Missing => None,
            RawValue::Number(n) => Some(*n).filter(|n| n.is_finite()),
            RawValue::Text(text) => parse_number(text),
        }
    }

    /// Category key used for encoder lookups
    pub fn category_key(&self) -> Option<String> {
        match self {
            RawValue::Missing => None,
            RawValue::Number(n) => Some(n.to_string()),
            RawValue::Text(text) => Some(text.clone()),
        }
    }
}

/// Parse numeric cell text. Booleans read as 1/0.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    match trimmed {
        "True" | "true" | "TRUE" => return Some(1.0),
        "False" | "false" | "FALSE" => return Some(0.0),
        _ => {}
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Ordered column names plus rows of raw values.
///
/// Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    /// Build a table, padding short rows with missing cells.
    ///
    /// Rows wider than the header are rejected.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<RawValue>>) -> Result<Self> {
        let width = columns.len();
        let mut padded = Vec::with_capacity(rows.len());
        for (index, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(ServiceError::InputShape(format!(
                    "row {} has {} fields, expected {}",
                    index + 1,
                    row.len(),
                    width
                )));
            }
            row.resize(width, RawValue::Missing);
            padded.push(row);
        }
        Ok(Self {
            columns: dedupe_columns(columns),
            rows: padded,
        })
    }

    /// Parse delimited text with a header row
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ServiceError::InputShape(format!("payload is not UTF-8 text: {}", e)))?;
        if text.trim().is_empty() {
            return Err(ServiceError::InputShape("no columns to parse from payload".to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ServiceError::InputShape(format!("unreadable header: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ServiceError::InputShape("header row has no column names".to_string()));
        }

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                ServiceError::InputShape(format!("unreadable record {}: {}", index + 1, e))
            })?;
            // Blank lines are skipped, as pandas does
            if record.len() == 1 && record.get(0).is_some_and(|c| c.trim().is_empty()) && headers.len() > 1 {
                continue;
            }
            rows.push(record.iter().map(RawValue::from_cell).collect());
        }

        Self::new(headers, rows)
    }

    /// Build a table from one JSON object or an array of objects.
    ///
    /// Column order is first appearance across records.
    pub fn from_json(value: &Value) -> Result<Self> {
        let records: Vec<&serde_json::Map<String, Value>> = match value {
            Value::Object(map) => vec![map],
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    item.as_object().ok_or_else(|| {
                        ServiceError::InputShape(format!("record {} is not an object", index + 1))
                    })
                })
                .collect::<Result<_>>()?,
            _ => {
                return Err(ServiceError::InputShape(
                    "expected a JSON object or an array of objects".to_string(),
                ))
            }
        };

        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for record in &records {
            for key in record.keys() {
                if !positions.contains_key(key.as_str()) {
                    positions.insert(key.as_str(), columns.len());
                    columns.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let mut row = vec![RawValue::Missing; columns.len()];
            for (key, value) in record.iter() {
                row[positions[key.as_str()]] = json_cell(value).ok_or_else(|| {
                    ServiceError::InputShape(format!(
                        "record {} field '{}' is not a scalar value",
                        index + 1,
                        key
                    ))
                })?;
            }
            rows.push(row);
        }

        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate the cells of one column
    pub fn column(&self, index: usize) -> impl Iterator<Item = &RawValue> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Left join `other` on `key`: every row of `self` is kept, matching
    /// rows of `other` contribute their non-key columns.
    ///
    /// Columns of `other` that clash with existing names get a `_y` suffix.
    pub fn left_join(&self, other: &RawTable, key: &str) -> Result<RawTable> {
        let left_key = self
            .column_index(key)
            .ok_or_else(|| ServiceError::InputShape(format!("left table has no '{}' column", key)))?;
        let right_key = other
            .column_index(key)
            .ok_or_else(|| ServiceError::InputShape(format!("right table has no '{}' column", key)))?;

        let mut lookup: HashMap<String, usize> = HashMap::new();
        for (index, row) in other.rows.iter().enumerate() {
            if let Some(k) = row[right_key].category_key() {
                lookup.entry(k).or_insert(index);
            }
        }

        let right_columns: Vec<usize> = (0..other.columns.len()).filter(|&i| i != right_key).collect();
        let mut columns = self.columns.clone();
        for &i in &right_columns {
            let name = &other.columns[i];
            if columns.contains(name) {
                columns.push(format!("{}_y", name));
            } else {
                columns.push(name.clone());
            }
        }

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let matched = row[left_key]
                    .category_key()
                    .and_then(|k| lookup.get(&k))
                    .map(|&i| &other.rows[i]);
                let mut joined = row.clone();
                for &i in &right_columns {
                    joined.push(matched.map_or(RawValue::Missing, |r| r[i].clone()));
                }
                joined
            })
            .collect();

        RawTable::new(columns, rows)
    }
}

fn json_cell(value: &Value) -> Option<RawValue> {
    match value {
        Value::Null => Some(RawValue::Missing),
        Value::Number(n) => n.as_f64().map(RawValue::Number),
        Value::String(s) => Some(RawValue::Text(s.clone())),
        Value::Bool(b) => Some(RawValue::Text(if *b { "True" } else { "False" }.to_string())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Rename repeated header names to `name.1`, `name.2`, ...
fn dedupe_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(columns.len());
    for name in columns {
        let count = seen.entry(name.clone()).or_insert(0);
        if *count == 0 {
            out.push(name);
        } else {
            out.push(format!("{}.{}", name, count));
        }
        *count += 1;
    }
    out
}
