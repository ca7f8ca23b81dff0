// refguard-core/src/domain/dataset.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One instrument row: a schema-less mapping of column name -> scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentRecord {
    values: BTreeMap<String, Value>,
}

impl InstrumentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<Value>) {
        self.values.insert(column.to_string(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Value)> for InstrumentRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Ordered sequence of instrument records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    records: Vec<InstrumentRecord>,
}

/// Datasets are shared read-only between the cache and concurrent passes.
pub type SharedDataset = Arc<Dataset>;

impl Dataset {
    pub fn new(records: Vec<InstrumentRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[InstrumentRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentRecord> {
        self.records.iter()
    }

    /// A column exists when at least one record carries it (even as null).
    pub fn has_column(&self, column: &str) -> bool {
        self.records.iter().any(|r| r.contains_column(column))
    }

    /// Restricts the dataset to the records whose `key_column` equals `key` (text comparison).
    pub fn filter_by_key(&self, key_column: &str, key: &str) -> Dataset {
        let key = key.trim();
        let records = self
            .records
            .iter()
            .filter(|r| {
                let value = r.get(key_column);
                !is_missing(value) && value.map(canonical_text).as_deref() == Some(key)
            })
            .cloned()
            .collect();
        Dataset { records }
    }
}

/// Absent, null and blank strings are all "missing".
pub fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Text form used for equality, grouping and regex matching.
/// `1001`, `1001.0` and `"1001"` share the same canonical text.
pub fn canonical_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
                    Some(f) => f.to_string(),
                    None => n.to_string(),
                }
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Numeric view of a scalar. Text is parsed; NaN and infinities are rejected.
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
