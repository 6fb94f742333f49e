//! Raw field input and stored record types

use std::collections::BTreeMap;

use rusqlite::types::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::error::{StoreError, StoreResult};

/// Candidate field values as typed into a form: column name -> raw text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, String>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into self; values from `other` win
    pub fn merge(&mut self, other: &Fields) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }

    /// Parse `key=value` assignments (command-line `--set` pairs)
    pub fn from_assignments<S: AsRef<str>>(pairs: &[S]) -> StoreResult<Self> {
        let mut fields = Fields::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                StoreError::validation(pair, "expected key=value")
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(StoreError::validation(pair, "field name is empty"));
            }
            fields.insert(key, value);
        }
        Ok(fields)
    }
}

/// A stored row: primary key plus column values in table order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub values: Vec<(String, Value)>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Value> {
        if column == "id" {
            return None;
        }
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.get(column)? {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn real(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Replace or append a column value
    pub fn set(&mut self, column: &str, value: Value) {
        match self.values.iter_mut().find(|(name, _)| name == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column.to_string(), value)),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (name, value) in &self.values {
            map.serialize_entry(name, &json_value(value))?;
        }
        map.end()
    }
}

/// Plain text rendering of a stored value
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// JSON rendering of a stored value
pub fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Blob(b) => serde_json::Value::String(format!("<{} bytes>", b.len())),
    }
}
