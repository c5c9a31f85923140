//! Data records evaluated against rules

use crate::error::{Result, RuleEngineError};
use crate::rule::Value;
use std::collections::HashMap;
use tracing::debug;

/// Field values of a single record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON object.
    ///
    /// Strings and numbers are kept. Other JSON values (null, booleans,
    /// arrays, objects) are dropped, so rules referencing them see a
    /// missing field.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            RuleEngineError::InvalidRecord(format!("expected a JSON object, got {}", json))
        })?;

        let mut record = Record::new();
        for (field, value) in object {
            match value {
                serde_json::Value::String(s) => {
                    record.insert(field.clone(), s.as_str());
                }
                serde_json::Value::Number(n) => match n.as_f64() {
                    Some(n) => {
                        record.insert(field.clone(), n);
                    }
                    None => debug!(field = %field, "Dropping unrepresentable number"),
                },
                other => debug!(field = %field, value = %other, "Dropping unsupported record value"),
            }
        }

        Ok(record)
    }

    /// Build a record from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json(&value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (field, value) in iter {
            record.insert(field, value);
        }
        record
    }
}
