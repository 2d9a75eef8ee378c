//! Case payload: an open key -> value map.
//!
//! Missing keys are never an error. Lookups return `None` and callers treat
//! that as falsy/empty.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::FlowDefinitionError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_value(value: Value) -> Result<Self, FlowDefinitionError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(FlowDefinitionError::PayloadNotObject),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Resolve a data key. Dotted keys walk nested objects
    /// (`applicant.firstName`); a literal key containing dots wins.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(key) {
            return Some(value);
        }
        let mut parts = key.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// String form of a value, `None` when missing, null or empty.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(value_as_text)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn is_truthy(&self, key: &str) -> bool {
        is_truthy(self.get(key))
    }

    /// Array items under `key`; a scalar is treated as a one-item list and
    /// a comma-separated string is split.
    pub fn list(&self, key: &str) -> Vec<Value> {
        match self.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
            Some(other) => vec![other.clone()],
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// String form used for conditional comparisons and text entry.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => {
            let lowered = s.trim().to_lowercase();
            !lowered.is_empty() && !matches!(lowered.as_str(), "false" | "0" | "no" | "off")
        }
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}
