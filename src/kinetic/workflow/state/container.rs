// SPDX-License-Identifier: MIT

//! Runtime state container and reducer-driven merging

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::{ReducerType, StateSchema};
use crate::adk::error::MergeError;

/// Ordered mapping of field name to value
///
/// Serializes as a flat JSON object. Nodes never mutate the state they are
/// given; they return a [`PartialState`] which the executor merges in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    fields: Map<String, Value>,
}

/// A state holding only the fields a node updates
pub type PartialState = State;

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from a JSON object; any other value yields `None`
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Set a field, bypassing reducers
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested field value using dot notation (e.g., "result.intent")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Get all field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.fields)
    }

    /// Merge `partial` into a copy of this state using the schema's reducers
    ///
    /// Fields absent from `partial` are left untouched. On error the
    /// receiver is unchanged.
    pub fn merge(&self, partial: &State, schema: &StateSchema) -> Result<State, MergeError> {
        let mut merged = self.clone();
        for (key, value) in partial.iter() {
            let reduced = reduce(schema, key, merged.fields.remove(key), value.clone())?;
            merged.fields.insert(key.clone(), reduced);
        }
        Ok(merged)
    }
}

impl FromIterator<(String, Value)> for State {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl From<Map<String, Value>> for State {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Short type name of a JSON value, used in error messages
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Combine the current value of `key` with an incoming one
fn reduce(
    schema: &StateSchema,
    key: &str,
    current: Option<Value>,
    incoming: Value,
) -> Result<Value, MergeError> {
    let reducer = schema.reducer(key);
    let mismatch = |expected: &'static str, found: &Value| MergeError::TypeMismatch {
        field: key.to_string(),
        reducer,
        expected,
        found: value_kind(found),
    };

    match reducer {
        ReducerType::Replace => {
            if let Some(field_type) = schema.field_type(key) {
                if !field_type.matches(&incoming) {
                    return Err(mismatch(field_type.as_str(), &incoming));
                }
            }
            Ok(incoming)
        }
        ReducerType::Append => {
            let mut items = match current {
                None => Vec::new(),
                Some(Value::Array(items)) => items,
                Some(other) => return Err(mismatch("array", &other)),
            };
            match incoming {
                Value::Array(new_items) => items.extend(new_items),
                other => items.push(other),
            }
            Ok(Value::Array(items))
        }
        ReducerType::Max | ReducerType::Min => {
            let new = incoming
                .as_f64()
                .ok_or_else(|| mismatch("number", &incoming))?;
            let Some(current) = current else {
                return Ok(incoming);
            };
            let old = current
                .as_f64()
                .ok_or_else(|| mismatch("number", &current))?;
            let take_new = match reducer {
                ReducerType::Max => new > old,
                _ => new < old,
            };
            Ok(if take_new { incoming } else { current })
        }
        ReducerType::Merge => {
            let new_obj = match incoming {
                Value::Object(new_obj) => new_obj,
                other => return Err(mismatch("object", &other)),
            };
            let mut obj = match current {
                None => Map::new(),
                Some(Value::Object(obj)) => obj,
                Some(other) => return Err(mismatch("object", &other)),
            };
            obj.extend(new_obj);
            Ok(Value::Object(obj))
        }
    }
}
