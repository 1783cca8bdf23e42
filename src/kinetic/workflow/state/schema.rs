// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use super::container::{value_kind, State};
use crate::adk::error::CompileError;

/// Schema defining the workflow state structure
///
/// Fields that are not declared still merge, using [`ReducerType::Replace`]
/// and no type check.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct StateSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: HashMap<String, StateFieldDef>,
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct StateFieldDef {
    /// Type of the field; untyped fields accept any value
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    /// Reducer for merging values
    #[serde(default)]
    pub reducer: ReducerType,
    /// Default value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Supported field types
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// Reducer types for merging values into state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReducerType {
    /// Replace the value (default)
    #[default]
    #[serde(alias = "overwrite")]
    Replace,
    /// Append to array
    Append,
    /// Keep maximum value
    Max,
    /// Keep minimum value
    Min,
    /// Shallow-merge objects
    Merge,
}

impl FieldType {
    /// Whether `value` has this type. `null` matches every type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Array, Value::Array(_)) => true,
            (FieldType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ReducerType {
    /// The only field type this reducer can operate on, if restricted
    fn required_type(&self) -> Option<FieldType> {
        match self {
            ReducerType::Replace => None,
            ReducerType::Append => Some(FieldType::Array),
            ReducerType::Max | ReducerType::Min => Some(FieldType::Number),
            ReducerType::Merge => Some(FieldType::Object),
        }
    }
}

impl fmt::Display for ReducerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReducerType::Replace => "replace",
            ReducerType::Append => "append",
            ReducerType::Max => "max",
            ReducerType::Min => "min",
            ReducerType::Merge => "merge",
        };
        f.write_str(name)
    }
}

impl StateFieldDef {
    pub fn new(reducer: ReducerType) -> Self {
        Self {
            field_type: None,
            reducer,
            default: None,
        }
    }

    pub fn typed(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field definition
    pub fn field(mut self, name: impl Into<String>, def: StateFieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    /// Reducer for a field; undeclared fields replace
    pub fn reducer(&self, field: &str) -> ReducerType {
        self.fields
            .get(field)
            .map(|def| def.reducer)
            .unwrap_or_default()
    }

    /// Declared type for a field, if any
    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.fields.get(field).and_then(|def| def.field_type)
    }

    /// State holding every declared default
    pub fn initial_state(&self) -> State {
        self.fields
            .iter()
            .filter_map(|(name, def)| def.default.clone().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Reject reducer/type combinations that can never merge
    pub fn validate(&self) -> Result<(), CompileError> {
        let mut names: Vec<&String> = self.fields.keys().collect();
        names.sort();

        for name in names {
            let def = &self.fields[name];
            let invalid = |reason: String| CompileError::InvalidSchema {
                field: name.clone(),
                reason,
            };

            if let (Some(declared), Some(required)) = (def.field_type, def.reducer.required_type())
            {
                if declared != required {
                    return Err(invalid(format!(
                        "reducer '{}' requires type {}, declared {}",
                        def.reducer, required, declared
                    )));
                }
            }

            if let Some(default) = &def.default {
                let expected = def.field_type.or(def.reducer.required_type());
                if let Some(expected) = expected {
                    if !expected.matches(default) {
                        return Err(invalid(format!(
                            "default is {}, expected {}",
                            value_kind(default),
                            expected
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
