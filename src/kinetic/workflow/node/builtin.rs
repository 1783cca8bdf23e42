//! Declarative node kinds usable from YAML

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::Node;
use crate::adk::error::{BoxError, DefinitionError};
use crate::kinetic::workflow::state::{value_kind, PartialState, State};

/// Returns a fixed partial state (kind `update`)
#[derive(Debug, Clone)]
pub struct UpdateNode {
    values: State,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateParams {
    values: Value,
}

impl UpdateNode {
    pub fn new(values: State) -> Self {
        Self { values }
    }

    /// Build from YAML params: `{values: {field: value, ...}}`
    pub fn from_params(id: &str, params: &Value) -> Result<Self, DefinitionError> {
        let params: UpdateParams = serde_json::from_value(params.clone())
            .map_err(|e| DefinitionError::params(id, e.to_string()))?;
        let values = State::from_json(params.values)
            .ok_or_else(|| DefinitionError::params(id, "`values` must be a mapping"))?;
        Ok(Self::new(values))
    }
}

#[async_trait]
impl Node for UpdateNode {
    async fn invoke(&self, _state: &State) -> Result<PartialState, BoxError> {
        Ok(self.values.clone())
    }
}

/// Adds `by` to a numeric field (kind `increment`)
///
/// A missing or null field counts as zero.
#[derive(Debug, Clone)]
pub struct IncrementNode {
    field: String,
    by: f64,
}

fn default_step() -> f64 {
    1.0
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IncrementParams {
    field: String,
    #[serde(default = "default_step")]
    by: f64,
}

impl IncrementNode {
    pub fn new(field: impl Into<String>, by: f64) -> Self {
        Self {
            field: field.into(),
            by,
        }
    }

    pub fn from_params(id: &str, params: &Value) -> Result<Self, DefinitionError> {
        let params: IncrementParams = serde_json::from_value(params.clone())
            .map_err(|e| DefinitionError::params(id, e.to_string()))?;
        Ok(Self::new(params.field, params.by))
    }
}

#[async_trait]
impl Node for IncrementNode {
    async fn invoke(&self, state: &State) -> Result<PartialState, BoxError> {
        let current = state.get(&self.field).unwrap_or(&Value::Null);
        let next = match current {
            Value::Null => number(0.0, self.by),
            Value::Number(n) => match (n.as_i64(), integral(self.by)) {
                (Some(i), Some(by)) => match i.checked_add(by) {
                    Some(sum) => json!(sum),
                    None => number(i as f64, self.by),
                },
                _ => number(n.as_f64().unwrap_or_default(), self.by),
            },
            other => {
                return Err(format!(
                    "cannot increment field '{}': found {}",
                    self.field,
                    value_kind(other)
                )
                .into())
            }
        };
        Ok(State::new().with(self.field.clone(), next))
    }
}

/// `by` as an `i64` when it is whole and in range
fn integral(by: f64) -> Option<i64> {
    (by.fract() == 0.0 && by.abs() < i64::MAX as f64).then_some(by as i64)
}

/// Keep integers integral so `counter == 3` style conditions stay exact
fn number(base: f64, by: f64) -> Value {
    let sum = base + by;
    if sum.fract() == 0.0 && sum.abs() < i64::MAX as f64 {
        json!(sum as i64)
    } else {
        json!(sum)
    }
}
