// SPDX-License-Identifier: MIT

//! Agent nodes - a model step and a tool step that loop through the graph
//!
//! The conversation lives in the `messages` field as a JSON array of
//! [`Content`]. Declare that field with the `append` reducer so each node's
//! reply is added to the history rather than replacing it.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::Node;
use crate::adk::error::BoxError;
use crate::adk::model::{Content, GenerationConfig, Model, Part};
use crate::adk::tool::Tool;
use crate::kinetic::workflow::graph::Router;
use crate::kinetic::workflow::state::{PartialState, State};

/// State field holding the conversation
pub const MESSAGES_FIELD: &str = "messages";

fn read_messages(state: &State, field: &str) -> Result<Vec<Content>, BoxError> {
    match state.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| format!("field '{}' is not a message list: {}", field, e).into()),
    }
}

fn reply(field: &str, content: Content) -> Result<PartialState, BoxError> {
    Ok(State::new().with(field, json!([serde_json::to_value(content)?])))
}

/// Calls the model on the conversation and appends its reply
pub struct ModelNode {
    model: Arc<dyn Model>,
    tools: Vec<Arc<dyn Tool>>,
    instruction: Option<String>,
    config: Option<GenerationConfig>,
    field: String,
}

impl ModelNode {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            tools: Vec::new(),
            instruction: None,
            config: None,
            field: MESSAGES_FIELD.to_string(),
        }
    }

    /// Tools advertised to the model
    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    /// System instruction prepended to every call; never stored in state
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

#[async_trait]
impl Node for ModelNode {
    async fn invoke(&self, state: &State) -> Result<PartialState, BoxError> {
        let mut history = Vec::new();
        if let Some(instruction) = &self.instruction {
            history.push(Content::system(instruction.clone()));
        }
        history.extend(read_messages(state, &self.field)?);

        let tools = (!self.tools.is_empty()).then_some(self.tools.as_slice());
        let response = self
            .model
            .generate_content(&history, self.config.as_ref(), tools)
            .await?;

        log::info!(
            "Model replied with {} parts ({} tool calls)",
            response.parts.len(),
            response.function_calls().len()
        );
        reply(&self.field, response)
    }
}

/// Executes the function calls in the last message
///
/// Tool failures and unknown tools are reported back to the model as
/// `{"error": ...}` responses instead of failing the node.
pub struct ToolNode {
    tools: HashMap<String, Arc<dyn Tool>>,
    field: String,
}

impl ToolNode {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            tools: tools
                .into_iter()
                .map(|t| (t.name().to_string(), t))
                .collect(),
            field: MESSAGES_FIELD.to_string(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    async fn call(&self, name: &str, args: &Value) -> Value {
        log::info!("Tool call: {} {}", name, args);
        match self.tools.get(name) {
            Some(tool) => match tool.execute(args.clone()).await {
                Ok(result) => result,
                Err(e) => {
                    log::error!("Tool {} failed: {}", name, e);
                    json!({ "error": e.to_string() })
                }
            },
            None => {
                log::error!("Tool {} not found", name);
                json!({ "error": format!("Tool {} not found", name) })
            }
        }
    }
}

#[async_trait]
impl Node for ToolNode {
    async fn invoke(&self, state: &State) -> Result<PartialState, BoxError> {
        let messages = read_messages(state, &self.field)?;
        let calls = messages
            .last()
            .map(Content::function_calls)
            .unwrap_or_default();
        if calls.is_empty() {
            return Err("last message has no function calls".into());
        }

        // Calls run concurrently; responses keep the call order
        let responses = join_all(calls.into_iter().map(|(name, args)| async move {
            Part::FunctionResponse {
                name: name.to_string(),
                response: self.call(name, args).await,
            }
        }))
        .await;
        reply(&self.field, Content::new("user", responses))
    }
}

/// Routes to `"tools"` while the last message requests a function call,
/// `"end"` otherwise
#[derive(Debug, Clone)]
pub struct ToolsCondition {
    field: String,
}

impl ToolsCondition {
    pub const TOOLS: &'static str = "tools";
    pub const END: &'static str = "end";

    pub fn new() -> Self {
        Self {
            field: MESSAGES_FIELD.to_string(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

impl Default for ToolsCondition {
    fn default() -> Self {
        Self::new()
    }
}

impl Router for ToolsCondition {
    fn route(&self, state: &State) -> String {
        let wants_tools = read_messages(state, &self.field)
            .ok()
            .and_then(|messages| messages.last().cloned())
            .is_some_and(|last| !last.function_calls().is_empty());

        let label = if wants_tools { Self::TOOLS } else { Self::END };
        label.to_string()
    }
}
