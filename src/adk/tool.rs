use async_trait::async_trait;
use serde_json::Value;

use crate::adk::error::BoxError;

/// A function a model may request through a
/// [`ToolNode`](crate::kinetic::workflow::node::ToolNode).
///
/// Metadata is returned by reference; keep it in struct fields or a static.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lookup key for function calls; unique per tool node
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn schema(&self) -> &Value;

    /// Run with the model-supplied arguments. An `Err` is reported back to
    /// the model as `{"error": ...}` rather than failing the graph.
    async fn execute(&self, args: Value) -> Result<Value, BoxError>;
}
