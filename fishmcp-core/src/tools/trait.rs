use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::ToolName;
use crate::error::SpeechError;

/// Definition advertised to clients when they list tools
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait SpeechTool: Send + Sync {
    fn name(&self) -> ToolName;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;

    /// Run the tool. `arguments` has already been coerced to the input schema.
    async fn call(&self, arguments: Value) -> Result<Value, SpeechError>;
}

pub type SharedTool = Arc<dyn SpeechTool>;

/// Outcome of a tool call as seen by the client
#[derive(Debug)]
pub enum ToolOutput {
    Success(Value),
    Error(SpeechError),
}

impl ToolOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// JSON body sent back to the client. Failures use the
    /// `{"error": {"kind", "message"}}` envelope.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Success(value) => value.clone(),
            Self::Error(error) => serde_json::json!({
                "error": {
                    "kind": error.kind(),
                    "message": error.to_string(),
                }
            }),
        }
    }
}
