use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Instant;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::tools::fuzzy_json::coerce_arguments;
use crate::tools::r#trait::{SharedTool, ToolDefinition, ToolOutput};
use crate::tools::ToolName;

#[derive(Error, Debug, PartialEq)]
pub enum DispatchError {
    #[error("Unknown tool: {name}. Available tools: {available}")]
    UnknownTool { name: String, available: String },
}

pub struct ToolRegistry {
    tools: BTreeMap<ToolName, SharedTool>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<SharedTool>) -> Self {
        let mut registry = Self {
            tools: BTreeMap::new(),
        };

        for tool in tools {
            registry.register_tool(tool);
        }

        registry
    }

    pub fn register_tool(&mut self, tool: SharedTool) {
        let name = tool.name();
        debug!(tool_name = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    pub fn list_tools(&self) -> Vec<ToolName> {
        self.tools.keys().copied().collect()
    }

    /// Route a call to the named tool. Domain failures come back as
    /// [`ToolOutput::Error`]; only an unknown tool name is a dispatch error.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<ToolOutput, DispatchError> {
        let tool = ToolName::from_str(name)
            .ok()
            .and_then(|tool_name| self.tools.get(&tool_name))
            .ok_or_else(|| {
                error!(tool_name = %name, "Unknown tool");
                DispatchError::UnknownTool {
                    name: name.to_string(),
                    available: self
                        .list_tools()
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                }
            })?;

        let arguments = Value::Object(arguments.unwrap_or_default());
        let coerced = coerce_arguments(arguments, &tool.input_schema());

        let started = Instant::now();
        let output = match tool.call(coerced).await {
            Ok(value) => ToolOutput::Success(value),
            Err(e) => {
                warn!(tool_name = %name, kind = %e.kind(), error = %e, "Tool call failed");
                ToolOutput::Error(e)
            }
        };

        info!(
            tool_name = %name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            is_error = output.is_error(),
            "Tool call finished"
        );
        Ok(output)
    }
}
