//! MCP front-end. Translates protocol requests into tool registry calls.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ErrorData as McpError, Implementation,
    ListToolsResult, PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler, ServiceExt};
use serde_json::Value;
use tracing::info;

use crate::tools::{ToolDefinition, ToolOutput, ToolRegistry};

pub const SERVER_NAME: &str = "fish-speech-mcp";

const INSTRUCTIONS: &str = "Text-to-speech with optional voice cloning. \
Register a voice with upload_reference_audio (10-30 s of clean speech plus its exact transcription), \
then call synthesize_speech with that reference_id. Parameters are chosen automatically; \
use get_parameter_recommendations to see what will be used and why. \
Failed calls return {\"error\": {\"kind\", \"message\"}}.";

#[derive(Clone)]
pub struct SpeechMcpServer {
    tools: Arc<ToolRegistry>,
}

impl SpeechMcpServer {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Tool failures are results with `is_error`; only a name the registry
    /// does not know is a protocol error.
    async fn run_tool(&self, request: CallToolRequestParam) -> Result<CallToolResult, McpError> {
        let output = self
            .tools
            .dispatch(&request.name, request.arguments)
            .await
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        Ok(to_call_result(output))
    }
}

fn to_mcp_tool(definition: ToolDefinition) -> Tool {
    let schema = match definition.input_schema {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Tool::new(definition.name, definition.description, Arc::new(schema))
}

fn to_call_result(output: ToolOutput) -> CallToolResult {
    let content = vec![Content::text(output.to_json().to_string())];
    if output.is_error() {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

impl ServerHandler for SpeechMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self
            .tools
            .get_tool_definitions()
            .into_iter()
            .map(to_mcp_tool)
            .collect();

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(request).await
    }
}

/// Serve MCP over stdin/stdout until the client disconnects.
pub async fn serve_stdio(server: SpeechMcpServer) -> Result<()> {
    info!(
        tools = server.registry().list_tools().len(),
        "Serving MCP over stdio"
    );

    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to start MCP session")?;
    let reason = service.waiting().await.context("MCP session task failed")?;

    info!(?reason, "MCP session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpeechError;
    use crate::model::{MockBehavior, MockModel};
    use crate::references::ReferenceRegistry;
    use crate::settings::config::SynthesisSettings;
    use crate::synthesis::Synthesizer;
    use crate::tools::speech_tools;
    use rmcp::model::ErrorCode;
    use serde_json::json;

    fn server() -> SpeechMcpServer {
        let references = Arc::new(ReferenceRegistry::new(1024));
        let synthesizer = Arc::new(Synthesizer::new(
            references.clone(),
            Arc::new(MockModel::new(MockBehavior::Success)),
            &SynthesisSettings::default(),
        ));
        SpeechMcpServer::new(Arc::new(ToolRegistry::new(speech_tools(references, synthesizer))))
    }

    #[test]
    fn test_tool_definition_conversion() {
        let tool = to_mcp_tool(ToolDefinition {
            name: "list_references".to_string(),
            description: "List voices".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        });
        assert_eq!(tool.name, "list_references");
        assert_eq!(tool.input_schema.get("type"), Some(&json!("object")));
    }

    #[test]
    fn test_error_output_is_flagged() {
        let result = to_call_result(ToolOutput::Error(SpeechError::NotFound("ghost".into())));
        assert_eq!(result.is_error, Some(true));

        let result = to_call_result(ToolOutput::Success(json!({"references": []})));
        assert_eq!(result.is_error, Some(false));
    }

    #[test]
    fn test_server_info() {
        let server = SpeechMcpServer::new(Arc::new(ToolRegistry::new(Vec::new())));
        let info = server.get_info();
        assert_eq!(info.server_info.name, SERVER_NAME);
        assert!(info.capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let err = server()
            .run_tool(CallToolRequestParam {
                name: "delete_reference".into(),
                arguments: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("list_references"));
    }

    #[tokio::test]
    async fn test_tool_failure_is_an_error_result() {
        let result = server()
            .run_tool(CallToolRequestParam {
                name: "synthesize_speech".into(),
                arguments: json!({"text": "Hi", "reference_id": "ghost"})
                    .as_object()
                    .cloned(),
            })
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
