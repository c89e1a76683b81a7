use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::r#trait::SpeechTool;
use super::ToolName;
use crate::error::SpeechError;
use crate::references::ReferenceRegistry;

pub struct ListReferencesTool {
    references: Arc<ReferenceRegistry>,
}

impl ListReferencesTool {
    pub fn new(references: Arc<ReferenceRegistry>) -> Self {
        Self { references }
    }
}

#[async_trait]
impl SpeechTool for ListReferencesTool {
    fn name(&self) -> ToolName {
        ToolName::ListReferences
    }

    fn description(&self) -> &'static str {
        "List the reference voices available for synthesize_speech, in upload order."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn call(&self, _arguments: Value) -> Result<Value, SpeechError> {
        Ok(json!({ "references": self.references.list() }))
    }
}
