use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::r#trait::SpeechTool;
use super::ToolName;
use crate::error::SpeechError;
use crate::params::UseCase;
use crate::policy::{self, RecentRecommendations};

/// Advisory tool; it never touches the model or the registry. The chosen use
/// case is remembered so a later synthesis of the same text can follow it.
pub struct GetParameterRecommendationsTool {
    recent: Arc<RecentRecommendations>,
}

impl GetParameterRecommendationsTool {
    pub fn new(recent: Arc<RecentRecommendations>) -> Self {
        Self { recent }
    }
}

#[derive(Deserialize)]
struct RecommendArgs {
    text: String,
    #[serde(default)]
    use_case: Option<String>,
}

#[async_trait]
impl SpeechTool for GetParameterRecommendationsTool {
    fn name(&self) -> ToolName {
        ToolName::GetParameterRecommendations
    }

    fn description(&self) -> &'static str {
        "Suggest synthesis parameters (temperature, top_p, repetition_penalty, max_new_tokens) for a text and use case, with an explanation of each value."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text that will be synthesized"
                },
                "use_case": {
                    "type": "string",
                    "enum": ["conversational", "narrative", "expressive", "stable"],
                    "description": "Delivery style. Defaults to conversational"
                }
            },
            "required": ["text"]
        })
    }

    async fn call(&self, arguments: Value) -> Result<Value, SpeechError> {
        let args: RecommendArgs = serde_json::from_value(arguments)?;

        let (use_case, unrecognized) = UseCase::resolve(args.use_case.as_deref());
        if let Some(requested) = &unrecognized {
            warn!(use_case = %requested, "Unrecognized use case, using conversational");
        }

        let recommendation =
            policy::recommend_requested(&args.text, use_case, unrecognized.as_deref());
        self.recent.record(&args.text, recommendation.use_case);

        Ok(json!({
            "use_case": recommendation.use_case,
            "temperature": recommendation.parameters.temperature,
            "top_p": recommendation.parameters.top_p,
            "repetition_penalty": recommendation.parameters.repetition_penalty,
            "max_new_tokens": recommendation.parameters.max_new_tokens,
            "text_length": recommendation.text_length,
            "rationale": recommendation.rationale,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_narrative_recommendation() {
        let recent = Arc::new(RecentRecommendations::default());
        let result = GetParameterRecommendationsTool::new(recent.clone())
            .call(json!({"text": "Hello world", "use_case": "narrative"}))
            .await
            .unwrap();

        assert_eq!(result["use_case"], "narrative");
        assert_eq!(result["temperature"], 0.75);
        assert_eq!(result["top_p"], 0.85);
        assert_eq!(result["repetition_penalty"], 1.05);
        assert_eq!(result["max_new_tokens"], 512);
        assert_eq!(result["text_length"], 11);
        assert_eq!(recent.lookup("Hello world"), Some(UseCase::Narrative));
    }

    #[tokio::test]
    async fn test_unknown_use_case_is_reported_in_rationale() {
        let result = GetParameterRecommendationsTool::new(Default::default())
            .call(json!({"text": "Hi", "use_case": "whisper"}))
            .await
            .unwrap();

        assert_eq!(result["use_case"], "conversational");
        assert!(result["rationale"].as_str().unwrap().contains("whisper"));
    }
}
