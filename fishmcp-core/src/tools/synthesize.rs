use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use super::r#trait::SpeechTool;
use super::ToolName;
use crate::audio::AudioFormat;
use crate::error::SpeechError;
use crate::params::ParameterOverrides;
use crate::synthesis::{SynthesisRequest, Synthesizer};

pub struct SynthesizeSpeechTool {
    synthesizer: Arc<Synthesizer>,
}

impl SynthesizeSpeechTool {
    pub fn new(synthesizer: Arc<Synthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[derive(Deserialize)]
struct SynthesizeArgs {
    text: String,
    #[serde(default)]
    reference_id: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    optimize: Option<bool>,
    #[serde(default)]
    use_case: Option<String>,
    #[serde(flatten)]
    overrides: ParameterOverrides,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

impl SynthesizeArgs {
    fn into_request(self) -> Result<SynthesisRequest, SpeechError> {
        let format = match self.format.as_deref().map(str::trim) {
            None | Some("") => AudioFormat::default(),
            Some(name) => AudioFormat::parse(name)?,
        };

        let timeout = match self.timeout_seconds {
            Some(0) => {
                return Err(SpeechError::invalid_argument(
                    "timeout_seconds must be greater than zero",
                ))
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        // Clients often send "" for an omitted optional string.
        let reference_id = self
            .reference_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        Ok(SynthesisRequest {
            text: self.text,
            reference_id,
            format,
            optimize: self.optimize.unwrap_or(true),
            use_case: self.use_case,
            overrides: self.overrides,
            timeout,
        })
    }
}

#[async_trait]
impl SpeechTool for SynthesizeSpeechTool {
    fn name(&self) -> ToolName {
        ToolName::SynthesizeSpeech
    }

    fn description(&self) -> &'static str {
        "Convert text to speech and return base64-encoded audio. Optionally clone a voice registered with upload_reference_audio. Parameters are chosen automatically from the text and use case unless optimize is false, in which case temperature, top_p, repetition_penalty and max_new_tokens must all be given. Keep text under 500 characters."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to speak"
                },
                "reference_id": {
                    "type": "string",
                    "description": "Reference voice to clone. Omit to use the default voice"
                },
                "format": {
                    "type": "string",
                    "enum": ["wav", "mp3", "pcm"],
                    "description": "Output encoding. Defaults to wav; pcm is raw 16-bit little-endian"
                },
                "optimize": {
                    "type": "boolean",
                    "description": "Choose parameters automatically (default true)"
                },
                "use_case": {
                    "type": "string",
                    "enum": ["conversational", "narrative", "expressive", "stable"],
                    "description": "Delivery style used when optimize is true. Defaults to conversational"
                },
                "temperature": {
                    "type": "number",
                    "description": "Sampling temperature, 0.1-1.0. Overrides the recommendation when optimize is true"
                },
                "top_p": {
                    "type": "number",
                    "description": "Nucleus sampling threshold, 0.1-1.0"
                },
                "repetition_penalty": {
                    "type": "number",
                    "description": "Penalty for repeated tokens, 0.9-2.0"
                },
                "max_new_tokens": {
                    "type": "integer",
                    "description": "Generation budget, 1-4096"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Give up on generation after this many seconds"
                }
            },
            "required": ["text"]
        })
    }

    async fn call(&self, arguments: Value) -> Result<Value, SpeechError> {
        let args: SynthesizeArgs = serde_json::from_value(arguments)?;
        let result = self.synthesizer.synthesize(args.into_request()?).await?;

        Ok(json!({
            "audio_base64": base64::engine::general_purpose::STANDARD.encode(&result.audio),
            "format": result.format,
            "parameters_used": result.parameters_used,
            "use_case": result.use_case,
            "sample_rate": result.sample_rate,
            "duration_secs": result.duration_secs,
            "audio_bytes": result.audio.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> SynthesizeArgs {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let request = args(json!({"text": "Hello"})).into_request().unwrap();
        assert_eq!(request.format, AudioFormat::Wav);
        assert!(request.optimize);
        assert!(request.reference_id.is_none());
        assert!(request.overrides.is_empty());
        assert!(request.timeout.is_none());
    }

    #[test]
    fn test_overrides_and_options_are_carried() {
        let request = args(json!({
            "text": "Hello",
            "reference_id": "narrator",
            "format": "PCM",
            "optimize": false,
            "temperature": 0.6,
            "max_new_tokens": 256,
            "timeout_seconds": 30
        }))
        .into_request()
        .unwrap();

        assert_eq!(request.reference_id.as_deref(), Some("narrator"));
        assert_eq!(request.format, AudioFormat::Pcm);
        assert!(!request.optimize);
        assert_eq!(request.overrides.temperature, Some(0.6));
        assert_eq!(request.overrides.max_new_tokens, Some(256));
        assert_eq!(request.overrides.top_p, None);
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_blank_reference_id_means_default_voice() {
        let request = args(json!({"text": "Hello", "reference_id": "  "}))
            .into_request()
            .unwrap();
        assert!(request.reference_id.is_none());
    }

    #[test]
    fn test_rejects_unknown_format_and_zero_timeout() {
        let err = args(json!({"text": "Hello", "format": "ogg"}))
            .into_request()
            .unwrap_err();
        assert!(matches!(err, SpeechError::UnsupportedFormat(_)));

        let err = args(json!({"text": "Hello", "timeout_seconds": 0}))
            .into_request()
            .unwrap_err();
        assert!(matches!(err, SpeechError::InvalidArgument(_)));
    }
}
