use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use super::r#trait::SpeechTool;
use super::ToolName;
use crate::error::SpeechError;
use crate::references::ReferenceRegistry;

pub struct UploadReferenceAudioTool {
    references: Arc<ReferenceRegistry>,
}

impl UploadReferenceAudioTool {
    pub fn new(references: Arc<ReferenceRegistry>) -> Self {
        Self { references }
    }
}

#[derive(Deserialize)]
struct UploadArgs {
    reference_id: String,
    audio_base64: String,
    text: String,
}

/// Decode base64 audio, tolerating a `data:` URI prefix and embedded whitespace.
pub(crate) fn decode_audio_base64(encoded: &str) -> Result<Vec<u8>, SpeechError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| SpeechError::invalid_audio(format!("audio_base64 is not valid base64: {e}")))
}

#[async_trait]
impl SpeechTool for UploadReferenceAudioTool {
    fn name(&self) -> ToolName {
        ToolName::UploadReferenceAudio
    }

    fn description(&self) -> &'static str {
        "Register a reference voice for cloning. Provide 10-30 seconds of clean speech (wav, mp3, flac or ogg, at most 10 MB) as base64 together with an exact transcription. Uploading an existing reference_id replaces it."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reference_id": {
                    "type": "string",
                    "description": "Name for the voice, used later as synthesize_speech's reference_id. Letters, digits, '-', '_' and '.' only, at most 64 characters"
                },
                "audio_base64": {
                    "type": "string",
                    "description": "Base64-encoded audio file of the reference speaker"
                },
                "text": {
                    "type": "string",
                    "description": "Exact transcription of what is said in the audio"
                }
            },
            "required": ["reference_id", "audio_base64", "text"]
        })
    }

    async fn call(&self, arguments: Value) -> Result<Value, SpeechError> {
        let args: UploadArgs = serde_json::from_value(arguments)?;
        let audio = decode_audio_base64(&args.audio_base64)?;

        // Persisting the clip is blocking disk I/O.
        let references = self.references.clone();
        let ack = tokio::task::spawn_blocking(move || {
            references.upload(&args.reference_id, audio, &args.text)
        })
        .await
        .map_err(|e| SpeechError::invalid_audio(format!("Upload task failed: {e}")))??;
        let status = if ack.replaced { "replaced" } else { "created" };

        Ok(json!({
            "status": status,
            "reference_id": ack.reference_id,
            "audio_bytes": ack.audio_bytes,
            "container": ack.container,
            "duration_secs": ack.duration_secs,
        }))
    }
}
