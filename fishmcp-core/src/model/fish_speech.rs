//! Fish Speech HTTP API backend

use std::fmt;

use anyhow::anyhow;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::launcher::BackendLauncher;
use super::{InferenceRequest, ModelOptions, SpeechModel};
use crate::audio::container::decode_wav;
use crate::audio::Waveform;
use crate::error::ModelError;
use crate::settings::config::{redact, LaunchConfig};

const CHUNK_LENGTH: u32 = 200;

#[derive(Clone)]
pub struct FishSpeechConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub launch: Option<LaunchConfig>,
}

impl fmt::Debug for FishSpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FishSpeechConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("launch", &self.launch)
            .finish()
    }
}

pub struct FishSpeechHttp {
    config: FishSpeechConfig,
    client: Client,
    launcher: Option<BackendLauncher>,
}

impl FishSpeechHttp {
    pub fn new(config: FishSpeechConfig, options: ModelOptions) -> Self {
        let launcher = config
            .launch
            .clone()
            .map(|launch| BackendLauncher::new(launch, options));

        info!(
            endpoint = %config.endpoint,
            device = %options.device,
            half = options.half,
            compile = options.compile,
            managed = launcher.is_some(),
            "Configured Fish Speech backend"
        );

        Self {
            config,
            client: Client::new(),
            launcher,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.endpoint.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct TtsRequestBody<'a> {
    text: &'a str,
    references: Vec<ReferencePayload>,
    format: &'static str,
    streaming: bool,
    normalize: bool,
    chunk_length: u32,
    temperature: f64,
    top_p: f64,
    repetition_penalty: f64,
    max_new_tokens: u32,
}

#[derive(Serialize)]
struct ReferencePayload {
    audio: String,
    text: String,
}

impl<'a> TtsRequestBody<'a> {
    fn from_request(request: &'a InferenceRequest) -> Self {
        let references = request
            .reference
            .iter()
            .map(|voice| ReferencePayload {
                audio: base64::engine::general_purpose::STANDARD.encode(&voice.audio),
                text: voice.transcription.clone(),
            })
            .collect();

        Self {
            text: &request.text,
            references,
            format: "wav",
            streaming: false,
            normalize: true,
            chunk_length: CHUNK_LENGTH,
            temperature: request.parameters.temperature,
            top_p: request.parameters.top_p,
            repetition_penalty: request.parameters.repetition_penalty,
            max_new_tokens: request.parameters.max_new_tokens,
        }
    }
}

/// Map a failed HTTP reply to the error kind the caller should see.
fn classify_failure(status: u16, body: &str) -> ModelError {
    let message = anyhow!("Fish Speech API error {status}: {body}");
    if status == 507 || body.to_ascii_lowercase().contains("out of memory") {
        ModelError::ResourceExhausted(message)
    } else if status == 503 {
        ModelError::Unavailable(message)
    } else {
        ModelError::Inference(message)
    }
}

fn classify_transport(error: reqwest::Error) -> ModelError {
    if error.is_connect() {
        ModelError::Unavailable(anyhow!("Failed to connect to Fish Speech server: {error}"))
    } else {
        ModelError::Inference(anyhow!("Failed to send request to Fish Speech: {error}"))
    }
}

#[async_trait]
impl SpeechModel for FishSpeechHttp {
    fn name(&self) -> &str {
        "fish_speech"
    }

    async fn generate(&self, request: InferenceRequest) -> Result<Waveform, ModelError> {
        if let Some(launcher) = &self.launcher {
            launcher
                .ensure_running(&self.client, &self.url("/v1/health"))
                .await?;
        }

        let body = TtsRequestBody::from_request(&request);
        debug!(
            text_chars = request.text.chars().count(),
            references = body.references.len(),
            "Sending TTS request"
        );

        let mut builder = self.client.post(self.url("/v1/tts")).json(&body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(classify_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ModelError::Inference(anyhow!("Failed to read audio bytes: {e}")))?;

        decode_wav(&bytes).map_err(|e| ModelError::Inference(e.context("Undecodable audio from Fish Speech")))
    }
}
