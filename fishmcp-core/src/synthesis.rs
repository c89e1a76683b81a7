//! Turns a validated synthesis request into encoded audio.
//!
//! All local validation (text, format, reference, parameters) happens before
//! the model is called, so a bad request never costs an inference.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::AudioFormat;
use crate::error::SpeechError;
use crate::model::{InferenceRequest, SpeechModel};
use crate::params::{ParameterOverrides, ParameterSet, UseCase};
use crate::policy::{self, RecentRecommendations};
use crate::references::ReferenceRegistry;
use crate::settings::config::SynthesisSettings;

const RECOMMENDED_TEXT_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub reference_id: Option<String>,
    pub format: AudioFormat,
    pub optimize: bool,
    pub use_case: Option<String>,
    pub overrides: ParameterOverrides,
    pub timeout: Option<Duration>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reference_id: None,
            format: AudioFormat::default(),
            optimize: true,
            use_case: None,
            overrides: ParameterOverrides::default(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisResult {
    #[serde(skip)]
    pub audio: Vec<u8>,
    pub format: AudioFormat,
    pub parameters_used: ParameterSet,
    /// Preset the parameters came from; `None` when auto-optimization was off.
    pub use_case: Option<UseCase>,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

pub struct Synthesizer {
    registry: Arc<ReferenceRegistry>,
    model: Arc<dyn SpeechModel>,
    recent: Arc<RecentRecommendations>,
    default_timeout: Duration,
    max_text_chars: usize,
}

impl Synthesizer {
    pub fn new(
        registry: Arc<ReferenceRegistry>,
        model: Arc<dyn SpeechModel>,
        settings: &SynthesisSettings,
    ) -> Self {
        Self {
            registry,
            model,
            recent: Arc::new(RecentRecommendations::default()),
            default_timeout: Duration::from_secs(settings.timeout_secs),
            max_text_chars: settings.max_text_chars,
        }
    }

    /// Recommendations recorded here decide the use case of later requests
    /// for the same text that do not declare one.
    pub fn recent_recommendations(&self) -> Arc<RecentRecommendations> {
        self.recent.clone()
    }

    pub async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisResult, SpeechError> {
        let text_chars = request.text.chars().count();
        if request.text.trim().is_empty() {
            return Err(SpeechError::invalid_argument("text must not be empty"));
        }
        if text_chars > self.max_text_chars {
            return Err(SpeechError::invalid_argument(format!(
                "text is {text_chars} characters; the limit is {}. Split it into shorter passages (500 or fewer is recommended)",
                self.max_text_chars
            )));
        }
        if text_chars > RECOMMENDED_TEXT_CHARS {
            warn!(text_chars, "Text is longer than the recommended 500 characters");
        }

        if !request.format.is_available() {
            return Err(SpeechError::UnsupportedFormat(request.format.to_string()));
        }

        // The registry lock is released as soon as the lookup returns.
        let reference = match &request.reference_id {
            Some(id) => Some(self.registry.get(id)?),
            None => None,
        };

        let (parameters, use_case) = resolve_parameters(&request, &self.recent)?;

        let timeout = request.timeout.unwrap_or(self.default_timeout);
        info!(
            model = self.model.name(),
            text_chars,
            reference_id = request.reference_id.as_deref().unwrap_or("none"),
            format = %request.format,
            ?parameters,
            "Starting synthesis"
        );

        let started = Instant::now();
        let inference = InferenceRequest {
            text: request.text,
            reference,
            parameters,
        };
        let waveform = tokio::time::timeout(timeout, self.model.generate(inference))
            .await
            .map_err(|_| {
                warn!(timeout_secs = timeout.as_secs(), "Synthesis timed out");
                SpeechError::Timeout(timeout)
            })??;

        let audio = request.format.encode(&waveform)?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            audio_bytes = audio.len(),
            duration_secs = waveform.duration_secs(),
            "Synthesis complete"
        );

        Ok(SynthesisResult {
            audio,
            format: request.format,
            parameters_used: parameters,
            use_case,
            sample_rate: waveform.sample_rate,
            duration_secs: waveform.duration_secs(),
        })
    }
}

fn resolve_parameters(
    request: &SynthesisRequest,
    recent: &RecentRecommendations,
) -> Result<(ParameterSet, Option<UseCase>), SpeechError> {
    if !request.optimize {
        let parameters = request.overrides.into_complete()?;
        parameters.validate()?;
        return Ok((parameters, None));
    }

    let declared = request
        .use_case
        .as_deref()
        .map(str::trim)
        .filter(|declared| !declared.is_empty());
    let use_case = match declared {
        Some(declared) => {
            let (use_case, unrecognized) = UseCase::resolve(Some(declared));
            if let Some(requested) = &unrecognized {
                warn!(use_case = %requested, "Unrecognized use case, using conversational");
            }
            use_case
        }
        None => match recent.lookup(&request.text) {
            Some(use_case) => {
                debug!(%use_case, "Using the use case recommended for this text");
                use_case
            }
            None => UseCase::default(),
        },
    };

    let recommendation = policy::recommend(&request.text, use_case);
    if !request.overrides.is_empty() {
        debug!(overrides = ?request.overrides, "Applying explicit parameter overrides");
    }
    let parameters = request.overrides.apply_to(recommendation.parameters);
    parameters.validate()?;
    Ok((parameters, Some(use_case)))
}
