use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audio::Waveform;
use crate::error::ModelError;
use crate::params::ParameterSet;
use crate::references::ReferenceVoice;
use crate::settings::config::{BackendConfig, ModelSettings};

pub mod fish_speech;
pub mod launcher;
pub mod mock;

pub use fish_speech::{FishSpeechConfig, FishSpeechHttp};
pub use mock::{MockBehavior, MockModel};

/// Everything the speech model needs for one generation.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub text: String,
    pub reference: Option<Arc<ReferenceVoice>>,
    pub parameters: ParameterSet,
}

/// Trait for speech generation backends
#[async_trait]
pub trait SpeechModel: Send + Sync {
    fn name(&self) -> &str;

    /// Generate a waveform. May take seconds; callers must not hold locks
    /// across this call.
    async fn generate(&self, request: InferenceRequest) -> Result<Waveform, ModelError>;
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Device {
    #[default]
    Cuda,
    Cpu,
}

/// Backend initialization flags. They are forwarded to the backend untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOptions {
    pub device: Device,
    pub half: bool,
    pub compile: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            device: Device::default(),
            half: true,
            compile: false,
        }
    }
}

impl ModelOptions {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--device".to_string(), self.device.to_string()];
        if self.half {
            args.push("--half".to_string());
        }
        if self.compile {
            args.push("--compile".to_string());
        }
        args
    }
}

/// Build the backend described by the settings. Nothing is contacted or
/// launched until the first generation.
pub fn build_model(settings: &ModelSettings) -> Arc<dyn SpeechModel> {
    let options = settings.options();
    match &settings.backend {
        BackendConfig::FishSpeech {
            endpoint,
            api_key,
            launch,
        } => Arc::new(FishSpeechHttp::new(
            FishSpeechConfig {
                endpoint: endpoint.clone(),
                api_key: api_key.clone(),
                launch: launch.clone(),
            },
            options,
        )),
        BackendConfig::Mock { behavior } => {
            Arc::new(MockModel::with_options(behavior.clone(), options))
        }
    }
}
