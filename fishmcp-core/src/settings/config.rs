use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::model::mock::MockBehavior;
use crate::model::{Device, ModelOptions};
use crate::references::DEFAULT_MAX_AUDIO_BYTES;

/// How to start the Fish Speech API server when it is not already running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaunchConfig {
    /// Command to execute for the API server
    pub command: String,

    /// Arguments to pass to the command. Device flags are appended.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables to set for the server process
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Directory to start the server in
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// How long to wait for the health endpoint after spawning
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_startup_timeout_secs() -> u64 {
    300
}

#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BackendConfig {
    #[serde(rename = "fish_speech")]
    FishSpeech {
        #[serde(default = "default_endpoint")]
        endpoint: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        launch: Option<LaunchConfig>,
    },
    #[serde(rename = "mock")]
    Mock {
        #[serde(default)]
        behavior: MockBehavior,
    },
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080".to_string()
}

/// Stand-in for a secret in `Debug` output, which ends up in the trace log.
pub(crate) fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FishSpeech {
                endpoint,
                api_key,
                launch,
            } => f
                .debug_struct("FishSpeech")
                .field("endpoint", endpoint)
                .field("api_key", &redact(api_key))
                .field("launch", launch)
                .finish(),
            Self::Mock { behavior } => f.debug_struct("Mock").field("behavior", behavior).finish(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::FishSpeech {
            endpoint: default_endpoint(),
            api_key: None,
            launch: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSettings {
    /// Device the model runs on (cuda/cpu)
    #[serde(default)]
    pub device: Device,

    /// Use half precision
    #[serde(default = "default_half")]
    pub half: bool,

    /// Compile the model for faster inference
    #[serde(default)]
    pub compile: bool,

    #[serde(default)]
    pub backend: BackendConfig,
}

fn default_half() -> bool {
    true
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            device: Device::default(),
            half: default_half(),
            compile: false,
            backend: BackendConfig::default(),
        }
    }
}

impl ModelSettings {
    pub fn options(&self) -> ModelOptions {
        ModelOptions {
            device: self.device,
            half: self.half,
            compile: self.compile,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisSettings {
    /// Default time limit for one synthesis call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Longest text accepted by synthesize_speech
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_text_chars() -> usize {
    1000
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceSettings {
    /// Largest accepted reference clip, in bytes
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,

    /// Keep uploaded references on disk so they survive restarts
    #[serde(default)]
    pub persist_dir: Option<PathBuf>,
}

fn default_max_audio_bytes() -> usize {
    DEFAULT_MAX_AUDIO_BYTES
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            max_audio_bytes: default_max_audio_bytes(),
            persist_dir: None,
        }
    }
}

/// Server settings, loaded from `~/.fish-speech-mcp/settings.toml` unless a
/// path is given on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default)]
    pub synthesis: SynthesisSettings,

    #[serde(default)]
    pub references: ReferenceSettings,
}
