use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failures surfaced to the calling client. Every variant carries a message
/// that names the precondition that failed so an LLM can correct its next call.
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Reference '{0}' not found. Upload it with upload_reference_audio or call list_references")]
    NotFound(String),

    #[error("Unsupported format '{0}'. Supported formats: wav, mp3, pcm")]
    UnsupportedFormat(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(anyhow::Error),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(anyhow::Error),

    #[error("Inference error: {0}")]
    InferenceError(anyhow::Error),

    #[error("Synthesis timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidAudio,
    NotFound,
    UnsupportedFormat,
    ModelUnavailable,
    ResourceExhausted,
    InferenceError,
    Timeout,
}

impl SpeechError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidAudio(_) => ErrorKind::InvalidAudio,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::InferenceError(_) => ErrorKind::InferenceError,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }

    pub fn invalid_argument(message: impl fmt::Display) -> Self {
        Self::InvalidArgument(message.to_string())
    }

    pub fn invalid_audio(message: impl fmt::Display) -> Self {
        Self::InvalidAudio(message.to_string())
    }
}

/// Failures reported by the inference backend. These are passed through to
/// the caller without retry.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("{0}")]
    Unavailable(anyhow::Error),

    #[error("{0}")]
    ResourceExhausted(anyhow::Error),

    #[error("{0}")]
    Inference(anyhow::Error),
}

impl From<ModelError> for SpeechError {
    fn from(source: ModelError) -> Self {
        match source {
            ModelError::Unavailable(e) => Self::ModelUnavailable(e),
            ModelError::ResourceExhausted(e) => Self::ResourceExhausted(e),
            ModelError::Inference(e) => Self::InferenceError(e),
        }
    }
}

impl From<serde_json::Error> for SpeechError {
    fn from(source: serde_json::Error) -> Self {
        Self::InvalidArgument(source.to_string())
    }
}
