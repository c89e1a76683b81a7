use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{InferenceRequest, ModelOptions, SpeechModel};
use crate::audio::Waveform;
use crate::error::ModelError;

/// Mock behavior for the mock model
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MockBehavior {
    /// Return a deterministic tone whose length follows the text
    #[default]
    Success,
    /// Behave as if the model was never loaded
    Unavailable,
    /// Report an out-of-memory condition
    OutOfMemory,
    /// Fail generation with a generic error
    Fail,
    /// Never finish
    Hang,
}

/// Deterministic stand-in for the neural model, used in tests and for
/// exercising clients without a GPU.
#[derive(Clone)]
pub struct MockModel {
    behavior: Arc<Mutex<MockBehavior>>,
    call_count: Arc<Mutex<usize>>,
    captured_requests: Arc<Mutex<VecDeque<InferenceRequest>>>,
}

impl MockModel {
    pub const SAMPLE_RATE: u32 = 44_100;
    /// Only the most recent requests are kept, so a long-running mock server
    /// does not hold on to every reference clip it was sent.
    pub const MAX_CAPTURED_REQUESTS: usize = 32;

    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            call_count: Arc::new(Mutex::new(0)),
            captured_requests: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// The mock has no device; the options are only logged.
    pub fn with_options(behavior: MockBehavior, options: ModelOptions) -> Self {
        debug!(?options, "Mock model ignores device options");
        Self::new(behavior)
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The most recent requests, oldest first.
    pub fn captured_requests(&self) -> Vec<InferenceRequest> {
        self.captured_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn tone(text: &str) -> Waveform {
        // 60ms per character, between a quarter second and thirty seconds
        let seconds = (text.chars().count() as f32 * 0.06).clamp(0.25, 30.0);
        let frames = (seconds * Self::SAMPLE_RATE as f32) as usize;
        let samples = (0..frames)
            .map(|i| (i as f32 * 220.0 * TAU / Self::SAMPLE_RATE as f32).sin() * 0.2)
            .collect();
        Waveform::mono(samples, Self::SAMPLE_RATE)
    }
}

#[async_trait]
impl SpeechModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: InferenceRequest) -> Result<Waveform, ModelError> {
        let behavior = self.behavior.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let text = request.text.clone();
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        {
            let mut captured = self
                .captured_requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if captured.len() == Self::MAX_CAPTURED_REQUESTS {
                captured.pop_front();
            }
            captured.push_back(request);
        }

        match behavior {
            MockBehavior::Success => Ok(Self::tone(&text)),
            MockBehavior::Unavailable => Err(ModelError::Unavailable(anyhow!(
                "mock model is not loaded"
            ))),
            MockBehavior::OutOfMemory => Err(ModelError::ResourceExhausted(anyhow!(
                "CUDA out of memory while generating"
            ))),
            MockBehavior::Fail => Err(ModelError::Inference(anyhow!("mock generation failed"))),
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSet;

    fn request(text: &str) -> InferenceRequest {
        InferenceRequest {
            text: text.to_string(),
            reference: None,
            parameters: ParameterSet {
                temperature: 0.8,
                top_p: 0.8,
                repetition_penalty: 1.1,
                max_new_tokens: 512,
            },
        }
    }

    #[tokio::test]
    async fn test_tone_length_follows_text() {
        let model = MockModel::new(MockBehavior::Success);
        let short = model.generate(request("Hi")).await.unwrap();
        let long = model.generate(request(&"word ".repeat(40))).await.unwrap();

        assert_eq!(short.duration_secs(), 0.25);
        assert!(long.duration_secs() > short.duration_secs());
        assert_eq!(model.call_count(), 2);
        assert_eq!(model.captured_requests()[0].text, "Hi");
    }

    #[tokio::test]
    async fn test_failure_behaviors() {
        let model = MockModel::new(MockBehavior::OutOfMemory);
        assert!(matches!(
            model.generate(request("Hi")).await,
            Err(ModelError::ResourceExhausted(_))
        ));

        model.set_behavior(MockBehavior::Unavailable);
        assert!(matches!(
            model.generate(request("Hi")).await,
            Err(ModelError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_capture_keeps_only_recent_requests() {
        let model = MockModel::new(MockBehavior::Success);
        let total = MockModel::MAX_CAPTURED_REQUESTS + 5;
        for i in 0..total {
            model.generate(request(&format!("line {i}"))).await.unwrap();
        }

        assert_eq!(model.call_count(), total);
        let captured = model.captured_requests();
        assert_eq!(captured.len(), MockModel::MAX_CAPTURED_REQUESTS);
        assert_eq!(captured[0].text, "line 5");
        assert_eq!(captured.last().unwrap().text, format!("line {}", total - 1));
    }
}
