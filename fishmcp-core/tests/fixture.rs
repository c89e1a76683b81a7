use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use serde_json::Value;

use fishmcp_core::references::ReferenceStore;
use fishmcp_core::settings::config::SynthesisSettings;
use fishmcp_core::tools::ToolOutput;
pub use fishmcp_core::{MockBehavior, MockModel};
use fishmcp_core::{speech_tools, ReferenceRegistry, Synthesizer, ToolRegistry};

pub const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

pub struct Fixture {
    pub tools: ToolRegistry,
    pub references: Arc<ReferenceRegistry>,
    pub model: MockModel,
}

impl Fixture {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::Success)
    }

    #[allow(dead_code)]
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self::build(
            ReferenceRegistry::new(MAX_AUDIO_BYTES),
            behavior,
            SynthesisSettings::default(),
        )
    }

    #[allow(dead_code)]
    pub fn with_synthesis_settings(settings: SynthesisSettings) -> Self {
        Self::build(
            ReferenceRegistry::new(MAX_AUDIO_BYTES),
            MockBehavior::Success,
            settings,
        )
    }

    /// Fixture whose references are persisted under `dir`.
    #[allow(dead_code)]
    pub fn persisted(dir: &Path) -> Self {
        let registry =
            ReferenceRegistry::with_store(MAX_AUDIO_BYTES, ReferenceStore::new(dir.to_path_buf()))
                .unwrap();
        Self::build(
            registry,
            MockBehavior::Success,
            SynthesisSettings::default(),
        )
    }

    fn build(
        registry: ReferenceRegistry,
        behavior: MockBehavior,
        settings: SynthesisSettings,
    ) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let references = Arc::new(registry);
        let model = MockModel::new(behavior);
        let synthesizer = Arc::new(Synthesizer::new(
            references.clone(),
            Arc::new(model.clone()),
            &settings,
        ));
        let tools = ToolRegistry::new(speech_tools(references.clone(), synthesizer));

        Fixture {
            tools,
            references,
            model,
        }
    }

    /// Call a tool and return whether it failed together with its JSON body.
    pub async fn call(&self, tool: &str, arguments: Value) -> (bool, Value) {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => panic!("tool arguments must be an object, got {other}"),
        };
        let output: ToolOutput = self.tools.dispatch(tool, arguments).await.unwrap();
        (output.is_error(), output.to_json())
    }

    #[allow(dead_code)]
    pub async fn call_ok(&self, tool: &str, arguments: Value) -> Value {
        let (is_error, body) = self.call(tool, arguments).await;
        assert!(!is_error, "{tool} failed: {body}");
        body
    }

    /// Call a tool that is expected to fail and return the error kind.
    #[allow(dead_code)]
    pub async fn call_err(&self, tool: &str, arguments: Value) -> (String, String) {
        let (is_error, body) = self.call(tool, arguments).await;
        assert!(is_error, "{tool} unexpectedly succeeded: {body}");
        (
            body["error"]["kind"].as_str().unwrap().to_string(),
            body["error"]["message"].as_str().unwrap().to_string(),
        )
    }
}

/// Mono 16-bit WAV of a quiet tone lasting `seconds`.
#[allow(dead_code)]
pub fn wav_clip(seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (seconds * spec.sample_rate as f32) as usize;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let sample = ((i as f32 * 0.05).sin() * 3_000.0) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[allow(dead_code)]
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[allow(dead_code)]
pub fn decode_base64(encoded: &str) -> Vec<u8> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap()
}
