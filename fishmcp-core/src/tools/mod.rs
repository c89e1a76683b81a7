pub mod fuzzy_json;
pub mod list_references;
pub mod recommend;
pub mod registry;
pub mod synthesize;
pub mod r#trait;
pub mod upload_reference;

use std::sync::Arc;

use crate::references::ReferenceRegistry;
use crate::synthesis::Synthesizer;

pub use list_references::ListReferencesTool;
pub use recommend::GetParameterRecommendationsTool;
pub use registry::ToolRegistry;
pub use r#trait::{SharedTool, SpeechTool, ToolDefinition, ToolOutput};
pub use synthesize::SynthesizeSpeechTool;
pub use upload_reference::UploadReferenceAudioTool;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::VariantArray,
)]
#[strum(serialize_all = "snake_case")]
pub enum ToolName {
    UploadReferenceAudio,
    SynthesizeSpeech,
    GetParameterRecommendations,
    ListReferences,
}

/// Every tool the server exposes, sharing one reference registry.
pub fn speech_tools(
    references: Arc<ReferenceRegistry>,
    synthesizer: Arc<Synthesizer>,
) -> Vec<SharedTool> {
    let recent = synthesizer.recent_recommendations();
    vec![
        Arc::new(UploadReferenceAudioTool::new(references.clone())),
        Arc::new(SynthesizeSpeechTool::new(synthesizer)),
        Arc::new(GetParameterRecommendationsTool::new(recent)),
        Arc::new(ListReferencesTool::new(references)),
    ]
}
