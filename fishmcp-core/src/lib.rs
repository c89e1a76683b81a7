pub mod audio;
pub mod error;
pub mod model;
pub mod params;
pub mod policy;
pub mod references;
pub mod server;
pub mod settings;
pub mod synthesis;
pub mod tools;

pub use audio::{AudioContainer, AudioFormat, Waveform};
pub use error::{ErrorKind, ModelError, SpeechError};
pub use model::{build_model, MockBehavior, MockModel, SpeechModel};
pub use params::{ParameterOverrides, ParameterSet, UseCase};
pub use references::{ReferenceRegistry, ReferenceStore};
pub use server::{serve_stdio, SpeechMcpServer};
pub use settings::{Settings, SettingsManager};
pub use synthesis::{SynthesisRequest, SynthesisResult, Synthesizer};
pub use tools::{speech_tools, ToolRegistry};
