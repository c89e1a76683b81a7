//! Named reference voices available for cloning.
//!
//! The registry owns every uploaded clip for the lifetime of the process. One
//! mutex guards the insertion-ordered entry list; callers receive `Arc`s so
//! the lock is never held while a clip is used for synthesis. Uploads that
//! persist to disk are serialized by a second lock, and the entry list is only
//! locked to read the listing position and to publish the finished entry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::container::wav_duration_secs;
use crate::audio::AudioContainer;
use crate::error::SpeechError;

pub mod store;

pub use store::ReferenceStore;

pub const DEFAULT_MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;
const MAX_ID_LEN: usize = 64;
const RECOMMENDED_SECS: std::ops::RangeInclusive<f64> = 10.0..=30.0;

#[derive(Debug, Clone)]
pub struct ReferenceVoice {
    pub id: String,
    pub audio: Vec<u8>,
    pub transcription: String,
    pub created_at: DateTime<Utc>,
    /// Listing position. Kept when the id is re-uploaded.
    pub sequence: u64,
    pub container: AudioContainer,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceSummary {
    pub reference_id: String,
    pub transcription: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadAck {
    pub reference_id: String,
    pub replaced: bool,
    pub container: AudioContainer,
    pub audio_bytes: usize,
    pub duration_secs: Option<f64>,
}

pub struct ReferenceRegistry {
    max_audio_bytes: usize,
    store: Option<ReferenceStore>,
    entries: Mutex<Vec<Arc<ReferenceVoice>>>,
    uploads: Mutex<()>,
}

impl ReferenceRegistry {
    /// In-memory registry; entries live as long as the process.
    pub fn new(max_audio_bytes: usize) -> Self {
        Self {
            max_audio_bytes,
            store: None,
            entries: Mutex::new(Vec::new()),
            uploads: Mutex::new(()),
        }
    }

    /// Registry that mirrors every upload into `store` and starts with the
    /// references already saved there.
    pub fn with_store(max_audio_bytes: usize, store: ReferenceStore) -> Result<Self> {
        let existing = store.load_all()?;
        info!(
            references = existing.len(),
            root = %store.root().display(),
            "Loaded persisted reference voices"
        );

        Ok(Self {
            max_audio_bytes,
            store: Some(store),
            entries: Mutex::new(existing.into_iter().map(Arc::new).collect()),
            uploads: Mutex::new(()),
        })
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Arc<ReferenceVoice>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn upload(
        &self,
        id: &str,
        audio: Vec<u8>,
        transcription: &str,
    ) -> Result<UploadAck, SpeechError> {
        validate_reference_id(id)?;

        if transcription.trim().is_empty() {
            return Err(SpeechError::invalid_argument(
                "text (the transcription of the reference audio) must not be empty",
            ));
        }

        let (container, duration_secs) = self.inspect_audio(&audio)?;
        if let Some(secs) = duration_secs {
            if !RECOMMENDED_SECS.contains(&secs) {
                warn!(
                    reference_id = %id,
                    duration_secs = secs,
                    "Reference audio outside the recommended 10-30 second range"
                );
            }
        }

        let _upload = self.uploads.lock().unwrap_or_else(PoisonError::into_inner);

        let (sequence, replaced) = {
            let entries = self.entries();
            match entries.iter().find(|entry| entry.id == id) {
                Some(existing) => (existing.sequence, true),
                None => (
                    entries.iter().map(|entry| entry.sequence + 1).max().unwrap_or(0),
                    false,
                ),
            }
        };

        let voice = ReferenceVoice {
            id: id.to_string(),
            audio,
            transcription: transcription.to_string(),
            created_at: Utc::now(),
            sequence,
            container,
            duration_secs,
        };
        let audio_bytes = voice.audio.len();

        if let Some(store) = &self.store {
            store.save(&voice).map_err(|e| {
                SpeechError::invalid_audio(format!("Failed to store reference audio: {e:#}"))
            })?;
        }

        let voice = Arc::new(voice);
        let mut entries = self.entries();
        match entries.iter().position(|entry| entry.id == id) {
            Some(index) => entries[index] = voice,
            None => entries.push(voice),
        }
        drop(entries);

        info!(reference_id = %id, audio_bytes, replaced, %container, "Stored reference voice");

        Ok(UploadAck {
            reference_id: id.to_string(),
            replaced,
            container,
            audio_bytes,
            duration_secs,
        })
    }

    pub fn get(&self, id: &str) -> Result<Arc<ReferenceVoice>, SpeechError> {
        self.entries()
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
            .ok_or_else(|| {
                debug!(reference_id = %id, "Reference lookup missed");
                SpeechError::NotFound(id.to_string())
            })
    }

    pub fn list(&self) -> Vec<ReferenceSummary> {
        self.entries()
            .iter()
            .map(|entry| ReferenceSummary {
                reference_id: entry.id.clone(),
                transcription: entry.transcription.clone(),
                created_at: entry.created_at,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn inspect_audio(&self, audio: &[u8]) -> Result<(AudioContainer, Option<f64>), SpeechError> {
        if audio.is_empty() {
            return Err(SpeechError::invalid_audio("audio payload is empty"));
        }

        if audio.len() > self.max_audio_bytes {
            return Err(SpeechError::invalid_audio(format!(
                "audio payload is {} bytes; the limit is {} bytes. Upload a shorter clip (10-30 seconds is recommended)",
                audio.len(),
                self.max_audio_bytes
            )));
        }

        let container = AudioContainer::sniff(audio).ok_or_else(|| {
            SpeechError::invalid_audio(
                "unrecognized audio container; expected wav, mp3, flac or ogg data",
            )
        })?;

        let duration_secs = match container {
            AudioContainer::Wav => Some(
                wav_duration_secs(audio)
                    .map_err(|e| SpeechError::invalid_audio(format!("{e:#}")))?,
            ),
            _ => None,
        };

        Ok((container, duration_secs))
    }
}

/// Ids double as directory names when references are persisted, so they are
/// restricted to a portable character set.
pub fn validate_reference_id(id: &str) -> Result<(), SpeechError> {
    if id.is_empty() {
        return Err(SpeechError::invalid_argument("reference_id must not be empty"));
    }

    if id.len() > MAX_ID_LEN {
        return Err(SpeechError::invalid_argument(format!(
            "reference_id must be at most {MAX_ID_LEN} characters"
        )));
    }

    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid_chars || id.starts_with('.') {
        return Err(SpeechError::invalid_argument(format!(
            "reference_id '{id}' may only contain ASCII letters, digits, '-', '_' and '.', and must not start with '.'"
        )));
    }

    Ok(())
}
