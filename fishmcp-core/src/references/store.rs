//! On-disk mirror of the reference registry.
//!
//! Each reference lives in `<root>/<id>/` as an `audio-<stamp>.<ext>` clip
//! plus a `reference.json` metadata file naming it. A save writes a fresh
//! clip, then commits by renaming the new metadata over the old. Until that
//! rename the previous metadata and clip are untouched, so a failed save
//! leaves the previous reference loadable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{validate_reference_id, ReferenceVoice};
use crate::audio::container::wav_duration_secs;
use crate::audio::AudioContainer;

const METADATA_FILE: &str = "reference.json";
const METADATA_TMP_FILE: &str = "reference.json.tmp";
const AUDIO_STEM: &str = "audio";

#[derive(Debug, Serialize, Deserialize)]
struct StoredReference {
    reference_id: String,
    transcription: String,
    created_at: DateTime<Utc>,
    /// Position in the listing. Older files without it sort by `created_at`.
    #[serde(default)]
    sequence: u64,
    audio_file: String,
}

#[derive(Debug, Clone)]
pub struct ReferenceStore {
    root: PathBuf,
}

impl ReferenceStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a reference to disk, replacing any previous clip with the same id.
    pub fn save(&self, voice: &ReferenceVoice) -> Result<()> {
        let dir = self.root.join(&voice.id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create reference directory: {}", dir.display()))?;

        let audio_file = format!(
            "{AUDIO_STEM}-{}.{}",
            voice.created_at.format("%Y%m%dT%H%M%S%.9f"),
            voice.container.extension()
        );
        let audio_path = dir.join(&audio_file);

        if let Err(e) = write_and_commit(&dir, &audio_path, &audio_file, voice) {
            remove_if_present(&audio_path);
            return Err(e);
        }

        remove_stale_audio(&dir, &audio_file);
        Ok(())
    }

    /// Load every complete reference, oldest first. Entries that cannot be
    /// read are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<ReferenceVoice>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read references dir: {}", self.root.display()))?;

        let mut voices = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to read references dir: {}", self.root.display()))?
                .path();
            if !path.is_dir() {
                continue;
            }

            match load_one(&path) {
                Ok(Some(voice)) => voices.push(voice),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = ?e, "Skipping unreadable reference"),
            }
        }

        voices.sort_by_key(|voice| (voice.sequence, voice.created_at));
        Ok(voices)
    }
}

fn write_and_commit(
    dir: &Path,
    audio_path: &Path,
    audio_file: &str,
    voice: &ReferenceVoice,
) -> Result<()> {
    fs::write(audio_path, &voice.audio)
        .with_context(|| format!("Failed to write reference audio: {}", audio_path.display()))?;

    let metadata = StoredReference {
        reference_id: voice.id.clone(),
        transcription: voice.transcription.clone(),
        created_at: voice.created_at,
        sequence: voice.sequence,
        audio_file: audio_file.to_string(),
    };
    let content =
        serde_json::to_string_pretty(&metadata).context("Failed to serialize reference")?;

    let tmp_path = dir.join(METADATA_TMP_FILE);
    fs::write(&tmp_path, content).with_context(|| {
        format!("Failed to write reference metadata: {}", tmp_path.display())
    })?;

    let metadata_path = dir.join(METADATA_FILE);
    fs::rename(&tmp_path, &metadata_path).with_context(|| {
        format!("Failed to commit reference metadata: {}", metadata_path.display())
    })
}

/// Remove clips left over from earlier saves. The new metadata is already
/// committed, so failures here only leave garbage behind.
fn remove_stale_audio(dir: &Path, keep: &str) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to scan for stale reference audio");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name != keep && name.starts_with(AUDIO_STEM) {
            remove_if_present(&entry.path());
        }
    }
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove reference audio"),
    }
}

fn load_one(dir: &Path) -> Result<Option<ReferenceVoice>> {
    let metadata_path = dir.join(METADATA_FILE);
    if !metadata_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&metadata_path)
        .with_context(|| format!("Failed to read {}", metadata_path.display()))?;
    let metadata: StoredReference = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", metadata_path.display()))?;

    validate_reference_id(&metadata.reference_id)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let audio_path = dir.join(&metadata.audio_file);
    let audio = fs::read(&audio_path)
        .with_context(|| format!("Failed to read {}", audio_path.display()))?;

    let container = AudioContainer::sniff(&audio)
        .with_context(|| format!("Unrecognized audio in {}", audio_path.display()))?;
    let duration_secs = match container {
        AudioContainer::Wav => Some(wav_duration_secs(&audio)?),
        _ => None,
    };

    Ok(Some(ReferenceVoice {
        id: metadata.reference_id,
        audio,
        transcription: metadata.transcription,
        created_at: metadata.created_at,
        sequence: metadata.sequence,
        container,
        duration_secs,
    }))
}
