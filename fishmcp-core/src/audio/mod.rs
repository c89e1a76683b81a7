//! Raw waveforms and the output encoders offered to clients.

use std::io::Cursor;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SpeechError;

pub mod container;

pub use container::AudioContainer;

/// Audio produced by the speech model, samples in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Waveform {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    fn to_i16(&self) -> Vec<i16> {
        self.samples.iter().map(|s| quantize(*s)).collect()
    }

    #[cfg(feature = "mp3")]
    fn downmix_to_i16(&self) -> Vec<i16> {
        let channels = usize::from(self.channels.max(1));
        if channels == 1 {
            return self.to_i16();
        }
        self.samples
            .chunks(channels)
            .map(|frame| quantize(frame.iter().sum::<f32>() / frame.len() as f32))
            .collect()
    }
}

fn quantize(sample: f32) -> i16 {
    let clamped = if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    };
    (clamped * f32::from(i16::MAX)) as i16
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
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    Pcm,
}

impl AudioFormat {
    pub fn parse(raw: &str) -> Result<Self, SpeechError> {
        AudioFormat::from_str(raw.trim()).map_err(|_| SpeechError::UnsupportedFormat(raw.to_string()))
    }

    /// Whether this build can produce the format. MP3 needs the `mp3` feature.
    pub fn is_available(&self) -> bool {
        match self {
            AudioFormat::Wav | AudioFormat::Pcm => true,
            AudioFormat::Mp3 => cfg!(feature = "mp3"),
        }
    }

    pub fn encode(&self, waveform: &Waveform) -> Result<Vec<u8>, SpeechError> {
        let encoded = match self {
            AudioFormat::Wav => encode_wav(waveform),
            AudioFormat::Pcm => Ok(encode_pcm(waveform)),
            AudioFormat::Mp3 => encode_mp3(waveform),
        };
        encoded.map_err(|e| {
            if self.is_available() {
                SpeechError::InferenceError(e.context(format!("Failed to encode {self} audio")))
            } else {
                SpeechError::UnsupportedFormat(self.to_string())
            }
        })
    }
}

fn encode_wav(waveform: &Waveform) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: waveform.channels,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
        for sample in waveform.to_i16() {
            writer.write_sample(sample).context("Failed to write sample")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }
    Ok(cursor.into_inner())
}

/// Headerless interleaved 16-bit little-endian samples.
fn encode_pcm(waveform: &Waveform) -> Vec<u8> {
    waveform
        .to_i16()
        .into_iter()
        .flat_map(|sample| sample.to_le_bytes())
        .collect()
}

#[cfg(feature = "mp3")]
fn encode_mp3(waveform: &Waveform) -> Result<Vec<u8>> {
    use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, MonoPcm, Quality};

    let samples = waveform.downmix_to_i16();

    let mut builder = Builder::new().context("Failed to create LAME builder")?;
    builder
        .set_num_channels(1)
        .map_err(|e| anyhow::anyhow!("Failed to set channel count: {e:?}"))?;
    builder
        .set_sample_rate(waveform.sample_rate)
        .map_err(|e| anyhow::anyhow!("Failed to set sample rate: {e:?}"))?;
    builder
        .set_brate(Bitrate::Kbps128)
        .map_err(|e| anyhow::anyhow!("Failed to set bitrate: {e:?}"))?;
    builder
        .set_quality(Quality::Good)
        .map_err(|e| anyhow::anyhow!("Failed to set quality: {e:?}"))?;
    let mut encoder = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to initialize LAME encoder: {e:?}"))?;

    let mut output = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(samples.len()));
    encoder
        .encode_to_vec(MonoPcm(&samples), &mut output)
        .map_err(|e| anyhow::anyhow!("Failed to encode MP3: {e:?}"))?;
    // LAME needs up to 7200 bytes to flush its internal buffers.
    output.reserve(7200);
    encoder
        .flush_to_vec::<FlushNoGap>(&mut output)
        .map_err(|e| anyhow::anyhow!("Failed to flush MP3 encoder: {e:?}"))?;
    Ok(output)
}

#[cfg(not(feature = "mp3"))]
fn encode_mp3(_waveform: &Waveform) -> Result<Vec<u8>> {
    anyhow::bail!("mp3 output requires the `mp3` feature")
}
