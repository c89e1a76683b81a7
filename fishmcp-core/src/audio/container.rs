use std::io::Cursor;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::Waveform;

/// Container of an uploaded reference clip, detected from its magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AudioContainer {
    Wav,
    Mp3,
    Flac,
    Ogg,
}

impl AudioContainer {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some(Self::Wav),
            [b'f', b'L', b'a', b'C', ..] => Some(Self::Flac),
            [b'O', b'g', b'g', b'S', ..] => Some(Self::Ogg),
            [b'I', b'D', b'3', ..] => Some(Self::Mp3),
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => Some(Self::Mp3),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
        }
    }
}

/// Duration of a WAV payload in seconds, read from its header.
pub fn wav_duration_secs(bytes: &[u8]) -> Result<f64> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).context("Malformed WAV header")?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        anyhow::bail!("WAV header declares a sample rate of 0");
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

/// Decode a WAV payload into normalized float samples.
pub fn decode_wav(bytes: &[u8]) -> Result<Waveform> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).context("Malformed WAV header")?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read float samples")?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read integer samples")?
        }
    };

    Ok(Waveform {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;

    #[test]
    fn test_sniff_known_containers() {
        let wav = AudioFormat::Wav
            .encode(&Waveform::mono(vec![0.0; 8], 8_000))
            .unwrap();
        assert_eq!(AudioContainer::sniff(&wav), Some(AudioContainer::Wav));
        assert_eq!(AudioContainer::sniff(b"fLaC\0\0\0\x22"), Some(AudioContainer::Flac));
        assert_eq!(AudioContainer::sniff(b"OggS\0\x02"), Some(AudioContainer::Ogg));
        assert_eq!(AudioContainer::sniff(b"ID3\x04\0"), Some(AudioContainer::Mp3));
        assert_eq!(AudioContainer::sniff(&[0xFF, 0xFB, 0x90, 0x64]), Some(AudioContainer::Mp3));
    }

    #[test]
    fn test_sniff_rejects_unknown_payloads() {
        assert_eq!(AudioContainer::sniff(b""), None);
        assert_eq!(AudioContainer::sniff(b"hello world, not audio"), None);
        assert_eq!(AudioContainer::sniff(b"RIFF"), None);
    }

    #[test]
    fn test_decode_matches_encoded_duration() {
        let waveform = Waveform::mono(vec![0.25; 22_050], 44_100);
        let wav = AudioFormat::Wav.encode(&waveform).unwrap();

        assert_eq!(wav_duration_secs(&wav).unwrap(), 0.5);

        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.sample_rate, 44_100);
        assert_eq!(decoded.samples.len(), 22_050);
        assert!((decoded.samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_truncated_wav_is_an_error() {
        assert!(wav_duration_secs(b"RIFF\x24\0\0\0WAVEfmt ").is_err());
    }
}
