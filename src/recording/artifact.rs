//! Finished recordings and the encodings they can carry.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use hound::WavWriter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Container and codec of an audio payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// WebM container with Opus audio
    Webm,
    /// Ogg container with Opus audio
    Ogg,
    Mp3,
    /// 16-bit PCM, encoded in-process
    Wav,
    Flac,
    /// MPEG-4 audio (AAC)
    M4a,
}

impl AudioFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Webm => "audio/webm",
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Flac => "audio/flac",
            Self::M4a => "audio/mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::M4a => "m4a",
        }
    }

    /// Codec arguments passed to ffmpeg when encoding into this format.
    ///
    /// `None` for WAV, which never needs ffmpeg.
    pub fn ffmpeg_args(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Webm => Some(&["-acodec", "libopus", "-b:a", "32k"]),
            Self::Ogg => Some(&["-acodec", "libopus", "-b:a", "32k"]),
            Self::Mp3 => Some(&["-acodec", "libmp3lame", "-ab", "64k"]),
            Self::Flac => Some(&["-acodec", "flac"]),
            Self::M4a => Some(&["-acodec", "aac", "-b:a", "64k"]),
            Self::Wav => None,
        }
    }

    /// Identifies an audio payload by its leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0x1A, 0x45, 0xDF, 0xA3, ..] => Some(Self::Webm),
            [b'O', b'g', b'g', b'S', ..] => Some(Self::Ogg),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some(Self::Wav),
            [b'f', b'L', b'a', b'C', ..] => Some(Self::Flac),
            [b'I', b'D', b'3', ..] => Some(Self::Mp3),
            // MPEG audio frame sync with a non-reserved layer (ADTS AAC has layer 00)
            [0xFF, second, ..] if second & 0xE0 == 0xE0 && second & 0x06 != 0 => Some(Self::Mp3),
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => Some(Self::M4a),
            _ => None,
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "webm" => Some(Self::Webm),
            "ogg" | "opus" | "oga" => Some(Self::Ogg),
            "mp3" => Some(Self::Mp3),
            "wav" | "wave" => Some(Self::Wav),
            "flac" => Some(Self::Flac),
            "m4a" | "mp4" | "aac" => Some(Self::M4a),
            _ => None,
        }
    }

    /// Name of the ffmpeg encoder this format needs, `None` for WAV.
    pub fn encoder(self) -> Option<&'static str> {
        match self {
            Self::Webm | Self::Ogg => Some("libopus"),
            Self::Mp3 => Some("libmp3lame"),
            Self::Flac => Some("flac"),
            Self::M4a => Some("aac"),
            Self::Wav => None,
        }
    }

    /// Whether recordings can be produced in this format given the formats
    /// the installed ffmpeg can encode.
    pub fn is_supported(self, encodable: &[AudioFormat]) -> bool {
        self == Self::Wav || encodable.contains(&self)
    }

    /// Picks the first supported entry of `preferred`, falling back to WAV.
    pub fn negotiate(preferred: &[AudioFormat], encodable: &[AudioFormat]) -> AudioFormat {
        let chosen = preferred
            .iter()
            .copied()
            .find(|format| format.is_supported(encodable))
            .unwrap_or(Self::Wav);
        tracing::debug!(
            "Negotiated recording format {} (encodable: {:?})",
            chosen,
            encodable
        );
        chosen
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Immutable audio payload produced by a recording or read from a file.
///
/// Cloning shares the payload, so playback and upload can hold the same
/// artifact without copying it.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    id: Uuid,
    payload: Arc<[u8]>,
    format: AudioFormat,
    duration: Option<Duration>,
    created_at: DateTime<Local>,
    name: Option<String>,
}

impl AudioArtifact {
    pub fn new(payload: Vec<u8>, format: AudioFormat, duration: Option<Duration>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: payload.into(),
            format,
            duration,
            created_at: Local::now(),
            name: None,
        }
    }

    /// Reads an audio file, rejecting anything that is not a recognizable audio container.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::InvalidInputFormat(format!("{}: {e}", path.display()))
        })?;
        let format = AudioFormat::detect(&bytes).ok_or_else(|| {
            tracing::warn!("Rejected {}: unrecognized audio signature", path.display());
            PipelineError::InvalidInputFormat(path.display().to_string())
        })?;

        tracing::info!(
            "Loaded {} ({} bytes, format: {})",
            path.display(),
            bytes.len(),
            format
        );
        let mut artifact = Self::new(bytes, format, None);
        artifact.name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(artifact)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Wall-clock duration, when known without decoding.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    /// File name attached to the upload, always carrying the format's extension.
    pub fn upload_name(&self) -> String {
        match &self.name {
            Some(name)
                if Path::new(name)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(AudioFormat::from_extension)
                    == Some(self.format) =>
            {
                name.clone()
            }
            _ => format!(
                "recording-{}.{}",
                self.created_at.format("%Y%m%d-%H%M%S"),
                self.format.extension()
            ),
        }
    }
}

/// Encodes mono 16-bit samples as a WAV file in memory.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| PipelineError::Encoding(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| PipelineError::Encoding(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| PipelineError::Encoding(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_common_signatures() {
        let wav = encode_wav(&[0, 1, -1], 16000).unwrap();
        assert_eq!(AudioFormat::detect(&wav), Some(AudioFormat::Wav));
        assert_eq!(
            AudioFormat::detect(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]),
            Some(AudioFormat::Webm)
        );
        assert_eq!(AudioFormat::detect(b"OggS\0\x02"), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::detect(b"ID3\x04\0"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::detect(&[0xFF, 0xFB, 0x90]), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::detect(b"fLaC\0\0"), Some(AudioFormat::Flac));
        assert_eq!(
            AudioFormat::detect(b"\0\0\0\x20ftypM4A "),
            Some(AudioFormat::M4a)
        );
    }

    #[test]
    fn test_rejects_non_audio() {
        assert_eq!(AudioFormat::detect(b"%PDF-1.7"), None);
        assert_eq!(AudioFormat::detect(b"\x89PNG\r\n"), None);
        assert_eq!(AudioFormat::detect(&[0xFF, 0xF1, 0x50]), None);
        assert_eq!(AudioFormat::detect(&[]), None);
    }

    #[test]
    fn test_negotiation_prefers_first_supported() {
        let preferred = [AudioFormat::Webm, AudioFormat::Mp3, AudioFormat::Wav];
        let everything = [AudioFormat::Webm, AudioFormat::Ogg, AudioFormat::Mp3];
        assert_eq!(AudioFormat::negotiate(&preferred, &everything), AudioFormat::Webm);
        assert_eq!(AudioFormat::negotiate(&preferred, &[]), AudioFormat::Wav);
        assert_eq!(AudioFormat::negotiate(&[AudioFormat::Ogg], &[]), AudioFormat::Wav);
        assert_eq!(AudioFormat::negotiate(&[], &everything), AudioFormat::Wav);
    }

    #[test]
    fn test_negotiation_skips_formats_without_encoder() {
        // An ffmpeg built without libopus can still produce mp3
        let preferred = [AudioFormat::Webm, AudioFormat::Ogg, AudioFormat::Mp3];
        assert_eq!(
            AudioFormat::negotiate(&preferred, &[AudioFormat::Mp3]),
            AudioFormat::Mp3
        );
        assert_eq!(AudioFormat::Webm.encoder(), Some("libopus"));
        assert_eq!(AudioFormat::Wav.encoder(), None);
    }

    #[test]
    fn test_empty_wav_is_header_only() {
        let wav = encode_wav(&[], 16000).unwrap();
        assert_eq!(wav.len(), 44);
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.len(), 0);
    }

    #[test]
    fn test_from_file_rejects_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp3");
        std::fs::write(&path, "not audio at all").unwrap();
        assert!(matches!(
            AudioArtifact::from_file(&path),
            Err(PipelineError::InvalidInputFormat(_))
        ));
    }

    #[test]
    fn test_upload_name_follows_detected_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.wav");
        std::fs::write(&path, encode_wav(&[1, 2, 3], 8000).unwrap()).unwrap();
        let artifact = AudioArtifact::from_file(&path).unwrap();
        assert_eq!(artifact.upload_name(), "talk.wav");
        assert_eq!(artifact.duration(), None);

        // Mislabelled file: the extension is replaced by the detected one
        let mislabelled = dir.path().join("talk.mp3");
        std::fs::write(&mislabelled, encode_wav(&[1], 8000).unwrap()).unwrap();
        let artifact = AudioArtifact::from_file(&mislabelled).unwrap();
        assert!(artifact.upload_name().ends_with(".wav"));
    }
}
