//! FFmpeg locator and encoder.
//!
//! Provides cross-platform ffmpeg binary discovery. Checks standard installation
//! locations before falling back to PATH search, so ffmpeg is found even when
//! running with a limited PATH. Recordings in compressed formats are produced by
//! running the captured WAV through ffmpeg, and only formats whose encoder the
//! installed build lists are offered.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::anyhow;

use super::artifact::AudioFormat;
use crate::error::{PipelineError, Result};

/// Locates the ffmpeg binary on the system.
///
/// Checks in this order:
/// 1. macOS homebrew locations: `/opt/homebrew/bin/ffmpeg`, `/usr/local/bin/ffmpeg`
/// 2. Linux standard locations: `/usr/bin/ffmpeg`, `/usr/local/bin/ffmpeg`
/// 3. Windows standard locations: `C:\ffmpeg\bin\ffmpeg.exe`
/// 4. Falls back to PATH search via `which` or `where` command
pub fn find_ffmpeg() -> anyhow::Result<PathBuf> {
    let candidates = if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/opt/homebrew/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/usr/bin/ffmpeg"),
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            PathBuf::from("/usr/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/snap/bin/ffmpeg"),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin\\ffmpeg.exe"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"),
        ]
    } else {
        vec![]
    };

    if let Some(path) = candidates.into_iter().find(|path| path.exists()) {
        tracing::debug!("Found ffmpeg at: {}", path.display());
        return Ok(path);
    }

    let ffmpeg_path = find_in_path("ffmpeg").map_err(|_| {
        anyhow!(
            "ffmpeg not found. Please install ffmpeg:\n\
             macOS: brew install ffmpeg\n\
             Linux: apt install ffmpeg (Debian/Ubuntu) or dnf install ffmpeg (Fedora)\n\
             Windows: Download from https://ffmpeg.org/download.html"
        )
    })?;
    tracing::debug!("Found ffmpeg in PATH at: {}", ffmpeg_path.display());
    Ok(ffmpeg_path)
}

/// Compressed formats the installed ffmpeg can encode. Empty without ffmpeg.
pub fn encodable_formats() -> Vec<AudioFormat> {
    match find_ffmpeg() {
        Ok(path) => encodable_formats_with(&path),
        Err(e) => {
            tracing::debug!("No compressed formats available: {}", e);
            Vec::new()
        }
    }
}

/// Asks the ffmpeg at `ffmpeg_path` which of the compressed formats it has encoders for.
pub fn encodable_formats_with(ffmpeg_path: &Path) -> Vec<AudioFormat> {
    let output = match Command::new(ffmpeg_path)
        .arg("-hide_banner")
        .arg("-encoders")
        .output()
    {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            tracing::warn!("ffmpeg -encoders exited with {}", output.status);
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Failed to list ffmpeg encoders: {}", e);
            return Vec::new();
        }
    };

    let listing = String::from_utf8_lossy(&output.stdout);
    let encoders: Vec<&str> = listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .collect();

    let formats: Vec<AudioFormat> = [
        AudioFormat::Webm,
        AudioFormat::Ogg,
        AudioFormat::Mp3,
        AudioFormat::Flac,
        AudioFormat::M4a,
    ]
    .into_iter()
    .filter(|format| format.encoder().is_some_and(|name| encoders.contains(&name)))
    .collect();
    tracing::debug!("ffmpeg can encode: {:?}", formats);
    formats
}

/// Searches for a binary in the system PATH.
///
/// Uses `which` on Unix systems and `where` on Windows.
pub(crate) fn find_in_path(binary_name: &str) -> anyhow::Result<PathBuf> {
    let search_cmd = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let output = Command::new(search_cmd)
        .arg(binary_name)
        .output()
        .map_err(|e| anyhow!("Failed to search PATH for {binary_name}: {e}"))?;

    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        if let Some(first) = path_str.lines().next() {
            let path = PathBuf::from(first.trim());
            if !path.as_os_str().is_empty() {
                return Ok(path);
            }
        }
    }

    Err(anyhow!("{binary_name} not found in PATH"))
}

/// Converts an in-memory WAV recording into `format`.
///
/// WAV input is returned unchanged when `format` is WAV. Mono output is
/// always enforced.
pub fn transcode(wav: &[u8], format: AudioFormat) -> Result<Vec<u8>> {
    if format.ffmpeg_args().is_none() {
        return Ok(wav.to_vec());
    }
    let ffmpeg_path = find_ffmpeg().map_err(|e| PipelineError::Encoding(e.to_string()))?;
    transcode_with(&ffmpeg_path, wav, format)
}

/// Same as [`transcode`] with an explicit ffmpeg binary.
pub fn transcode_with(ffmpeg_path: &Path, wav: &[u8], format: AudioFormat) -> Result<Vec<u8>> {
    let Some(codec_args) = format.ffmpeg_args() else {
        return Ok(wav.to_vec());
    };

    let workdir = std::env::temp_dir().join(format!("rhetor_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&workdir).map_err(|e| PipelineError::Encoding(e.to_string()))?;
    let input = workdir.join("capture.wav");
    let output = workdir.join(format!("capture.{}", format.extension()));

    let result = (|| {
        std::fs::write(&input, wav).map_err(|e| PipelineError::Encoding(e.to_string()))?;

        let mut cmd = Command::new(ffmpeg_path);
        cmd.arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(&input)
            .args(codec_args)
            .arg("-ac")
            .arg("1")
            .arg("-y")
            .arg(&output);

        let run = cmd
            .output()
            .map_err(|e| PipelineError::Encoding(format!("failed to run ffmpeg: {e}")))?;
        if !run.status.success() {
            let error_msg = String::from_utf8_lossy(&run.stderr);
            tracing::error!("ffmpeg conversion failed: {}", error_msg);
            return Err(PipelineError::Encoding(error_msg.trim().to_string()));
        }
        std::fs::read(&output).map_err(|e| PipelineError::Encoding(e.to_string()))
    })();

    if let Err(e) = std::fs::remove_dir_all(&workdir) {
        tracing::debug!("Failed to remove encoder workdir: {}", e);
    }

    let encoded = result?;
    tracing::debug!(
        "Audio converted to {} ({} -> {} bytes)",
        format,
        wav.len(),
        encoded.len()
    );
    Ok(encoded)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::recording::artifact::encode_wav;

    /// Writes an ffmpeg stand-in that lists mp3 and aac encoders and fails
    /// every conversion the way a build without libopus does.
    #[cfg(unix)]
    pub(crate) fn ffmpeg_without_opus(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(
            &path,
            "#!/bin/sh\n\
             case \"$*\" in\n\
               *-encoders*)\n\
                 echo 'Encoders:'\n\
                 echo ' ------'\n\
                 echo ' V..... libx264              H.264'\n\
                 echo ' A....D libmp3lame           MP3 (MPEG audio layer 3)'\n\
                 echo ' A..... aac                  AAC (Advanced Audio Coding)'\n\
                 exit 0;;\n\
             esac\n\
             echo \"Unknown encoder 'libopus'\" >&2\n\
             exit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_encoder_listing_limits_formats() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = ffmpeg_without_opus(dir.path());
        assert_eq!(
            encodable_formats_with(&ffmpeg),
            vec![AudioFormat::Mp3, AudioFormat::M4a]
        );
        assert!(encodable_formats_with(&dir.path().join("missing")).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_conversion_reports_encoder_error() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = ffmpeg_without_opus(dir.path());
        let wav = encode_wav(&[1, 2, 3], 16000).unwrap();
        assert_eq!(
            transcode_with(&ffmpeg, &wav, AudioFormat::Webm),
            Err(PipelineError::Encoding(
                "Unknown encoder 'libopus'".to_string()
            ))
        );
    }

    #[test]
    fn test_wav_passes_through() {
        let wav = encode_wav(&[1, 2, 3], 16000).unwrap();
        assert_eq!(transcode(&wav, AudioFormat::Wav).unwrap(), wav);
    }

    #[test]
    fn test_transcode_to_ogg_when_available() {
        // Only meaningful where the installed ffmpeg has libopus
        if !encodable_formats().contains(&AudioFormat::Ogg) {
            return;
        }
        let tone: Vec<i16> = (0..16000)
            .map(|n| ((n as f32 * 0.05).sin() * 8000.0) as i16)
            .collect();
        let wav = encode_wav(&tone, 16000).unwrap();
        let ogg = transcode(&wav, AudioFormat::Ogg).unwrap();
        assert_eq!(AudioFormat::detect(&ogg), Some(AudioFormat::Ogg));
    }
}
