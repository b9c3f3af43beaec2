use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AudioConfig;

/// Decodes a compressed audio file into a waveform file at the given path.
///
/// Implementations fail on unsupported or corrupt input and on a missing
/// codec toolchain.
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Audio stream information reported by ffprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    pub path: PathBuf,
    pub duration: Duration,
    pub sample_rate: u32,
    pub channels: u32,
    pub file_size: u64,
}

/// MP3 to WAV converter backed by the ffmpeg toolchain
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    target_sample_rate: u32,
}

impl FfmpegConverter {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            target_sample_rate: config.target_sample_rate,
        }
    }

    /// Get detailed information about a decoded waveform
    pub async fn probe(&self, audio_path: &Path) -> Result<AudioInfo> {
        let output = tokio::process::Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "a:0",
            ])
            .arg(audio_path)
            .output()
            .await
            .with_context(|| format!("failed to launch {}", self.ffprobe.display()))?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", audio_path.display()));
        }

        let ffprobe_data: serde_json::Value = serde_json::from_slice(&output.stdout)?;

        let audio_stream = ffprobe_data["streams"]
            .as_array()
            .and_then(|streams| streams.first())
            .ok_or_else(|| anyhow!("no audio stream found in {}", audio_path.display()))?;

        let duration_seconds: f64 = ffprobe_data["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);

        let file_size = tokio::fs::metadata(audio_path).await?.len();

        Ok(AudioInfo {
            path: audio_path.to_path_buf(),
            duration: Duration::from_secs_f64(duration_seconds),
            sample_rate: audio_stream["sample_rate"]
                .as_str()
                .and_then(|s| s.parse().ok())
                .unwrap_or(self.target_sample_rate),
            channels: audio_stream["channels"].as_u64().unwrap_or(1) as u32,
            file_size,
        })
    }
}

#[async_trait]
impl AudioDecoder for FfmpegConverter {
    async fn decode(&self, input: &Path, output: &Path) -> Result<()> {
        info!("🎵 converting {} to WAV", input.display());

        let result = tokio::process::Command::new(&self.ffmpeg)
            .arg("-i")
            .arg(input)
            .args(["-vn", "-acodec", "pcm_s16le"])
            .args(["-ar", &self.target_sample_rate.to_string()])
            .args(["-ac", "1", "-f", "wav", "-y"])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| {
                format!(
                    "failed to launch {} (is ffmpeg installed?)",
                    self.ffmpeg.display()
                )
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let detail = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no diagnostic output")
                .trim()
                .to_string();
            return Err(anyhow!(
                "ffmpeg exited with {} for {}: {}",
                result.status,
                input.display(),
                detail
            ));
        }

        match self.probe(output).await {
            Ok(info) => info!(
                "✅ WAV written: {} ({:.1}s, {}Hz)",
                output.display(),
                info.duration.as_secs_f64(),
                info.sample_rate
            ),
            Err(e) => {
                debug!("ffprobe skipped for {}: {}", output.display(), e);
                info!("✅ WAV written to {}", output.display());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    #[test]
    fn test_converter_creation() {
        let config = Config::default();
        let converter = FfmpegConverter::new(&config.audio);
        assert_eq!(converter.target_sample_rate, 16000);
        assert_eq!(converter.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[tokio::test]
    async fn test_decode_with_missing_toolchain() {
        let mut config = Config::default();
        config.audio.ffmpeg_path = PathBuf::from("/nonexistent/bin/ffmpeg");
        let converter = FfmpegConverter::new(&config.audio);

        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("input.mp3");
        let output = temp_dir.path().join("input.wav");
        tokio::fs::write(&input, b"not really an mp3").await.unwrap();

        let result = converter.decode(&input, &output).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("failed to launch"));
    }
}
