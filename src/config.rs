use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the MP3 captioner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Audio conversion settings
    pub audio: AudioConfig,

    /// Speech recognition settings
    pub transcription: TranscriptionConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Path to the ffmpeg executable
    pub ffmpeg_path: PathBuf,

    /// Path to the ffprobe executable
    pub ffprobe_path: PathBuf,

    /// Target sample rate for the WAV intermediate
    pub target_sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Default Whisper model when none is chosen interactively
    pub model: String,

    /// Language hint for transcription (None = auto-detect)
    pub language: Option<String>,

    /// Timeout for a single transcription run (seconds)
    pub timeout: u64,

    /// Number of threads handed to the Whisper backend
    pub threads: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Append-only log file
    pub log_file: PathBuf,

    /// Where the selected input list is persisted
    pub selection_file: PathBuf,

    /// Batch report destination (None disables the report file)
    pub report_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "mp3-captioner.toml",
            "config/mp3-captioner.toml",
            "~/.config/mp3-captioner/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("loaded configuration from {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to defaults with environment overrides
        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("MP3_CAPTIONER_MODEL") {
            config.transcription.model = model;
        }

        if let Ok(ffmpeg) = std::env::var("MP3_CAPTIONER_FFMPEG") {
            config.audio.ffmpeg_path = PathBuf::from(ffmpeg);
        }

        if let Ok(ffprobe) = std::env::var("MP3_CAPTIONER_FFPROBE") {
            config.audio.ffprobe_path = PathBuf::from(ffprobe);
        }

        if let Ok(log_file) = std::env::var("MP3_CAPTIONER_LOG_FILE") {
            config.output.log_file = PathBuf::from(log_file);
        }

        if let Ok(timeout) = std::env::var("MP3_CAPTIONER_TIMEOUT") {
            config.transcription.timeout = timeout.parse().unwrap_or(3600);
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("configuration saved to {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.audio.target_sample_rate == 0 {
            return Err(anyhow!("target_sample_rate must be greater than 0"));
        }

        if self.transcription.threads == 0 {
            return Err(anyhow!("threads must be greater than 0"));
        }

        if self.transcription.timeout == 0 {
            return Err(anyhow!("timeout must be greater than 0"));
        }

        if self.transcription.model.trim().is_empty() {
            return Err(anyhow!("model must not be empty"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig {
                ffmpeg_path: PathBuf::from("ffmpeg"),
                ffprobe_path: PathBuf::from("ffprobe"),
                target_sample_rate: 16000, // Optimal for Whisper
            },
            transcription: TranscriptionConfig {
                model: "base".to_string(),
                language: None,
                timeout: 3600, // 60 minutes for long recordings
                threads: num_cpus::get().min(4) as u32,
            },
            output: OutputConfig {
                log_file: PathBuf::from("mp3_to_srt.log"),
                selection_file: PathBuf::from("mp3_files.json"),
                report_file: Some(PathBuf::from("processing_results.json")),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.config.transcription.model = model;
        self
    }

    pub fn with_ffmpeg_path(mut self, path: PathBuf) -> Self {
        self.config.audio.ffmpeg_path = path;
        self
    }

    pub fn with_ffprobe_path(mut self, path: PathBuf) -> Self {
        self.config.audio.ffprobe_path = path;
        self
    }

    pub fn with_log_file(mut self, path: PathBuf) -> Self {
        self.config.output.log_file = path;
        self
    }

    pub fn with_selection_file(mut self, path: PathBuf) -> Self {
        self.config.output.selection_file = path;
        self
    }

    pub fn with_report_file(mut self, path: Option<PathBuf>) -> Self {
        self.config.output.report_file = path;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.target_sample_rate, 16000);
        assert_eq!(config.transcription.model, "base");
        assert_eq!(config.output.log_file, PathBuf::from("mp3_to_srt.log"));
        assert!(config.transcription.threads > 0);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_model("small".to_string())
            .with_ffmpeg_path(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"))
            .with_report_file(None)
            .build();

        assert_eq!(config.transcription.model, "small");
        assert_eq!(config.audio.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert!(config.output.report_file.is_none());
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut bad = Config::default();
        bad.transcription.model = "  ".to_string();
        assert!(bad.validate().is_err());
    }
}
