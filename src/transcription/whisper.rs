use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::TranscriptionConfig;

/// Transcription segment from Whisper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Recognized text
    pub text: String,
}

/// Produces timestamped transcript segments for a waveform file.
///
/// The model selector is an open string handed through to the backend
/// (conventionally one of base, small, medium, large).
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(&self, audio_path: &Path, model: &str)
        -> Result<Vec<TranscriptionSegment>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WhisperBackend {
    /// whisper.cpp via Homebrew (fastest)
    Cli,
    /// whisper.cpp
    Cpp,
    /// Python OpenAI Whisper (fallback)
    Python,
}

impl WhisperBackend {
    fn command(&self) -> &'static str {
        match self {
            WhisperBackend::Cli => "whisper-cli",
            WhisperBackend::Cpp => "whisper-cpp",
            WhisperBackend::Python => "whisper",
        }
    }
}

/// Speech recognizer shelling out to an installed Whisper backend
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: TranscriptionConfig,
    /// Resolved ggml model files, keyed by model selector. Populated at
    /// most once per selector so repeated jobs skip the filesystem scan.
    model_cache: Mutex<HashMap<String, Option<PathBuf>>>,
}

impl WhisperTranscriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self {
            config,
            model_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Check if any Whisper backend is available
    pub async fn check_availability() -> Result<String> {
        let backends = [
            ("whisper-cli", "whisper.cpp (Homebrew whisper-cli)"),
            ("whisper-cpp", "whisper.cpp (C++ implementation)"),
            ("whisper", "OpenAI Whisper (Python implementation)"),
        ];

        for (cmd_name, description) in &backends {
            if Self::check_command_available(cmd_name).await {
                return Ok(format!("{} available", description));
            }
        }

        Err(anyhow!(
            "No Whisper backend found. Please install:\n\
            - whisper.cpp (recommended): https://github.com/ggerganov/whisper.cpp\n\
            - Or OpenAI Whisper: pip install openai-whisper"
        ))
    }

    /// Model selectors every backend understands
    pub fn known_models() -> &'static [&'static str] {
        &["tiny", "base", "small", "medium", "large"]
    }

    async fn detect_backend() -> Result<WhisperBackend> {
        for backend in [
            WhisperBackend::Cli,
            WhisperBackend::Cpp,
            WhisperBackend::Python,
        ] {
            if Self::check_command_available(backend.command()).await {
                return Ok(backend);
            }
        }

        Err(anyhow!(
            "no Whisper backend found, install whisper.cpp or openai-whisper"
        ))
    }

    async fn check_command_available(cmd_name: &str) -> bool {
        Command::new(cmd_name)
            .arg("--help")
            .stdin(Stdio::null())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn candidate_model_paths(selector: &str) -> [PathBuf; 3] {
        [
            PathBuf::from(format!("models/ggml-{selector}.bin")),
            PathBuf::from(format!("/usr/local/share/whisper-cpp/ggml-{selector}.bin")),
            PathBuf::from(format!("/opt/homebrew/share/whisper-cpp/ggml-{selector}.bin")),
        ]
    }

    /// Resolve a model selector to a ggml model file, memoized per selector.
    fn resolve_model(&self, selector: &str) -> Option<PathBuf> {
        let mut cache = self.model_cache.lock().unwrap();
        if let Some(cached) = cache.get(selector) {
            return cached.clone();
        }

        let resolved = Self::candidate_model_paths(selector)
            .into_iter()
            .find(|path| path.exists());

        match &resolved {
            Some(path) => info!("🎯 model '{}' resolved to {}", selector, path.display()),
            None => warn!(
                "no ggml model file found for '{}', the backend will use its default",
                selector
            ),
        }

        cache.insert(selector.to_string(), resolved.clone());
        resolved
    }

    fn whisper_cpp_command(
        &self,
        backend: WhisperBackend,
        audio_path: &Path,
        model: &str,
        scratch_dir: &Path,
    ) -> Command {
        let output_base = scratch_dir.join("transcript");

        let mut cmd = Command::new(backend.command());
        cmd.arg("-f")
            .arg(audio_path)
            .arg("-oj")
            .arg("-of")
            .arg(&output_base)
            .args(["-t", &self.config.threads.to_string()])
            .args(["-tp", "0.0"]);

        if let Some(model_path) = self.resolve_model(model) {
            cmd.arg("-m").arg(model_path);
        }

        if let Some(language) = &self.config.language {
            cmd.args(["-l", language]);
        }

        cmd
    }

    fn python_whisper_command(
        &self,
        audio_path: &Path,
        model: &str,
        scratch_dir: &Path,
    ) -> Command {
        let mut cmd = Command::new(WhisperBackend::Python.command());
        cmd.arg(audio_path)
            .args(["--model", model])
            .arg("--output_dir")
            .arg(scratch_dir)
            .args(["--output_format", "json"])
            .args(["--verbose", "False"])
            .args(["--fp16", "False"])
            .args(["--temperature", "0.0"]);

        if let Some(language) = &self.config.language {
            cmd.args(["--language", language]);
        }

        cmd
    }

    async fn run_command(&self, mut cmd: Command, backend_name: &str) -> Result<()> {
        cmd.stdin(Stdio::null());

        let timeout = Duration::from_secs(self.config.timeout);
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| {
                anyhow!(
                    "{} timed out after {} seconds",
                    backend_name,
                    self.config.timeout
                )
            })?
            .with_context(|| format!("failed to launch {}", backend_name))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no diagnostic output")
                .trim()
                .to_string();
            return Err(anyhow!(
                "{} exited with {}: {}",
                backend_name,
                output.status,
                detail
            ));
        }

        Ok(())
    }

    async fn find_json_output(dir: &Path) -> Result<PathBuf> {
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                return Ok(path);
            }
        }

        Err(anyhow!("no JSON transcript found in {}", dir.display()))
    }

    fn segments_from(output: WhisperOutput) -> Vec<TranscriptionSegment> {
        if !output.transcription.is_empty() {
            // whisper.cpp shape: offsets carry milliseconds
            output
                .transcription
                .into_iter()
                .map(|seg| TranscriptionSegment {
                    start: seg.offsets.from as f64 / 1000.0,
                    end: seg.offsets.to as f64 / 1000.0,
                    text: seg.text.trim().to_string(),
                })
                .collect()
        } else {
            // python whisper shape: float seconds
            output
                .segments
                .into_iter()
                .map(|seg| TranscriptionSegment {
                    start: seg.start,
                    end: seg.end,
                    text: seg.text.trim().to_string(),
                })
                .collect()
        }
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperTranscriber {
    async fn recognize(
        &self,
        audio_path: &Path,
        model: &str,
    ) -> Result<Vec<TranscriptionSegment>> {
        let backend = Self::detect_backend().await?;

        info!(
            "🎤 transcribing {} with {} (model '{}')",
            audio_path.display(),
            backend.command(),
            model
        );

        let scratch_dir = TempDir::new().context("failed to create scratch directory")?;

        let cmd = match backend {
            WhisperBackend::Python => self.python_whisper_command(audio_path, model, scratch_dir.path()),
            _ => self.whisper_cpp_command(backend, audio_path, model, scratch_dir.path()),
        };

        self.run_command(cmd, backend.command()).await?;

        let json_path = Self::find_json_output(scratch_dir.path()).await?;
        let json_content = tokio::fs::read_to_string(&json_path).await?;
        let parsed: WhisperOutput = serde_json::from_str(&json_content)
            .with_context(|| format!("failed to parse {} JSON output", backend.command()))?;

        let segments = Self::segments_from(parsed);
        info!("✅ transcription produced {} segments", segments.len());

        Ok(segments)
    }
}

/// Whisper JSON output, covering both backend shapes
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<PythonSegment>,
    #[serde(default)]
    transcription: Vec<CppSegment>,
}

#[derive(Debug, Deserialize)]
struct PythonSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct CppSegment {
    offsets: CppOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct CppOffsets {
    from: u64,
    to: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_transcriber_creation() {
        let config = Config::default();
        let transcriber = WhisperTranscriber::new(config.transcription);
        assert!(transcriber.model_cache.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parse_whisper_cpp_output() {
        let json = r#"{
            "transcription": [
                {
                    "timestamps": {"from": "00:00:00,000", "to": "00:00:02,500"},
                    "offsets": {"from": 0, "to": 2500},
                    "text": " Hello there"
                },
                {
                    "timestamps": {"from": "00:00:02,500", "to": "00:00:04,000"},
                    "offsets": {"from": 2500, "to": 4000},
                    "text": " General"
                }
            ]
        }"#;

        let parsed: WhisperOutput = serde_json::from_str(json).unwrap();
        let segments = WhisperTranscriber::segments_from(parsed);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 2.5);
        assert_eq!(segments[0].text, "Hello there");
        assert_eq!(segments[1].start, 2.5);
    }

    #[test]
    fn test_parse_python_whisper_output() {
        let json = r#"{
            "text": "Hello world",
            "language": "en",
            "segments": [
                {"id": 0, "start": 0.0, "end": 1.5, "text": " Hello"},
                {"id": 1, "start": 1.5, "end": 3.0, "text": " world"}
            ]
        }"#;

        let parsed: WhisperOutput = serde_json::from_str(json).unwrap();
        let segments = WhisperTranscriber::segments_from(parsed);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].end, 3.0);
        assert_eq!(segments[1].text, "world");
    }

    #[test]
    fn test_model_resolution_is_memoized() {
        let config = Config::default();
        let transcriber = WhisperTranscriber::new(config.transcription);

        let first = transcriber.resolve_model("no-such-model");
        let second = transcriber.resolve_model("no-such-model");
        assert_eq!(first, second);
        assert_eq!(transcriber.model_cache.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_known_models() {
        let models = WhisperTranscriber::known_models();
        assert!(models.contains(&"base"));
        assert!(models.contains(&"large"));
    }

    #[test]
    fn test_backend_availability_probe() {
        // Passes regardless of which backends the host has installed
        tokio_test::block_on(async {
            let _ = WhisperTranscriber::check_availability().await;
        });
    }
}
