use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::audio::{AudioDecoder, FfmpegConverter};
use crate::config::Config;
use crate::transcription::srt;
use crate::transcription::whisper::{SpeechRecognizer, WhisperTranscriber};

/// Processing stages in the captioning pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStage {
    /// Input path checks before any work starts
    Validation,

    /// MP3 to WAV conversion
    AudioConversion,

    /// Speech-to-text transcription
    Transcription,

    /// SRT rendering and persistence
    SubtitleGeneration,

    /// Job finished and intermediate cleaned up
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Completed,
    Failed,
}

/// Outcome record for a single input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub input_path: PathBuf,
    pub subtitle_path: Option<PathBuf>,
    pub status: JobStatus,
    pub failed_stage: Option<ProcessingStage>,
    pub error_message: Option<String>,
    pub stages_completed: Vec<ProcessingStage>,
    pub processing_time: Duration,
}

/// Overall batch processing results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_time: Duration,
    pub outcomes: Vec<JobOutcome>,
}

/// Scratch and output paths for one input file, derived by extension
/// substitution. The wav intermediate is owned by the job and deleted
/// once the job reaches a terminal state.
#[derive(Debug, Clone)]
struct JobSpec {
    input: PathBuf,
    wav: PathBuf,
    srt: PathBuf,
}

impl JobSpec {
    fn for_input(input: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            wav: input.with_extension("wav"),
            srt: input.with_extension("srt"),
        }
    }
}

struct StageFailure {
    stage: ProcessingStage,
    message: String,
}

/// Sequential batch processor: one file at a time, one outcome per file.
///
/// A failing job never aborts the batch; its error is logged, recorded in
/// the outcome, and the next file starts.
pub struct BatchProcessor {
    config: Config,
    decoder: Box<dyn AudioDecoder>,
    recognizer: Box<dyn SpeechRecognizer>,
}

impl BatchProcessor {
    pub fn new(config: Config) -> Self {
        let decoder = Box::new(FfmpegConverter::new(&config.audio));
        let recognizer = Box::new(WhisperTranscriber::new(config.transcription.clone()));
        Self {
            config,
            decoder,
            recognizer,
        }
    }

    /// Build a processor with custom collaborators
    pub fn with_collaborators(
        config: Config,
        decoder: Box<dyn AudioDecoder>,
        recognizer: Box<dyn SpeechRecognizer>,
    ) -> Self {
        Self {
            config,
            decoder,
            recognizer,
        }
    }

    /// Process all inputs in order and return the aggregated report.
    pub async fn process_batch(&self, inputs: &[PathBuf], model: &str) -> BatchReport {
        let start = Instant::now();

        info!(
            "🚀 processing {} file(s) with model '{}'",
            inputs.len(),
            model
        );

        let mut outcomes = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            info!("📁 file {}/{}: {}", index + 1, inputs.len(), input.display());
            outcomes.push(self.process_file(input, model).await);
        }

        let successful = outcomes
            .iter()
            .filter(|outcome| outcome.status == JobStatus::Completed)
            .count();

        let report = BatchReport {
            total: outcomes.len(),
            successful,
            failed: outcomes.len() - successful,
            total_time: start.elapsed(),
            outcomes,
        };

        if let Some(report_file) = &self.config.output.report_file {
            if let Err(e) = Self::save_report(&report, report_file).await {
                warn!("failed to save batch report: {}", e);
            }
        }

        report
    }

    async fn process_file(&self, input: &Path, model: &str) -> JobOutcome {
        let start = Instant::now();
        let job = JobSpec::for_input(input);
        let mut stages_completed = Vec::new();

        // No intermediate exists yet, so a validation failure skips cleanup:
        // a sibling .wav at the derived path is not owned by this job.
        if let Err(failure) = Self::validate(&job) {
            error!("❌ {}: {}", job.input.display(), failure.message);
            return Self::failed_outcome(&job, failure, stages_completed, start.elapsed());
        }
        stages_completed.push(ProcessingStage::Validation);

        let result = self.run_stages(&job, model, &mut stages_completed).await;

        // Terminal state reached; the intermediate goes away on success and
        // failure alike, exactly once per job.
        self.remove_intermediate(&job).await;

        match result {
            Ok(()) => {
                stages_completed.push(ProcessingStage::Completed);
                info!("💾 subtitles saved to {}", job.srt.display());
                JobOutcome {
                    input_path: job.input,
                    subtitle_path: Some(job.srt),
                    status: JobStatus::Completed,
                    failed_stage: None,
                    error_message: None,
                    stages_completed,
                    processing_time: start.elapsed(),
                }
            }
            Err(failure) => {
                error!(
                    "❌ {} failed during {:?}: {}",
                    job.input.display(),
                    failure.stage,
                    failure.message
                );
                Self::failed_outcome(&job, failure, stages_completed, start.elapsed())
            }
        }
    }

    fn validate(job: &JobSpec) -> Result<(), StageFailure> {
        if !job.input.exists() {
            return Err(StageFailure {
                stage: ProcessingStage::Validation,
                message: "input file not found, skipping".to_string(),
            });
        }

        if job.wav == job.input {
            return Err(StageFailure {
                stage: ProcessingStage::Validation,
                message: "input already uses the .wav extension, conversion would overwrite it"
                    .to_string(),
            });
        }

        Ok(())
    }

    async fn run_stages(
        &self,
        job: &JobSpec,
        model: &str,
        stages_completed: &mut Vec<ProcessingStage>,
    ) -> Result<(), StageFailure> {
        self.decoder
            .decode(&job.input, &job.wav)
            .await
            .map_err(|e| StageFailure {
                stage: ProcessingStage::AudioConversion,
                message: format!("{:#}", e),
            })?;
        stages_completed.push(ProcessingStage::AudioConversion);

        let segments = self
            .recognizer
            .recognize(&job.wav, model)
            .await
            .map_err(|e| StageFailure {
                stage: ProcessingStage::Transcription,
                message: format!("{:#}", e),
            })?;
        stages_completed.push(ProcessingStage::Transcription);

        let content = srt::render(&segments).map_err(|e| StageFailure {
            stage: ProcessingStage::SubtitleGeneration,
            message: e.to_string(),
        })?;
        tokio::fs::write(&job.srt, content)
            .await
            .map_err(|e| StageFailure {
                stage: ProcessingStage::SubtitleGeneration,
                message: format!("failed to write {}: {}", job.srt.display(), e),
            })?;
        stages_completed.push(ProcessingStage::SubtitleGeneration);

        Ok(())
    }

    async fn remove_intermediate(&self, job: &JobSpec) {
        match tokio::fs::remove_file(&job.wav).await {
            Ok(()) => info!("🧹 removed intermediate {}", job.wav.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "failed to remove intermediate {}: {}",
                job.wav.display(),
                e
            ),
        }
    }

    fn failed_outcome(
        job: &JobSpec,
        failure: StageFailure,
        stages_completed: Vec<ProcessingStage>,
        elapsed: Duration,
    ) -> JobOutcome {
        JobOutcome {
            input_path: job.input.clone(),
            subtitle_path: None,
            status: JobStatus::Failed,
            failed_stage: Some(failure.stage),
            error_message: Some(failure.message),
            stages_completed,
            processing_time: elapsed,
        }
    }

    async fn save_report(report: &BatchReport, path: &Path) -> Result<()> {
        let json_data = serde_json::to_string_pretty(report)?;
        tokio::fs::write(path, json_data).await?;
        info!("💾 batch report saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::transcription::whisper::TranscriptionSegment;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StubDecoder {
        fail: bool,
    }

    #[async_trait]
    impl AudioDecoder for StubDecoder {
        async fn decode(&self, _input: &Path, output: &Path) -> Result<()> {
            // Write the intermediate first so cleanup has something to do
            // even when the conversion "fails" halfway.
            tokio::fs::write(output, b"RIFF").await?;
            if self.fail {
                return Err(anyhow!("unsupported codec"));
            }
            Ok(())
        }
    }

    struct StubRecognizer {
        segments: Vec<TranscriptionSegment>,
        fail: bool,
    }

    #[async_trait]
    impl SpeechRecognizer for StubRecognizer {
        async fn recognize(
            &self,
            _audio_path: &Path,
            _model: &str,
        ) -> Result<Vec<TranscriptionSegment>> {
            if self.fail {
                return Err(anyhow!("model exploded"));
            }
            Ok(self.segments.clone())
        }
    }

    fn segment(start: f64, end: f64, text: &str) -> TranscriptionSegment {
        TranscriptionSegment {
            start,
            end,
            text: text.to_string(),
        }
    }

    fn sample_segments() -> Vec<TranscriptionSegment> {
        vec![segment(0.0, 1.5, "Hello"), segment(1.5, 3.0, "World")]
    }

    fn processor(decoder: StubDecoder, recognizer: StubRecognizer) -> BatchProcessor {
        let config = ConfigBuilder::new().with_report_file(None).build();
        BatchProcessor::with_collaborators(config, Box::new(decoder), Box::new(recognizer))
    }

    async fn make_input(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, b"mp3 bytes").await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_successful_job_writes_subtitles_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let input = make_input(&dir, "talk.mp3").await;

        let p = processor(
            StubDecoder { fail: false },
            StubRecognizer {
                segments: sample_segments(),
                fail: false,
            },
        );
        let report = p.process_batch(&[input.clone()], "base").await;

        assert_eq!(report.total, 1);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 0);

        let content = tokio::fs::read_to_string(input.with_extension("srt"))
            .await
            .unwrap();
        assert_eq!(
            content,
            "1\n00:00:00,000 --> 00:00:01,500\nHello\n\n\
             2\n00:00:01,500 --> 00:00:03,000\nWorld\n\n"
        );
        assert!(!input.with_extension("wav").exists());

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, JobStatus::Completed);
        assert_eq!(outcome.subtitle_path, Some(input.with_extension("srt")));
        assert!(outcome
            .stages_completed
            .contains(&ProcessingStage::Completed));
    }

    #[tokio::test]
    async fn test_missing_input_is_skipped_without_artifacts() {
        let dir = TempDir::new().unwrap();
        let valid = make_input(&dir, "real.mp3").await;
        let missing = dir.path().join("ghost.mp3");

        let p = processor(
            StubDecoder { fail: false },
            StubRecognizer {
                segments: sample_segments(),
                fail: false,
            },
        );
        let report = p
            .process_batch(&[valid.clone(), missing.clone()], "base")
            .await;

        assert_eq!(report.total, 2);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);

        assert!(valid.with_extension("srt").exists());

        let ghost_outcome = &report.outcomes[1];
        assert_eq!(ghost_outcome.status, JobStatus::Failed);
        assert_eq!(ghost_outcome.failed_stage, Some(ProcessingStage::Validation));
        assert!(!missing.with_extension("wav").exists());
        assert!(!missing.with_extension("srt").exists());
    }

    #[tokio::test]
    async fn test_decode_failure_cleans_up_intermediate() {
        let dir = TempDir::new().unwrap();
        let input = make_input(&dir, "broken.mp3").await;

        let p = processor(
            StubDecoder { fail: true },
            StubRecognizer {
                segments: sample_segments(),
                fail: false,
            },
        );
        let report = p.process_batch(&[input.clone()], "base").await;

        assert_eq!(report.failed, 1);
        let outcome = &report.outcomes[0];
        assert_eq!(
            outcome.failed_stage,
            Some(ProcessingStage::AudioConversion)
        );
        assert!(!input.with_extension("wav").exists());
        assert!(!input.with_extension("srt").exists());
    }

    #[tokio::test]
    async fn test_recognize_failure_cleans_up_intermediate() {
        let dir = TempDir::new().unwrap();
        let input = make_input(&dir, "mumble.mp3").await;

        let p = processor(
            StubDecoder { fail: false },
            StubRecognizer {
                segments: Vec::new(),
                fail: true,
            },
        );
        let report = p.process_batch(&[input.clone()], "base").await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(outcome.failed_stage, Some(ProcessingStage::Transcription));
        assert!(outcome
            .error_message
            .as_deref()
            .unwrap()
            .contains("model exploded"));
        assert!(!input.with_extension("wav").exists());
    }

    #[tokio::test]
    async fn test_reversed_segment_fails_subtitle_stage() {
        let dir = TempDir::new().unwrap();
        let input = make_input(&dir, "warped.mp3").await;

        let p = processor(
            StubDecoder { fail: false },
            StubRecognizer {
                segments: vec![segment(5.0, 2.0, "backwards")],
                fail: false,
            },
        );
        let report = p.process_batch(&[input.clone()], "base").await;

        let outcome = &report.outcomes[0];
        assert_eq!(
            outcome.failed_stage,
            Some(ProcessingStage::SubtitleGeneration)
        );
        assert!(!input.with_extension("srt").exists());
        assert!(!input.with_extension("wav").exists());
    }

    #[tokio::test]
    async fn test_wav_input_is_rejected_in_validation() {
        let dir = TempDir::new().unwrap();
        let input = make_input(&dir, "voice.wav").await;

        let p = processor(
            StubDecoder { fail: false },
            StubRecognizer {
                segments: sample_segments(),
                fail: false,
            },
        );
        let report = p.process_batch(&[input.clone()], "base").await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(outcome.failed_stage, Some(ProcessingStage::Validation));
        // The source file must survive the rejected job.
        assert!(input.exists());
    }

    #[tokio::test]
    async fn test_report_file_persistence() {
        let dir = TempDir::new().unwrap();
        let input = make_input(&dir, "talk.mp3").await;
        let report_path = dir.path().join("report.json");

        let config = ConfigBuilder::new()
            .with_report_file(Some(report_path.clone()))
            .build();
        let p = BatchProcessor::with_collaborators(
            config,
            Box::new(StubDecoder { fail: false }),
            Box::new(StubRecognizer {
                segments: sample_segments(),
                fail: false,
            }),
        );
        p.process_batch(&[input], "base").await;

        let json_data = tokio::fs::read_to_string(&report_path).await.unwrap();
        let saved: BatchReport = serde_json::from_str(&json_data).unwrap();
        assert_eq!(saved.total, 1);
        assert_eq!(saved.successful, 1);
    }
}
