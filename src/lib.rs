//! Batch MP3 captioning library.
//!
//! Converts MP3 recordings to WAV, runs Whisper speech recognition over the
//! waveform, and writes the timestamped transcript as an SRT subtitle file.

pub mod audio;
pub mod config;
pub mod pipeline;
pub mod selection;
pub mod transcription;

// Re-export main types for easy access
pub use crate::audio::{AudioDecoder, AudioInfo, FfmpegConverter};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::pipeline::{BatchProcessor, BatchReport, JobOutcome, JobStatus, ProcessingStage};
pub use crate::selection::{DialogProvider, FixedProvider, InputProvider};
pub use crate::transcription::{
    InvalidSegment, SpeechRecognizer, SubtitleEntry, TranscriptionSegment, WhisperTranscriber,
};
