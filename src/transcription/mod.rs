pub mod srt;
pub mod whisper;

pub use srt::{InvalidSegment, SubtitleEntry};
pub use whisper::{SpeechRecognizer, TranscriptionSegment, WhisperTranscriber};
