use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::whisper::TranscriptionSegment;

/// Segment timing the formatter refuses to render.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidSegment {
    #[error("segment {index}: negative start time {start}")]
    NegativeStart { index: usize, start: f64 },

    #[error("segment {index}: start {start} is after end {end}")]
    ReversedTiming { index: usize, start: f64, end: f64 },

    #[error("segment {index}: non-finite timing")]
    NonFiniteTiming { index: usize },
}

/// SRT (SubRip Subtitle) entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    /// Sequential number, 1-based
    pub index: u32,
    /// Start timestamp
    pub start: Duration,
    /// End timestamp
    pub end: Duration,
    /// Subtitle text, surrounding whitespace trimmed
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(index: u32, start: Duration, end: Duration, text: &str) -> Self {
        Self {
            index,
            start,
            end,
            text: text.trim().to_string(),
        }
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n",
            self.index,
            format_timestamp(self.start),
            format_timestamp(self.end),
            self.text
        )
    }
}

/// Format a timestamp as an SRT time-code (HH:MM:SS,mmm).
///
/// Hours are zero-padded to two digits but never truncated, so recordings
/// past the 99-hour mark keep their full hour count. Milliseconds are the
/// truncated sub-second remainder.
pub fn format_timestamp(timestamp: Duration) -> String {
    let total_seconds = timestamp.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let milliseconds = timestamp.subsec_millis();

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, milliseconds)
}

/// Turn recognizer segments into numbered subtitle entries.
///
/// Segments are taken strictly in the order given; indices are assigned
/// 1-based with no gaps. Timing is validated before conversion so a
/// malformed segment is rejected instead of producing a wrapped or
/// negative-duration entry.
pub fn entries_from_segments(
    segments: &[TranscriptionSegment],
) -> Result<Vec<SubtitleEntry>, InvalidSegment> {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            if !segment.start.is_finite() || !segment.end.is_finite() {
                return Err(InvalidSegment::NonFiniteTiming { index: i });
            }
            if segment.start < 0.0 {
                return Err(InvalidSegment::NegativeStart {
                    index: i,
                    start: segment.start,
                });
            }
            if segment.start > segment.end {
                return Err(InvalidSegment::ReversedTiming {
                    index: i,
                    start: segment.start,
                    end: segment.end,
                });
            }

            Ok(SubtitleEntry::new(
                (i + 1) as u32,
                Duration::from_secs_f64(segment.start),
                Duration::from_secs_f64(segment.end),
                &segment.text,
            ))
        })
        .collect()
}

/// Render recognizer segments as SRT file content.
///
/// Pure function; persisting the returned string is the caller's concern.
pub fn render(segments: &[TranscriptionSegment]) -> Result<String, InvalidSegment> {
    let entries = entries_from_segments(segments)?;

    let mut srt_content = String::new();
    for entry in &entries {
        srt_content.push_str(&entry.to_string());
        srt_content.push('\n');
    }

    Ok(srt_content)
}
