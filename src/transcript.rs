use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// One timed unit of transcript output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(text: String, start: f64, duration: f64) -> Self {
        Self {
            text,
            start,
            duration,
            end: start + duration,
        }
    }
}

/// Origin of a caption track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Manual,
    Generated,
    Auto,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Manual => "manual",
            TrackKind::Generated => "generated",
            TrackKind::Auto => "auto",
        }
    }
}

/// A caption track descriptor pulled from the watch page. Lives only from
/// page fetch until track selection.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    pub name: String,
    pub vss_id: String,
    pub kind: Option<String>,
    pub is_translatable: bool,
    pub is_default: bool,
}

impl CaptionTrack {
    /// `kind == "asr"` marks speech-recognition tracks; anything else on
    /// the page is a manually created track. Translated variants become
    /// `Generated` where they are produced, not here.
    pub fn track_kind(&self) -> TrackKind {
        match self.kind.as_deref() {
            Some("asr") => TrackKind::Auto,
            _ => TrackKind::Manual,
        }
    }
}

/// Video metadata extracted from the watch page alongside the track list.
#[derive(Debug, Clone, Serialize)]
pub struct VideoData {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_id: String,
    pub channel_name: String,
    pub view_count: u64,
    pub is_live: bool,
    #[serde(skip)]
    pub caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptMetadata {
    pub extracted_at: DateTime<Utc>,
    pub detected_language: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
}

/// A complete, immutable transcript value as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub video_id: String,
    pub language: String,
    #[serde(rename = "type")]
    pub track_kind: TrackKind,
    pub segments: Vec<Segment>,
    pub formatted_text: String,
    pub word_count: usize,
    pub char_count: usize,
    pub duration_seconds: f64,
    pub metadata: TranscriptMetadata,
}

impl Transcript {
    /// Assemble a transcript from parsed segments, deriving the formatted
    /// text and its counts. With `preserve_formatting` the segments keep
    /// their own lines; otherwise they join into one space-separated body.
    pub fn assemble(
        video_id: String,
        language: String,
        track_kind: TrackKind,
        segments: Vec<Segment>,
        metadata: TranscriptMetadata,
        preserve_formatting: bool,
    ) -> Self {
        let formatted_text = if preserve_formatting {
            segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };
        let word_count = formatted_text.split_whitespace().count();
        let char_count = formatted_text.chars().count();
        let duration_seconds = segments.last().map(|s| s.end).unwrap_or(0.0);

        Self {
            video_id,
            language,
            track_kind,
            segments,
            formatted_text,
            word_count,
            char_count,
            duration_seconds,
            metadata,
        }
    }

    /// Re-derive the formatted text of an existing transcript under the
    /// other formatting mode. Used on cache hits so both modes share one
    /// cached value.
    pub fn with_formatting(&self, preserve_formatting: bool) -> Self {
        Self::assemble(
            self.video_id.clone(),
            self.language.clone(),
            self.track_kind,
            self.segments.clone(),
            self.metadata.clone(),
            preserve_formatting,
        )
    }
}

/// One language entry emitted by the list operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub code: String,
    pub name: String,
    pub native_name: String,
    #[serde(rename = "type")]
    pub track_kind: TrackKind,
    pub is_translated: bool,
    pub is_default: bool,
}

/// Per-video outcome inside a batch response.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub video_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchError>,
    /// Wall-clock milliseconds spent on this video.
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub results: Vec<BatchItem>,
    pub errors: Vec<BatchError>,
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> TranscriptMetadata {
        TranscriptMetadata {
            extracted_at: Utc::now(),
            detected_language: "en".into(),
            source: "watch-page".into(),
            title: None,
            channel_id: None,
            channel_name: None,
        }
    }

    #[test]
    fn test_segment_end() {
        let s = Segment::new("hi".into(), 1.5, 2.5);
        assert_eq!(s.end, 4.0);
    }

    #[test]
    fn test_assemble_derivations() {
        let segments = vec![
            Segment::new("Hello world".into(), 0.0, 2.0),
            Segment::new("This is a test".into(), 2.0, 3.0),
        ];
        let t = Transcript::assemble(
            "dQw4w9WgXcQ".into(),
            "en".into(),
            TrackKind::Manual,
            segments,
            meta(),
            false,
        );
        assert_eq!(t.formatted_text, "Hello world This is a test");
        assert_eq!(t.word_count, 6);
        assert_eq!(t.char_count, t.formatted_text.chars().count());
        assert_eq!(t.duration_seconds, 5.0);
    }

    #[test]
    fn test_assemble_preserved() {
        let segments = vec![
            Segment::new("one".into(), 0.0, 1.0),
            Segment::new("two".into(), 1.0, 1.0),
        ];
        let t = Transcript::assemble(
            "dQw4w9WgXcQ".into(),
            "en".into(),
            TrackKind::Manual,
            segments,
            meta(),
            true,
        );
        assert_eq!(t.formatted_text, "one\ntwo");
        assert_eq!(t.word_count, 2);
    }

    #[test]
    fn test_with_formatting_round_trip() {
        let segments = vec![Segment::new("a b".into(), 0.0, 1.0)];
        let plain = Transcript::assemble(
            "dQw4w9WgXcQ".into(),
            "en".into(),
            TrackKind::Auto,
            segments,
            meta(),
            false,
        );
        let preserved = plain.with_formatting(true);
        assert_eq!(preserved.segments, plain.segments);
        assert_eq!(preserved.duration_seconds, plain.duration_seconds);
    }

    #[test]
    fn test_track_kind_from_caption() {
        let mut track = CaptionTrack {
            base_url: "u".into(),
            language_code: "en".into(),
            name: "English".into(),
            vss_id: ".en".into(),
            kind: None,
            is_translatable: true,
            is_default: true,
        };
        assert_eq!(track.track_kind(), TrackKind::Manual);
        track.kind = Some("asr".into());
        assert_eq!(track.track_kind(), TrackKind::Auto);
        // Unrecognized kind strings stay manual.
        track.kind = Some("xyz".into());
        assert_eq!(track.track_kind(), TrackKind::Manual);
    }

    #[test]
    fn test_empty_transcript_duration() {
        let t = Transcript::assemble(
            "dQw4w9WgXcQ".into(),
            "en".into(),
            TrackKind::Manual,
            vec![],
            meta(),
            false,
        );
        assert_eq!(t.duration_seconds, 0.0);
        assert_eq!(t.word_count, 0);
    }
}
