use serde::{Deserialize, Serialize};

use crate::error::{Result, TranscriptError};
use crate::transcript::Segment;

/// Segments per paragraph before a forced break in `paragraphs` output.
const PARAGRAPH_CHUNK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    PlainText,
    Paragraphs,
    Sentences,
    Srt,
    Vtt,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = TranscriptError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain_text" => Ok(OutputFormat::PlainText),
            "paragraphs" => Ok(OutputFormat::Paragraphs),
            "sentences" => Ok(OutputFormat::Sentences),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" => Ok(OutputFormat::Vtt),
            "json" => Ok(OutputFormat::Json),
            other => Err(TranscriptError::Internal(format!(
                "unknown format type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampStyle {
    #[default]
    Seconds,
    Hms,
    Ms,
}

/// Rendering options beyond the format tag itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    pub include_timestamps: bool,
    pub timestamp_style: TimestampStyle,
    pub max_line_length: Option<usize>,
}

/// Render a segment sequence into the requested format. Pure function.
pub fn render(segments: &[Segment], format: OutputFormat, opts: &FormatOptions) -> String {
    let body = match format {
        OutputFormat::PlainText => plain_text(segments, opts),
        OutputFormat::Paragraphs => paragraphs(segments),
        OutputFormat::Sentences => sentences(segments),
        OutputFormat::Srt => srt(segments),
        OutputFormat::Vtt => vtt(segments),
        OutputFormat::Json => json(segments),
    };

    // Subtitle and JSON output have structural line breaks; only the
    // text-like formats re-wrap.
    match (format, opts.max_line_length) {
        (OutputFormat::Srt | OutputFormat::Vtt | OutputFormat::Json, _) => body,
        (_, Some(width)) if width > 0 => wrap(&body, width),
        _ => body,
    }
}

fn timestamp_prefix(start: f64, style: TimestampStyle) -> String {
    match style {
        TimestampStyle::Seconds => format!("[{start:.1}s] "),
        TimestampStyle::Hms => {
            let total = start as u64;
            format!("[{:02}:{:02}:{:02}] ", total / 3600, (total % 3600) / 60, total % 60)
        }
        TimestampStyle::Ms => format!("[{}ms] ", (start * 1000.0).round() as u64),
    }
}

fn plain_text(segments: &[Segment], opts: &FormatOptions) -> String {
    segments
        .iter()
        .map(|s| {
            if opts.include_timestamps {
                format!("{}{}", timestamp_prefix(s.start, opts.timestamp_style), s.text)
            } else {
                s.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn paragraphs(segments: &[Segment]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (i, segment) in segments.iter().enumerate() {
        current.push(&segment.text);
        let boundary =
            (i + 1) % PARAGRAPH_CHUNK == 0 || segment.text.trim_end().ends_with('.');
        if boundary {
            out.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out.join("\n\n")
}

fn sentences(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| {
            let line = s.text.trim_end();
            if line.ends_with(['.', '!', '?']) {
                line.to_string()
            } else {
                format!("{line}.")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let (h, m, s, ms) = split_ms(total_ms);
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

fn vtt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let (h, m, s, ms) = split_ms(total_ms);
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

fn split_ms(total_ms: u64) -> (u64, u64, u64, u64) {
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60, ms)
}

fn srt(segments: &[Segment]) -> String {
    let mut out = String::new();
    for (i, s) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_timestamp(s.start),
            srt_timestamp(s.end),
            s.text
        ));
    }
    out.trim_end().to_string()
}

fn vtt(segments: &[Segment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for s in segments {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            vtt_timestamp(s.start),
            vtt_timestamp(s.end),
            s.text
        ));
    }
    out.trim_end().to_string()
}

fn json(segments: &[Segment]) -> String {
    // Segment serializes as {text, start, duration, end}; pretty printing
    // uses two-space indentation.
    serde_json::to_string_pretty(segments).unwrap_or_else(|_| "[]".to_string())
}

fn wrap(body: &str, width: usize) -> String {
    body.lines()
        .map(|line| {
            if line.len() <= width {
                line.to_string()
            } else {
                textwrap::wrap(line, width).join("\n")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
