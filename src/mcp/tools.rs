use serde::Deserialize;
use serde_json::{json, Value};

use crate::format::{OutputFormat, TimestampStyle};
use crate::service::MAX_BATCH_IDS;

/// Arguments for `get_transcript`. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct GetTranscriptArgs {
    pub video_identifier: String,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub preserve_formatting: bool,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    #[serde(default)]
    pub include_timestamps: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetMultipleArgs {
    pub video_identifiers: Vec<String>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub continue_on_error: bool,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateArgs {
    pub video_identifier: String,
    pub target_language: String,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default = "default_true")]
    pub preserve_timestamps: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatArgs {
    pub video_identifier: String,
    #[serde(default)]
    pub format_type: OutputFormat,
    #[serde(default)]
    pub include_timestamps: bool,
    #[serde(default)]
    pub timestamp_format: TimestampStyle,
    #[serde(default)]
    pub max_line_length: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListLanguagesArgs {
    pub video_identifier: String,
    #[serde(default = "default_true")]
    pub include_auto: bool,
}

fn default_true() -> bool {
    true
}

/// The five tool descriptors surfaced by `tools/list`.
pub fn tool_descriptors() -> Value {
    json!([
        {
            "name": "get_transcript",
            "description": "Fetch the transcript of a YouTube video as typed, timed segments. Accepts a video ID or any watch/short/embed URL.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "video_identifier": {
                        "type": "string",
                        "description": "Video ID (11 characters) or any YouTube URL"
                    },
                    "languages": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Ordered language preference list (e.g. [\"en\", \"de\"]); when given it is a hard requirement"
                    },
                    "preserve_formatting": {
                        "type": "boolean",
                        "description": "Keep one line per caption segment instead of joining into a single body"
                    },
                    "include_metadata": {
                        "type": "boolean",
                        "description": "Include extraction metadata in the response (default true)"
                    },
                    "include_timestamps": {
                        "type": "boolean",
                        "description": "Prefix each segment with its start time in the formatted text"
                    }
                },
                "required": ["video_identifier"]
            }
        },
        {
            "name": "get_multiple_transcripts",
            "description": format!("Fetch transcripts for up to {MAX_BATCH_IDS} videos, optionally in parallel, collecting per-video successes and failures."),
            "inputSchema": {
                "type": "object",
                "properties": {
                    "video_identifiers": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": 1,
                        "maxItems": MAX_BATCH_IDS,
                        "description": "Video IDs or URLs"
                    },
                    "languages": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Ordered language preference list applied to every video"
                    },
                    "continue_on_error": {
                        "type": "boolean",
                        "description": "Collect failures instead of aborting on the first one (default true)"
                    },
                    "include_metadata": {"type": "boolean"},
                    "parallel": {
                        "type": "boolean",
                        "description": "Fetch concurrently, bounded by the configured max_concurrent (default true)"
                    }
                },
                "required": ["video_identifiers"]
            }
        },
        {
            "name": "translate_transcript",
            "description": "Fetch a transcript in a target language, falling back to an auto-translated caption track when the language is not offered natively.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "video_identifier": {"type": "string"},
                    "target_language": {
                        "type": "string",
                        "description": "Language code to translate into (e.g. \"de\")"
                    },
                    "source_language": {
                        "type": "string",
                        "description": "Track to translate from; defaults to the best translatable track"
                    },
                    "preserve_timestamps": {"type": "boolean"}
                },
                "required": ["video_identifier", "target_language"]
            }
        },
        {
            "name": "format_transcript",
            "description": "Fetch a transcript and render it as plain text, paragraphs, sentences, SRT, WebVTT or JSON.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "video_identifier": {"type": "string"},
                    "format_type": {
                        "type": "string",
                        "enum": ["plain_text", "paragraphs", "sentences", "srt", "vtt", "json"],
                        "description": "Output format (default plain_text)"
                    },
                    "include_timestamps": {"type": "boolean"},
                    "timestamp_format": {
                        "type": "string",
                        "enum": ["seconds", "hms", "ms"],
                        "description": "Timestamp prefix style when include_timestamps is set"
                    },
                    "max_line_length": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Re-wrap text output to this many columns"
                    }
                },
                "required": ["video_identifier"]
            }
        },
        {
            "name": "list_available_languages",
            "description": "List the caption languages available for a video, flagging manual versus auto-generated tracks.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "video_identifier": {"type": "string"},
                    "include_auto": {
                        "type": "boolean",
                        "description": "Include auto-generated (speech recognition) tracks (default true)"
                    }
                },
                "required": ["video_identifier"]
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_names() {
        let tools = tool_descriptors();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "get_transcript",
                "get_multiple_transcripts",
                "translate_transcript",
                "format_transcript",
                "list_available_languages"
            ]
        );
    }

    #[test]
    fn test_get_transcript_args_defaults() {
        let args: GetTranscriptArgs =
            serde_json::from_value(json!({"video_identifier": "dQw4w9WgXcQ"})).unwrap();
        assert_eq!(args.video_identifier, "dQw4w9WgXcQ");
        assert!(args.languages.is_none());
        assert!(!args.preserve_formatting);
        assert!(args.include_metadata);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let args: GetTranscriptArgs = serde_json::from_value(json!({
            "video_identifier": "dQw4w9WgXcQ",
            "some_future_flag": 42
        }))
        .unwrap();
        assert_eq!(args.video_identifier, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_format_args_enums() {
        let args: FormatArgs = serde_json::from_value(json!({
            "video_identifier": "dQw4w9WgXcQ",
            "format_type": "srt",
            "timestamp_format": "hms"
        }))
        .unwrap();
        assert_eq!(args.format_type, OutputFormat::Srt);
        assert_eq!(args.timestamp_format, TimestampStyle::Hms);
    }

    #[test]
    fn test_missing_required_field_fails() {
        assert!(serde_json::from_value::<TranslateArgs>(json!({
            "video_identifier": "dQw4w9WgXcQ"
        }))
        .is_err());
    }
}
