use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TranscriptError>;

/// Wire-level error tags. Every error surfaced to a caller carries exactly
/// one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "INVALID_VIDEO_ID")]
    InvalidVideoId,
    #[serde(rename = "VIDEO_UNAVAILABLE")]
    VideoUnavailable,
    #[serde(rename = "NO_TRANSCRIPT_FOUND")]
    NoTranscriptFound,
    #[serde(rename = "TRANSCRIPTS_DISABLED")]
    TranscriptsDisabled,
    #[serde(rename = "LANGUAGE_NOT_AVAILABLE")]
    LanguageNotAvailable,
    #[serde(rename = "NETWORK_ERROR")]
    Network,
    #[serde(rename = "PARSING_ERROR")]
    Parsing,
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded,
    #[serde(rename = "TIMEOUT_ERROR")]
    Timeout,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidVideoId => "INVALID_VIDEO_ID",
            ErrorKind::VideoUnavailable => "VIDEO_UNAVAILABLE",
            ErrorKind::NoTranscriptFound => "NO_TRANSCRIPT_FOUND",
            ErrorKind::TranscriptsDisabled => "TRANSCRIPTS_DISABLED",
            ErrorKind::LanguageNotAvailable => "LANGUAGE_NOT_AVAILABLE",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Parsing => "PARSING_ERROR",
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::Timeout => "TIMEOUT_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum TranscriptError {
    #[error("invalid video id or URL: {0} (video IDs are 11 characters of [A-Za-z0-9_-])")]
    InvalidVideoId(String),

    #[error("video {0} is unavailable: {1}")]
    VideoUnavailable(String, String),

    #[error("no transcript found for video {0}")]
    NoTranscriptFound(String),

    #[error("transcripts are disabled for video {0}")]
    TranscriptsDisabled(String),

    #[error("no transcript in languages {requested:?} for video {video_id}; available: {available:?}")]
    LanguageNotAvailable {
        video_id: String,
        requested: Vec<String>,
        available: Vec<String>,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse transcript data: {0}")]
    Parsing(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded {
        video_id: Option<String>,
        retry_after: Option<u64>,
    },

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TranscriptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscriptError::InvalidVideoId(_) => ErrorKind::InvalidVideoId,
            TranscriptError::VideoUnavailable(..) => ErrorKind::VideoUnavailable,
            TranscriptError::NoTranscriptFound(_) => ErrorKind::NoTranscriptFound,
            TranscriptError::TranscriptsDisabled(_) => ErrorKind::TranscriptsDisabled,
            TranscriptError::LanguageNotAvailable { .. } => ErrorKind::LanguageNotAvailable,
            TranscriptError::Network(_) => ErrorKind::Network,
            TranscriptError::Parsing(_) => ErrorKind::Parsing,
            TranscriptError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            TranscriptError::Timeout(_) => ErrorKind::Timeout,
            TranscriptError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the retry envelope may attempt this operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimitExceeded
        )
    }

    pub fn video_id(&self) -> Option<&str> {
        match self {
            TranscriptError::VideoUnavailable(id, _)
            | TranscriptError::NoTranscriptFound(id)
            | TranscriptError::TranscriptsDisabled(id) => Some(id),
            TranscriptError::LanguageNotAvailable { video_id, .. } => Some(video_id),
            TranscriptError::RateLimitExceeded { video_id, .. } => video_id.as_deref(),
            _ => None,
        }
    }

    /// Language codes offered to the caller when a requested language is missing.
    pub fn suggestions(&self) -> Option<&[String]> {
        match self {
            TranscriptError::LanguageNotAvailable { available, .. } => Some(available),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            TranscriptError::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(
            TranscriptError::InvalidVideoId("x".into()).kind().as_str(),
            "INVALID_VIDEO_ID"
        );
        assert_eq!(
            TranscriptError::Network("boom".into()).kind().as_str(),
            "NETWORK_ERROR"
        );
    }

    #[test]
    fn test_retryable_partition() {
        assert!(TranscriptError::Network("n".into()).is_retryable());
        assert!(TranscriptError::Timeout("t".into()).is_retryable());
        assert!(TranscriptError::RateLimitExceeded {
            video_id: None,
            retry_after: None
        }
        .is_retryable());

        assert!(!TranscriptError::Parsing("p".into()).is_retryable());
        assert!(!TranscriptError::InvalidVideoId("i".into()).is_retryable());
        assert!(!TranscriptError::VideoUnavailable("v".into(), "gone".into()).is_retryable());
        assert!(!TranscriptError::NoTranscriptFound("v".into()).is_retryable());
    }

    #[test]
    fn test_language_suggestions() {
        let err = TranscriptError::LanguageNotAvailable {
            video_id: "dQw4w9WgXcQ".into(),
            requested: vec!["fr".into()],
            available: vec!["en".into(), "es".into()],
        };
        assert_eq!(err.suggestions().unwrap(), &["en", "es"]);
        assert_eq!(err.video_id(), Some("dQw4w9WgXcQ"));
    }
}
