use crate::error::{Result, TranscriptError};
use crate::transcript::CaptionTrack;

/// Pick the best caption track for an ordered language preference list.
/// First rule to match wins:
///
/// 1. exact `language_code` match, in preference order
/// 2. `language_code` starting with `<lang>-`, in preference order
/// 3. the track flagged default
/// 4. the first track in list order
///
/// With `required` set (the caller named the languages explicitly), a miss
/// on rules 1-2 fails with the available codes as suggestions instead of
/// falling through.
pub fn select_track<'a>(
    video_id: &str,
    tracks: &'a [CaptionTrack],
    preferred: &[String],
    required: bool,
) -> Result<&'a CaptionTrack> {
    for lang in preferred {
        if let Some(track) = tracks.iter().find(|t| &t.language_code == lang) {
            return Ok(track);
        }
    }

    let prefixes: Vec<String> = preferred.iter().map(|l| format!("{l}-")).collect();
    for prefix in &prefixes {
        if let Some(track) = tracks.iter().find(|t| t.language_code.starts_with(prefix)) {
            return Ok(track);
        }
    }

    if required && !preferred.is_empty() {
        return Err(TranscriptError::LanguageNotAvailable {
            video_id: video_id.to_string(),
            requested: preferred.to_vec(),
            available: tracks.iter().map(|t| t.language_code.clone()).collect(),
        });
    }

    if let Some(track) = tracks.iter().find(|t| t.is_default) {
        return Ok(track);
    }

    tracks
        .first()
        .ok_or_else(|| TranscriptError::NoTranscriptFound(video_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(code: &str, is_default: bool) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://captions.example/{code}"),
            language_code: code.to_string(),
            name: code.to_string(),
            vss_id: format!(".{code}"),
            kind: None,
            is_translatable: true,
            is_default,
        }
    }

    #[test]
    fn test_exact_match_wins() {
        let tracks = vec![track("en", false), track("es", true)];
        let selected = select_track("vid", &tracks, &["es".into()], true).unwrap();
        assert_eq!(selected.language_code, "es");
    }

    #[test]
    fn test_preference_order_respected() {
        let tracks = vec![track("en", false), track("es", false)];
        let selected =
            select_track("vid", &tracks, &["fr".into(), "es".into(), "en".into()], true).unwrap();
        assert_eq!(selected.language_code, "es");
    }

    #[test]
    fn test_prefix_match_second_pass() {
        let tracks = vec![track("en-GB", false), track("es", false)];
        let selected = select_track("vid", &tracks, &["en".into()], true).unwrap();
        assert_eq!(selected.language_code, "en-GB");
    }

    #[test]
    fn test_exact_beats_prefix_across_preferences() {
        // Rule 1 exhausts all preferences before rule 2 runs.
        let tracks = vec![track("en-GB", false), track("fr", false)];
        let selected = select_track("vid", &tracks, &["en".into(), "fr".into()], true).unwrap();
        assert_eq!(selected.language_code, "fr");
    }

    #[test]
    fn test_default_fallback_when_not_required() {
        let tracks = vec![track("de", false), track("ja", true)];
        let selected = select_track("vid", &tracks, &[], false).unwrap();
        assert_eq!(selected.language_code, "ja");
    }

    #[test]
    fn test_first_track_fallback() {
        let tracks = vec![track("de", false), track("ja", false)];
        let selected = select_track("vid", &tracks, &[], false).unwrap();
        assert_eq!(selected.language_code, "de");
    }

    #[test]
    fn test_required_miss_carries_suggestions() {
        let tracks = vec![track("en", false), track("es", false)];
        let err = select_track("vid", &tracks, &["fr".into()], true).unwrap_err();
        match err {
            TranscriptError::LanguageNotAvailable { available, .. } => {
                assert_eq!(available, vec!["en".to_string(), "es".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_selector_is_pure() {
        let tracks = vec![track("en", true), track("es", false)];
        let prefs = vec!["es".to_string()];
        let a = select_track("vid", &tracks, &prefs, true).unwrap().language_code.clone();
        let b = select_track("vid", &tracks, &prefs, true).unwrap().language_code.clone();
        assert_eq!(a, b);
    }
}
