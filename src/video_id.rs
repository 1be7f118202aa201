use crate::error::{Result, TranscriptError};

/// Length of a canonical YouTube video ID.
const ID_LEN: usize = 11;

fn is_canonical(input: &str) -> bool {
    input.len() == ID_LEN
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Normalize a user-supplied reference (bare ID or any watch-page URL shape)
/// to the canonical 11-character video ID.
///
/// Accepted URL shapes: `watch?v=<ID>`, `youtu.be/<ID>`, `/embed/<ID>`,
/// `/v/<ID>`, `/shorts/<ID>`, `/live/<ID>`. Query parameters, fragments and
/// trailing path segments after the ID are ignored.
pub fn resolve(input: &str) -> Result<String> {
    let input = input.trim();

    if is_canonical(input) {
        return Ok(input.to_string());
    }

    // Accept scheme-less youtube.com / youtu.be inputs.
    let url_str = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else if input.contains("youtube.com") || input.contains("youtu.be") {
        format!("https://{}", input)
    } else {
        return Err(TranscriptError::InvalidVideoId(input.to_string()));
    };

    let url = url::Url::parse(&url_str)
        .map_err(|_| TranscriptError::InvalidVideoId(input.to_string()))?;

    let host_ok = url
        .host_str()
        .map(|h| h.contains("youtube.com") || h == "youtu.be")
        .unwrap_or(false);
    if !host_ok {
        return Err(TranscriptError::InvalidVideoId(input.to_string()));
    }

    // Standard watch URL: ?v=VIDEO_ID
    if let Some(id) = url
        .query_pairs()
        .find(|(k, _)| k == "v")
        .map(|(_, v)| v.to_string())
    {
        if is_canonical(&id) {
            return Ok(id);
        }
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    // Short URL: youtu.be/VIDEO_ID
    if url.host_str() == Some("youtu.be") {
        if let Some(first) = segments.first() {
            if is_canonical(first) {
                return Ok((*first).to_string());
            }
        }
    }

    // Path shapes: /embed/<ID>, /v/<ID>, /shorts/<ID>, /live/<ID>
    for window in segments.windows(2) {
        if matches!(window[0], "embed" | "v" | "shorts" | "live") && is_canonical(window[1]) {
            return Ok(window[1].to_string());
        }
    }

    Err(TranscriptError::InvalidVideoId(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_bare_id() {
        assert_eq!(resolve("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(resolve("_NuH3D4SN-c").unwrap(), "_NuH3D4SN-c");
    }

    #[test]
    fn test_resolve_watch_url() {
        assert_eq!(
            resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_resolve_watch_url_with_extra_params() {
        assert_eq!(
            resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s&list=PL").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_resolve_short_url() {
        assert_eq!(resolve("https://youtu.be/dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(
            resolve("https://youtu.be/_NuH3D4SN-c?si=VSFea_rMwtaiR8Q7").unwrap(),
            "_NuH3D4SN-c"
        );
    }

    #[test]
    fn test_resolve_path_shapes() {
        assert_eq!(
            resolve("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            resolve("https://www.youtube.com/v/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            resolve("https://www.youtube.com/shorts/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            resolve("https://www.youtube.com/live/dQw4w9WgXcQ?feature=share").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_resolve_schemeless() {
        assert_eq!(
            resolve("youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(resolve("youtu.be/dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_resolve_invalid() {
        assert!(matches!(
            resolve("invalid123"),
            Err(TranscriptError::InvalidVideoId(_))
        ));
        assert!(resolve("not-a-valid-id").is_err());
        assert!(resolve("https://example.com/watch?v=dQw4w9WgXcQ").is_err());
        assert!(resolve("https://www.youtube.com/watch?v=tooshort").is_err());
        assert!(resolve("").is_err());
    }

    #[test]
    fn test_resolve_rejects_bad_charset() {
        assert!(resolve("dQw4w9WgXc!").is_err());
        assert!(resolve("dQw4w9WgXcQQ").is_err());
    }
}
