use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Result, TranscriptError};
use crate::transcript::{CaptionTrack, VideoData};

const WATCH_URL: &str = "https://www.youtube.com/watch?v={video_id}";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const MAX_REDIRECTS: usize = 10;

/// The player-response blob is assigned to this identifier inside the watch
/// page; the non-greedy match stops at the first `};`.
static PLAYER_RESPONSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.*?\})\s*;").unwrap());

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP seam. The orchestrator and tests supply their own
/// implementations; production uses [`ReqwestHttpClient`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// reqwest-backed client. One inner client per proxy URL; requests rotate
/// round-robin over the pool under a lock. An empty pool means direct
/// connections through a single client.
pub struct ReqwestHttpClient {
    clients: Vec<reqwest::Client>,
    rotate: bool,
    next: Mutex<usize>,
}

impl ReqwestHttpClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let proxies = config.proxies();

        let build = |proxy: Option<&str>| -> Result<reqwest::Client> {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::ACCEPT_LANGUAGE,
                reqwest::header::HeaderValue::from_static(ACCEPT_LANGUAGE),
            );

            let mut builder = reqwest::Client::builder()
                .user_agent(config.user_agent.clone())
                .default_headers(headers)
                .cookie_store(true)
                .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
                .timeout(config.request_timeout());

            if let Some(url) = proxy {
                let proxy = reqwest::Proxy::all(url).map_err(|e| {
                    TranscriptError::Internal(format!("invalid proxy url {url}: {e}"))
                })?;
                builder = builder.proxy(proxy);
            }

            builder
                .build()
                .map_err(|e| TranscriptError::Internal(format!("building HTTP client: {e}")))
        };

        let clients = if proxies.is_empty() {
            vec![build(None)?]
        } else {
            proxies
                .iter()
                .map(|p| build(Some(p)))
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Self {
            clients,
            rotate: config.enable_proxy_rotation && proxies.len() > 1,
            next: Mutex::new(0),
        })
    }

    fn pick(&self) -> &reqwest::Client {
        if !self.rotate {
            return &self.clients[0];
        }
        let mut next = self.next.lock();
        let client = &self.clients[*next % self.clients.len()];
        // A failed request does not remove its proxy; the index just moves on.
        *next = next.wrapping_add(1);
        client
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.pick().get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TranscriptError::Timeout(format!("request to {url} timed out"))
            } else if e.is_redirect() {
                TranscriptError::Network(format!("too many redirects fetching {url}"))
            } else {
                TranscriptError::Network(format!("request failed: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptError::Network(format!("reading response body: {e}")))?;

        Ok(HttpResponse { status, body })
    }
}

/// Retrieves and parses the watch page into video metadata plus the
/// caption-track list (C2), and downloads raw caption documents (the fetch
/// half of C4).
pub struct PageFetcher {
    http: Arc<dyn HttpClient>,
}

impl PageFetcher {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    pub async fn fetch_video_data(&self, video_id: &str) -> Result<VideoData> {
        let url = WATCH_URL.replace("{video_id}", video_id);
        let response = self.http.get(&url).await?;

        match response.status {
            404 => {
                return Err(TranscriptError::VideoUnavailable(
                    video_id.to_string(),
                    "watch page returned 404".to_string(),
                ))
            }
            429 => {
                return Err(TranscriptError::RateLimitExceeded {
                    video_id: Some(video_id.to_string()),
                    retry_after: None,
                })
            }
            s if !(200..300).contains(&s) => {
                return Err(TranscriptError::Network(format!(
                    "watch page returned HTTP {s}"
                )))
            }
            _ => {}
        }

        if response.body.contains("class=\"g-recaptcha\"") {
            warn!(video_id, "bot check on watch page");
            return Err(TranscriptError::RateLimitExceeded {
                video_id: Some(video_id.to_string()),
                retry_after: None,
            });
        }

        let player_response = extract_player_response(&response.body, video_id)?;
        assert_playability(&player_response, video_id)?;
        build_video_data(&player_response, video_id)
    }

    /// Download a caption document from a selected track URL, used verbatim.
    pub async fn fetch_track_xml(&self, video_id: &str, base_url: &str) -> Result<String> {
        let response = self.http.get(base_url).await?;

        if response.status == 429 {
            return Err(TranscriptError::RateLimitExceeded {
                video_id: Some(video_id.to_string()),
                retry_after: None,
            });
        }
        if !response.is_success() {
            return Err(TranscriptError::Network(format!(
                "caption track returned HTTP {}",
                response.status
            )));
        }
        if response.body.trim().is_empty() {
            return Err(TranscriptError::Parsing(
                "caption track response was empty".to_string(),
            ));
        }
        Ok(response.body)
    }
}

fn extract_player_response(html: &str, video_id: &str) -> Result<serde_json::Value> {
    let captures = PLAYER_RESPONSE_RE.captures(html).ok_or_else(|| {
        TranscriptError::Parsing(format!(
            "no ytInitialPlayerResponse in watch page for {video_id}"
        ))
    })?;

    serde_json::from_str(&captures[1])
        .map_err(|e| TranscriptError::Parsing(format!("player response is not valid JSON: {e}")))
}

/// Reject videos the player itself reports as unplayable before looking at
/// captions.
fn assert_playability(player_response: &serde_json::Value, video_id: &str) -> Result<()> {
    let Some(status) = player_response
        .get("playabilityStatus")
        .and_then(|ps| ps.get("status"))
        .and_then(|s| s.as_str())
    else {
        return Ok(());
    };

    if status == "OK" {
        return Ok(());
    }

    let reason = player_response
        .get("playabilityStatus")
        .and_then(|ps| ps.get("reason"))
        .and_then(|r| r.as_str())
        .unwrap_or("")
        .to_string();

    if status == "LOGIN_REQUIRED" && reason.contains("not a bot") {
        return Err(TranscriptError::RateLimitExceeded {
            video_id: Some(video_id.to_string()),
            retry_after: None,
        });
    }

    Err(TranscriptError::VideoUnavailable(
        video_id.to_string(),
        if reason.is_empty() {
            format!("playability status {status}")
        } else {
            reason
        },
    ))
}

fn build_video_data(player_response: &serde_json::Value, video_id: &str) -> Result<VideoData> {
    let details = player_response.get("videoDetails").ok_or_else(|| {
        TranscriptError::Parsing(format!("player response for {video_id} has no videoDetails"))
    })?;

    let str_field = |key: &str| {
        details
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    let view_count = details
        .get("viewCount")
        .and_then(|v| v.as_str())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let captions = player_response.get("captions");
    if captions.is_none() {
        return Err(TranscriptError::TranscriptsDisabled(video_id.to_string()));
    }

    let caption_tracks = captions
        .and_then(|c| c.get("playerCaptionsTracklistRenderer"))
        .and_then(|r| r.get("captionTracks"))
        .and_then(|t| t.as_array())
        .map(|tracks| tracks.iter().filter_map(parse_caption_track).collect())
        .unwrap_or_else(Vec::new);

    if caption_tracks.is_empty() {
        return Err(TranscriptError::NoTranscriptFound(video_id.to_string()));
    }

    debug!(video_id, tracks = caption_tracks.len(), "watch page parsed");

    Ok(VideoData {
        video_id: video_id.to_string(),
        title: str_field("title"),
        description: str_field("shortDescription"),
        channel_id: str_field("channelId"),
        channel_name: str_field("author"),
        view_count,
        is_live: details
            .get("isLiveContent")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        caption_tracks,
    })
}

fn parse_caption_track(track: &serde_json::Value) -> Option<CaptionTrack> {
    let base_url = track
        .get("baseUrl")
        .and_then(|u| u.as_str())?
        // The srv3 format hint breaks the XML parsers downstream.
        .replace("&fmt=srv3", "");
    let language_code = track.get("languageCode").and_then(|l| l.as_str())?.to_string();

    // Track names come as either {"simpleText": ..} or {"runs": [{"text": ..}]}.
    let name = track
        .get("name")
        .and_then(|n| {
            n.get("simpleText").and_then(|t| t.as_str()).or_else(|| {
                n.get("runs")
                    .and_then(|r| r.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|r| r.get("text"))
                    .and_then(|t| t.as_str())
            })
        })
        .unwrap_or(&language_code)
        .to_string();

    Some(CaptionTrack {
        base_url,
        language_code,
        name,
        vss_id: track
            .get("vssId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        kind: track
            .get("kind")
            .and_then(|k| k.as_str())
            .map(|k| k.to_string()),
        is_translatable: track
            .get("isTranslatable")
            .and_then(|t| t.as_bool())
            .unwrap_or(false),
        is_default: track
            .get("isDefault")
            .and_then(|d| d.as_bool())
            .unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(player_response: &str) -> String {
        format!(
            "<html><head><script>var ytInitialPlayerResponse = {player_response};var other = 1;</script></head></html>"
        )
    }

    fn minimal_player_response() -> String {
        serde_json::json!({
            "playabilityStatus": {"status": "OK"},
            "videoDetails": {
                "videoId": "dQw4w9WgXcQ",
                "title": "Test Video",
                "shortDescription": "desc",
                "channelId": "UC123",
                "author": "Channel",
                "viewCount": "1234",
                "isLiveContent": false
            },
            "captions": {
                "playerCaptionsTracklistRenderer": {
                    "captionTracks": [
                        {
                            "baseUrl": "https://captions.example/en&fmt=srv3",
                            "languageCode": "en",
                            "name": {"simpleText": "English"},
                            "vssId": ".en",
                            "isTranslatable": true,
                            "isDefault": true
                        },
                        {
                            "baseUrl": "https://captions.example/es",
                            "languageCode": "es",
                            "name": {"runs": [{"text": "Spanish (auto-generated)"}]},
                            "vssId": "a.es",
                            "kind": "asr",
                            "isTranslatable": true
                        }
                    ]
                }
            }
        })
        .to_string()
    }

    #[test]
    fn test_extract_player_response() {
        let html = page_with(&minimal_player_response());
        let value = extract_player_response(&html, "dQw4w9WgXcQ").unwrap();
        assert_eq!(value["videoDetails"]["title"], "Test Video");
    }

    #[test]
    fn test_extract_missing_player_response() {
        let err = extract_player_response("<html>nothing here</html>", "dQw4w9WgXcQ").unwrap_err();
        assert!(matches!(err, TranscriptError::Parsing(_)));
    }

    #[test]
    fn test_build_video_data() {
        let value: serde_json::Value =
            serde_json::from_str(&minimal_player_response()).unwrap();
        let data = build_video_data(&value, "dQw4w9WgXcQ").unwrap();

        assert_eq!(data.title, "Test Video");
        assert_eq!(data.view_count, 1234);
        assert_eq!(data.caption_tracks.len(), 2);
        // fmt=srv3 hint stripped from the track URL.
        assert_eq!(data.caption_tracks[0].base_url, "https://captions.example/en");
        assert!(data.caption_tracks[0].is_default);
        assert_eq!(data.caption_tracks[1].kind.as_deref(), Some("asr"));
        assert_eq!(data.caption_tracks[1].name, "Spanish (auto-generated)");
    }

    #[test]
    fn test_missing_video_details_is_parse_error() {
        let value = serde_json::json!({"captions": {}});
        let err = build_video_data(&value, "dQw4w9WgXcQ").unwrap_err();
        assert!(matches!(err, TranscriptError::Parsing(_)));
    }

    #[test]
    fn test_missing_captions_key_means_disabled() {
        let value = serde_json::json!({
            "videoDetails": {"title": "t"}
        });
        let err = build_video_data(&value, "dQw4w9WgXcQ").unwrap_err();
        assert!(matches!(err, TranscriptError::TranscriptsDisabled(_)));
    }

    #[test]
    fn test_empty_track_list_means_no_transcript() {
        let value = serde_json::json!({
            "videoDetails": {"title": "t"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": []}}
        });
        let err = build_video_data(&value, "dQw4w9WgXcQ").unwrap_err();
        assert!(matches!(err, TranscriptError::NoTranscriptFound(_)));
    }

    #[test]
    fn test_playability_unavailable() {
        let value = serde_json::json!({
            "playabilityStatus": {"status": "ERROR", "reason": "Video unavailable"}
        });
        let err = assert_playability(&value, "dQw4w9WgXcQ").unwrap_err();
        assert!(matches!(err, TranscriptError::VideoUnavailable(..)));
    }

    #[test]
    fn test_playability_bot_check() {
        let value = serde_json::json!({
            "playabilityStatus": {
                "status": "LOGIN_REQUIRED",
                "reason": "Sign in to confirm you're not a bot"
            }
        });
        let err = assert_playability(&value, "dQw4w9WgXcQ").unwrap_err();
        assert!(matches!(err, TranscriptError::RateLimitExceeded { .. }));
    }
}
