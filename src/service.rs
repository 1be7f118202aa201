use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{CachedValue, TranscriptCache};
use crate::config::Config;
use crate::error::{ErrorKind, Result, TranscriptError};
use crate::format::{render, FormatOptions, OutputFormat};
use crate::metrics::Metrics;
use crate::page::{HttpClient, PageFetcher};
use crate::parser::parse_transcript_xml;
use crate::rate_limit::RateLimiter;
use crate::track::select_track;
use crate::transcript::{
    BatchError, BatchItem, BatchResult, CaptionTrack, LanguageInfo, TrackKind, Transcript,
    TranscriptMetadata, VideoData,
};
use crate::video_id;

/// Upper bound on ids per batch call.
pub const MAX_BATCH_IDS: usize = 50;

/// The orchestrator: combines resolver, page fetcher, track selector,
/// transcript parser and format engine behind the five public operations,
/// enforcing cache, rate limit, retries and bounded batch concurrency.
///
/// All shared mutable state (cache, rate limiter, metrics) is injected at
/// construction; tests build one against a mock [`HttpClient`].
pub struct TranscriptService {
    config: Arc<Config>,
    fetcher: PageFetcher,
    cache: Option<Arc<TranscriptCache>>,
    limiter: Arc<RateLimiter>,
    batch_permits: Arc<Semaphore>,
    metrics: Arc<Metrics>,
}

impl TranscriptService {
    pub fn new(
        config: Arc<Config>,
        http: Arc<dyn HttpClient>,
        cache: Option<Arc<TranscriptCache>>,
        limiter: Arc<RateLimiter>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let batch_permits = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            config,
            fetcher: PageFetcher::new(http),
            cache,
            limiter,
            batch_permits,
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch a transcript for one video, honoring the language preference
    /// list as a hard requirement when present.
    pub async fn get_transcript(
        &self,
        reference: &str,
        languages: Option<Vec<String>>,
        preserve_formatting: bool,
    ) -> Result<Arc<Transcript>> {
        self.with_deadline(self.get_transcript_inner(reference, languages, preserve_formatting))
            .await
    }

    async fn get_transcript_inner(
        &self,
        reference: &str,
        languages: Option<Vec<String>>,
        preserve_formatting: bool,
    ) -> Result<Arc<Transcript>> {
        self.metrics.inc_requests();
        let video_id = video_id::resolve(reference)?;

        let (langs, required) = match languages {
            Some(l) if !l.is_empty() => (l, true),
            _ => (self.config.default_languages.clone(), false),
        };

        let key = TranscriptCache::transcript_key(&video_id, &langs);
        if let Some(cached) = self.cache_get(&key) {
            match cached {
                CachedValue::Transcript(t) => {
                    return Ok(if preserve_formatting {
                        Arc::new(t.with_formatting(true))
                    } else {
                        t
                    });
                }
                CachedValue::Error(kind, message) => {
                    return Err(rehydrate_error(kind, message, &video_id));
                }
                CachedValue::Languages(_) => {}
            }
        }

        let outcome = self
            .fetch_and_build(&video_id, &langs, required, None)
            .await;
        self.record_outcome(&outcome);

        match outcome {
            Ok(transcript) => {
                let transcript = Arc::new(transcript);
                self.cache_set(
                    key,
                    CachedValue::Transcript(transcript.clone()),
                    Duration::from_secs(self.config.cache.transcript_ttl),
                );
                info!(
                    %video_id,
                    language = %transcript.language,
                    segments = transcript.segments.len(),
                    "transcript fetched"
                );
                Ok(if preserve_formatting {
                    Arc::new(transcript.with_formatting(true))
                } else {
                    transcript
                })
            }
            Err(e) => {
                self.cache_error(&key, &e);
                Err(e)
            }
        }
    }

    /// Enumerate the caption languages the watch page offers.
    pub async fn list_languages(
        &self,
        reference: &str,
        include_auto: bool,
    ) -> Result<Arc<Vec<LanguageInfo>>> {
        self.with_deadline(self.list_languages_inner(reference, include_auto))
            .await
    }

    async fn list_languages_inner(
        &self,
        reference: &str,
        include_auto: bool,
    ) -> Result<Arc<Vec<LanguageInfo>>> {
        self.metrics.inc_requests();
        let video_id = video_id::resolve(reference)?;

        let key = TranscriptCache::languages_key(&video_id);
        // The cache holds the unfiltered list; include_auto filters on the
        // way out so both variants share one entry.
        match self.cache_get(&key) {
            Some(CachedValue::Languages(all)) => {
                return Ok(filter_languages(all, include_auto));
            }
            Some(CachedValue::Error(kind, message)) => {
                return Err(rehydrate_error(kind, message, &video_id));
            }
            _ => {}
        }

        self.limiter.acquire().await;
        let outcome = self.fetch_video_data_with_retry(&video_id).await;
        self.record_outcome(&outcome);

        match outcome {
            Ok(data) => {
                let all: Arc<Vec<LanguageInfo>> = Arc::new(
                    data.caption_tracks
                        .iter()
                        .map(|t| LanguageInfo {
                            code: t.language_code.clone(),
                            name: t.name.clone(),
                            native_name: t.name.clone(),
                            track_kind: t.track_kind(),
                            is_translated: false,
                            is_default: t.is_default,
                        })
                        .collect(),
                );
                self.cache_set(
                    key,
                    CachedValue::Languages(all.clone()),
                    Duration::from_secs(self.config.cache.languages_ttl),
                );
                Ok(filter_languages(all, include_auto))
            }
            Err(e) => {
                self.cache_error(&key, &e);
                Err(e)
            }
        }
    }

    /// Fetch a transcript in `target`, requesting an auto-translated track
    /// when the page does not offer `target` natively.
    pub async fn translate_transcript(
        &self,
        reference: &str,
        target: &str,
        source: Option<String>,
    ) -> Result<Arc<Transcript>> {
        let available = self.list_languages(reference, true).await?;

        if available.iter().any(|l| l.code == target) {
            return self
                .get_transcript(reference, Some(vec![target.to_string()]), false)
                .await;
        }

        let result = self
            .with_deadline(self.translated_fetch(reference, target, source))
            .await;

        match result {
            Ok(t) => Ok(t),
            // Transient faults keep their kind; anything else means the
            // language genuinely is not to be had.
            Err(e) if e.is_retryable() => Err(e),
            Err(_) => Err(TranscriptError::LanguageNotAvailable {
                video_id: video_id::resolve(reference).unwrap_or_else(|_| reference.to_string()),
                requested: vec![target.to_string()],
                available: available.iter().map(|l| l.code.clone()).collect(),
            }),
        }
    }

    async fn translated_fetch(
        &self,
        reference: &str,
        target: &str,
        source: Option<String>,
    ) -> Result<Arc<Transcript>> {
        self.metrics.inc_requests();
        let video_id = video_id::resolve(reference)?;

        let langs = vec![target.to_string()];
        let key = TranscriptCache::transcript_key(&video_id, &langs);
        if let Some(CachedValue::Transcript(t)) = self.cache_get(&key) {
            return Ok(t);
        }

        let outcome = self
            .fetch_and_build(&video_id, &langs, false, Some((target, source)))
            .await;
        self.record_outcome(&outcome);

        let transcript = Arc::new(outcome?);
        self.cache_set(
            key,
            CachedValue::Transcript(transcript.clone()),
            Duration::from_secs(self.config.cache.transcript_ttl),
        );
        Ok(transcript)
    }

    /// Fetch and render in one call; returns the transcript plus the
    /// rendered body.
    pub async fn format_transcript(
        &self,
        reference: &str,
        format: OutputFormat,
        opts: FormatOptions,
    ) -> Result<(Arc<Transcript>, String)> {
        let transcript = self.get_transcript(reference, None, true).await?;
        let rendered = render(&transcript.segments, format, &opts);
        Ok((transcript, rendered))
    }

    /// Dispatch `get_transcript` over up to [`MAX_BATCH_IDS`] videos,
    /// optionally in parallel bounded by `max_concurrent`.
    pub async fn get_multiple_transcripts(
        self: Arc<Self>,
        references: Vec<String>,
        languages: Option<Vec<String>>,
        continue_on_error: bool,
        parallel: bool,
    ) -> Result<BatchResult> {
        if references.is_empty() {
            return Err(TranscriptError::Internal(
                "batch requires at least one video identifier".to_string(),
            ));
        }
        if references.len() > MAX_BATCH_IDS {
            return Err(TranscriptError::Internal(format!(
                "batch is limited to {MAX_BATCH_IDS} ids, got {}",
                references.len()
            )));
        }

        let mut items: Vec<Option<BatchItem>> = (0..references.len()).map(|_| None).collect();

        if parallel {
            let mut set: JoinSet<(usize, BatchItem)> = JoinSet::new();
            for (index, reference) in references.iter().cloned().enumerate() {
                let service = Arc::clone(&self);
                let langs = languages.clone();
                let permits = Arc::clone(&self.batch_permits);
                set.spawn(async move {
                    // Closed only on abort; holding the permit for the whole
                    // task bounds simultaneous fetches.
                    let _permit = permits.acquire_owned().await;
                    let item = service.batch_one(&reference, langs).await;
                    (index, item)
                });
            }

            while let Some(joined) = set.join_next().await {
                let Ok((index, item)) = joined else {
                    continue;
                };
                if !item.success && !continue_on_error {
                    set.abort_all();
                    return Err(batch_item_error(item));
                }
                items[index] = Some(item);
            }
        } else {
            for (index, reference) in references.iter().enumerate() {
                let item = self.batch_one(reference, languages.clone()).await;
                if !item.success && !continue_on_error {
                    return Err(batch_item_error(item));
                }
                items[index] = Some(item);
            }
        }

        let results: Vec<BatchItem> = items.into_iter().flatten().collect();
        let errors: Vec<BatchError> = results.iter().filter_map(|i| i.error.clone()).collect();
        let success_count = results.iter().filter(|i| i.success).count();
        let error_count = errors.len();

        Ok(BatchResult {
            total: results.len(),
            success_count,
            error_count,
            results,
            errors,
        })
    }

    async fn batch_one(&self, reference: &str, languages: Option<Vec<String>>) -> BatchItem {
        let started = Instant::now();
        let resolved = video_id::resolve(reference).unwrap_or_else(|_| reference.to_string());

        match self.get_transcript(reference, languages, false).await {
            Ok(transcript) => BatchItem {
                video_id: resolved,
                success: true,
                transcript: Some(transcript.as_ref().clone()),
                error: None,
                processing_time_ms: started.elapsed().as_millis() as u64,
            },
            Err(e) => BatchItem {
                video_id: resolved.clone(),
                success: false,
                transcript: None,
                error: Some(BatchError {
                    kind: e.kind(),
                    message: e.to_string(),
                    video_id: Some(resolved),
                }),
                processing_time_ms: started.elapsed().as_millis() as u64,
            },
        }
    }

    // ---- shared plumbing ----------------------------------------------

    /// The shared fetch pipeline: rate token, watch page, track selection,
    /// caption download, XML parse, transcript assembly. `translate` asks
    /// for an auto-translated variant via `tlang`.
    async fn fetch_and_build(
        &self,
        video_id: &str,
        langs: &[String],
        required: bool,
        translate: Option<(&str, Option<String>)>,
    ) -> Result<Transcript> {
        self.limiter.acquire().await;

        let data = self.fetch_video_data_with_retry(video_id).await?;

        let (track, language, kind) = match translate {
            None => {
                let track = select_track(video_id, &data.caption_tracks, langs, required)?;
                (track, track.language_code.clone(), track.track_kind())
            }
            Some((target, ref source)) => {
                let track = pick_translation_source(video_id, &data, source.as_deref())?;
                (track, target.to_string(), TrackKind::Generated)
            }
        };

        let mut url = track.base_url.clone();
        if let Some((target, _)) = translate {
            url = format!("{url}&tlang={target}");
        }

        let fetcher = &self.fetcher;
        let url_ref = url.as_str();
        let xml = self
            .with_retry("caption track", move || {
                fetcher.fetch_track_xml(video_id, url_ref)
            })
            .await?;

        let segments = parse_transcript_xml(&xml)?;

        Ok(Transcript::assemble(
            video_id.to_string(),
            language.clone(),
            kind,
            segments,
            TranscriptMetadata {
                extracted_at: chrono::Utc::now(),
                detected_language: language,
                source: "watch_page".to_string(),
                title: Some(data.title.clone()).filter(|t| !t.is_empty()),
                channel_id: Some(data.channel_id.clone()).filter(|c| !c.is_empty()),
                channel_name: Some(data.channel_name.clone()).filter(|c| !c.is_empty()),
            },
            false,
        ))
    }

    async fn fetch_video_data_with_retry(&self, video_id: &str) -> Result<VideoData> {
        let fetcher = &self.fetcher;
        self.with_retry("watch page", move || fetcher.fetch_video_data(video_id))
            .await
    }

    /// Retry envelope for the outbound fetches. Total tries are bounded by
    /// `retry_attempts`; only NETWORK_ERROR, TIMEOUT_ERROR and
    /// RATE_LIMIT_EXCEEDED are retried.
    async fn with_retry<T, Fut>(&self, what: &str, mut f: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.config.retry_attempts => {
                    if e.kind() == ErrorKind::RateLimitExceeded {
                        self.metrics.inc_rate_limit_hits();
                        self.limiter.record_rate_limit_failure();
                    }
                    let jitter: f64 = rand::thread_rng().gen_range(0.0..0.25);
                    let delay = self.config.retry_delay().as_secs_f64()
                        * self.config.backoff_factor.powi(attempt as i32 - 1)
                        * (1.0 + jitter);
                    warn!(
                        what,
                        attempt,
                        delay_ms = (delay * 1000.0) as u64,
                        error = %e,
                        "retrying fetch"
                    );
                    self.metrics.inc_retries();
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn with_deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.request_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => {
                self.metrics.inc_errors();
                Err(TranscriptError::Timeout(format!(
                    "operation exceeded {}s deadline",
                    self.config.request_timeout
                )))
            }
        }
    }

    fn record_outcome<T>(&self, outcome: &Result<T>) {
        match outcome {
            Ok(_) => self.limiter.record_success(),
            Err(e) => {
                self.metrics.inc_errors();
                if e.kind() == ErrorKind::RateLimitExceeded {
                    self.metrics.inc_rate_limit_hits();
                    self.limiter.record_rate_limit_failure();
                }
            }
        }
    }

    fn cache_get(&self, key: &str) -> Option<CachedValue> {
        let cache = self.cache.as_ref()?;
        match cache.get(key) {
            Some(value) => {
                self.metrics.inc_cache_hit();
                debug!(key, "cache hit");
                Some(value)
            }
            None => {
                self.metrics.inc_cache_miss();
                None
            }
        }
    }

    fn cache_set(&self, key: String, value: CachedValue, ttl: Duration) {
        if let Some(cache) = &self.cache {
            cache.set(key, value, ttl);
        }
    }

    /// Negative caching: remember typed, deterministic failures for the
    /// error TTL. Transient kinds are never cached.
    fn cache_error(&self, key: &str, error: &TranscriptError) {
        if matches!(
            error.kind(),
            ErrorKind::RateLimitExceeded | ErrorKind::Timeout | ErrorKind::Network
        ) {
            return;
        }
        self.cache_set(
            key.to_string(),
            CachedValue::Error(error.kind(), error.to_string()),
            Duration::from_secs(self.config.cache.error_ttl),
        );
    }
}

fn filter_languages(all: Arc<Vec<LanguageInfo>>, include_auto: bool) -> Arc<Vec<LanguageInfo>> {
    if include_auto {
        return all;
    }
    Arc::new(
        all.iter()
            .filter(|l| l.track_kind != TrackKind::Auto)
            .cloned()
            .collect(),
    )
}

/// For a `tlang` fetch: an explicit source track when requested, else the
/// default translatable track, else any translatable track.
fn pick_translation_source<'a>(
    video_id: &str,
    data: &'a VideoData,
    source: Option<&str>,
) -> Result<&'a CaptionTrack> {
    if let Some(code) = source {
        return data
            .caption_tracks
            .iter()
            .find(|t| t.language_code == code)
            .ok_or_else(|| TranscriptError::LanguageNotAvailable {
                video_id: video_id.to_string(),
                requested: vec![code.to_string()],
                available: data
                    .caption_tracks
                    .iter()
                    .map(|t| t.language_code.clone())
                    .collect(),
            });
    }

    data.caption_tracks
        .iter()
        .find(|t| t.is_translatable && t.is_default)
        .or_else(|| data.caption_tracks.iter().find(|t| t.is_translatable))
        .ok_or_else(|| TranscriptError::NoTranscriptFound(video_id.to_string()))
}

/// The typed error behind a failed batch item, for the abort-on-error path.
fn batch_item_error(item: BatchItem) -> TranscriptError {
    match item.error {
        Some(error) => {
            let video_id = error.video_id.unwrap_or_default();
            rehydrate_error(error.kind, error.message, &video_id)
        }
        None => TranscriptError::Internal("batch item failed without an error".to_string()),
    }
}

/// Rebuild a typed error from its cached (kind, message) shape.
fn rehydrate_error(kind: ErrorKind, message: String, video_id: &str) -> TranscriptError {
    match kind {
        ErrorKind::InvalidVideoId => TranscriptError::InvalidVideoId(message),
        ErrorKind::VideoUnavailable => {
            TranscriptError::VideoUnavailable(video_id.to_string(), message)
        }
        ErrorKind::NoTranscriptFound => TranscriptError::NoTranscriptFound(video_id.to_string()),
        ErrorKind::TranscriptsDisabled => {
            TranscriptError::TranscriptsDisabled(video_id.to_string())
        }
        ErrorKind::LanguageNotAvailable => TranscriptError::LanguageNotAvailable {
            video_id: video_id.to_string(),
            requested: vec![],
            available: vec![],
        },
        ErrorKind::Network => TranscriptError::Network(message),
        ErrorKind::Parsing => TranscriptError::Parsing(message),
        ErrorKind::RateLimitExceeded => TranscriptError::RateLimitExceeded {
            video_id: Some(video_id.to_string()),
            retry_after: None,
        },
        ErrorKind::Timeout => TranscriptError::Timeout(message),
        ErrorKind::Internal => TranscriptError::Internal(message),
    }
}
