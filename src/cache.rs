use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ErrorKind;
use crate::transcript::{LanguageInfo, Transcript};

/// Values the orchestrator caches. Typed failures may be cached too
/// (negative caching under a short TTL).
#[derive(Debug, Clone)]
pub enum CachedValue {
    Transcript(Arc<Transcript>),
    Languages(Arc<Vec<LanguageInfo>>),
    Error(ErrorKind, String),
}

struct CacheEntry {
    value: CachedValue,
    inserted_at: Instant,
    expires_at: Instant,
    hits: AtomicU64,
}

/// Bounded in-memory TTL cache. Concurrent readers, exclusive writers;
/// each operation is individually atomic. When full on insert, the entry
/// with the earliest `inserted_at` is evicted.
pub struct TranscriptCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_size: usize,
}

impl TranscriptCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size: max_size.max(1),
        }
    }

    pub fn transcript_key(video_id: &str, languages: &[String]) -> String {
        format!("transcript:{}:{}", video_id, languages.join(","))
    }

    pub fn languages_key(video_id: &str) -> String {
        format!("languages:{video_id}")
    }

    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        entry.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    pub fn set(&self, key: String, value: CachedValue, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write();

        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            // Evict by earliest insertion, not last access.
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now + ttl,
                hits: AtomicU64::new(0),
            },
        );
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn size(&self) -> usize {
        self.entries.read().len()
    }

    /// Remove every entry whose TTL has expired. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    /// Periodic janitor; runs until the token is cancelled.
    pub async fn run_janitor(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep_expired();
                    if removed > 0 {
                        debug!(removed, remaining = self.size(), "cache sweep");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{TrackKind, TranscriptMetadata};
    use chrono::Utc;

    fn transcript(id: &str) -> Arc<Transcript> {
        Arc::new(Transcript::assemble(
            id.to_string(),
            "en".into(),
            TrackKind::Manual,
            vec![],
            TranscriptMetadata {
                extracted_at: Utc::now(),
                detected_language: "en".into(),
                source: "watch-page".into(),
                title: None,
                channel_id: None,
                channel_name: None,
            },
            false,
        ))
    }

    #[test]
    fn test_keys() {
        assert_eq!(
            TranscriptCache::transcript_key("dQw4w9WgXcQ", &["en".into(), "es".into()]),
            "transcript:dQw4w9WgXcQ:en,es"
        );
        assert_eq!(
            TranscriptCache::languages_key("dQw4w9WgXcQ"),
            "languages:dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_set_get_roundtrip() {
        let cache = TranscriptCache::new(10);
        cache.set(
            "k".into(),
            CachedValue::Transcript(transcript("a")),
            Duration::from_secs(60),
        );
        assert!(matches!(
            cache.get("k"),
            Some(CachedValue::Transcript(t)) if t.video_id == "a"
        ));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_expired_entry_not_returned() {
        let cache = TranscriptCache::new(10);
        cache.set(
            "k".into(),
            CachedValue::Transcript(transcript("a")),
            Duration::from_secs(0),
        );
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_eviction_by_insertion_order() {
        let cache = TranscriptCache::new(2);
        cache.set(
            "first".into(),
            CachedValue::Transcript(transcript("a")),
            Duration::from_secs(60),
        );
        std::thread::sleep(Duration::from_millis(5));
        cache.set(
            "second".into(),
            CachedValue::Transcript(transcript("b")),
            Duration::from_secs(60),
        );
        std::thread::sleep(Duration::from_millis(5));
        // Reading "first" must not protect it; eviction is by insertion.
        cache.get("first");
        cache.set(
            "third".into(),
            CachedValue::Transcript(transcript("c")),
            Duration::from_secs(60),
        );

        assert_eq!(cache.size(), 2);
        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
        assert!(cache.get("third").is_some());
    }

    #[test]
    fn test_overwrite_same_key_keeps_size() {
        let cache = TranscriptCache::new(2);
        cache.set(
            "k".into(),
            CachedValue::Transcript(transcript("a")),
            Duration::from_secs(60),
        );
        cache.set(
            "k".into(),
            CachedValue::Transcript(transcript("b")),
            Duration::from_secs(60),
        );
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = TranscriptCache::new(10);
        cache.set(
            "k".into(),
            CachedValue::Transcript(transcript("a")),
            Duration::from_secs(60),
        );
        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));

        cache.set(
            "x".into(),
            CachedValue::Transcript(transcript("a")),
            Duration::from_secs(60),
        );
        cache.clear();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_sweep_expired() {
        let cache = TranscriptCache::new(10);
        cache.set(
            "dead".into(),
            CachedValue::Transcript(transcript("a")),
            Duration::from_secs(0),
        );
        cache.set(
            "live".into(),
            CachedValue::Transcript(transcript("b")),
            Duration::from_secs(60),
        );
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.size(), 1);
        assert!(cache.get("live").is_some());
    }
}
