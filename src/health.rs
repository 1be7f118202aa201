use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;

use crate::cache::{CachedValue, TranscriptCache};
use crate::error::ErrorKind;

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    pub detail: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub checks: BTreeMap<&'static str, CheckResult>,
}

/// Probes the cache and the fetcher configuration for the health endpoints.
pub struct HealthChecker {
    cache: Option<Arc<TranscriptCache>>,
    proxy_count: usize,
    started_at: Instant,
}

impl HealthChecker {
    pub fn new(cache: Option<Arc<TranscriptCache>>, proxy_count: usize) -> Self {
        Self {
            cache,
            proxy_count,
            started_at: Instant::now(),
        }
    }

    pub fn check(&self) -> HealthReport {
        let mut checks = BTreeMap::new();

        checks.insert("cache", self.check_cache());
        checks.insert("fetcher", self.check_fetcher());

        let healthy = checks.values().all(|c| c.status == "ok");
        HealthReport {
            status: if healthy { "ok" } else { "degraded" },
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            checks,
        }
    }

    fn check_cache(&self) -> CheckResult {
        let Some(cache) = &self.cache else {
            return CheckResult {
                status: "ok",
                detail: "cache disabled".to_string(),
                latency_ms: 0,
            };
        };

        let started = Instant::now();
        let key = "health:probe".to_string();
        cache.set(
            key.clone(),
            CachedValue::Error(ErrorKind::Internal, "probe".to_string()),
            Duration::from_secs(1),
        );
        let ok = cache.get(&key).is_some();
        cache.delete(&key);

        CheckResult {
            status: if ok { "ok" } else { "failing" },
            detail: format!("{} entries", cache.size()),
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn check_fetcher(&self) -> CheckResult {
        CheckResult {
            status: "ok",
            detail: if self.proxy_count == 0 {
                "direct connections".to_string()
            } else {
                format!("{} proxies in rotation", self.proxy_count)
            },
            latency_ms: 0,
        }
    }
}
