use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Process-wide counters, exposed in Prometheus text format on the
/// optional metrics listener.
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounter,
    errors_total: IntCounter,
    cache_hits_total: IntCounter,
    cache_misses_total: IntCounter,
    retries_total: IntCounter,
    rate_limit_hits_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            let counter =
                IntCounter::new(name, help).expect("Failed to create metrics counter");
            registry
                .register(Box::new(counter.clone()))
                .expect("Failed to register metrics counter");
            counter
        };

        let requests_total = counter("ytmcp_requests_total", "Total tool invocations.");
        let errors_total = counter(
            "ytmcp_errors_total",
            "Total tool invocations that returned an error.",
        );
        let cache_hits_total = counter(
            "ytmcp_cache_hits_total",
            "Cache lookups that returned a live entry.",
        );
        let cache_misses_total =
            counter("ytmcp_cache_misses_total", "Cache lookups that missed.");
        let retries_total = counter("ytmcp_retries_total", "Retried outbound fetches.");
        let rate_limit_hits_total = counter(
            "ytmcp_rate_limit_hits_total",
            "Upstream rate-limit responses observed.",
        );

        Self {
            registry,
            requests_total,
            errors_total,
            cache_hits_total,
            cache_misses_total,
            retries_total,
            rate_limit_hits_total,
        }
    }

    pub fn inc_requests(&self) {
        self.requests_total.inc();
    }

    pub fn inc_errors(&self) {
        self.errors_total.inc();
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits_total.inc();
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses_total.inc();
    }

    pub fn inc_retries(&self) {
        self.retries_total.inc();
    }

    pub fn inc_rate_limit_hits(&self) {
        self.rate_limit_hits_total.inc();
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder
            .encode(&self.registry.gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
