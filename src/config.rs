use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_per_minute() -> u32 {
    60
}

fn default_per_hour() -> u32 {
    1000
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_concurrent() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Memory
}

fn default_transcript_ttl() -> u64 {
    24 * 3600
}

fn default_languages_ttl() -> u64 {
    6 * 3600
}

fn default_error_ttl() -> u64 {
    15 * 60
}

fn default_cache_max_size() -> usize {
    1000
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_log_output() -> LogOutput {
    LogOutput::Stderr
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// `memory` is the only built-in backend; `redis` is accepted by the
/// parser as an extension point and currently behaves like `memory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackend,
    /// Seconds.
    pub transcript_ttl: u64,
    pub languages_ttl: u64,
    pub error_ttl: u64,
    pub max_size: usize,
    pub cleanup_interval: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_cache_backend(),
            transcript_ttl: default_transcript_ttl(),
            languages_ttl: default_languages_ttl(),
            error_ttl: default_error_ttl(),
            max_size: default_cache_max_size(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            output: default_log_output(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_languages")]
    pub default_languages: Vec<String>,
    /// Seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Milliseconds; base of the backoff curve.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_per_minute")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_per_hour")]
    pub rate_limit_per_hour: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub proxy_list: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_proxy_rotation: bool,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        // An empty document deserializes to all defaults.
        toml::from_str("").expect("default config")
    }
}

impl Config {
    /// Load configuration: file (if given), then `YTMCP_*` environment
    /// overrides on top.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", p.display()))?
            }
            None => Config::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("YTMCP_DEFAULT_LANGUAGES") {
            self.default_languages = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = std::env::var("YTMCP_REQUEST_TIMEOUT") {
            if let Ok(n) = v.parse() {
                self.request_timeout = n;
            }
        }
        if let Ok(v) = std::env::var("YTMCP_RETRY_ATTEMPTS") {
            if let Ok(n) = v.parse() {
                self.retry_attempts = n;
            }
        }
        if let Ok(v) = std::env::var("YTMCP_RATE_LIMIT_PER_MINUTE") {
            if let Ok(n) = v.parse() {
                self.rate_limit_per_minute = n;
            }
        }
        if let Ok(v) = std::env::var("YTMCP_RATE_LIMIT_PER_HOUR") {
            if let Ok(n) = v.parse() {
                self.rate_limit_per_hour = n;
            }
        }
        if let Ok(v) = std::env::var("YTMCP_USER_AGENT") {
            self.user_agent = v;
        }
        if let Ok(v) = std::env::var("YTMCP_PROXY_URL") {
            if !v.is_empty() {
                self.proxy_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("YTMCP_PROXY_LIST") {
            self.proxy_list = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("YTMCP_MAX_CONCURRENT") {
            if let Ok(n) = v.parse() {
                self.max_concurrent = n;
            }
        }
        if let Ok(v) = std::env::var("YTMCP_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.retry_attempts >= 1, "retry_attempts must be >= 1");
        anyhow::ensure!(self.backoff_factor >= 1.0, "backoff_factor must be >= 1.0");
        anyhow::ensure!(self.max_concurrent >= 1, "max_concurrent must be >= 1");
        anyhow::ensure!(
            self.rate_limit_per_minute >= 1 && self.rate_limit_per_hour >= 1,
            "rate limits must be >= 1"
        );
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// The effective proxy pool: `proxy_list` when present, else the single
    /// `proxy_url`, else empty (direct connections).
    pub fn proxies(&self) -> Vec<String> {
        if !self.proxy_list.is_empty() {
            self.proxy_list.clone()
        } else {
            self.proxy_url.iter().cloned().collect()
        }
    }
}
