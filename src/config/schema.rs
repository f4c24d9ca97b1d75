use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Account-leasing crawl with category enrichment.
    #[default]
    Full,
    /// Account-less listing crawl through rotated proxies.
    Lite,
    /// Both pipelines side by side.
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CrawlerConfig {
    #[serde(default)]
    pub mode: Mode,

    #[validate]
    pub backend: BackendConfig,

    #[serde(default)]
    #[validate]
    pub marketplace: MarketplaceConfig,

    #[serde(default)]
    #[validate]
    pub full: FullPipelineConfig,

    #[serde(default)]
    #[validate]
    pub lite: LitePipelineConfig,

    /// Fallback proxies for accounts that come without one.
    #[serde(default)]
    pub proxies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BackendConfig {
    #[validate(url)]
    pub base_url: String,

    #[serde(default)]
    pub token: Option<String>,

    /// Name of an environment variable holding the bearer token.
    #[serde(default)]
    pub token_env: Option<String>,

    #[serde(default = "default_backend_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

impl BackendConfig {
    /// Explicit token first, then the named environment variable.
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Some(token.clone());
        }
        self.token_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|t| !t.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MarketplaceConfig {
    #[serde(default = "default_marketplace_url")]
    #[validate(url)]
    pub base_url: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: default_marketplace_url(),
            accept_language: default_accept_language(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FullPipelineConfig {
    #[serde(default = "default_full_max_categories")]
    pub max_categories: usize,

    /// Debounce before every reservation attempt.
    #[serde(default = "default_poll_delay")]
    pub poll_delay_ms: u64,

    #[serde(default = "default_idle_wait")]
    pub idle_wait_secs: u64,

    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,

    #[serde(default = "default_max_in_flight")]
    #[validate(range(min = 1))]
    pub max_in_flight: usize,

    #[serde(default = "default_true")]
    pub reset_accounts_on_start: bool,

    #[serde(default = "default_full_log_every")]
    #[validate(range(min = 1))]
    pub log_every: usize,

    /// Upper bound of the random factor added to every inter-request delay.
    #[serde(default = "default_jitter")]
    #[validate(range(min = 0.0, max = 5.0))]
    pub jitter: f64,
}

impl Default for FullPipelineConfig {
    fn default() -> Self {
        Self {
            max_categories: default_full_max_categories(),
            poll_delay_ms: default_poll_delay(),
            idle_wait_secs: default_idle_wait(),
            error_backoff_secs: default_error_backoff(),
            max_in_flight: default_max_in_flight(),
            reset_accounts_on_start: true,
            log_every: default_full_log_every(),
            jitter: default_jitter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LitePipelineConfig {
    #[serde(default = "default_lite_max_categories")]
    pub max_categories: usize,

    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    #[serde(default = "default_batch_delay")]
    pub batch_delay_secs: u64,

    #[serde(default = "default_idle_wait")]
    pub idle_wait_secs: u64,

    #[serde(default = "default_lite_log_every")]
    #[validate(range(min = 1))]
    pub log_every: usize,

    #[serde(default = "default_jitter")]
    #[validate(range(min = 0.0, max = 5.0))]
    pub jitter: f64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Static proxy list; fetched from the backend when empty.
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl Default for LitePipelineConfig {
    fn default() -> Self {
        Self {
            max_categories: default_lite_max_categories(),
            request_delay_ms: default_request_delay(),
            batch_delay_secs: default_batch_delay(),
            idle_wait_secs: default_idle_wait(),
            log_every: default_lite_log_every(),
            jitter: default_jitter(),
            user_agent: default_user_agent(),
            proxies: Vec::new(),
        }
    }
}

fn default_backend_timeout() -> u64 {
    30
}

fn default_marketplace_url() -> String {
    "https://buff.163.com".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9,ru;q=0.8".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_full_max_categories() -> usize {
    6
}

fn default_lite_max_categories() -> usize {
    2
}

fn default_poll_delay() -> u64 {
    100
}

fn default_idle_wait() -> u64 {
    600
}

fn default_error_backoff() -> u64 {
    5
}

fn default_max_in_flight() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_full_log_every() -> usize {
    10
}

fn default_lite_log_every() -> usize {
    100
}

fn default_jitter() -> f64 {
    0.5
}

fn default_request_delay() -> u64 {
    1000
}

fn default_batch_delay() -> u64 {
    3
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string()
}
