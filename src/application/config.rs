//! Runtime configuration read from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::infrastructure::HttpServiceConfig;

pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Timing policy of the draft sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Quiet period after the last edit before a save is attempted.
    pub debounce_ms: u64,
    /// Remote save attempts per sync before falling back to local storage.
    pub max_attempts: u32,
    /// First backoff delay; doubles with every further attempt.
    pub retry_base_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
        }
    }
}

impl SyncConfig {
    /// Delay before the attempt following failed attempt number `attempt` (0-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use admitsync::application::SyncConfig;
    ///
    /// let config = SyncConfig::default();
    /// assert_eq!(config.backoff_delay_ms(0), 500);
    /// assert_eq!(config.backoff_delay_ms(1), 1_000);
    /// assert_eq!(config.backoff_delay_ms(2), 2_000);
    /// ```
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        self.retry_base_ms
            .saturating_mul(1u64 << attempt.min(20))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Portal API base URL. `None` runs against the in-process loopback service.
    pub api_url: Option<String>,
    pub bearer_token: Option<String>,
    pub user_id: String,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub request_timeout_ms: u64,
    pub sync: SyncConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            bearer_token: None,
            user_id: "local-user".to_string(),
            data_dir: PathBuf::from(".admitsync"),
            log_file: PathBuf::from("admitsync.log"),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            sync: SyncConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Invalid or
    /// out-of-range values are logged and replaced by their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let bounded = |name: &str, range: std::ops::RangeInclusive<u64>, default: u64| {
            let Some(raw) = text(name) else {
                return default;
            };
            match raw.parse::<u64>() {
                Ok(v) if range.contains(&v) => v,
                _ => {
                    warn!(variable = name, value = %raw, default, "ignoring invalid setting");
                    default
                }
            }
        };

        let data_dir = text("ADMITSYNC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let log_file = text("ADMITSYNC_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        Self {
            api_url: text("ADMITSYNC_API_URL"),
            bearer_token: text("ADMITSYNC_TOKEN"),
            user_id: text("ADMITSYNC_USER_ID").unwrap_or(defaults.user_id),
            data_dir,
            log_file,
            request_timeout_ms: bounded(
                "ADMITSYNC_REQUEST_TIMEOUT_MS",
                100..=120_000,
                DEFAULT_REQUEST_TIMEOUT_MS,
            ),
            sync: SyncConfig {
                debounce_ms: bounded("ADMITSYNC_DEBOUNCE_MS", 50..=60_000, DEFAULT_DEBOUNCE_MS),
                max_attempts: bounded("ADMITSYNC_MAX_ATTEMPTS", 1..=10, u64::from(DEFAULT_MAX_ATTEMPTS))
                    as u32,
                retry_base_ms: bounded("ADMITSYNC_RETRY_BASE_MS", 10..=60_000, DEFAULT_RETRY_BASE_MS),
            },
        }
    }

    pub fn http_config(&self) -> Option<HttpServiceConfig> {
        let base_url = self.api_url.clone()?;
        Some(HttpServiceConfig {
            base_url,
            bearer_token: self.bearer_token.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        })
    }
}
