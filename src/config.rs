use crate::constants::{DEFAULT_MAX_SYNC_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS};
use crate::core::conflict::ConflictStrategy;
use dotenv::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

#[derive(Debug)]
pub struct Config {
    pub log_level: String,
    pub max_sync_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub conflict_strategy: ConflictStrategy,
}

impl Config {
    fn from_env() -> Self {
        dotenv().ok();

        Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            max_sync_retries: env::var("SYNC_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_MAX_SYNC_RETRIES),
            retry_base_delay_ms: env::var("SYNC_RETRY_BASE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
            retry_max_delay_ms: env::var("SYNC_RETRY_MAX_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
            conflict_strategy: env::var("SYNC_CONFLICT_STRATEGY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }
}

// Global static accessible everywhere
pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Knobs of the sync engine, taken from [`CONFIG`] in the binary and built
/// directly in tests.
#[derive(Clone, Debug)]
pub struct SyncSettings {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub conflict_strategy: ConflictStrategy,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        SyncSettings {
            max_retries: config.max_sync_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(config.retry_max_delay_ms),
            conflict_strategy: config.conflict_strategy,
        }
    }

    /// Delay before the next attempt of an action that has failed `retry_count` times.
    pub fn backoff_for(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(16);
        self.retry_base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.retry_max_delay)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            max_retries: DEFAULT_MAX_SYNC_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            retry_max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            conflict_strategy: ConflictStrategy::default(),
        }
    }
}
