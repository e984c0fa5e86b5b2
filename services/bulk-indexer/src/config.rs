use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_FLUSH_THRESHOLD_BYTES: usize = 1024 * 1024;
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10 * 60;
pub const DEFAULT_SCROLL_TTL_SECS: u64 = 5 * 60;
pub const DEFAULT_SCROLL_PAGE_SIZE: usize = 1000;
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub index: IndexConfig,
    pub bulk: BulkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub data_dir: String,
    pub name: String,
    pub replicas: u32,
    pub refresh_interval: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            data_dir: "./data".to_string(),
            name: "documents".to_string(),
            replicas: 1,
            refresh_interval: "1s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    pub large: bool,
    pub flush_threshold_bytes: usize,
    pub concurrent_batches: Option<usize>,
    pub retry_once: bool,
    pub drain_timeout_secs: u64,
    pub scroll_ttl_secs: u64,
    pub scroll_page_size: usize,
    pub progress_interval_secs: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        BulkConfig {
            large: false,
            flush_threshold_bytes: DEFAULT_FLUSH_THRESHOLD_BYTES,
            concurrent_batches: None,
            retry_once: true,
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT_SECS,
            scroll_ttl_secs: DEFAULT_SCROLL_TTL_SECS,
            scroll_page_size: DEFAULT_SCROLL_PAGE_SIZE,
            progress_interval_secs: DEFAULT_PROGRESS_INTERVAL_SECS,
        }
    }
}

impl BulkConfig {
    /// Number of batches allowed in flight: the configured value, or one less
    /// than the detected parallelism. Never below one.
    pub fn concurrency(&self) -> usize {
        match self.concurrent_batches {
            Some(n) => n.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1),
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn scroll_ttl(&self) -> Duration {
        Duration::from_secs(self.scroll_ttl_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("DATA_DIR") {
            config.index.data_dir = data_dir;
        }
        if let Ok(name) = std::env::var("INDEX_NAME") {
            config.index.name = name;
        }
        if let Ok(replicas) = std::env::var("INDEX_REPLICAS") {
            config.index.replicas = replicas.parse()?;
        }
        if let Ok(refresh_interval) = std::env::var("INDEX_REFRESH_INTERVAL") {
            config.index.refresh_interval = refresh_interval;
        }

        if let Ok(large) = std::env::var("BULK_LARGE") {
            config.bulk.large = large.parse().unwrap_or(false);
        }
        if let Ok(threshold) = std::env::var("BULK_FLUSH_THRESHOLD_BYTES") {
            config.bulk.flush_threshold_bytes =
                threshold.parse().unwrap_or(DEFAULT_FLUSH_THRESHOLD_BYTES);
        }
        if let Ok(concurrent) = std::env::var("BULK_CONCURRENT_BATCHES") {
            config.bulk.concurrent_batches = concurrent.parse().ok();
        }
        if let Ok(retry_once) = std::env::var("BULK_RETRY_ONCE") {
            config.bulk.retry_once = retry_once.parse().unwrap_or(true);
        }
        if let Ok(timeout) = std::env::var("BULK_DRAIN_TIMEOUT_SECS") {
            config.bulk.drain_timeout_secs = timeout.parse().unwrap_or(DEFAULT_DRAIN_TIMEOUT_SECS);
        }
        if let Ok(ttl) = std::env::var("BULK_SCROLL_TTL_SECS") {
            config.bulk.scroll_ttl_secs = ttl.parse().unwrap_or(DEFAULT_SCROLL_TTL_SECS);
        }
        if let Ok(page_size) = std::env::var("BULK_SCROLL_PAGE_SIZE") {
            config.bulk.scroll_page_size = page_size.parse().unwrap_or(DEFAULT_SCROLL_PAGE_SIZE);
        }
        if let Ok(interval) = std::env::var("BULK_PROGRESS_INTERVAL_SECS") {
            config.bulk.progress_interval_secs =
                interval.parse().unwrap_or(DEFAULT_PROGRESS_INTERVAL_SECS);
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            bulk: BulkConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_config_defaults() {
        let config = BulkConfig::default();
        assert!(!config.large);
        assert_eq!(config.flush_threshold_bytes, 1_048_576);
        assert!(config.retry_once);
        assert_eq!(config.drain_timeout(), Duration::from_secs(600));
        assert_eq!(config.scroll_ttl(), Duration::from_secs(300));
        assert!(config.concurrency() >= 1);
    }

    #[test]
    fn test_concurrency_floor() {
        let config = BulkConfig {
            concurrent_batches: Some(0),
            ..BulkConfig::default()
        };
        assert_eq!(config.concurrency(), 1);
    }

    #[test]
    fn test_parse_toml() {
        let content = r#"
            [index]
            data_dir = "/tmp/idx"
            name = "issues"
            replicas = 2
            refresh_interval = "30s"

            [bulk]
            large = true
            concurrent_batches = 3

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.index.name, "issues");
        assert!(config.bulk.large);
        assert_eq!(config.bulk.concurrency(), 3);
        assert_eq!(config.bulk.flush_threshold_bytes, DEFAULT_FLUSH_THRESHOLD_BYTES);
    }
}
