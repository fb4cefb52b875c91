//! Server configuration, assembled from environment variables.

use std::time::Duration;

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_DB_CONNECTION_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_CPU_THROTTLE_MS: u64 = 200;
pub const DEFAULT_DB_THROTTLE: usize = 5;
pub const DEFAULT_DB_MAX_CONNECTIONS: usize = 10;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub http_port: u16,
    pub catalog_path: String,
    /// How long a request waits for a free query engine in the pool
    /// before failing with `503`.
    pub db_connection_timeout: Duration,
    /// Number of query engines kept warm in the pool, i.e. the max
    /// number of queries that can run concurrently.
    pub db_max_connections: usize,
    /// Event-loop-lag admission threshold; `None` disables the probe
    /// (`CPU_THROTTLE=0`).
    pub cpu_throttle: Option<Duration>,
    /// Max concurrently in-flight queries before admission rejects with
    /// `503`; `None` disables the cap (`DB_THROTTLE=0`).
    pub db_throttle: Option<usize>,
    pub cache_allow: bool,
    pub asset_store_backend: Option<String>,
    pub asset_store_bucket: Option<String>,
    pub slack_channel_url: Option<String>,
    pub log_level: String,
    pub external_log: Option<String>,
    pub loader_io_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            catalog_path: "ddf_catalog.db".to_string(),
            db_connection_timeout: Duration::from_secs(DEFAULT_DB_CONNECTION_TIMEOUT_SECS),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            cpu_throttle: Some(Duration::from_millis(DEFAULT_CPU_THROTTLE_MS)),
            db_throttle: Some(DEFAULT_DB_THROTTLE),
            cache_allow: true,
            asset_store_backend: None,
            asset_store_bucket: None,
            slack_channel_url: None,
            log_level: "info".to_string(),
            external_log: None,
            loader_io_token: None,
        }
    }
}

impl ServiceConfig {
    /// Build configuration from the environment, falling back to
    /// defaults for any unset variable.
    pub fn from_env() -> Self {
        Self {
            http_port: env_parse("HTTP_PORT", DEFAULT_HTTP_PORT),
            catalog_path: std::env::var("DB_NAME").unwrap_or_else(|_| "ddf_catalog.db".to_string()),
            db_connection_timeout: Duration::from_secs(env_parse(
                "DB_CONNECTION_TIMEOUT",
                DEFAULT_DB_CONNECTION_TIMEOUT_SECS,
            )),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            cpu_throttle: match env_parse("CPU_THROTTLE", DEFAULT_CPU_THROTTLE_MS) {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            db_throttle: match env_parse("DB_THROTTLE", DEFAULT_DB_THROTTLE) {
                0 => None,
                n => Some(n),
            },
            cache_allow: env_parse("CACHE_ALLOW", true),
            asset_store_backend: std::env::var("ASSET_STORE").ok(),
            asset_store_bucket: std::env::var("ASSET_STORE_BUCKET").ok(),
            slack_channel_url: std::env::var("SLACK_CHANNEL_URL").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            external_log: std::env::var("EXTERNAL_LOG").ok(),
            loader_io_token: std::env::var("LOADER_IO_TOKEN").ok(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.db_connection_timeout.is_zero() {
            return Err("db_connection_timeout must be > 0".to_string());
        }
        if self.db_max_connections == 0 {
            return Err("db_max_connections must be > 0".to_string());
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.http_port, 80);
        assert_eq!(config.cpu_throttle, Some(Duration::from_millis(200)));
        assert_eq!(config.db_throttle, Some(5));
        assert!(config.cache_allow);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_throttle_values_disable_the_probe() {
        std::env::set_var("CPU_THROTTLE", "0");
        std::env::set_var("DB_THROTTLE", "0");
        let config = ServiceConfig::from_env();
        assert!(config.cpu_throttle.is_none());
        assert!(config.db_throttle.is_none());
        std::env::remove_var("CPU_THROTTLE");
        std::env::remove_var("DB_THROTTLE");
    }

    #[test]
    fn validate_rejects_zero_connection_timeout() {
        let config = ServiceConfig { db_connection_timeout: Duration::from_secs(0), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_max_connections() {
        let config = ServiceConfig { db_max_connections: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
