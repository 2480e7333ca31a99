use std::net::SocketAddr;

use crate::persistence::DatabaseConfig;

/// Service configuration
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Database settings
    pub database: DatabaseConfig,
    /// Global request budget for the batch-trigger route
    pub requests_per_minute: u32,
    /// How many transaction rows the history endpoint returns
    pub transaction_history_limit: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database: DatabaseConfig::default(),
            requests_per_minute: 100,
            transaction_history_limit: 50,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppConfig {
        let mut config = AppConfig::default();
        config.database = DatabaseConfig::from_env();

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(value) => config.bind_addr = value,
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse BIND_ADDR '{}': {}, using default: {}",
                        addr,
                        e,
                        config.bind_addr
                    );
                }
            }
        }

        if let Ok(rpm) = std::env::var("REQUESTS_PER_MINUTE") {
            match rpm.parse::<u32>() {
                Ok(value) if value > 0 => config.requests_per_minute = value,
                Ok(value) => {
                    tracing::warn!(
                        "Invalid REQUESTS_PER_MINUTE value: {} (must be positive), using default: {}",
                        value,
                        config.requests_per_minute
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse REQUESTS_PER_MINUTE '{}': {}, using default: {}",
                        rpm,
                        e,
                        config.requests_per_minute
                    );
                }
            }
        }

        if let Ok(limit) = std::env::var("TRANSACTION_HISTORY_LIMIT") {
            if let Ok(value) = limit.parse::<i64>() {
                if value > 0 && value <= 500 {
                    config.transaction_history_limit = value;
                }
            }
        }

        config
    }
}
