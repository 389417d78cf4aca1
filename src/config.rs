use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors found during validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Main configuration for the vault service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Media store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Ledger store configuration
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Sync gateway configuration
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Media store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Root directory for the binary media store
    #[serde(default = "default_store_root")]
    pub root: String,
    /// Storage quota in bytes, if a budget is known for this device
    pub quota_bytes: Option<u64>,
}

/// Ledger store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Root directory for the small-value ledger store
    #[serde(default = "default_ledger_root")]
    pub root: String,
}

/// Sync gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Remote upload endpoint; sync is skipped when unset
    pub endpoint: Option<String>,
    /// Connectivity probe timeout in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Per-upload request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Default value functions
fn default_service_name() -> String {
    "gully-vault".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_store_root() -> String {
    "data/media".to_string()
}

fn default_ledger_root() -> String {
    "data/ledger".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "gully-vault")?
            .set_default("service.log_level", "info")?
            .set_default("service.metrics_port", 9090)?
            // Add config file if present
            .add_source(config::File::with_name("config/gully-vault").required(false))
            .add_source(config::File::with_name("/etc/gully-vault/config").required(false))
            // Override with environment variables
            // GULLY__STORE__ROOT -> store.root
            .add_source(
                config::Environment::with_prefix("GULLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.root.is_empty() {
            return Err(ConfigError::MissingRequired("store.root".to_string()));
        }
        if self.ledger.root.is_empty() {
            return Err(ConfigError::MissingRequired("ledger.root".to_string()));
        }
        if self.store.quota_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "store.quota_bytes must be greater than zero when set".to_string(),
            ));
        }
        if let Some(endpoint) = &self.sync.endpoint {
            if endpoint.is_empty() {
                return Err(ConfigError::Invalid(
                    "sync.endpoint must not be empty when set".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Get connectivity probe timeout as Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.probe_timeout_secs)
    }

    /// Get per-upload request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            quota_bytes: None,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            root: default_ledger_root(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            probe_timeout_secs: default_probe_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            store: StoreConfig::default(),
            ledger: LedgerConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(default_store_root(), "data/media");
        assert_eq!(default_probe_timeout_secs(), 5);
        assert_eq!(default_metrics_port(), 9090);
    }

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_quota() {
        let mut config = Config::default();
        config.store.quota_bytes = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_store_root() {
        let mut config = Config::default();
        config.store.root = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }
}
