//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `enrolld.toml` in the working directory (or the path in
//! `ENROLL_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use serde::Deserialize;

use enroll_adapter_mqtt::MqttConfig;
use enroll_app::config::RegistrationConfig;
use enroll_domain::id::SiteToken;

const DEFAULT_PATH: &str = "enrolld.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Registration policy.
    pub registration: RegistrationConfig,
    /// Outcome transport.
    pub mqtt: MqttSection,
    /// Seed data for the in-memory backend.
    pub catalog: CatalogConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// MQTT transport toggle plus broker settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MqttSection {
    /// Publish outcomes over MQTT instead of printing them to stdout.
    pub enabled: bool,
    #[serde(flatten)]
    pub client: MqttConfig,
}

/// Sites and specifications loaded into the backend at start-up.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub sites: Vec<SiteSeed>,
    pub specifications: Vec<SpecificationSeed>,
}

#[derive(Debug, Deserialize)]
pub struct SiteSeed {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpecificationSeed {
    pub token: String,
    #[serde(default)]
    pub name: String,
}

impl Config {
    /// Load configuration from `enrolld.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("ENROLL_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("ENROLL_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(enabled) = var("ENROLL_AUTO_ASSIGN_SITE").and_then(|v| v.parse().ok()) {
            self.registration.auto_assign_site = enabled;
        }
        if let Some(val) = var("ENROLL_AUTO_ASSIGN_SITE_TOKEN") {
            self.registration.auto_assign_site_token = Some(SiteToken::new(val));
        }
        if let Some(enabled) = var("ENROLL_MQTT_ENABLED").and_then(|v| v.parse().ok()) {
            self.mqtt.enabled = enabled;
        }
        if let Some(val) = var("ENROLL_MQTT_HOST") {
            self.mqtt.client.broker_host = val;
        }
        if let Some(port) = var("ENROLL_MQTT_PORT").and_then(|v| v.parse().ok()) {
            self.mqtt.client.broker_port = port;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self
            .registration
            .auto_assign_site_token
            .as_ref()
            .is_some_and(SiteToken::is_empty)
        {
            return Err(ConfigError::Validation(
                "auto_assign_site_token must not be empty".to_string(),
            ));
        }
        if self.mqtt.enabled {
            if self.mqtt.client.broker_port == 0 {
                return Err(ConfigError::Validation(
                    "mqtt broker_port must be non-zero".to_string(),
                ));
            }
            if self.mqtt.client.client_id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "mqtt client_id must not be empty".to_string(),
                ));
            }
        }
        if self.catalog.sites.iter().any(|s| s.token.is_empty())
            || self.catalog.specifications.iter().any(|s| s.token.is_empty())
        {
            return Err(ConfigError::Validation(
                "catalog tokens must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "enrolld=info,enroll=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
