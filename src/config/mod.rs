use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub signup: SignupConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("SOCIAL_API_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("SOCIAL_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        // Secrets such as SOCIAL_API__MEDIA__API_SECRET come from the environment.
        builder = builder.add_source(Environment::with_prefix("SOCIAL_API").separator("__"));

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: Config) -> Result<Self> {
        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        assert!(
            !self.database.url.is_empty(),
            "Database URL must be specified"
        );
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        assert!(
            self.database.max_connections >= self.database.min_connections.unwrap_or(1),
            "Max connections must be >= min connections"
        );
        self.server.ensure_bounds()?;
        self.media.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
    #[serde(default = "ServerConfig::default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.max_body_bytes >= 64 * 1024,
            "Request body limit must allow at least 64 KiB"
        );
        assert!(
            self.max_body_bytes <= 64 * 1024 * 1024,
            "Request body limit cannot exceed 64 MiB"
        );
        Ok(())
    }

    const fn default_max_body_bytes() -> usize {
        10 * 1024 * 1024
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

/// Credentials and endpoints of the avatar media host.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "MediaConfig::default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "MediaConfig::default_delivery_base_url")]
    pub delivery_base_url: String,
    pub request_timeout_ms: Option<u64>,
}

impl MediaConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(15_000);
        assert!(millis >= 100, "Upload timeout must be at least 100ms");
        assert!(millis <= 120_000, "Upload timeout cannot exceed 120 seconds");
        Duration::from_millis(millis)
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(!self.cloud_name.is_empty(), "Media cloud name must be set");
        assert!(!self.api_key.is_empty(), "Media API key must be set");
        assert!(!self.api_secret.is_empty(), "Media API secret must be set");
        let _ = self.request_timeout();
        Ok(())
    }

    fn default_api_base_url() -> String {
        "https://api.cloudinary.com/v1_1".to_string()
    }

    fn default_delivery_base_url() -> String {
        "https://res.cloudinary.com".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub profiles_max_capacity: u64,
    pub profiles_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.profiles_max_capacity >= 100,
            "Profile cache capacity must be at least 100"
        );
        assert!(
            self.profiles_ttl_seconds >= 60,
            "Profile cache TTL must be at least one minute"
        );
        assert!(
            self.profiles_ttl_seconds <= 604_800,
            "Profile cache TTL cannot exceed one week"
        );
        Ok(())
    }
}

/// Which signup response the API serves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignupMode {
    /// Respond with the identity record only; the cache is untouched.
    Identity,
    /// Mirror the profile into the cache and respond with it.
    #[default]
    Profile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupConfig {
    #[serde(default)]
    pub mode: SignupMode,
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
