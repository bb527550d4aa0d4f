//! Application configuration
//!
//! Loaded from `~/.config/vhospital/config.toml` (or an explicit path). Every
//! field has a default, so a missing file is not an error. A few environment
//! variables override the file:
//! - `VHOSPITAL_ENDPOINT`: consultation service URL
//! - `VHOSPITAL_DB`: credit database path
//! - `LEMONSQUEEZY_SIGNING_SECRET`: webhook signing secret

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const ENDPOINT_ENV: &str = "VHOSPITAL_ENDPOINT";
pub const DATABASE_ENV: &str = "VHOSPITAL_DB";
pub const SIGNING_SECRET_ENV: &str = "LEMONSQUEEZY_SIGNING_SECRET";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub consultation: ConsultationConfig,
    pub storage: StorageConfig,
    pub checkout: CheckoutConfig,
    pub webhook: WebhookConfig,
}

/// Remote consultation service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsultationConfig {
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    /// Upper bound for the whole streamed response (None = unlimited)
    pub request_timeout_secs: Option<u64>,
}

impl Default for ConsultationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/consultation".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: Some(900),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured database path, or `<data dir>/vhospital/vhospital.db`
    pub fn resolved_database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("vhospital").join("vhospital.db"))
            .unwrap_or_else(|| PathBuf::from("vhospital.db"))
    }
}

/// Hosted checkout page used to buy credits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    pub url: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            url: "https://yesilhealth.lemonsqueezy.com/buy/17283596-b745-4deb-bf66-f4492bfddb11"
                .to_string(),
        }
    }
}

/// Payment webhook listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub listen_addr: String,
    pub path: String,
    pub signing_secret: Option<String>,
    /// Credits granted per product variant; other orders get one credit per 100 of total
    pub variant_credits: HashMap<String, u64>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8787".to_string(),
            path: "/api/lemon-squeezy".to_string(),
            signing_secret: None,
            variant_credits: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("vhospital").join("config.toml"))
    }

    /// Load from `path` (or the default location), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                info!("Loading config from {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                debug!("No config at {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply overrides from a variable lookup (the environment in production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|v| !v.is_empty()) {
            self.consultation.endpoint = endpoint;
        }
        if let Some(db) = lookup(DATABASE_ENV).filter(|v| !v.is_empty()) {
            self.storage.database_path = Some(PathBuf::from(db));
        }
        if let Some(secret) = lookup(SIGNING_SECRET_ENV).filter(|v| !v.is_empty()) {
            self.webhook.signing_secret = Some(secret);
        }
    }
}
