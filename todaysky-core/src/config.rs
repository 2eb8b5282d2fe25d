use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::{grid::GeoCoordinate, provider::ServiceId};

/// Configuration for a single remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub api_key: String,

    /// Overrides the service's public endpoint, e.g. for a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Example TOML:
    /// [services.weather]
    /// api_key = "..."
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,

    /// Location used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoCoordinate>,
}

impl Config {
    /// Environment variable that overrides the stored key for `id`.
    pub fn api_key_env_var(id: ServiceId) -> &'static str {
        match id {
            ServiceId::Weather => "TODAYSKY_WEATHER_KEY",
            ServiceId::Holiday => "TODAYSKY_HOLIDAY_KEY",
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse config text. Every `[services.*]` table must name a known
    /// service; table names are stored under the service's canonical id.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.services = config
            .services
            .into_iter()
            .map(|(name, svc)| {
                let id = ServiceId::try_from(name.as_str())
                    .with_context(|| format!("Invalid [services.{name}] section"))?;
                Ok((id.as_str().to_string(), svc))
            })
            .collect::<Result<_>>()?;
        Ok(config)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "todaysky", "todaysky")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace the API key for a service, keeping any base URL override.
    pub fn upsert_api_key(&mut self, id: ServiceId, api_key: String) {
        self.services
            .entry(id.as_str().to_string())
            .and_modify(|svc| svc.api_key = api_key.clone())
            .or_insert(ServiceConfig { api_key, base_url: None });
    }

    pub fn service_config(&self, id: ServiceId) -> Option<&ServiceConfig> {
        self.services.get(id.as_str())
    }

    /// API key for a service: environment first, then the file.
    pub fn api_key(&self, id: ServiceId) -> Option<String> {
        std::env::var(Self::api_key_env_var(id))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.stored_api_key(id).map(str::to_owned))
    }

    /// API key as written in the config file.
    pub fn stored_api_key(&self, id: ServiceId) -> Option<&str> {
        self.service_config(id).map(|cfg| cfg.api_key.as_str())
    }

    /// Like [`Config::api_key`], with a hint when nothing is configured.
    pub fn require_api_key(&self, id: ServiceId) -> Result<String> {
        self.api_key(id).ok_or_else(|| {
            anyhow!(
                "No API key configured for the {id} service.\n\
                 Hint: run `todaysky configure {id}` or set {}.",
                Self::api_key_env_var(id)
            )
        })
    }

    pub fn base_url(&self, id: ServiceId) -> Option<&str> {
        self.service_config(id).and_then(|cfg| cfg.base_url.as_deref())
    }

    pub fn set_location(&mut self, location: GeoCoordinate) {
        self.location = Some(location);
    }

    /// Stored location, with a hint when none is set.
    pub fn require_location(&self) -> Result<GeoCoordinate> {
        self.location.ok_or_else(|| {
            anyhow!(
                "No location configured.\n\
                 Hint: pass --lat/--lon or run `todaysky configure location`."
            )
        })
    }
}
