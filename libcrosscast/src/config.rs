//! Configuration management for Crosscast
//!
//! Non-secret settings come from a TOML file. Secrets (the token encryption
//! key and per-platform OAuth client credentials) are only ever read from the
//! process environment and are held as [`SecretString`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use reqwest::Url;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::platforms::stub::STUB_PLATFORMS;
use crate::types::Platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub platforms: PlatformsConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/crosscast/accounts.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP API binds to
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Application URL users are sent back to after OAuth
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    /// OAuth redirect URI registered with every platform app
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Upper bound for any single upstream HTTP call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8081".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_redirect_uri() -> String {
    "http://localhost:8081/api/oauth-callback".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            frontend_url: default_frontend_url(),
            redirect_uri: default_redirect_uri(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformsConfig {
    /// Platforms with a real adapter, registered when credentials are present
    #[serde(default = "default_enabled")]
    pub enabled: Vec<Platform>,
    /// Platforms served by the stub adapter
    #[serde(default = "default_stubs")]
    pub stubs: Vec<Platform>,
}

fn default_enabled() -> Vec<Platform> {
    vec![
        Platform::Facebook,
        Platform::Instagram,
        Platform::LinkedIn,
        Platform::Twitter,
    ]
}

fn default_stubs() -> Vec<Platform> {
    STUB_PLATFORMS.to_vec()
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            stubs: default_stubs(),
        }
    }
}

/// OAuth client credentials for one platform app
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Secrets read from the environment
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub encryption_key: Option<SecretString>,
    pub oauth: HashMap<Platform, OAuthCredentials>,
}

impl Secrets {
    pub fn credentials(&self, platform: Platform) -> Option<&OAuthCredentials> {
        self.oauth.get(&platform)
    }
}

impl Config {
    /// Load configuration from the default location and the environment
    ///
    /// A missing config file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        Self::load_from(&resolve_config_path()?)
    }

    /// Like [`load`](Self::load) with an explicit config file location
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            Self::load_from_path(config_path)?
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default_config()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            platforms: PlatformsConfig::default(),
            secrets: Secrets::default(),
        }
    }

    /// Overlay environment settings and secrets
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    /// Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = get("OAUTH_REDIRECT_URI") {
            self.server.redirect_uri = uri;
        }
        if let Some(url) = get("FRONTEND_URL") {
            self.server.frontend_url = url;
        }
        if let Some(path) = get("CROSSCAST_DB_PATH") {
            self.database.path = path;
        }
        if let Some(bind) = get("CROSSCAST_BIND") {
            self.server.bind = bind;
        }

        self.secrets.encryption_key = get("ENCRYPTION_KEY").map(SecretString::from);

        for platform in &self.platforms.enabled {
            let prefix = platform.env_prefix();
            let pair = get(&format!("{}_CLIENT_ID", prefix))
                .zip(get(&format!("{}_CLIENT_SECRET", prefix)));

            // Instagram publishing goes through the Facebook app
            let pair = match (pair, platform) {
                (None, Platform::Instagram) => {
                    get("FACEBOOK_CLIENT_ID").zip(get("FACEBOOK_CLIENT_SECRET"))
                }
                (pair, _) => pair,
            };

            match pair {
                Some((client_id, client_secret)) => {
                    self.secrets.oauth.insert(
                        *platform,
                        OAuthCredentials {
                            client_id,
                            client_secret: SecretString::from(client_secret),
                        },
                    );
                }
                None => {
                    tracing::warn!(
                        platform = %platform,
                        "{}_CLIENT_ID/{}_CLIENT_SECRET not set; platform will be unsupported",
                        prefix,
                        prefix
                    );
                }
            }
        }
    }

    /// Check settings that would otherwise fail late
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("server.frontend_url", &self.server.frontend_url),
            ("server.redirect_uri", &self.server.redirect_uri),
        ] {
            Url::parse(value).map_err(|e| ConfigError::InvalidValue {
                field: field.to_string(),
                reason: e.to_string(),
            })?;
        }

        if let Some(platform) = self
            .platforms
            .enabled
            .iter()
            .find(|p| self.platforms.stubs.contains(p))
        {
            return Err(ConfigError::InvalidValue {
                field: "platforms.stubs".to_string(),
                reason: format!("{} is listed as both enabled and stub", platform),
            }
            .into());
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.request_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Database path with `~` expanded
    pub fn expand_database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).to_string())
    }
}

/// Config file location: `$CROSSCAST_CONFIG`, else the XDG config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosscast").join("config.toml"))
}
