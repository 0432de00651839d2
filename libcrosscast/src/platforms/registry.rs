//! Platform tag to adapter lookup

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{CrosscastError, Result};
use crate::platforms::facebook::FacebookAdapter;
use crate::platforms::instagram::InstagramAdapter;
use crate::platforms::linkedin::LinkedInAdapter;
use crate::platforms::stub::StubAdapter;
use crate::platforms::twitter::TwitterAdapter;
use crate::platforms::{OAuthApp, PlatformAdapter};
use crate::types::Platform;

/// Adapters available to this process, keyed by platform
///
/// A platform without an entry is unsupported: connect and publish requests
/// for it are rejected before any upstream call.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register live adapters for enabled platforms that have credentials,
    /// and stub adapters for the configured stub platforms
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        let mut registry = Self::new();
        let redirect_uri = config.server.redirect_uri.as_str();

        for platform in &config.platforms.enabled {
            let Some(credentials) = config.secrets.credentials(*platform) else {
                continue;
            };
            let app = OAuthApp::new(credentials, redirect_uri);

            let adapter: Arc<dyn PlatformAdapter> = match platform {
                Platform::Facebook => Arc::new(FacebookAdapter::new(app, http.clone())),
                Platform::Instagram => Arc::new(InstagramAdapter::new(app, http.clone())),
                Platform::LinkedIn => Arc::new(LinkedInAdapter::new(app, http.clone())),
                Platform::Twitter => Arc::new(TwitterAdapter::new(app, http.clone())),
                other => {
                    tracing::warn!(
                        platform = %other,
                        "No live adapter exists for this platform; list it under platforms.stubs"
                    );
                    continue;
                }
            };
            registry.register(adapter);
        }

        for platform in &config.platforms.stubs {
            registry.register(Arc::new(StubAdapter::new(*platform)));
        }

        tracing::info!(
            platforms = ?registry.platforms(),
            "Platform adapters registered"
        );
        registry
    }

    /// Add or replace the adapter for its platform
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.insert(adapter.platform(), adapter)
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    /// Like [`get`](Self::get), failing with `UnsupportedPlatform`
    pub fn require(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>> {
        self.get(platform)
            .ok_or_else(|| CrosscastError::UnsupportedPlatform(platform.to_string()))
    }

    pub fn is_supported(&self, platform: Platform) -> bool {
        self.adapters.contains_key(&platform)
    }

    /// Registered platforms in a stable order
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.adapters.keys().copied().collect();
        platforms.sort();
        platforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockAdapter;
    use crate::platforms::AdapterKind;
    use std::collections::HashMap as Map;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let map: Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = Config::default_config();
        config.apply_env(move |key: &str| map.get(key).cloned());
        config
    }

    #[test]
    fn test_platforms_without_credentials_are_unsupported() {
        let config = config_with(&[
            ("TWITTER_CLIENT_ID", "id"),
            ("TWITTER_CLIENT_SECRET", "secret"),
        ]);
        let registry = AdapterRegistry::from_config(&config, reqwest::Client::new());

        assert!(registry.is_supported(Platform::Twitter));
        assert!(!registry.is_supported(Platform::LinkedIn));
        assert!(!registry.is_supported(Platform::Facebook));

        let err = registry.require(Platform::LinkedIn).err().unwrap();
        assert!(matches!(err, CrosscastError::UnsupportedPlatform(p) if p == "linkedin"));
    }

    #[test]
    fn test_instagram_falls_back_to_facebook_app() {
        let config = config_with(&[
            ("FACEBOOK_CLIENT_ID", "id"),
            ("FACEBOOK_CLIENT_SECRET", "secret"),
        ]);
        let registry = AdapterRegistry::from_config(&config, reqwest::Client::new());

        assert!(registry.is_supported(Platform::Facebook));
        assert!(registry.is_supported(Platform::Instagram));
    }

    #[test]
    fn test_stub_platforms_are_always_registered() {
        let registry = AdapterRegistry::from_config(&config_with(&[]), reqwest::Client::new());

        for platform in [
            Platform::Pinterest,
            Platform::Reddit,
            Platform::TikTok,
            Platform::YouTube,
            Platform::Snapchat,
        ] {
            let adapter = registry.require(platform).unwrap();
            assert_eq!(adapter.kind(), AdapterKind::Stub);
        }
    }

    #[test]
    fn test_register_replaces_existing_adapter() {
        let mut registry = AdapterRegistry::new();
        assert!(registry
            .register(Arc::new(MockAdapter::success(Platform::Twitter)))
            .is_none());
        assert!(registry
            .register(Arc::new(MockAdapter::success(Platform::Twitter)))
            .is_some());
        assert_eq!(registry.platforms(), vec![Platform::Twitter]);
    }
}
