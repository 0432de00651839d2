//! Mock adapter for testing
//!
//! A configurable adapter that can simulate successes, provider errors,
//! delays and panics for any platform tag. It records every call so tests
//! can assert on what the OAuth controller and dispatcher actually did,
//! without credentials or network access.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::oauth::OAuthState;
use crate::platforms::{AdapterKind, PlatformAdapter, PublishReceipt, TokenResponse};
use crate::types::{ExternalIdentity, Platform, PostContent};

/// One recorded publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPublish {
    pub access_token: String,
    pub account_id: String,
    pub content: PostContent,
}

/// Configuration for mock adapter behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub platform: Platform,
    pub kind: AdapterKind,

    /// Tokens handed out by `exchange_code`
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,

    /// Identity returned by `fetch_identity`
    pub identity: ExternalIdentity,

    pub supports_refresh: bool,
    /// Tokens handed out by `refresh`
    pub refreshed_access_token: String,
    pub refreshed_refresh_token: Option<String>,
    pub refreshed_expires_in: Option<i64>,

    pub exchange_error: Option<String>,
    pub identity_error: Option<String>,
    pub publish_error: Option<String>,
    pub refresh_error: Option<String>,
    pub panic_on_publish: bool,

    /// Delay before completing publish (simulates network latency)
    pub delay: Duration,

    pub exchange_call_count: Arc<Mutex<usize>>,
    pub identity_call_count: Arc<Mutex<usize>>,
    pub refresh_call_count: Arc<Mutex<usize>>,
    pub published: Arc<Mutex<Vec<MockPublish>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Twitter,
            kind: AdapterKind::Live,
            access_token: "mock-access-token".to_string(),
            refresh_token: Some("mock-refresh-token".to_string()),
            expires_in: Some(3600),
            identity: ExternalIdentity {
                id: "mock-account".to_string(),
                name: "Mock Account".to_string(),
            },
            supports_refresh: true,
            refreshed_access_token: "mock-refreshed-access-token".to_string(),
            refreshed_refresh_token: None,
            refreshed_expires_in: Some(3600),
            exchange_error: None,
            identity_error: None,
            publish_error: None,
            refresh_error: None,
            panic_on_publish: false,
            delay: Duration::from_millis(0),
            exchange_call_count: Arc::new(Mutex::new(0)),
            identity_call_count: Arc::new(Mutex::new(0)),
            refresh_call_count: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock adapter for testing
#[derive(Debug)]
pub struct MockAdapter {
    config: MockConfig,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockAdapter {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A live adapter on which every call succeeds
    pub fn success(platform: Platform) -> Self {
        Self::new(MockConfig {
            platform,
            ..Default::default()
        })
    }

    pub fn with_identity(platform: Platform, id: &str, name: &str) -> Self {
        Self::new(MockConfig {
            platform,
            identity: ExternalIdentity {
                id: id.to_string(),
                name: name.to_string(),
            },
            ..Default::default()
        })
    }

    pub fn publish_failure(platform: Platform, error: &str) -> Self {
        Self::new(MockConfig {
            platform,
            publish_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    pub fn exchange_failure(platform: Platform, error: &str) -> Self {
        Self::new(MockConfig {
            platform,
            exchange_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    pub fn identity_failure(platform: Platform, error: &str) -> Self {
        Self::new(MockConfig {
            platform,
            identity_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Panics inside `publish`, to exercise task isolation
    pub fn panicking(platform: Platform) -> Self {
        Self::new(MockConfig {
            platform,
            panic_on_publish: true,
            ..Default::default()
        })
    }

    pub fn with_delay(platform: Platform, delay: Duration) -> Self {
        Self::new(MockConfig {
            platform,
            delay,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    pub fn exchange_call_count(&self) -> usize {
        *lock(&self.config.exchange_call_count)
    }

    pub fn identity_call_count(&self) -> usize {
        *lock(&self.config.identity_call_count)
    }

    pub fn refresh_call_count(&self) -> usize {
        *lock(&self.config.refresh_call_count)
    }

    pub fn publish_call_count(&self) -> usize {
        lock(&self.config.published).len()
    }

    pub fn published(&self) -> Vec<MockPublish> {
        lock(&self.config.published).clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.config.platform
    }

    fn kind(&self) -> AdapterKind {
        self.config.kind
    }

    fn authorization_url(&self, state: &OAuthState) -> Result<Url> {
        let state = state.to_string();
        Url::parse_with_params(
            &format!("https://mock.invalid/{}/authorize", self.config.platform),
            &[("state", state.as_str())],
        )
        .map_err(|e| PlatformError::Authentication(e.to_string()).into())
    }

    async fn exchange_code(&self, _code: &str, _state: &OAuthState) -> Result<TokenResponse> {
        *lock(&self.config.exchange_call_count) += 1;

        if let Some(error) = &self.config.exchange_error {
            return Err(PlatformError::TokenExchange(error.clone()).into());
        }

        Ok(TokenResponse {
            access_token: SecretString::from(self.config.access_token.clone()),
            refresh_token: self.config.refresh_token.clone().map(SecretString::from),
            expires_in: self.config.expires_in,
        })
    }

    async fn fetch_identity(&self, _access_token: &SecretString) -> Result<ExternalIdentity> {
        *lock(&self.config.identity_call_count) += 1;

        match &self.config.identity_error {
            Some(error) => Err(PlatformError::IdentityLookup(error.clone()).into()),
            None => Ok(self.config.identity.clone()),
        }
    }

    async fn publish(
        &self,
        access_token: &SecretString,
        account_id: &str,
        content: &PostContent,
    ) -> Result<PublishReceipt> {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if self.config.panic_on_publish {
            panic!("mock adapter for {} panicked", self.config.platform);
        }

        lock(&self.config.published).push(MockPublish {
            access_token: access_token.expose_secret().to_string(),
            account_id: account_id.to_string(),
            content: content.clone(),
        });

        match &self.config.publish_error {
            Some(error) => Err(PlatformError::Publish(error.clone()).into()),
            None => Ok(PublishReceipt {
                post_id: Some(format!("{}:mock-{}", self.config.platform, uuid::Uuid::new_v4())),
            }),
        }
    }

    fn supports_refresh(&self) -> bool {
        self.config.supports_refresh
    }

    async fn refresh(&self, _refresh_token: &SecretString) -> Result<TokenResponse> {
        *lock(&self.config.refresh_call_count) += 1;

        if !self.config.supports_refresh {
            return Err(PlatformError::NotImplemented("mock refresh disabled".to_string()).into());
        }
        if let Some(error) = &self.config.refresh_error {
            return Err(PlatformError::Refresh(error.clone()).into());
        }

        Ok(TokenResponse {
            access_token: SecretString::from(self.config.refreshed_access_token.clone()),
            refresh_token: self
                .config
                .refreshed_refresh_token
                .clone()
                .map(SecretString::from),
            expires_in: self.config.refreshed_expires_in,
        })
    }
}
