//! Platform abstraction and implementations
//!
//! Every social platform is reached through a [`PlatformAdapter`]. Live
//! adapters speak the provider's OAuth 2.0 and publishing APIs over
//! `reqwest`; stub adapters accept posts without any upstream call so the
//! rest of the pipeline can treat every platform uniformly.
//!
//! # Examples
//!
//! ```no_run
//! use libcrosscast::platforms::{AdapterRegistry, build_http_client};
//! use libcrosscast::types::{Platform, PostContent};
//! use libcrosscast::Config;
//!
//! # async fn example() -> libcrosscast::error::Result<()> {
//! let config = Config::load()?;
//! let registry = AdapterRegistry::from_config(&config, build_http_client(&config)?);
//!
//! let adapter = registry.require(Platform::Twitter)?;
//! adapter.validate_content(&PostContent::text("Hello from Crosscast"))?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use secrecy::SecretString;

use crate::error::{PlatformError, Result};
use crate::oauth::OAuthState;
use crate::types::{ExternalIdentity, Platform, PostContent};

pub mod facebook;
pub mod http;
pub mod instagram;
pub mod linkedin;
pub mod registry;
pub mod stub;
pub mod twitter;

// Available for all builds so integration tests can drive the pipeline
pub mod mock;

pub use http::{build_http_client, OAuthApp};
pub use registry::AdapterRegistry;

/// Whether an adapter talks to a real provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Live,
    /// Accepts posts without publishing anything; no account is required
    Stub,
}

/// Tokens returned by a code exchange or a refresh
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// Lifetime of the access token in seconds, if the provider stated one
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| now + Duration::seconds(secs))
    }
}

/// What a provider handed back after a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub post_id: Option<String>,
}

/// Per-platform content rules checked before any publish call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLimits {
    pub max_chars: usize,
    pub requires_media: bool,
    /// Characters a media URL consumes when it is folded into the text
    pub media_url_weight: Option<usize>,
}

impl ContentLimits {
    pub const fn text(max_chars: usize) -> Self {
        Self {
            max_chars,
            requires_media: false,
            media_url_weight: None,
        }
    }

    /// Default limits for each platform
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Facebook => Self::text(63_206),
            Platform::Instagram => Self {
                max_chars: 2_200,
                requires_media: true,
                media_url_weight: None,
            },
            Platform::LinkedIn => Self::text(3_000),
            // Links count as 23 characters plus the separating space
            Platform::Twitter => Self {
                max_chars: 280,
                requires_media: false,
                media_url_weight: Some(24),
            },
            Platform::Pinterest => Self::text(500),
            Platform::Reddit => Self::text(40_000),
            Platform::TikTok => Self::text(2_200),
            Platform::YouTube => Self::text(5_000),
            Platform::Snapchat => Self::text(250),
        }
    }

    pub fn validate(&self, platform: Platform, content: &PostContent) -> Result<()> {
        let has_media = content
            .media_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());

        if content.text.trim().is_empty() && !has_media {
            return Err(PlatformError::Validation("Content cannot be empty".to_string()).into());
        }

        if self.requires_media && !has_media {
            return Err(PlatformError::Validation(format!(
                "{} posts require a media URL",
                platform
            ))
            .into());
        }

        if let Some(url) = content.media_url.as_deref().filter(|_| has_media) {
            Url::parse(url).map_err(|_| {
                PlatformError::Validation(format!("media URL '{}' is not a valid URL", url))
            })?;
        }

        let mut length = content.text.chars().count();
        if has_media {
            length += self.media_url_weight.unwrap_or(0);
        }

        if length > self.max_chars {
            return Err(PlatformError::Validation(format!(
                "Content exceeds {} character limit for {} (got {} characters)",
                self.max_chars, platform, length
            ))
            .into());
        }

        Ok(())
    }
}

/// Unified interface to one social platform
///
/// Adapters are stateless apart from their HTTP client and app credentials,
/// so a single instance is shared across requests behind an `Arc`.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn kind(&self) -> AdapterKind {
        AdapterKind::Live
    }

    fn limits(&self) -> ContentLimits {
        ContentLimits::for_platform(self.platform())
    }

    /// Whether publishing needs a connected account
    fn requires_connection(&self) -> bool {
        self.kind() == AdapterKind::Live
    }

    /// Provider consent URL that carries `state` round-trip
    fn authorization_url(&self, state: &OAuthState) -> Result<Url>;

    /// Trade an authorization code for tokens
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::TokenExchange` with the provider's description
    /// when the code is rejected.
    async fn exchange_code(&self, code: &str, state: &OAuthState) -> Result<TokenResponse>;

    /// Look up who the access token belongs to
    async fn fetch_identity(&self, access_token: &SecretString) -> Result<ExternalIdentity>;

    /// Publish on behalf of the connected account
    ///
    /// `account_id` is the external account id recorded at connection time
    /// (the page, business account or user the post goes to).
    async fn publish(
        &self,
        access_token: &SecretString,
        account_id: &str,
        content: &PostContent,
    ) -> Result<PublishReceipt>;

    fn supports_refresh(&self) -> bool {
        false
    }

    async fn refresh(&self, _refresh_token: &SecretString) -> Result<TokenResponse> {
        Err(PlatformError::NotImplemented(format!(
            "{} does not support token refresh",
            self.platform()
        ))
        .into())
    }

    fn validate_content(&self, content: &PostContent) -> Result<()> {
        self.limits().validate(self.platform(), content)
    }
}
