//! Placeholder adapters for platforms without a live integration
//!
//! A stub accepts publish calls and reports success without contacting
//! anyone. It cannot connect accounts.

use async_trait::async_trait;
use reqwest::Url;
use secrecy::SecretString;

use crate::error::{PlatformError, Result};
use crate::oauth::OAuthState;
use crate::platforms::{AdapterKind, PlatformAdapter, PublishReceipt, TokenResponse};
use crate::types::{ExternalIdentity, Platform, PostContent};

/// Platforms that ship as stubs out of the box
pub const STUB_PLATFORMS: [Platform; 5] = [
    Platform::Pinterest,
    Platform::Reddit,
    Platform::TikTok,
    Platform::YouTube,
    Platform::Snapchat,
];

#[derive(Debug, Clone, Copy)]
pub struct StubAdapter {
    platform: Platform,
}

impl StubAdapter {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn not_connectable(&self) -> PlatformError {
        PlatformError::NotImplemented(format!(
            "connecting {} accounts is not available yet",
            self.platform
        ))
    }
}

#[async_trait]
impl PlatformAdapter for StubAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Stub
    }

    fn authorization_url(&self, _state: &OAuthState) -> Result<Url> {
        Err(self.not_connectable().into())
    }

    async fn exchange_code(&self, _code: &str, _state: &OAuthState) -> Result<TokenResponse> {
        Err(self.not_connectable().into())
    }

    async fn fetch_identity(&self, _access_token: &SecretString) -> Result<ExternalIdentity> {
        Err(self.not_connectable().into())
    }

    async fn publish(
        &self,
        _access_token: &SecretString,
        _account_id: &str,
        content: &PostContent,
    ) -> Result<PublishReceipt> {
        tracing::warn!(
            platform = %self.platform,
            chars = content.text.chars().count(),
            has_media = content.media_url.is_some(),
            "Stub adapter accepted a post; nothing was published"
        );
        Ok(PublishReceipt { post_id: None })
    }
}
