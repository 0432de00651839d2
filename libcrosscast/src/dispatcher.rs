//! Multi-platform publishing
//!
//! One tokio task per requested platform, all joined before returning, so a
//! slow or panicking platform never prevents the others from reporting.
//! Every failure is captured in that platform's [`PublishResult`].

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info, warn};

use crate::cipher::SecretCipher;
use crate::db::Database;
use crate::error::{CipherError, CrosscastError, Result};
use crate::platforms::{AdapterRegistry, PlatformAdapter, TokenResponse};
use crate::types::{ConnectedAccount, Platform, PostContent, PublishResult};

pub const UNSUPPORTED: &str = "unsupported platform";
pub const NOT_CONNECTED: &str = "not connected";
pub const RECONNECT_REQUIRED: &str = "reconnect required";

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<AdapterRegistry>,
    db: Database,
    cipher: SecretCipher,
}

impl Dispatcher {
    pub fn new(registry: Arc<AdapterRegistry>, db: Database, cipher: SecretCipher) -> Self {
        Self {
            registry,
            db,
            cipher,
        }
    }

    /// Publish to every platform, returning one result per distinct platform
    /// in request order
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use libcrosscast::dispatcher::Dispatcher;
    /// # use libcrosscast::types::{Platform, PostContent};
    /// # async fn example(dispatcher: Dispatcher) {
    /// let results = dispatcher
    ///     .publish("u1", &[Platform::Twitter, Platform::LinkedIn], &PostContent::text("Hi"))
    ///     .await;
    /// for result in results {
    ///     println!("{}: {}", result.platform, result.detail);
    /// }
    /// # }
    /// ```
    pub async fn publish(
        &self,
        user_id: &str,
        platforms: &[Platform],
        content: &PostContent,
    ) -> Vec<PublishResult> {
        let mut unique: Vec<Platform> = Vec::with_capacity(platforms.len());
        for platform in platforms {
            if !unique.contains(platform) {
                unique.push(*platform);
            }
        }

        let handles = unique.iter().map(|platform| {
            let dispatcher = self.clone();
            let user_id = user_id.to_string();
            let content = content.clone();
            let platform = *platform;
            tokio::spawn(async move { dispatcher.publish_one(&user_id, platform, &content).await })
        });

        join_all(handles)
            .await
            .into_iter()
            .zip(unique)
            .map(|(joined, platform)| {
                joined.unwrap_or_else(|e| {
                    warn!(platform = %platform, user_id = %user_id, "Publish task failed: {}", e);
                    PublishResult::failed(platform, "publish task failed unexpectedly")
                })
            })
            .collect()
    }

    /// Publish to a single platform
    pub async fn publish_one(
        &self,
        user_id: &str,
        platform: Platform,
        content: &PostContent,
    ) -> PublishResult {
        let result = self.run_branch(user_id, platform, content).await;

        if result.success {
            info!(
                platform = %platform,
                user_id = %user_id,
                stubbed = result.stubbed,
                post_id = result.post_id.as_deref().unwrap_or(""),
                "Published"
            );
        } else {
            warn!(platform = %platform, user_id = %user_id, detail = %result.detail, "Publish failed");
        }
        result
    }

    async fn run_branch(
        &self,
        user_id: &str,
        platform: Platform,
        content: &PostContent,
    ) -> PublishResult {
        let Some(adapter) = self.registry.get(platform) else {
            return PublishResult::failed(platform, UNSUPPORTED);
        };

        if let Err(e) = adapter.validate_content(content) {
            return PublishResult::failed(platform, e.to_string());
        }

        if !adapter.requires_connection() {
            let empty = SecretString::from(String::new());
            return match adapter.publish(&empty, "", content).await {
                Ok(_) => PublishResult::stubbed(platform),
                Err(e) => PublishResult::failed(platform, e.to_string()),
            };
        }

        let account = match self.db.find_account(user_id, platform).await {
            Ok(Some(account)) => account,
            Ok(None) => return PublishResult::failed(platform, NOT_CONNECTED),
            Err(e) => return PublishResult::failed(platform, e.user_message()),
        };

        let access_token = match self.access_token(adapter.as_ref(), &account).await {
            Ok(token) => token,
            Err(CrosscastError::Cipher(CipherError::Decryption)) => {
                return PublishResult::failed(platform, RECONNECT_REQUIRED)
            }
            Err(e) => return PublishResult::failed(platform, e.user_message()),
        };

        match adapter
            .publish(&access_token, &account.external_account_id, content)
            .await
        {
            Ok(receipt) => PublishResult::published(platform, receipt.post_id),
            Err(e) => PublishResult::failed(platform, e.to_string()),
        }
    }

    /// The token to publish with, refreshing it first when it has expired
    ///
    /// A failed refresh is logged and the stored token is used as is; the
    /// provider then decides whether it is still accepted.
    async fn access_token(
        &self,
        adapter: &dyn PlatformAdapter,
        account: &ConnectedAccount,
    ) -> Result<SecretString> {
        let now = Utc::now();
        if account.is_expired_at(now) && adapter.supports_refresh() {
            if let Some(refresh_cipher) = &account.refresh_token_cipher {
                match self.refresh(adapter, account, refresh_cipher).await {
                    Ok(token) => return Ok(token),
                    Err(e) => warn!(
                        platform = %account.platform,
                        user_id = %account.user_id,
                        account_id = %account.external_account_id,
                        "Token refresh failed, using stored token: {}",
                        e
                    ),
                }
            }
        }

        self.cipher.decrypt(&account.access_token_cipher)
    }

    /// Exchange the refresh token for a new access token and store it
    ///
    /// Once the provider has issued new tokens they are returned even if
    /// storing them fails, since a rotated refresh token invalidates the old one.
    async fn refresh(
        &self,
        adapter: &dyn PlatformAdapter,
        account: &ConnectedAccount,
        refresh_cipher: &str,
    ) -> Result<SecretString> {
        let refresh_token = self.cipher.decrypt(refresh_cipher)?;
        let tokens = adapter.refresh(&refresh_token).await?;

        match self.persist_refreshed(account, &tokens).await {
            Ok(()) => info!(
                platform = %account.platform,
                user_id = %account.user_id,
                account_id = %account.external_account_id,
                "Access token refreshed"
            ),
            Err(e) => error!(
                platform = %account.platform,
                user_id = %account.user_id,
                account_id = %account.external_account_id,
                "Access token refreshed but could not be stored: {}",
                e
            ),
        }
        Ok(tokens.access_token)
    }

    async fn persist_refreshed(
        &self,
        account: &ConnectedAccount,
        tokens: &TokenResponse,
    ) -> Result<()> {
        let access_cipher = self.cipher.encrypt(tokens.access_token.expose_secret())?;
        let rotated_refresh = tokens
            .refresh_token
            .as_ref()
            .map(|token| self.cipher.encrypt(token.expose_secret()))
            .transpose()?;
        let expires_at = tokens.expires_at(Utc::now());

        self.db
            .update_tokens(
                &account.id,
                &access_cipher,
                rotated_refresh.as_deref(),
                expires_at,
            )
            .await?;
        Ok(())
    }
}
