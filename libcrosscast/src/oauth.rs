//! OAuth connect flow
//!
//! The flow is stateless on the server: the only thing carried between the
//! connect and callback legs is the `state` parameter, `"<user_id>:<platform>"`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Url;
use secrecy::ExposeSecret;

use crate::cipher::SecretCipher;
use crate::db::Database;
use crate::error::{ConfigError, CrosscastError, Result};
use crate::platforms::AdapterRegistry;
use crate::types::{ConnectedAccount, Platform};

/// The value round-tripped through the provider as `state`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    pub user_id: String,
    pub platform: Platform,
}

impl OAuthState {
    pub fn new(user_id: impl Into<String>, platform: Platform) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(CrosscastError::InvalidInput("user_id is required".to_string()));
        }
        Ok(Self { user_id, platform })
    }
}

impl fmt::Display for OAuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.platform)
    }
}

impl FromStr for OAuthState {
    type Err = CrosscastError;

    /// User ids may themselves contain `:`, so the platform is taken from
    /// after the last separator.
    fn from_str(s: &str) -> Result<Self> {
        let (user_id, platform) = s
            .rsplit_once(':')
            .ok_or_else(|| CrosscastError::InvalidState("missing separator".to_string()))?;

        if user_id.is_empty() {
            return Err(CrosscastError::InvalidState("empty user id".to_string()));
        }

        let platform = platform
            .parse::<Platform>()
            .map_err(|_| CrosscastError::InvalidState("unknown platform".to_string()))?;

        Ok(Self {
            user_id: user_id.to_string(),
            platform,
        })
    }
}

/// Drives account connection from consent URL to stored tokens
#[derive(Clone)]
pub struct OAuthController {
    registry: Arc<AdapterRegistry>,
    db: Database,
    cipher: SecretCipher,
    dashboard_url: Url,
}

impl OAuthController {
    /// `frontend_url` is the application base the callback sends users back to
    pub fn new(
        registry: Arc<AdapterRegistry>,
        db: Database,
        cipher: SecretCipher,
        frontend_url: &str,
    ) -> Result<Self> {
        let dashboard_url = Url::parse(&format!("{}/dashboard", frontend_url.trim_end_matches('/')))
            .map_err(|e| ConfigError::InvalidValue {
                field: "server.frontend_url".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            registry,
            db,
            cipher,
            dashboard_url,
        })
    }

    /// Authorize URL to send the user to
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty user id, `UnsupportedPlatform` for unknown
    /// tags or platforms without a registered adapter, and
    /// `PlatformError::NotImplemented` for stub platforms.
    pub fn start_connect(&self, user_id: &str, platform: &str) -> Result<Url> {
        let platform: Platform = platform.parse()?;
        let state = OAuthState::new(user_id, platform)?;
        let adapter = self.registry.require(platform)?;

        let url = adapter.authorization_url(&state)?;
        tracing::info!(platform = %platform, user_id = %state.user_id, "Starting account connection");
        Ok(url)
    }

    /// Finish the flow: exchange the code, look up the identity, store tokens
    ///
    /// Nothing is written unless every step succeeds.
    pub async fn complete_connect(&self, code: &str, state: &str) -> Result<ConnectedAccount> {
        let state: OAuthState = state.parse()?;
        if code.trim().is_empty() {
            return Err(CrosscastError::InvalidInput("code is required".to_string()));
        }

        let adapter = self.registry.require(state.platform)?;

        let tokens = adapter.exchange_code(code, &state).await.map_err(|e| {
            tracing::warn!(platform = %state.platform, user_id = %state.user_id, error = %e, "Token exchange failed");
            e
        })?;

        let identity = adapter.fetch_identity(&tokens.access_token).await.map_err(|e| {
            tracing::warn!(platform = %state.platform, user_id = %state.user_id, error = %e, "Identity lookup failed");
            e
        })?;

        let access_cipher = self.cipher.encrypt(tokens.access_token.expose_secret())?;
        let refresh_cipher = tokens
            .refresh_token
            .as_ref()
            .map(|token| self.cipher.encrypt(token.expose_secret()))
            .transpose()?;
        let expires_at = tokens.expires_at(Utc::now());
        drop(tokens);

        let account = ConnectedAccount::new(
            state.user_id.clone(),
            state.platform,
            identity,
            access_cipher,
            refresh_cipher,
            expires_at,
        );
        let stored = self.db.upsert_account(&account).await?;

        tracing::info!(
            platform = %stored.platform,
            user_id = %stored.user_id,
            account_id = %stored.external_account_id,
            "Account connected"
        );
        Ok(stored)
    }

    /// Where to send the browser once the callback has been handled
    pub fn callback_redirect(&self, outcome: &Result<ConnectedAccount>) -> Url {
        match outcome {
            Ok(account) => self.dashboard_with("connected", account.platform.as_str()),
            Err(e) => self.error_redirect(&e.user_message()),
        }
    }

    pub fn error_redirect(&self, message: &str) -> Url {
        self.dashboard_with("error", message)
    }

    fn dashboard_with(&self, key: &str, value: &str) -> Url {
        let mut url = self.dashboard_url.clone();
        url.query_pairs_mut().append_pair(key, value);
        url
    }
}
