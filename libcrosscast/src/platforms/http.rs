//! HTTP plumbing shared by the live adapters
//!
//! Error text built here never includes request URLs or bodies we sent,
//! since both can carry client secrets or tokens.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use secrecy::SecretString;
use serde::Deserialize;

use crate::config::{Config, OAuthCredentials};
use crate::error::{PlatformError, Result};
use crate::platforms::TokenResponse;
use crate::types::Platform;

const USER_AGENT: &str = concat!("crosscast/", env!("CARGO_PKG_VERSION"));
const MAX_PROVIDER_MESSAGE: usize = 200;

/// Build the shared client used by every adapter
pub fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.server.request_timeout_secs))
        .build()
        .map_err(|e| PlatformError::Network(format!("failed to build HTTP client: {}", e)).into())
}

/// The OAuth client registration an adapter signs requests with
#[derive(Debug, Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

impl OAuthApp {
    pub fn new(credentials: &OAuthCredentials, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri: redirect_uri.into(),
        }
    }
}

/// Transport failure, with the URL stripped since it may hold query secrets
pub(crate) fn send_error(platform: Platform, context: &str, error: reqwest::Error) -> PlatformError {
    let error = error.without_url();
    if error.is_timeout() {
        PlatformError::Network(format!("{} {} timed out", platform, context))
    } else if error.is_connect() {
        PlatformError::Network(format!(
            "could not reach {} during {}: {}",
            platform, context, error
        ))
    } else {
        PlatformError::Network(format!("{} {} failed: {}", platform, context, error))
    }
}

/// Pull a human-readable message out of a provider error body
///
/// Understands the shapes used by the supported providers: OAuth
/// `error_description`, Graph `{"error": {"message": ..}}`, LinkedIn
/// `message` and Twitter `detail`/`title`.
pub(crate) fn provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    let message = value
        .get("error_description")
        .and_then(|v| v.as_str())
        .or_else(|| value.pointer("/error/message").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))
        .or_else(|| value.get("detail").and_then(|v| v.as_str()))
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("title").and_then(|v| v.as_str()))?;

    let message = message.trim();
    if message.is_empty() {
        return None;
    }
    Some(message.chars().take(MAX_PROVIDER_MESSAGE).collect())
}

fn describe(status: StatusCode, body: &str) -> String {
    provider_message(body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Map a non-success publish/API response onto an error kind
pub(crate) fn status_error(
    platform: Platform,
    context: &str,
    status: StatusCode,
    body: &str,
) -> PlatformError {
    let detail = format!("{} {}: {}", platform, context, describe(status, body));
    match status.as_u16() {
        401 | 403 => PlatformError::Authentication(detail),
        429 => PlatformError::RateLimit(detail),
        400 | 422 => PlatformError::Validation(detail),
        500..=599 => PlatformError::Network(detail),
        _ => PlatformError::Publish(detail),
    }
}

/// Read a JSON body, turning non-2xx statuses into errors
pub(crate) async fn read_json<T: for<'de> Deserialize<'de>>(
    platform: Platform,
    context: &str,
    response: Response,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| send_error(platform, context, e))?;

    if !status.is_success() {
        return Err(status_error(platform, context, status, &body).into());
    }

    serde_json::from_str(&body).map_err(|e| {
        PlatformError::Publish(format!(
            "{} {} returned an unexpected response: {}",
            platform, context, e
        ))
        .into()
    })
}

/// Like [`read_json`] but every failure becomes `IdentityLookup`
pub(crate) async fn read_identity_json<T: for<'de> Deserialize<'de>>(
    platform: Platform,
    response: Response,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| send_error(platform, "identity lookup", e))?;

    if !status.is_success() {
        return Err(PlatformError::IdentityLookup(describe(status, &body)).into());
    }

    serde_json::from_str(&body).map_err(|_| {
        PlatformError::IdentityLookup(format!("{} returned an unreadable profile", platform)).into()
    })
}

#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Which operation a token response belongs to, for error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenGrant {
    AuthorizationCode,
    Refresh,
}

impl TokenGrant {
    fn error(self, message: String) -> PlatformError {
        match self {
            TokenGrant::AuthorizationCode => PlatformError::TokenExchange(message),
            TokenGrant::Refresh => PlatformError::Refresh(message),
        }
    }
}

/// Parse an OAuth token endpoint response
pub(crate) async fn read_token_response(
    platform: Platform,
    grant: TokenGrant,
    response: Response,
) -> Result<TokenResponse> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| send_error(platform, "token request", e))?;

    if !status.is_success() {
        return Err(grant.error(describe(status, &body)).into());
    }

    let raw: RawTokenResponse = serde_json::from_str(&body)
        .map_err(|_| grant.error(format!("{} returned an unreadable token response", platform)))?;

    let access_token = raw
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            grant.error(
                provider_message(&body)
                    .unwrap_or_else(|| "response did not include an access token".to_string()),
            )
        })?;

    Ok(TokenResponse {
        access_token: SecretString::from(access_token),
        refresh_token: raw
            .refresh_token
            .filter(|token| !token.is_empty())
            .map(SecretString::from),
        expires_in: raw.expires_in,
    })
}
