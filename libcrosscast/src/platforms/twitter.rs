//! Twitter (X) adapter over the v2 API with OAuth 2.0 PKCE
//!
//! The callback has no session to recover a random PKCE verifier from, so
//! the verifier is derived from the client secret and the OAuth state. Both
//! the connect and callback legs can recompute it, and without the client
//! secret it cannot be predicted.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{ConfigError, Result};
use crate::oauth::OAuthState;
use crate::platforms::http::{self, TokenGrant};
use crate::platforms::{OAuthApp, PlatformAdapter, PublishReceipt, TokenResponse};
use crate::types::{ExternalIdentity, Platform, PostContent};

pub const DEFAULT_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
pub const DEFAULT_API_URL: &str = "https://api.twitter.com";
pub const SCOPES: &str = "tweet.read tweet.write users.read offline.access";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct User {
    id: String,
    username: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct Tweet {
    id: String,
}

pub struct TwitterAdapter {
    app: OAuthApp,
    http: reqwest::Client,
    authorize_url: String,
    api_url: String,
}

impl TwitterAdapter {
    pub fn new(app: OAuthApp, http: reqwest::Client) -> Self {
        Self {
            app,
            http,
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_base_urls(mut self, authorize_url: &str, api_url: &str) -> Self {
        self.authorize_url = authorize_url.trim_end_matches('/').to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    fn code_verifier(&self, state: &OAuthState) -> Zeroizing<String> {
        let mut hasher = Sha256::new();
        hasher.update(self.app.client_secret.expose_secret().as_bytes());
        hasher.update(b":");
        hasher.update(state.to_string().as_bytes());
        Zeroizing::new(URL_SAFE_NO_PAD.encode(hasher.finalize()))
    }

    async fn token_request(&self, grant: TokenGrant, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(format!("{}/2/oauth2/token", self.api_url))
            .basic_auth(&self.app.client_id, Some(self.app.client_secret.expose_secret()))
            .form(form)
            .send()
            .await
            .map_err(|e| http::send_error(Platform::Twitter, "token request", e))?;

        http::read_token_response(Platform::Twitter, grant, response).await
    }
}

fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Tweet text with the media URL appended, as the v2 endpoint takes no media URLs
fn tweet_text(content: &PostContent) -> String {
    match content.media_url.as_deref() {
        Some(url) if content.text.trim().is_empty() => url.to_string(),
        Some(url) => format!("{} {}", content.text, url),
        None => content.text.clone(),
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn authorization_url(&self, state: &OAuthState) -> Result<Url> {
        let challenge = code_challenge(&self.code_verifier(state));
        let state = state.to_string();
        Url::parse_with_params(
            &self.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.app.client_id.as_str()),
                ("redirect_uri", self.app.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| {
            ConfigError::InvalidValue {
                field: "twitter authorize url".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn exchange_code(&self, code: &str, state: &OAuthState) -> Result<TokenResponse> {
        let verifier = self.code_verifier(state);
        self.token_request(
            TokenGrant::AuthorizationCode,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.app.redirect_uri.as_str()),
                ("client_id", self.app.client_id.as_str()),
                ("code_verifier", verifier.as_str()),
            ],
        )
        .await
    }

    async fn fetch_identity(&self, access_token: &SecretString) -> Result<ExternalIdentity> {
        let response = self
            .http
            .get(format!("{}/2/users/me", self.api_url))
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| http::send_error(Platform::Twitter, "identity lookup", e))?;

        let user: Envelope<User> = http::read_identity_json(Platform::Twitter, response).await?;
        let user = user.data;
        let name = user
            .username
            .or(user.name)
            .unwrap_or_else(|| user.id.clone());
        Ok(ExternalIdentity { id: user.id, name })
    }

    async fn publish(
        &self,
        access_token: &SecretString,
        _account_id: &str,
        content: &PostContent,
    ) -> Result<PublishReceipt> {
        let response = self
            .http
            .post(format!("{}/2/tweets", self.api_url))
            .bearer_auth(access_token.expose_secret())
            .json(&json!({ "text": tweet_text(content) }))
            .send()
            .await
            .map_err(|e| http::send_error(Platform::Twitter, "publish", e))?;

        let tweet: Envelope<Tweet> = http::read_json(Platform::Twitter, "publish", response).await?;
        Ok(PublishReceipt {
            post_id: Some(tweet.data.id),
        })
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenResponse> {
        self.token_request(
            TokenGrant::Refresh,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
                ("client_id", self.app.client_id.as_str()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn adapter(secret: &str) -> TwitterAdapter {
        let app = OAuthApp {
            client_id: "tw-client".to_string(),
            client_secret: SecretString::from(secret.to_string()),
            redirect_uri: "https://app.example.com/api/oauth-callback".to_string(),
        };
        TwitterAdapter::new(app, reqwest::Client::new())
    }

    #[test]
    fn test_verifier_is_stable_per_state_and_secret() {
        let state: OAuthState = "u1:twitter".parse().unwrap();
        let other: OAuthState = "u2:twitter".parse().unwrap();

        let a = adapter("secret-a");
        assert_eq!(*a.code_verifier(&state), *a.code_verifier(&state));
        assert_ne!(*a.code_verifier(&state), *a.code_verifier(&other));
        assert_ne!(
            *a.code_verifier(&state),
            *adapter("secret-b").code_verifier(&state)
        );
    }

    #[test]
    fn test_verifier_meets_pkce_length_and_charset() {
        let state: OAuthState = "u1:twitter".parse().unwrap();
        let verifier = adapter("s").code_verifier(&state);
        assert!((43..=128).contains(&verifier.len()));
        assert!(verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_authorization_url_carries_s256_challenge() {
        let state: OAuthState = "u1:twitter".parse().unwrap();
        let adapter = adapter("s");
        let url = adapter.authorization_url(&state).unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(
            params["code_challenge"],
            code_challenge(&adapter.code_verifier(&state))
        );
        assert_eq!(params["state"], "u1:twitter");
        assert_eq!(params["scope"], SCOPES);
        assert!(!url.as_str().contains(adapter.code_verifier(&state).as_str()));
    }

    #[test]
    fn test_known_challenge_vector() {
        // RFC 7636 appendix B
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_tweet_text_appends_media() {
        assert_eq!(tweet_text(&PostContent::text("hi")), "hi");
        assert_eq!(
            tweet_text(&PostContent::text("hi").with_media("https://x.example/a.png")),
            "hi https://x.example/a.png"
        );
        assert_eq!(
            tweet_text(&PostContent::text("").with_media("https://x.example/a.png")),
            "https://x.example/a.png"
        );
    }
}
