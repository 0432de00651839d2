//! Facebook adapter over the Graph API
//!
//! [`GraphApi`] holds the Facebook Login plumbing (consent dialog and code
//! exchange) that Instagram reuses, since Instagram business accounts are
//! connected through a Facebook login.

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::oauth::OAuthState;
use crate::platforms::http::{self, TokenGrant};
use crate::platforms::{OAuthApp, PlatformAdapter, PublishReceipt, TokenResponse};
use crate::types::{ExternalIdentity, Platform, PostContent};

pub const DEFAULT_DIALOG_URL: &str = "https://www.facebook.com/v18.0/dialog/oauth";
pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v18.0";

/// Permissions requested at login; they cover both page and Instagram publishing
pub const GRAPH_SCOPES: &str =
    "pages_manage_posts,pages_read_engagement,instagram_content_publish,instagram_basic";

/// Facebook Login and Graph API access for one app registration
#[derive(Debug, Clone)]
pub struct GraphApi {
    app: OAuthApp,
    http: reqwest::Client,
    dialog_url: String,
    graph_url: String,
}

impl GraphApi {
    pub fn new(app: OAuthApp, http: reqwest::Client) -> Self {
        Self {
            app,
            http,
            dialog_url: DEFAULT_DIALOG_URL.to_string(),
            graph_url: DEFAULT_GRAPH_URL.to_string(),
        }
    }

    /// Point the adapter at other hosts, e.g. a local mock server
    pub fn with_base_urls(mut self, dialog_url: &str, graph_url: &str) -> Self {
        self.dialog_url = dialog_url.trim_end_matches('/').to_string();
        self.graph_url = graph_url.trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.graph_url, path.trim_start_matches('/'))
    }

    pub(crate) fn authorization_url(&self, state: &OAuthState) -> Result<Url> {
        let state = state.to_string();
        Url::parse_with_params(
            &self.dialog_url,
            &[
                ("client_id", self.app.client_id.as_str()),
                ("redirect_uri", self.app.redirect_uri.as_str()),
                ("state", state.as_str()),
                ("scope", GRAPH_SCOPES),
                ("response_type", "code"),
            ],
        )
        .map_err(|e| {
            ConfigError::InvalidValue {
                field: "facebook dialog url".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub(crate) async fn exchange_code(&self, platform: Platform, code: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .get(self.endpoint("oauth/access_token"))
            .query(&[
                ("client_id", self.app.client_id.as_str()),
                ("redirect_uri", self.app.redirect_uri.as_str()),
                ("client_secret", self.app.client_secret.expose_secret()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| http::send_error(platform, "token exchange", e))?;

        http::read_token_response(platform, TokenGrant::AuthorizationCode, response).await
    }
}

#[derive(Deserialize)]
struct GraphUser {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct GraphPost {
    id: Option<String>,
    post_id: Option<String>,
}

pub struct FacebookAdapter {
    graph: GraphApi,
}

impl FacebookAdapter {
    pub fn new(app: OAuthApp, http: reqwest::Client) -> Self {
        Self {
            graph: GraphApi::new(app, http),
        }
    }

    pub fn with_base_urls(mut self, dialog_url: &str, graph_url: &str) -> Self {
        self.graph = self.graph.with_base_urls(dialog_url, graph_url);
        self
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn authorization_url(&self, state: &OAuthState) -> Result<Url> {
        self.graph.authorization_url(state)
    }

    async fn exchange_code(&self, code: &str, _state: &OAuthState) -> Result<TokenResponse> {
        self.graph.exchange_code(Platform::Facebook, code).await
    }

    async fn fetch_identity(&self, access_token: &SecretString) -> Result<ExternalIdentity> {
        let response = self
            .graph
            .http()
            .get(self.graph.endpoint("me"))
            .query(&[("fields", "id,name")])
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| http::send_error(Platform::Facebook, "identity lookup", e))?;

        let user: GraphUser = http::read_identity_json(Platform::Facebook, response).await?;
        let name = user.name.unwrap_or_else(|| user.id.clone());
        Ok(ExternalIdentity { id: user.id, name })
    }

    async fn publish(
        &self,
        access_token: &SecretString,
        account_id: &str,
        content: &PostContent,
    ) -> Result<PublishReceipt> {
        let request = match content.media_url.as_deref() {
            Some(media_url) => self
                .graph
                .http()
                .post(self.graph.endpoint(&format!("{}/photos", account_id)))
                .form(&[("url", media_url), ("caption", content.text.as_str())]),
            None => self
                .graph
                .http()
                .post(self.graph.endpoint(&format!("{}/feed", account_id)))
                .form(&[("message", content.text.as_str())]),
        };

        let response = request
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| http::send_error(Platform::Facebook, "publish", e))?;

        let post: GraphPost = http::read_json(Platform::Facebook, "publish", response).await?;
        Ok(PublishReceipt {
            post_id: post.post_id.or(post.id),
        })
    }
}
