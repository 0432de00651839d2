//! LinkedIn adapter
//!
//! Member posts go through the UGC Posts API, which needs the Rest.li 2.0
//! protocol header. LinkedIn issues refresh tokens to approved apps.

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ConfigError, Result};
use crate::oauth::OAuthState;
use crate::platforms::http::{self, TokenGrant};
use crate::platforms::{OAuthApp, PlatformAdapter, PublishReceipt, TokenResponse};
use crate::types::{ExternalIdentity, Platform, PostContent};

pub const DEFAULT_AUTH_URL: &str = "https://www.linkedin.com/oauth/v2";
pub const DEFAULT_API_URL: &str = "https://api.linkedin.com";
pub const SCOPES: &str = "r_liteprofile w_member_social";

const RESTLI_HEADER: &str = "X-Restli-Protocol-Version";
const RESTLI_VERSION: &str = "2.0.0";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    id: String,
    #[serde(default)]
    localized_first_name: Option<String>,
    #[serde(default)]
    localized_last_name: Option<String>,
}

#[derive(Deserialize)]
struct Created {
    id: Option<String>,
}

pub struct LinkedInAdapter {
    app: OAuthApp,
    http: reqwest::Client,
    auth_url: String,
    api_url: String,
}

impl LinkedInAdapter {
    pub fn new(app: OAuthApp, http: reqwest::Client) -> Self {
        Self {
            app,
            http,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_base_urls(mut self, auth_url: &str, api_url: &str) -> Self {
        self.auth_url = auth_url.trim_end_matches('/').to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    async fn token_request(&self, grant: TokenGrant, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(format!("{}/accessToken", self.auth_url))
            .form(form)
            .send()
            .await
            .map_err(|e| http::send_error(Platform::LinkedIn, "token request", e))?;

        http::read_token_response(Platform::LinkedIn, grant, response).await
    }
}

/// Body of a public text share, optionally pointing at an article URL
fn ugc_post(author_id: &str, content: &PostContent) -> serde_json::Value {
    let share = match content.media_url.as_deref() {
        Some(url) => json!({
            "shareCommentary": { "text": content.text },
            "shareMediaCategory": "ARTICLE",
            "media": [{ "status": "READY", "originalUrl": url }]
        }),
        None => json!({
            "shareCommentary": { "text": content.text },
            "shareMediaCategory": "NONE"
        }),
    };

    json!({
        "author": format!("urn:li:person:{}", author_id),
        "lifecycleState": "PUBLISHED",
        "specificContent": { "com.linkedin.ugc.ShareContent": share },
        "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" }
    })
}

#[async_trait]
impl PlatformAdapter for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    fn authorization_url(&self, state: &OAuthState) -> Result<Url> {
        let state = state.to_string();
        Url::parse_with_params(
            &format!("{}/authorization", self.auth_url),
            &[
                ("response_type", "code"),
                ("client_id", self.app.client_id.as_str()),
                ("redirect_uri", self.app.redirect_uri.as_str()),
                ("state", state.as_str()),
                ("scope", SCOPES),
            ],
        )
        .map_err(|e| {
            ConfigError::InvalidValue {
                field: "linkedin auth url".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn exchange_code(&self, code: &str, _state: &OAuthState) -> Result<TokenResponse> {
        self.token_request(
            TokenGrant::AuthorizationCode,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.app.redirect_uri.as_str()),
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.expose_secret()),
            ],
        )
        .await
    }

    async fn fetch_identity(&self, access_token: &SecretString) -> Result<ExternalIdentity> {
        let response = self
            .http
            .get(format!("{}/v2/me", self.api_url))
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| http::send_error(Platform::LinkedIn, "identity lookup", e))?;

        let profile: Profile = http::read_identity_json(Platform::LinkedIn, response).await?;
        let name = [profile.localized_first_name, profile.localized_last_name]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(ExternalIdentity {
            name: if name.is_empty() { profile.id.clone() } else { name },
            id: profile.id,
        })
    }

    async fn publish(
        &self,
        access_token: &SecretString,
        account_id: &str,
        content: &PostContent,
    ) -> Result<PublishReceipt> {
        let response = self
            .http
            .post(format!("{}/v2/ugcPosts", self.api_url))
            .bearer_auth(access_token.expose_secret())
            .header(RESTLI_HEADER, RESTLI_VERSION)
            .json(&ugc_post(account_id, content))
            .send()
            .await
            .map_err(|e| http::send_error(Platform::LinkedIn, "publish", e))?;

        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| http::send_error(Platform::LinkedIn, "publish", e))?;
        if !status.is_success() {
            return Err(http::status_error(Platform::LinkedIn, "publish", status, &body).into());
        }

        // 201 responses may carry the id only in the header
        let body_id = serde_json::from_str::<Created>(&body)
            .ok()
            .and_then(|created| created.id);
        Ok(PublishReceipt {
            post_id: body_id.or(header_id),
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
                ("client_secret", self.app.client_secret.expose_secret()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ugc_post_shape() {
        let body = ugc_post("abc", &PostContent::text("Hello"));
        assert_eq!(body["author"], "urn:li:person:abc");
        assert_eq!(
            body["specificContent"]["com.linkedin.ugc.ShareContent"]["shareCommentary"]["text"],
            "Hello"
        );
        assert_eq!(
            body["specificContent"]["com.linkedin.ugc.ShareContent"]["shareMediaCategory"],
            "NONE"
        );
    }

    #[test]
    fn test_ugc_post_with_article() {
        let content = PostContent::text("Read this").with_media("https://example.com/post");
        let body = ugc_post("abc", &content);
        let share = &body["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(share["shareMediaCategory"], "ARTICLE");
        assert_eq!(share["media"][0]["originalUrl"], "https://example.com/post");
    }
}
