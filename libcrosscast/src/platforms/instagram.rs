//! Instagram business accounts through the Graph API
//!
//! Publishing is a two-step container flow: create a media container from
//! the image URL, then publish that container.

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::oauth::OAuthState;
use crate::platforms::facebook::GraphApi;
use crate::platforms::http;
use crate::platforms::{OAuthApp, PlatformAdapter, PublishReceipt, TokenResponse};
use crate::types::{ExternalIdentity, Platform, PostContent};

#[derive(Deserialize)]
struct PageList {
    #[serde(default)]
    data: Vec<Page>,
}

#[derive(Deserialize)]
struct Page {
    instagram_business_account: Option<BusinessAccount>,
}

#[derive(Deserialize)]
struct BusinessAccount {
    id: String,
    username: Option<String>,
}

#[derive(Deserialize)]
struct GraphId {
    id: String,
}

pub struct InstagramAdapter {
    graph: GraphApi,
}

impl InstagramAdapter {
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
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn authorization_url(&self, state: &OAuthState) -> Result<Url> {
        self.graph.authorization_url(state)
    }

    async fn exchange_code(&self, code: &str, _state: &OAuthState) -> Result<TokenResponse> {
        self.graph.exchange_code(Platform::Instagram, code).await
    }

    /// The first Instagram business account linked to one of the user's pages
    async fn fetch_identity(&self, access_token: &SecretString) -> Result<ExternalIdentity> {
        let response = self
            .graph
            .http()
            .get(self.graph.endpoint("me/accounts"))
            .query(&[("fields", "instagram_business_account{id,username}")])
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| http::send_error(Platform::Instagram, "identity lookup", e))?;

        let pages: PageList = http::read_identity_json(Platform::Instagram, response).await?;
        let account = pages
            .data
            .into_iter()
            .find_map(|page| page.instagram_business_account)
            .ok_or_else(|| {
                PlatformError::IdentityLookup(
                    "no Instagram business account is linked to this login".to_string(),
                )
            })?;

        let name = account.username.unwrap_or_else(|| account.id.clone());
        Ok(ExternalIdentity {
            id: account.id,
            name,
        })
    }

    async fn publish(
        &self,
        access_token: &SecretString,
        account_id: &str,
        content: &PostContent,
    ) -> Result<PublishReceipt> {
        let media_url = content.media_url.as_deref().ok_or_else(|| {
            PlatformError::Validation("Instagram posts require a media URL".to_string())
        })?;

        let response = self
            .graph
            .http()
            .post(self.graph.endpoint(&format!("{}/media", account_id)))
            .form(&[("image_url", media_url), ("caption", content.text.as_str())])
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| http::send_error(Platform::Instagram, "media upload", e))?;
        let container: GraphId =
            http::read_json(Platform::Instagram, "media upload", response).await?;

        tracing::debug!(container = %container.id, "Instagram media container created");

        let response = self
            .graph
            .http()
            .post(self.graph.endpoint(&format!("{}/media_publish", account_id)))
            .form(&[("creation_id", container.id.as_str())])
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| http::send_error(Platform::Instagram, "publish", e))?;
        let published: GraphId = http::read_json(Platform::Instagram, "publish", response).await?;

        Ok(PublishReceipt {
            post_id: Some(published.id),
        })
    }
}
