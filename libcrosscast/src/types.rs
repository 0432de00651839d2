//! Core types for Crosscast

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CrosscastError;

/// Social platform tag
///
/// The serialized form is the lowercase name used in URLs, OAuth state and
/// the `connected_accounts.platform` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    LinkedIn,
    Twitter,
    Pinterest,
    Reddit,
    TikTok,
    YouTube,
    Snapchat,
}

impl Platform {
    pub const ALL: [Platform; 9] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::LinkedIn,
        Platform::Twitter,
        Platform::Pinterest,
        Platform::Reddit,
        Platform::TikTok,
        Platform::YouTube,
        Platform::Snapchat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::LinkedIn => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Pinterest => "pinterest",
            Platform::Reddit => "reddit",
            Platform::TikTok => "tiktok",
            Platform::YouTube => "youtube",
            Platform::Snapchat => "snapchat",
        }
    }

    /// Prefix of the `<PREFIX>_CLIENT_ID` / `<PREFIX>_CLIENT_SECRET` variables
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Platform::Facebook => "FACEBOOK",
            Platform::Instagram => "INSTAGRAM",
            Platform::LinkedIn => "LINKEDIN",
            Platform::Twitter => "TWITTER",
            Platform::Pinterest => "PINTEREST",
            Platform::Reddit => "REDDIT",
            Platform::TikTok => "TIKTOK",
            Platform::YouTube => "YOUTUBE",
            Platform::Snapchat => "SNAPCHAT",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CrosscastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "linkedin" => Ok(Platform::LinkedIn),
            "twitter" | "x" => Ok(Platform::Twitter),
            "pinterest" => Ok(Platform::Pinterest),
            "reddit" => Ok(Platform::Reddit),
            "tiktok" => Ok(Platform::TikTok),
            "youtube" => Ok(Platform::YouTube),
            "snapchat" => Ok(Platform::Snapchat),
            other => Err(CrosscastError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// A user's link to one external account on one platform
///
/// Tokens are only ever held here in encrypted form.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedAccount {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub external_account_id: String,
    pub external_account_name: String,
    pub access_token_cipher: String,
    pub refresh_token_cipher: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectedAccount {
    /// Build a fresh record with a new id
    pub fn new(
        user_id: impl Into<String>,
        platform: Platform,
        identity: ExternalIdentity,
        access_token_cipher: String,
        refresh_token_cipher: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            platform,
            external_account_id: identity.id,
            external_account_name: identity.name,
            access_token_cipher,
            refresh_token_cipher,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the stored access token is past its stated expiry
    ///
    /// Accounts without an expiry never count as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id.clone(),
            platform: self.platform,
            external_account_id: self.external_account_id.clone(),
            external_account_name: self.external_account_name.clone(),
            expires_at: self.expires_at,
            has_refresh_token: self.refresh_token_cipher.is_some(),
            updated_at: self.updated_at,
        }
    }
}

/// Listing view of a connected account, without any token material
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountSummary {
    pub id: String,
    pub platform: Platform,
    pub external_account_id: String,
    pub external_account_name: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
    pub updated_at: DateTime<Utc>,
}

/// Identity of the account on the remote platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub id: String,
    pub name: String,
}

/// Content of a post as handed to adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

impl PostContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media_url: None,
        }
    }

    pub fn with_media(mut self, media_url: impl Into<String>) -> Self {
        self.media_url = Some(media_url.into());
        self
    }
}

/// Outcome of publishing to one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub platform: Platform,
    pub success: bool,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    /// Accepted by a stub adapter without any upstream call
    #[serde(default)]
    pub stubbed: bool,
}

impl PublishResult {
    pub fn published(platform: Platform, post_id: Option<String>) -> Self {
        Self {
            platform,
            success: true,
            detail: "published".to_string(),
            post_id,
            stubbed: false,
        }
    }

    pub fn stubbed(platform: Platform) -> Self {
        Self {
            platform,
            success: true,
            detail: "accepted by stub adapter; nothing was published upstream".to_string(),
            post_id: None,
            stubbed: true,
        }
    }

    pub fn failed(platform: Platform, detail: impl Into<String>) -> Self {
        Self {
            platform,
            success: false,
            detail: detail.into(),
            post_id: None,
            stubbed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_platform_round_trips_through_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn test_platform_parse_is_case_insensitive_and_accepts_x() {
        assert_eq!("LinkedIn".parse::<Platform>().unwrap(), Platform::LinkedIn);
        assert_eq!("x".parse::<Platform>().unwrap(), Platform::Twitter);
    }

    #[test]
    fn test_platform_parse_unknown() {
        let err = "myspace".parse::<Platform>().unwrap_err();
        assert!(matches!(err, CrosscastError::UnsupportedPlatform(p) if p == "myspace"));
    }

    #[test]
    fn test_platform_serde_uses_lowercase_tags() {
        assert_eq!(serde_json::to_string(&Platform::TikTok).unwrap(), "\"tiktok\"");
        let parsed: Platform = serde_json::from_str("\"youtube\"").unwrap();
        assert_eq!(parsed, Platform::YouTube);
    }

    fn account(expires_at: Option<DateTime<Utc>>) -> ConnectedAccount {
        ConnectedAccount::new(
            "u1",
            Platform::Twitter,
            ExternalIdentity {
                id: "tw42".to_string(),
                name: "alice".to_string(),
            },
            "cipher".to_string(),
            None,
            expires_at,
        )
    }

    #[test]
    fn test_expiry_checks() {
        let now = Utc::now();
        assert!(!account(None).is_expired_at(now));
        assert!(account(Some(now - Duration::seconds(1))).is_expired_at(now));
        assert!(!account(Some(now + Duration::hours(1))).is_expired_at(now));
    }

    #[test]
    fn test_summary_omits_ciphertexts() {
        let json = serde_json::to_string(&account(None).summary()).unwrap();
        assert!(!json.contains("cipher"));
        assert!(json.contains("tw42"));
    }

    #[test]
    fn test_publish_result_constructors() {
        let ok = PublishResult::published(Platform::Twitter, Some("1".to_string()));
        assert!(ok.success && !ok.stubbed);

        let stub = PublishResult::stubbed(Platform::Reddit);
        assert!(stub.success && stub.stubbed);

        let failed = PublishResult::failed(Platform::LinkedIn, "not connected");
        assert!(!failed.success);
        assert_eq!(failed.detail, "not connected");
    }
}
