//! HTTP behavior of the live adapters against a local mock provider

use libcrosscast::error::PlatformError;
use libcrosscast::platforms::facebook::FacebookAdapter;
use libcrosscast::platforms::instagram::InstagramAdapter;
use libcrosscast::platforms::linkedin::LinkedInAdapter;
use libcrosscast::platforms::twitter::TwitterAdapter;
use libcrosscast::platforms::{OAuthApp, PlatformAdapter};
use libcrosscast::{CrosscastError, OAuthState, PostContent};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(client_id: &str, secret: &str) -> OAuthApp {
    OAuthApp {
        client_id: client_id.to_string(),
        client_secret: SecretString::from(secret.to_string()),
        redirect_uri: "https://app.example.com/api/oauth-callback".to_string(),
    }
}

fn token(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

fn platform_error(error: CrosscastError) -> PlatformError {
    match error {
        CrosscastError::Platform(e) => e,
        other => panic!("expected a platform error, got {:?}", other),
    }
}

// --- Twitter ---

fn twitter(server: &MockServer) -> TwitterAdapter {
    TwitterAdapter::new(app("tw-client", "tw-secret"), reqwest::Client::new())
        .with_base_urls(&format!("{}/authorize", server.uri()), &server.uri())
}

#[tokio::test]
async fn test_twitter_exchange_sends_verifier_and_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .and(header_exists("authorization"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "bearer",
            "access_token": "tw-access",
            "refresh_token": "tw-refresh",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state: OAuthState = "u1:twitter".parse().unwrap();
    let tokens = twitter(&server).exchange_code("abc", &state).await.unwrap();

    assert_eq!(tokens.access_token.expose_secret(), "tw-access");
    assert_eq!(
        tokens.refresh_token.as_ref().map(|t| t.expose_secret().to_string()),
        Some("tw-refresh".to_string())
    );
    assert_eq!(tokens.expires_in, Some(7200));
}

#[tokio::test]
async fn test_twitter_exchange_rejection_carries_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_request",
            "error_description": "Value passed for the authorization code was invalid."
        })))
        .mount(&server)
        .await;

    let state: OAuthState = "u1:twitter".parse().unwrap();
    let error = twitter(&server)
        .exchange_code("stale", &state)
        .await
        .unwrap_err();

    match platform_error(error) {
        PlatformError::TokenExchange(msg) => {
            assert!(msg.contains("authorization code was invalid"));
            assert!(!msg.contains("tw-secret"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_twitter_identity_prefers_username() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/me"))
        .and(header("authorization", "Bearer tw-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "tw42", "name": "Jo", "username": "jo_posts" }
        })))
        .mount(&server)
        .await;

    let identity = twitter(&server)
        .fetch_identity(&token("tw-access"))
        .await
        .unwrap();
    assert_eq!(identity.id, "tw42");
    assert_eq!(identity.name, "jo_posts");
}

#[tokio::test]
async fn test_twitter_publish_appends_media_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(header("authorization", "Bearer tw-access"))
        .and(body_string_contains("Hello https://cdn.example.com/a.png"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": { "id": "1790000000000000000", "text": "Hello" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let content = PostContent::text("Hello").with_media("https://cdn.example.com/a.png");
    let receipt = twitter(&server)
        .publish(&token("tw-access"), "tw42", &content)
        .await
        .unwrap();
    assert_eq!(receipt.post_id.as_deref(), Some("1790000000000000000"));
}

#[tokio::test]
async fn test_twitter_publish_status_classification() {
    let cases = [
        (401u16, "auth"),
        (429, "rate"),
        (403, "auth"),
        (503, "network"),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "title": "Failure",
                "detail": "Something went wrong"
            })))
            .mount(&server)
            .await;

        let error = twitter(&server)
            .publish(&token("tw-access"), "tw42", &PostContent::text("Hi"))
            .await
            .unwrap_err();

        let kind = match platform_error(error) {
            PlatformError::Authentication(_) => "auth",
            PlatformError::RateLimit(_) => "rate",
            PlatformError::Network(_) => "network",
            other => panic!("unexpected error for {}: {:?}", status, other),
        };
        assert_eq!(kind, expected, "status {}", status);
    }
}

#[tokio::test]
async fn test_twitter_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=tw-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tw-access-2",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = twitter(&server)
        .refresh(&token("tw-refresh"))
        .await
        .unwrap();
    assert_eq!(tokens.access_token.expose_secret(), "tw-access-2");
    assert!(tokens.refresh_token.is_none());
}

#[tokio::test]
async fn test_twitter_refresh_failure_is_refresh_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_request",
            "error_description": "Value passed for the token was invalid."
        })))
        .mount(&server)
        .await;

    let error = twitter(&server)
        .refresh(&token("revoked"))
        .await
        .unwrap_err();
    assert!(matches!(platform_error(error), PlatformError::Refresh(_)));
}

// --- LinkedIn ---

fn linkedin(server: &MockServer) -> LinkedInAdapter {
    LinkedInAdapter::new(app("li-client", "li-secret"), reqwest::Client::new())
        .with_base_urls(&format!("{}/oauth/v2", server.uri()), &server.uri())
}

#[tokio::test]
async fn test_linkedin_exchange_posts_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/accessToken"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_id=li-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "li-access",
            "expires_in": 5184000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state: OAuthState = "u1:linkedin".parse().unwrap();
    let tokens = linkedin(&server).exchange_code("abc", &state).await.unwrap();
    assert_eq!(tokens.access_token.expose_secret(), "li-access");
    assert_eq!(tokens.expires_in, Some(5184000));
}

#[tokio::test]
async fn test_linkedin_identity_joins_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "li7",
            "localizedFirstName": "Ada",
            "localizedLastName": "Lovelace"
        })))
        .mount(&server)
        .await;

    let identity = linkedin(&server)
        .fetch_identity(&token("li-access"))
        .await
        .unwrap();
    assert_eq!(identity.id, "li7");
    assert_eq!(identity.name, "Ada Lovelace");
}

#[tokio::test]
async fn test_linkedin_publish_reads_id_from_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/ugcPosts"))
        .and(header("x-restli-protocol-version", "2.0.0"))
        .and(body_string_contains("urn:li:person:li7"))
        .respond_with(
            ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:123"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let receipt = linkedin(&server)
        .publish(&token("li-access"), "li7", &PostContent::text("Hello"))
        .await
        .unwrap();
    assert_eq!(receipt.post_id.as_deref(), Some("urn:li:share:123"));
}

#[tokio::test]
async fn test_linkedin_publish_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/ugcPosts"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "ERROR :: /specificContent :: duplicate post",
            "status": 422
        })))
        .mount(&server)
        .await;

    let error = linkedin(&server)
        .publish(&token("li-access"), "li7", &PostContent::text("Hello"))
        .await
        .unwrap_err();
    match platform_error(error) {
        PlatformError::Validation(msg) => assert!(msg.contains("duplicate post")),
        other => panic!("unexpected error: {:?}", other),
    }
}

// --- Facebook ---

fn facebook(server: &MockServer) -> FacebookAdapter {
    FacebookAdapter::new(app("fb-client", "fb-secret"), reqwest::Client::new())
        .with_base_urls(&format!("{}/dialog/oauth", server.uri()), &server.uri())
}

#[tokio::test]
async fn test_facebook_exchange_uses_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .and(query_param("client_id", "fb-client"))
        .and(query_param("code", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fb-access",
            "token_type": "bearer",
            "expires_in": 5183944
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state: OAuthState = "u1:facebook".parse().unwrap();
    let tokens = facebook(&server).exchange_code("abc", &state).await.unwrap();
    assert_eq!(tokens.access_token.expose_secret(), "fb-access");
}

#[tokio::test]
async fn test_facebook_error_never_echoes_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "Invalid verification code format.",
                "type": "OAuthException",
                "code": 100
            }
        })))
        .mount(&server)
        .await;

    let state: OAuthState = "u1:facebook".parse().unwrap();
    let error = facebook(&server)
        .exchange_code("abc", &state)
        .await
        .unwrap_err();
    let text = error.to_string();
    assert!(text.contains("Invalid verification code format."));
    assert!(!text.contains("fb-secret"));
}

#[tokio::test]
async fn test_facebook_publish_text_goes_to_feed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/page-1/feed"))
        .and(body_string_contains("message=Hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "page-1_99" })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = facebook(&server)
        .publish(&token("fb-access"), "page-1", &PostContent::text("Hello"))
        .await
        .unwrap();
    assert_eq!(receipt.post_id.as_deref(), Some("page-1_99"));
}

#[tokio::test]
async fn test_facebook_publish_media_goes_to_photos() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/page-1/photos"))
        .and(body_string_contains("caption=Look"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "photo-5",
            "post_id": "page-1_100"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let content = PostContent::text("Look").with_media("https://cdn.example.com/a.png");
    let receipt = facebook(&server)
        .publish(&token("fb-access"), "page-1", &content)
        .await
        .unwrap();
    assert_eq!(receipt.post_id.as_deref(), Some("page-1_100"));
}

// --- Instagram ---

fn instagram(server: &MockServer) -> InstagramAdapter {
    InstagramAdapter::new(app("fb-client", "fb-secret"), reqwest::Client::new())
        .with_base_urls(&format!("{}/dialog/oauth", server.uri()), &server.uri())
}

#[tokio::test]
async fn test_instagram_identity_finds_business_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "page-without-ig" },
                {
                    "id": "page-1",
                    "instagram_business_account": { "id": "ig-9", "username": "studio" }
                }
            ]
        })))
        .mount(&server)
        .await;

    let identity = instagram(&server)
        .fetch_identity(&token("fb-access"))
        .await
        .unwrap();
    assert_eq!(identity.id, "ig-9");
    assert_eq!(identity.name, "studio");
}

#[tokio::test]
async fn test_instagram_identity_without_business_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let error = instagram(&server)
        .fetch_identity(&token("fb-access"))
        .await
        .unwrap_err();
    assert!(matches!(
        platform_error(error),
        PlatformError::IdentityLookup(_)
    ));
}

#[tokio::test]
async fn test_instagram_publish_creates_then_publishes_container() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ig-9/media"))
        .and(body_string_contains("image_url="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "container-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ig-9/media_publish"))
        .and(body_string_contains("creation_id=container-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "media-77" })))
        .expect(1)
        .mount(&server)
        .await;

    let content = PostContent::text("Caption").with_media("https://cdn.example.com/a.png");
    let receipt = instagram(&server)
        .publish(&token("fb-access"), "ig-9", &content)
        .await
        .unwrap();
    assert_eq!(receipt.post_id.as_deref(), Some("media-77"));
}

#[tokio::test]
async fn test_instagram_publish_stops_when_container_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ig-9/media"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Only photo or video can be accepted as media type." }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ig-9/media_publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "never" })))
        .expect(0)
        .mount(&server)
        .await;

    let content = PostContent::text("Caption").with_media("https://cdn.example.com/a.txt");
    let error = instagram(&server)
        .publish(&token("fb-access"), "ig-9", &content)
        .await
        .unwrap_err();
    assert!(error.to_string().contains("Only photo or video"));
}
