//! HTTP API
//!
//! Thin axum handlers over [`OAuthController`] and [`Dispatcher`]. JSON
//! responses use the envelope `{ "success": bool, "data" | "error": .. }`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::cipher::SecretCipher;
use crate::config::Config;
use crate::db::Database;
use crate::dispatcher::Dispatcher;
use crate::error::{ConfigError, CrosscastError, PlatformError, Result};
use crate::oauth::OAuthController;
use crate::platforms::AdapterRegistry;
use crate::types::{Platform, PostContent};

/// Shared state behind every handler
#[derive(Clone)]
pub struct AppState {
    pub oauth: OAuthController,
    pub dispatcher: Dispatcher,
    pub db: Database,
    pub registry: Arc<AdapterRegistry>,
}

impl AppState {
    pub fn new(
        config: &Config,
        registry: AdapterRegistry,
        db: Database,
        cipher: SecretCipher,
    ) -> Result<Self> {
        let registry = Arc::new(registry);
        Ok(Self {
            oauth: OAuthController::new(
                registry.clone(),
                db.clone(),
                cipher.clone(),
                &config.server.frontend_url,
            )?,
            dispatcher: Dispatcher::new(registry.clone(), db.clone(), cipher),
            db,
            registry,
        })
    }
}

/// Error response in the JSON envelope
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<CrosscastError> for ApiError {
    fn from(error: CrosscastError) -> Self {
        let status = match &error {
            CrosscastError::InvalidInput(_)
            | CrosscastError::InvalidState(_)
            | CrosscastError::UnsupportedPlatform(_)
            | CrosscastError::Platform(PlatformError::Validation(_))
            | CrosscastError::Platform(PlatformError::NotImplemented(_)) => StatusCode::BAD_REQUEST,
            CrosscastError::Platform(_) => StatusCode::BAD_GATEWAY,
            CrosscastError::Cipher(_) | CrosscastError::Config(_) | CrosscastError::Database(_) => {
                tracing::error!(error = %error, "Request failed with an internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        Self {
            status,
            message: error.user_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/oauth-connect", get(connect_handler))
        .route("/api/oauth-callback", get(callback_handler))
        .route(
            "/api/publish",
            axum::routing::post(publish_handler).options(publish_preflight_handler),
        )
        .route(
            "/api/accounts",
            get(accounts_list_handler).delete(accounts_delete_handler),
        )
        .with_state(state)
}

/// Bind and serve in a background task
///
/// Returns the bound address (useful when binding to port 0) and the task
/// handle, which completes once `shutdown` resolves and in-flight requests
/// have drained.
pub async fn start_server<F>(
    addr: SocketAddr,
    state: AppState,
    shutdown: F,
) -> Result<(SocketAddr, JoinHandle<()>)>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_error = |e: std::io::Error| ConfigError::InvalidValue {
        field: "server.bind".to_string(),
        reason: format!("failed to bind {}: {}", addr, e),
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(bind_error)?;
    let bound_addr = listener.local_addr().map_err(bind_error)?;

    let app = router(state);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("HTTP server error: {}", e);
        }
        tracing::info!("HTTP server stopped");
    });

    tracing::info!("Listening on http://{}", bound_addr);
    Ok((bound_addr, handle))
}

fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("missing required parameter: {}", name)))
}

// --- Health ---

#[instrument(skip_all)]
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "platforms": state.registry.platforms() })),
    )
}

// --- OAuth ---

#[derive(Debug, Deserialize)]
struct ConnectParams {
    platform: Option<String>,
    user_id: Option<String>,
}

#[instrument(skip_all)]
async fn connect_handler(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> ApiResult<Redirect> {
    let platform = required(params.platform, "platform")?;
    let user_id = required(params.user_id, "user_id")?;

    let url = state.oauth.start_connect(&user_id, &platform)?;
    Ok(Redirect::to(url.as_str()))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Provider redirect target; always answers with a redirect to the app
/// unless the request itself is malformed
#[instrument(skip_all)]
async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Redirect> {
    if let Some(error) = params.error {
        let message = params.error_description.unwrap_or(error);
        tracing::info!(reason = %message, "Provider declined the connection");
        return Ok(Redirect::to(state.oauth.error_redirect(&message).as_str()));
    }

    let code = required(params.code, "code")?;
    let oauth_state = required(params.state, "state")?;

    let outcome = state.oauth.complete_connect(&code, &oauth_state).await;
    if let Err(e) = &outcome {
        tracing::warn!(error = %e, "Account connection failed");
    }
    Ok(Redirect::to(state.oauth.callback_redirect(&outcome).as_str()))
}

// --- Publish ---

#[derive(Debug, Deserialize)]
struct PublishRequest {
    platform: Option<String>,
    platforms: Option<Vec<String>>,
    #[serde(default)]
    text: String,
    media_url: Option<String>,
    user_id: Option<String>,
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
    response
}

async fn publish_preflight_handler() -> Response {
    with_cors(StatusCode::NO_CONTENT.into_response())
}

#[instrument(skip_all)]
async fn publish_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<PublishRequest>, JsonRejection>,
) -> Response {
    let response = match publish(state, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    with_cors(response)
}

async fn publish(
    state: AppState,
    body: std::result::Result<Json<PublishRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) =
        body.map_err(|e| ApiError::bad_request(format!("invalid request body: {}", e.body_text())))?;

    let user_id = required(request.user_id, "user_id")?;
    let content = PostContent {
        text: request.text,
        media_url: request.media_url.filter(|url| !url.trim().is_empty()),
    };

    match (request.platforms, request.platform) {
        (Some(tags), _) => {
            if tags.is_empty() {
                return Err(ApiError::bad_request("platforms must not be empty"));
            }
            let platforms = tags
                .iter()
                .map(|tag| tag.parse::<Platform>())
                .collect::<Result<Vec<_>>>()?;

            let results = state.dispatcher.publish(&user_id, &platforms, &content).await;
            Ok((
                StatusCode::OK,
                Json(json!({ "success": true, "data": results })),
            )
                .into_response())
        }
        (None, Some(tag)) => {
            let platform: Platform = tag.parse()?;
            let result = state
                .dispatcher
                .publish_one(&user_id, platform, &content)
                .await;

            if result.success {
                Ok((
                    StatusCode::OK,
                    Json(json!({ "success": true, "data": result })),
                )
                    .into_response())
            } else {
                Err(ApiError::bad_request(result.detail))
            }
        }
        (None, None) => Err(ApiError::bad_request(
            "missing required parameter: platform",
        )),
    }
}

// --- Accounts ---

#[derive(Debug, Deserialize)]
struct AccountsQuery {
    user_id: Option<String>,
}

#[instrument(skip_all)]
async fn accounts_list_handler(
    State(state): State<AppState>,
    Query(query): Query<AccountsQuery>,
) -> ApiResult<impl IntoResponse> {
    let user_id = required(query.user_id, "user_id")?;
    let accounts = state.db.list_accounts(&user_id).await?;
    let summaries: Vec<_> = accounts.iter().map(|a| a.summary()).collect();

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": summaries })),
    ))
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    id: Option<String>,
}

#[instrument(skip_all)]
async fn accounts_delete_handler(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<impl IntoResponse> {
    let id = required(query.id, "id")?;

    if state.db.delete_account(&id).await? {
        tracing::info!(id = %id, "Account disconnected");
        Ok((StatusCode::OK, Json(json!({ "success": true }))))
    } else {
        Err(ApiError::not_found("account not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CipherError;

    #[test]
    fn test_error_status_mapping() {
        let cases: Vec<(CrosscastError, StatusCode)> = vec![
            (
                CrosscastError::InvalidInput("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CrosscastError::UnsupportedPlatform("myspace".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PlatformError::TokenExchange("bad code".to_string()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                CipherError::Decryption.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status, expected);
        }
    }

    #[test]
    fn test_internal_errors_use_generic_message() {
        let error: CrosscastError = CipherError::InvalidKey("expected 32 bytes".to_string()).into();
        let api_error = ApiError::from(error);
        assert!(!api_error.message.contains("32 bytes"));
    }

    #[test]
    fn test_required_trims_and_rejects_empty() {
        assert_eq!(required(Some(" u1 ".to_string()), "user_id").unwrap(), "u1");
        assert!(required(Some("  ".to_string()), "user_id").is_err());
        assert!(required(None, "user_id").is_err());
    }
}
