//! JSON handlers for the `/api` surface

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::metrics;
use crate::session::SessionCredential;

type ApiResult = Result<Json<Value>, ApiError>;

/// Leading characters of an access token that are safe to log.
const LOGGED_TOKEN_PREFIX: usize = 10;

fn token_prefix(token: &str) -> &str {
    token
        .char_indices()
        .nth(LOGGED_TOKEN_PREFIX)
        .map_or(token, |(i, _)| &token[..i])
}

fn success() -> Json<Value> {
    Json(json!({ "status": "success" }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    password: String,
}

/// `POST /api/login`
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    if request.password.is_empty() {
        return Err(ApiError::BadRequest("password is required".into()));
    }
    let token = state.sessions.login(&request.password).await?;
    Ok(Json(json!({ "status": "success", "token": token })))
}

/// `POST /api/logout`. Always succeeds.
pub async fn logout(State(state): State<AppState>, credential: SessionCredential) -> Json<Value> {
    if let Some(token) = credential.token() {
        if let Err(e) = state.sessions.logout(token).await {
            warn!(error = %e, "failed to revoke session");
        }
    }
    success()
}

/// `GET /api/auth`
pub async fn authorize_url(State(state): State<AppState>) -> Json<Value> {
    let flow = state.flows.current().await;
    Json(json!({
        "status": "success",
        "authorize_url": flow.authorization_url(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    #[serde(default)]
    code: String,
    #[serde(default)]
    tenant_url: String,
    #[serde(default)]
    state: Option<String>,
}

/// `POST /api/callback`
///
/// Exchanges the pasted code for an access token and persists it.
pub async fn callback(
    State(state): State<AppState>,
    body: Result<Json<CallbackRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    if request.code.is_empty() {
        return Err(ApiError::BadRequest("code is required".into()));
    }
    if request.tenant_url.is_empty() {
        return Err(ApiError::BadRequest("tenant_url is required".into()));
    }

    let flow = state
        .flows
        .resolve(request.state.as_deref().filter(|s| !s.is_empty()))
        .await?;

    let token = match augment_auth::exchange_code(
        &state.http_client,
        &request.tenant_url,
        &flow.code_verifier,
        &request.code,
    )
    .await
    {
        Ok(token) => token,
        Err(e) => {
            metrics::record_exchange("failure");
            warn!(error = %e, tenant_url = %request.tenant_url, "code exchange failed");
            return Err(e.into());
        }
    };
    metrics::record_exchange("success");
    state.flows.complete(&flow.state).await;

    if let Err(e) = state.tokens.save(&token, &request.tenant_url).await {
        error!(error = %e, token = token_prefix(&token), "failed to save token");
        return Err(ApiError::Internal(format!("failed to save token: {e}")));
    }
    info!(
        token = token_prefix(&token),
        tenant_url = %request.tenant_url,
        "access token obtained"
    );

    Ok(Json(json!({ "status": "success", "token": token })))
}

/// `GET /api/tokens`
pub async fn list_tokens(State(state): State<AppState>) -> ApiResult {
    let tokens = state.tokens.list().await?;
    let total = tokens.len();
    Ok(Json(json!({
        "status": "success",
        "tokens": tokens,
        "total": total,
    })))
}

/// `DELETE /api/token/{token}`
pub async fn delete_token(State(state): State<AppState>, Path(token): Path<String>) -> ApiResult {
    state.tokens.delete(&token).await?;
    info!(token = token_prefix(&token), "token deleted");
    Ok(success())
}

#[derive(Debug, Deserialize)]
pub struct RemarkRequest {
    #[serde(default)]
    remark: String,
}

/// `PUT /api/token/{token}/remark`
pub async fn update_remark(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Result<Json<RemarkRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    state.tokens.update_remark(&token, &request.remark).await?;
    Ok(success())
}
