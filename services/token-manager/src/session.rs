//! Session credential extraction and the admin gate
//!
//! A session token may arrive in the `X-Auth-Token` header, the `token`
//! query parameter, or the `auth_token` cookie. Sources are tried in that
//! order and the first non-empty value wins.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

pub const SESSION_HEADER: &str = "x-auth-token";
pub const SESSION_QUERY_PARAM: &str = "token";
pub const SESSION_COOKIE: &str = "auth_token";

type Extractor = fn(&Parts) -> Option<String>;

/// Credential sources in precedence order.
const EXTRACTORS: [Extractor; 3] = [from_header, from_query, from_cookie];

fn from_header(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn from_query(parts: &Parts) -> Option<String> {
    Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(mut params)| params.remove(SESSION_QUERY_PARAM))
}

fn from_cookie(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
}

/// First non-empty session token across all sources.
pub fn extract_token(parts: &Parts) -> Option<String> {
    EXTRACTORS
        .iter()
        .filter_map(|extract| extract(parts))
        .find(|token| !token.is_empty())
}

/// The caller's session token, if any source carried one.
#[derive(Debug, Clone, Default)]
pub struct SessionCredential(pub Option<String>);

impl SessionCredential {
    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for SessionCredential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionCredential(extract_token(parts)))
    }
}

/// Middleware guarding the administrative routes.
///
/// Admits everything in open-access mode; otherwise requires a live session.
pub async fn require_session(
    State(state): State<AppState>,
    credential: SessionCredential,
    request: Request,
    next: Next,
) -> Response {
    if state.sessions.authorize(credential.token()).await {
        return next.run(request).await;
    }
    info!(
        credential_present = credential.token().is_some(),
        "rejected request without a valid session"
    );
    ApiError::Unauthorized("invalid or expired session, please log in again".into())
        .into_response()
}
