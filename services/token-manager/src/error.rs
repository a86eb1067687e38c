//! API error responses
//!
//! Every handler failure renders as `{"status":"error","error":"..."}` with
//! a status code chosen by category: validation 400, authentication 401,
//! missing token 404, exchange or store failure 500. Nothing is retried.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({
                "status": "error",
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<token_store::Error> for ApiError {
    fn from(e: token_store::Error) -> Self {
        match e {
            token_store::Error::InvalidRequest(msg) => ApiError::BadRequest(msg),
            token_store::Error::InvalidPassword => {
                ApiError::Unauthorized("invalid password".into())
            }
            token_store::Error::NotFound(msg) => ApiError::NotFound(msg),
            token_store::Error::Store(msg) => ApiError::Internal(format!("store error: {msg}")),
        }
    }
}

impl From<augment_auth::Error> for ApiError {
    fn from(e: augment_auth::Error) -> Self {
        if e.is_client_error() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(format!("failed to obtain access token: {e}"))
        }
    }
}
