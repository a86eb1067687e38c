//! Authorization code exchange
//!
//! Each tenant runs its own token endpoint at `<tenant_url>token`. The
//! exchange POSTs a JSON body (not a form) carrying the PKCE verifier and
//! reads `access_token` from the JSON response.

use serde::{Deserialize, Serialize};

use crate::constants::{CLIENT_ID, REDIRECT_URI, TOKEN_PATH};
use crate::error::{Error, Result};

/// JSON body sent to the tenant token endpoint.
#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    code_verifier: &'a str,
    redirect_uri: &'a str,
    code: &'a str,
}

/// Response from the tenant token endpoint.
///
/// Only `access_token` matters; Augment issues no refresh token.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Resolve the token endpoint for a tenant.
///
/// The tenant URL must be absolute http(s). A missing trailing slash is
/// added so `https://d0.api.augmentcode.com` and
/// `https://d0.api.augmentcode.com/` reach the same endpoint.
pub fn token_endpoint(tenant_url: &str) -> Result<String> {
    let tenant_url = tenant_url.trim();
    if !tenant_url.starts_with("http://") && !tenant_url.starts_with("https://") {
        return Err(Error::InvalidTenantUrl(format!(
            "tenant_url must start with http:// or https://, got: {tenant_url}"
        )));
    }
    if tenant_url.ends_with('/') {
        Ok(format!("{tenant_url}{TOKEN_PATH}"))
    } else {
        Ok(format!("{tenant_url}/{TOKEN_PATH}"))
    }
}

/// Exchange an authorization code for an access token.
///
/// The verifier must be the one whose challenge went into the authorization
/// URL the user opened. Persisting the returned token is the caller's job.
pub async fn exchange_code(
    client: &reqwest::Client,
    tenant_url: &str,
    verifier: &str,
    code: &str,
) -> Result<String> {
    let endpoint = token_endpoint(tenant_url)?;

    let response = client
        .post(&endpoint)
        .json(&ExchangeRequest {
            grant_type: "authorization_code",
            client_id: CLIENT_ID,
            code_verifier: verifier,
            redirect_uri: REDIRECT_URI,
            code,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(e.to_string()))?;

    match token.access_token {
        Some(access_token) if !access_token.is_empty() => Ok(access_token),
        _ => Err(Error::MissingAccessToken),
    }
}
