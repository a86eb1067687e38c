//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier, its S256 challenge and the anti-replay
//! `state` value that together make up one authorization attempt. The
//! challenge goes into the authorization URL; the verifier stays
//! server-side until the code exchange.

use std::fmt;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::random_token;
use sha2::{Digest, Sha256};

use crate::constants::{AUTHORIZE_ENDPOINT, CLIENT_ID, STATE_BYTES, VERIFIER_BYTES};

/// One authorization attempt: verifier, derived challenge and correlation state.
#[derive(Clone)]
pub struct OAuthState {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
    pub created_at: Instant,
}

impl OAuthState {
    /// Draw fresh randomness and derive a new flow.
    ///
    /// Panics if the OS entropy source fails. There is no degraded mode for
    /// that: without randomness the verifier would be guessable.
    pub fn generate() -> Self {
        let code_verifier = generate_verifier();
        let code_challenge = compute_challenge(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
            state: generate_state(),
            created_at: Instant::now(),
        }
    }

    /// Authorization URL bound to this flow's challenge and state.
    pub fn authorization_url(&self) -> String {
        build_authorization_url(&self.state, &self.code_challenge)
    }
}

impl fmt::Debug for OAuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthState")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Generate a cryptographically random PKCE code verifier.
///
/// 32 random bytes encode to 43 characters, the RFC 7636 minimum length.
pub fn generate_verifier() -> String {
    random_token(VERIFIER_BYTES)
}

/// Generate the opaque `state` value echoed back by the authorization server.
pub fn generate_state() -> String {
    random_token(STATE_BYTES)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`, hashing the verifier's
/// encoded string bytes rather than the raw random bytes.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the authorization URL for a state/challenge pair.
///
/// Both values are URL-safe base64, so they need no further escaping.
pub fn build_authorization_url(state: &str, challenge: &str) -> String {
    format!(
        "{AUTHORIZE_ENDPOINT}?response_type=code&code_challenge={challenge}&client_id={CLIENT_ID}&state={state}&prompt=login"
    )
}
