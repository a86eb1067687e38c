//! Shared-password sessions
//!
//! A session is a single store key, `session_token:<token>` = `"valid"`,
//! with a 24 hour TTL enforced by the store. There is no renewal: a session
//! is either present or absent.
//!
//! ```text
//! absent --login--> valid --logout / TTL--> absent
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{Secret, random_token};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::kv::KvStore;

/// Key prefix for session entries
pub const SESSION_KEY_PREFIX: &str = "session_token:";

/// Value stored under a session key
pub const SESSION_VALUE: &str = "valid";

/// Session lifetime, enforced by the store's TTL
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Random bytes per session token (43 chars encoded)
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Whether administrative routes require a session.
pub enum AccessPolicy {
    /// A shared password is configured; every protected call needs a valid session.
    Gated(Secret<String>),
    /// No password is configured; every caller is admitted.
    Open,
}

impl AccessPolicy {
    /// Gated when the password is non-empty, open otherwise.
    pub fn from_password(password: Option<Secret<String>>) -> Self {
        match password {
            Some(p) if !p.is_empty() => AccessPolicy::Gated(p),
            _ => AccessPolicy::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, AccessPolicy::Open)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AccessPolicy::Gated(_) => "gated",
            AccessPolicy::Open => "open",
        }
    }
}

fn session_key(token: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{token}")
}

/// Issues, validates and revokes session tokens.
pub struct SessionManager {
    store: Arc<dyn KvStore>,
    policy: AccessPolicy,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KvStore>, policy: AccessPolicy) -> Self {
        Self {
            store,
            policy,
            ttl: SESSION_TTL,
        }
    }

    /// Check the password and, on a match, persist and return a new session token.
    ///
    /// In open mode the configured secret is empty, so no supplied password
    /// matches it and login always fails. The gate itself stays open.
    pub async fn login(&self, password: &str) -> Result<String> {
        let matched = match &self.policy {
            AccessPolicy::Gated(expected) => expected.matches(password.as_bytes()),
            AccessPolicy::Open => false,
        };
        if !matched {
            metrics::counter!("token_manager_logins_total", "outcome" => "rejected").increment(1);
            info!(policy = self.policy.name(), "login rejected: wrong password");
            return Err(Error::InvalidPassword);
        }

        let token = random_token(SESSION_TOKEN_BYTES);
        self.store
            .set_ex(&session_key(&token), SESSION_VALUE, self.ttl)
            .await
            .inspect_err(|e| {
                metrics::counter!("token_manager_logins_total", "outcome" => "error").increment(1);
                warn!(error = %e, "failed to persist session");
            })?;

        metrics::counter!("token_manager_logins_total", "outcome" => "accepted").increment(1);
        info!(policy = self.policy.name(), "session issued");
        Ok(token)
    }

    /// Revoke a session. Unknown or empty tokens are not an error.
    pub async fn logout(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Ok(());
        }
        let removed = self.store.del(&session_key(token)).await?;
        debug!(removed, "session revoked");
        Ok(())
    }

    /// Whether the token names a live session. Store errors count as invalid.
    pub async fn is_valid(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        match self.store.exists(&session_key(token)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(error = %e, "session lookup failed, treating as invalid");
                false
            }
        }
    }

    /// Gate decision for a protected request under the configured policy.
    pub async fn authorize(&self, token: Option<&str>) -> bool {
        match self.policy {
            AccessPolicy::Open => true,
            AccessPolicy::Gated(_) => self.is_valid(token.unwrap_or_default()).await,
        }
    }
}
