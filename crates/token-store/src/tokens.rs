//! Persisted access-token records
//!
//! Each record lives in a hash at `token:<access token>` with fields
//! `tenant_url` and `remark`. The access token is its own identifier.
//!
//! Composite operations map to single-key atomic store calls:
//! - save: `HSETNX tenant_url`, then `HSETNX remark`
//! - delete: one `DEL`, whose count tells not-found apart
//! - update remark: a script that writes only while the key exists
//!
//! A crash between the two save writes leaves a record without `remark`;
//! listing treats that as an empty remark.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::kv::KvStore;

/// Key prefix for access-token records
pub const TOKEN_KEY_PREFIX: &str = "token:";

const TENANT_URL_FIELD: &str = "tenant_url";
const REMARK_FIELD: &str = "remark";

/// One stored access token as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessTokenRecord {
    pub token: String,
    pub tenant_url: String,
    pub remark: String,
}

fn token_key(token: &str) -> String {
    format!("{TOKEN_KEY_PREFIX}{token}")
}

fn require_id(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(Error::InvalidRequest("token identifier is required".into()));
    }
    Ok(())
}

/// Repository of access-token records.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KvStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Persist a token obtained from a code exchange.
    ///
    /// Idempotent: if the token is already stored nothing is modified.
    /// Returns `true` when a new record was created.
    pub async fn save(&self, token: &str, tenant_url: &str) -> Result<bool> {
        require_id(token)?;
        let key = token_key(token);

        let created = self
            .store
            .hset_nx(&key, TENANT_URL_FIELD, tenant_url)
            .await?;
        if !created {
            debug!("token already stored, skipping");
            return Ok(false);
        }
        self.store.hset_nx(&key, REMARK_FIELD, "").await?;
        Ok(true)
    }

    /// All stored tokens in descending key order.
    ///
    /// Records without `tenant_url` are skipped, as are records whose fetch
    /// fails. Only a failure to enumerate keys fails the call.
    pub async fn list(&self) -> Result<Vec<AccessTokenRecord>> {
        let pattern = format!("{TOKEN_KEY_PREFIX}*");
        let mut keys = self.store.keys(&pattern).await?;
        keys.sort_unstable_by(|a, b| b.cmp(a));

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(token) = key.strip_prefix(TOKEN_KEY_PREFIX) else {
                continue;
            };
            let mut fields = match self.store.hgetall(&key).await {
                Ok(fields) => fields,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable token record");
                    continue;
                }
            };
            let Some(tenant_url) = fields.remove(TENANT_URL_FIELD) else {
                debug!("skipping token record without tenant_url");
                continue;
            };
            records.push(AccessTokenRecord {
                token: token.to_owned(),
                tenant_url,
                remark: fields.remove(REMARK_FIELD).unwrap_or_default(),
            });
        }
        Ok(records)
    }

    /// Remove a stored token.
    pub async fn delete(&self, token: &str) -> Result<()> {
        require_id(token)?;
        if !self.store.del(&token_key(token)).await? {
            return Err(Error::NotFound("token does not exist".into()));
        }
        Ok(())
    }

    /// Overwrite a token's remark, leaving `tenant_url` untouched.
    pub async fn update_remark(&self, token: &str, remark: &str) -> Result<()> {
        require_id(token)?;
        if !self
            .store
            .hset_if_exists(&token_key(token), REMARK_FIELD, remark)
            .await?
        {
            return Err(Error::NotFound("token does not exist".into()));
        }
        Ok(())
    }
}
