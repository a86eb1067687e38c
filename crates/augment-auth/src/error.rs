//! Error types for the OAuth flow

/// Errors from PKCE flow management and token exchange.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("no access token in token endpoint response")]
    MissingAccessToken,

    #[error("invalid tenant URL: {0}")]
    InvalidTenantUrl(String),

    #[error("no pending authorization flow: {0}")]
    FlowNotFound(String),

    #[error("authorization flow expired: {0}")]
    FlowExpired(String),
}

impl Error {
    /// Whether the error stems from the caller's input (unknown flow, bad
    /// tenant URL) rather than from the upstream exchange.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidTenantUrl(_) | Error::FlowNotFound(_) | Error::FlowExpired(_)
        )
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(Error::InvalidTenantUrl("ftp://x".into()).is_client_error());
        assert!(Error::FlowNotFound("abc".into()).is_client_error());
        assert!(Error::FlowExpired("abc".into()).is_client_error());
        assert!(!Error::MissingAccessToken.is_client_error());
        assert!(!Error::Http("refused".into()).is_client_error());
    }

    #[test]
    fn missing_access_token_message() {
        assert_eq!(
            Error::MissingAccessToken.to_string(),
            "no access token in token endpoint response"
        );
    }
}
