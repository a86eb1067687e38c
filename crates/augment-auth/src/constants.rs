//! Augment OAuth constants
//!
//! Public client configuration for the Augment authorization server. None of
//! these are secrets; the verifier and the resulting access tokens are.

/// Public OAuth client ID registered for this tool
pub const CLIENT_ID: &str = "v";

/// Authorization endpoint the user opens in a browser
pub const AUTHORIZE_ENDPOINT: &str = "https://auth.augmentcode.com/authorize";

/// Path appended to a tenant URL to reach its token endpoint
pub const TOKEN_PATH: &str = "token";

/// Redirect URI sent during code exchange. Augment's hosted callback page
/// shows the code to the user, so no redirect is registered.
pub const REDIRECT_URI: &str = "";

/// Random bytes drawn for a PKCE code verifier
pub const VERIFIER_BYTES: usize = 32;

/// Random bytes drawn for the anti-replay `state` value
pub const STATE_BYTES: usize = 8;
