//! Augment OAuth authorization library
//!
//! PKCE flow generation, a state-keyed registry of in-flight flows, and the
//! authorization code exchange against a tenant token endpoint. Persisting
//! the resulting access token is left to the caller.
//!
//! Flow:
//! 1. `FlowRegistry::current()` yields an `OAuthState` (verifier, challenge, state)
//! 2. The user opens `OAuthState::authorization_url()` and copies the code
//! 3. `FlowRegistry::resolve()` finds the verifier bound to that attempt
//! 4. `token::exchange_code()` trades code + verifier for an access token
//! 5. `FlowRegistry::complete()` retires the flow

pub mod constants;
pub mod error;
pub mod flow;
pub mod pkce;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use flow::{DEFAULT_FLOW_TTL, FlowRegistry};
pub use pkce::{
    OAuthState, build_authorization_url, compute_challenge, generate_state, generate_verifier,
};
pub use token::{TokenResponse, exchange_code, token_endpoint};
