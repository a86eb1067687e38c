//! Shared types for the Augment token manager workspace

mod error;
mod random;
mod secret;

pub use error::{Error, Result};
pub use random::random_token;
pub use secret::Secret;
