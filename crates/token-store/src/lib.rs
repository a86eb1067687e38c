//! Session and access-token storage
//!
//! Everything the token manager persists goes through a `KvStore`:
//! - `session::SessionManager` issues and checks shared-password sessions
//! - `tokens::TokenStore` saves, lists, annotates and deletes access tokens
//!
//! `RedisStore` is the production backend; `MemoryStore` provides the same
//! semantics in-process.

pub mod error;
pub mod kv;
pub mod memory;
pub mod redis_store;
pub mod session;
pub mod tokens;

pub use error::{Error, Result};
pub use kv::{KvStore, StoreFuture};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use session::{AccessPolicy, SESSION_TTL, SessionManager};
pub use tokens::{AccessTokenRecord, TokenStore};
