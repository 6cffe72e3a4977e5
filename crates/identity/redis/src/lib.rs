//! Redis identity backend for Portier.
//!
//! Users are kept in two Redis hashes plus a counter:
//!
//! | Key | Type | Contents |
//! |-----|------|----------|
//! | `{prefix}_user_id` | hash | user id -> username |
//! | `{prefix}_user_name` | hash | username -> user id |
//! | `{prefix}_max_user_id` | string | last allocated id |
//!
//! Allocation is `INCR` on the counter and creation is a Lua script that
//! writes both hashes, so both are atomic on a single Redis instance.
//!
//! # Example
//!
//! ```ignore
//! use portier_identity_redis::{RedisConfig, RedisIdentityStore};
//!
//! let config = RedisConfig::new("redis://localhost:6379").with_prefix("portier");
//! let store = RedisIdentityStore::new(&config)?;
//! ```

mod config;
mod keys;
mod scripts;
mod store;

pub use config::RedisConfig;
pub use store::RedisIdentityStore;
