//! Core types shared by every Portier crate.
//!
//! - [`ConsumerRecord`] and [`KeyCredential`] mirror the gateway admin API's
//!   JSON documents.
//! - [`IdentityCodec`] maps application user IDs to and from a consumer's
//!   `custom_id` field.
//! - [`UserIdentity`] is the per-request view of the caller.

pub mod codec;
pub mod consumer;
pub mod error;
pub mod identity;
pub mod types;

pub use codec::IdentityCodec;
pub use consumer::{ConsumerRecord, KeyCredential, Page};
pub use error::InvalidUserId;
pub use identity::{UserAccount, UserIdentity};
pub use types::{ConsumerId, Namespace, UserId};
