use async_trait::async_trait;
use portier_core::{UserAccount, UserId};

use crate::error::IdentityError;

/// Trait for persisting application users.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// Whether [`allocate`](Self::allocate) is atomic is up to the backend.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Reserve the next user ID.
    async fn allocate(&self) -> Result<UserId, IdentityError>;

    /// Persist a user under an allocated ID. Fails with
    /// [`IdentityError::Conflict`] if the name is taken.
    async fn create_record(
        &self,
        id: UserId,
        username: &str,
    ) -> Result<UserAccount, IdentityError>;

    /// Look a user up by name. Returns `None` if this application has no
    /// such user.
    async fn find_by_name(&self, username: &str) -> Result<Option<UserAccount>, IdentityError>;

    /// Look a user up by ID.
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserAccount>, IdentityError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
