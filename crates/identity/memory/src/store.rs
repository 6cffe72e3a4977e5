use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use portier_core::{UserAccount, UserId};
use portier_identity::error::IdentityError;
use portier_identity::store::IdentityStore;

/// In-memory [`IdentityStore`] backed by [`DashMap`]s.
///
/// Allocation is an atomic counter, so concurrent creates never share an ID.
/// Nothing is persisted; intended for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    by_name: DashMap<String, UserId>,
    by_id: DashMap<UserId, String>,
    max_id: AtomicU64,
}

impl MemoryIdentityStore {
    /// Create a new, empty in-memory identity store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn allocate(&self) -> Result<UserId, IdentityError> {
        let previous = self
            .max_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map_err(|_| IdentityError::AllocationExhausted)?;
        UserId::new(previous + 1).ok_or(IdentityError::AllocationExhausted)
    }

    async fn create_record(
        &self,
        id: UserId,
        username: &str,
    ) -> Result<UserAccount, IdentityError> {
        // Holding the name entry serialises creates of the same name.
        match self.by_name.entry(username.to_owned()) {
            Entry::Occupied(_) => Err(IdentityError::Conflict(username.to_owned())),
            Entry::Vacant(slot) => {
                match self.by_id.entry(id) {
                    Entry::Occupied(_) => {
                        return Err(IdentityError::Conflict(format!("user id {id}")));
                    }
                    Entry::Vacant(id_slot) => {
                        id_slot.insert(username.to_owned());
                    }
                }
                slot.insert(id);
                Ok(UserAccount::new(id, username))
            }
        }
    }

    async fn find_by_name(&self, username: &str) -> Result<Option<UserAccount>, IdentityError> {
        Ok(self
            .by_name
            .get(username)
            .map(|id| UserAccount::new(*id, username)))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserAccount>, IdentityError> {
        Ok(self
            .by_id
            .get(&id)
            .map(|name| UserAccount::new(id, name.value().clone())))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
