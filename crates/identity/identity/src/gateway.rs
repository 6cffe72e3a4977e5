use std::sync::Arc;

use async_trait::async_trait;
use portier_client::{ConsumerRegistryClient, Error as ClientError};
use portier_core::{ConsumerRecord, IdentityCodec, Namespace, UserAccount, UserId};
use tracing::{debug, instrument};

use crate::allocator::IdentityAllocator;
use crate::error::IdentityError;
use crate::store::IdentityStore;

/// Identity store backed by the gateway's consumer registry.
///
/// Each user is a consumer tagged with the namespace whose `custom_id` is
/// the encoded user ID. Consumers without the tag, or whose `custom_id` does
/// not decode, are invisible to this store.
#[derive(Debug, Clone)]
pub struct GatewayIdentityStore {
    client: Arc<ConsumerRegistryClient>,
    namespace: Namespace,
    codec: IdentityCodec,
    allocator: IdentityAllocator,
}

impl GatewayIdentityStore {
    pub fn new(client: Arc<ConsumerRegistryClient>, namespace: Namespace) -> Self {
        let codec = IdentityCodec::for_namespace(&namespace);
        let allocator = IdentityAllocator::new(Arc::clone(&client), codec.clone());
        Self {
            client,
            namespace,
            codec,
            allocator,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn codec(&self) -> &IdentityCodec {
        &self.codec
    }

    /// The user ID of a consumer, if it belongs to this namespace.
    fn member_id(&self, consumer: &ConsumerRecord) -> Option<UserId> {
        if !consumer.has_tag(&self.namespace) {
            return None;
        }
        self.codec.decode(consumer.custom_id.as_deref())
    }
}

/// Sort a failed create into "not written" and "maybe written".
fn create_error(username: &str, err: ClientError) -> IdentityError {
    match err {
        ClientError::Http { status: 409, .. } => IdentityError::Conflict(username.to_owned()),
        // The request reached the gateway; the record may exist.
        ClientError::Timeout(_) | ClientError::Deserialization(_) => IdentityError::Indeterminate {
            username: username.to_owned(),
            source: err,
        },
        other => other.into(),
    }
}

#[async_trait]
impl IdentityStore for GatewayIdentityStore {
    async fn allocate(&self) -> Result<UserId, IdentityError> {
        self.allocator.next_user_id(&self.namespace).await
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn create_record(
        &self,
        id: UserId,
        username: &str,
    ) -> Result<UserAccount, IdentityError> {
        let custom_id = self.codec.encode(id);
        let consumer = self
            .client
            .create_consumer(Some(username), Some(&custom_id), &[self.namespace.as_str()])
            .await
            .map_err(|e| create_error(username, e))?;
        debug!(consumer_id = %consumer.id, %custom_id, "consumer created");
        Ok(UserAccount::new(id, username))
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn find_by_name(&self, username: &str) -> Result<Option<UserAccount>, IdentityError> {
        let Some(consumer) = self.client.find_consumer(username).await? else {
            debug!("no such consumer");
            return Ok(None);
        };
        let Some(id) = self.member_id(&consumer) else {
            debug!(consumer_id = %consumer.id, "consumer outside namespace");
            return Ok(None);
        };
        let name = consumer.username.unwrap_or_else(|| username.to_owned());
        Ok(Some(UserAccount::new(id, name)))
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserAccount>, IdentityError> {
        let consumers = self.client.list_consumers().await?;
        // A user needs a name to log in; nameless consumers are skipped.
        let found = consumers.into_iter().find_map(|c| {
            if self.member_id(&c) != Some(id) {
                return None;
            }
            c.username
                .filter(|name| !name.is_empty())
                .map(|name| UserAccount::new(id, name))
        });
        Ok(found)
    }

    fn backend(&self) -> &'static str {
        "gateway"
    }
}
