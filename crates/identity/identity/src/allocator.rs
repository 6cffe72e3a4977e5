use std::sync::Arc;

use portier_client::ConsumerRegistryClient;
use portier_core::{ConsumerRecord, IdentityCodec, Namespace, UserId};
use tracing::{debug, instrument};

use crate::error::IdentityError;

/// The highest user ID among records tagged `tag` whose `custom_id`
/// decodes with `codec`, or 0 when there are none.
pub fn max_allocated_id(records: &[ConsumerRecord], tag: &str, codec: &IdentityCodec) -> u64 {
    records
        .iter()
        .filter(|r| r.has_tag(tag))
        .filter_map(|r| codec.decode(r.custom_id.as_deref()))
        .map(UserId::get)
        .max()
        .unwrap_or(0)
}

/// Computes the next free user ID by scanning the gateway's consumers.
///
/// Not atomic: two allocations that observe the same consumer list return
/// the same ID.
#[derive(Debug, Clone)]
pub struct IdentityAllocator {
    client: Arc<ConsumerRegistryClient>,
    codec: IdentityCodec,
}

impl IdentityAllocator {
    pub fn new(client: Arc<ConsumerRegistryClient>, codec: IdentityCodec) -> Self {
        Self { client, codec }
    }

    /// List every consumer and return the namespace's maximum ID plus one.
    #[instrument(skip(self), fields(namespace = %namespace_tag))]
    pub async fn next_user_id(&self, namespace_tag: &Namespace) -> Result<UserId, IdentityError> {
        let consumers = self.client.list_consumers().await?;
        let max = max_allocated_id(&consumers, namespace_tag, &self.codec);
        let next = max
            .checked_add(1)
            .and_then(UserId::new)
            .ok_or(IdentityError::AllocationExhausted)?;
        debug!(scanned = consumers.len(), max, next = next.get(), "allocated user id");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portier_client::testing::{MockGateway, MockRoute};
    use serde_json::json;

    fn record(custom_id: Option<&str>, tags: &[&str]) -> ConsumerRecord {
        serde_json::from_value(json!({
            "id": format!("c-{}", custom_id.unwrap_or("none")),
            "created_at": 0,
            "custom_id": custom_id,
            "tags": tags,
        }))
        .unwrap()
    }

    fn codec() -> IdentityCodec {
        IdentityCodec::for_namespace(&Namespace::new("portier"))
    }

    #[test]
    fn max_over_namespace_members() {
        let records = vec![
            record(Some("portier_1"), &["portier"]),
            record(Some("portier_3"), &["portier"]),
            record(Some("portier_4"), &["portier", "beta"]),
        ];
        assert_eq!(max_allocated_id(&records, "portier", &codec()), 4);
    }

    #[test]
    fn empty_namespace_is_zero() {
        assert_eq!(max_allocated_id(&[], "portier", &codec()), 0);
    }

    #[test]
    fn foreign_and_undecodable_records_are_ignored() {
        let records = vec![
            record(Some("portier_2"), &["portier"]),
            // Untagged, even though the custom_id decodes.
            record(Some("portier_99"), &[]),
            // Tagged, but not ours to decode.
            record(Some("other_50"), &["portier"]),
            record(Some("portier_x"), &["portier"]),
            record(None, &["portier"]),
        ];
        assert_eq!(max_allocated_id(&records, "portier", &codec()), 2);
    }

    fn client(gateway: &MockGateway) -> Arc<ConsumerRegistryClient> {
        Arc::new(ConsumerRegistryClient::new(gateway.base_url()))
    }

    #[tokio::test]
    async fn next_id_scans_gateway() {
        let gateway = MockGateway::start(vec![MockRoute::json(
            "GET",
            "/consumers",
            200,
            json!({
                "data": [
                    { "id": "a", "created_at": 0, "custom_id": "portier_1", "tags": ["portier"] },
                    { "id": "b", "created_at": 0, "custom_id": "portier_3", "tags": ["portier"] },
                    { "id": "c", "created_at": 0, "custom_id": "portier_4", "tags": ["portier"] },
                    { "id": "d", "created_at": 0, "custom_id": "portier_9", "tags": null }
                ],
                "next": null
            }),
        )])
        .await;

        let allocator = IdentityAllocator::new(client(&gateway), codec());
        let id = allocator
            .next_user_id(&Namespace::new("portier"))
            .await
            .unwrap();
        assert_eq!(id.get(), 5);
    }

    #[tokio::test]
    async fn next_id_starts_at_one() {
        let gateway = MockGateway::start(vec![MockRoute::json(
            "GET",
            "/consumers",
            200,
            json!({ "data": [], "next": null }),
        )])
        .await;

        let allocator = IdentityAllocator::new(client(&gateway), codec());
        let id = allocator
            .next_user_id(&Namespace::new("portier"))
            .await
            .unwrap();
        assert_eq!(id, UserId::FIRST);
    }

    #[tokio::test]
    async fn next_id_reports_exhaustion() {
        let gateway = MockGateway::start(vec![MockRoute::json(
            "GET",
            "/consumers",
            200,
            json!({
                "data": [{
                    "id": "a",
                    "created_at": 0,
                    "custom_id": format!("portier_{}", u64::MAX),
                    "tags": ["portier"]
                }]
            }),
        )])
        .await;

        let allocator = IdentityAllocator::new(client(&gateway), codec());
        let err = allocator
            .next_user_id(&Namespace::new("portier"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::AllocationExhausted));
    }

    #[tokio::test]
    async fn listing_failure_is_upstream() {
        let gateway =
            MockGateway::start(vec![MockRoute::new("GET", "/consumers", 500, "down")]).await;

        let allocator = IdentityAllocator::new(client(&gateway), codec());
        let err = allocator
            .next_user_id(&Namespace::new("portier"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Upstream(_)));
    }
}
