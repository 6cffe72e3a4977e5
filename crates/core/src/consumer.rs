use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::ConsumerId;

/// A gateway-managed principal, as returned by the consumer admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRecord {
    /// Gateway-assigned identifier. Immutable once created.
    pub id: ConsumerId,
    /// Creation time. The gateway sends Unix seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    /// Display name, unique within the gateway.
    #[serde(default)]
    pub username: Option<String>,
    /// Opaque application-defined identifier.
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Tags; the gateway sends `null` for an untagged consumer.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeSet<String>,
}

impl ConsumerRecord {
    /// Returns `true` if this consumer carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// A key-auth credential provisioned for a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCredential {
    pub id: String,
    pub key: String,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One page of a cursor-paginated admin API listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Link to the next page; `None` on the last page.
    #[serde(default)]
    pub next: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_consumer() {
        let json = serde_json::json!({
            "id": "ec1a1f6f-2aa4-4e58-93ff-b56368f19b27",
            "created_at": 1_422_386_534,
            "username": "alice",
            "custom_id": "portier_1",
            "tags": ["portier", "beta"]
        });
        let consumer: ConsumerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(consumer.id.as_str(), "ec1a1f6f-2aa4-4e58-93ff-b56368f19b27");
        assert_eq!(consumer.created_at.timestamp(), 1_422_386_534);
        assert_eq!(consumer.username.as_deref(), Some("alice"));
        assert_eq!(consumer.custom_id.as_deref(), Some("portier_1"));
        assert!(consumer.has_tag("portier"));
        assert!(consumer.has_tag("beta"));
        assert!(!consumer.has_tag("other"));
    }

    #[test]
    fn null_and_missing_fields_default() {
        let json = serde_json::json!({
            "id": "c-1",
            "created_at": 0,
            "username": null,
            "tags": null
        });
        let consumer: ConsumerRecord = serde_json::from_value(json).unwrap();
        assert!(consumer.username.is_none());
        assert!(consumer.custom_id.is_none());
        assert!(consumer.tags.is_empty());
    }

    #[test]
    fn missing_id_is_rejected() {
        let json = serde_json::json!({ "created_at": 0, "username": "bob" });
        assert!(serde_json::from_value::<ConsumerRecord>(json).is_err());
    }

    #[test]
    fn page_without_next() {
        let json = serde_json::json!({
            "data": [{ "id": "c-1", "created_at": 0 }]
        });
        let page: Page<ConsumerRecord> = serde_json::from_value(json).unwrap();
        assert_eq!(page.data.len(), 1);
        assert!(page.next.is_none());
    }

    #[test]
    fn key_credential_parses() {
        let json = serde_json::json!({
            "id": "k-1",
            "key": "secret-key",
            "created_at": 1_500_000_000,
            "consumer": { "id": "c-1" }
        });
        let cred: KeyCredential = serde_json::from_value(json).unwrap();
        assert_eq!(cred.key, "secret-key");
        assert_eq!(cred.created_at.map(|t| t.timestamp()), Some(1_500_000_000));
    }
}
