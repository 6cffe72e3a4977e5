use crate::types::{Namespace, UserId};

/// Maps application user IDs to and from a consumer's `custom_id` field.
///
/// A `custom_id` owned by this application is the namespace prefix followed
/// by the decimal user ID, e.g. `portier_42`. Anything else decodes to `None`
/// and is treated as "not one of ours".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCodec {
    prefix: String,
}

impl IdentityCodec {
    /// Create a codec with an explicit prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Create the codec for a namespace: the prefix is `"{namespace}_"`.
    pub fn for_namespace(namespace: &Namespace) -> Self {
        Self::new(format!("{namespace}_"))
    }

    /// The prefix every encoded `custom_id` starts with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Encode a user ID into a `custom_id`.
    pub fn encode(&self, user_id: UserId) -> String {
        format!("{}{user_id}", self.prefix)
    }

    /// Decode a `custom_id` back into a user ID.
    ///
    /// Returns `None` when the input is absent, lacks the prefix, or the
    /// remainder is not a positive decimal integer.
    pub fn decode(&self, custom_id: Option<&str>) -> Option<UserId> {
        custom_id?.strip_prefix(self.prefix.as_str())?.parse().ok()
    }
}
