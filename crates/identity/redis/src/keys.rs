/// Redis keys of one identity namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserKeys {
    /// Hash of user id -> username.
    pub by_id: String,
    /// Hash of username -> user id.
    pub by_name: String,
    /// Counter holding the last allocated id.
    pub max_id: String,
}

impl UserKeys {
    /// Render the keys for a prefix: `{prefix}_user_id`, `{prefix}_user_name`
    /// and `{prefix}_max_user_id`.
    pub fn new(prefix: &str) -> Self {
        Self {
            by_id: format!("{prefix}_user_id"),
            by_name: format!("{prefix}_user_name"),
            max_id: format!("{prefix}_max_user_id"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_prefixed_keys() {
        let keys = UserKeys::new("portier");
        assert_eq!(keys.by_id, "portier_user_id");
        assert_eq!(keys.by_name, "portier_user_name");
        assert_eq!(keys.max_id, "portier_max_user_id");
    }
}
