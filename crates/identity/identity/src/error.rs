use thiserror::Error;

/// Errors from identity store and user service operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Caller-supplied input was missing or malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// A user with this name already exists.
    #[error("user already exists: {0}")]
    Conflict(String),

    /// The gateway failed or could not be reached.
    #[error("gateway error: {0}")]
    Upstream(#[source] portier_client::Error),

    /// A non-gateway backend (Redis, ...) failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// The create request was sent but its outcome is unknown; the record
    /// may exist.
    #[error("creation of user {username} has an unknown outcome: {source}")]
    Indeterminate {
        username: String,
        #[source]
        source: portier_client::Error,
    },

    /// No user ID is left to allocate.
    #[error("user id space exhausted")]
    AllocationExhausted,
}

impl IdentityError {
    /// Returns `true` if a create may have written a record despite failing.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate { .. })
    }
}

impl From<portier_client::Error> for IdentityError {
    fn from(err: portier_client::Error) -> Self {
        match err {
            portier_client::Error::Validation(msg) => Self::Validation(msg),
            other => Self::Upstream(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_validation_stays_validation() {
        let err: IdentityError = portier_client::Error::Validation("empty".into()).into();
        assert!(matches!(err, IdentityError::Validation(msg) if msg == "empty"));
    }

    #[test]
    fn client_failures_become_upstream() {
        let err: IdentityError = portier_client::Error::Http {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, IdentityError::Upstream(_)));
        assert!(err.to_string().contains("boom"));

        let err: IdentityError = portier_client::Error::NotFound("alice".into()).into();
        assert!(matches!(err, IdentityError::Upstream(_)));
    }

    #[test]
    fn indeterminate_names_user() {
        let err = IdentityError::Indeterminate {
            username: "alice".into(),
            source: portier_client::Error::Timeout(std::time::Duration::from_secs(30)),
        };
        assert!(err.is_indeterminate());
        assert!(err.to_string().contains("alice"));
    }
}
