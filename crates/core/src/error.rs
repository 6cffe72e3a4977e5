use thiserror::Error;

/// Why a value could not be turned into a [`UserId`](crate::UserId).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidUserId {
    #[error("user id must be positive")]
    Zero,

    #[error("user id is not a decimal number: {0:?}")]
    NotNumeric(String),

    #[error("user id out of range: {0}")]
    OutOfRange(String),
}
