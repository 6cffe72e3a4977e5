use thiserror::Error;

/// Errors that can occur when running the Portier server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An identity store could not be set up.
    #[error("identity error: {0}")]
    Identity(#[from] portier_identity::IdentityError),
}
