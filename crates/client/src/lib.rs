//! Gateway admin API client.
//!
//! A native Rust client for the consumer registry of a Kong-style API
//! gateway, plus the [`SessionBroker`] that turns a consumer's API key into a
//! gateway session cookie.
//!
//! # Quick Start
//!
//! ```no_run
//! use portier_client::ConsumerRegistryClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), portier_client::Error> {
//!     let client = ConsumerRegistryClient::new("http://localhost:8001");
//!
//!     // Every consumer, across all pages.
//!     let consumers = client.list_consumers().await?;
//!     println!("{} consumers", consumers.len());
//!
//!     let alice = client
//!         .create_consumer(Some("alice"), Some("portier_1"), &["portier"])
//!         .await?;
//!     println!("created {}", alice.id);
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```no_run
//! use portier_client::ConsumerRegistryClientBuilder;
//! use std::time::Duration;
//!
//! let client = ConsumerRegistryClientBuilder::from_parts("http", "kong", 8001)
//!     .timeout(Duration::from_secs(10))
//!     .api_key("admin-key")
//!     .build()
//!     .unwrap();
//! ```

mod consumers;
mod credentials;
mod error;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::Error;
pub use session::{SessionBroker, SessionConfig};

use std::fmt;
use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters escaped in a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// HTTP client for the gateway's consumer admin API.
///
/// Stateless apart from the pooled `reqwest::Client`; build it once and share
/// it by `Arc` or `Clone`.
#[derive(Clone)]
pub struct ConsumerRegistryClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for ConsumerRegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerRegistryClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring a [`ConsumerRegistryClient`].
pub struct ConsumerRegistryClientBuilder {
    base_url: String,
    timeout: Duration,
    api_key: Option<String>,
    client: Option<Client>,
}

impl ConsumerRegistryClientBuilder {
    /// Create a new builder with the given admin API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            api_key: None,
            client: None,
        }
    }

    /// Create a builder from protocol, host, and admin port.
    pub fn from_parts(protocol: &str, host: &str, port: u16) -> Self {
        Self::new(format!("{protocol}://{host}:{port}"))
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set an API key sent as the `apikey` header, for admin APIs that sit
    /// behind the gateway's own key-auth.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Use a custom reqwest Client.
    ///
    /// The builder's timeout is still reported in [`Error::Timeout`], but the
    /// supplied client's own timeout settings govern the requests.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ConsumerRegistryClient, Error> {
        if self.base_url.is_empty() {
            return Err(Error::Configuration("base URL must not be empty".into()));
        }
        let client = match self.client {
            Some(c) => c,
            None => Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| Error::Configuration(e.to_string()))?,
        };

        Ok(ConsumerRegistryClient {
            client,
            base_url: self.base_url,
            api_key: self.api_key,
            timeout: self.timeout,
        })
    }
}

impl ConsumerRegistryClient {
    /// Create a new client with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if `base_url` is empty or the TLS backend cannot initialise.
    pub fn new(base_url: impl Into<String>) -> Self {
        ConsumerRegistryClientBuilder::new(base_url)
            .build()
            .expect("default client configuration should not fail")
    }

    /// Create a builder for advanced configuration.
    pub fn builder(base_url: impl Into<String>) -> ConsumerRegistryClientBuilder {
        ConsumerRegistryClientBuilder::new(base_url)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying HTTP client, shared with the [`SessionBroker`].
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Add the admin API key header if one is configured.
    fn add_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("apikey", key),
            None => req,
        }
    }

    /// `{base}/consumers/{username_or_id}{suffix}`, with the key percent-encoded.
    fn consumer_url(&self, username_or_id: &str, suffix: &str) -> String {
        format!(
            "{}/consumers/{}{suffix}",
            self.base_url,
            utf8_percent_encode(username_or_id, PATH_SEGMENT)
        )
    }

    /// Resolve a pagination link, which the gateway may send relative to the
    /// admin root.
    fn resolve_link(&self, next: &str) -> String {
        if next.starts_with("http://") || next.starts_with("https://") {
            next.to_owned()
        } else {
            format!("{}/{}", self.base_url, next.trim_start_matches('/'))
        }
    }

    /// Send a request, mapping transport failures.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Response, Error> {
        self.add_auth(req)
            .send()
            .await
            .map_err(|e| Error::transport(&e, self.timeout))
    }
}

/// Decode a successful JSON body, or turn a failure status into an error.
async fn json_or_error<T: DeserializeOwned>(response: Response, context: &str) -> Result<T, Error> {
    let response = check_status(response, context).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| Error::Deserialization(e.to_string()))
}

/// Pass a success response through; map 404 to `NotFound` and anything else
/// to `Http`, keeping the gateway's message when it sends one.
async fn check_status(response: Response, context: &str) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(context.to_owned()));
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .unwrap_or(body);
    Err(Error::Http {
        status: status.as_u16(),
        message: format!("{context}: {message}"),
    })
}

/// Reject an empty consumer key before any request is made.
fn require_key(username_or_id: &str) -> Result<(), Error> {
    if username_or_id.is_empty() {
        return Err(Error::Validation("username or consumer id is required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = ConsumerRegistryClient::new("http://localhost:8001/");
        assert_eq!(client.base_url(), "http://localhost:8001");
    }

    #[test]
    fn builder_from_parts() {
        let client = ConsumerRegistryClientBuilder::from_parts("https", "kong", 8444)
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "https://kong:8444");
    }

    #[test]
    fn builder_rejects_empty_base_url() {
        let err = ConsumerRegistryClientBuilder::new("/").build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let client = ConsumerRegistryClient::builder("http://localhost:8001")
            .api_key("very-secret")
            .build()
            .unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn consumer_url_encodes_segment() {
        let client = ConsumerRegistryClient::new("http://localhost:8001");
        assert_eq!(
            client.consumer_url("alice", ""),
            "http://localhost:8001/consumers/alice"
        );
        assert_eq!(
            client.consumer_url("a b/c?", "/key-auth"),
            "http://localhost:8001/consumers/a%20b%2Fc%3F/key-auth"
        );
    }

    #[test]
    fn resolve_link_handles_relative_and_absolute() {
        let client = ConsumerRegistryClient::new("http://localhost:8001");
        assert_eq!(
            client.resolve_link("/consumers?offset=abc"),
            "http://localhost:8001/consumers?offset=abc"
        );
        assert_eq!(
            client.resolve_link("http://kong:8001/consumers?offset=abc"),
            "http://kong:8001/consumers?offset=abc"
        );
    }

    #[test]
    fn require_key_rejects_empty() {
        assert!(matches!(require_key(""), Err(Error::Validation(_))));
        assert!(require_key("alice").is_ok());
    }
}
