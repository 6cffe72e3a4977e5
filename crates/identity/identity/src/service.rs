use std::sync::Arc;

use http::HeaderMap;
use portier_client::{ConsumerRegistryClient, SessionBroker};
use portier_core::{IdentityCodec, Namespace, UserAccount, UserId, UserIdentity};
use tracing::{error, info, instrument, warn};

use crate::error::IdentityError;
use crate::headers::TrustedHeaders;
use crate::store::IdentityStore;

/// The application's view of users: who is calling, who exists, and how to
/// sign someone in.
///
/// Users live in whichever [`IdentityStore`] is configured; session login
/// always goes through the gateway, which holds the consumers' API keys.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn IdentityStore>,
    client: Arc<ConsumerRegistryClient>,
    broker: SessionBroker,
    codec: IdentityCodec,
    headers: TrustedHeaders,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("store", &self.store.backend())
            .field("client", &self.client)
            .field("broker", &self.broker)
            .field("codec", &self.codec)
            .field("headers", &self.headers)
            .finish()
    }
}

impl UserService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        client: Arc<ConsumerRegistryClient>,
        broker: SessionBroker,
        namespace: &Namespace,
    ) -> Self {
        Self {
            store,
            client,
            broker,
            codec: IdentityCodec::for_namespace(namespace),
            headers: TrustedHeaders::default(),
        }
    }

    /// Use non-default names for the gateway's identity headers.
    #[must_use]
    pub fn with_trusted_headers(mut self, headers: TrustedHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    pub fn trusted_headers(&self) -> &TrustedHeaders {
        &self.headers
    }

    /// Name of the gateway session cookie, for setting and clearing it.
    pub fn session_cookie_name(&self) -> &str {
        self.broker.cookie_name()
    }

    /// The caller, as identified by the gateway's trusted headers.
    pub fn current_user(&self, headers: &HeaderMap) -> Result<UserIdentity, IdentityError> {
        self.headers.identify(headers, &self.codec)
    }

    /// Look a user up by name.
    pub async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserAccount>, IdentityError> {
        require_username(username)?;
        self.store.find_by_name(username).await
    }

    /// Look a user up by ID.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<UserAccount>, IdentityError> {
        self.store.find_by_id(id).await
    }

    /// Register a new user under the next free ID.
    #[instrument(skip(self), fields(backend = self.store.backend()))]
    pub async fn create_user(&self, username: &str) -> Result<UserAccount, IdentityError> {
        require_username(username)?;

        let result = match self.store.allocate().await {
            Ok(id) => self.store.create_record(id, username).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(account) => {
                info!(user_id = account.id.get(), "user created");
                Ok(account)
            }
            Err(e) => {
                error!(error = %e, indeterminate = e.is_indeterminate(), "failed to create user");
                Err(e)
            }
        }
    }

    /// Exchange the user's gateway API key for a session cookie.
    ///
    /// Returns `None` without contacting the login endpoint when the user
    /// has no key, and `None` when the gateway sets no cookie.
    #[instrument(skip(self, account, forwarded_headers), fields(username = %account.username))]
    pub async fn login(
        &self,
        account: &UserAccount,
        forwarded_headers: &HeaderMap,
    ) -> Result<Option<String>, IdentityError> {
        let Some(key) = self.client.get_consumer_api_key(&account.username).await? else {
            warn!("user has no API key; skipping gateway login");
            return Ok(None);
        };
        Ok(self.broker.login(&key, forwarded_headers).await?)
    }
}

fn require_username(username: &str) -> Result<(), IdentityError> {
    if username.is_empty() {
        return Err(IdentityError::Validation("username must not be empty".into()));
    }
    Ok(())
}
