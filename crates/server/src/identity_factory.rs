use std::sync::Arc;
use std::time::Duration;

use portier_client::{ConsumerRegistryClient, SessionBroker};
use portier_core::Namespace;
use portier_identity::{GatewayIdentityStore, IdentityStore, TrustedHeaders, UserService};
use portier_identity_memory::MemoryIdentityStore;
#[cfg(feature = "redis")]
use portier_identity_redis::{RedisConfig, RedisIdentityStore};
use tracing::info;

use crate::config::{IdentityConfig, PortierConfig};
use crate::error::ServerError;

/// Build the gateway admin client from configuration.
pub fn create_client(config: &PortierConfig) -> Result<Arc<ConsumerRegistryClient>, ServerError> {
    let gateway = &config.gateway;
    let mut builder = ConsumerRegistryClient::builder(format!(
        "{}://{}:{}",
        gateway.protocol, gateway.host, gateway.admin_port
    ))
    .timeout(Duration::from_secs(gateway.timeout_seconds));
    if let Some(key) = &gateway.admin_api_key {
        builder = builder.api_key(key);
    }
    let client = builder
        .build()
        .map_err(|e| ServerError::Config(format!("gateway client: {e}")))?;
    Ok(Arc::new(client))
}

/// Construct an `IdentityStore` from configuration.
pub fn create_identity_store(
    config: &IdentityConfig,
    client: &Arc<ConsumerRegistryClient>,
) -> Result<Arc<dyn IdentityStore>, ServerError> {
    let store: Arc<dyn IdentityStore> = match config.backend.as_str() {
        "gateway" => Arc::new(GatewayIdentityStore::new(
            Arc::clone(client),
            Namespace::new(config.namespace.as_str()),
        )),
        "memory" => Arc::new(MemoryIdentityStore::new()),
        #[cfg(feature = "redis")]
        "redis" => create_redis(config)?,
        other => {
            return Err(ServerError::Config(format!(
                "unsupported identity backend: {other} (is the feature enabled?)"
            )));
        }
    };
    info!(backend = store.backend(), namespace = %config.namespace, "identity store initialized");
    Ok(store)
}

#[cfg(feature = "redis")]
fn create_redis(config: &IdentityConfig) -> Result<Arc<dyn IdentityStore>, ServerError> {
    let url = config.url.as_deref().unwrap_or("redis://127.0.0.1:6379");
    let redis_config = RedisConfig {
        url: url.to_owned(),
        prefix: config
            .prefix
            .clone()
            .unwrap_or_else(|| config.namespace.clone()),
        ..RedisConfig::default()
    };
    Ok(Arc::new(RedisIdentityStore::new(&redis_config)?))
}

/// Wire the user service: admin client, identity store, session broker, and
/// trusted header names.
pub fn create_user_service(config: &PortierConfig) -> Result<UserService, ServerError> {
    if config.identity.namespace.is_empty() {
        return Err(ServerError::Config("identity namespace must not be empty".into()));
    }

    let client = create_client(config)?;
    let store = create_identity_store(&config.identity, &client)?;

    let session = portier_client::SessionConfig::new(
        config.session.login_url.as_str(),
        config.session.cookie_name.as_str(),
    )
    .with_follow_redirects(config.session.follow_redirects)
    .with_timeout(Duration::from_secs(config.gateway.timeout_seconds));
    let broker =
        SessionBroker::new(session).map_err(|e| ServerError::Config(format!("session: {e}")))?;

    let headers = TrustedHeaders::from_names(
        &config.headers.anonymous,
        &config.headers.username,
        &config.headers.custom_id,
    )
    .map_err(|e| ServerError::Config(format!("trusted header name: {e}")))?;

    let namespace = Namespace::new(config.identity.namespace.as_str());
    Ok(UserService::new(store, client, broker, &namespace).with_trusted_headers(headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_gateway_service() {
        let config = PortierConfig::default();
        let service = create_user_service(&config).unwrap();
        assert_eq!(service.store().backend(), "gateway");
        assert_eq!(service.session_cookie_name(), "session");
    }

    #[test]
    fn memory_backend() {
        let config: PortierConfig = toml::from_str("[identity]\nbackend = \"memory\"").unwrap();
        let service = create_user_service(&config).unwrap();
        assert_eq!(service.store().backend(), "memory");
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let config: PortierConfig = toml::from_str("[identity]\nbackend = \"etcd\"").unwrap();
        assert!(matches!(
            create_user_service(&config),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn invalid_header_name_is_config_error() {
        let config: PortierConfig =
            toml::from_str("[headers]\nusername = \"not a header\"").unwrap();
        assert!(matches!(
            create_user_service(&config),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn client_uses_gateway_parts() {
        let config: PortierConfig = toml::from_str(
            "[gateway]\nhost = \"kong\"\nadmin_port = 8444\nprotocol = \"https\"",
        )
        .unwrap();
        let client = create_client(&config).unwrap();
        assert_eq!(client.base_url(), "https://kong:8444");
    }
}
