use std::fmt;

use serde::Deserialize;

/// Top-level configuration for the Portier server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct PortierConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Gateway admin API location.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Identity namespace and store backend.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Delegated login settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Names of the gateway-injected identity headers.
    #[serde(default)]
    pub headers: HeadersConfig,
}

/// HTTP server bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    6321
}

/// Where the gateway's admin API lives.
#[derive(Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
    /// `http` or `https`.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Per-request timeout for admin API calls.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Sent as the `apikey` header when the admin API is itself behind
    /// key-auth.
    pub admin_api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            admin_port: default_admin_port(),
            protocol: default_protocol(),
            timeout_seconds: default_timeout_seconds(),
            admin_api_key: None,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("admin_port", &self.admin_port)
            .field("protocol", &self.protocol)
            .field("timeout_seconds", &self.timeout_seconds)
            .field(
                "admin_api_key",
                &self.admin_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn default_gateway_host() -> String {
    "localhost".to_owned()
}

fn default_admin_port() -> u16 {
    8001
}

fn default_protocol() -> String {
    "http".to_owned()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Identity namespace and store backend.
#[derive(Debug, Deserialize)]
pub struct IdentityConfig {
    /// Tag on every consumer this application owns; `custom_id`s are
    /// prefixed with `"{namespace}_"`.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Which store to use: `"gateway"`, `"memory"`, or `"redis"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Connection URL for the backend (e.g. `redis://localhost:6379`).
    pub url: Option<String>,

    /// Key prefix for backends that support it. Defaults to the namespace.
    pub prefix: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            backend: default_backend(),
            url: None,
            prefix: None,
        }
    }
}

fn default_namespace() -> String {
    "portier".to_owned()
}

fn default_backend() -> String {
    "gateway".to_owned()
}

/// Delegated login settings.
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Login endpoint behind the gateway's key-auth and session plugins.
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Name of the session cookie the gateway issues.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub follow_redirects: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            cookie_name: default_cookie_name(),
            follow_redirects: false,
        }
    }
}

fn default_login_url() -> String {
    "http://localhost:8000/login".to_owned()
}

fn default_cookie_name() -> String {
    "session".to_owned()
}

/// Names of the identity headers the gateway injects.
#[derive(Debug, Deserialize)]
pub struct HeadersConfig {
    #[serde(default = "default_anonymous_header")]
    pub anonymous: String,
    #[serde(default = "default_username_header")]
    pub username: String,
    #[serde(default = "default_custom_id_header")]
    pub custom_id: String,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            anonymous: default_anonymous_header(),
            username: default_username_header(),
            custom_id: default_custom_id_header(),
        }
    }
}

fn default_anonymous_header() -> String {
    "X-Anonymous-Consumer".to_owned()
}

fn default_username_header() -> String {
    "X-Consumer-Username".to_owned()
}

fn default_custom_id_header() -> String {
    "X-Consumer-Custom-Id".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: PortierConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 6321);
        assert_eq!(config.gateway.host, "localhost");
        assert_eq!(config.gateway.admin_port, 8001);
        assert_eq!(config.gateway.protocol, "http");
        assert_eq!(config.gateway.timeout_seconds, 30);
        assert!(config.gateway.admin_api_key.is_none());
        assert_eq!(config.identity.namespace, "portier");
        assert_eq!(config.identity.backend, "gateway");
        assert_eq!(config.session.cookie_name, "session");
        assert!(!config.session.follow_redirects);
        assert_eq!(config.headers.anonymous, "X-Anonymous-Consumer");
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config: PortierConfig = toml::from_str(
            r#"
            [gateway]
            host = "kong"
            admin_api_key = "admin-secret"

            [identity]
            namespace = "shop"
            backend = "redis"
            url = "redis://cache:6379"

            [session]
            login_url = "https://kong.example.com/login"
            follow_redirects = true
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.host, "kong");
        assert_eq!(config.gateway.admin_port, 8001);
        assert_eq!(config.identity.namespace, "shop");
        assert_eq!(config.identity.url.as_deref(), Some("redis://cache:6379"));
        assert!(config.identity.prefix.is_none());
        assert_eq!(config.session.cookie_name, "session");
        assert!(config.session.follow_redirects);
    }

    #[test]
    fn gateway_debug_redacts_api_key() {
        let config: PortierConfig =
            toml::from_str("[gateway]\nadmin_api_key = \"admin-secret\"").unwrap();
        let debug = format!("{:?}", config.gateway);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("admin-secret"));
    }
}
