//! Key-based delegated login.
//!
//! The gateway fronts a login endpoint protected by key-auth. Presenting a
//! consumer's key as the `apikey` query parameter makes the gateway's session
//! plugin issue a session cookie on the response; [`SessionBroker`] performs
//! that request and picks the cookie out.

use std::fmt;
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderName};
use reqwest::{Client, Response, Url, redirect};
use tracing::{debug, info, instrument, warn};

use crate::{DEFAULT_TIMEOUT, Error};

/// Query parameter carrying the consumer key.
const API_KEY_PARAM: &str = "apikey";

/// Settings for the delegated login request.
#[derive(Clone)]
pub struct SessionConfig {
    /// Login endpoint behind the gateway's key-auth and session plugins.
    pub login_url: String,
    /// Name of the session cookie the gateway sets.
    pub cookie_name: String,
    /// Follow redirects from the login endpoint. Off by default so the
    /// cookie set on the login response itself is visible.
    pub follow_redirects: bool,
    pub timeout: Duration,
}

impl SessionConfig {
    pub fn new(login_url: impl Into<String>, cookie_name: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
            cookie_name: cookie_name.into(),
            follow_redirects: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("login_url", &strip_query(&self.login_url))
            .field("cookie_name", &self.cookie_name)
            .field("follow_redirects", &self.follow_redirects)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Exchanges a consumer API key for a gateway session cookie.
#[derive(Debug, Clone)]
pub struct SessionBroker {
    client: Client,
    config: SessionConfig,
}

impl SessionBroker {
    /// Build a broker with its own HTTP client, configured for the login
    /// endpoint's redirect policy.
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        if config.login_url.is_empty() {
            return Err(Error::Configuration("login URL must not be empty".into()));
        }
        if config.cookie_name.is_empty() {
            return Err(Error::Configuration("cookie name must not be empty".into()));
        }
        let policy = if config.follow_redirects {
            redirect::Policy::default()
        } else {
            redirect::Policy::none()
        };
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(policy)
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Name of the session cookie this broker extracts.
    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// Issue `GET login_url?...&apikey=<api_key>`, forwarding the caller's
    /// headers minus hop-by-hop ones.
    ///
    /// Any status is returned as-is; only transport failures and an
    /// unparseable URL are errors.
    #[instrument(skip(self, api_key, forwarded_headers), fields(login_url = %strip_query(login_url)))]
    pub async fn login_via_key(
        &self,
        login_url: &str,
        api_key: &str,
        forwarded_headers: &HeaderMap,
    ) -> Result<Response, Error> {
        let url = merge_api_key(login_url, api_key)?;
        let headers = forwardable_headers(forwarded_headers);
        debug!(forwarded = headers.len(), "sending login request");

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::transport(&e, self.config.timeout))?;
        debug!(status = response.status().as_u16(), "login response");
        Ok(response)
    }

    /// Log in against the configured URL and return the session cookie, if
    /// the gateway set one.
    pub async fn login(
        &self,
        api_key: &str,
        forwarded_headers: &HeaderMap,
    ) -> Result<Option<String>, Error> {
        let response = self
            .login_via_key(&self.config.login_url, api_key, forwarded_headers)
            .await?;
        let cookie = extract_session_cookie(&response, &self.config.cookie_name);
        match &cookie {
            Some(_) => info!("gateway session established"),
            None => warn!(
                status = response.status().as_u16(),
                cookie = %self.config.cookie_name,
                "login response carried no session cookie"
            ),
        }
        Ok(cookie)
    }
}

/// The value of the named cookie from the response's `Set-Cookie` headers.
///
/// An empty value, as used to clear a cookie, counts as absent.
pub fn extract_session_cookie(response: &Response, cookie_name: &str) -> Option<String> {
    response
        .cookies()
        .find(|c| c.name() == cookie_name)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}

/// Set `apikey` on the URL's query: an existing value is replaced in place,
/// otherwise it is appended after the other parameters.
pub fn merge_api_key(login_url: &str, api_key: &str) -> Result<Url, Error> {
    let mut url = Url::parse(login_url)
        .map_err(|e| Error::Configuration(format!("invalid login URL: {e}")))?;

    let mut replaced = false;
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(k, v)| {
            if k == API_KEY_PARAM {
                if replaced {
                    return None;
                }
                replaced = true;
                return Some((k.into_owned(), api_key.to_owned()));
            }
            Some((k.into_owned(), v.into_owned()))
        })
        .collect();
    if !replaced {
        pairs.push((API_KEY_PARAM.to_owned(), api_key.to_owned()));
    }

    url.query_pairs_mut().clear().extend_pairs(&pairs);
    Ok(url)
}

/// Drop connection-scoped headers that must not be relayed.
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    let name = name.as_str();
    matches!(
        name,
        "connection" | "keep-alive" | "transfer-encoding" | "upgrade" | "te" | "trailer"
    ) || name.starts_with("proxy-")
        || name == CONTENT_LENGTH.as_str()
}

fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGateway, MockRoute};
    use reqwest::header::HeaderValue;

    fn broker(gateway: &MockGateway) -> SessionBroker {
        SessionBroker::new(SessionConfig::new(gateway.url("/login"), "session")).unwrap()
    }

    #[test]
    fn merge_appends_api_key() {
        let url = merge_api_key("http://kong:8000/login", "k1").unwrap();
        assert_eq!(url.as_str(), "http://kong:8000/login?apikey=k1");
    }

    #[test]
    fn merge_keeps_existing_params_in_order() {
        let url = merge_api_key("http://kong:8000/login?b=2&a=1", "k1").unwrap();
        assert_eq!(url.query(), Some("b=2&a=1&apikey=k1"));
    }

    #[test]
    fn merge_replaces_existing_api_key() {
        let url = merge_api_key("http://kong:8000/login?apikey=old&x=y&apikey=dup", "new").unwrap();
        assert_eq!(url.query(), Some("apikey=new&x=y"));
    }

    #[test]
    fn merge_encodes_key() {
        let url = merge_api_key("http://kong:8000/login", "a b&c").unwrap();
        assert_eq!(url.query(), Some("apikey=a+b%26c"));
    }

    #[test]
    fn merge_rejects_invalid_url() {
        assert!(matches!(
            merge_api_key("not a url", "k"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("proxy-authorization", HeaderValue::from_static("x"));
        headers.insert("content-length", HeaderValue::from_static("10"));
        headers.insert("host", HeaderValue::from_static("app.local"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8"));

        let forwarded = forwardable_headers(&headers);
        assert_eq!(forwarded.len(), 2);
        assert!(forwarded.contains_key("host"));
        assert!(forwarded.contains_key("user-agent"));
    }

    #[test]
    fn config_rejects_empty_cookie_name() {
        let err = SessionBroker::new(SessionConfig::new("http://kong/login", "")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn config_debug_hides_query() {
        let config = SessionConfig::new("http://kong/login?apikey=secret", "session");
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[tokio::test]
    async fn login_returns_named_cookie() {
        let gateway = MockGateway::start(vec![
            MockRoute::new("GET", "/login", 200, "ok")
                .with_header("Set-Cookie", "other=zzz; Path=/")
                .with_header("Set-Cookie", "session=abc123; Path=/; HttpOnly"),
        ])
        .await;

        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("portier-test"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));

        let cookie = broker(&gateway).login("k-alice", &headers).await.unwrap();
        assert_eq!(cookie.as_deref(), Some("abc123"));

        let requests = gateway.requests_to("GET", "/login");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, "/login?apikey=k-alice");
        assert_eq!(requests[0].header("user-agent"), Some("portier-test"));
        assert_eq!(requests[0].header("x-forwarded-for"), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn login_without_cookie_is_none() {
        let gateway = MockGateway::start(vec![
            MockRoute::new("GET", "/login", 401, "no").with_header("Set-Cookie", "other=1"),
        ])
        .await;

        let cookie = broker(&gateway).login("bad", &HeaderMap::new()).await.unwrap();
        assert!(cookie.is_none());
    }

    #[tokio::test]
    async fn redirect_is_not_followed_by_default() {
        let gateway = MockGateway::start(vec![
            MockRoute::new("GET", "/login", 302, "")
                .with_header("Location", "/home")
                .with_header("Set-Cookie", "session=from-login"),
            MockRoute::new("GET", "/home", 200, "home"),
        ])
        .await;

        let broker = broker(&gateway);
        let response = broker
            .login_via_key(&gateway.url("/login"), "k", &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 302);
        assert_eq!(
            extract_session_cookie(&response, "session").as_deref(),
            Some("from-login")
        );
        assert!(gateway.requests_to("GET", "/home").is_empty());
    }

    #[tokio::test]
    async fn unreachable_login_is_connection_error() {
        let broker =
            SessionBroker::new(SessionConfig::new("http://127.0.0.1:9/login", "session")).unwrap();
        let err = broker.login("k", &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
