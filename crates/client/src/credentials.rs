use portier_core::{KeyCredential, Page};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::{ConsumerRegistryClient, Error, json_or_error, require_key};

#[derive(Debug, Serialize)]
struct NewKeyCredential<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
}

impl ConsumerRegistryClient {
    /// Fetch the key of the consumer's first key-auth credential.
    ///
    /// Returns `None` when the consumer has no credential, or is unknown to
    /// the gateway.
    #[instrument(skip(self))]
    pub async fn get_consumer_api_key(&self, username_or_id: &str) -> Result<Option<String>, Error> {
        require_key(username_or_id)?;
        let url = self.consumer_url(username_or_id, "/key-auth");

        let response = self.send(self.client.get(&url)).await?;
        let page: Page<KeyCredential> =
            match json_or_error(response, &format!("key-auth for {username_or_id}")).await {
                Ok(page) => page,
                Err(Error::NotFound(_)) => {
                    warn!("consumer not found while fetching key");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };

        let key = page.data.into_iter().next().map(|c| c.key);
        if key.is_none() {
            debug!("consumer has no key-auth credential");
        }
        Ok(key)
    }

    /// List every key-auth credential of a consumer.
    #[instrument(skip(self))]
    pub async fn list_key_credentials(
        &self,
        username_or_id: &str,
    ) -> Result<Vec<KeyCredential>, Error> {
        require_key(username_or_id)?;
        self.collect_pages(
            self.consumer_url(username_or_id, "/key-auth"),
            &format!("failed to list key-auth for {username_or_id}"),
        )
        .await
    }

    /// Provision a key-auth credential. The gateway generates the key when
    /// `key` is `None`.
    #[instrument(skip(self, key))]
    pub async fn create_key_credential(
        &self,
        username_or_id: &str,
        key: Option<&str>,
    ) -> Result<KeyCredential, Error> {
        require_key(username_or_id)?;
        let url = self.consumer_url(username_or_id, "/key-auth");
        let body = NewKeyCredential {
            key: key.filter(|k| !k.is_empty()),
        };

        let response = self.send(self.client.post(&url).json(&body)).await?;
        json_or_error(
            response,
            &format!("failed to create key-auth for {username_or_id}"),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGateway, MockRoute};
    use serde_json::json;

    #[tokio::test]
    async fn api_key_is_first_credential() {
        let gateway = MockGateway::start(vec![MockRoute::json(
            "GET",
            "/consumers/alice/key-auth",
            200,
            json!({
                "data": [
                    { "id": "k-1", "key": "first-key", "created_at": 1_700_000_000 },
                    { "id": "k-2", "key": "second-key" }
                ],
                "next": null
            }),
        )])
        .await;

        let client = ConsumerRegistryClient::new(gateway.base_url());
        let key = client.get_consumer_api_key("alice").await.unwrap();
        assert_eq!(key.as_deref(), Some("first-key"));
    }

    #[tokio::test]
    async fn api_key_absent_without_credentials() {
        let gateway = MockGateway::start(vec![MockRoute::json(
            "GET",
            "/consumers/bob/key-auth",
            200,
            json!({ "data": [], "next": null }),
        )])
        .await;

        let client = ConsumerRegistryClient::new(gateway.base_url());
        assert!(client.get_consumer_api_key("bob").await.unwrap().is_none());
        assert!(client.get_consumer_api_key("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn api_key_propagates_server_error() {
        let gateway = MockGateway::start(vec![MockRoute::new(
            "GET",
            "/consumers/bob/key-auth",
            503,
            "upstream unavailable",
        )])
        .await;

        let client = ConsumerRegistryClient::new(gateway.base_url());
        let err = client.get_consumer_api_key("bob").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn list_and_create_credentials() {
        let gateway = MockGateway::start(vec![
            MockRoute::json(
                "GET",
                "/consumers/alice/key-auth",
                200,
                json!({ "data": [{ "id": "k-1", "key": "one" }], "next": "/consumers/alice/key-auth?offset=2" }),
            ),
            MockRoute::json(
                "GET",
                "/consumers/alice/key-auth?offset=2",
                200,
                json!({ "data": [{ "id": "k-2", "key": "two" }] }),
            ),
            MockRoute::json(
                "POST",
                "/consumers/alice/key-auth",
                201,
                json!({ "id": "k-3", "key": "chosen" }),
            ),
        ])
        .await;

        let client = ConsumerRegistryClient::new(gateway.base_url());
        let keys: Vec<String> = client
            .list_key_credentials("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.key)
            .collect();
        assert_eq!(keys, ["one", "two"]);

        let created = client
            .create_key_credential("alice", Some("chosen"))
            .await
            .unwrap();
        assert_eq!(created.id, "k-3");
        assert_eq!(
            gateway.requests_to("POST", "/consumers/alice/key-auth")[0].json(),
            json!({ "key": "chosen" })
        );

        let _ = client.create_key_credential("alice", None).await.unwrap();
        assert_eq!(
            gateway.requests_to("POST", "/consumers/alice/key-auth")[1].json(),
            json!({})
        );
    }
}
