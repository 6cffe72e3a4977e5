use std::collections::HashSet;

use portier_core::{ConsumerRecord, Page};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::{ConsumerRegistryClient, Error, check_status, json_or_error, require_key};

/// Body of a consumer create or update request. Absent fields are omitted.
#[derive(Debug, Default, Serialize)]
struct ConsumerFields<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_id: Option<&'a str>,
    #[serde(skip_serializing_if = "<[&str]>::is_empty")]
    tags: &'a [&'a str],
}

impl<'a> ConsumerFields<'a> {
    /// Build the body, treating empty strings as absent and requiring at
    /// least one identifying field.
    fn new(
        username: Option<&'a str>,
        custom_id: Option<&'a str>,
        tags: &'a [&'a str],
        missing: &str,
    ) -> Result<Self, Error> {
        let username = username.filter(|s| !s.is_empty());
        let custom_id = custom_id.filter(|s| !s.is_empty());
        if username.is_none() && custom_id.is_none() {
            return Err(Error::Validation(missing.to_owned()));
        }
        Ok(Self {
            username,
            custom_id,
            tags,
        })
    }
}

impl ConsumerRegistryClient {
    /// Create a consumer.
    ///
    /// At least one of `username` and `custom_id` must be non-empty.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> Result<(), portier_client::Error> {
    /// use portier_client::ConsumerRegistryClient;
    ///
    /// let client = ConsumerRegistryClient::new("http://localhost:8001");
    /// let consumer = client
    ///     .create_consumer(Some("alice"), Some("portier_1"), &["portier"])
    ///     .await?;
    /// assert!(consumer.has_tag("portier"));
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self, tags))]
    pub async fn create_consumer(
        &self,
        username: Option<&str>,
        custom_id: Option<&str>,
        tags: &[&str],
    ) -> Result<ConsumerRecord, Error> {
        let body = ConsumerFields::new(
            username,
            custom_id,
            tags,
            "either username or custom_id must be set",
        )?;
        let url = format!("{}/consumers", self.base_url);

        let response = self.send(self.client.post(&url).json(&body)).await?;
        debug!(status = response.status().as_u16(), "create consumer response");

        json_or_error(response, "failed to create consumer").await
    }

    /// List every consumer, following `next` links until the last page.
    ///
    /// Pages are concatenated in the order the gateway returns them. A `next`
    /// link that was already visited is reported as an upstream error instead
    /// of looping forever.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> Result<(), portier_client::Error> {
    /// use portier_client::ConsumerRegistryClient;
    ///
    /// let client = ConsumerRegistryClient::new("http://localhost:8001");
    /// for consumer in client.list_consumers().await? {
    ///     println!("{:?} {:?}", consumer.username, consumer.custom_id);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self))]
    pub async fn list_consumers(&self) -> Result<Vec<ConsumerRecord>, Error> {
        self.collect_pages(format!("{}/consumers", self.base_url), "failed to list consumers")
            .await
    }

    /// Drain a cursor-paginated listing.
    pub(crate) async fn collect_pages<T: serde::de::DeserializeOwned>(
        &self,
        first: String,
        context: &str,
    ) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut url = first;
        let mut pages = 0usize;

        loop {
            if !visited.insert(url.clone()) {
                return Err(Error::Http {
                    status: 200,
                    message: format!("{context}: pagination loop at {url}"),
                });
            }

            let response = self.send(self.client.get(&url)).await?;
            let page: Page<T> = json_or_error(response, context).await?;
            pages += 1;
            debug!(page = pages, items = page.data.len(), "fetched page");
            items.extend(page.data);

            match page.next.filter(|n| !n.is_empty()) {
                Some(next) => url = self.resolve_link(&next),
                None => break,
            }
        }

        debug!(pages, total = items.len(), "pagination drained");
        Ok(items)
    }

    /// Fetch a consumer by username or gateway id.
    ///
    /// Returns [`Error::NotFound`] if the gateway has no such consumer.
    #[instrument(skip(self))]
    pub async fn get_consumer(&self, username_or_id: &str) -> Result<ConsumerRecord, Error> {
        require_key(username_or_id)?;
        let url = self.consumer_url(username_or_id, "");

        let response = self.send(self.client.get(&url)).await?;
        json_or_error(response, &format!("consumer {username_or_id}")).await
    }

    /// Fetch a consumer, mapping "not found" to `None`.
    pub async fn find_consumer(
        &self,
        username_or_id: &str,
    ) -> Result<Option<ConsumerRecord>, Error> {
        match self.get_consumer(username_or_id).await {
            Ok(consumer) => Ok(Some(consumer)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Update a consumer's username, custom id, and tags.
    ///
    /// At least one of `new_username` and `custom_id` must be non-empty;
    /// empty `tags` leaves the consumer's tags unchanged.
    #[instrument(skip(self, tags))]
    pub async fn update_consumer(
        &self,
        username_or_id: &str,
        new_username: Option<&str>,
        custom_id: Option<&str>,
        tags: &[&str],
    ) -> Result<ConsumerRecord, Error> {
        require_key(username_or_id)?;
        let body = ConsumerFields::new(
            new_username,
            custom_id,
            tags,
            "either new_username or custom_id must be set",
        )?;
        let url = self.consumer_url(username_or_id, "");

        let response = self.send(self.client.patch(&url).json(&body)).await?;
        json_or_error(response, &format!("failed to update consumer {username_or_id}")).await
    }

    /// Delete a consumer.
    ///
    /// Whether deleting an absent consumer succeeds is up to the gateway; a
    /// 404 surfaces as [`Error::NotFound`].
    #[instrument(skip(self))]
    pub async fn delete_consumer(&self, username_or_id: &str) -> Result<(), Error> {
        require_key(username_or_id)?;
        let url = self.consumer_url(username_or_id, "");

        let response = self.send(self.client.delete(&url)).await?;
        check_status(response, &format!("failed to delete consumer {username_or_id}")).await?;
        Ok(())
    }
}
