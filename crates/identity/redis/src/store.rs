use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, Script};
use tracing::{debug, instrument};

use portier_core::{UserAccount, UserId};
use portier_identity::error::IdentityError;
use portier_identity::store::IdentityStore;

use crate::config::RedisConfig;
use crate::keys::UserKeys;
use crate::scripts;

/// Redis-backed implementation of [`IdentityStore`].
///
/// Uses a `deadpool-redis` connection pool. Allocation is an `INCR` and
/// creation a Lua script, so unlike the gateway store both are atomic.
pub struct RedisIdentityStore {
    pool: Pool,
    keys: UserKeys,
}

impl RedisIdentityStore {
    /// Create a new `RedisIdentityStore` from the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Backend`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, IdentityError> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| IdentityError::Backend(e.to_string()))?
            .map_err(|e| IdentityError::Backend(e.to_string()))?;

        Ok(Self {
            pool,
            keys: UserKeys::new(&config.prefix),
        })
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, IdentityError> {
        self.pool
            .get()
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))
    }
}

fn backend_error(e: &redis::RedisError) -> IdentityError {
    IdentityError::Backend(e.to_string())
}

#[async_trait]
impl IdentityStore for RedisIdentityStore {
    async fn allocate(&self) -> Result<UserId, IdentityError> {
        let mut conn = self.conn().await?;
        let next: u64 = conn
            .incr(&self.keys.max_id, 1u64)
            .await
            .map_err(|e| backend_error(&e))?;
        debug!(next, "allocated user id");
        UserId::new(next).ok_or(IdentityError::AllocationExhausted)
    }

    #[instrument(skip(self))]
    async fn create_record(
        &self,
        id: UserId,
        username: &str,
    ) -> Result<UserAccount, IdentityError> {
        let mut conn = self.conn().await?;
        let script = Script::new(scripts::CREATE_USER);
        let result: i64 = script
            .key(&self.keys.by_id)
            .key(&self.keys.by_name)
            .key(&self.keys.max_id)
            .arg(id.get())
            .arg(username)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| backend_error(&e))?;

        match result {
            1 => Ok(UserAccount::new(id, username)),
            0 => Err(IdentityError::Conflict(username.to_owned())),
            _ => Err(IdentityError::Conflict(format!("user id {id}"))),
        }
    }

    async fn find_by_name(&self, username: &str) -> Result<Option<UserAccount>, IdentityError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn
            .hget(&self.keys.by_name, username)
            .await
            .map_err(|e| backend_error(&e))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let id: UserId = raw
            .parse()
            .map_err(|e| IdentityError::Backend(format!("corrupt id for {username}: {e}")))?;
        Ok(Some(UserAccount::new(id, username)))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserAccount>, IdentityError> {
        let mut conn = self.conn().await?;
        let name: Option<String> = conn
            .hget(&self.keys.by_id, id.get())
            .await
            .map_err(|e| backend_error(&e))?;
        Ok(name.map(|n| UserAccount::new(id, n)))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_is_backend_error() {
        let config = RedisConfig::new("not-a-redis-url");
        assert!(matches!(
            RedisIdentityStore::new(&config),
            Err(IdentityError::Backend(_))
        ));
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn test_config() -> RedisConfig {
        RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            prefix: format!("portier-test-{}", uuid::Uuid::new_v4()),
            ..RedisConfig::default()
        }
    }

    #[tokio::test]
    async fn store_conformance() {
        let config = test_config();
        let store = RedisIdentityStore::new(&config).expect("pool creation should succeed");
        portier_identity::testing::run_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn create_raises_lagging_counter() {
        let config = test_config();
        let store = RedisIdentityStore::new(&config).expect("pool creation should succeed");

        let explicit = UserId::new(10).unwrap();
        store.create_record(explicit, "dora").await.unwrap();
        assert_eq!(store.allocate().await.unwrap().get(), 11);
    }
}
