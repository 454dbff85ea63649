use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError};
use tokio::sync::RwLock;

/// Lazily connected Redis handle. Every operation degrades to "allowed" when
/// Redis is unavailable so that rate limits never take the API down.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        *self.manager.write().await = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        *self.manager.write().await = None;
    }

    async fn connection(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut manager) = self.connection().await else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// Fixed-window counter: `true` while the key has been hit at most `limit` times.
    pub(crate) async fn rate_limit(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<bool, RedisError> {
        let Some(mut manager) = self.connection().await else {
            return Ok(true);
        };

        let script = redis::Script::new(
            r#"
            local current = redis.call("INCR", KEYS[1])
            if current == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return current
        "#,
        );

        let current: i64 =
            script.key(key).arg(window_seconds as i64).invoke_async(&mut manager).await?;

        Ok(current <= limit as i64)
    }

    /// Claims `key` for `seconds`. Returns `false` while a previous claim is still live.
    pub(crate) async fn acquire_cooldown(&self, key: &str, seconds: u64) -> Result<bool, RedisError> {
        let Some(mut manager) = self.connection().await else {
            return Ok(true);
        };

        let reply: Option<String> = cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(seconds)
            .query_async(&mut manager)
            .await?;

        Ok(reply.is_some())
    }

    /// Drops a cooldown claimed by [`Self::acquire_cooldown`] ahead of its expiry.
    pub(crate) async fn release_cooldown(&self, key: &str) -> Result<(), RedisError> {
        let Some(mut manager) = self.connection().await else {
            return Ok(());
        };

        cmd("DEL").arg(key).query_async::<_, ()>(&mut manager).await
    }
}

#[cfg(test)]
mod tests {
    use super::{RedisHandle, RedisHealth};
    use crate::core::config::Settings;
    use crate::test_support;
    use uuid::Uuid;

    #[tokio::test]
    async fn disconnected_handle_allows_everything() {
        let redis = RedisHandle::new("redis://127.0.0.1:1/0".to_string());

        assert!(matches!(redis.health().await, RedisHealth::Disconnected));
        assert!(redis.rate_limit("rl:any", 0, 60).await.expect("rate limit"));
        assert!(redis.acquire_cooldown("cooldown:any", 60).await.expect("cooldown"));
        redis.release_cooldown("cooldown:any").await.expect("release");
    }

    #[tokio::test]
    #[ignore = "requires a running redis"]
    async fn rate_limit_and_cooldown_enforce_limits() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();

        let settings = Settings::load().expect("settings");
        test_support::reset_redis(settings.redis().redis_url()).await.expect("redis reset");

        let redis = RedisHandle::new(settings.redis().redis_url());
        redis.connect().await.expect("redis connect");

        let key = format!("rate-limit:{}", Uuid::new_v4());
        assert!(redis.rate_limit(&key, 1, 5).await.expect("rate limit"));
        assert!(!redis.rate_limit(&key, 1, 5).await.expect("rate limit"));

        let key = format!("cooldown:{}", Uuid::new_v4());
        assert!(redis.acquire_cooldown(&key, 5).await.expect("cooldown"));
        assert!(!redis.acquire_cooldown(&key, 5).await.expect("cooldown"));

        redis.release_cooldown(&key).await.expect("release");
        assert!(redis.acquire_cooldown(&key, 5).await.expect("cooldown after release"));
    }
}
