//! Redis list broker (`LPUSH` / `BRPOP`)

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::JobMessage;

use super::broker::JobBroker;

/// Broker backed by a Redis list, shared by every process pointing at it
pub struct RedisBroker {
    pool: deadpool_redis::Pool,
    key: String,
}

impl RedisBroker {
    /// Create a pooled broker for the list `key`
    pub fn new(url: &str, key: impl Into<String>) -> Result<Self> {
        let pool = deadpool_redis::Config::from_url(url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| Error::Config(format!("Failed to create Redis pool: {}", e)))?;

        Ok(Self {
            pool,
            key: key.into(),
        })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::queue(format!("Redis connection failed: {}", e)))
    }
}

#[async_trait]
impl JobBroker for RedisBroker {
    async fn push(&self, message: &JobMessage) -> Result<()> {
        let payload = message.encode()?;
        let mut conn = self.connection().await?;

        let _: i64 = redis::cmd("LPUSH")
            .arg(&self.key)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::queue(format!("LPUSH failed: {}", e)))?;

        Ok(())
    }

    async fn pop(&self, wait: Duration) -> Result<Option<JobMessage>> {
        let mut conn = self.connection().await?;

        let reply: Option<(String, Vec<u8>)> = redis::cmd("BRPOP")
            .arg(&self.key)
            .arg(wait.as_secs_f64())
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::queue(format!("BRPOP failed: {}", e)))?;

        let Some((_, payload)) = reply else {
            return Ok(None);
        };

        match JobMessage::decode(&payload) {
            Ok(message) => Ok(Some(message)),
            Err(e) => {
                // Nothing can process it; dropping keeps the queue moving
                tracing::error!("Discarding malformed job message on {}: {}", self.key, e);
                Ok(None)
            }
        }
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.connection().await?;

        let len: usize = redis::cmd("LLEN")
            .arg(&self.key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::queue(format!("LLEN failed: {}", e)))?;

        Ok(len)
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "redis"
    }
}
