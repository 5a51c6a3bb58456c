//! Read-through/write-through report cache. The engine treats every cache
//! operation as best-effort: a failed read is a miss, a failed write is a
//! logged no-op, and reports are always computable with caching disabled.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait ReportCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()>;
}

// Cache keys carry every parameter that affects report content, so a
// wrong-parameter result can never be served.

pub fn instructor_key(instructor_id: &Uuid) -> String {
    format!("analytics:instructor:{instructor_id}")
}

pub fn student_key(user_id: &Uuid) -> String {
    format!("analytics:student:{user_id}")
}

pub fn platform_key(window_days: u32) -> String {
    format!("analytics:platform:{window_days}")
}

pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl ReportCache for RedisCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        debug!(key, hit = value.is_some(), "cache lookup");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        debug!(key, ttl_secs, "cached report");
        Ok(())
    }
}

/// Used when no cache is configured; every read misses, every write succeeds.
pub struct NoopCache;

#[async_trait]
impl ReportCache for NoopCache {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_secs: u64) -> anyhow::Result<()> {
        Ok(())
    }
}
