//! Optional Redis cache.
//!
//! Cache errors are never fatal: callers fall back to the source of truth
//! and the failure is only logged.

use redis::{aio::ConnectionManager, Client};

pub mod auth;
pub mod courts;

/// Clones share one reconnecting connection.
#[derive(Clone)]
pub struct CacheService {
    conn: ConnectionManager,
}

impl CacheService {
    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize, redis::RedisError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut conn)
            .await?;
        if !keys.is_empty() {
            let mut pipe = redis::pipe();
            for key in &keys {
                pipe.del(key);
            }
            let _: () = pipe.query_async(&mut conn).await?;
        }
        Ok(keys.len())
    }
}
